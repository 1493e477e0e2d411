use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use fleet_proto::Channel;
use futures::{StreamExt, TryStreamExt};
use serde::Deserialize;

use crate::artifact_store::ByteStream;
use crate::auth::admin::AdminAuth;
use crate::error::{ApiError, ApiResult};
use crate::http::state::AppState;

pub async fn list_all(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.releases.list_all())
}

pub async fn list_for_product(state: web::Data<AppState>, product: web::Path<String>) -> HttpResponse {
    HttpResponse::Ok().json(state.releases.list_for_product(&product))
}

#[derive(Deserialize)]
pub struct LatestQuery {
    #[serde(default = "default_channel")]
    channel: String,
    #[serde(default)]
    current_version: String,
}

fn default_channel() -> String {
    "stable".to_string()
}

pub async fn latest(
    state: web::Data<AppState>,
    product: web::Path<String>,
    query: web::Query<LatestQuery>,
) -> ApiResult<HttpResponse> {
    let channel: Channel = query
        .channel
        .parse()
        .map_err(|_| ApiError::Validation(format!("unknown channel: {}", query.channel)))?;

    match state.releases.latest_info(&product, channel, &query.current_version) {
        Some(info) => Ok(HttpResponse::Ok().json(info)),
        None => Err(ApiError::NotFound(format!("no releases for {}", product.as_str()))),
    }
}

pub async fn get(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> ApiResult<HttpResponse> {
    let (product, version) = path.into_inner();
    state
        .releases
        .get(&product, &version)
        .map(|release| HttpResponse::Ok().json(release))
        .ok_or_else(|| ApiError::NotFound(format!("release {product}/{version} not found")))
}

async fn stream_artifact(
    state: &AppState,
    product: &str,
    version: &str,
    filename: &str,
) -> ApiResult<HttpResponse> {
    let checksum = state
        .releases
        .get(product, version)
        .map(|r| r.checksum)
        .unwrap_or_default();

    let size = state
        .artifacts
        .size(product, version, filename)
        .await
        .map_err(|e| ApiError::NotFound(e.to_string()))?;
    let stream = state.releases.artifact_stream(product, version, filename).await?;

    Ok(HttpResponse::Ok()
        .content_type("application/octet-stream")
        .insert_header(("Content-Length", size.to_string()))
        .insert_header(("Content-Disposition", format!("attachment; filename=\"{filename}\"")))
        .insert_header(("X-Checksum-SHA256", checksum))
        .streaming(stream))
}

pub async fn download(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> ApiResult<HttpResponse> {
    let (product, version) = path.into_inner();
    let release = state
        .releases
        .get(&product, &version)
        .ok_or_else(|| ApiError::NotFound(format!("release {product}/{version} not found")))?;
    let filename = release
        .manifest
        .artifacts
        .first()
        .map(|a| a.name.clone())
        .unwrap_or_else(|| release.artifact_path.clone());
    stream_artifact(&state, &product, &version, &filename).await
}

/// `GET /{product}/{version}/{filename}` — the direct-fetch path installer scripts use.
pub async fn fetch_by_filename(
    state: web::Data<AppState>,
    path: web::Path<(String, String, String)>,
) -> ApiResult<HttpResponse> {
    let (product, version, filename) = path.into_inner();
    stream_artifact(&state, &product, &version, &filename).await
}

#[derive(Debug, Default)]
struct UploadFields {
    product: Option<String>,
    version: Option<String>,
    channel: Option<String>,
    release_notes: Option<String>,
    filename: Option<String>,
    artifact: Option<ByteStream>,
}

async fn parse_multipart(mut payload: Multipart) -> ApiResult<UploadFields> {
    let mut fields = UploadFields::default();

    while let Some(field) = payload
        .try_next()
        .await
        .map_err(|e| ApiError::Validation(e.to_string()))?
    {
        let content_disposition = field.content_disposition().cloned();
        let name = content_disposition
            .as_ref()
            .and_then(|cd| cd.get_name())
            .unwrap_or("")
            .to_string();
        match name.as_str() {
            "artifact" => {
                fields.filename = content_disposition.as_ref().and_then(|cd| cd.get_filename()).map(|s| s.to_string());
                let chunks: ByteStream =
                    Box::pin(field.map(|c| c.map_err(|e| std::io::Error::other(e.to_string()))));
                fields.artifact = Some(chunks);
            }
            other => {
                let mut value = Vec::new();
                let mut field = field;
                while let Some(chunk) = field.next().await {
                    let chunk = chunk.map_err(|e| ApiError::Validation(e.to_string()))?;
                    value.extend_from_slice(&chunk);
                }
                let value = String::from_utf8_lossy(&value).to_string();
                match other {
                    "product" => fields.product = Some(value),
                    "version" => fields.version = Some(value),
                    "channel" => fields.channel = Some(value),
                    "release_notes" => fields.release_notes = Some(value),
                    _ => {}
                }
            }
        }
    }

    Ok(fields)
}

/// `POST /api/v1/releases` (multipart): fields `product, version, channel, release_notes,
/// artifact` (§6). Creates a new catalog row; rejects re-uploads of the same
/// `(product, version)` with 409 per §9's resolved open question.
pub async fn upload(
    _auth: AdminAuth,
    state: web::Data<AppState>,
    payload: Multipart,
) -> ApiResult<HttpResponse> {
    let fields = parse_multipart(payload).await?;

    let product = fields.product.ok_or_else(|| ApiError::Validation("product is required".into()))?;
    let version = fields.version.ok_or_else(|| ApiError::Validation("version is required".into()))?;
    let channel: Channel = fields
        .channel
        .unwrap_or_else(default_channel)
        .parse()
        .map_err(|_| ApiError::Validation("unknown channel".into()))?;
    let filename = fields.filename.ok_or_else(|| ApiError::Validation("artifact filename is required".into()))?;
    let artifact = fields.artifact.ok_or_else(|| ApiError::Validation("artifact is required".into()))?;

    let release = state
        .releases
        .upload(&product, &version, channel, fields.release_notes, &filename, artifact)
        .await?;

    Ok(HttpResponse::Ok().json(release))
}

/// `PUT /api/v1/releases/{product}/{version}/{filename}` (§6): supplementary per-arch
/// binary for an already-cataloged version. Raw octet-stream body, no new Release row.
pub async fn put_supplementary(
    _auth: AdminAuth,
    state: web::Data<AppState>,
    path: web::Path<(String, String, String)>,
    body: web::Payload,
) -> ApiResult<HttpResponse> {
    let (product, version, filename) = path.into_inner();

    // body is already a Stream<Item = Result<Bytes, PayloadError>>; wrap it without buffering.
    let stream: ByteStream = Box::pin(body.map(|c| c.map_err(|e| std::io::Error::other(e.to_string()))));
    state
        .releases
        .put_supplementary_artifact(&product, &version, &filename, stream)
        .await?;

    Ok(HttpResponse::NoContent().finish())
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/v1/releases", web::get().to(list_all))
        .route("/api/v1/releases", web::post().to(upload))
        .route("/api/v1/releases/{product}", web::get().to(list_for_product))
        .route("/api/v1/releases/{product}/latest", web::get().to(latest))
        .route("/api/v1/releases/{product}/{version}", web::get().to(get))
        .route("/api/v1/releases/{product}/{version}/download", web::get().to(download))
        .route("/api/v1/releases/{product}/{version}/{filename}", web::put().to(put_supplementary))
        .route("/{product}/{version}/{filename}", web::get().to(fetch_by_filename));
}
