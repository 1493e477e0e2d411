use actix_web::{web, HttpResponse};
use fleet_proto::{CreateLicenseRequest, UpdateLicenseRequest, ValidateLicenseRequest};

use crate::auth::admin::AdminAuth;
use crate::auth::jwt::DashboardAuth;
use crate::error::ApiResult;
use crate::http::state::AppState;

/// §4.2 + §9: always 200, `valid` carries the verdict. A read-only probe — never binds.
pub async fn validate(state: web::Data<AppState>, body: web::Json<ValidateLicenseRequest>) -> HttpResponse {
    let response = state.licenses.validate(&body.license_key);
    HttpResponse::Ok().json(response)
}

pub async fn create(
    _auth: AdminAuth,
    state: web::Data<AppState>,
    body: web::Json<CreateLicenseRequest>,
) -> ApiResult<HttpResponse> {
    let license = state.licenses.create(body.into_inner())?;
    Ok(HttpResponse::Ok().json(license))
}

pub async fn list(_auth: DashboardAuth, state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.licenses.list())
}

pub async fn get(
    _auth: DashboardAuth,
    state: web::Data<AppState>,
    id: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let license = state.licenses.get(&id)?;
    Ok(HttpResponse::Ok().json(license))
}

pub async fn update(
    _auth: AdminAuth,
    state: web::Data<AppState>,
    id: web::Path<String>,
    body: web::Json<UpdateLicenseRequest>,
) -> ApiResult<HttpResponse> {
    let license = state.licenses.update(&id, body.into_inner())?;
    Ok(HttpResponse::Ok().json(license))
}

pub async fn delete(
    _auth: AdminAuth,
    state: web::Data<AppState>,
    id: web::Path<String>,
) -> ApiResult<HttpResponse> {
    state.licenses.delete(&id)?;
    Ok(HttpResponse::NoContent().finish())
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/v1/license/validate", web::post().to(validate))
        .route("/api/v1/admin/licenses", web::get().to(list))
        .route("/api/v1/admin/licenses", web::post().to(create))
        .route("/api/v1/admin/licenses/{id}", web::get().to(get))
        .route("/api/v1/admin/licenses/{id}", web::put().to(update))
        .route("/api/v1/admin/licenses/{id}", web::delete().to(delete));
}
