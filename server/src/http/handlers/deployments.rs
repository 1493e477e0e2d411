use actix_web::{web, HttpResponse};
use fleet_proto::Deployment;

use crate::auth::jwt::DashboardAuth;
use crate::error::ApiResult;
use crate::http::state::AppState;

/// `POST /api/v1/deployments` (public, like `/api/v1/heartbeat`): the agent reports each
/// step of an update attempt (§3's Deployment state machine) as it progresses. Upserts by
/// `id` — the repository is append-only from the agent's perspective, never deleted.
pub async fn report(state: web::Data<AppState>, body: web::Json<Deployment>) -> HttpResponse {
    state.deployments.insert(body.into_inner());
    HttpResponse::Accepted().finish()
}

/// `GET /api/v1/instances/{id}/deployments` (dashboard): history for one instance.
pub async fn list_for_instance(
    _auth: DashboardAuth,
    state: web::Data<AppState>,
    id: web::Path<String>,
) -> ApiResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(state.deployments.list_for_instance(&id)))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/v1/deployments", web::post().to(report))
        .route("/api/v1/instances/{id}/deployments", web::get().to(list_for_instance));
}
