use actix_web::{web, HttpResponse};

use crate::auth::admin::AdminAuth;
use crate::auth::jwt::DashboardAuth;
use crate::error::ApiResult;
use crate::http::state::AppState;

pub async fn list(_auth: DashboardAuth, state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.instances.list())
}

pub async fn get(
    _auth: DashboardAuth,
    state: web::Data<AppState>,
    id: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let instance = state.instances.get(&id)?;
    Ok(HttpResponse::Ok().json(instance))
}

pub async fn delete(
    _auth: AdminAuth,
    state: web::Data<AppState>,
    id: web::Path<String>,
) -> ApiResult<HttpResponse> {
    state.instances.delete(&id)?;
    Ok(HttpResponse::NoContent().finish())
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/v1/instances", web::get().to(list))
        .route("/api/v1/instances/{id}", web::get().to(get))
        .route("/api/v1/instances/{id}", web::delete().to(delete));
}
