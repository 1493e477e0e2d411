use actix_web::{web, HttpResponse};
use fleet_proto::HeartbeatRequest;

use crate::error::ApiResult;
use crate::http::state::AppState;

pub async fn heartbeat(state: web::Data<AppState>, body: web::Json<HeartbeatRequest>) -> ApiResult<HttpResponse> {
    let response = state.heartbeat.accept(body.into_inner())?;
    Ok(HttpResponse::Ok().json(response))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/v1/heartbeat", web::post().to(heartbeat));
}
