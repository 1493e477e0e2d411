use actix_web::{web, HttpResponse};
use fleet_proto::ActivationRequest;

use crate::http::state::AppState;

/// §4.3, §7: refusals in steps 1-4 are returned as a 200 body with `success:false` —
/// callers inspect the `success` flag rather than the transport status.
pub async fn activate(state: web::Data<AppState>, body: web::Json<ActivationRequest>) -> HttpResponse {
    let response = state.activation.activate(body.into_inner());
    HttpResponse::Ok().json(response)
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/v1/license/activate", web::post().to(activate));
}
