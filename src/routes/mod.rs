mod auth;

pub use auth::{current_session, login, login_json_config, logout, refresh};

use actix_web::HttpResponse;

/// GET /health_check
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().finish()
}
