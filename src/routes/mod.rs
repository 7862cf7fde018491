// Route exports
pub mod matches;
pub mod sessions;

use crate::models::ErrorResponse;
use crate::services::{MatchPipeline, SessionError};
use actix_web::{http::StatusCode, web, HttpResponse};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub pipeline: MatchPipeline,
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .configure(sessions::configure)
            .configure(matches::configure),
    );
}

pub(crate) fn error_response(status: StatusCode, error: &str, message: impl ToString) -> HttpResponse {
    HttpResponse::build(status).json(ErrorResponse {
        error: error.to_string(),
        message: message.to_string(),
        status_code: status.as_u16(),
    })
}

pub(crate) fn session_error_response(err: SessionError) -> HttpResponse {
    match err {
        SessionError::NotFound(_) => error_response(StatusCode::NOT_FOUND, "Session not found", err),
        SessionError::CapacityReached(_) => {
            error_response(StatusCode::SERVICE_UNAVAILABLE, "Session limit reached", err)
        }
    }
}
