use actix_web::HttpResponse;

use crate::error::AppError;

pub async fn health_check() -> HttpResponse {
    tracing::debug!("Health check endpoint called");
    HttpResponse::Ok().finish()
}

/// Fallback for every unmatched path
pub async fn route_not_found() -> Result<HttpResponse, AppError> {
    Err(AppError::not_found("Route"))
}
