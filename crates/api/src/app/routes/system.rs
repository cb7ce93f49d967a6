use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::IntoResponse};

use crate::app::errors;
use crate::app::services::AppServices;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// Ready once the store answers.
pub async fn readiness(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    let ctx = services.request_context();
    match services.warehouse().ping(&ctx).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => errors::json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            errors::DATABASE_FAILURE,
            e.to_string(),
        ),
    }
}
