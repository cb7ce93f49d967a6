use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use warehouse_infra::WarehouseError;

/// Request body is not valid JSON for the endpoint.
pub const UNMARSHAL_REQUEST: &str = "E001";
/// Request parsed but carries invalid values.
pub const INVALID_BODY: &str = "E002";
/// The store failed or the request was interrupted.
pub const DATABASE_FAILURE: &str = "E003";
pub const RESOURCE_NOT_FOUND: &str = "E005";
pub const RESOURCE_FINISHED: &str = "E006";

pub fn warehouse_error_to_response(err: WarehouseError) -> axum::response::Response {
    let (status, code) = match &err {
        WarehouseError::ArticleNotFound(_) | WarehouseError::ProductNotFound(_) => {
            (StatusCode::NOT_FOUND, RESOURCE_NOT_FOUND)
        }
        WarehouseError::ProductStockFinished(_) => (StatusCode::BAD_REQUEST, RESOURCE_FINISHED),
        WarehouseError::Validation(_) => (StatusCode::BAD_REQUEST, INVALID_BODY),
        WarehouseError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, DATABASE_FAILURE),
        WarehouseError::Cancelled(_) => (StatusCode::SERVICE_UNAVAILABLE, DATABASE_FAILURE),
        WarehouseError::DeadlineExceeded(_) => (StatusCode::GATEWAY_TIMEOUT, DATABASE_FAILURE),
    };
    json_error(status, code, err.to_string())
}

pub fn rejection_to_response(rejection: JsonRejection) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, UNMARSHAL_REQUEST, rejection.body_text())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    let message = message.into();
    tracing::warn!(status = status.as_u16(), error_code = code, %message, "request failed");
    (
        status,
        axum::Json(json!({
            "errorCode": code,
            "message": message,
        })),
    )
        .into_response()
}
