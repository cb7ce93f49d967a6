use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};

use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new().route("/", post(upsert_articles).get(list_articles))
}

pub async fn upsert_articles(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::UpsertArticlesRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::rejection_to_response(rejection),
    };
    let articles = match body.into_articles() {
        Ok(a) => a,
        Err(msg) => return errors::json_error(StatusCode::BAD_REQUEST, errors::INVALID_BODY, msg),
    };

    let ctx = services.request_context();
    match services.warehouse().upsert_articles(&ctx, &articles).await {
        Ok(()) => StatusCode::CREATED.into_response(),
        Err(e) => errors::warehouse_error_to_response(e),
    }
}

pub async fn list_articles(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    let ctx = services.request_context();
    match services.warehouse().list_articles(&ctx).await {
        Ok(articles) => Json(dto::ArticlesResponse {
            inventory: articles.into_iter().map(Into::into).collect(),
        })
        .into_response(),
        Err(e) => errors::warehouse_error_to_response(e),
    }
}
