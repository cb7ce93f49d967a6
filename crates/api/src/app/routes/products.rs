use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};

use warehouse_core::ProductId;

use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", post(upsert_products).get(list_products))
        .route("/sell", post(sell_product))
}

pub async fn upsert_products(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::UpsertProductsRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::rejection_to_response(rejection),
    };
    let products = match body.into_products() {
        Ok(p) => p,
        Err(msg) => return errors::json_error(StatusCode::BAD_REQUEST, errors::INVALID_BODY, msg),
    };

    let ctx = services.request_context();
    match services.warehouse().upsert_products(&ctx, &products).await {
        Ok(()) => StatusCode::CREATED.into_response(),
        Err(e) => errors::warehouse_error_to_response(e),
    }
}

pub async fn list_products(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    let ctx = services.request_context();
    match services.warehouse().list_products_with_stock(&ctx).await {
        Ok(products) => Json(dto::ProductsResponse {
            products: products.into_iter().map(Into::into).collect(),
        })
        .into_response(),
        Err(e) => errors::warehouse_error_to_response(e),
    }
}

pub async fn sell_product(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::SellProductRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::rejection_to_response(rejection),
    };
    let product_id: ProductId = match body.product_id.parse() {
        Ok(id) => id,
        Err(e) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                errors::INVALID_BODY,
                format!("productId: {e}"),
            );
        }
    };

    let ctx = services.request_context();
    match services.warehouse().sell_product(&ctx, &product_id).await {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::warehouse_error_to_response(e),
    }
}
