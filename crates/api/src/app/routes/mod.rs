use axum::Router;

pub mod articles;
pub mod products;
pub mod system;

/// Router for the warehouse endpoints.
pub fn router() -> Router {
    Router::new()
        .nest("/articles", articles::router())
        .nest("/products", products::router())
}
