//! HTTP surface of the customer-service responder

pub mod chat;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Full application: chat routes plus CORS and request tracing
pub fn app(state: chat::ChatState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    chat::chat_routes(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
