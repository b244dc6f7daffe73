use axum::http::{header, Method};
use tower_http::cors::{Any, CorsLayer};

/// A layer attaching CORS headers to all responses.
/// Any origin may read from the API.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::ACCEPT, header::CONTENT_TYPE, header::ORIGIN])
}
