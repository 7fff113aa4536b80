use axum::http::HeaderValue;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::require_upload_token;
use crate::orders::validation::{MAX_FILES, MAX_FILE_SIZE_BYTES};
use crate::rate_limit::limit_uploads;
use crate::state::AppState;

pub mod catalog;
pub mod health;
pub mod orders;
pub mod uploads;

/// Room for ten maximal files plus the text fields and multipart framing.
const MAX_UPLOAD_BODY_BYTES: usize = MAX_FILES * MAX_FILE_SIZE_BYTES + 1024 * 1024;

pub fn create_router(state: AppState) -> Router<()> {
    let allow_origin = match state.config.cors_allowed_origin.as_ref() {
        Some(origins) => {
            let headers: Vec<HeaderValue> = origins
                .split(',')
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .filter_map(|value| match value.parse::<HeaderValue>() {
                    Ok(header) => Some(header),
                    Err(_) => {
                        tracing::warn!(origin = %value, "ignoring invalid CORS origin");
                        None
                    }
                })
                .collect();
            AllowOrigin::list(headers)
        }
        None => AllowOrigin::mirror_request(),
    };
    let cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request());

    let upload_routes = Router::new()
        .route("/api/upload", post(uploads::upload_order))
        .route_layer(middleware::from_fn_with_state(state.clone(), limit_uploads))
        // Outermost: unauthenticated requests never reach the limiter.
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_upload_token,
        ))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BODY_BYTES));

    Router::new()
        .merge(upload_routes)
        .route("/health", get(health::health_check))
        .route("/api/product-types", get(catalog::product_types))
        .route("/api/status/:order_id", get(orders::order_status))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
