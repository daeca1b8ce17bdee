use axum::{
    extract::{DefaultBodyLimit, OriginalUri},
    http::{
        header::{ACCEPT, ACCEPT_LANGUAGE, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use std::any::Any;
use tower_http::{
    catch_panic::CatchPanicLayer, cors::CorsLayer, services::ServeDir, trace::TraceLayer,
};
use tracing::{error, info, warn};

use crate::auth::auth_routes;
use crate::config::AppConfig;
use crate::i18n::localize_errors;
use crate::middleware::{limit_failed_requests, with_security_headers};
use crate::shared::{AppError, AppState};

/// Default limit for JSON bodies
pub const JSON_BODY_LIMIT: usize = 10 * 1024;

/// Builds the full HTTP application around the shared state
pub fn build_router(state: AppState) -> Router {
    let mut api = Router::new().nest("/auth", auth_routes(state.clone()));
    if state.config.environment.is_production() {
        info!("Enabling failed-request rate limiting on /api");
        api = api.layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            limit_failed_requests,
        ));
    }

    let router = Router::new()
        .route("/health", get(health))
        .nest("/api", api)
        .nest_service("/uploads", ServeDir::new(&state.config.upload_dir))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(JSON_BODY_LIMIT))
        .layer(cors_layer(&state.config));

    with_security_headers(router)
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(middleware::from_fn(localize_errors))
        .with_state(state)
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::PUT,
            Method::POST,
            Method::DELETE,
            Method::PATCH,
        ])
        .allow_headers([CONTENT_TYPE, ACCEPT, ACCEPT_LANGUAGE, AUTHORIZATION]);

    match HeaderValue::from_str(&config.cors_origin) {
        Ok(origin) => layer.allow_origin(origin),
        Err(_) => {
            warn!(origin = %config.cors_origin, "Invalid CORS origin, cross-origin requests disabled");
            layer
        }
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn not_found(OriginalUri(uri): OriginalUri) -> AppError {
    AppError::NotFound(format!("Can't find {} on this server!", uri))
}

fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(panic = %detail, "Handler panicked");

    AppError::Internal.into_response()
}
