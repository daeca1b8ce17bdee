use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{patch, post},
    Router,
};

use super::{handlers, middleware::protect};
use crate::shared::AppState;

/// Registration carries an optional profile image
pub const REGISTER_BODY_LIMIT: usize = 5 * 1024 * 1024;

/// Routes mounted under `/api/auth`
pub fn auth_routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route(
            "/send-verification-email",
            post(handlers::send_verification_email),
        )
        .route("/change-password", patch(handlers::change_password))
        .route_layer(middleware::from_fn_with_state(state, protect));

    Router::new()
        .route(
            "/register",
            post(handlers::register).layer(DefaultBodyLimit::max(REGISTER_BODY_LIMIT)),
        )
        .route("/login", post(handlers::login))
        .route("/logout", post(handlers::logout))
        .route("/tokens", post(handlers::refresh_tokens))
        .route("/forgot-password", post(handlers::forgot_password))
        .route("/reset-password", post(handlers::reset_password))
        .route("/verify-email", post(handlers::verify_email))
        .merge(protected)
}
