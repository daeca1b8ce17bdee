use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;
use tracing::{debug, instrument, warn};

use super::handlers::ACCESS_COOKIE;
use super::types::CurrentUser;
use crate::shared::{AppError, AppState};

/// Session guard for protected routes. Reads the `access` cookie, checks the
/// token and its user, then exposes the user as `Extension<CurrentUser>`.
/// Usage: .route_layer(middleware::from_fn_with_state(state.clone(), auth::protect))
#[instrument(skip_all, fields(path = %req.uri().path()))]
pub async fn protect(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = jar.get(ACCESS_COOKIE).map(|cookie| cookie.value()).ok_or_else(|| {
        warn!("Access cookie missing");
        AppError::Unauthenticated("You are not logged in! Please login to get access.".to_string())
    })?;

    let user = state.auth_service.authenticate(token).await.map_err(|e| {
        warn!(error = %e, "Session check failed");
        e
    })?;

    debug!(user_id = %user.id, "Session check passed");
    req.extensions_mut().insert(CurrentUser(user));

    Ok(next.run(req).await)
}
