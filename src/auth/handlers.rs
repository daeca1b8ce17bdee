use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Extension, Json,
};
use axum_extra::extract::{
    cookie::{Cookie, SameSite},
    CookieJar,
};
use chrono::Utc;
use tracing::{debug, info, instrument};

use super::types::{
    AuthResponse, ChangePasswordRequest, CurrentUser, ForgotPasswordRequest, MessageResponse,
    RefreshRequest, ResetPasswordRequest, SigninRequest, SignupForm, UserResponse,
    VerifyEmailRequest,
};
use crate::i18n::{Locale, Phrase};
use crate::shared::{AppError, AppState};
use crate::token::{AuthTokens, IssuedToken};
use crate::upload::ImageUpload;

pub const ACCESS_COOKIE: &str = "access";
pub const REFRESH_COOKIE: &str = "refresh";

fn token_cookie(name: &'static str, issued: &IssuedToken, secure: bool) -> Cookie<'static> {
    let max_age = (issued.expires_at - Utc::now()).num_seconds().max(0);

    Cookie::build((name, issued.token.clone()))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .secure(secure)
        .max_age(time::Duration::seconds(max_age))
        .build()
}

fn with_auth_cookies(jar: CookieJar, tokens: &AuthTokens, secure: bool) -> CookieJar {
    jar.add(token_cookie(ACCESS_COOKIE, &tokens.access, secure))
        .add(token_cookie(REFRESH_COOKIE, &tokens.refresh, secure))
}

fn without_auth_cookies(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(ACCESS_COOKIE).path("/"))
        .remove(Cookie::build(REFRESH_COOKIE).path("/"))
}

/// POST /api/auth/register (multipart)
#[instrument(name = "register", skip_all)]
pub async fn register(
    State(state): State<AppState>,
    locale: Locale,
    multipart: Multipart,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let form = read_signup_form(multipart).await?;
    let user = state.auth_service.signup(form).await?;

    info!(user_id = %user.id, "Registration completed");
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user: UserResponse::from(&user),
            message: locale.t(Phrase::AccountCreated).to_string(),
        }),
    ))
}

async fn read_signup_form(mut multipart: Multipart) -> Result<SignupForm, AppError> {
    let mut form = SignupForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid form data: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if name == "image" {
            let content_type = field.content_type().unwrap_or_default().to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(format!("Invalid image upload: {}", e)))?;
            // Browsers send an empty part when no file was picked
            if !bytes.is_empty() {
                form.image = Some(ImageUpload {
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| AppError::BadRequest(format!("Invalid form data: {}", e)))?;
        match name.as_str() {
            "name" => form.name = value,
            "email" => form.email = value,
            "password" => form.password = value,
            "passwordConfirmation" => form.password_confirmation = value,
            other => debug!(field = %other, "Ignoring unknown form field"),
        }
    }

    Ok(form)
}

/// POST /api/auth/login
#[instrument(name = "login", skip_all)]
pub async fn login(
    State(state): State<AppState>,
    locale: Locale,
    jar: CookieJar,
    Json(request): Json<SigninRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), AppError> {
    let (user, tokens) = state.auth_service.signin(request).await?;
    let jar = with_auth_cookies(jar, &tokens, state.config.secure_cookies());

    Ok((
        jar,
        Json(AuthResponse {
            user: UserResponse::from(&user),
            message: locale.t(Phrase::SignedIn).to_string(),
        }),
    ))
}

/// POST /api/auth/logout
#[instrument(name = "logout", skip_all)]
pub async fn logout(
    State(state): State<AppState>,
    locale: Locale,
    jar: CookieJar,
) -> Result<(CookieJar, Json<MessageResponse>), AppError> {
    let refresh_token = jar.get(REFRESH_COOKIE).map(|cookie| cookie.value().to_string());
    state.auth_service.logout(refresh_token.as_deref()).await?;

    Ok((
        without_auth_cookies(jar),
        Json(MessageResponse::new(locale.t(Phrase::LoggedOut))),
    ))
}

/// POST /api/auth/tokens
///
/// Candidates are the `refresh` cookie, then a `refreshToken` field in the
/// JSON body. The body token is tried when the cookie token is rejected, so
/// a stale cookie does not shadow a valid body token.
#[instrument(name = "refresh_tokens", skip_all)]
pub async fn refresh_tokens(
    State(state): State<AppState>,
    locale: Locale,
    jar: CookieJar,
    body: Option<Json<RefreshRequest>>,
) -> Result<(CookieJar, Json<AuthResponse>), AppError> {
    let mut candidates: Vec<String> = jar
        .get(REFRESH_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .into_iter()
        .collect();
    if let Some(token) = body.and_then(|Json(request)| request.refresh_token) {
        if !candidates.contains(&token) {
            candidates.push(token);
        }
    }

    let mut outcome = Err(AppError::Unauthenticated("Please authenticate".to_string()));
    for token in &candidates {
        outcome = state.auth_service.refresh_tokens(token).await;
        match &outcome {
            Ok(_) => break,
            Err(e) => debug!(error = %e, "Refresh candidate rejected"),
        }
    }
    let (user, tokens) = outcome?;
    let jar = with_auth_cookies(jar, &tokens, state.config.secure_cookies());

    Ok((
        jar,
        Json(AuthResponse {
            user: UserResponse::from(&user),
            message: locale.t(Phrase::TokensRefreshed).to_string(),
        }),
    ))
}

/// POST /api/auth/forgot-password
#[instrument(name = "forgot_password", skip_all)]
pub async fn forgot_password(
    State(state): State<AppState>,
    locale: Locale,
    Json(request): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state.auth_service.forgot_password(request).await?;
    Ok(Json(MessageResponse::new(
        locale.t(Phrase::ResetPasswordEmailSent),
    )))
}

/// POST /api/auth/reset-password
#[instrument(name = "reset_password", skip_all)]
pub async fn reset_password(
    State(state): State<AppState>,
    locale: Locale,
    jar: CookieJar,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<(CookieJar, Json<MessageResponse>), AppError> {
    state.auth_service.reset_password(request).await?;

    // Every session of the user was revoked
    Ok((
        without_auth_cookies(jar),
        Json(MessageResponse::new(locale.t(Phrase::PasswordReset))),
    ))
}

/// POST /api/auth/verify-email
#[instrument(name = "verify_email", skip_all)]
pub async fn verify_email(
    State(state): State<AppState>,
    locale: Locale,
    Json(request): Json<VerifyEmailRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let user = state.auth_service.verify_email(request).await?;

    Ok(Json(AuthResponse {
        user: UserResponse::from(&user),
        message: locale.t(Phrase::EmailVerified).to_string(),
    }))
}

/// POST /api/auth/send-verification-email (protected)
#[instrument(name = "send_verification_email", skip_all)]
pub async fn send_verification_email(
    State(state): State<AppState>,
    locale: Locale,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<MessageResponse>, AppError> {
    state.auth_service.send_verification_email(&user).await?;
    Ok(Json(MessageResponse::new(
        locale.t(Phrase::VerificationEmailSent),
    )))
}

/// PATCH /api/auth/change-password (protected)
#[instrument(name = "change_password", skip_all)]
pub async fn change_password(
    State(state): State<AppState>,
    locale: Locale,
    jar: CookieJar,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), AppError> {
    let (user, tokens) = state.auth_service.change_password(&user, request).await?;
    let jar = with_auth_cookies(jar, &tokens, state.config.secure_cookies());

    Ok((
        jar,
        Json(AuthResponse {
            user: UserResponse::from(&user),
            message: locale.t(Phrase::PasswordChanged).to_string(),
        }),
    ))
}
