use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tracing::error;

use crate::auth::AuthService;
use crate::config::AppConfig;
use crate::mail::Mailer;
use crate::middleware::RateLimiter;
use crate::token::{TokenIssuer, TokenRepository, TokenService};
use crate::upload::FileStore;
use crate::user::{repository::UserRepository, PasswordHasher};

/// Shared application state containing all dependencies
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub user_repository: Arc<dyn UserRepository + Send + Sync>,
    pub token_service: Arc<TokenService>,
    pub auth_service: Arc<AuthService>,
    pub rate_limiter: RateLimiter,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        user_repository: Arc<dyn UserRepository + Send + Sync>,
        token_repository: Arc<dyn TokenRepository + Send + Sync>,
        mailer: Arc<dyn Mailer>,
        file_store: Arc<dyn FileStore>,
    ) -> Self {
        let config = Arc::new(config);
        let issuer = TokenIssuer::new(config.tokens.clone());
        let token_service = Arc::new(TokenService::new(issuer, token_repository));
        let auth_service = Arc::new(AuthService::new(
            Arc::clone(&user_repository),
            Arc::clone(&token_service),
            mailer,
            file_store,
            PasswordHasher::new(config.bcrypt_cost),
            config.client_url.clone(),
        ));
        let rate_limiter = RateLimiter::new(config.rate_limit.clone());

        Self {
            config,
            user_repository,
            token_service,
            auth_service,
            rate_limiter,
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Too many requests: {0}")]
    TooManyRequests(String),

    #[error("JWT error: {0}")]
    JwtError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Internal server error")]
    Internal,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthenticated(_) | AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::JwtError(_)
            | AppError::DatabaseError(_)
            | AppError::StorageError(_)
            | AppError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match self {
            AppError::Unauthenticated(msg)
            | AppError::Unauthorized(msg)
            | AppError::Conflict(msg)
            | AppError::BadRequest(msg)
            | AppError::NotFound(msg)
            | AppError::TooManyRequests(msg) => msg,
            internal => {
                // Details stay in the logs
                error!(error = %internal, "Request failed with internal error");
                "Something went wrong!".to_string()
            }
        };

        let body = Json(json!({
            "status": status.as_u16(),
            "message": &message
        }));

        let mut response = (status, body).into_response();
        response.extensions_mut().insert(ErrorMessage(message));
        response
    }
}

/// The client-facing message of an error response, kept on the response so
/// outer layers can localize it
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorMessage(pub String);

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| match &e.message {
                    Some(message) => format!("{}: {}", field, message),
                    None => format!("{}: invalid {}", field, e.code),
                })
            })
            .collect();
        messages.sort();

        AppError::BadRequest(messages.join("; "))
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct EmailForm {
        #[validate(email(message = "must be a valid email"))]
        email: String,
    }

    #[tokio::test]
    async fn test_internal_errors_do_not_leak_details() {
        let response =
            AppError::DatabaseError("connection refused on 10.0.0.3".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.extensions().get::<ErrorMessage>(),
            Some(&ErrorMessage("Something went wrong!".to_string()))
        );

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(!text.contains("10.0.0.3"));
        assert!(text.contains("Something went wrong"));
    }

    #[tokio::test]
    async fn test_client_errors_keep_message_and_status() {
        let response = AppError::Conflict("Email already taken".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], 409);
        assert_eq!(json["message"], "Email already taken");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::Unauthenticated(String::new()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::Unauthorized(String::new()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::BadRequest(String::new()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::NotFound(String::new()).status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_validation_errors_become_bad_request() {
        let form = EmailForm {
            email: "not-an-email".to_string(),
        };
        let error: AppError = form.validate().unwrap_err().into();
        match error {
            AppError::BadRequest(msg) => assert_eq!(msg, "email: must be a valid email"),
            other => panic!("Expected BadRequest, got {:?}", other),
        }
    }
}
