use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::types::{IssuedToken, TokenClaims, TokenKind};
use crate::config::TokenSettings;
use crate::shared::AppError;

/// Signs and verifies JWTs for every token kind
#[derive(Clone)]
pub struct TokenIssuer {
    settings: TokenSettings,
}

impl TokenIssuer {
    pub fn new(settings: TokenSettings) -> Self {
        Self { settings }
    }

    pub fn lifetime(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.settings.access_ttl,
            TokenKind::Refresh => self.settings.refresh_ttl,
            TokenKind::ResetPassword => self.settings.reset_password_ttl,
            TokenKind::VerifyEmail => self.settings.verify_email_ttl,
        }
    }

    pub fn issue(&self, subject: Uuid, kind: TokenKind) -> Result<IssuedToken, AppError> {
        self.issue_at(subject, kind, Utc::now())
    }

    /// Creates a token as if it had been issued at `issued_at`
    #[instrument(skip(self))]
    pub fn issue_at(
        &self,
        subject: Uuid,
        kind: TokenKind,
        issued_at: DateTime<Utc>,
    ) -> Result<IssuedToken, AppError> {
        let expires_at = issued_at + self.lifetime(kind);

        let claims = TokenClaims {
            sub: subject.to_string(),
            kind,
            jti: Uuid::new_v4().to_string(),
            iat: issued_at.timestamp(),
            iat_us: issued_at.timestamp_micros(),
            exp: expires_at.timestamp(),
        };

        debug!(
            kind = %kind,
            exp_timestamp = claims.exp,
            "Signing token"
        );

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.settings.secret.as_bytes()),
        )
        .map_err(|e| {
            debug!(error = %e, "Failed to encode JWT token");
            AppError::JwtError(e.to_string())
        })?;

        Ok(IssuedToken {
            token,
            claims,
            expires_at,
        })
    }

    /// Checks signature, expiry and kind, returning the claims on success
    #[instrument(skip(self, token))]
    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<TokenClaims, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let claims = decode::<TokenClaims>(
            token,
            &DecodingKey::from_secret(self.settings.secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| {
            debug!(error = %e, "Failed to decode JWT token");
            match e.kind() {
                ErrorKind::ExpiredSignature => {
                    AppError::Unauthenticated("Token has expired".to_string())
                }
                _ => AppError::Unauthenticated("Invalid token".to_string()),
            }
        })?;

        if claims.kind != kind {
            debug!(expected = %kind, actual = %claims.kind, "Token kind mismatch");
            return Err(AppError::Unauthenticated("Invalid token".to_string()));
        }

        Ok(claims)
    }
}
