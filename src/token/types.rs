use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};
use uuid::Uuid;

use crate::shared::AppError;

/// Kind of credential, fixed at issuance and checked on every verification
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum TokenKind {
    Access,
    Refresh,
    ResetPassword,
    VerifyEmail,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
            TokenKind::ResetPassword => "resetPassword",
            TokenKind::VerifyEmail => "verifyEmail",
        }
    }

    /// Access tokens are stateless; every other kind is kept in the token store
    pub fn is_persisted(&self) -> bool {
        !matches!(self, TokenKind::Access)
    }

    /// Only one active token of these kinds may exist per user
    pub fn is_single_use(&self) -> bool {
        matches!(self, TokenKind::ResetPassword | TokenKind::VerifyEmail)
    }
}

/// JWT claims carried by every token kind
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenClaims {
    pub sub: String,
    pub kind: TokenKind,
    pub jti: String,
    pub iat: i64, // Issued at, seconds (standard JWT claim)
    pub iat_us: i64, // Issued at, microseconds
    pub exp: i64, // Expiration, seconds (standard JWT claim)
}

impl TokenClaims {
    pub fn subject(&self) -> Result<Uuid, AppError> {
        Uuid::parse_str(&self.sub)
            .map_err(|_| AppError::Unauthenticated("Invalid token subject".to_string()))
    }

    /// Microsecond-precision issue time, the resolution password change times
    /// are stored at
    pub fn issued_at(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp_micros(self.iat_us).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// A freshly signed token together with its decoded claims
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: TokenClaims,
    pub expires_at: DateTime<Utc>,
}

/// Access and refresh pair returned on signin, refresh and password change
#[derive(Debug, Clone)]
pub struct AuthTokens {
    pub access: IssuedToken,
    pub refresh: IssuedToken,
}
