use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::types::{IssuedToken, TokenKind};

/// Stored record of a refresh, reset-password or verify-email token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenModel {
    pub id: Uuid,
    pub token: String,
    pub user_id: Uuid,
    pub kind: TokenKind,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
}

impl TokenModel {
    pub fn new(token: String, user_id: Uuid, kind: TokenKind, expires_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            token,
            user_id,
            kind,
            expires_at,
            revoked: false,
            created_at: Utc::now(),
        }
    }

    pub fn from_issued(issued: &IssuedToken, user_id: Uuid) -> Self {
        Self::new(
            issued.token.clone(),
            user_id,
            issued.claims.kind,
            issued.expires_at,
        )
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    pub fn is_active(&self) -> bool {
        !self.revoked && !self.is_expired()
    }
}
