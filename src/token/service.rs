use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::{
    issuer::TokenIssuer,
    models::TokenModel,
    repository::TokenRepository,
    types::{AuthTokens, IssuedToken, TokenClaims, TokenKind},
};
use crate::shared::AppError;

/// Issues tokens and keeps the persisted kinds in the token store
pub struct TokenService {
    issuer: TokenIssuer,
    repository: Arc<dyn TokenRepository + Send + Sync>,
}

impl TokenService {
    pub fn new(issuer: TokenIssuer, repository: Arc<dyn TokenRepository + Send + Sync>) -> Self {
        Self { issuer, repository }
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    /// Issues an access + refresh pair; only the refresh token is stored
    pub async fn generate_auth_tokens(&self, user_id: Uuid) -> Result<AuthTokens, AppError> {
        self.generate_auth_tokens_at(user_id, Utc::now()).await
    }

    /// Issues the pair strictly after `changed_at`, so it outlives the
    /// password change that happened at that instant.
    pub async fn generate_auth_tokens_after(
        &self,
        user_id: Uuid,
        changed_at: DateTime<Utc>,
    ) -> Result<AuthTokens, AppError> {
        let issued_at = Utc::now().max(changed_at + Duration::microseconds(1));
        self.generate_auth_tokens_at(user_id, issued_at).await
    }

    #[instrument(skip(self))]
    async fn generate_auth_tokens_at(
        &self,
        user_id: Uuid,
        issued_at: DateTime<Utc>,
    ) -> Result<AuthTokens, AppError> {
        let access = self.issuer.issue_at(user_id, TokenKind::Access, issued_at)?;
        let refresh = self
            .issuer
            .issue_at(user_id, TokenKind::Refresh, issued_at)?;
        self.repository
            .save(&TokenModel::from_issued(&refresh, user_id))
            .await?;

        info!(user_id = %user_id, "Issued access and refresh tokens");
        Ok(AuthTokens { access, refresh })
    }

    /// Issues and stores a refresh, reset-password or verify-email token
    #[instrument(skip(self))]
    pub async fn issue_and_store(
        &self,
        user_id: Uuid,
        kind: TokenKind,
    ) -> Result<IssuedToken, AppError> {
        if !kind.is_persisted() {
            warn!(kind = %kind, "Refusing to store a stateless token kind");
            return Err(AppError::Internal);
        }

        let issued = self.issuer.issue(user_id, kind)?;
        self.repository
            .save(&TokenModel::from_issued(&issued, user_id))
            .await?;

        debug!(user_id = %user_id, kind = %kind, "Stored issued token");
        Ok(issued)
    }

    /// Stateless check used for access tokens
    pub fn verify_access(&self, token: &str) -> Result<TokenClaims, AppError> {
        self.issuer.verify(token, TokenKind::Access)
    }

    /// Verifies signature and kind, then spends the matching store record so
    /// the token cannot be used again. Of concurrent callers presenting the
    /// same token, exactly one succeeds.
    #[instrument(skip(self, token))]
    pub async fn consume_stored(
        &self,
        token: &str,
        kind: TokenKind,
    ) -> Result<TokenClaims, AppError> {
        let claims = self.issuer.verify(token, kind)?;
        let user_id = claims.subject()?;

        let record = self.repository.consume(token, kind).await?.ok_or_else(|| {
            warn!(kind = %kind, "Token missing from store or no longer active");
            AppError::Unauthenticated("Token has been revoked or has expired".to_string())
        })?;

        if record.user_id != user_id {
            warn!(kind = %kind, "Stored token does not match its claims");
            return Err(AppError::Unauthenticated("Token not found".to_string()));
        }

        Ok(claims)
    }

    pub async fn revoke(&self, token: &str) -> Result<(), AppError> {
        self.repository.revoke(token).await
    }

    pub async fn revoke_all(&self, user_id: Uuid) -> Result<u64, AppError> {
        let revoked = self.repository.revoke_all(user_id).await?;
        info!(user_id = %user_id, revoked, "Revoked all tokens for user");
        Ok(revoked)
    }

    #[instrument(skip(self))]
    pub async fn delete_expired(&self) -> Result<u64, AppError> {
        let removed = self.repository.delete_expired().await?;
        info!(removed, "Expired tokens cleanup completed");
        Ok(removed)
    }
}
