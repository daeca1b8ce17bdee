use async_trait::async_trait;
use chrono::Utc;
use sqlx::{postgres::PgRow, PgPool, Row};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::models::TokenModel;
use super::types::TokenKind;
use crate::shared::AppError;

/// Trait for token store operations
#[async_trait]
pub trait TokenRepository {
    /// Persists a token; a reset-password or verify-email token supersedes the
    /// user's previous active token of the same kind.
    async fn save(&self, token: &TokenModel) -> Result<(), AppError>;
    async fn find(&self, token: &str) -> Result<Option<TokenModel>, AppError>;
    /// Atomically spends an active token of `kind`, returning the record as it
    /// was before revocation. `None` when it is unknown, revoked, expired or of
    /// another kind.
    async fn consume(&self, token: &str, kind: TokenKind) -> Result<Option<TokenModel>, AppError>;
    /// Idempotent: unknown and already revoked tokens are a no-op.
    async fn revoke(&self, token: &str) -> Result<(), AppError>;
    /// Revokes every active token of the user, returning how many were revoked.
    async fn revoke_all(&self, user_id: Uuid) -> Result<u64, AppError>;
    async fn delete_expired(&self) -> Result<u64, AppError>;
}

/// In-memory implementation of TokenRepository for development and testing
pub struct InMemoryTokenRepository {
    tokens: Mutex<HashMap<String, TokenModel>>,
}

impl Default for InMemoryTokenRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTokenRepository {
    pub fn new() -> Self {
        Self {
            tokens: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the number of stored tokens, active or not
    pub fn token_count(&self) -> usize {
        self.tokens.lock().map(|tokens| tokens.len()).unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, TokenModel>>, AppError> {
        self.tokens.lock().map_err(|_| {
            warn!("Token store mutex poisoned");
            AppError::Internal
        })
    }
}

#[async_trait]
impl TokenRepository for InMemoryTokenRepository {
    #[instrument(skip(self, token), fields(kind = %token.kind, user_id = %token.user_id))]
    async fn save(&self, token: &TokenModel) -> Result<(), AppError> {
        debug!("Saving token in memory");

        let mut tokens = self.lock()?;
        if tokens.contains_key(&token.token) {
            warn!("Token already exists in memory");
            return Err(AppError::DatabaseError("Token already exists".to_string()));
        }

        if token.kind.is_single_use() {
            let mut superseded = 0;
            for existing in tokens.values_mut().filter(|t| {
                t.user_id == token.user_id && t.kind == token.kind && !t.revoked
            }) {
                existing.revoked = true;
                superseded += 1;
            }
            debug!(superseded, "Superseded previous single-use tokens");
        }

        tokens.insert(token.token.clone(), token.clone());
        Ok(())
    }

    #[instrument(skip(self, token))]
    async fn find(&self, token: &str) -> Result<Option<TokenModel>, AppError> {
        let tokens = self.lock()?;
        let found = tokens.get(token).cloned();

        match &found {
            Some(t) => debug!(kind = %t.kind, revoked = t.revoked, "Token found in memory"),
            None => debug!("Token not found in memory"),
        }

        Ok(found)
    }

    #[instrument(skip(self, token))]
    async fn consume(&self, token: &str, kind: TokenKind) -> Result<Option<TokenModel>, AppError> {
        let mut tokens = self.lock()?;
        let Some(existing) = tokens.get_mut(token) else {
            debug!("Token not found, nothing to consume");
            return Ok(None);
        };
        if existing.kind != kind || !existing.is_active() {
            debug!(kind = %existing.kind, revoked = existing.revoked, "Token cannot be consumed");
            return Ok(None);
        }

        let consumed = existing.clone();
        existing.revoked = true;
        debug!(kind = %kind, "Token consumed in memory");
        Ok(Some(consumed))
    }

    #[instrument(skip(self, token))]
    async fn revoke(&self, token: &str) -> Result<(), AppError> {
        let mut tokens = self.lock()?;
        match tokens.get_mut(token) {
            Some(existing) if !existing.revoked => {
                existing.revoked = true;
                debug!(kind = %existing.kind, "Token revoked in memory");
            }
            Some(_) => debug!("Token already revoked"),
            None => debug!("Token not found, nothing to revoke"),
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn revoke_all(&self, user_id: Uuid) -> Result<u64, AppError> {
        let mut tokens = self.lock()?;
        let mut revoked = 0u64;
        for token in tokens
            .values_mut()
            .filter(|t| t.user_id == user_id && !t.revoked)
        {
            token.revoked = true;
            revoked += 1;
        }

        debug!(revoked, "Revoked all tokens for user in memory");
        Ok(revoked)
    }

    #[instrument(skip(self))]
    async fn delete_expired(&self) -> Result<u64, AppError> {
        let mut tokens = self.lock()?;
        let now = Utc::now();
        let initial_count = tokens.len();

        tokens.retain(|_, token| token.expires_at > now);

        let removed = (initial_count - tokens.len()) as u64;
        debug!(expired_tokens_removed = removed, "Expired tokens removed from memory");
        Ok(removed)
    }
}

/// PostgreSQL implementation of the token store
pub struct PostgresTokenRepository {
    pool: PgPool,
}

impl PostgresTokenRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn from_row(row: &PgRow) -> Result<TokenModel, AppError> {
        let kind: String = row.get("kind");
        let kind = kind
            .parse::<TokenKind>()
            .map_err(|_| AppError::DatabaseError(format!("Unknown token kind '{}'", kind)))?;

        Ok(TokenModel {
            id: row.get("id"),
            token: row.get("token"),
            user_id: row.get("user_id"),
            kind,
            expires_at: row.get("expires_at"),
            revoked: row.get("revoked"),
            created_at: row.get("created_at"),
        })
    }
}

#[async_trait]
impl TokenRepository for PostgresTokenRepository {
    #[instrument(skip(self, token), fields(kind = %token.kind, user_id = %token.user_id))]
    async fn save(&self, token: &TokenModel) -> Result<(), AppError> {
        debug!("Saving token in database");

        let mut tx = self.pool.begin().await.map_err(|e| {
            warn!(error = %e, "Failed to open transaction");
            AppError::DatabaseError(e.to_string())
        })?;

        if token.kind.is_single_use() {
            sqlx::query(
                "UPDATE tokens SET revoked = TRUE WHERE user_id = $1 AND kind = $2 AND revoked = FALSE",
            )
            .bind(token.user_id)
            .bind(token.kind.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to supersede previous tokens");
                AppError::DatabaseError(e.to_string())
            })?;
        }

        sqlx::query(
            "INSERT INTO tokens (id, token, user_id, kind, expires_at, revoked, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(token.id)
        .bind(&token.token)
        .bind(token.user_id)
        .bind(token.kind.as_str())
        .bind(token.expires_at)
        .bind(token.revoked)
        .bind(token.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to insert token");
            AppError::DatabaseError(e.to_string())
        })?;

        tx.commit().await.map_err(|e| {
            warn!(error = %e, "Failed to commit token transaction");
            AppError::DatabaseError(e.to_string())
        })?;

        debug!("Token saved in database");
        Ok(())
    }

    #[instrument(skip(self, token))]
    async fn find(&self, token: &str) -> Result<Option<TokenModel>, AppError> {
        let row = sqlx::query(
            "SELECT id, token, user_id, kind, expires_at, revoked, created_at FROM tokens WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to fetch token from database");
            AppError::DatabaseError(e.to_string())
        })?;

        row.as_ref().map(Self::from_row).transpose()
    }

    #[instrument(skip(self, token))]
    async fn consume(&self, token: &str, kind: TokenKind) -> Result<Option<TokenModel>, AppError> {
        let row = sqlx::query(
            "UPDATE tokens SET revoked = TRUE WHERE token = $1 AND kind = $2 AND revoked = FALSE AND expires_at > $3 RETURNING id, token, user_id, kind, expires_at, revoked, created_at",
        )
        .bind(token)
        .bind(kind.as_str())
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to consume token");
            AppError::DatabaseError(e.to_string())
        })?;

        let Some(row) = row else {
            debug!(kind = %kind, "No active token to consume");
            return Ok(None);
        };
        let mut consumed = Self::from_row(&row)?;
        consumed.revoked = false;
        Ok(Some(consumed))
    }

    #[instrument(skip(self, token))]
    async fn revoke(&self, token: &str) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE tokens SET revoked = TRUE WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to revoke token");
                AppError::DatabaseError(e.to_string())
            })?;

        debug!(rows = result.rows_affected(), "Token revocation applied");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn revoke_all(&self, user_id: Uuid) -> Result<u64, AppError> {
        let result =
            sqlx::query("UPDATE tokens SET revoked = TRUE WHERE user_id = $1 AND revoked = FALSE")
                .bind(user_id)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    warn!(error = %e, "Failed to revoke user tokens");
                    AppError::DatabaseError(e.to_string())
                })?;

        Ok(result.rows_affected())
    }

    #[instrument(skip(self))]
    async fn delete_expired(&self) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM tokens WHERE expires_at < $1")
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to delete expired tokens");
                AppError::DatabaseError(e.to_string())
            })?;

        let removed = result.rows_affected();
        debug!(expired_tokens_removed = removed, "Expired tokens removed");
        Ok(removed)
    }
}
