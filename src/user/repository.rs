use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::models::{normalize_email, password_change_time, UserModel};
use crate::shared::AppError;

/// Trait for user repository operations
#[async_trait]
pub trait UserRepository {
    /// Fails with `Conflict` when the email is already registered
    async fn create_user(&self, user: &UserModel) -> Result<(), AppError>;
    async fn get_user(&self, user_id: Uuid) -> Result<Option<UserModel>, AppError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<UserModel>, AppError>;
    /// Replaces only the password hash and change time, returning the updated
    /// record. Fails with `NotFound` for an unknown id.
    async fn update_password(
        &self,
        user_id: Uuid,
        password_hash: String,
    ) -> Result<UserModel, AppError>;
    /// Sets only the verified flag, returning the updated record
    async fn set_email_verified(&self, user_id: Uuid) -> Result<UserModel, AppError>;
}

/// In-memory implementation of UserRepository for development and testing
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<Uuid, UserModel>>,
}

impl Default for InMemoryUserRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
        }
    }

    pub async fn user_count(&self) -> usize {
        self.users.read().await.len()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    async fn create_user(&self, user: &UserModel) -> Result<(), AppError> {
        debug!("Creating user in memory");

        let mut users = self.users.write().await;
        if users.values().any(|existing| existing.email == user.email) {
            warn!("Email already registered");
            return Err(AppError::Conflict("Email already taken".to_string()));
        }
        users.insert(user.id, user.clone());

        debug!("User created in memory");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_user(&self, user_id: Uuid) -> Result<Option<UserModel>, AppError> {
        Ok(self.users.read().await.get(&user_id).cloned())
    }

    #[instrument(skip(self, email))]
    async fn find_by_email(&self, email: &str) -> Result<Option<UserModel>, AppError> {
        let email = normalize_email(email);
        let users = self.users.read().await;

        Ok(users.values().find(|user| user.email == email).cloned())
    }

    #[instrument(skip(self, password_hash))]
    async fn update_password(
        &self,
        user_id: Uuid,
        password_hash: String,
    ) -> Result<UserModel, AppError> {
        let mut users = self.users.write().await;
        let user = users.get_mut(&user_id).ok_or_else(|| {
            warn!("User not found for password update in memory");
            AppError::NotFound("User not found".to_string())
        })?;
        user.set_password_hash(password_hash);

        debug!("Password updated in memory");
        Ok(user.clone())
    }

    #[instrument(skip(self))]
    async fn set_email_verified(&self, user_id: Uuid) -> Result<UserModel, AppError> {
        let mut users = self.users.write().await;
        let user = users.get_mut(&user_id).ok_or_else(|| {
            warn!("User not found for verification in memory");
            AppError::NotFound("User not found".to_string())
        })?;
        user.mark_email_verified();

        debug!("Email marked verified in memory");
        Ok(user.clone())
    }
}

/// PostgreSQL implementation of user repository
pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const USER_COLUMNS: &str = "id, name, email, password_hash, role, profile_image, profile_image_id, is_email_verified, password_changed_at, created_at, updated_at";

fn map_write_error(e: sqlx::Error) -> AppError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            warn!("Email already registered");
            AppError::Conflict("Email already taken".to_string())
        }
        _ => {
            warn!(error = %e, "Failed to write user to database");
            AppError::DatabaseError(e.to_string())
        }
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    async fn create_user(&self, user: &UserModel) -> Result<(), AppError> {
        debug!("Creating user in database");

        sqlx::query(&format!(
            "INSERT INTO users ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
            USER_COLUMNS
        ))
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.role)
        .bind(&user.profile_image)
        .bind(&user.profile_image_id)
        .bind(user.is_email_verified)
        .bind(user.password_changed_at)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        debug!("User created in database");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_user(&self, user_id: Uuid) -> Result<Option<UserModel>, AppError> {
        sqlx::query_as::<_, UserModel>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to fetch user from database");
            AppError::DatabaseError(e.to_string())
        })
    }

    #[instrument(skip(self, email))]
    async fn find_by_email(&self, email: &str) -> Result<Option<UserModel>, AppError> {
        sqlx::query_as::<_, UserModel>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(normalize_email(email))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to fetch user by email");
            AppError::DatabaseError(e.to_string())
        })
    }

    #[instrument(skip(self, password_hash))]
    async fn update_password(
        &self,
        user_id: Uuid,
        password_hash: String,
    ) -> Result<UserModel, AppError> {
        let changed_at = password_change_time();

        sqlx::query_as::<_, UserModel>(&format!(
            "UPDATE users SET password_hash = $2, password_changed_at = $3, updated_at = $3 WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(user_id)
        .bind(password_hash)
        .bind(changed_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_write_error)?
        .ok_or_else(|| {
            warn!("User not found for password update");
            AppError::NotFound("User not found".to_string())
        })
    }

    #[instrument(skip(self))]
    async fn set_email_verified(&self, user_id: Uuid) -> Result<UserModel, AppError> {
        sqlx::query_as::<_, UserModel>(&format!(
            "UPDATE users SET is_email_verified = TRUE, updated_at = $2 WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(user_id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_write_error)?
        .ok_or_else(|| {
            warn!("User not found for verification");
            AppError::NotFound("User not found".to_string())
        })
    }
}
