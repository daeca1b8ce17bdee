use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const DEFAULT_ROLE: &str = "user";

/// Database model for users table
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct UserModel {
    pub id: Uuid,
    pub name: String,
    pub email: String, // Stored lowercased
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub profile_image: Option<String>,
    pub profile_image_id: Option<String>,
    pub is_email_verified: bool,
    pub password_changed_at: Option<DateTime<Utc>>, // Unset until the first password change
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserModel {
    pub fn new(name: String, email: &str, password_hash: String) -> Self {
        let now = Utc::now();

        Self {
            id: Uuid::new_v4(),
            name,
            email: normalize_email(email),
            password_hash,
            role: DEFAULT_ROLE.to_string(),
            profile_image: None,
            profile_image_id: None,
            is_email_verified: false,
            password_changed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// True when a token issued at `issued_at` predates the last password
    /// change. Both sides are microsecond timestamps; a token stamped in the
    /// same microsecond as the change counts as older than it.
    pub fn changed_password_after(&self, issued_at: DateTime<Utc>) -> bool {
        match self.password_changed_at {
            Some(changed_at) => changed_at.timestamp_micros() >= issued_at.timestamp_micros(),
            None => false,
        }
    }

    /// Replaces the password hash and stamps the change time
    pub fn set_password_hash(&mut self, password_hash: String) {
        let now = password_change_time();
        self.password_hash = password_hash;
        self.password_changed_at = Some(now);
        self.updated_at = now;
    }

    pub fn mark_email_verified(&mut self) {
        self.is_email_verified = true;
        self.updated_at = Utc::now();
    }

    pub fn set_profile_image(&mut self, url: String, id: String) {
        self.profile_image = Some(url);
        self.profile_image_id = Some(id);
        self.updated_at = Utc::now();
    }
}

/// Current time truncated to microseconds, the precision Postgres keeps
pub fn password_change_time() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
