//! Configuration loaded from the environment.
//!
//! Values come from process environment variables, with a `.env` file read
//! first when present. Anything not set falls back to a development default,
//! except `JWT_SECRET`, which production deployments must provide.

use chrono::Duration;
use std::env;
use std::str::FromStr;
use thiserror::Error;

const DEV_JWT_SECRET: &str = "development-secret-change-in-production";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: String, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "prod" | "production" => Ok(Environment::Production),
            _ => Err(ConfigError::InvalidValue {
                name: "ENVIRONMENT".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Signing secret and lifetimes for every token kind.
#[derive(Debug, Clone)]
pub struct TokenSettings {
    pub secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub reset_password_ttl: Duration,
    pub verify_email_ttl: Duration,
}

impl TokenSettings {
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            ..Self::default()
        }
    }
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            secret: DEV_JWT_SECRET.to_string(),
            access_ttl: Duration::minutes(15),
            refresh_ttl: Duration::days(30),
            reset_password_ttl: Duration::minutes(10),
            verify_email_ttl: Duration::minutes(10),
        }
    }
}

/// Limits for the failed-request rate limiter on `/api`.
#[derive(Debug, Clone)]
pub struct RateLimitSettings {
    pub max_failures: u32,
    pub window: std::time::Duration,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_failures: 20,
            window: std::time::Duration::from_secs(15 * 60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub port: u16,
    /// When unset the server runs on in-memory stores.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub tokens: TokenSettings,
    pub cors_origin: String,
    /// Base URL used for links in outgoing emails.
    pub client_url: String,
    pub upload_dir: String,
    pub rate_limit: RateLimitSettings,
    pub bcrypt_cost: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            port: 3000,
            database_url: None,
            db_max_connections: 5,
            tokens: TokenSettings::default(),
            cors_origin: "http://localhost:3000".to_string(),
            client_url: "http://localhost:3000".to_string(),
            upload_dir: "uploads".to_string(),
            rate_limit: RateLimitSettings::default(),
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let defaults = AppConfig::default();

        let environment = match env::var("ENVIRONMENT") {
            Ok(value) => value.parse()?,
            Err(_) => defaults.environment,
        };

        let secret = match env::var("JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ if environment.is_production() => {
                return Err(ConfigError::MissingEnvVar("JWT_SECRET".to_string()))
            }
            _ => DEV_JWT_SECRET.to_string(),
        };

        let tokens = TokenSettings {
            secret,
            access_ttl: Duration::minutes(parse_var("JWT_ACCESS_EXPIRATION_MINUTES", 15)?),
            refresh_ttl: Duration::days(parse_var("JWT_REFRESH_EXPIRATION_DAYS", 30)?),
            reset_password_ttl: Duration::minutes(parse_var(
                "JWT_RESET_PASSWORD_EXPIRATION_MINUTES",
                10,
            )?),
            verify_email_ttl: Duration::minutes(parse_var(
                "JWT_VERIFY_EMAIL_EXPIRATION_MINUTES",
                10,
            )?),
        };

        let rate_limit = RateLimitSettings {
            max_failures: parse_var("RATE_LIMIT_MAX", defaults.rate_limit.max_failures)?,
            window: std::time::Duration::from_secs(parse_var(
                "RATE_LIMIT_WINDOW_SECONDS",
                defaults.rate_limit.window.as_secs(),
            )?),
        };

        Ok(Self {
            environment,
            port: parse_var("PORT", defaults.port)?,
            database_url: env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
            db_max_connections: parse_var("DB_MAX_CONNECTIONS", defaults.db_max_connections)?,
            tokens,
            cors_origin: env::var("CORS_ORIGIN").unwrap_or(defaults.cors_origin),
            client_url: env::var("CLIENT_URL").unwrap_or(defaults.client_url),
            upload_dir: env::var("UPLOAD_DIR").unwrap_or(defaults.upload_dir),
            rate_limit,
            bcrypt_cost: parse_var("BCRYPT_COST", defaults.bcrypt_cost)?,
        })
    }

    /// Cookies are marked `Secure` in production only.
    pub fn secure_cookies(&self) -> bool {
        self.environment.is_production()
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value.trim().parse().map_err(|_| ConfigError::InvalidValue {
            name: name.to_string(),
            value,
        }),
        Err(_) => Ok(default),
    }
}
