// Library crate for the storefront auth service
// This file exposes the public API for the binary and integration tests

pub mod app;
pub mod auth;
pub mod catalog;
pub mod config;
pub mod i18n;
pub mod mail;
pub mod middleware;
pub mod shared;
pub mod token;
pub mod upload;
pub mod user;

// Re-export commonly used types for easier access in tests
pub use app::build_router;
pub use auth::{AuthService, CurrentUser};
pub use config::{AppConfig, Environment};
pub use mail::{EmailMessage, InMemoryMailer, LogMailer, Mailer};
pub use shared::{AppError, AppState};
pub use token::{InMemoryTokenRepository, TokenKind, TokenRepository, TokenService};
pub use upload::{DiskFileStore, FileStore, InMemoryFileStore};
pub use user::{InMemoryUserRepository, UserModel, UserRepository};
