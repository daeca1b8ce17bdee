// Public API - what other modules can use
pub use issuer::TokenIssuer;
pub use models::TokenModel;
pub use repository::{InMemoryTokenRepository, PostgresTokenRepository, TokenRepository};
pub use service::TokenService;
pub use types::{AuthTokens, IssuedToken, TokenClaims, TokenKind};

// Internal modules
mod issuer;
pub mod models;
pub mod repository;
mod service;
mod types;
