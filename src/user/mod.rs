// Public API - what other modules can use
pub use models::UserModel;
pub use password::{validate_password_strength, PasswordHasher};
pub use repository::{InMemoryUserRepository, PostgresUserRepository, UserRepository};

// Internal modules
pub mod models;
pub mod password;
pub mod repository;
