// Public API - what other modules can use
pub use handlers::{ACCESS_COOKIE, REFRESH_COOKIE};
pub use middleware::protect;
pub use routes::{auth_routes, REGISTER_BODY_LIMIT};
pub use service::AuthService;
pub use types::{AuthResponse, CurrentUser, MessageResponse, UserResponse};

// Internal modules
mod handlers;
mod middleware;
mod routes;
pub mod service;
pub mod types;
