// Request pipeline pieces shared by every route
pub use rate_limit::{limit_failed_requests, RateLimiter};
pub use sanitize::{escape_html, sanitize_text};
pub use security::with_security_headers;

mod rate_limit;
mod sanitize;
mod security;
