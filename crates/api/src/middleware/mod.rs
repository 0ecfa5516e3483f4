//! HTTP middleware stack for the API.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Security headers
//! 5. CORS
//! 6. Rate limiting (governor) on auth and cart routes
//!
//! Authentication is done per handler with the [`RequireAuth`] and
//! [`RequireAdmin`] extractors.

pub mod auth;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;

pub use auth::{RequireAdmin, RequireAuth};
pub use rate_limit::{api_rate_limiter, auth_rate_limiter};
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
