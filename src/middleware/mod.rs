/// Middleware module
///
/// The access-token gate for protected routes and the per-client rate limit
/// for the credential endpoints.

mod auth_gate;
mod rate_limit;

pub use auth_gate::{AuthGate, AuthenticatedUser};
pub use rate_limit::RateLimit;
