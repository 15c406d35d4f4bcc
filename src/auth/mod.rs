/// Authentication module
///
/// Token minting and verification, password and refresh-token hashing, the
/// session cookies and the session manager that ties them together.

mod claims;
mod cookies;
mod jwt;
mod password;
mod refresh_token;
mod session;

pub use claims::{Claims, TokenClass};
pub use cookies::{removal_cookies, session_cookies, ACCESS_COOKIE, REFRESH_COOKIE};
pub use jwt::TokenCodec;
pub use password::{hash_password, verify_password};
pub use refresh_token::{hash_refresh_token, verify_refresh_token};
pub use session::{SessionManager, TokenPair};
