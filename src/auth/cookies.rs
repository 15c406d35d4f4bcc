use actix_web::cookie::{time::Duration, Cookie, SameSite};

use crate::auth::session::TokenPair;

pub const ACCESS_COOKIE: &str = "accessToken";
pub const REFRESH_COOKIE: &str = "refreshToken";

fn session_cookie(
    name: &'static str,
    value: String,
    max_age_seconds: i64,
    secure: bool,
) -> Cookie<'static> {
    Cookie::build(name, value)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(secure)
        .max_age(Duration::seconds(max_age_seconds))
        .finish()
}

/// Both session cookies for a freshly minted pair.
pub fn session_cookies(pair: &TokenPair, secure: bool) -> [Cookie<'static>; 2] {
    [
        session_cookie(
            ACCESS_COOKIE,
            pair.access_token.clone(),
            pair.access_ttl_seconds,
            secure,
        ),
        session_cookie(
            REFRESH_COOKIE,
            pair.refresh_token.clone(),
            pair.refresh_ttl_seconds,
            secure,
        ),
    ]
}

/// Expired, empty copies of both cookies.
pub fn removal_cookies(secure: bool) -> [Cookie<'static>; 2] {
    [ACCESS_COOKIE, REFRESH_COOKIE].map(|name| {
        let mut cookie = session_cookie(name, String::new(), 0, secure);
        cookie.make_removal();
        cookie
    })
}
