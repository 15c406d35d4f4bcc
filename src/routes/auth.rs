/// Authentication Routes
///
/// Register, login, refresh, logout and the current-user probe. Tokens only
/// ever travel in the `accessToken` / `refreshToken` cookies; response bodies
/// carry the public user view at most.

use actix_web::{web, HttpRequest, HttpResponse, HttpResponseBuilder};
use serde::Deserialize;
use serde_json::json;

use crate::auth::{removal_cookies, session_cookies, SessionManager, TokenPair, REFRESH_COOKIE};
use crate::configuration::ApplicationSettings;
use crate::error::{AppError, ErrorContext};
use crate::middleware::AuthenticatedUser;
use crate::models::PublicUser;
use crate::validators::{is_valid_email, is_valid_name, is_valid_password, require_password};

/// Missing fields deserialize as empty and fail validation as "required".
#[derive(Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

fn with_session(
    mut builder: HttpResponseBuilder,
    pair: &TokenPair,
    secure: bool,
) -> HttpResponseBuilder {
    for cookie in session_cookies(pair, secure) {
        builder.cookie(cookie);
    }
    builder
}

/// POST /api/auth/register
///
/// # Errors
/// - 400: a field is missing or invalid, or the email is already registered
pub async fn register(
    form: web::Json<RegisterRequest>,
    sessions: web::Data<SessionManager>,
    app: web::Data<ApplicationSettings>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_registration");
    let RegisterRequest {
        name,
        email,
        password,
    } = form.into_inner();

    let name = is_valid_name(&name)?;
    let email = is_valid_email(&email)?;
    is_valid_password(&password)?;

    let (user, pair) = sessions
        .register(name, email, password)
        .await
        .map_err(|e| {
            context.log_error(&e);
            e
        })?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %user.id,
        "User registered successfully"
    );

    Ok(
        with_session(HttpResponse::Created(), &pair, app.secure_cookies).json(json!({
            "message": "User registered successfully",
            "user": PublicUser::from(&user),
        })),
    )
}

/// POST /api/auth/login
///
/// # Errors
/// - 400: missing fields, or invalid credentials (same response whether
///   the email is unknown or the password is wrong)
pub async fn login(
    form: web::Json<LoginRequest>,
    sessions: web::Data<SessionManager>,
    app: web::Data<ApplicationSettings>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_login");
    let LoginRequest { email, password } = form.into_inner();

    let email = is_valid_email(&email)?;
    require_password(&password)?;

    let (user, pair) = sessions.login(&email, password).await.map_err(|e| {
        context.log_error(&e);
        e
    })?;

    // Setting a cookie with the same name and path replaces the old one, so
    // the previous session cookies need no separate removal.
    Ok(
        with_session(HttpResponse::Ok(), &pair, app.secure_cookies).json(json!({
            "message": "Login successful",
            "user": PublicUser::from(&user),
        })),
    )
}

/// POST /api/auth/refresh
///
/// # Errors
/// - 401: no refresh cookie, or the token is invalid or expired
/// - 403: the token is no longer the current one for its user
pub async fn refresh(
    req: HttpRequest,
    sessions: web::Data<SessionManager>,
    app: web::Data<ApplicationSettings>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("token_refresh");
    let presented = req.cookie(REFRESH_COOKIE);

    let pair = sessions
        .refresh(presented.as_ref().map(|c| c.value()))
        .await
        .map_err(|e| {
            context.log_error(&e);
            e
        })?;

    Ok(with_session(HttpResponse::Ok(), &pair, app.secure_cookies)
        .json(json!({ "message": "Token refreshed" })))
}

/// POST /api/auth/logout (protected)
pub async fn logout(
    user: web::ReqData<AuthenticatedUser>,
    sessions: web::Data<SessionManager>,
    app: web::Data<ApplicationSettings>,
) -> Result<HttpResponse, AppError> {
    let AuthenticatedUser(user) = user.into_inner();
    let context = ErrorContext::new("user_logout").with_user_id(user.id);

    sessions.logout(user.id).await.map_err(|e| {
        context.log_error(&e);
        e
    })?;

    let mut builder = HttpResponse::Ok();
    for cookie in removal_cookies(app.secure_cookies) {
        builder.cookie(cookie);
    }
    Ok(builder.json(json!({ "message": "Logged out successfully" })))
}

/// GET /api/auth/me (protected)
pub async fn current_user(user: web::ReqData<AuthenticatedUser>) -> HttpResponse {
    HttpResponse::Ok().json(json!({ "user": PublicUser::from(&user.0) }))
}
