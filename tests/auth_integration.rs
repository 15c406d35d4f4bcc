mod common;

use chrono::Utc;
use serde_json::{json, Value};

use common::{cookie_value, session_from, set_cookie_headers, spawn_app, spawn_app_with, test_settings};
use spendwise::auth::{TokenClass, TokenCodec};

// --- Registration Tests ---

#[tokio::test]
async fn register_returns_201_and_sets_both_cookies() {
    let app = spawn_app().await;

    let response = app
        .post_register(&json!({
            "name": "T",
            "email": "t@e.com",
            "password": "password123"
        }))
        .await;

    assert_eq!(201, response.status().as_u16());

    let access = response
        .cookies()
        .find(|c| c.name() == "accessToken")
        .expect("accessToken cookie missing");
    assert!(access.http_only());
    assert!(access.same_site_strict());
    assert_eq!(access.path(), Some("/"));
    assert_eq!(access.max_age(), Some(std::time::Duration::from_secs(900)));

    let refresh = response
        .cookies()
        .find(|c| c.name() == "refreshToken")
        .expect("refreshToken cookie missing");
    assert!(refresh.http_only());
    assert!(refresh.same_site_strict());
    assert_eq!(refresh.max_age(), Some(std::time::Duration::from_secs(604_800)));

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["message"], "User registered successfully");
    assert_eq!(body["user"]["name"], "T");
    assert_eq!(body["user"]["email"], "t@e.com");
    assert!(body["user"]["id"].is_string());
}

#[tokio::test]
async fn register_response_never_contains_credentials() {
    let app = spawn_app().await;

    let response = app
        .post_register(&json!({
            "name": "T",
            "email": "t@e.com",
            "password": "password123"
        }))
        .await;
    let text = response.text().await.unwrap();

    assert!(!text.contains("password123"));
    assert!(!text.contains("$2b$"));
    assert!(!text.to_lowercase().contains("password"));
    assert!(!text.contains("refreshToken"));

    let body: Value = serde_json::from_str(&text).unwrap();
    let user = body["user"].as_object().unwrap();
    let mut keys: Vec<&str> = user.keys().map(|k| k.as_str()).collect();
    keys.sort();
    assert_eq!(keys, vec!["email", "id", "name"]);
}

#[tokio::test]
async fn register_normalises_email() {
    let app = spawn_app().await;

    let response = app
        .post_register(&json!({
            "name": "T",
            "email": "  T@E.com ",
            "password": "password123"
        }))
        .await;

    assert_eq!(201, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["user"]["email"], "t@e.com");
}

#[tokio::test]
async fn register_returns_400_for_missing_or_invalid_fields() {
    let app = spawn_app().await;

    let test_cases = vec![
        (json!({"email": "t@e.com", "password": "password123"}), "missing name"),
        (json!({"name": "T", "password": "password123"}), "missing email"),
        (json!({"name": "T", "email": "t@e.com"}), "missing password"),
        (json!({"name": "   ", "email": "t@e.com", "password": "password123"}), "blank name"),
        (json!({"name": "T", "email": "not-an-email", "password": "password123"}), "bad email"),
        (json!({"name": "T", "email": "t@e.com", "password": "12345"}), "short password"),
    ];

    for (body, description) in test_cases {
        let response = app.post_register(&body).await;
        assert_eq!(
            400,
            response.status().as_u16(),
            "register did not fail with 400 for {}",
            description
        );
        assert!(
            cookie_value(&response, "accessToken").is_none(),
            "cookie set for {}",
            description
        );
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["code"], "VALIDATION_ERROR", "{}", description);
    }
}

#[tokio::test]
async fn register_rejects_duplicate_email_regardless_of_case() {
    let app = spawn_app().await;
    app.register_user("t@e.com").await;

    let response = app
        .post_register(&json!({
            "name": "Other",
            "email": "T@E.COM",
            "password": "password456"
        }))
        .await;

    assert_eq!(400, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "DUPLICATE_ENTRY");
    assert_eq!(body["message"], "Email already registered");
}

#[tokio::test]
async fn malformed_json_body_returns_400() {
    let app = spawn_app().await;

    let response = app
        .client
        .post(&app.url("/api/auth/register"))
        .header("Content-Type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();

    assert_eq!(400, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

// --- Login Tests ---

#[tokio::test]
async fn login_returns_200_with_user_and_cookies() {
    let app = spawn_app().await;
    app.register_user("t@e.com").await;

    let response = app
        .post_login(&json!({"email": "t@e.com", "password": "password123"}))
        .await;

    assert_eq!(200, response.status().as_u16());
    let session = session_from(&response);
    assert!(!session.access.is_empty());
    assert!(!session.refresh.is_empty());

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Login successful");
    assert_eq!(body["user"]["email"], "t@e.com");
    assert!(body["user"].get("password").is_none());
}

#[tokio::test]
async fn login_failures_are_indistinguishable() {
    let app = spawn_app().await;
    app.register_user("t@e.com").await;

    let wrong_password = app
        .post_login(&json!({"email": "t@e.com", "password": "wrongpassword"}))
        .await;
    let unknown_email = app
        .post_login(&json!({"email": "nobody@e.com", "password": "password123"}))
        .await;

    assert_eq!(400, wrong_password.status().as_u16());
    assert_eq!(400, unknown_email.status().as_u16());

    let a: Value = wrong_password.json().await.unwrap();
    let b: Value = unknown_email.json().await.unwrap();
    assert_eq!(a["message"], "Invalid credentials");
    assert_eq!(a["message"], b["message"]);
    assert_eq!(a["code"], b["code"]);
}

#[tokio::test]
async fn login_requires_both_fields() {
    let app = spawn_app().await;

    let response = app.post_login(&json!({"email": "t@e.com"})).await;
    assert_eq!(400, response.status().as_u16());

    let response = app.post_login(&json!({"password": "password123"})).await;
    assert_eq!(400, response.status().as_u16());
}

// --- Protected Route Tests ---

#[tokio::test]
async fn register_then_access_protected_route() {
    let app = spawn_app().await;
    let (session, user_id) = app.register_user("t@e.com").await;

    let response = app.get_me(Some(&session.access)).await;
    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["user"]["id"], user_id.to_string());

    let response = app
        .authed(reqwest::Method::GET, "/api/expenses", &session.access)
        .send()
        .await
        .unwrap();
    assert_eq!(200, response.status().as_u16());
}

#[tokio::test]
async fn protected_route_rejects_missing_or_bad_access_token() {
    let app = spawn_app().await;
    let (session, _) = app.register_user("t@e.com").await;

    let response = app.get_me(None).await;
    assert_eq!(401, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Not authenticated");

    let response = app.get_me(Some("garbage")).await;
    assert_eq!(401, response.status().as_u16());

    // A refresh token is not an access token.
    let response = app.get_me(Some(&session.refresh)).await;
    assert_eq!(401, response.status().as_u16());
}

#[tokio::test]
async fn access_token_for_unknown_user_is_rejected() {
    let app = spawn_app().await;
    let codec = TokenCodec::new(&app.settings.auth);
    let token = codec.mint(uuid::Uuid::new_v4(), TokenClass::Access).unwrap();

    let response = app.get_me(Some(&token)).await;
    assert_eq!(401, response.status().as_u16());
}

// --- Refresh Tests ---

#[tokio::test]
async fn expired_access_token_then_refresh_restores_access() {
    let app = spawn_app().await;
    let (session, user_id) = app.register_user("t@e.com").await;

    let codec = TokenCodec::new(&app.settings.auth);
    let sixteen_minutes_ago = Utc::now().timestamp() - 16 * 60;
    let expired = codec
        .mint_at(user_id, TokenClass::Access, sixteen_minutes_ago)
        .unwrap();

    let response = app.get_me(Some(&expired)).await;
    assert_eq!(401, response.status().as_u16());

    let response = app.post_refresh(Some(&session.refresh)).await;
    assert_eq!(200, response.status().as_u16());
    let renewed = session_from(&response);
    assert_ne!(renewed.refresh, session.refresh);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Token refreshed");

    let response = app.get_me(Some(&renewed.access)).await;
    assert_eq!(200, response.status().as_u16());
}

#[tokio::test]
async fn refresh_rotation_invalidates_previous_token() {
    let app = spawn_app().await;
    let (first, _) = app.register_user("t@e.com").await;

    let response = app.post_refresh(Some(&first.refresh)).await;
    assert_eq!(200, response.status().as_u16());
    let second = session_from(&response);

    let replay = app.post_refresh(Some(&first.refresh)).await;
    assert_eq!(403, replay.status().as_u16());
    let body: Value = replay.json().await.unwrap();
    assert_eq!(body["message"], "Invalid refresh token");

    let response = app.post_refresh(Some(&second.refresh)).await;
    assert_eq!(200, response.status().as_u16());
}

#[tokio::test]
async fn second_login_invalidates_first_refresh_token() {
    let app = spawn_app().await;
    app.register_user("t@e.com").await;
    let credentials = json!({"email": "t@e.com", "password": "password123"});

    let first = session_from(&app.post_login(&credentials).await);
    let second = session_from(&app.post_login(&credentials).await);

    let response = app.post_refresh(Some(&first.refresh)).await;
    assert_eq!(403, response.status().as_u16());

    let response = app.post_refresh(Some(&second.refresh)).await;
    assert_eq!(200, response.status().as_u16());
}

#[tokio::test]
async fn refresh_without_cookie_returns_401() {
    let app = spawn_app().await;

    let response = app.post_refresh(None).await;
    assert_eq!(401, response.status().as_u16());
}

#[tokio::test]
async fn refresh_with_invalid_or_wrong_class_token_returns_401() {
    let app = spawn_app().await;
    let (session, _) = app.register_user("t@e.com").await;

    let response = app.post_refresh(Some("not-a-token")).await;
    assert_eq!(401, response.status().as_u16());

    let response = app.post_refresh(Some(&session.access)).await;
    assert_eq!(401, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Invalid or expired token");
}

#[tokio::test]
async fn expired_refresh_token_returns_401() {
    let app = spawn_app().await;
    let (_, user_id) = app.register_user("t@e.com").await;

    let codec = TokenCodec::new(&app.settings.auth);
    let eight_days_ago = Utc::now().timestamp() - 8 * 24 * 60 * 60;
    let expired = codec
        .mint_at(user_id, TokenClass::Refresh, eight_days_ago)
        .unwrap();

    let response = app.post_refresh(Some(&expired)).await;
    assert_eq!(401, response.status().as_u16());
}

#[tokio::test]
async fn forged_but_valid_refresh_token_is_treated_as_reuse() {
    let app = spawn_app().await;
    let (_, user_id) = app.register_user("t@e.com").await;

    // Signed with the right secret but never issued, so it cannot match the
    // stored hash.
    let codec = TokenCodec::new(&app.settings.auth);
    let forged = codec.mint(user_id, TokenClass::Refresh).unwrap();

    let response = app.post_refresh(Some(&forged)).await;
    assert_eq!(403, response.status().as_u16());
}

#[tokio::test]
async fn atomic_rotation_keeps_single_use_semantics() {
    let mut settings = test_settings();
    settings.auth.atomic_rotation = true;
    let app = spawn_app_with(settings).await;
    let (first, _) = app.register_user("t@e.com").await;

    let response = app.post_refresh(Some(&first.refresh)).await;
    assert_eq!(200, response.status().as_u16());
    let second = session_from(&response);

    assert_eq!(403, app.post_refresh(Some(&first.refresh)).await.status().as_u16());
    assert_eq!(200, app.post_refresh(Some(&second.refresh)).await.status().as_u16());
}

// --- Logout Tests ---

#[tokio::test]
async fn logout_requires_authentication() {
    let app = spawn_app().await;

    let response = app.post_logout(None).await;
    assert_eq!(401, response.status().as_u16());
}

#[tokio::test]
async fn logout_clears_cookies_and_stored_session() {
    let app = spawn_app().await;
    let (session, _) = app.register_user("t@e.com").await;

    let response = app.post_logout(Some(&session.access)).await;
    assert_eq!(200, response.status().as_u16());

    let headers = set_cookie_headers(&response);
    for name in ["accessToken", "refreshToken"] {
        let header = headers
            .iter()
            .find(|h| h.starts_with(&format!("{}=", name)))
            .unwrap_or_else(|| panic!("{} not cleared", name));
        assert!(header.starts_with(&format!("{}=;", name)), "{}", header);
        assert!(header.contains("Max-Age=0"), "{}", header);
    }
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Logged out successfully");

    let response = app.post_refresh(Some(&session.refresh)).await;
    assert_eq!(403, response.status().as_u16());
}

#[tokio::test]
async fn logout_twice_is_not_an_error() {
    let app = spawn_app().await;
    let (session, _) = app.register_user("t@e.com").await;

    assert_eq!(200, app.post_logout(Some(&session.access)).await.status().as_u16());
    assert_eq!(200, app.post_logout(Some(&session.access)).await.status().as_u16());
}

// --- Rate Limit and Routing Tests ---

#[tokio::test]
async fn credential_endpoints_are_rate_limited() {
    let mut settings = test_settings();
    settings.rate_limit.max_requests = 3;
    let app = spawn_app_with(settings).await;
    let credentials = json!({"email": "t@e.com", "password": "password123"});

    for _ in 0..3 {
        let response = app.post_login(&credentials).await;
        assert_eq!(400, response.status().as_u16());
    }

    let response = app.post_login(&credentials).await;
    assert_eq!(429, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Too many requests. Please try again later.");

    // The budget is shared by every credential endpoint.
    let response = app.post_refresh(None).await;
    assert_eq!(429, response.status().as_u16());
}

#[tokio::test]
async fn rate_limit_does_not_apply_to_protected_routes() {
    let mut settings = test_settings();
    settings.rate_limit.max_requests = 1;
    let app = spawn_app_with(settings).await;
    let (session, _) = app.register_user("t@e.com").await;

    for _ in 0..5 {
        assert_eq!(200, app.get_me(Some(&session.access)).await.status().as_u16());
    }
}

#[tokio::test]
async fn unknown_route_returns_404_json() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(&app.url("/api/does-not-exist"))
        .send()
        .await
        .unwrap();

    assert_eq!(404, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Route not found");
}
