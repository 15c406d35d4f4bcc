#![allow(dead_code)]

use reqwest::header::{COOKIE, SET_COOKIE};
use serde_json::{json, Value};
use std::net::TcpListener;
use std::sync::Arc;

use spendwise::configuration::{
    ApplicationSettings, AuthSettings, CacheSettings, DatabaseSettings, RateLimitSettings,
    Settings, StorageBackend,
};
use spendwise::startup::run;
use spendwise::store::MemoryStore;

pub struct TestApp {
    pub address: String,
    pub settings: Settings,
    pub client: reqwest::Client,
}

/// Access and refresh token values as set by the server
#[derive(Debug, Clone)]
pub struct Session {
    pub access: String,
    pub refresh: String,
}

pub fn test_settings() -> Settings {
    Settings {
        application: ApplicationSettings {
            host: "127.0.0.1".to_string(),
            port: 0,
            secure_cookies: false,
            storage: StorageBackend::Memory,
        },
        database: DatabaseSettings {
            username: "postgres".to_string(),
            password: "password".to_string(),
            port: 5432,
            host: "localhost".to_string(),
            database_name: "spendwise".to_string(),
        },
        auth: AuthSettings {
            access_secret: "test-access-secret-at-least-32-characters".to_string(),
            refresh_secret: "test-refresh-secret-at-least-32-characters".to_string(),
            issuer: "spendwise-test".to_string(),
            access_token_expiry: 900,
            refresh_token_expiry: 604_800,
            hash_cost: 4,
            atomic_rotation: false,
        },
        rate_limit: RateLimitSettings {
            max_requests: 10_000,
            window_seconds: 900,
        },
        cache: CacheSettings {
            summary_ttl_seconds: 60,
        },
    }
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(test_settings()).await
}

pub async fn spawn_app_with(settings: Settings) -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    let store = Arc::new(MemoryStore::new());
    let server = run(listener, settings.clone(), store.clone(), store)
        .expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address,
        settings,
        client: reqwest::Client::new(),
    }
}

/// Value of the named cookie in the response's `Set-Cookie` headers.
pub fn cookie_value(response: &reqwest::Response, name: &str) -> Option<String> {
    response
        .cookies()
        .find(|c| c.name() == name)
        .map(|c| c.value().to_string())
}

pub fn session_from(response: &reqwest::Response) -> Session {
    Session {
        access: cookie_value(response, "accessToken").expect("accessToken cookie not set"),
        refresh: cookie_value(response, "refreshToken").expect("refreshToken cookie not set"),
    }
}

pub fn set_cookie_headers(response: &reqwest::Response) -> Vec<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn post_register(&self, body: &Value) -> reqwest::Response {
        self.client
            .post(&self.url("/api/auth/register"))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn post_login(&self, body: &Value) -> reqwest::Response {
        self.client
            .post(&self.url("/api/auth/login"))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn post_refresh(&self, refresh_token: Option<&str>) -> reqwest::Response {
        let mut request = self.client.post(&self.url("/api/auth/refresh"));
        if let Some(token) = refresh_token {
            request = request.header(COOKIE, format!("refreshToken={}", token));
        }
        request.send().await.expect("Failed to execute request.")
    }

    pub async fn post_logout(&self, access_token: Option<&str>) -> reqwest::Response {
        let mut request = self.client.post(&self.url("/api/auth/logout"));
        if let Some(token) = access_token {
            request = request.header(COOKIE, format!("accessToken={}", token));
        }
        request.send().await.expect("Failed to execute request.")
    }

    pub async fn get_me(&self, access_token: Option<&str>) -> reqwest::Response {
        let mut request = self.client.get(&self.url("/api/auth/me"));
        if let Some(token) = access_token {
            request = request.header(COOKIE, format!("accessToken={}", token));
        }
        request.send().await.expect("Failed to execute request.")
    }

    /// Request builder with the access cookie attached.
    pub fn authed(
        &self,
        method: reqwest::Method,
        path: &str,
        access_token: &str,
    ) -> reqwest::RequestBuilder {
        self.client
            .request(method, &self.url(path))
            .header(COOKIE, format!("accessToken={}", access_token))
    }

    /// Register a user and return the session cookies and the user id.
    pub async fn register_user(&self, email: &str) -> (Session, uuid::Uuid) {
        let response = self
            .post_register(&json!({
                "name": "Test User",
                "email": email,
                "password": "password123"
            }))
            .await;
        assert_eq!(201, response.status().as_u16());

        let session = session_from(&response);
        let body: Value = response.json().await.expect("Failed to parse response");
        let id = body["user"]["id"].as_str().expect("user id missing");
        (session, uuid::Uuid::parse_str(id).expect("user id is not a uuid"))
    }
}
