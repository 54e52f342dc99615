use reqwest::header::{COOKIE, SET_COOKIE, USER_AGENT};
use serde_json::{json, Value};
use session_gate::auth::hash_password;
use session_gate::configuration::{
    ApplicationSettings, ClientIpSettings, CookieSettings, DatabaseSettings, JwtSettings, Settings,
    TokenCleanupSettings,
};
use session_gate::startup::{run, AuthComponents};
use session_gate::store::{InMemoryStore, TokenStore};
use session_gate::telemetry::init_test_telemetry;
use std::net::TcpListener;
use std::sync::Arc;
use uuid::Uuid;

const EMAIL: &str = "a@x.com";
const PASSWORD: &str = "correct";

pub struct TestApp {
    pub address: String,
    pub store: Arc<InMemoryStore>,
    pub user_id: Uuid,
    pub client: reqwest::Client,
}

impl TestApp {
    async fn post_login(&self, body: &Value) -> reqwest::Response {
        self.client
            .post(&format!("{}/api/auth/login", &self.address))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    async fn post_with_cookie(&self, path: &str, refresh_token: Option<&str>) -> reqwest::Response {
        let mut request = self.client.post(&format!("{}{}", &self.address, path));
        if let Some(token) = refresh_token {
            request = request.header(COOKIE, format!("refresh_token={}", token));
        }
        request.send().await.expect("Failed to execute request.")
    }

    /// Logs in with the seeded user and returns (access token, refresh token)
    async fn login(&self) -> (String, String) {
        let response = self.post_login(&json!({"email": EMAIL, "password": PASSWORD})).await;
        assert_eq!(200, response.status().as_u16());

        let refresh_token = refresh_cookie(&response).expect("refresh cookie");
        let body: Value = response.json().await.expect("Failed to parse response");
        let access_token = body["accessToken"].as_str().expect("access token").to_string();
        (access_token, refresh_token)
    }
}

fn test_settings() -> Settings {
    Settings {
        database: DatabaseSettings {
            username: "unused".to_string(),
            password: "unused".to_string(),
            port: 5432,
            host: "localhost".to_string(),
            database_name: "unused".to_string(),
            max_connections: 1,
        },
        application: ApplicationSettings {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        jwt: JwtSettings {
            secret: "test-secret-key-at-least-32-characters-long".to_string(),
            access_token_expiry: 900,
            refresh_token_expiry: 3600,
            issuer: "test".to_string(),
            bcrypt_cost: 4,
        },
        cookie: CookieSettings::default(),
        client_ip: ClientIpSettings {
            // The test client connects from loopback, acting as the proxy.
            trusted_proxies: vec!["127.0.0.1".to_string()],
        },
        token_cleanup: TokenCleanupSettings::default(),
    }
}

async fn spawn_app() -> TestApp {
    let store = Arc::new(InMemoryStore::new());
    spawn_app_with_token_store(store.clone(), store).await
}

/// Users live in `store`; refresh tokens go to `tokens`.
async fn spawn_app_with_token_store(
    store: Arc<InMemoryStore>,
    tokens: Arc<dyn TokenStore>,
) -> TestApp {
    init_test_telemetry();

    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    let hash = hash_password(PASSWORD, 4).expect("Failed to hash password");
    let user_id = store.insert_user(EMAIL, &hash);

    let components = AuthComponents::build(&test_settings(), store.clone(), tokens)
        .expect("Failed to build components");
    let server = run(listener, components).expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address,
        store,
        user_id,
        client: reqwest::Client::new(),
    }
}

fn set_cookie_headers(response: &reqwest::Response) -> Vec<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect()
}

fn refresh_cookie(response: &reqwest::Response) -> Option<String> {
    set_cookie_headers(response)
        .iter()
        .filter_map(|header| header.split(';').next())
        .filter_map(|pair| pair.trim().strip_prefix("refresh_token="))
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

// --- Login ---

#[tokio::test]
async fn login_returns_200_and_sets_refresh_cookie_for_valid_credentials() {
    let app = spawn_app().await;

    let response = app.post_login(&json!({"email": EMAIL, "password": PASSWORD})).await;

    assert_eq!(200, response.status().as_u16());
    let cookie = set_cookie_headers(&response)
        .into_iter()
        .find(|h| h.starts_with("refresh_token="))
        .expect("Set-Cookie for refresh_token");
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Secure"));
    assert!(cookie.contains("Path=/api/auth"));
    assert_eq!(
        response.headers().get("cache-control").and_then(|v| v.to_str().ok()),
        Some("no-store")
    );

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Login successful");
    assert!(!body["accessToken"].as_str().unwrap_or_default().is_empty());
    assert!(body.get("refreshToken").is_none());
}

#[tokio::test]
async fn login_returns_identical_400_for_wrong_password_and_unknown_email() {
    let app = spawn_app().await;

    let wrong_password = app.post_login(&json!({"email": EMAIL, "password": "wrong"})).await;
    assert_eq!(400, wrong_password.status().as_u16());
    assert!(refresh_cookie(&wrong_password).is_none());
    let wrong_password = wrong_password.text().await.unwrap();

    let unknown_email = app
        .post_login(&json!({"email": "nobody@x.com", "password": PASSWORD}))
        .await;
    assert_eq!(400, unknown_email.status().as_u16());
    let unknown_email = unknown_email.text().await.unwrap();

    assert_eq!(wrong_password, unknown_email);
    let body: Value = serde_json::from_str(&wrong_password).unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Invalid email or password");
    assert!(app.store.refresh_tokens().is_empty());
}

#[tokio::test]
async fn login_returns_400_for_malformed_json() {
    let app = spawn_app().await;

    let response = app
        .client
        .post(&format!("{}/api/auth/login", &app.address))
        .header("Content-Type", "application/json")
        .body("{not json")
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(400, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Invalid JSON format");
}

#[tokio::test]
async fn login_returns_400_for_invalid_input() {
    let app = spawn_app().await;

    let test_cases = vec![
        (json!({"email": "notanemail", "password": "x"}), "email"),
        (json!({"password": "x"}), "email"),
        (json!({"email": EMAIL}), "password"),
    ];

    for (body, field) in test_cases {
        let response = app.post_login(&body).await;
        assert_eq!(400, response.status().as_u16(), "payload {}", body);

        let body: Value = response.json().await.unwrap();
        assert!(body["errors"].get(field).is_some(), "no error for {}", field);
    }
}

#[tokio::test]
async fn login_returns_500_with_generic_message_when_store_is_down() {
    let app = spawn_app().await;
    app.store.set_unavailable(true);

    let response = app.post_login(&json!({"email": EMAIL, "password": PASSWORD})).await;

    assert_eq!(500, response.status().as_u16());
    assert!(refresh_cookie(&response).is_none());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "An error occurred during login");
}

#[tokio::test]
async fn login_returns_500_without_cookie_when_refresh_token_cannot_be_stored() {
    let tokens = Arc::new(InMemoryStore::new());
    tokens.set_unavailable(true);
    let app = spawn_app_with_token_store(Arc::new(InMemoryStore::new()), tokens.clone()).await;

    let response = app.post_login(&json!({"email": EMAIL, "password": PASSWORD})).await;

    assert_eq!(500, response.status().as_u16());
    assert!(set_cookie_headers(&response)
        .iter()
        .all(|h| !h.starts_with("refresh_token=")));
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "An error occurred during login");
    assert!(body.get("accessToken").is_none());

    tokens.set_unavailable(false);
    assert!(tokens.refresh_tokens().is_empty());
}

#[tokio::test]
async fn concurrent_refreshes_with_one_token_succeed_once() {
    let app = spawn_app().await;
    let (_, refresh_token) = app.login().await;

    let (first, second) = tokio::join!(
        app.post_with_cookie("/api/auth/refresh", Some(&refresh_token)),
        app.post_with_cookie("/api/auth/refresh", Some(&refresh_token))
    );
    let mut statuses = vec![first.status().as_u16(), second.status().as_u16()];
    statuses.sort_unstable();

    assert_eq!(statuses, vec![200, 401]);
    assert_eq!(app.store.refresh_tokens().iter().filter(|r| !r.revoked).count(), 1);
}

#[tokio::test]
async fn login_binds_device_and_forwarded_client_ip() {
    let app = spawn_app().await;

    let response = app
        .client
        .post(&format!("{}/api/auth/login", &app.address))
        .header(USER_AGENT, "integration-test/1.0")
        .header("X-Forwarded-For", "203.0.113.9")
        .json(&json!({"email": EMAIL, "password": PASSWORD}))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(200, response.status().as_u16());

    let records = app.store.refresh_tokens();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].user_id, app.user_id);
    assert_eq!(records[0].device_info, "integration-test/1.0");
    assert_eq!(records[0].ip_address, "203.0.113.9");
}

#[tokio::test]
async fn concurrent_logins_produce_independent_sessions() {
    let app = spawn_app().await;

    let ((_, first), (_, second)) = tokio::join!(app.login(), app.login());
    assert_ne!(first, second);

    app.post_with_cookie("/api/auth/logout", Some(&first)).await;

    let revoked = app.post_with_cookie("/api/auth/refresh", Some(&first)).await;
    assert_eq!(401, revoked.status().as_u16());
    let still_valid = app.post_with_cookie("/api/auth/refresh", Some(&second)).await;
    assert_eq!(200, still_valid.status().as_u16());
}

// --- Logout ---

#[tokio::test]
async fn logout_with_valid_cookie_revokes_the_refresh_token() {
    let app = spawn_app().await;
    let (_, refresh_token) = app.login().await;

    let response = app.post_with_cookie("/api/auth/logout", Some(&refresh_token)).await;

    assert_eq!(200, response.status().as_u16());
    let cleared = set_cookie_headers(&response)
        .into_iter()
        .find(|h| h.starts_with("refresh_token="))
        .expect("cookie cleared");
    assert!(cleared.starts_with("refresh_token=;"));
    assert!(cleared.contains("Max-Age=0"));

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Logged out successfully");

    assert!(app.store.refresh_tokens().iter().all(|record| record.revoked));
    let refresh = app.post_with_cookie("/api/auth/refresh", Some(&refresh_token)).await;
    assert_eq!(401, refresh.status().as_u16());
}

#[tokio::test]
async fn logout_without_cookie_still_returns_200() {
    let app = spawn_app().await;

    let response = app.post_with_cookie("/api/auth/logout", None).await;

    assert_eq!(200, response.status().as_u16());
    assert!(set_cookie_headers(&response)
        .iter()
        .any(|h| h.starts_with("refresh_token=;")));
}

#[tokio::test]
async fn logout_twice_is_harmless() {
    let app = spawn_app().await;
    let (_, refresh_token) = app.login().await;

    let first = app.post_with_cookie("/api/auth/logout", Some(&refresh_token)).await;
    let second = app.post_with_cookie("/api/auth/logout", Some(&refresh_token)).await;

    assert_eq!(200, first.status().as_u16());
    assert_eq!(200, second.status().as_u16());
}

#[tokio::test]
async fn logout_returns_200_even_when_revocation_fails() {
    let app = spawn_app().await;
    let (_, refresh_token) = app.login().await;
    app.store.set_unavailable(true);

    let response = app.post_with_cookie("/api/auth/logout", Some(&refresh_token)).await;

    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
}

// --- Refresh ---

#[tokio::test]
async fn refresh_issues_new_tokens_and_rotates_cookie() {
    let app = spawn_app().await;
    let (_, refresh_token) = app.login().await;

    let response = app.post_with_cookie("/api/auth/refresh", Some(&refresh_token)).await;

    assert_eq!(200, response.status().as_u16());
    let rotated = refresh_cookie(&response).expect("rotated cookie");
    assert_ne!(rotated, refresh_token);
    let body: Value = response.json().await.unwrap();
    assert!(!body["accessToken"].as_str().unwrap_or_default().is_empty());

    let reuse = app.post_with_cookie("/api/auth/refresh", Some(&refresh_token)).await;
    assert_eq!(401, reuse.status().as_u16());
}

#[tokio::test]
async fn refresh_without_cookie_returns_401() {
    let app = spawn_app().await;

    let response = app.post_with_cookie("/api/auth/refresh", None).await;

    assert_eq!(401, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
}

// --- Current session ---

#[tokio::test]
async fn me_requires_a_valid_access_token() {
    let app = spawn_app().await;
    let url = format!("{}/api/auth/me", &app.address);

    let missing = app.client.get(&url).send().await.unwrap();
    assert_eq!(401, missing.status().as_u16());

    let garbage = app.client.get(&url).bearer_auth("garbage").send().await.unwrap();
    assert_eq!(401, garbage.status().as_u16());

    let (access_token, _) = app.login().await;
    let response = app.client.get(&url).bearer_auth(&access_token).send().await.unwrap();
    assert_eq!(200, response.status().as_u16());

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["userId"], app.user_id.to_string());
}
