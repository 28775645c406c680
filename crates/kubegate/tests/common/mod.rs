//! Shared test harness: a mock identity provider, app construction, and a
//! minimal cookie store for driving the flow like a browser.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::{Form, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{Value, json};

use kubegate::api::{AppState, create_router};
use kubegate::config::{ClusterConfig, Settings};

pub const TEST_KEY_PEM: &str = include_str!("../fixtures/test_key.pem");
pub const TEST_KID: &str = "test-key";
pub const TEST_JWK_E: &str = "AQAB";
pub const TEST_JWK_N: &str = "-ZQySKkPKp3lE9x0aDdzohmqa1Sil6AOfnQArihY9rpyVy6xxaMllpZqIMa8TtICcJ9ihI5kt-eJSKyzBcjnZHyaOxiFb0oLDIsPnfRraRWRvj3xjj7YPi2Ht2x_PDltRpxAhWbDaZvqWKFHWYwC0_S2AtakDJfyzQP6rCms3bVTooQpwAb2gtfuMHhBSfXr3io2X1BLKFOZKuwWo4ENfrQslSVrEg2TeGJP42l7XwpWxKZBaVDCudvZPGZr36SHM8POHu6H72I99PKiA_HkMara-usBAsgSdTqjF-Ib1hNnOF7uKOYyBqCYU0HZm_KnTSGc7VKlKUriNsuCSe1sbQ";

/// Authorization code the mock token endpoint answers with an already
/// expired ID token.
pub const EXPIRED_CODE: &str = "expired-code";

/// Authorization code the mock token endpoint answers without a refresh
/// token, like providers that don't support offline access.
pub const NO_REFRESH_CODE: &str = "no-refresh-code";

pub struct MockIdp {
    pub base_url: String,
}

struct IdpState {
    base_url: String,
}

/// Start an in-process identity provider on an ephemeral port.
pub async fn spawn_idp() -> MockIdp {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let state = Arc::new(IdpState {
        base_url: base_url.clone(),
    });

    let router = Router::new()
        .route("/.well-known/openid-configuration", get(discovery))
        .route("/keys", get(jwks))
        .route("/token", post(token))
        .with_state(state);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    MockIdp { base_url }
}

async fn discovery(State(state): State<Arc<IdpState>>) -> Json<Value> {
    let base = &state.base_url;
    Json(json!({
        "issuer": base,
        "authorization_endpoint": format!("{base}/authorize"),
        "token_endpoint": format!("{base}/token"),
        "jwks_uri": format!("{base}/keys"),
        "response_types_supported": ["code"],
    }))
}

async fn jwks() -> Json<Value> {
    Json(json!({
        "keys": [{
            "kty": "RSA",
            "kid": TEST_KID,
            "use": "sig",
            "alg": "RS256",
            "n": TEST_JWK_N,
            "e": TEST_JWK_E,
        }]
    }))
}

async fn token(
    State(state): State<Arc<IdpState>>,
    Form(params): Form<HashMap<String, String>>,
) -> Json<Value> {
    assert_eq!(
        params.get("grant_type").map(String::as_str),
        Some("authorization_code")
    );
    let code = params.get("code").cloned().unwrap_or_default();
    let client_id = params.get("client_id").cloned().unwrap_or_default();

    let now = unix_now();
    let exp = if code == EXPIRED_CODE { now - 3600 } else { now + 3600 };
    let id_token = sign_token(&state.base_url, &client_id, exp);

    let mut body = json!({
        "access_token": "unused-access-token",
        "token_type": "Bearer",
        "expires_in": 3600,
        "id_token": id_token,
    });
    if code != NO_REFRESH_CODE {
        body["refresh_token"] = json!("refresh-xyz");
    }
    Json(body)
}

pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

pub fn sign_token(issuer: &str, audience: &str, exp: i64) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(TEST_KID.to_string());
    let claims = json!({
        "iss": issuer,
        "aud": audience,
        "sub": "user-1",
        "exp": exp,
        "iat": exp - 7200,
        "nickname": "jdoe",
        "email": "jdoe@example.com",
    });
    let key = EncodingKey::from_rsa_pem(TEST_KEY_PEM.as_bytes()).unwrap();
    jsonwebtoken::encode(&header, &claims, &key).unwrap()
}

pub fn test_cluster(name: &str, client_id: &str, provider_url: &str) -> ClusterConfig {
    ClusterConfig {
        name: name.to_string(),
        provider_url: provider_url.to_string(),
        client_id: client_id.to_string(),
        client_secret: "test-secret".to_string(),
        allow_empty_client_secret: false,
        audience: String::new(),
        redirect_url: "http://gateway.example.com/callback".to_string(),
        scopes: vec!["openid".to_string(), "email".to_string()],
        username_claim: "nickname".to_string(),
        email_claim: String::new(),
        api_server_url: "https://k8s.example.com:6443".to_string(),
        cluster_ca_path: None,
        trusted_ca_path: None,
        show_claims: true,
        cluster_ca: Some(b"test-cluster-ca".to_vec()),
        trusted_ca: None,
    }
}

pub fn test_settings(clusters: Vec<ClusterConfig>) -> Settings {
    Settings {
        host: "127.0.0.1".to_string(),
        port: 0,
        http_path: String::new(),
        serve_tls: false,
        cert_file: None,
        key_file: None,
        session_security_key: "integration-test-security-key".to_string(),
        session_salt: "integration-test-salt".to_string(),
        secure_cookies: Some(false),
        clusters,
    }
}

/// Router wired against the given identity provider, single "dev" cluster.
pub fn test_app(provider_url: &str) -> Router {
    let settings = test_settings(vec![test_cluster("dev", "kubegate-client", provider_url)]);
    create_router(AppState::from_settings(&settings).unwrap())
}

/// Minimal browser-side cookie store.
#[derive(Debug, Default)]
pub struct CookieStore {
    cookies: BTreeMap<String, String>,
}

impl CookieStore {
    /// Apply every `Set-Cookie` header from a response; empty values are
    /// treated as removals.
    pub fn absorb(&mut self, response: &axum::http::Response<axum::body::Body>) {
        for value in response.headers().get_all(axum::http::header::SET_COOKIE) {
            let raw = value.to_str().unwrap();
            let pair = raw.split(';').next().unwrap_or_default();
            if let Some((name, value)) = pair.split_once('=') {
                if value.is_empty() {
                    self.cookies.remove(name);
                } else {
                    self.cookies.insert(name.to_string(), value.to_string());
                }
            }
        }
    }

    /// Value for a `Cookie` request header.
    pub fn header(&self) -> String {
        self.cookies
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("; ")
    }

    pub fn contains(&self, name: &str) -> bool {
        self.cookies.contains_key(name)
    }

    /// Drop a cookie, simulating a browser that lost one fragment.
    pub fn remove(&mut self, name: &str) {
        self.cookies.remove(name);
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }
}
