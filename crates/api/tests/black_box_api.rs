use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use axum::{
    http::StatusCode as AxumStatus,
    routing::{get, post},
    Json, Router,
};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;

use stockgate_api::{
    app::{build_app, services::AppState},
    config::{parse_route_table, DEFAULT_ROUTE_RULES},
    context::CurrentPrincipal,
};
use stockgate_auth::{
    roles::{ROLE_ADMIN, ROLE_MANAGER, ROLE_USER},
    CredentialHasher, HasherParams, LookupError, PrincipalLookup, PrincipalRecord, SigningKey,
    TokenCodec,
};
use stockgate_infra::principal_store::{default_grant, InMemoryPrincipalStore};

const SIGNING_KEY: &str = "black-box-signing-key-at-least-32-bytes";

struct TestServer {
    base_url: String,
    codec: TokenCodec,
    store: Arc<InMemoryPrincipalStore>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        let hasher = hasher();

        let store = Arc::new(InMemoryPrincipalStore::new());
        store.seed(&hasher, "alice", "alice-pw", vec![default_grant(ROLE_USER)]).unwrap();
        store.seed(&hasher, "bob", "bob-pw", vec![default_grant(ROLE_USER)]).unwrap();
        store.seed(&hasher, "mgr", "mgr-pw", vec![default_grant(ROLE_MANAGER)]).unwrap();
        store.seed(&hasher, "root", "root-pw", vec![default_grant(ROLE_ADMIN)]).unwrap();
        store.seed(&hasher, "carol", "carol-pw", vec![default_grant(ROLE_USER)]).unwrap();
        store.set_active("carol", false).unwrap();

        let codec = codec();
        let state = AppState::new(
            codec.clone(),
            hasher,
            store.clone(),
            parse_route_table(DEFAULT_ROUTE_RULES).unwrap(),
            Duration::from_secs(5),
        );

        let (base_url, handle) = serve(state).await;

        Self {
            base_url,
            codec,
            store,
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn login(&self, client: &reqwest::Client, username: &str, password: &str) -> String {
        let res = client
            .post(self.url("/api/auth/login"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK, "login failed for {username}");
        let body: serde_json::Value = res.json().await.unwrap();
        body["token"].as_str().unwrap().to_string()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Serve the prod router plus stand-in business routes on an ephemeral port.
async fn serve(state: AppState) -> (String, tokio::task::JoinHandle<()>) {
    let app = build_app(state, business_routes());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind ephemeral port");
    let addr = listener.local_addr().unwrap();
    let base_url = format!("http://{}", addr);

    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (base_url, handle)
}

fn hasher() -> CredentialHasher {
    CredentialHasher::new(HasherParams {
        memory_kib: 8,
        iterations: 1,
        parallelism: 1,
    })
    .unwrap()
}

fn codec() -> TokenCodec {
    TokenCodec::new(
        SigningKey::from_bytes(SIGNING_KEY).unwrap(),
        ChronoDuration::hours(1),
    )
}

async fn whoami(CurrentPrincipal(principal): CurrentPrincipal) -> Json<serde_json::Value> {
    Json(json!({ "identity": principal.identity() }))
}

fn business_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/products",
            get(|| async { Json(json!([])) }).post(|| async { AxumStatus::CREATED }),
        )
        .route("/api/users", get(|| async { Json(json!([])) }))
        .route("/api/reports/sales", get(|| async { Json(json!({ "total": 0 })) }))
        .route("/api/orders/mine", get(whoami))
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: i64,
    exp: i64,
}

#[tokio::test]
async fn health_is_public() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn anonymous_request_to_protected_route_is_401() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client.get(server.url("/api/products")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        res.headers().get("www-authenticate").unwrap().to_str().unwrap(),
        "Bearer"
    );
}

#[tokio::test]
async fn login_then_use_token() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(server.url("/api/auth/login"))
        .json(&json!({ "username": "alice", "password": "alice-pw" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["expires_in"], 3600);

    let token = body["token"].as_str().unwrap();
    let res = client
        .get(server.url("/api/products"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn user_role_on_admin_route_is_403() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = server.login(&client, "alice", "alice-pw").await;

    let res = client
        .get(server.url("/api/users"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let admin = server.login(&client, "root", "root-pw").await;
    let res = client
        .get(server.url("/api/users"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn admin_route_without_header_is_401() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client.get(server.url("/api/users")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn expired_token_is_401() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let stale = server
        .codec
        .issue("bob", Utc::now() - ChronoDuration::hours(2))
        .unwrap();

    let res = client
        .get(server.url("/api/products"))
        .bearer_auth(&stale.token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn writes_need_manager_or_admin() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let manager = server.login(&client, "mgr", "mgr-pw").await;
    let user = server.login(&client, "alice", "alice-pw").await;

    let res = client
        .post(server.url("/api/products"))
        .bearer_auth(&manager)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = client
        .post(server.url("/api/products"))
        .bearer_auth(&user)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn reports_need_report_permission() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let manager = server.login(&client, "mgr", "mgr-pw").await;
    let user = server.login(&client, "alice", "alice-pw").await;

    let res = client
        .get(server.url("/api/reports/sales"))
        .bearer_auth(&manager)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(server.url("/api/reports/sales"))
        .bearer_auth(&user)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn login_failures_are_indistinguishable() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let mut responses = Vec::new();
    for (username, password) in [("alice", "wrong"), ("nobody", "alice-pw"), ("carol", "carol-pw")] {
        let res = client
            .post(server.url("/api/auth/login"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .unwrap();
        let status = res.status();
        let body = res.text().await.unwrap();
        responses.push((status, body));
    }

    assert_eq!(responses[0].0, StatusCode::UNAUTHORIZED);
    assert_eq!(responses[0], responses[1]);
    assert_eq!(responses[0], responses[2]);
}

#[tokio::test]
async fn malformed_login_body_is_400() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(server.url("/api/auth/login"))
        .json(&json!({ "username": "alice" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn forged_token_looks_like_no_token() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = server.login(&client, "alice", "alice-pw").await;

    // Re-sign the same claims with a different key.
    let other = TokenCodec::new(
        SigningKey::from_bytes("a-completely-different-32-byte-key!").unwrap(),
        ChronoDuration::hours(1),
    );
    let forged = other.issue("root", Utc::now()).unwrap().token;

    let missing = client.get(server.url("/api/products")).send().await.unwrap();
    let missing = (missing.status(), missing.text().await.unwrap());

    for bad in [forged, format!("{token}x"), "garbage".to_string()] {
        let res = client
            .get(server.url("/api/products"))
            .bearer_auth(&bad)
            .send()
            .await
            .unwrap();
        assert_eq!((res.status(), res.text().await.unwrap()), missing);
    }
}

#[tokio::test]
async fn non_bearer_scheme_is_anonymous() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .get(server.url("/api/products"))
        .basic_auth("alice", Some("alice-pw"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(server.url("/health"))
        .basic_auth("alice", Some("alice-pw"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn me_reports_roles_and_permissions() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = server.login(&client, "mgr", "mgr-pw").await;

    let res = client
        .get(server.url("/api/auth/me"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["identity"], "mgr");
    assert_eq!(body["roles"], json!(["ROLE_MANAGER"]));
    assert!(body["permissions"]
        .as_array()
        .unwrap()
        .contains(&json!("REPORT_VIEW")));

    let res = client.get(server.url("/api/auth/me")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn tokens_interoperate_with_standard_jwt_libraries() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    // Minted elsewhere, accepted here.
    let now = Utc::now().timestamp();
    let external = jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &Claims {
            sub: "alice".to_string(),
            iat: now,
            exp: now + 600,
        },
        &EncodingKey::from_secret(SIGNING_KEY.as_bytes()),
    )
    .unwrap();
    let res = client
        .get(server.url("/api/orders/mine"))
        .bearer_auth(&external)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // Issued here, decodable elsewhere.
    let token = server.login(&client, "bob", "bob-pw").await;
    let decoded = jsonwebtoken::decode::<Claims>(
        &token,
        &DecodingKey::from_secret(SIGNING_KEY.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .unwrap();
    assert_eq!(decoded.claims.sub, "bob");
    assert_eq!(decoded.claims.exp - decoded.claims.iat, 3600);
}

#[tokio::test]
async fn deactivated_principal_token_stops_working() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let token = server.login(&client, "bob", "bob-pw").await;

    let res = client
        .get(server.url("/api/orders/mine"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    server.store.set_active("bob", false).unwrap();

    let res = client
        .get(server.url("/api/orders/mine"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_route_fails_closed() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client.get(server.url("/api/nowhere")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let token = server.login(&client, "alice", "alice-pw").await;
    let res = client
        .get(server.url("/api/nowhere"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn concurrent_requests_keep_their_own_identity() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let alice = server.login(&client, "alice", "alice-pw").await;
    let mgr = server.login(&client, "mgr", "mgr-pw").await;

    let mut tasks = Vec::new();
    for i in 0..40 {
        let (expected, token) = if i % 2 == 0 {
            ("alice", alice.clone())
        } else {
            ("mgr", mgr.clone())
        };
        let client = client.clone();
        let url = server.url("/api/orders/mine");
        tasks.push(tokio::spawn(async move {
            let res = client.get(url).bearer_auth(token).send().await.unwrap();
            let body: serde_json::Value = res.json().await.unwrap();
            (expected, body["identity"].as_str().unwrap().to_string())
        }));
    }

    for task in tasks {
        let (expected, actual) = task.await.unwrap();
        assert_eq!(expected, actual);
    }
}

/// Principal store that answers slower than the request timeout.
#[derive(Default)]
struct SlowLookup {
    started: AtomicUsize,
    finished: AtomicUsize,
}

#[async_trait]
impl PrincipalLookup for SlowLookup {
    async fn lookup(&self, _identity: &str) -> Result<Option<PrincipalRecord>, LookupError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(200)).await;
        self.finished.fetch_add(1, Ordering::SeqCst);
        Ok(None)
    }
}

#[tokio::test]
async fn slow_principal_lookup_is_abandoned_at_request_timeout() {
    let lookup = Arc::new(SlowLookup::default());
    let codec = codec();
    let token = codec.issue("alice", Utc::now()).unwrap().token;

    let state = AppState::new(
        codec,
        hasher(),
        lookup.clone(),
        parse_route_table(DEFAULT_ROUTE_RULES).unwrap(),
        Duration::from_millis(50),
    );
    let (base_url, handle) = serve(state).await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{base_url}/api/orders/mine"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::REQUEST_TIMEOUT);

    // Well past the lookup's own duration: it was dropped, not finished or retried.
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(lookup.started.load(Ordering::SeqCst), 1);
    assert_eq!(lookup.finished.load(Ordering::SeqCst), 0);

    handle.abort();
}
