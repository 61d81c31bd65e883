//! Store session tests: lazy re-authentication, token caching, and the
//! auth-failure path that aborts a whole tick.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use ride_updater::error::TickError;
use ride_updater::fetch::QueueTimesClient;
use ride_updater::store::client::{StoreClient, StoreError};
use serde_json::json;
use shared::StoreConfig;
use shared::queue_times::Park;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PARK: Park = Park {
    api_id: "5",
    name: "Park A",
};

fn make_jwt(exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{exp}}}"#));
    format!("{header}.{payload}.sig")
}

fn store_client(store_server: &MockServer) -> StoreClient {
    StoreClient::new(&StoreConfig {
        url: store_server.uri(),
        identity: "admin@example.com".to_string(),
        password: "hunter2".to_string(),
    })
}

#[tokio::test]
async fn valid_session_is_reused_across_ticks() {
    let upstream_server = MockServer::start().await;
    let store_server = MockServer::start().await;
    let token = make_jwt(Utc::now().timestamp() + 3600);

    Mock::given(method("POST"))
        .and(path("/api/collections/_superusers/auth-with-password"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": token })))
        .expect(1)
        .mount(&store_server)
        .await;

    // Reads must carry the session token.
    Mock::given(method("GET"))
        .and(path("/api/collections/parks/records"))
        .and(query_param("filter", "(api_id='5')"))
        .and(header("authorization", token.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{ "id": "p1", "name": "Stored Park" }]
        })))
        .mount(&store_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/collections/rides/records"))
        .and(header("authorization", token.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [] })))
        .mount(&store_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/parks/5/queue_times.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "lands": [] })))
        .mount(&upstream_server)
        .await;

    let upstream = QueueTimesClient::with_base_url(upstream_server.uri());
    let store = store_client(&store_server);

    for _ in 0..2 {
        let summary = ride_updater::sync::run_tick(&upstream, &store, &[PARK])
            .await
            .expect("tick should succeed");
        assert!(summary.success);
    }
}

#[tokio::test]
async fn expired_token_triggers_re_login() {
    let store_server = MockServer::start().await;
    let expired = make_jwt(Utc::now().timestamp() - 60);

    Mock::given(method("POST"))
        .and(path("/api/collections/_superusers/auth-with-password"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": expired })))
        .expect(2)
        .mount(&store_server)
        .await;

    let store = store_client(&store_server);
    store.ensure_authenticated().await.expect("first login");
    store.ensure_authenticated().await.expect("second login");
}

#[tokio::test]
async fn unparseable_token_counts_as_expired() {
    let store_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/collections/_superusers/auth-with-password"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "token": "not-a-jwt" })),
        )
        .expect(2)
        .mount(&store_server)
        .await;

    let store = store_client(&store_server);
    store.ensure_authenticated().await.expect("first login");
    store.ensure_authenticated().await.expect("second login");
}

#[tokio::test]
async fn auth_failure_aborts_the_tick() {
    let upstream_server = MockServer::start().await;
    let store_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/collections/_superusers/auth-with-password"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "message": "Failed to authenticate."
        })))
        .mount(&store_server)
        .await;

    let upstream = QueueTimesClient::with_base_url(upstream_server.uri());
    let store = store_client(&store_server);

    let err = ride_updater::sync::run_tick(&upstream, &store, &[PARK])
        .await
        .expect_err("tick should fail before any park sync");
    let TickError::Auth(StoreError::AuthFailed { status }) = err else {
        panic!("expected auth failure, got {err:?}");
    };
    assert_eq!(status, reqwest::StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn requests_without_a_session_are_rejected() {
    let store_server = MockServer::start().await;
    let store = store_client(&store_server);

    let err = store
        .find_park_record("5")
        .await
        .expect_err("read should fail without a session");
    assert!(matches!(err, StoreError::NotAuthenticated));
}
