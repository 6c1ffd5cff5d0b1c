//! Integration tests for the host's HTTP surface.
//!
//! These tests run the real router on a random localhost port.

mod common;

use common::server::TestServer;
use easel_bridge::Services;
use easel_integrations::{
    GenerationClient, ManualClock, OAuthNonce, PhotoSearchClient, SignedSearchProxy,
};
use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::matchers::{header_regex, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Services pointed at `base`. An unroutable base keeps tests offline.
fn services(base: &str) -> Services {
    Services {
        icons: SignedSearchProxy::with_base_url(base)
            .expect("icons")
            .with_nonce_source(OAuthNonce::new("abc123nonce", 1_700_000_000)),
        photos: PhotoSearchClient::with_base_url(base).expect("photos"),
        generation: GenerationClient::with_base_url(base)
            .expect("generation")
            .with_clock(Arc::new(ManualClock::new())),
    }
}

const OFFLINE: &str = "http://127.0.0.1:1";

async fn rpc(server: &TestServer, body: Value) -> Value {
    reqwest::Client::new()
        .post(server.url("/rpc"))
        .json(&body)
        .send()
        .await
        .expect("send")
        .json()
        .await
        .expect("json")
}

fn request(id: u64, method: &str, params: Value) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params})
}

#[tokio::test]
#[cfg_attr(
    target_os = "macos",
    ignore = "wiremock/reqwest system-configuration issue on macOS"
)]
async fn test_health_endpoints() {
    let dir = tempfile::tempdir().expect("tempdir");
    let server = TestServer::start(dir.path(), services(OFFLINE)).await;
    let client = reqwest::Client::new();

    let live = client.get(server.url("/health/live")).send().await.expect("live");
    assert_eq!(live.status(), 200);

    let ready: Value = client
        .get(server.url("/health/ready"))
        .send()
        .await
        .expect("ready")
        .json()
        .await
        .expect("json");
    assert_eq!(ready["status"], "healthy");
    assert_eq!(ready["checks"]["settings"], true);

    server.shutdown().await;
}

#[tokio::test]
#[cfg_attr(
    target_os = "macos",
    ignore = "wiremock/reqwest system-configuration issue on macOS"
)]
async fn test_corrupt_settings_is_not_ready() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("config.json"), "{not json").expect("write");
    let server = TestServer::start(dir.path(), services(OFFLINE)).await;

    let response = reqwest::get(server.url("/health")).await.expect("health");
    assert_eq!(response.status(), 503);

    server.shutdown().await;
}

#[tokio::test]
#[cfg_attr(
    target_os = "macos",
    ignore = "wiremock/reqwest system-configuration issue on macOS"
)]
async fn test_config_round_trip_never_returns_secrets() {
    let dir = tempfile::tempdir().expect("tempdir");
    let server = TestServer::start(dir.path(), services(OFFLINE)).await;

    let saved = rpc(
        &server,
        request(
            1,
            "config/save",
            json!({
                "unsplashAccessKey": "u-key",
                "replicateApiToken": "r8_token",
                "nounProjectKey": "n-key",
                "nounProjectSecret": "n-secret"
            }),
        ),
    )
    .await;
    assert_eq!(saved["result"], json!({"saved": true}));

    let read = rpc(&server, request(2, "config/read", Value::Null)).await;
    let result = &read["result"];
    assert_eq!(result["unsplashAccessKey"], "u-key");
    assert_eq!(result["nounProjectKey"], "n-key");
    assert_eq!(result["replicateApiToken"], "");
    assert_eq!(result["nounProjectSecret"], "");
    assert_eq!(result["configured"]["replicateApiToken"], true);
    assert!(!read.to_string().contains("r8_token"));
    assert!(!read.to_string().contains("n-secret"));

    let on_disk = server.settings_store().load().expect("load");
    assert_eq!(on_disk.replicate_api_token.expose(), "r8_token");

    server.shutdown().await;
}

#[tokio::test]
#[cfg_attr(
    target_os = "macos",
    ignore = "wiremock/reqwest system-configuration issue on macOS"
)]
async fn test_protocol_errors() {
    let dir = tempfile::tempdir().expect("tempdir");
    let server = TestServer::start(dir.path(), services(OFFLINE)).await;

    let parse: Value = reqwest::Client::new()
        .post(server.url("/rpc"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .expect("send")
        .json()
        .await
        .expect("json");
    assert_eq!(parse["error"]["code"], -32700);
    assert_eq!(parse["id"], Value::Null);

    let no_method = rpc(&server, json!({"jsonrpc": "2.0", "id": 7})).await;
    assert_eq!(no_method["error"]["code"], -32600);
    assert_eq!(no_method["id"], 7);

    let unknown = rpc(&server, request(2, "fs/read", json!({"path": "/etc/passwd"}))).await;
    assert_eq!(unknown["error"]["code"], -32601);

    let too_big = rpc(
        &server,
        request(3, "image/generate", json!({"prompt": "fox", "width": 100_000})),
    )
    .await;
    assert_eq!(too_big["error"]["code"], -32602);
    assert_eq!(too_big["id"], 3);

    let empty = rpc(&server, request(4, "icons/search", json!({"query": "  "}))).await;
    assert_eq!(empty["error"]["code"], -32602);

    server.shutdown().await;
}

#[tokio::test]
#[cfg_attr(
    target_os = "macos",
    ignore = "wiremock/reqwest system-configuration issue on macOS"
)]
async fn test_icon_search_is_signed_by_the_host() {
    let remote = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/icons/cat"))
        .and(query_param("limit", "20"))
        .and(header_regex(
            "authorization",
            r#"^OAuth oauth_consumer_key="consumer-key", oauth_nonce="abc123nonce", oauth_signature=""#,
        ))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"icons": [{"id": 1, "term": "cat"}]})),
        )
        .expect(1)
        .mount(&remote)
        .await;

    let dir = tempfile::tempdir().expect("tempdir");
    let server = TestServer::start(dir.path(), services(&remote.uri())).await;

    let response = rpc(
        &server,
        request(
            1,
            "icons/search",
            json!({"query": "cat", "key": "consumer-key", "secret": "consumer-secret"}),
        ),
    )
    .await;
    assert_eq!(response["result"]["icons"][0]["term"], "cat");

    server.shutdown().await;
}

#[tokio::test]
#[cfg_attr(
    target_os = "macos",
    ignore = "wiremock/reqwest system-configuration issue on macOS"
)]
async fn test_missing_icon_credentials_make_no_request() {
    let remote = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&remote)
        .await;

    let dir = tempfile::tempdir().expect("tempdir");
    let server = TestServer::start(dir.path(), services(&remote.uri())).await;

    let response = rpc(&server, request(1, "icons/search", json!({"query": "cat"}))).await;
    assert_eq!(response["result"], json!({"error": "Missing credentials"}));

    server.shutdown().await;
}

#[tokio::test]
#[cfg_attr(
    target_os = "macos",
    ignore = "wiremock/reqwest system-configuration issue on macOS"
)]
async fn test_cors_allows_only_localhost() {
    let dir = tempfile::tempdir().expect("tempdir");
    let server = TestServer::start(dir.path(), services(OFFLINE)).await;
    let client = reqwest::Client::new();

    let preflight = |origin: &'static str| {
        client
            .request(reqwest::Method::OPTIONS, server.url("/rpc"))
            .header("origin", origin)
            .header("access-control-request-method", "POST")
            .send()
    };

    let local = preflight("http://localhost:5173").await.expect("preflight");
    assert_eq!(
        local
            .headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("http://localhost:5173")
    );

    let foreign = preflight("https://evil.example").await.expect("preflight");
    assert!(foreign.headers().get("access-control-allow-origin").is_none());

    server.shutdown().await;
}

#[tokio::test]
#[cfg_attr(
    target_os = "macos",
    ignore = "wiremock/reqwest system-configuration issue on macOS"
)]
async fn test_calls_show_up_in_metrics() {
    let dir = tempfile::tempdir().expect("tempdir");
    let server = TestServer::start(dir.path(), services(OFFLINE)).await;

    rpc(&server, request(1, "project/list", Value::Null)).await;
    rpc(&server, request(2, "photos/search", json!({"query": ""}))).await;

    let text = reqwest::get(server.url("/metrics"))
        .await
        .expect("metrics")
        .text()
        .await
        .expect("text");
    assert!(text.contains("easel_rpc_calls_total"));
    assert!(text.contains("method=\"project/list\""));
    assert!(text.contains("easel_validation_failures_total"));

    server.shutdown().await;
}

#[tokio::test]
#[cfg_attr(
    target_os = "macos",
    ignore = "wiremock/reqwest system-configuration issue on macOS"
)]
async fn test_project_save_and_load() {
    let dir = tempfile::tempdir().expect("tempdir");
    let server = TestServer::start(dir.path(), services(OFFLINE)).await;

    let shapes = json!([{
        "id": "r1",
        "type": "rect",
        "x": 10.0,
        "y": 20.0,
        "width": 100.0,
        "height": 50.0,
        "fill": "#ff0000"
    }]);
    let saved = rpc(
        &server,
        request(1, "project/save", json!({"shapes": shapes, "name": "poster"})),
    )
    .await;
    assert_eq!(saved["result"]["saved"], true);

    let listed = rpc(&server, request(2, "project/list", Value::Null)).await;
    assert_eq!(listed["result"]["projects"], json!(["poster.json"]));

    let loaded = rpc(&server, request(3, "project/load", json!({"name": "poster"}))).await;
    assert_eq!(loaded["result"]["shapes"][0]["id"], "r1");

    let escape = rpc(&server, request(4, "project/load", json!({"name": "../config"}))).await;
    assert_eq!(escape["error"]["code"], -32602);

    server.shutdown().await;
}
