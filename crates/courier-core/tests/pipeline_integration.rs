//! Integration tests for the request pipeline
//!
//! Each test drives `ApiClient` against a wiremock server and checks the
//! number of attempts, the classification of failures and the shape of
//! the normalized result.

mod support;

use std::time::{Duration, Instant};

use courier_core::http::{FormSpec, Method, Payload, QueryParams, RequestSpec};
use courier_core::{ApiClient, CancellationToken, ClientConfig, ErrorKind};
use serde_json::{json, Value};
use support::*;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn missing_credential_issues_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let h = anonymous(&server, 3);
    let err = h
        .client
        .call("providers.list", &[])
        .await
        .expect_err("no token stored");

    assert_eq!(err.kind, ErrorKind::MissingCredential);
    assert!(err.status.is_none());
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn providers_scenario_wraps_bare_payload() {
    let server = MockServer::start().await;
    let providers = json!([{"id": "p1", "name": "Acme"}, {"id": "p2", "name": "Globex"}]);
    Mock::given(method("GET"))
        .and(path("/api/providers"))
        .and(header("Authorization", bearer(ACCESS_TOKEN).as_str()))
        .and(header("Accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"providers": providers})))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server, 1);
    let envelope = h.client.call("providers.list", &[]).await.expect("success");

    assert_eq!(
        serde_json::to_value(&envelope).unwrap(),
        json!({"success": true, "data": {"providers": providers}})
    );
}

#[tokio::test]
async fn enveloped_failure_body_passes_through() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/dashboard/stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": false, "error": "x"})))
        .mount(&server)
        .await;

    let h = harness(&server, 1);
    let envelope = h.client.call("dashboard.stats", &[]).await.expect("transport success");

    assert!(!envelope.success);
    assert_eq!(
        serde_json::to_value(&envelope).unwrap(),
        json!({"success": false, "error": "x"})
    );
}

#[tokio::test]
async fn server_errors_retry_until_budget_is_spent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/requests"))
        .respond_with(
            ResponseTemplate::new(503).set_body_json(json!({"message": "maintenance", "code": "DOWN"})),
        )
        .expect(3)
        .mount(&server)
        .await;

    let h = harness(&server, 2);
    let err = h.client.call("requests.list", &[]).await.expect_err("always 503");

    assert_eq!(err.kind, ErrorKind::Server);
    assert_eq!(err.status, Some(503));
    assert_eq!(err.message, "maintenance");
    assert_eq!(err.code.as_deref(), Some("DOWN"));
}

#[tokio::test]
async fn rate_limit_and_request_timeout_are_retried() {
    for status in [429u16, 408] {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(status))
            .expect(2)
            .mount(&server)
            .await;

        let h = harness(&server, 1);
        let err = h.client.call("messages.conversations", &[]).await.expect_err("always failing");
        assert_eq!(err.status, Some(status));
        assert!(err.is_retryable());
        assert_eq!(hits(&server, "/api/messages/conversations").await, 2);
    }
}

#[tokio::test]
async fn client_errors_are_attempted_once() {
    for status in [400u16, 403, 404, 422] {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/users"))
            .respond_with(
                ResponseTemplate::new(status)
                    .set_body_json(json!({"message": "rejected", "details": {"field": "email"}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let h = harness(&server, 3);
        let err = h
            .client
            .post("/api/users", json!({"email": "nope"}))
            .await
            .expect_err("client error");

        assert_eq!(err.kind, ErrorKind::Client, "status {}", status);
        assert_eq!(err.status, Some(status));
        assert_eq!(err.message, "rejected");
        assert_eq!(err.details, Some(json!({"field": "email"})));
    }
}

#[tokio::test]
async fn recovers_after_two_server_errors_with_backoff() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/requests"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/requests"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 42})))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server, 2);
    let started = Instant::now();
    let envelope = h
        .client
        .post("/api/requests", json!({"title": "Restock"}))
        .await
        .expect("third attempt succeeds");

    // 20ms + 40ms of backoff
    assert!(started.elapsed() >= Duration::from_millis(60));
    assert_eq!(envelope.data, Some(Payload::Json(json!({"id": 42}))));
}

#[tokio::test]
async fn slow_responses_time_out_and_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(400)))
        .mount(&server)
        .await;

    let h = harness(&server, 1);
    let spec = RequestSpec::get("/api/analytics/overview").timeout(Duration::from_millis(50));
    let err = h.client.execute(spec).await.expect_err("deadline exceeded");

    assert_eq!(err.kind, ErrorKind::Timeout);
    assert_eq!(err.hint(), Some("timeout"));
    assert!(err.status.is_none());
    assert_eq!(hits(&server, "/api/analytics/overview").await, 2);
}

#[tokio::test]
async fn connection_failures_are_network_errors() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener); // nothing listens here any more

    let client = ApiClient::builder()
        .config(
            ClientConfig::default()
                .with_base_url(format!("http://{}", addr))
                .with_retry(fast_retry(1)),
        )
        .build()
        .unwrap();

    let err = client.health().await.expect_err("connection refused");
    assert_eq!(err.kind, ErrorKind::Network);
    assert_eq!(err.hint(), Some("network"));
    assert!(!client.is_healthy().await);
}

#[tokio::test]
async fn cancellation_during_backoff_stops_further_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let h = harness(&server, 5);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        // first backoff is 20ms, second 40ms; cancel inside the second
        tokio::time::sleep(Duration::from_millis(40)).await;
        trigger.cancel();
    });

    let before = Instant::now();
    let err = h
        .client
        .execute(RequestSpec::get("/api/finances/summary").cancellation(cancel))
        .await
        .expect_err("cancelled");

    assert_eq!(err.kind, ErrorKind::Cancelled);
    assert_eq!(err.hint(), Some("cancelled"));
    let seen = hits(&server, "/api/finances/summary").await;
    assert!(seen >= 1 && seen < 6, "saw {} attempts", seen);

    // nothing else arrives after the call returned
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(hits(&server, "/api/finances/summary").await, seen);
    assert!(before.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn pre_cancelled_call_sends_nothing() {
    let server = MockServer::start().await;
    let h = harness(&server, 3);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = h
        .client
        .execute(RequestSpec::get("/api/zones").cancellation(cancel))
        .await
        .expect_err("cancelled");

    assert_eq!(err.kind, ErrorKind::Cancelled);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn empty_query_values_are_not_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/items"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server, 0);
    let query = QueryParams::new()
        .with("q", "")
        .with("page", 2)
        .with_opt::<u32>("limit", None);
    h.client.get("/api/items", query).await.expect("success");

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests[0].url.query(), Some("page=2"));
}

#[tokio::test]
async fn request_headers_are_assembled() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"uploaded": true})))
        .mount(&server)
        .await;

    let h = harness(&server, 0);
    let envelope = h
        .client
        .put("/api/settings/general", json!({"theme": "dark"}))
        .await
        .unwrap();
    assert!(envelope.success);
    assert!(envelope.data.is_none());

    let form = FormSpec::new()
        .text("kind", "invoice")
        .file("file", "march.csv", Some("text/csv"), b"a,b\n1,2\n".to_vec());
    h.client
        .execute(RequestSpec::post("/api/export/uploads").multipart(form))
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let put = &requests[0];
    assert_eq!(put.headers.get("content-type").unwrap(), "application/json");
    assert!(put.headers.get("x-request-id").is_some());
    let body: Value = serde_json::from_slice(&put.body).unwrap();
    assert_eq!(body, json!({"theme": "dark"}));

    let upload = &requests[1];
    let content_type = upload.headers.get("content-type").unwrap().to_str().unwrap();
    assert!(content_type.starts_with("multipart/form-data; boundary="));
    assert_ne!(
        put.headers.get("x-request-id"),
        upload.headers.get("x-request-id")
    );
}

#[tokio::test]
async fn multipart_bodies_are_rebuilt_for_retries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    let h = harness(&server, 1);
    let form = FormSpec::new().file("file", "a.bin", None, vec![1u8, 2, 3]);
    h.client
        .execute(RequestSpec::post("/api/export/uploads").multipart(form))
        .await
        .expect("second attempt succeeds");

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    assert!(!requests[1].body.is_empty());
}

#[tokio::test]
async fn streaming_bodies_are_never_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server, 3);
    let err = h
        .client
        .execute(RequestSpec::post("/api/export/uploads").stream("raw bytes".to_string()))
        .await
        .expect_err("single attempt");

    assert_eq!(err.status, Some(503));
}

#[tokio::test]
async fn health_probe_skips_auth() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .mount(&server)
        .await;

    let h = anonymous(&server, 3);
    assert!(h.client.is_healthy().await);

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn health_probe_retries_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let h = anonymous(&server, 5);
    assert!(!h.client.is_healthy().await);
}

#[tokio::test]
async fn base_url_can_be_overridden_at_runtime() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/providers/p%201/status"))
        .respond_with(ResponseTemplate::new(200).set_body_string("online"))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server, 0);
    h.client.set_base_url("http://127.0.0.1:9").unwrap();
    h.client.set_base_url(server.uri()).unwrap();

    let spec = RequestSpec::endpoint(
        Method::GET,
        courier_core::endpoints::lookup("providers.status").unwrap(),
        &[("id", "p 1")],
    )
    .unwrap();
    let envelope = h.client.execute(spec).await.unwrap();
    assert_eq!(envelope.data, Some(Payload::Text("online".to_string())));
}
