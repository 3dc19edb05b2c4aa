//! Dispatcher, queue and context against a real HTTP server

use lesson_enroll_core::app::build_native;
use lesson_enroll_core::client::request::{ReqwestTransport, TokioDelay};
use lesson_enroll_core::config::ClientConfig;
use lesson_enroll_core::error::ErrorKind;
use lesson_enroll_core::interface::{DiscardEvents, StaticToken};
use lesson_enroll_core::model::dtos::{
    AntiForgeryToken, EnrollmentRequest, HttpMethod, RequestOptions,
};
use lesson_enroll_core::model::structs::EnrollmentOutcome;
use lesson_enroll_core::storage::FileStore;
use lesson_enroll_core::{OfflineQueue, RequestDispatcher};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FAST: RequestOptions = RequestOptions {
    max_attempts: 3,
    base_delay: Duration::from_millis(5),
    retry_client_errors: false,
};

fn dispatcher(server: &MockServer) -> RequestDispatcher<ReqwestTransport, TokioDelay> {
    let transport = ReqwestTransport::new(Duration::from_secs(5)).unwrap();
    RequestDispatcher::new(transport, TokioDelay, format!("{}/enrollment", server.uri()))
}

async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.unwrap().len()
}

#[tokio::test]
async fn server_errors_are_retried_until_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/enrollment/capacity/4"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/enrollment/capacity/4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"enrolled": 12})))
        .mount(&server)
        .await;

    let value = dispatcher(&server)
        .send(HttpMethod::Get, "/capacity/4", None, FAST)
        .await
        .unwrap();

    assert_eq!(value["enrolled"], 12);
    assert_eq!(request_count(&server).await, 3);
}

#[tokio::test]
async fn forbidden_is_attempted_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/enrollment/enroll"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let err = dispatcher(&server)
        .send(HttpMethod::Post, "/enroll", Some(&json!({"courseId": 1})), FAST)
        .await
        .unwrap_err();

    assert!(matches!(err.kind(), ErrorKind::Http { status: 403 }));
    assert_eq!(request_count(&server).await, 1);
}

#[tokio::test]
async fn anti_forgery_header_and_json_body_are_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/enrollment/validate-voucher"))
        .and(header("X-CSRF-TOKEN", "abc123"))
        .and(header("X-Requested-With", "XMLHttpRequest"))
        .and(body_json(json!({"voucherCode": "SAVE", "courseId": 2})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"valid": true, "discount": 10.0})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dispatcher = dispatcher(&server).with_token_source(StaticToken(AntiForgeryToken {
        header_name: "X-CSRF-TOKEN".to_string(),
        value: "abc123".to_string(),
    }));
    let value = dispatcher
        .send(
            HttpMethod::Post,
            "/validate-voucher",
            Some(&json!({"voucherCode": "SAVE", "courseId": 2})),
            FAST,
        )
        .await
        .unwrap();

    assert_eq!(value["valid"], true);
}

#[tokio::test]
async fn unreachable_server_exhausts_attempts() {
    let transport = ReqwestTransport::new(Duration::from_secs(2)).unwrap();
    let dispatcher = RequestDispatcher::new(transport, TokioDelay, "http://127.0.0.1:9/enrollment");

    let err = dispatcher
        .send(HttpMethod::Get, "/capacity/1", None, FAST)
        .await
        .unwrap_err();

    assert!(matches!(err.kind(), ErrorKind::Exhausted { attempts: 3, .. }));
    assert!(err.is_network());
}

#[tokio::test]
async fn flush_replays_file_queue_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/enrollment/withdraw/2"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .mount(&server)
        .await;

    let temp_dir = tempfile::tempdir().unwrap();
    let queue = OfflineQueue::new(FileStore::new(temp_dir.path(), "enrollmentOfflineData"));
    let first = queue
        .enqueue(HttpMethod::Post, "/enroll", Some(json!({"courseId": 1})))
        .unwrap();
    let second = queue
        .enqueue(HttpMethod::Post, "/withdraw/2", Some(json!({"reason": ""})))
        .unwrap();
    let third = queue
        .enqueue(HttpMethod::Post, "/enroll", Some(json!({"courseId": 3})))
        .unwrap();

    let report = queue.flush(&dispatcher(&server)).await.unwrap();

    assert_eq!(report.succeeded, vec![first, third]);
    assert_eq!(report.failed, vec![second.clone()]);
    // replays are single attempts
    assert_eq!(request_count(&server).await, 3);

    let reloaded = OfflineQueue::new(FileStore::new(temp_dir.path(), "enrollmentOfflineData"));
    let remaining = reloaded.list().unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, second);
}

#[tokio::test]
async fn enrollment_parked_while_down_is_sent_on_reconnect() {
    let server = MockServer::start().await;
    let temp_dir = tempfile::tempdir().unwrap();
    let config = ClientConfig {
        base_url: server.uri(),
        base_delay_ms: 5,
        queue_dir: Some(temp_dir.path().to_path_buf()),
        telemetry_enabled: false,
        ..ClientConfig::default()
    };
    let (context, _outbox) = build_native(&config, DiscardEvents, None).unwrap();

    Mock::given(method("POST"))
        .and(path("/enrollment/enroll"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(3)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/enrollment/enroll"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .mount(&server)
        .await;

    let outcome = context
        .enroll_in_course(&EnrollmentRequest::for_course(8))
        .await
        .unwrap();
    let id = match outcome {
        EnrollmentOutcome::Queued { id } => id,
        other => panic!("expected the enrollment to be queued, got {other:?}"),
    };

    let report = context.on_online().await.unwrap();
    assert_eq!(report.succeeded, vec![id]);
    assert!(context.queue().is_empty().unwrap());
    assert_eq!(request_count(&server).await, 4);
}
