//! HTTP record store against a local canned server.

use std::sync::Arc;
use std::time::Duration;

use fitcoach::records::{CategoryPayload, RecordError};
use fitcoach::storage::LocalCache;
use fitcoach::sync::{
    DataSource, HttpRecordStore, MemoryRetryQueue, ReconciliationEngine, RecordStore, SyncError,
};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::harness::{ctx, workout};

/// Answer one request per canned `(status line, body)`, returning the
/// request bodies received.
async fn serve(responses: Vec<(&'static str, Value)>) -> (String, JoinHandle<Vec<Value>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/api/user-data", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let mut received = Vec::new();
        for (status, body) in responses {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            while !is_complete(&request) {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            received.push(request_body(&request));

            let body = body.to_string();
            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        }
        received
    });
    (url, handle)
}

fn split(request: &[u8]) -> Option<(String, String)> {
    let text = String::from_utf8_lossy(request);
    let (head, body) = text.split_once("\r\n\r\n")?;
    Some((head.to_string(), body.to_string()))
}

fn is_complete(request: &[u8]) -> bool {
    let Some((head, body)) = split(request) else {
        return false;
    };
    let length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    body.len() >= length
}

fn request_body(request: &[u8]) -> Value {
    split(request)
        .and_then(|(_, body)| serde_json::from_str(&body).ok())
        .unwrap_or(Value::Null)
}

fn store(url: &str) -> HttpRecordStore {
    HttpRecordStore::new(url, Some("secret".to_string()), Duration::from_secs(2)).unwrap()
}

#[tokio::test]
async fn test_fetch_reads_top_level_categories() {
    let (url, server) = serve(vec![(
        "200 OK",
        json!({
            "success": true,
            "workouts": [{"id": "w1", "title": "Push Day", "workoutType": "strength"}],
            "dietPlans": [],
            "workoutHistory": [{"id": "h1", "date": "2024-05-01", "completed": true}],
            "dietHistory": [],
            "preferences": {"fitnessGoal": "build-muscle"}
        }),
    )])
    .await;

    let owner = ctx("u1").owner().unwrap().clone();
    let snapshot = store(&url).fetch(&owner).await.unwrap();
    assert_eq!(snapshot.workout_plan.len(), 1);
    assert_eq!(snapshot.workout_history[0].id.as_str(), "h1");
    assert_eq!(
        snapshot.preferences.unwrap().fitness_goal.as_deref(),
        Some("build-muscle")
    );

    let requests = server.await.unwrap();
    assert_eq!(
        requests[0],
        json!({"userId": "u1", "dataType": "all", "action": "fetch"})
    );
}

#[tokio::test]
async fn test_save_posts_payload_and_reads_counts() {
    let (url, server) = serve(vec![(
        "200 OK",
        json!({"success": true, "message": "saved", "createdCount": 1, "updatedCount": 0}),
    )])
    .await;

    let owner = ctx("u1").owner().unwrap().clone();
    let payload = CategoryPayload::WorkoutPlan(vec![workout("w1", "Push Day")]);
    let summary = store(&url).save(&owner, &payload).await.unwrap();
    assert_eq!(summary.created_count, 1);

    let requests = server.await.unwrap();
    assert_eq!(requests[0]["dataType"], "workout");
    assert_eq!(requests[0]["action"], "save");
    assert_eq!(requests[0]["data"][0]["id"], "w1");
}

#[tokio::test]
async fn test_server_errors_are_unavailable_and_rejections_are_not() {
    let (url, server) = serve(vec![
        ("503 Service Unavailable", json!({"success": false})),
        ("400 Bad Request", json!({"success": false, "error": "Invalid dataType"})),
        ("200 OK", json!({"success": false, "message": "quota exceeded"})),
    ])
    .await;

    let owner = ctx("u1").owner().unwrap().clone();
    let store = store(&url);
    let payload = CategoryPayload::WorkoutPlan(vec![workout("w1", "Push Day")]);

    let err = store.save(&owner, &payload).await.unwrap_err();
    assert!(err.is_retryable());

    let err = store.save(&owner, &payload).await.unwrap_err();
    assert!(matches!(
        err,
        SyncError::Record(RecordError::MalformedPayload(ref reason)) if reason == "Invalid dataType"
    ));

    let err = store.save(&owner, &payload).await.unwrap_err();
    assert!(!err.is_retryable());

    server.await.unwrap();
}

#[tokio::test]
async fn test_bare_success_is_not_an_empty_account() {
    let (url, server) = serve(vec![("200 OK", json!({"success": true}))]).await;

    let engine = ReconciliationEngine::new(
        Arc::new(store(&url)),
        Arc::new(MemoryRetryQueue::new()),
        LocalCache::in_memory().unwrap(),
    );
    let ctx = ctx("u1");
    let report = engine.load(&ctx).await.unwrap();
    assert!(matches!(report.source, DataSource::Cache { .. }));
    assert!(!report.remote.is_known());

    server.await.unwrap();
}
