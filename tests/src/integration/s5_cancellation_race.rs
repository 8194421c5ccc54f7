use axum::http::StatusCode;
use chrono::Utc;

use crate::support::{fresh_router, get, register, send_json};

fn package_state(version: &str) -> serde_json::Value {
    serde_json::json!({
        "timestamp": Utc::now().to_rfc3339(),
        "pacman_version": "6.0.2",
        "architecture": "x86_64",
        "packages": [
            {"package_name": "pkgX", "version": version, "repository": "core", "installed_size": 1024, "dependencies": []}
        ],
    })
}

#[tokio::test]
async fn queued_op_fails_on_cancel_in_progress_op_rejects_cancel() {
    let router = fresh_router().await;
    let (endpoint_a, token_a) = register(&router, "a", "host-a").await;

    send_json(&router, "POST", &format!("/api/states/{endpoint_a}"), Some(&token_a), package_state("1.0")).await;
    send_json(&router, "POST", &format!("/api/states/{endpoint_a}"), Some(&token_a), package_state("2.0")).await;

    // First revert is picked up synchronously (nothing else in flight).
    let (status, op_running) = send_json(&router, "POST", &format!("/api/sync/{endpoint_a}/revert"), Some(&token_a), serde_json::Value::Null).await;
    assert_eq!(status, StatusCode::OK, "{op_running}");
    let running_id = op_running["id"].as_str().unwrap().to_string();
    let (status, running_after) = get(&router, &format!("/api/sync/operations/{running_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(running_after["status"], "in_progress");

    // Second revert queues behind it, still pending.
    let (status, op_queued) = send_json(&router, "POST", &format!("/api/sync/{endpoint_a}/revert"), Some(&token_a), serde_json::Value::Null).await;
    assert_eq!(status, StatusCode::OK, "{op_queued}");
    let queued_id = op_queued["id"].as_str().unwrap().to_string();
    let (status, queued_before) = get(&router, &format!("/api/sync/operations/{queued_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(queued_before["status"], "pending");

    // Cancel the queued one before pickup: pending -> failed("cancelled").
    let (status, _) = send_json(&router, "POST", &format!("/api/sync/operations/{queued_id}/cancel"), Some(&token_a), serde_json::Value::Null).await;
    assert_eq!(status, StatusCode::OK);
    let (status, queued_after) = get(&router, &format!("/api/sync/operations/{queued_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(queued_after["status"], "failed");

    // Cancelling the already in-progress operation is rejected.
    let (status, _) = send_json(&router, "POST", &format!("/api/sync/operations/{running_id}/cancel"), Some(&token_a), serde_json::Value::Null).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
