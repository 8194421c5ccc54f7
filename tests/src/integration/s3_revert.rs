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
async fn revert_does_not_delete_history() {
    let router = fresh_router().await;
    let (endpoint_a, token_a) = register(&router, "a", "host-a").await;

    let (status, _) = send_json(&router, "POST", &format!("/api/states/{endpoint_a}"), Some(&token_a), package_state("1.0")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send_json(&router, "POST", &format!("/api/states/{endpoint_a}"), Some(&token_a), package_state("2.0")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, op) = send_json(&router, "POST", &format!("/api/sync/{endpoint_a}/revert"), Some(&token_a), serde_json::Value::Null).await;
    assert_eq!(status, StatusCode::OK, "{op}");
    let op_id = op["id"].as_str().unwrap().to_string();
    let (status, _) = send_json(&router, "POST", &format!("/api/sync/operations/{op_id}/complete"), Some(&token_a), serde_json::json!({"success": true})).await;
    assert_eq!(status, StatusCode::OK);

    let (status, op_after) = get(&router, &format!("/api/sync/operations/{op_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(op_after["status"], "completed");

    let (status, history) = get(&router, &format!("/api/states/endpoint/{endpoint_a}?limit=2"), None).await;
    assert_eq!(status, StatusCode::OK);
    let top = &history.as_array().unwrap()[0];
    assert_eq!(top["packages"][0]["version"], "2.0");
}
