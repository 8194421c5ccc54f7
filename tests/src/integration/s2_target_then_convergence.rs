use axum::http::StatusCode;
use chrono::Utc;

use crate::support::{fresh_router, get, register, send_json, ADMIN_TOKEN};

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
async fn set_as_latest_then_sync_to_latest_converges() {
    let router = fresh_router().await;

    let (_, admin) = (String::new(), ADMIN_TOKEN);
    let (status, body) = send_json(&router, "POST", "/api/pools", Some(admin), serde_json::json!({"name": "fleet"})).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let pool_id = body["id"].as_str().unwrap().to_string();

    let (endpoint_a, token_a) = register(&router, "a", "host-a").await;
    let (endpoint_b, token_b) = register(&router, "b", "host-b").await;

    for endpoint_id in [&endpoint_a, &endpoint_b] {
        let (status, body) = send_json(&router, "PUT", &format!("/api/endpoints/{endpoint_id}/pool?pool_id={pool_id}"), Some(admin), serde_json::Value::Null).await;
        assert_eq!(status, StatusCode::OK, "{body}");
    }

    let (status, _) = send_json(&router, "POST", &format!("/api/states/{endpoint_a}"), Some(&token_a), package_state("1.0")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send_json(&router, "POST", &format!("/api/states/{endpoint_b}"), Some(&token_b), package_state("1.0")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, o1) = send_json(&router, "POST", &format!("/api/sync/{endpoint_a}/set-as-latest"), Some(&token_a), serde_json::Value::Null).await;
    assert_eq!(status, StatusCode::OK, "{o1}");
    let o1_id = o1["id"].as_str().unwrap().to_string();
    let (status, _) = send_json(&router, "POST", &format!("/api/sync/operations/{o1_id}/complete"), Some(&token_a), serde_json::json!({"success": true})).await;
    assert_eq!(status, StatusCode::OK);

    let (status, o1_after) = get(&router, &format!("/api/sync/operations/{o1_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(o1_after["status"], "completed");

    let (status, pool_after) = get(&router, &format!("/api/pools/{pool_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(pool_after["target_state_id"].is_string(), "{pool_after}");

    let (status, o2) = send_json(&router, "POST", &format!("/api/sync/{endpoint_b}/sync-to-latest"), Some(&token_b), serde_json::Value::Null).await;
    assert_eq!(status, StatusCode::OK, "{o2}");
    let o2_id = o2["id"].as_str().unwrap().to_string();
    let (status, _) = send_json(&router, "POST", &format!("/api/sync/operations/{o2_id}/complete"), Some(&token_b), serde_json::json!({"success": true})).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send_json(&router, "PUT", &format!("/api/endpoints/{endpoint_b}/status"), Some(&token_b), serde_json::json!({"status": "in_sync"})).await;
    assert_eq!(status, StatusCode::OK);

    let (status, endpoint_after) = get(&router, &format!("/api/endpoints/{endpoint_b}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(endpoint_after["sync_status"], "in_sync");
}
