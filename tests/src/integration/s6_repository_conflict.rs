use axum::http::StatusCode;

use crate::support::{fresh_router, get, register, send_json, ADMIN_TOKEN};

fn repo_submission(version: &str) -> serde_json::Value {
    serde_json::json!({
        "repositories": [{
            "repo_name": "core",
            "primary_url": "https://mirror.example.com/core",
            "mirrors": [],
            "packages": [
                {"name": "pkgX", "version": version, "repository": "core", "architecture": "x86_64", "description": null}
            ],
        }]
    })
}

#[tokio::test]
async fn newest_policy_suggests_the_higher_version() {
    let router = fresh_router().await;

    let (status, pool) = send_json(
        &router,
        "POST",
        "/api/pools",
        Some(ADMIN_TOKEN),
        serde_json::json!({"name": "fleet", "sync_policy": {"auto_sync": false, "exclude_packages": [], "include_aur": false, "conflict_resolution": "newest"}}),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{pool}");
    let pool_id = pool["id"].as_str().unwrap().to_string();

    let (endpoint_1, token_1) = register(&router, "e1", "host-1").await;
    let (endpoint_2, token_2) = register(&router, "e2", "host-2").await;

    for endpoint_id in [&endpoint_1, &endpoint_2] {
        let (status, _) = send_json(&router, "PUT", &format!("/api/endpoints/{endpoint_id}/pool?pool_id={pool_id}"), Some(ADMIN_TOKEN), serde_json::Value::Null).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, _) = send_json(&router, "POST", &format!("/api/endpoints/{endpoint_1}/repositories"), Some(&token_1), repo_submission("1.0")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send_json(&router, "POST", &format!("/api/endpoints/{endpoint_2}/repositories"), Some(&token_2), repo_submission("2.0")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, analysis) = get(&router, &format!("/api/repositories/analysis/{pool_id}"), None).await;
    assert_eq!(status, StatusCode::OK, "{analysis}");

    let conflicts = analysis["conflicts"].as_array().unwrap();
    let pkg_x = conflicts.iter().find(|c| c["package_name"] == "pkgX").expect("pkgX should be in conflict");
    assert_eq!(pkg_x["suggested_resolution"], "2.0");
}
