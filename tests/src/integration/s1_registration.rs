use axum::http::StatusCode;

use crate::support::{fresh_router, register, send_json};

#[tokio::test]
async fn repeated_registration_keeps_the_id_and_rotates_the_token() {
    let router = fresh_router().await;

    let (id1, token1) = register(&router, "alpha", "h1").await;
    let (status, body) = send_json(&router, "POST", "/api/endpoints/register", None, serde_json::json!({"name": "alpha", "hostname": "h1"})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["endpoint"]["id"], id1);
    assert_ne!(body["auth_token"].as_str().unwrap(), token1);
}
