use axum::http::StatusCode;

use crate::support::{fresh_router, register, send_json};

#[tokio::test]
async fn one_endpoints_token_cannot_mutate_another_endpoint() {
    let router = fresh_router().await;
    let (_endpoint_a, token_a) = register(&router, "a", "host-a").await;
    let (endpoint_b, _token_b) = register(&router, "b", "host-b").await;

    let (status, body) = send_json(&router, "PUT", &format!("/api/endpoints/{endpoint_b}/status"), Some(&token_a), serde_json::json!({"status": "in_sync"})).await;

    assert_eq!(status, StatusCode::FORBIDDEN, "{body}");
}
