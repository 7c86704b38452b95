//! Integration tests for the payments routes against `PostgreSQL`.

mod common;

use axum::http::StatusCode;
use sqlx::PgPool;

async fn outbox_rows(pool: &PgPool) -> Vec<(i64, String, chrono::DateTime<chrono::Utc>)> {
    sqlx::query_as("SELECT entity_id, payload, created_at FROM outbox_messages ORDER BY created_at, id")
        .fetch_all(pool)
        .await
        .unwrap()
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_create_payment_persists_payment_and_outbox_entry(pool: PgPool) {
    let app = common::build_test_app(pool.clone());

    let (status, json) = common::post_json(
        app,
        "/payments",
        &serde_json::json!({ "user_id": 42, "amount": 1999 }),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    let id = json["id"].as_i64().unwrap();
    let rows = outbox_rows(&pool).await;
    assert_eq!(rows.len(), 1);
    let (entity_id, payload, created_at) = &rows[0];
    assert_eq!(*entity_id, id);
    assert_eq!(*created_at, common::fixed_time());
    let event: serde_json::Value = serde_json::from_str(payload).unwrap();
    assert_eq!(event["type"], "payment_created");
    assert_eq!(event["data"]["id"], id);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_payment_round_trip_through_update_and_get(pool: PgPool) {
    // POST /payments
    let app = common::build_test_app(pool.clone());
    let (_, created) = common::post_json(
        app,
        "/payments",
        &serde_json::json!({ "user_id": 1, "amount": 500 }),
    )
    .await;
    let id = created["id"].as_i64().unwrap();

    // PATCH /payments/{id}
    let app = common::build_test_app(pool.clone());
    let (status, updated) = common::patch_json(
        app,
        &format!("/payments/{id}"),
        &serde_json::json!({ "status": "authorized" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "authorized");

    // GET /payments/{id}
    let app = common::build_test_app(pool.clone());
    let (status, fetched) = common::get_json(app, &format!("/payments/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["status"], "authorized");

    let rows = outbox_rows(&pool).await;
    assert_eq!(rows.len(), 2);
    let event: serde_json::Value = serde_json::from_str(&rows[1].1).unwrap();
    assert_eq!(event["type"], "payment_updated");
    assert_eq!(event["data"]["status"], "authorized");
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_update_unknown_payment_returns_404_and_writes_nothing(pool: PgPool) {
    let app = common::build_test_app(pool.clone());

    let (status, json) = common::patch_json(
        app,
        "/payments/12345",
        &serde_json::json!({ "status": "completed" }),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "not_found");
    assert!(outbox_rows(&pool).await.is_empty());
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_invalid_payment_returns_400_and_writes_nothing(pool: PgPool) {
    let app = common::build_test_app(pool.clone());

    let (status, _) = common::post_json(
        app,
        "/payments",
        &serde_json::json!({ "user_id": 1, "amount": -5 }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let payments: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM payment")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(payments, 0);
    assert!(outbox_rows(&pool).await.is_empty());
}
