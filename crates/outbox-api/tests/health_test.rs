//! Integration tests for liveness and readiness.

mod common;

use axum::http::StatusCode;
use sqlx::PgPool;

#[sqlx::test(migrations = "../../migrations")]
async fn test_liveness_and_readiness_report_ok(pool: PgPool) {
    for uri in ["/health", "/ready"] {
        let (status, json) = common::get_json(common::build_test_app(pool.clone()), uri).await;

        assert_eq!(status, StatusCode::OK, "{uri}");
        assert_eq!(json["status"], "ok", "{uri}");
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"), "{uri}");
    }
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_ready_returns_503_once_pool_is_closed(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    pool.close().await;

    let (status, json) = common::get_json(app, "/ready").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["status"], "unavailable");
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_liveness_does_not_touch_the_database(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    pool.close().await;

    let (status, _) = common::get_json(app, "/health").await;

    assert_eq!(status, StatusCode::OK);
}
