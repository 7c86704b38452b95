//! Scrape and health endpoints of the relay.

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing::get};
use serde_json::{Value, json};

use crate::metrics::RelayMetrics;

/// GET /metrics
async fn metrics_handler(State(metrics): State<RelayMetrics>) -> Response {
    match metrics.render() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
    }
}

/// GET /health
async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Returns the router serving `/metrics` and `/health`.
pub fn router(metrics: RelayMetrics) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_check))
        .with_state(metrics)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::dispatcher::CycleOutcome;

    async fn get(app: Router, uri: &str) -> (StatusCode, String) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_metrics_endpoint_exposes_counters() {
        // Arrange
        let metrics = RelayMetrics::new().unwrap();
        metrics.record(&CycleOutcome::Delivered { count: 7 }, Duration::from_millis(3));
        metrics.record(
            &CycleOutcome::Failed {
                count: 2,
                retried: 2,
                dead_lettered: 0,
            },
            Duration::from_millis(3),
        );

        // Act
        let (status, body) = get(router(metrics), "/metrics").await;

        // Assert
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("messages_processed_total 7"));
        assert!(body.contains("messages_failed_total 2"));
        assert!(body.contains("messages_retried_total 2"));
    }

    #[tokio::test]
    async fn test_health_returns_ok() {
        let (status, body) = get(router(RelayMetrics::new().unwrap()), "/health").await;

        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert!(json["version"].is_string());
    }
}
