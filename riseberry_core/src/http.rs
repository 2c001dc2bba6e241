//! HTTP surface of the alarm clock.
//!
//! `/alarm` reads and replaces the alarm as JSON; every other path is served
//! from the static assets directory.

use std::path::Path;

use axum::{
    extract::{rejection::JsonRejection, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use error_stack::Report;
use serde_json::json;
use tower_http::services::ServeDir;
use tracing::{error, info, warn};

use crate::{actor::AlarmClock, alarm::Alarm, error::RiseberryError};

/// Builds the router for `clock`, serving static files from `assets`.
pub fn router(clock: AlarmClock, assets: impl AsRef<Path>) -> Router {
    Router::new()
        .route(
            "/alarm",
            get(get_alarm).put(put_alarm).fallback(method_not_allowed),
        )
        .with_state(clock)
        .fallback_service(ServeDir::new(assets.as_ref()))
        .layer(middleware::from_fn(log_request))
}

async fn get_alarm(State(clock): State<AlarmClock>) -> Result<Json<Alarm>, ApiError> {
    Ok(Json(clock.get().await?))
}

async fn put_alarm(
    State(clock): State<AlarmClock>,
    body: Result<Json<Alarm>, JsonRejection>,
) -> Result<Json<Alarm>, ApiError> {
    let Json(alarm) = body.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    clock.set(alarm).await?;
    Ok(Json(alarm))
}

async fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(header::ALLOW, "GET, PUT")],
        Json(json!({ "error": "method not allowed" })),
    )
        .into_response()
}

async fn log_request(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let response = next.run(req).await;
    info!("{} {} {}", response.status().as_u16(), method, path);
    response
}

enum ApiError {
    BadRequest(String),
    Internal(String),
}

impl From<Report<RiseberryError>> for ApiError {
    fn from(report: Report<RiseberryError>) -> Self {
        match report.current_context() {
            RiseberryError::InvalidAlarm(_) => {
                warn!("Rejected alarm: {}", report.current_context());
                ApiError::BadRequest(report.current_context().to_string())
            }
            _ => {
                error!("Alarm clock request failed: {:?}", report);
                ApiError::Internal(report.current_context().to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingPlayer;
    use serde_json::Value;
    use std::sync::Arc;
    use tokio::net::TcpListener;

    async fn start(assets: &Path) -> (String, AlarmClock) {
        let clock = AlarmClock::spawn(Arc::new(RecordingPlayer::new()));
        let app = router(clock.clone(), assets);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), clock)
    }

    #[tokio::test]
    async fn test_get_default_alarm() {
        let assets = tempfile::tempdir().unwrap();
        let (base, _clock) = start(assets.path()).await;

        let response = reqwest::get(format!("{base}/alarm")).await.unwrap();
        assert_eq!(response.status(), 200);
        let body: Value = response.json().await.unwrap();
        assert_eq!(
            body,
            json!({ "hour": 0, "minute": 0, "zone": 0, "enabled": false })
        );
    }

    #[tokio::test]
    async fn test_put_stores_and_echoes_alarm() {
        let assets = tempfile::tempdir().unwrap();
        let (base, clock) = start(assets.path()).await;
        let client = reqwest::Client::new();

        let alarm = json!({ "hour": 7, "minute": 15, "zone": -18000, "enabled": true });
        let response = client
            .put(format!("{base}/alarm"))
            .json(&alarm)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.json::<Value>().await.unwrap(), alarm);

        assert_eq!(clock.get().await.unwrap(), Alarm::new(7, 15, -18000, true));
        let fetched: Value = reqwest::get(format!("{base}/alarm"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(fetched, alarm);
    }

    #[tokio::test]
    async fn test_put_missing_fields_default() {
        let assets = tempfile::tempdir().unwrap();
        let (base, clock) = start(assets.path()).await;

        let response = reqwest::Client::new()
            .put(format!("{base}/alarm"))
            .json(&json!({ "hour": 6 }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(clock.get().await.unwrap(), Alarm::new(6, 0, 0, false));
    }

    #[tokio::test]
    async fn test_put_malformed_json_is_bad_request() {
        let assets = tempfile::tempdir().unwrap();
        let (base, clock) = start(assets.path()).await;

        let response = reqwest::Client::new()
            .put(format!("{base}/alarm"))
            .header("content-type", "application/json")
            .body("{\"hour\": ")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
        let body: Value = response.json().await.unwrap();
        assert!(body["error"].is_string());
        assert_eq!(clock.get().await.unwrap(), Alarm::default());
    }

    #[tokio::test]
    async fn test_put_out_of_range_leaves_alarm_unchanged() {
        let assets = tempfile::tempdir().unwrap();
        let (base, clock) = start(assets.path()).await;
        clock.set(Alarm::new(6, 30, 0, true)).await.unwrap();

        let response = reqwest::Client::new()
            .put(format!("{base}/alarm"))
            .json(&json!({ "hour": 25, "minute": 0, "zone": 0, "enabled": true }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
        let body: Value = response.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("hour"));
        assert_eq!(clock.get().await.unwrap(), Alarm::new(6, 30, 0, true));
    }

    #[tokio::test]
    async fn test_put_extreme_zone_is_bad_request() {
        let assets = tempfile::tempdir().unwrap();
        let (base, clock) = start(assets.path()).await;
        let client = reqwest::Client::new();

        for zone in [i32::MIN, i32::MAX] {
            let response = client
                .put(format!("{base}/alarm"))
                .json(&json!({ "hour": 7, "minute": 0, "zone": zone, "enabled": true }))
                .send()
                .await
                .unwrap();
            assert_eq!(response.status(), 400);
            let body: Value = response.json().await.unwrap();
            assert!(body["error"].as_str().unwrap().contains("zone"));
        }
        let status = clock.status().await.unwrap();
        assert_eq!(status.alarm, Alarm::default());
        assert!(status.next_fire.is_none());
    }

    #[tokio::test]
    async fn test_other_methods_are_not_allowed() {
        let assets = tempfile::tempdir().unwrap();
        let (base, _clock) = start(assets.path()).await;

        let response = reqwest::Client::new()
            .delete(format!("{base}/alarm"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 405);
        assert_eq!(response.headers()["allow"], "GET, PUT");
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error"], "method not allowed");
    }

    #[tokio::test]
    async fn test_closed_clock_is_internal_error() {
        let assets = tempfile::tempdir().unwrap();
        let (base, clock) = start(assets.path()).await;
        clock.close().await.unwrap();

        let response = reqwest::get(format!("{base}/alarm")).await.unwrap();
        assert_eq!(response.status(), 500);
        let body: Value = response.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("closed"));
    }

    #[tokio::test]
    async fn test_static_assets_fallback() {
        let assets = tempfile::tempdir().unwrap();
        std::fs::write(assets.path().join("index.html"), "<h1>riseberry</h1>").unwrap();
        let (base, _clock) = start(assets.path()).await;

        let response = reqwest::get(format!("{base}/index.html")).await.unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.text().await.unwrap(), "<h1>riseberry</h1>");

        let response = reqwest::get(format!("{base}/")).await.unwrap();
        assert_eq!(response.status(), 200);

        let response = reqwest::get(format!("{base}/missing.js")).await.unwrap();
        assert_eq!(response.status(), 404);
    }
}
