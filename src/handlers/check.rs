use axum::{
    Json,
    extract::{ConnectInfo, State, rejection::JsonRejection},
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::ApiError;
use crate::metrics::{DETECTION_LATENCY, DETECTIONS, RATE_LIMITED, REQUEST_TOTAL, TRACKED_CLIENTS};
use crate::models::{CheckRequest, CheckResponse};
use crate::rate_limit::RateDecision;
use crate::state::AppState;

// Quota is charged before the body is validated, so malformed requests count too
pub async fn check_wordpress_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    payload: Result<Json<CheckRequest>, JsonRejection>,
) -> Result<Json<CheckResponse>, ApiError> {
    REQUEST_TOTAL.inc();

    let client = addr.ip();
    let decision = state.rate_limiter.check(client);
    TRACKED_CLIENTS.set(state.rate_limiter.tracked() as f64);

    match decision {
        RateDecision::Allowed { remaining } => debug!(%client, remaining, "within quota"),
        RateDecision::Limited { reset_at } => {
            RATE_LIMITED.inc();
            warn!(%client, %reset_at, "rate limit exceeded");
            return Err(ApiError::RateLimited { reset_at });
        }
    }

    let url = match payload {
        Ok(Json(req)) => req.target(),
        Err(rejection) => {
            debug!(%client, error = %rejection, "rejected check request");
            return Err(ApiError::MissingUrl);
        }
    };

    let start_time = Instant::now();

    // run on its own task so a panic inside detection becomes a 500
    let detector = state.detector.clone();
    let task_url = url.clone();
    let is_wordpress = tokio::spawn(async move { detector.detect(&task_url).await })
        .await
        .map_err(|e| {
            error!(url, error = %e, "detection task failed");
            ApiError::Internal(e.to_string())
        })?;

    DETECTION_LATENCY.observe(start_time.elapsed().as_secs_f64());
    DETECTIONS
        .with_label_values(&[if is_wordpress { "wordpress" } else { "other" }])
        .inc();
    info!(url, %client, is_wordpress, "check complete");

    Ok(Json(CheckResponse { is_wordpress }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_USER_AGENT;
    use crate::detector::{Detector, DetectorConfig};
    use crate::rate_limit::RateLimiter;
    use axum::{
        Router,
        body::{Body, to_bytes},
        extract::connect_info::MockConnectInfo,
        http::{Request, StatusCode, header},
    };
    use serde_json::Value;
    use std::time::Duration;
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_app(limit: u32) -> Router {
        let detector = Detector::new(&DetectorConfig {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            fetch_timeout: Duration::from_secs(10),
            probe_timeout: Duration::from_secs(5),
        })
        .unwrap();
        let state = Arc::new(AppState {
            detector,
            rate_limiter: RateLimiter::new(limit, chrono::TimeDelta::days(1)),
        });
        crate::build_router(state).layer(MockConnectInfo(SocketAddr::from(([203, 0, 113, 7], 40000))))
    }

    fn post_json(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/check-wordpress")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn missing_url_is_bad_request() {
        let app = test_app(10);
        let (status, body) = send(&app, post_json("{}")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, serde_json::json!({ "error": "URL is required" }));
    }

    #[tokio::test]
    async fn malformed_or_empty_body_is_bad_request() {
        let app = test_app(10);

        let (status, body) = send(&app, post_json("{not json")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "URL is required");

        let empty = Request::builder()
            .method("POST")
            .uri("/api/check-wordpress")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, empty).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn non_string_url_reaches_detector_and_is_false() {
        let app = test_app(10);
        for body in [r#"{"url": 123}"#, r#"{"url": null}"#, r#"{"url": ["https://a.example"]}"#] {
            let (status, body) = send(&app, post_json(body)).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body, serde_json::json!({ "isWordPress": false }));
        }
    }

    #[tokio::test]
    async fn non_wordpress_site_returns_false() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<html><head><title>Example</title></head><body></body></html>"),
            )
            .mount(&server)
            .await;

        let app = test_app(10);
        let body = serde_json::json!({ "url": server.uri() }).to_string();
        let (status, body) = send(&app, post_json(&body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({ "isWordPress": false }));
    }

    #[tokio::test]
    async fn wordpress_site_returns_true() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<link rel="https://api.w.org/" href="/wp-json/"><script src="/wp-includes/js/x.js"></script>"#,
            ))
            .mount(&server)
            .await;

        let app = test_app(10);
        let body = serde_json::json!({ "url": server.uri() }).to_string();
        let (status, body) = send(&app, post_json(&body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["isWordPress"], true);
    }

    #[tokio::test]
    async fn unreachable_site_is_ok_and_false() {
        let app = test_app(10);
        let (status, body) = send(&app, post_json(r#"{"url": "http://127.0.0.1:1/"}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["isWordPress"], false);
    }

    #[tokio::test]
    async fn request_over_quota_is_rejected_with_reset() {
        let app = test_app(2);

        for _ in 0..2 {
            let (status, _) = send(&app, post_json("{}")).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
        }

        let (status, body) = send(&app, post_json("{}")).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"], "Rate limit exceeded");
        let reset = body["reset"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(reset).unwrap() > chrono::Utc::now());
    }

    #[tokio::test]
    async fn health_and_metrics_are_served() {
        let app = test_app(10);
        send(&app, post_json("{}")).await;

        let (status, body) = send(
            &app,
            Request::builder().uri("/health").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");

        let res = app
            .clone()
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("wpcheck_requests_total"));
    }
}
