use std::{net::SocketAddr, time::Duration};

use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::state::AppState;
use crate::{auth, goals, meal_options, meals, planner, reports};

pub fn build_app(state: AppState) -> Router {
    let request_timeout = Duration::from_secs(state.config.request_timeout_secs);

    Router::new()
        .nest(
            "/api/v1",
            Router::new()
                .merge(auth::router())
                .merge(goals::router())
                .merge(meals::router())
                .merge(meal_options::router())
                .merge(planner::router())
                .merge(reports::router())
                .route("/health", get(|| async { "ok" })),
        )
        .with_state(state)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!(
                        "http_request",
                        %method,
                        uri = %uri,
                        status = tracing::field::Empty
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>, latency: Duration, span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = latency.as_millis() as u64;
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod router_tests {
    use super::*;
    use crate::auth::jwt::JwtKeys;
    use axum::{
        body::Body,
        extract::FromRef,
        http::{header, Method, Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt;
    use uuid::Uuid;

    fn bearer(state: &AppState) -> String {
        let token = JwtKeys::from_ref(state).sign_access(Uuid::new_v4()).unwrap();
        format!("Bearer {token}")
    }

    async fn send(req: Request<Body>) -> (StatusCode, Value) {
        let app = build_app(AppState::fake());
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, json)
    }

    fn authed(method: Method, uri: &str, body: Option<&str>) -> Request<Body> {
        let state = AppState::fake();
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, bearer(&state));
        match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    #[tokio::test]
    async fn health_is_public() {
        let app = build_app(AppState::fake());
        let resp = app
            .oneshot(Request::get("/api/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn protected_routes_need_a_token() {
        let (status, body) = send(
            Request::get("/api/v1/caloric-goals")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Missing Authorization header");
    }

    #[tokio::test]
    async fn goal_below_minimum_is_rejected() {
        let (status, body) = send(authed(
            Method::POST,
            "/api/v1/caloric-goals",
            Some(r#"{"daily_calories": 499, "start_date": "2026-01-01"}"#),
        ))
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("500"));
    }

    #[tokio::test]
    async fn mistyped_json_field_is_a_400_with_error_body() {
        let (status, body) = send(authed(
            Method::POST,
            "/api/v1/caloric-goals",
            Some(r#"{"daily_calories": "2000", "start_date": "2026-01-01"}"#),
        ))
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("daily_calories"));
    }

    #[tokio::test]
    async fn broken_plan_body_is_not_ignored() {
        let (status, body) = send(authed(
            Method::POST,
            "/api/v1/meals/generate",
            Some(r#"{"target_calories": "lots"}"#),
        ))
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn last_calendar_week_is_rejected_not_crashed() {
        let (status, body) = send(authed(
            Method::GET,
            "/api/v1/reports/weekly?week_start=9999-12-27",
            None,
        ))
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "week_start out of range");
    }

    #[tokio::test]
    async fn weekly_report_needs_a_monday() {
        // 2026-01-06 is a Tuesday
        let (status, body) = send(authed(
            Method::GET,
            "/api/v1/reports/weekly?week_start=2026-01-06",
            None,
        ))
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("Monday"));

        let (status, body) = send(authed(
            Method::GET,
            "/api/v1/reports/weekly?week_start=06/01/2026",
            None,
        ))
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid week_start format. Use Y-m-d.");
    }

    #[tokio::test]
    async fn shopping_list_needs_both_bounds() {
        let (status, body) =
            send(authed(Method::GET, "/api/v1/shopping-list?start=2026-01-05", None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing start or end date");
    }

    #[tokio::test]
    async fn plan_target_is_range_checked() {
        let (status, _) = send(authed(
            Method::POST,
            "/api/v1/meals/generate",
            Some(r#"{"date": "2026-01-05", "target_calories": 100}"#),
        ))
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn register_rejects_bad_email_before_lookup() {
        let (status, body) = send(
            Request::post("/api/v1/auth/register")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"email": "nope", "password": "longenough"}"#))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid email");
    }
}
