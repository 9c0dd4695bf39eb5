//! Router assembly: HTTP endpoints, WebSocket upgrade, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Build the application router with:
/// - WebSocket at `/ws` (one session per connection)
/// - REST-ish API under `/api/v1/...`, sessions addressed by id
/// - CORS (allow any origin/method/headers); tighten for production if needed
/// - Body limit from `limits.max_body_bytes` (axum's 2 MB default is too small for documents)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = state.limits.max_body_bytes;
    Router::new()
        // WebSocket
        .route("/ws", get(ws::ws_upgrade))
        // HTTP API
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/sessions", post(http::http_create_session))
        .route(
            "/api/v1/sessions/:id",
            get(http::http_get_session).delete(http::http_delete_session),
        )
        .route("/api/v1/sessions/:id/document", post(http::http_post_document))
        .route("/api/v1/sessions/:id/ask", post(http::http_post_ask))
        .route(
            "/api/v1/sessions/:id/history",
            get(http::http_get_history).delete(http::http_delete_history),
        )
        .route("/api/v1/sessions/:id/challenge", post(http::http_start_challenge))
        .route("/api/v1/sessions/:id/challenge/check", post(http::http_post_check))
        .route("/api/v1/sessions/:id/challenge/reset", post(http::http_reset_challenge))
        // State + body limit + CORS + HTTP tracing
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Method, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::completion::testing::ScriptedCompletion;
    use crate::config::{Limits, Prompts};

    const QUESTIONS: &str = "1. What colour does the document say the sky is on a clear day?\n\
        2. What property of water does the short document explicitly mention here?\n\
        3. Which of the two statements in the document concerns a liquid substance?";

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let req = Request::builder().method(method).uri(uri);
        let req = match body {
            Some(b) => req
                .header("content-type", "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, value)
    }

    fn app_with(script: Arc<ScriptedCompletion>, limits: Limits) -> Router {
        build_router(Arc::new(AppState::new(script, Prompts::default(), limits)))
    }

    fn app(script: Arc<ScriptedCompletion>) -> Router {
        build_router(Arc::new(AppState::new(script, Prompts::default(), Limits::default())))
    }

    #[tokio::test]
    async fn health_and_unknown_session() {
        let app = app(Arc::new(ScriptedCompletion::default()));
        let (status, body) = call(&app, Method::GET, "/api/v1/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);

        let (status, body) = call(&app, Method::GET, "/api/v1/sessions/missing", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("missing"));
    }

    #[tokio::test]
    async fn challenge_flow_over_http() {
        let script = Arc::new(ScriptedCompletion::new(["Summary.", QUESTIONS, "Correct, well done."]));
        let app = app(script);

        let (status, body) = call(&app, Method::POST, "/api/v1/sessions", None).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body["sessionId"].as_str().unwrap().to_string();
        let base = format!("/api/v1/sessions/{id}");

        let (status, _) = call(&app, Method::POST, &format!("{base}/challenge"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let upload = json!({ "filename": "doc.txt", "contentBase64": "VGhlIHNreSBpcyBibHVlLiBXYXRlciBpcyB3ZXQu" });
        let (status, body) = call(&app, Method::POST, &format!("{base}/document"), Some(upload)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["summary"], "Summary.");
        assert_eq!(body["kind"], "txt");

        let (status, body) = call(&app, Method::POST, &format!("{base}/challenge"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["items"].as_array().unwrap().len(), 3);
        assert_eq!(body["completed"], false);

        let (status, body) =
            call(&app, Method::POST, &format!("{base}/challenge/check"), Some(json!({ "index": 0, "answer": " " }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "empty_answer");
        assert_eq!(body["item"]["attempts"], 0);

        let (status, body) =
            call(&app, Method::POST, &format!("{base}/challenge/check"), Some(json!({ "index": 0, "answer": "blue" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "evaluated");
        assert_eq!(body["correct"], true);
        assert_eq!(body["item"]["attempts"], 1);
        assert_eq!(body["item"]["status"], "correct");

        let (status, _) =
            call(&app, Method::POST, &format!("{base}/challenge/check"), Some(json!({ "index": 3, "answer": "x" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = call(&app, Method::GET, &base, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["document"], "doc.txt");
        assert_eq!(body["challenge"]["correctCount"], 1);

        let (status, _) = call(&app, Method::DELETE, &base, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = call(&app, Method::GET, &base, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unsupported_upload_and_missing_model() {
        let app = app(Arc::new(ScriptedCompletion::failing(crate::error::CompletionError::NotConfigured)));
        let (_, body) = call(&app, Method::POST, "/api/v1/sessions", None).await;
        let base = format!("/api/v1/sessions/{}", body["sessionId"].as_str().unwrap());

        let docx = json!({ "filename": "a.docx", "contentBase64": "aGk=" });
        let (status, _) = call(&app, Method::POST, &format!("{base}/document"), Some(docx)).await;
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);

        let txt = json!({ "filename": "a.txt", "contentBase64": "aGk=" });
        let (status, _) = call(&app, Method::POST, &format!("{base}/document"), Some(txt)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let (status, body) = call(&app, Method::DELETE, &format!("{base}/history"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(body, Value::Null);
    }

    #[tokio::test]
    async fn body_limit_follows_config() {
        // ~3 MB of base64: over axum's stock 2 MB cap, under the default limit.
        let big_txt = "a".repeat(3 * 1024 * 1024);
        let upload = json!({ "filename": "big.txt", "contentBase64": big_txt });

        let app = app(Arc::new(ScriptedCompletion::new(["Summary."])));
        let (_, body) = call(&app, Method::POST, "/api/v1/sessions", None).await;
        let uri = format!("/api/v1/sessions/{}/document", body["sessionId"].as_str().unwrap());
        let (status, body) = call(&app, Method::POST, &uri, Some(upload.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["summary"], "Summary.");

        let small = Limits { max_body_bytes: 1024 * 1024, ..Limits::default() };
        let app = app_with(Arc::new(ScriptedCompletion::new(["Summary."])), small);
        let (_, body) = call(&app, Method::POST, "/api/v1/sessions", None).await;
        let uri = format!("/api/v1/sessions/{}/document", body["sessionId"].as_str().unwrap());
        let req = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(upload.to_string()))
            .unwrap();
        let res = app.clone().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
