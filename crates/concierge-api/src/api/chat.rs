use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response, Sse},
    routing::{get, post},
};
use axum::response::sse::{Event, KeepAlive};
use concierge_common::{ConciergeError, DEFAULT_SESSION_ID};
use concierge_core::{SessionStore, StreamFragment};
use futures::{StreamExt, stream};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Clone)]
pub struct ChatState {
    pub sessions: Arc<SessionStore>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ChatRequest {
    pub message: String,
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub intent: String,
    pub sentiment: String,
    pub session_id: String,
}

/// Any pipeline failure, reported as 500 `{detail}`
#[derive(Debug)]
pub struct ApiError(ConciergeError);

impl From<ConciergeError> for ApiError {
    fn from(err: ConciergeError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!(kind = self.0.kind(), "Chat request failed: {}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "detail": self.0.to_string() })),
        )
            .into_response()
    }
}

pub fn chat_routes(state: ChatState) -> Router {
    Router::new()
        .route("/chat", post(chat))
        .route("/chat/stream", post(chat_stream))
        .route("/health", get(health))
        .with_state(state)
}

fn session_id(request: &ChatRequest) -> String {
    match request.session_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => DEFAULT_SESSION_ID.to_string(),
    }
}

/// Handler for `POST /chat`
pub async fn chat(
    State(state): State<ChatState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let request_id = Uuid::new_v4();
    let session_id = session_id(&request);
    info!(%request_id, %session_id, "Chat request");

    let agent = state.sessions.agent(&session_id).await?;
    let output = agent.handle_message(&request.message).await?;

    Ok(Json(ChatResponse {
        response: output.response,
        intent: output.intent,
        sentiment: output.sentiment,
        session_id,
    }))
}

/// Handler for `POST /chat/stream`
///
/// Response chunks are sent as plain `data:` events, then a `labels` event
/// and a closing `done` event.
pub async fn chat_stream(
    State(state): State<ChatState>,
    Json(request): Json<ChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let request_id = Uuid::new_v4();
    let session_id = session_id(&request);
    info!(%request_id, %session_id, "Streaming chat request");

    let agent = state.sessions.agent(&session_id).await?;
    let fragments = agent.handle_message_stream(&request.message).await?;

    let events = fragments
        .map(|fragment| match fragment {
            StreamFragment::Response(chunk) => Event::default().data(chunk),
            StreamFragment::Labels { intent, sentiment } => Event::default()
                .event("labels")
                .data(json!({ "intent": intent, "sentiment": sentiment }).to_string()),
        })
        .chain(stream::once(async { Event::default().event("done").data("") }))
        .map(Ok::<Event, Infallible>);

    Ok(Sse::new(events).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

/// Handler for `GET /health`
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use concierge_common::AgentConfig;
    use concierge_core::{AiService, InternalChatMessage, KnowledgeBase, ModelTurn, ToolSpec};
    use serde_json::Value;
    use tower::util::ServiceExt;

    struct FixedService {
        reply: &'static str,
    }

    #[async_trait]
    impl AiService for FixedService {
        async fn generate_response(
            &self,
            _messages: &[InternalChatMessage],
            _tools: &[ToolSpec],
        ) -> anyhow::Result<ModelTurn> {
            Ok(ModelTurn::Text(self.reply.to_string()))
        }
    }

    const GOOD_REPLY: &str = r#"{"response": "You can return it within 30 days of purchase.", "intent": "return request", "sentiment": "neutral"}"#;

    fn app_with(reply: &'static str) -> Router {
        let sessions = SessionStore::new(
            Arc::new(AgentConfig::builder().stream_chunk_chars(12).build().unwrap()),
            Arc::new(FixedService { reply }),
            Arc::new(KnowledgeBase::sample()),
            "support",
        )
        .unwrap();
        crate::api::app(ChatState {
            sessions: Arc::new(sessions),
        })
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .method("POST")
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app_with(GOOD_REPLY).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body, json!({"status": "healthy"}));
    }

    #[tokio::test]
    async fn test_chat_returns_structured_reply() {
        let request = post_json(
            "/chat",
            json!({
                "message": "I want to return a product I bought last week",
                "session_id": "abc"
            }),
        );
        let response = app_with(GOOD_REPLY).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body: ChatResponse = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body.response, "You can return it within 30 days of purchase.");
        assert_eq!(body.intent, "return request");
        assert_eq!(body.sentiment, "neutral");
        assert_eq!(body.session_id, "abc");
    }

    #[tokio::test]
    async fn test_chat_without_session_uses_default() {
        let response = app_with(GOOD_REPLY)
            .oneshot(post_json("/chat", json!({"message": "hello"})))
            .await
            .unwrap();
        let body: ChatResponse = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body.session_id, "default");
    }

    #[tokio::test]
    async fn test_chat_failure_is_500_with_detail() {
        let response = app_with("I am not JSON")
            .oneshot(post_json("/chat", json!({"message": "hello"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert!(body["detail"].as_str().unwrap().contains("no JSON object"));
    }

    #[tokio::test]
    async fn test_stream_event_framing() {
        let response = app_with(GOOD_REPLY)
            .oneshot(post_json("/chat/stream", json!({"message": "return?"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"].to_str().unwrap(),
            "text/event-stream"
        );

        let body = body_string(response).await;
        let labels = body.find("event: labels").unwrap();
        let done = body.find("event: done").unwrap();
        assert!(labels < done);
        assert!(body[..labels].matches("data: ").count() > 1);
        assert!(body.contains(r#"data: {"intent":"return request","sentiment":"neutral"}"#));
    }

    #[tokio::test]
    async fn test_stream_failure_is_500_before_streaming() {
        let response = app_with("{}")
            .oneshot(post_json("/chat/stream", json!({"message": "hello"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert!(body["detail"].as_str().unwrap().contains("response"));
    }
}
