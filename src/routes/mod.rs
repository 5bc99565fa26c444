//! API routes

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::{Reply, Statistics};
use crate::session::SessionInfo;
use crate::AppState;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// The user's message
    pub message: String,

    /// Session to continue; a new one is started when absent
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<Reply>, ApiError> {
    let session_id = match request.session_id {
        Some(id) if !id.trim().is_empty() => id,
        _ => Uuid::new_v4().to_string(),
    };

    if request.message.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "message must not be empty"));
    }

    let reply = state
        .assistant
        .handle_utterance(&session_id, &request.message)
        .await;
    Ok(Json(reply))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionInfo>, ApiError> {
    state
        .assistant
        .session_info(&id)
        .await
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("session {} not found", id)))
}

async fn delete_session(State(state): State<AppState>, Path(id): Path<String>) -> StatusCode {
    if state.assistant.end_session(&id).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn stats(State(state): State<AppState>) -> Result<Json<Statistics>, ApiError> {
    state.assistant.statistics().await.map(Json).map_err(|e| {
        tracing::error!(error = %e, "statistics unavailable");
        api_error(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
    })
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/v1/chat", post(chat))
        .route("/v1/sessions/:id", get(get_session).delete(delete_session))
        .route("/v1/stats", get(stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use axum::response::Response;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    use crate::catalog::query::fixtures::sample_books;
    use crate::config::AssistantConfig;
    use crate::store::{BookStore, SqliteStore};
    use crate::Assistant;

    async fn app() -> Router {
        let store = SqliteStore::new_in_memory_async().await.unwrap();
        store.insert_books(&sample_books()).await.unwrap();
        let assistant = Arc::new(Assistant::new(Arc::new(store), AssistantConfig::default()));
        router().with_state(AppState { assistant })
    }

    fn post_chat(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/v1/chat")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app().await.oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_chat_starts_and_continues_session() {
        let app = app().await;

        let response = app
            .clone()
            .oneshot(post_chat(json!({ "message": "Đặt mua Gilead" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["intent"], "order_start");
        assert_eq!(body["stage"], "awaiting_quantity");
        let session_id = body["session_id"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(post_chat(json!({ "session_id": session_id, "message": "2" })))
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["stage"], "awaiting_address");

        let response = app
            .clone()
            .oneshot(get(&format!("/v1/sessions/{}", session_id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["stage"], "awaiting_address");
        assert_eq!(body["state"]["quantity"], 2);
        assert_eq!(body["message_count"], 4);
    }

    #[tokio::test]
    async fn test_empty_message_is_rejected() {
        let response = app()
            .await
            .oneshot(post_chat(json!({ "message": "   " })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_session_lifecycle_endpoints() {
        let app = app().await;

        let response = app.clone().oneshot(get("/v1/sessions/nope")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        app.clone()
            .oneshot(post_chat(json!({ "session_id": "s1", "message": "Xin chào" })))
            .await
            .unwrap();

        let delete = Request::builder()
            .method("DELETE")
            .uri("/v1/sessions/s1")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(delete).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app.clone().oneshot(get("/v1/sessions/s1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_stats() {
        let app = app().await;
        app.clone()
            .oneshot(post_chat(json!({ "session_id": "s1", "message": "Tìm sách Gilead" })))
            .await
            .unwrap();

        let response = app.oneshot(get("/v1/stats")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["store"]["books"], 6);
        assert_eq!(body["sessions"]["active_sessions"], 1);
    }
}
