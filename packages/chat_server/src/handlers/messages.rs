use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::debug;

use chat_presence::{ChatMessage, Event};

use crate::AppState;
use crate::error::ApiError;
use crate::identity::CallerId;

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub text: Option<String>,
    /// URL of an already-uploaded image
    #[serde(default)]
    pub image: Option<String>,
}

/// `POST /api/messages/send/{receiver_id}`
///
/// Stores the message, then pushes `newMessage` to the receiver's live
/// connections. Never the other way round: a notified client must be able
/// to read the message back.
pub async fn send_message_handler(
    State(state): State<AppState>,
    CallerId(sender_id): CallerId,
    Path(receiver_id): Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<ChatMessage>), ApiError> {
    // Same normalization as `CallerId` and the WebSocket handshake
    let receiver_id = receiver_id.trim().to_string();
    if receiver_id.is_empty() {
        return Err(ApiError::InvalidUserId);
    }

    let text = req.text.filter(|t| !t.trim().is_empty());
    let image = req.image.filter(|i| !i.trim().is_empty());
    if text.is_none() && image.is_none() {
        return Err(ApiError::EmptyMessage);
    }
    let max = state.config.max_text_len;
    if text.as_ref().is_some_and(|t| t.chars().count() > max) {
        return Err(ApiError::MessageTooLong { max });
    }

    let message = ChatMessage {
        id: uuid::Uuid::new_v4().to_string(),
        sender_id,
        receiver_id,
        text,
        image,
        created_at: Utc::now(),
    };

    let message = state.store.insert(message).await;
    state.metrics.message_persisted();

    let report = state
        .hub
        .deliver_to_user(&message.receiver_id, &Event::NewMessage(message.clone()))
        .await;
    debug!(
        message_id = %message.id,
        receiver = %message.receiver_id,
        delivered = report.delivered,
        failed = report.failed,
        "Message stored"
    );

    Ok((StatusCode::CREATED, Json(message)))
}

/// `GET /api/messages/{peer_id}` - conversation between the caller and a peer
pub async fn get_conversation_handler(
    State(state): State<AppState>,
    CallerId(caller): CallerId,
    Path(peer_id): Path<String>,
) -> Json<Vec<ChatMessage>> {
    Json(state.store.conversation(&caller, peer_id.trim()).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Router,
        body::Body,
        http::Request,
        routing::{get, post},
    };
    use tower::ServiceExt;

    fn test_router(state: AppState) -> Router {
        Router::new()
            .route("/messages/send/{receiver_id}", post(send_message_handler))
            .route("/messages/{peer_id}", get(get_conversation_handler))
            .with_state(state)
    }

    fn send_request(from: Option<&str>, to: &str, body: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(format!("/messages/send/{}", to))
            .header("content-type", "application/json");
        if let Some(from) = from {
            builder = builder.header("x-user-id", from);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn body_json(resp: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_send_persists_then_delivers_to_every_tab() {
        let state = crate::test_helpers::test_app_state();
        let (tab_a, mut rx_a) = state.sockets.open(8);
        let (tab_b, mut rx_b) = state.sockets.open(8);
        state.hub.on_connect("u2", tab_a).await.unwrap();
        state.hub.on_connect("u2", tab_b).await.unwrap();

        // Drain presence snapshots from the connects
        while rx_a.try_recv().is_ok() {}
        while rx_b.try_recv().is_ok() {}

        let resp = test_router(state.clone())
            .oneshot(send_request(Some("u1"), "u2", r#"{"text":"hello"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created = body_json(resp).await;
        assert_eq!(created["senderId"], "u1");
        assert_eq!(created["receiverId"], "u2");
        assert_eq!(created["text"], "hello");

        assert_eq!(state.store.len().await, 1);

        for rx in [&mut rx_a, &mut rx_b] {
            let frame: serde_json::Value =
                serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
            assert_eq!(frame["event"], "newMessage");
            assert_eq!(frame["data"], created);
        }
    }

    #[tokio::test]
    async fn test_receiver_id_is_trimmed() {
        let state = crate::test_helpers::test_app_state();
        let (tab, mut rx) = state.sockets.open(8);
        state.hub.on_connect("u2", tab).await.unwrap();
        while rx.try_recv().is_ok() {}

        let resp = test_router(state.clone())
            .oneshot(send_request(Some("u1"), "%20u2%20", r#"{"text":"hi"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        assert_eq!(body_json(resp).await["receiverId"], "u2");

        let frame: serde_json::Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(frame["event"], "newMessage");
    }

    #[tokio::test]
    async fn test_send_to_offline_user_still_stored() {
        let state = crate::test_helpers::test_app_state();
        let resp = test_router(state.clone())
            .oneshot(send_request(Some("u1"), "u9", r#"{"image":"https://img/1.png"}"#))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::CREATED);
        assert_eq!(state.store.len().await, 1);
        assert_eq!(
            state
                .metrics
                .events_sent
                .load(std::sync::atomic::Ordering::Relaxed),
            0
        );
    }

    #[tokio::test]
    async fn test_send_requires_caller() {
        let state = crate::test_helpers::test_app_state();
        let resp = test_router(state)
            .oneshot(send_request(None, "u2", r#"{"text":"hi"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_send_rejects_empty_message() {
        let state = crate::test_helpers::test_app_state();
        let resp = test_router(state.clone())
            .oneshot(send_request(Some("u1"), "u2", r#"{"text":"   "}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["error"], "empty_message");
        assert_eq!(state.store.len().await, 0);
    }

    #[tokio::test]
    async fn test_send_rejects_overlong_text() {
        let state = crate::test_helpers::test_app_state();
        let text = "x".repeat(state.config.max_text_len + 1);
        let body = serde_json::json!({ "text": text }).to_string();
        let resp = test_router(state)
            .oneshot(send_request(Some("u1"), "u2", &body))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_conversation_roundtrip() {
        let state = crate::test_helpers::test_app_state();
        let app = test_router(state);

        for (from, to, text) in [("u1", "u2", "hi"), ("u2", "u1", "hey"), ("u3", "u1", "yo")] {
            let body = serde_json::json!({ "text": text }).to_string();
            let resp = app
                .clone()
                .oneshot(send_request(Some(from), to, &body))
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::CREATED);
        }

        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/messages/u2")
                    .header("x-user-id", "u1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let convo = body_json(resp).await;
        let texts: Vec<&str> = convo
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["text"].as_str().unwrap())
            .collect();
        assert_eq!(texts, vec!["hi", "hey"]);
    }
}
