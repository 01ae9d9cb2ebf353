use super::ErrorResponse;
use crate::state::{AppState, SessionGuard};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures::Stream;
use relay_mcp::protocol::JsonRpcRequest;
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

/// Open an SSE stream.
///
/// The first event tells the client where to POST its messages; responses
/// follow as `message` events.
pub async fn open_stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (session_id, mut rx) = state.sessions.open();
    let guard = SessionGuard::new(state.sessions.clone(), session_id.clone());
    let endpoint = format!("/messages?session_id={}", session_id);

    let stream = async_stream::stream! {
        let _guard = guard;
        yield Ok::<_, Infallible>(Event::default().event("endpoint").data(endpoint));

        while let Some(message) = rx.recv().await {
            yield Ok(Event::default().event("message").data(message));
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    pub session_id: String,
}

/// Accept a JSON-RPC message for a session.
///
/// The call runs on its own task and its response goes out on the session's
/// event stream, so this returns `202 Accepted` right away.
pub async fn post_message(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MessageQuery>,
    body: String,
) -> Response {
    let Some(tx) = state.sessions.sender(&query.session_id) else {
        return (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(format!("Unknown session: {}", query.session_id))),
        )
            .into_response();
    };

    let request: JsonRpcRequest = match serde_json::from_str(&body) {
        Ok(request) => request,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::with_details("Invalid JSON-RPC message", e.to_string())),
            )
                .into_response();
        }
    };

    let server = state.server.clone();
    let session_id = query.session_id;
    tokio::spawn(async move {
        let Some(response) = server.handle(request).await else {
            return;
        };

        match serde_json::to_string(&response) {
            Ok(text) => {
                if tx.send(text).await.is_err() {
                    tracing::debug!(session_id = %session_id, "Session closed before response was sent");
                }
            }
            Err(e) => tracing::error!(error = %e, "Failed to serialize JSON-RPC response"),
        }
    });

    StatusCode::ACCEPTED.into_response()
}
