// HTTP/WebSocket entry points.
//
// Each socket runs two tasks: one drains the connection's outbound queue
// into the socket, the other feeds inbound frames to the router one at a
// time. Handling a sender's frames sequentially is what keeps that
// sender's replies in order.

use super::frames;
use super::hub::ConnectionHub;
use crate::core::chat::{InboundEvent, SessionRouter};
use crate::core::classifier::ToxicityClassifier;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub type ChatRouter = SessionRouter<Box<dyn ToxicityClassifier>, ConnectionHub>;

#[derive(Clone)]
pub struct AppState {
    pub router: Arc<ChatRouter>,
}

/// Build the HTTP app: health check on `/`, chat socket on `/ws`.
pub fn app(router: Arc<ChatRouter>) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/ws", get(ws_upgrade))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { router })
}

async fn health() -> &'static str {
    "Chat Server Running!"
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state.router))
}

async fn handle_socket(socket: WebSocket, router: Arc<ChatRouter>) {
    let (connection, mut outbound) = router.transport().open();
    tracing::debug!(
        connection = %connection,
        open_connections = router.transport().len(),
        "WebSocket opened"
    );
    router.dispatch(connection, InboundEvent::Connect).await;

    let (mut sink, mut stream) = socket.split();

    let mut send_task = tokio::spawn(async move {
        while let Some(event) = outbound.recv().await {
            let frame = match frames::encode(&event) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::error!("Failed to encode outbound event: {}", e);
                    continue;
                }
            };

            if let Err(e) = sink.send(Message::Text(frame.into())).await {
                tracing::debug!(connection = %connection, "Socket send failed: {}", e);
                break;
            }
        }
    });

    let recv_router = Arc::clone(&router);
    let mut recv_task = tokio::spawn(async move {
        while let Some(message) = stream.next().await {
            match message {
                Ok(Message::Text(text)) => match frames::decode(text.as_str()) {
                    Ok(frame) => recv_router.dispatch(connection, frame.into()).await,
                    Err(e) => {
                        tracing::warn!(connection = %connection, "Ignoring malformed frame: {}", e);
                    }
                },
                Ok(Message::Close(_)) => break,
                // Binary and ping/pong frames carry nothing for the chat
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(connection = %connection, "Socket receive failed: {}", e);
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    router.transport().close(connection);
    router.dispatch(connection, InboundEvent::Disconnect).await;
}
