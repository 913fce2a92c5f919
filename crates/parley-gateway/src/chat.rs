use crate::api::{lookup, ApiError};
use crate::server::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use parley_agent::{MessageDispatcher, StreamEvent, TurnOutcome};
use parley_session::{ChatSession, SharedSession};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, OwnedMutexGuard};
use tracing::{debug, info};
use uuid::Uuid;

/// Sent when a message arrives while the session is still answering.
pub const BUSY_MESSAGE: &str = "A response is still being generated for this session";

/// Query of the `/ws` upgrade.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Session to attach to.
    pub session_id: Uuid,
}

/// A user message. Plain text frames are accepted too.
#[derive(Debug, Deserialize)]
pub struct InboundMessage {
    /// Message text.
    pub content: String,
}

/// Frames pushed to the browser over the chat socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    /// First frame after the upgrade.
    Connected { session_id: Uuid },
    /// Fragment of the reply.
    TextDelta { text: String },
    /// Fragment of extended-thinking text.
    ThinkingDelta { text: String },
    /// Turn finished; `content` is the whole reply.
    Done { content: String },
    /// Turn failed or was rejected.
    Error { message: String },
}

impl OutboundFrame {
    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// `GET /ws?session_id=`: 404 for unknown sessions.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<WsQuery>,
) -> Result<Response, ApiError> {
    let session = lookup(&state, query.session_id).await?;
    let session_id = query.session_id;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, session_id, session)))
}

async fn handle_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    session_id: Uuid,
    session: SharedSession,
) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Channel for sending frames back to the WebSocket
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    info!(session_id = %session_id, "WebSocket connected");
    let _ = tx.send(OutboundFrame::Connected { session_id }.to_json());

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    });

    let dispatcher = state.dispatcher.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            match msg {
                Message::Text(text) => {
                    let content = match serde_json::from_str::<InboundMessage>(&text) {
                        Ok(m) => m.content,
                        Err(_) => text.to_string(),
                    };
                    if content.trim().is_empty() {
                        continue;
                    }

                    // One turn per session at a time.
                    let Ok(guard) = session.clone().try_lock_owned() else {
                        debug!(session_id = %session_id, "Rejected message: turn in flight");
                        let _ = tx.send(
                            OutboundFrame::Error {
                                message: BUSY_MESSAGE.to_string(),
                            }
                            .to_json(),
                        );
                        continue;
                    };
                    tokio::spawn(run_turn(dispatcher.clone(), guard, content, tx.clone()));
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => {},
    }

    info!(session_id = %session_id, "WebSocket disconnected");
}

/// Streams one turn to the socket. The session stays locked until the
/// outcome is recorded, even if the client goes away.
async fn run_turn(
    dispatcher: Arc<MessageDispatcher>,
    mut session: OwnedMutexGuard<ChatSession>,
    content: String,
    tx: mpsc::UnboundedSender<String>,
) {
    let events = tx.clone();
    let outcome = dispatcher
        .send_message(&mut session, &content, move |event| {
            let frame = match event {
                StreamEvent::TextDelta { text } => OutboundFrame::TextDelta { text: text.clone() },
                StreamEvent::ThinkingDelta { text } => {
                    OutboundFrame::ThinkingDelta { text: text.clone() }
                }
                _ => return,
            };
            let _ = events.send(frame.to_json());
        })
        .await;

    let frame = match outcome {
        TurnOutcome::Completed { content } => OutboundFrame::Done { content },
        TurnOutcome::Failed { notice } => OutboundFrame::Error { message: notice },
    };
    let _ = tx.send(frame.to_json());
}
