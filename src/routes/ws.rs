//! WebSocket upgrade + learner loop. Each connection owns one `Navigator`; client
//! messages are parsed as JSON and applied strictly one at a time. A lesson pick is
//! answered with `lesson_loading` before generation starts. Illustration fetches
//! run as spawned tasks and come back through a channel, tagged with the token they were
//! issued for; the navigator decides whether the result is still current.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tokio::sync::mpsc;
use tracing::{info, error, instrument, debug};
use uuid::Uuid;

use crate::domain::ImageHandle;
use crate::logic::{dispatch, load_lesson, Dispatch};
use crate::navigation::{IllustrationRequest, IllustrationToken};
use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::state::AppState;

type IllustrationResult = (IllustrationToken, Option<ImageHandle>);

#[instrument(level = "info", skip_all)]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "lingoai_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state, Uuid::new_v4()))
}

#[instrument(level = "info", skip_all, fields(%conn_id))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>, conn_id: Uuid) {
  info!(target: "lingoai_backend", "WebSocket connected");
  let mut nav = state.new_navigator();
  let (tx, mut rx) = mpsc::unbounded_channel::<IllustrationResult>();

  loop {
    tokio::select! {
      incoming = socket.recv() => {
        let Some(Ok(msg)) = incoming else { break };
        match msg {
          Message::Text(txt) => {
            // Parse, dispatch, serialize responses.
            let mut d = match serde_json::from_str::<ClientWsMessage>(&txt) {
              Ok(incoming) => {
                debug!(target: "lingoai_backend", "WS received: {:?}", &incoming);
                dispatch(&state, &mut nav, incoming).await
              }
              Err(e) => Dispatch {
                replies: vec![ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) }],
                ..Dispatch::default()
              },
            };
            let pending = d.pending_lesson.take();
            if !deliver(&mut socket, &state, d, &tx).await {
              break;
            }

            // `lesson_loading` is already on the wire; generation may take a while.
            if let Some(request) = pending {
              let d = load_lesson(&state, &mut nav, request).await;
              if !deliver(&mut socket, &state, d, &tx).await {
                break;
              }
            }
          }
          Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
          Message::Close(_) => break,
          _ => {}
        }
      }

      Some((token, image)) = rx.recv() => {
        if nav.apply_illustration(token, image.clone()) {
          let msg = ServerWsMessage::Illustration { token, image };
          if send_all(&mut socket, vec![msg]).await.is_err() {
            break;
          }
        }
      }
    }
  }
  info!(target: "lingoai_backend", screen = ?nav.screen(), xp = nav.progress().xp(), "WebSocket disconnected");
}

/// Start the dispatch's illustration fetch, then send its replies. False once the socket is gone.
async fn deliver(
  socket: &mut WebSocket,
  state: &AppState,
  d: Dispatch,
  tx: &mpsc::UnboundedSender<IllustrationResult>,
) -> bool {
  if let Some(req) = d.illustration {
    spawn_illustration(state, req, tx.clone());
  }
  send_all(socket, d.replies).await.is_ok()
}

/// Fire-and-forget fetch. Never cancelled; stale results are dropped on arrival.
fn spawn_illustration(state: &AppState, req: IllustrationRequest, tx: mpsc::UnboundedSender<IllustrationResult>) {
  let provider = state.provider.clone();
  tokio::spawn(async move {
    let image = provider.fetch_illustration(&req.description).await;
    // The receiver is gone once the connection closed; nothing to deliver then.
    let _ = tx.send((req.token, image));
  });
}

async fn send_all(socket: &mut WebSocket, replies: Vec<ServerWsMessage>) -> Result<(), axum::Error> {
  for reply in replies {
    let out = serde_json::to_string(&reply).unwrap_or_else(|e| {
      serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
    });
    if let Err(e) = socket.send(Message::Text(out)).await {
      error!(target: "lingoai_backend", error = %e, "WS send error");
      return Err(e);
    }
  }
  Ok(())
}
