//! WebSocket upgrade + message loop. Each client message is parsed as JSON and
//! forwarded to core logic. We reply with a single JSON message per request.
//!
//! Every connection gets its own session, dropped when the socket closes.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{info, error, instrument, debug};

use crate::error::SessionError;
use crate::logic::*;
use crate::protocol::*;
use crate::routes::http::decode_upload;
use crate::state::{AppState, SharedSession};

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "smartdoc", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  let session_id = state.create_session().await;
  let session = match state.session(&session_id).await {
    Ok(s) => s,
    Err(e) => {
      error!(target: "smartdoc", error = %e, "WS session vanished before use");
      return;
    }
  };
  info!(target: "smartdoc", %session_id, "WebSocket connected");

  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        // Parse, dispatch, serialize response.
        let reply_msg = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            debug!(target: "smartdoc", kind = incoming.kind(), frame_len = txt.len(), "WS received");
            handle_client_ws(incoming, &state, &session).await
          }
          Err(e) => ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) },
        };

        let out = serde_json::to_string(&reply_msg).unwrap_or_else(|e| {
          serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
        });

        if let Err(e) = socket.send(Message::Text(out)).await {
          error!(target: "smartdoc", error = %e, "WS send error");
          break;
        }
      }
      Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
      Message::Close(_) => break,
      _ => {}
    }
  }

  state.drop_session(&session_id).await;
  info!(target: "smartdoc", %session_id, "WebSocket disconnected");
}

fn error_msg(e: SessionError) -> ServerWsMessage {
  ServerWsMessage::Error { message: e.to_string() }
}

#[instrument(level = "info", skip_all)]
pub(crate) async fn handle_client_ws(msg: ClientWsMessage, state: &AppState, session: &SharedSession) -> ServerWsMessage {
  match msg {
    ClientWsMessage::Ping => ServerWsMessage::Pong,

    ClientWsMessage::LoadDocument(up) => {
      let bytes = match decode_upload(&up.content_base64) {
        Ok(b) => b,
        Err(message) => return ServerWsMessage::Error { message },
      };
      match load_document(state, session, &up.filename, up.kind.as_deref(), bytes).await {
        Ok(loaded) => {
          info!(target: "session", filename = %up.filename, chars = loaded.chars, "WS document loaded");
          ServerWsMessage::Summary(document_out(loaded))
        }
        Err(e) => error_msg(e),
      }
    }

    ClientWsMessage::Ask { question } => match ask(state, session, &question).await {
      Ok(a) => ServerWsMessage::Answer(AnswerOut { question: question.trim().to_string(), answer: a.text, snippet: a.snippet }),
      Err(e) => error_msg(e),
    },

    ClientWsMessage::ClearMemory => {
      clear_memory(session).await;
      ServerWsMessage::MemoryCleared
    }

    ClientWsMessage::StartChallenge => match start_challenge(state, session).await {
      Ok(c) => ServerWsMessage::Challenge { challenge: challenge_out(&c) },
      Err(e) => error_msg(e),
    },

    ClientWsMessage::CheckAnswer { index, answer } => match check_answer(state, session, index, &answer).await {
      Ok(r) => {
        info!(target: "challenge", index, outcome = ?r.outcome, "WS answer checked");
        ServerWsMessage::CheckResult(check_out(index, r))
      }
      Err(e) => error_msg(e),
    },

    ClientWsMessage::NewChallenge => match new_challenge(state, session).await {
      Ok(c) => ServerWsMessage::Challenge { challenge: challenge_out(&c) },
      Err(e) => error_msg(e),
    },

    ClientWsMessage::GetState => {
      let s = session.lock().await;
      ServerWsMessage::State(session_out(&s))
    }
  }
}
