//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs parameters and basic result info.

use std::sync::Arc;
use axum::{
  extract::{Path, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
use tracing::{info, instrument, warn};

use crate::error::{CompletionError, SessionError};
use crate::logic::*;
use crate::protocol::*;
use crate::state::AppState;

/// Map session errors onto HTTP statuses with a JSON `{ "error": .. }` body.
impl IntoResponse for SessionError {
  fn into_response(self) -> Response {
    let status = match &self {
      SessionError::UnknownSession(_) => StatusCode::NOT_FOUND,
      SessionError::NoSuchItem(_) | SessionError::EmptyQuestion => StatusCode::BAD_REQUEST,
      SessionError::NoDocument | SessionError::NoChallenge => StatusCode::CONFLICT,
      SessionError::Ingest(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
      SessionError::Completion(CompletionError::NotConfigured) => StatusCode::SERVICE_UNAVAILABLE,
      SessionError::Completion(CompletionError::Timeout) => StatusCode::GATEWAY_TIMEOUT,
      SessionError::Completion(_) => StatusCode::BAD_GATEWAY,
    };
    if status.is_server_error() {
      warn!(target: "smartdoc", %status, error = %self, "Request failed");
    }
    (status, Json(ErrorOut { error: self.to_string() })).into_response()
  }
}

/// Decode an upload body; bad base64 is a client error, not an ingestion failure.
pub fn decode_upload(content_base64: &str) -> Result<Vec<u8>, String> {
  B64.decode(content_base64.trim()).map_err(|e| format!("invalid base64 content: {e}"))
}

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut { ok: true, live_sessions: state.session_count().await })
}

#[instrument(level = "info", skip(state))]
pub async fn http_create_session(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  let session_id = state.create_session().await;
  (StatusCode::CREATED, Json(SessionCreatedOut { session_id }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_session(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<Json<SessionOut>, SessionError> {
  let session = state.session(&id).await?;
  let s = session.lock().await;
  Ok(Json(session_out(&s)))
}

#[instrument(level = "info", skip(state))]
pub async fn http_delete_session(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<StatusCode, SessionError> {
  if state.drop_session(&id).await {
    Ok(StatusCode::NO_CONTENT)
  } else {
    Err(SessionError::UnknownSession(id))
  }
}

#[instrument(level = "info", skip(state, body), fields(filename = %body.filename, kind = ?body.kind))]
pub async fn http_post_document(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<UploadIn>,
) -> Response {
  let bytes = match decode_upload(&body.content_base64) {
    Ok(b) => b,
    Err(error) => return (StatusCode::BAD_REQUEST, Json(ErrorOut { error })).into_response(),
  };
  let result = async {
    let session = state.session(&id).await?;
    load_document(&state, &session, &body.filename, body.kind.as_deref(), bytes).await
  }
  .await;
  match result {
    Ok(loaded) => {
      info!(target: "session", %id, chars = loaded.chars, "HTTP document loaded");
      Json(document_out(loaded)).into_response()
    }
    Err(e) => e.into_response(),
  }
}

#[instrument(level = "info", skip(state, body), fields(question_len = body.question.len()))]
pub async fn http_post_ask(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<AskIn>,
) -> Result<Json<AnswerOut>, SessionError> {
  let session = state.session(&id).await?;
  let answer = ask(&state, &session, &body.question).await?;
  Ok(Json(AnswerOut { question: body.question.trim().to_string(), answer: answer.text, snippet: answer.snippet }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_history(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<Json<HistoryOut>, SessionError> {
  let session = state.session(&id).await?;
  Ok(Json(HistoryOut { turns: history(&session).await }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_delete_history(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<StatusCode, SessionError> {
  let session = state.session(&id).await?;
  clear_memory(&session).await;
  Ok(StatusCode::NO_CONTENT)
}

#[instrument(level = "info", skip(state))]
pub async fn http_start_challenge(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<Json<ChallengeOut>, SessionError> {
  let session = state.session(&id).await?;
  let challenge = start_challenge(&state, &session).await?;
  info!(target: "challenge", %id, degraded = challenge.degraded(), "HTTP challenge served");
  Ok(Json(challenge_out(&challenge)))
}

#[instrument(level = "info", skip(state, body), fields(index = body.index, answer_len = body.answer.len()))]
pub async fn http_post_check(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<CheckIn>,
) -> Result<Json<CheckOut>, SessionError> {
  let session = state.session(&id).await?;
  let result = check_answer(&state, &session, body.index, &body.answer).await?;
  info!(target: "challenge", %id, index = body.index, outcome = ?result.outcome, "HTTP answer checked");
  Ok(Json(check_out(body.index, result)))
}

#[instrument(level = "info", skip(state))]
pub async fn http_reset_challenge(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<Json<ChallengeOut>, SessionError> {
  let session = state.session(&id).await?;
  let challenge = new_challenge(&state, &session).await?;
  Ok(Json(challenge_out(&challenge)))
}
