//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - Loading a document and producing its summary
//!   - Ask Anything: answering with chat memory as context
//!   - Challenge Me: lazy question generation, answer checks, resets
//!
//! Each operation locks its session for the whole call (model round-trip
//! included), so calls on one session are strictly sequential.

use tracing::{info, instrument, warn};

use crate::challenge::{evaluate_answer, generate_questions};
use crate::document::{parse_document, Document, DocumentKind};
use crate::error::{IngestError, SessionError};
use crate::qa::{self, Answer};
use crate::session::{ChallengeItem, ChallengeSession, ChatTurn, CheckOutcome, SessionState};
use crate::state::{AppState, SharedSession};
use crate::summary::summarize;

/// A loaded document and its automatic summary.
#[derive(Clone, Debug)]
pub struct LoadedDocument {
  pub name: String,
  pub kind: DocumentKind,
  pub chars: usize,
  pub summary: String,
}

/// Outcome of one check request plus the item as it stands afterwards.
#[derive(Clone, Debug)]
pub struct CheckResult {
  pub outcome: CheckOutcome,
  pub item: ChallengeItem,
  pub completed: bool,
}

/// Resolve the upload's kind from the explicit tag, or the file extension when no tag is given.
pub fn resolve_kind(name: &str, tag: Option<&str>) -> Result<DocumentKind, IngestError> {
  match tag.map(str::trim).filter(|t| !t.is_empty()) {
    Some(tag) => tag.parse(),
    None => DocumentKind::from_filename(name).ok_or_else(|| IngestError::UnsupportedFormat(name.to_string())),
  }
}

/// Parse the upload, replace the session's document and summarize it.
///
/// An unsupported format leaves the session untouched. A failed summary leaves
/// the new document loaded and reports the completion error.
#[instrument(level = "info", skip(state, session, name, bytes), fields(%name, bytes_len = bytes.len()))]
pub async fn load_document(
  state: &AppState,
  session: &SharedSession,
  name: &str,
  tag: Option<&str>,
  bytes: Vec<u8>,
) -> Result<LoadedDocument, SessionError> {
  let kind = resolve_kind(name, tag)?;
  let text = parse_document(bytes, kind).await;
  let document = Document::new(name, kind, text);
  let shared = document.shared_text();
  let chars = document.char_count();

  let mut s = session.lock().await;
  s.load_document(document);
  let summary = summarize(state.completion.as_ref(), &state.prompts, &state.limits, &shared).await?;
  s.set_summary(summary.clone());
  Ok(LoadedDocument { name: name.to_string(), kind, chars, summary })
}

/// Answer a free-form question and append the turn to chat memory.
#[instrument(level = "info", skip(state, session, question), fields(question_len = question.len()))]
pub async fn ask(state: &AppState, session: &SharedSession, question: &str) -> Result<Answer, SessionError> {
  let question = question.trim();
  if question.is_empty() {
    return Err(SessionError::EmptyQuestion);
  }

  let mut s = session.lock().await;
  let text = s.require_document()?.shared_text();
  let answer = qa::answer(
    state.completion.as_ref(),
    &state.prompts,
    &state.limits,
    &text,
    question,
    s.memory().pairs(),
  )
  .await?;

  s.record_turn(ChatTurn {
    question: question.to_string(),
    answer: answer.text.clone(),
    snippet: answer.snippet.clone(),
  });
  info!(target: "session", turns = s.memory().len(), "Question answered");
  Ok(answer)
}

pub async fn history(session: &SharedSession) -> Vec<ChatTurn> {
  session.lock().await.memory().turns().to_vec()
}

pub async fn clear_memory(session: &SharedSession) {
  session.lock().await.clear_memory();
}

/// Enter challenge mode: return the current challenge, generating one on first entry.
#[instrument(level = "info", skip_all)]
pub async fn start_challenge(state: &AppState, session: &SharedSession) -> Result<ChallengeSession, SessionError> {
  let mut s = session.lock().await;
  if let Some(existing) = s.challenge() {
    return Ok(existing.clone());
  }
  generate_into(state, &mut s).await
}

/// Generate a fresh challenge and swap it in for the current one.
///
/// The previous challenge survives a failed generation.
#[instrument(level = "info", skip_all)]
pub async fn new_challenge(state: &AppState, session: &SharedSession) -> Result<ChallengeSession, SessionError> {
  let mut s = session.lock().await;
  generate_into(state, &mut s).await
}

async fn generate_into(state: &AppState, s: &mut SessionState) -> Result<ChallengeSession, SessionError> {
  let text = s.require_document()?.shared_text();
  let generated = generate_questions(state.completion.as_ref(), &state.prompts, &state.limits, &text).await?;
  if generated.degraded {
    warn!(target: "challenge", "Serving degraded challenge");
  }
  Ok(s.install_challenge(generated).clone())
}

/// Store `answer` for item `index` and, unless it is blank, have it evaluated.
///
/// A blank answer is not an error: it reports `CheckOutcome::EmptyAnswer` and
/// leaves attempts and verdict untouched.
#[instrument(level = "info", skip(state, session, answer), fields(answer_len = answer.len()))]
pub async fn check_answer(
  state: &AppState,
  session: &SharedSession,
  index: usize,
  answer: &str,
) -> Result<CheckResult, SessionError> {
  let mut s = session.lock().await;
  let text = s.require_document()?.shared_text();
  let challenge = s.challenge_mut()?;
  challenge.set_answer(index, answer)?;

  let outcome = match challenge.pending_check(index)? {
    None => {
      warn!(target: "challenge", index, "Empty answer; nothing to check");
      CheckOutcome::EmptyAnswer
    }
    Some(pending) => {
      let eval = evaluate_answer(
        state.completion.as_ref(),
        &state.prompts,
        &state.limits,
        &text,
        &pending.question,
        &pending.answer,
      )
      .await?;
      let challenge = s.challenge_mut()?;
      challenge.record_evaluation(index, eval.feedback, eval.snippet)?
    }
  };

  let challenge = s.challenge_mut()?;
  Ok(CheckResult {
    outcome,
    item: challenge.item(index)?.clone(),
    completed: challenge.completed(),
  })
}
