//! Per-user document interaction session.
//!
//! `SessionState` exclusively owns the loaded document, the chat memory and the
//! current challenge. It does no I/O: callers run the model calls and feed the
//! results back through the methods here, so every transition is testable
//! without a live model.

use serde::Serialize;
use tracing::{debug, info};

use crate::challenge::{classify_feedback, GeneratedQuestions, QUESTIONS_PER_CHALLENGE};
use crate::document::Document;
use crate::error::SessionError;

/// Attempts after which a client should stop offering "check" for an item.
/// Advisory only; the state machine keeps accepting evaluations.
pub const ADVISORY_MAX_ATTEMPTS: u32 = 3;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChatTurn {
  pub question: String,
  pub answer: String,
  pub snippet: String,
}

/// Ordered question/answer log; the order is the conversational context.
#[derive(Clone, Debug, Default)]
pub struct ChatMemory {
  turns: Vec<ChatTurn>,
}

impl ChatMemory {
  pub fn add(&mut self, turn: ChatTurn) {
    self.turns.push(turn);
  }

  pub fn turns(&self) -> &[ChatTurn] {
    &self.turns
  }

  /// `(question, answer)` pairs, oldest first.
  pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
    self.turns.iter().map(|t| (t.question.as_str(), t.answer.as_str()))
  }

  pub fn len(&self) -> usize {
    self.turns.len()
  }

  pub fn is_empty(&self) -> bool {
    self.turns.is_empty()
  }

  pub fn clear(&mut self) {
    self.turns.clear();
  }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Feedback {
  pub justification: String,
  pub snippet: String,
}

/// Where an item sits in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
  Unanswered,
  Correct,
  Incorrect,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChallengeItem {
  question: String,
  user_answer: String,
  feedback: Option<Feedback>,
  correct: Option<bool>,
  attempts: u32,
}

impl ChallengeItem {
  fn new(question: String) -> Self {
    Self { question, user_answer: String::new(), feedback: None, correct: None, attempts: 0 }
  }

  pub fn question(&self) -> &str {
    &self.question
  }

  pub fn user_answer(&self) -> &str {
    &self.user_answer
  }

  pub fn feedback(&self) -> Option<&Feedback> {
    self.feedback.as_ref()
  }

  pub fn correct(&self) -> Option<bool> {
    self.correct
  }

  pub fn attempts(&self) -> u32 {
    self.attempts
  }

  pub fn attempts_exhausted(&self) -> bool {
    self.attempts >= ADVISORY_MAX_ATTEMPTS
  }

  pub fn status(&self) -> ItemStatus {
    match self.correct {
      None => ItemStatus::Unanswered,
      Some(true) => ItemStatus::Correct,
      Some(false) => ItemStatus::Incorrect,
    }
  }

  fn has_answer(&self) -> bool {
    !self.user_answer.trim().is_empty()
  }
}

/// Result of a check request on one item.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CheckOutcome {
  /// The answer was empty or whitespace; nothing changed.
  EmptyAnswer,
  Evaluated {
    correct: bool,
    attempts: u32,
    completed: bool,
  },
}

/// What the caller needs to run one evaluation call.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingCheck {
  pub question: String,
  pub answer: String,
}

/// Three questions with per-item answer state, plus the completion flag.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChallengeSession {
  items: [ChallengeItem; QUESTIONS_PER_CHALLENGE],
  completed: bool,
  degraded: bool,
}

impl ChallengeSession {
  pub fn new(generated: GeneratedQuestions) -> Self {
    let GeneratedQuestions { questions, degraded } = generated;
    Self { items: questions.map(ChallengeItem::new), completed: false, degraded }
  }

  pub fn items(&self) -> &[ChallengeItem] {
    &self.items
  }

  pub fn item(&self, index: usize) -> Result<&ChallengeItem, SessionError> {
    self.items.get(index).ok_or(SessionError::NoSuchItem(index))
  }

  fn item_mut(&mut self, index: usize) -> Result<&mut ChallengeItem, SessionError> {
    self.items.get_mut(index).ok_or(SessionError::NoSuchItem(index))
  }

  pub fn completed(&self) -> bool {
    self.completed
  }

  pub fn degraded(&self) -> bool {
    self.degraded
  }

  pub fn correct_count(&self) -> usize {
    self.items.iter().filter(|i| i.correct == Some(true)).count()
  }

  /// Store the user's current answer text (last value wins).
  pub fn set_answer(&mut self, index: usize, answer: &str) -> Result<(), SessionError> {
    self.item_mut(index)?.user_answer = answer.to_string();
    Ok(())
  }

  /// The evaluation inputs for `index`, or `None` when the stored answer is blank.
  pub fn pending_check(&self, index: usize) -> Result<Option<PendingCheck>, SessionError> {
    let item = self.item(index)?;
    if !item.has_answer() {
      return Ok(None);
    }
    Ok(Some(PendingCheck { question: item.question.clone(), answer: item.user_answer.clone() }))
  }

  /// Apply the model's feedback to `index`.
  ///
  /// Increments the attempt counter by one, sets the verdict from the lexical
  /// classifier and latches `completed` once all items have a verdict. A blank
  /// stored answer makes this a no-op returning `EmptyAnswer`.
  pub fn record_evaluation(
    &mut self,
    index: usize,
    feedback: String,
    snippet: String,
  ) -> Result<CheckOutcome, SessionError> {
    let item = self.item_mut(index)?;
    if !item.has_answer() {
      return Ok(CheckOutcome::EmptyAnswer);
    }
    let correct = classify_feedback(&feedback);
    item.attempts += 1;
    item.correct = Some(correct);
    item.feedback = Some(Feedback { justification: feedback, snippet });
    let attempts = item.attempts;

    if !self.completed && self.items.iter().all(|i| i.correct.is_some()) {
      self.completed = true;
      info!(target: "session", correct = self.correct_count(), "Challenge completed");
    }
    debug!(target: "session", index, correct, attempts, "Challenge answer evaluated");
    Ok(CheckOutcome::Evaluated { correct, attempts, completed: self.completed })
  }
}

/// Everything one user interacts with: document, chat memory, challenge.
#[derive(Debug, Default)]
pub struct SessionState {
  document: Option<Document>,
  summary: Option<String>,
  memory: ChatMemory,
  challenge: Option<ChallengeSession>,
}

impl SessionState {
  pub fn new() -> Self {
    Self::default()
  }

  /// Replace the document wholesale. The challenge belongs to the old document
  /// and is dropped; chat memory is kept until cleared explicitly.
  pub fn load_document(&mut self, document: Document) {
    info!(target: "session", name = %document.name, kind = %document.kind, chars = document.char_count(), "Document loaded");
    self.document = Some(document);
    self.summary = None;
    self.challenge = None;
  }

  pub fn document(&self) -> Option<&Document> {
    self.document.as_ref()
  }

  pub fn require_document(&self) -> Result<&Document, SessionError> {
    self.document.as_ref().ok_or(SessionError::NoDocument)
  }

  pub fn set_summary(&mut self, summary: String) {
    self.summary = Some(summary);
  }

  pub fn summary(&self) -> Option<&str> {
    self.summary.as_deref()
  }

  pub fn memory(&self) -> &ChatMemory {
    &self.memory
  }

  pub fn record_turn(&mut self, turn: ChatTurn) {
    self.memory.add(turn);
  }

  pub fn clear_memory(&mut self) {
    if self.memory.is_empty() {
      return;
    }
    debug!(target: "session", turns = self.memory.len(), "Chat memory cleared");
    self.memory.clear();
  }

  pub fn challenge(&self) -> Option<&ChallengeSession> {
    self.challenge.as_ref()
  }

  pub fn challenge_mut(&mut self) -> Result<&mut ChallengeSession, SessionError> {
    self.challenge.as_mut().ok_or(SessionError::NoChallenge)
  }

  /// Install a freshly generated challenge, replacing any previous one.
  pub fn install_challenge(&mut self, generated: GeneratedQuestions) -> &ChallengeSession {
    self.challenge.insert(ChallengeSession::new(generated))
  }
}
