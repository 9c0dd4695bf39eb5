//! Error types shared by the services, the session layer and the transports.

use thiserror::Error;

/// Failures of a single completion call against the external model.
#[derive(Debug, Error)]
pub enum CompletionError {
  /// No API key was configured at startup.
  #[error("completion model is not configured (set OPENAI_API_KEY)")]
  NotConfigured,

  #[error("completion request timed out")]
  Timeout,

  #[error("completion request failed: {0}")]
  Request(String),

  /// The endpoint answered with a non-success status.
  #[error("completion api error (status {status}): {message}")]
  Api { status: u16, message: String },

  #[error("malformed completion response: {0}")]
  Malformed(String),
}

impl From<reqwest::Error> for CompletionError {
  fn from(e: reqwest::Error) -> Self {
    if e.is_timeout() {
      CompletionError::Timeout
    } else if e.is_decode() {
      CompletionError::Malformed(e.to_string())
    } else {
      CompletionError::Request(e.to_string())
    }
  }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IngestError {
  #[error("unsupported document format: {0}")]
  UnsupportedFormat(String),
}

/// Errors surfaced by session operations.
#[derive(Debug, Error)]
pub enum SessionError {
  #[error("no document loaded in this session")]
  NoDocument,

  #[error("no challenge item at index {0} (expected 0..3)")]
  NoSuchItem(usize),

  #[error("no challenge started for this document")]
  NoChallenge,

  #[error("question must not be empty")]
  EmptyQuestion,

  #[error("unknown session: {0}")]
  UnknownSession(String),

  #[error(transparent)]
  Ingest(#[from] IngestError),

  #[error(transparent)]
  Completion(#[from] CompletionError),
}
