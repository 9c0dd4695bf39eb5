//! Document ingestion and the per-session document holder.
//!
//! Uploads arrive as raw bytes plus a type tag. Only PDF and plain text are
//! accepted; PDF extraction is lenient (a broken file yields empty text).

use std::{fmt, str::FromStr, sync::Arc};

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::error::IngestError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
  Pdf,
  Txt,
}

impl DocumentKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      DocumentKind::Pdf => "pdf",
      DocumentKind::Txt => "txt",
    }
  }

  /// Guess the kind from a file name extension.
  pub fn from_filename(name: &str) -> Option<Self> {
    let (_, ext) = name.rsplit_once('.')?;
    ext.parse().ok()
  }
}

impl fmt::Display for DocumentKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Accepts the bare tags plus the MIME spellings browsers send for uploads.
impl FromStr for DocumentKind {
  type Err = IngestError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let tag = s.trim().to_ascii_lowercase();
    let tag = tag.rsplit('/').next().unwrap_or_default();
    match tag {
      "pdf" => Ok(DocumentKind::Pdf),
      "txt" | "plain" | "text" => Ok(DocumentKind::Txt),
      _ => Err(IngestError::UnsupportedFormat(s.to_string())),
    }
  }
}

/// Immutable document text for the lifetime of one upload.
#[derive(Clone, Debug)]
pub struct Document {
  pub name: String,
  pub kind: DocumentKind,
  text: Arc<str>,
}

impl Document {
  pub fn new(name: impl Into<String>, kind: DocumentKind, text: impl Into<Arc<str>>) -> Self {
    Self { name: name.into(), kind, text: text.into() }
  }

  /// Shared handle to the text; services borrow it without copying.
  pub fn shared_text(&self) -> Arc<str> {
    Arc::clone(&self.text)
  }

  pub fn char_count(&self) -> usize {
    self.text.chars().count()
  }
}

/// Extract plain text from uploaded bytes.
///
/// PDF extraction is CPU-bound and runs on the blocking pool so it never
/// stalls other sessions on the same runtime worker.
#[instrument(level = "info", skip(bytes, kind), fields(bytes_len = bytes.len(), %kind))]
pub async fn parse_document(bytes: Vec<u8>, kind: DocumentKind) -> String {
  let text = match kind {
    DocumentKind::Pdf => extract_pdf_text(bytes).await,
    DocumentKind::Txt => String::from_utf8_lossy(&bytes).into_owned(),
  };
  info!(target: "smartdoc", %kind, chars = text.chars().count(), "Document text extracted");
  text
}

async fn extract_pdf_text(bytes: Vec<u8>) -> String {
  // pdf-extract can panic on malformed input; the join error carries the panic.
  match tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes)).await {
    Ok(Ok(text)) => text,
    Ok(Err(e)) => {
      warn!(target: "smartdoc", error = %e, "PDF text extraction failed; continuing with empty text");
      String::new()
    }
    Err(e) => {
      warn!(target: "smartdoc", error = %e, panicked = e.is_panic(), "PDF extraction task failed; continuing with empty text");
      String::new()
    }
  }
}
