//! Loading service configuration (prompt templates + limits) from TOML.
//!
//! See `ServiceConfig`, `Prompts` and `Limits` for the expected schema. Every
//! field is optional; missing ones fall back to the defaults below.

use serde::Deserialize;
use tracing::{error, info, warn};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct ServiceConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub limits: Limits,
}

/// Prompt templates. Placeholders are `{document}`, `{history}`, `{question}`
/// and `{answer}`; see `crate::util::fill_template`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub summary_template: String,
  pub qa_template: String,
  pub questions_template: String,
  pub evaluation_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      summary_template: "Summarize the following document in 130 to 150 words. Be concise, focus on key points, and do not exceed 150 words.\n\n{document}".into(),
      qa_template: "You are a research assistant. Use ONLY the provided document. Answer the question, justify with a reference (e.g., 'This is supported by paragraph 3...'), and provide the supporting snippet.\n\nDocument:\n{document}\n\n{history}\nQ: {question}\nA:".into(),
      questions_template: "Generate exactly three clear, self-contained, logic-based or comprehension-focused questions based on the following document. Each question must be a full English sentence, at least 10 words, self-contained, and end with a question mark. Do not output phrases, incomplete sentences, or any introductory text. Output ONLY the three questions, each on a new line, numbered 1, 2, 3.\n\nDocument:\n{document}".into(),
      evaluation_template: "Document:\n{document}\n\nQuestion: {question}\nUser's Answer: {answer}\nEvaluate the user's answer. Is it correct? Justify your evaluation with a reference to the document and provide the supporting snippet.".into(),
    }
  }
}

/// Output budget of one completion call.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
pub struct CallBudget {
  pub max_tokens: u32,
  pub temperature: f32,
}

/// Truncation budgets and per-operation sampling settings.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Limits {
  /// Characters of the document sent for summarization.
  pub summary_max_chars: usize,
  /// Characters of the document sent as context for Q&A and challenges.
  pub context_max_chars: usize,
  /// Characters on each side of a located snippet.
  pub snippet_window: usize,
  /// Generate-and-parse attempts before questions degrade to the sentinel.
  pub question_attempts: usize,
  /// Largest accepted request body in bytes (uploads arrive base64-encoded).
  pub max_body_bytes: usize,
  /// Sessions untouched for this long are swept from the registry.
  pub session_idle_secs: u64,
  /// Hard cap on live sessions; creating one past it evicts the least recently used.
  pub max_sessions: usize,
  pub summary: CallBudget,
  pub qa: CallBudget,
  pub questions: CallBudget,
  pub evaluation: CallBudget,
}

impl Default for Limits {
  fn default() -> Self {
    Self {
      summary_max_chars: 6000,
      context_max_chars: 3000,
      snippet_window: crate::locator::DEFAULT_WINDOW,
      question_attempts: 3,
      max_body_bytes: 32 * 1024 * 1024,
      session_idle_secs: 60 * 60,
      max_sessions: 1000,
      summary: CallBudget { max_tokens: 350, temperature: 0.3 },
      qa: CallBudget { max_tokens: 400, temperature: 0.3 },
      questions: CallBudget { max_tokens: 400, temperature: 0.7 },
      evaluation: CallBudget { max_tokens: 300, temperature: 0.3 },
    }
  }
}

/// Attempt to load `ServiceConfig` from SMARTDOC_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_service_config_from_env() -> Option<ServiceConfig> {
  let path = std::env::var("SMARTDOC_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match parse_service_config(&s) {
      Ok(cfg) => {
        info!(target: "smartdoc", %path, "Loaded service config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "smartdoc", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "smartdoc", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

pub fn parse_service_config(s: &str) -> Result<ServiceConfig, toml::de::Error> {
  toml::from_str::<ServiceConfig>(s)
}

/// Apply SMARTDOC_MAX_BODY_BYTES / SMARTDOC_SESSION_IDLE_SECS / SMARTDOC_MAX_SESSIONS
/// on top of the file (or default) limits. Unparseable values are ignored with a warning.
pub fn apply_limit_overrides(limits: &mut Limits, var: impl Fn(&str) -> Option<String>) {
  fn parsed<T: std::str::FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = var(key)?;
    match raw.trim().parse() {
      Ok(v) => Some(v),
      Err(_) => {
        warn!(target: "smartdoc", key, value = %raw, "Ignoring unparseable limit override");
        None
      }
    }
  }
  if let Some(v) = parsed(&var, "SMARTDOC_MAX_BODY_BYTES") {
    limits.max_body_bytes = v;
  }
  if let Some(v) = parsed(&var, "SMARTDOC_SESSION_IDLE_SECS") {
    limits.session_idle_secs = v;
  }
  if let Some(v) = parsed(&var, "SMARTDOC_MAX_SESSIONS") {
    limits.max_sessions = v;
  }
}
