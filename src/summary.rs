//! Bounded-length document summary.

use tracing::{info, instrument};

use crate::completion::CompletionClient;
use crate::config::{Limits, Prompts};
use crate::error::CompletionError;
use crate::util::{fill_template, truncate_with_ellipsis};

/// Build the summary prompt: the document is cut to `summary_max_chars`
/// (with a trailing `...` only when something was cut).
pub fn summary_prompt(prompts: &Prompts, limits: &Limits, document: &str) -> String {
  let body = truncate_with_ellipsis(document, limits.summary_max_chars);
  fill_template(&prompts.summary_template, &[("document", &body)])
}

/// Summarize `document` in roughly 130–150 words.
///
/// The word range is only requested from the model, never enforced here.
/// Completion failures propagate; there is no local fallback summary.
#[instrument(level = "info", skip_all, fields(doc_len = document.len()))]
pub async fn summarize(
  client: &dyn CompletionClient,
  prompts: &Prompts,
  limits: &Limits,
  document: &str,
) -> Result<String, CompletionError> {
  let prompt = summary_prompt(prompts, limits, document);
  let budget = limits.summary;
  let text = client.complete(&prompt, budget.max_tokens, budget.temperature).await?;
  let summary = text.trim().to_string();
  info!(target: "smartdoc", words = summary.split_whitespace().count(), "Summary generated");
  Ok(summary)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::completion::testing::ScriptedCompletion;

  #[tokio::test]
  async fn short_document_is_passed_whole() {
    let client = ScriptedCompletion::new(["  The sky is blue and water is wet.  "]);
    let doc = "The sky is blue. Water is wet.";
    let out = summarize(&client, &Prompts::default(), &Limits::default(), doc).await.unwrap();
    assert_eq!(out, "The sky is blue and water is wet.");

    let calls = client.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].prompt.ends_with("\n\nThe sky is blue. Water is wet."));
    assert!(!calls[0].prompt.contains("..."));
    assert_eq!(calls[0].max_output_tokens, 350);
    assert_eq!(calls[0].temperature, 0.3);
  }

  #[test]
  fn long_document_is_truncated_with_ellipsis() {
    let doc = "a".repeat(6001);
    let prompt = summary_prompt(&Prompts::default(), &Limits::default(), &doc);
    assert!(prompt.ends_with(&format!("{}...", "a".repeat(6000))));
    assert!(!prompt.contains(&"a".repeat(6001)));
  }

  #[test]
  fn exactly_at_budget_is_not_truncated() {
    let doc = "b".repeat(6000);
    let prompt = summary_prompt(&Prompts::default(), &Limits::default(), &doc);
    assert!(prompt.ends_with(&doc));
    assert!(!prompt.ends_with("..."));
  }

  #[tokio::test]
  async fn completion_failure_propagates() {
    let client = ScriptedCompletion::failing(CompletionError::Timeout);
    let err = summarize(&client, &Prompts::default(), &Limits::default(), "text").await.unwrap_err();
    assert!(matches!(err, CompletionError::Timeout));
  }
}
