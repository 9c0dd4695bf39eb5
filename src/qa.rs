//! Free-form question answering grounded in the loaded document.

use serde::Serialize;
use tracing::{debug, instrument};

use crate::completion::CompletionClient;
use crate::config::{Limits, Prompts};
use crate::error::CompletionError;
use crate::locator::locate;
use crate::util::{fill_template, truncate_with_ellipsis};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Answer {
  pub text: String,
  pub snippet: String,
}

/// Flatten prior turns into `Q: ..\nA: ..\n` blocks, oldest first.
pub fn render_history<'a, I>(history: I) -> String
where
  I: IntoIterator<Item = (&'a str, &'a str)>,
{
  history
    .into_iter()
    .map(|(q, a)| format!("Q: {q}\nA: {a}\n"))
    .collect()
}

pub fn qa_prompt(prompts: &Prompts, limits: &Limits, document: &str, question: &str, history: &str) -> String {
  let context = truncate_with_ellipsis(document, limits.context_max_chars);
  fill_template(
    &prompts.qa_template,
    &[("document", &context), ("history", history), ("question", question)],
  )
}

/// Answer `question` from the document, using earlier turns as context.
///
/// The snippet is located from the generated answer text, so it is often the
/// not-found sentinel when the model paraphrases.
#[instrument(level = "info", skip_all, fields(doc_len = document.len(), question_len = question.len()))]
pub async fn answer<'a, I>(
  client: &dyn CompletionClient,
  prompts: &Prompts,
  limits: &Limits,
  document: &str,
  question: &str,
  history: I,
) -> Result<Answer, CompletionError>
where
  I: IntoIterator<Item = (&'a str, &'a str)>,
{
  let transcript = render_history(history);
  let prompt = qa_prompt(prompts, limits, document, question, &transcript);
  let budget = limits.qa;
  let text = client.complete(&prompt, budget.max_tokens, budget.temperature).await?.trim().to_string();
  let snippet = locate(document, &text, limits.snippet_window);
  debug!(target: "session", answer_len = text.len(), snippet_len = snippet.len(), "Question answered");
  Ok(Answer { text, snippet })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::completion::testing::ScriptedCompletion;
  use crate::locator::SNIPPET_NOT_FOUND;

  const DOC: &str = "Rust guarantees memory safety without a garbage collector. \
    Ownership rules are checked at compile time by the borrow checker.";

  #[test]
  fn history_renders_in_order() {
    let h = render_history([("first?", "one"), ("second?", "two")]);
    assert_eq!(h, "Q: first?\nA: one\nQ: second?\nA: two\n");
    assert_eq!(render_history(std::iter::empty::<(&str, &str)>()), "");
  }

  #[tokio::test]
  async fn answer_includes_history_and_locates_snippet() {
    let client = ScriptedCompletion::new(["Ownership rules are checked at compile time, per the second sentence."]);
    let out = answer(
      &client,
      &Prompts::default(),
      &Limits::default(),
      DOC,
      "When are ownership rules checked?",
      [("What does Rust guarantee?", "Memory safety.")],
    )
    .await
    .unwrap();

    assert!(out.text.starts_with("Ownership rules"));
    assert!(out.snippet.contains("Ownership rules are c"));

    let call = &client.calls()[0];
    assert!(call.prompt.contains("Q: What does Rust guarantee?\nA: Memory safety.\n"));
    assert!(call.prompt.ends_with("Q: When are ownership rules checked?\nA:"));
    assert!(call.prompt.contains(DOC));
    assert_eq!(call.max_output_tokens, 400);
  }

  #[tokio::test]
  async fn paraphrased_answer_gets_sentinel_snippet() {
    let client = ScriptedCompletion::new(["At build time."]);
    let out = answer(&client, &Prompts::default(), &Limits::default(), DOC, "When?", std::iter::empty::<(&str, &str)>())
      .await
      .unwrap();
    assert_eq!(out.snippet, SNIPPET_NOT_FOUND);
  }

  #[test]
  fn context_is_cut_to_budget() {
    let limits = Limits { context_max_chars: 10, ..Limits::default() };
    let prompt = qa_prompt(&Prompts::default(), &limits, DOC, "q", "");
    assert!(prompt.contains("Rust guara..."));
    assert!(!prompt.contains("memory safety"));
  }
}
