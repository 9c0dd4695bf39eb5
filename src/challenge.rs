//! Challenge mode: question generation, answer evaluation and the lexical
//! feedback classifier that drives the session state machine.

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::completion::CompletionClient;
use crate::config::{Limits, Prompts};
use crate::error::CompletionError;
use crate::locator::locate;
use crate::util::{fill_template, trunc_for_log, truncate_with_ellipsis};

pub const QUESTIONS_PER_CHALLENGE: usize = 3;

/// Minimum whitespace-separated tokens (marker included) for a question line.
const MIN_QUESTION_TOKENS: usize = 10;

/// Placeholder used for all three questions once generation is exhausted.
pub const QUESTION_SENTINEL: &str =
  "[Could not generate a valid question for this document. Please try another document or re-upload.]";

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GeneratedQuestions {
  pub questions: [String; QUESTIONS_PER_CHALLENGE],
  /// True when every attempt failed to parse and the sentinel is served instead.
  pub degraded: bool,
}

impl GeneratedQuestions {
  pub fn degraded() -> Self {
    Self {
      questions: std::array::from_fn(|_| QUESTION_SENTINEL.to_string()),
      degraded: true,
    }
  }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Evaluation {
  pub feedback: String,
  pub snippet: String,
}

/// Parse a single response line: `N. <question>` with at least ten tokens,
/// ending in `?`. Returns the question without its number marker.
pub fn parse_question_line(line: &str) -> Option<String> {
  let line = line.trim();
  let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
  if digits == 0 {
    return None;
  }
  let rest = line[digits..].strip_prefix('.')?;
  if line.split_whitespace().count() < MIN_QUESTION_TOKENS || !line.ends_with('?') {
    return None;
  }
  Some(rest.trim_start().to_string())
}

/// All qualifying question lines of a model response, in order.
pub fn parse_questions(response: &str) -> Vec<String> {
  response.lines().filter_map(parse_question_line).collect()
}

pub fn questions_prompt(prompts: &Prompts, limits: &Limits, document: &str) -> String {
  let context = truncate_with_ellipsis(document, limits.context_max_chars);
  fill_template(&prompts.questions_template, &[("document", &context)])
}

pub fn evaluation_prompt(prompts: &Prompts, limits: &Limits, document: &str, question: &str, answer: &str) -> String {
  let context = truncate_with_ellipsis(document, limits.context_max_chars);
  fill_template(
    &prompts.evaluation_template,
    &[("document", &context), ("question", question), ("answer", answer)],
  )
}

/// Generate exactly three comprehension questions.
///
/// Each attempt is a full generate-and-parse cycle; the first attempt with at
/// least three qualifying lines wins. Exhausting `question_attempts` returns the
/// degraded sentinel set. A failed completion call aborts immediately.
#[instrument(level = "info", skip_all, fields(doc_len = document.len()))]
pub async fn generate_questions(
  client: &dyn CompletionClient,
  prompts: &Prompts,
  limits: &Limits,
  document: &str,
) -> Result<GeneratedQuestions, CompletionError> {
  let prompt = questions_prompt(prompts, limits, document);
  let budget = limits.questions;

  for attempt in 1..=limits.question_attempts {
    let response = client.complete(&prompt, budget.max_tokens, budget.temperature).await?;
    let parsed = parse_questions(&response);
    if parsed.len() >= QUESTIONS_PER_CHALLENGE {
      let mut parsed = parsed.into_iter();
      let questions = std::array::from_fn(|_| parsed.next().unwrap_or_default());
      info!(target: "challenge", attempt, "Challenge questions generated");
      return Ok(GeneratedQuestions { questions, degraded: false });
    }
    warn!(
      target: "challenge",
      attempt,
      qualifying = parsed.len(),
      response = %trunc_for_log(&response, 120),
      "Too few qualifying questions; retrying"
    );
  }

  warn!(target: "challenge", attempts = limits.question_attempts, "Question generation exhausted; serving sentinel questions");
  Ok(GeneratedQuestions::degraded())
}

/// Ask the model to judge `user_answer`; the snippet is located from its feedback.
#[instrument(level = "info", skip_all, fields(question_len = question.len(), answer_len = user_answer.len()))]
pub async fn evaluate_answer(
  client: &dyn CompletionClient,
  prompts: &Prompts,
  limits: &Limits,
  document: &str,
  question: &str,
  user_answer: &str,
) -> Result<Evaluation, CompletionError> {
  let prompt = evaluation_prompt(prompts, limits, document, question, user_answer);
  let budget = limits.evaluation;
  let feedback = client.complete(&prompt, budget.max_tokens, budget.temperature).await?.trim().to_string();
  let snippet = locate(document, &feedback, limits.snippet_window);
  Ok(Evaluation { feedback, snippet })
}

const POSITIVE_MARKERS: [&str; 3] = ["correct", "good job", "well done"];
const NEGATIVE_MARKERS: [&str; 2] = ["incorrect", "not correct"];

/// Lexical verdict on model feedback: positive marker present and no negative one.
///
/// Known limitation: negation scope is not understood. "correct" is a substring
/// of both negative markers, so any negative marker wins; phrasings like
/// "that is wrong" without a positive marker read as incorrect too.
pub fn classify_feedback(feedback: &str) -> bool {
  let lower = feedback.to_lowercase();
  let positive = POSITIVE_MARKERS.iter().any(|m| lower.contains(m));
  let negative = NEGATIVE_MARKERS.iter().any(|m| lower.contains(m));
  positive && !negative
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::completion::testing::ScriptedCompletion;

  const GOOD: &str = "1. What process converts light energy into chemical energy in plants?\n\
    2. Which pigments absorb mostly blue and red light according to the text?\n\
    3. What does the Calvin cycle fix into sugars during the second stage?";

  #[test]
  fn classifier_literal_rule() {
    assert!(classify_feedback("Correct!"));
    assert!(!classify_feedback("This is incorrect."));
    assert!(!classify_feedback("Not correct at all."));
    assert!(classify_feedback("Well done, good job!"));
    assert!(!classify_feedback("The answer misses the point."));
    assert!(!classify_feedback("Correct, however incorrect reasoning."));
  }

  #[test]
  fn question_line_filter() {
    assert_eq!(
      parse_question_line("  2.   Why does the author argue that memory safety matters for systems code?  ").as_deref(),
      Some("Why does the author argue that memory safety matters for systems code?")
    );
    assert_eq!(parse_question_line("Here are three questions about the document you provided today?"), None);
    assert_eq!(parse_question_line("1. Too short a question here?"), None);
    assert_eq!(parse_question_line("1. This line has plenty of words but it does not end with a question mark."), None);
    assert_eq!(parse_question_line("1) What is wrong with this numbering style in the generated output text?"), None);
    assert!(parse_question_line("12.What happens when the marker is glued to the first word of the question?").is_some());
  }

  #[test]
  fn parse_skips_preamble() {
    let response = format!("Sure! Here are your questions:\n\n{GOOD}\n");
    let qs = parse_questions(&response);
    assert_eq!(qs.len(), 3);
    assert!(qs[0].starts_with("What process"));
  }

  #[tokio::test]
  async fn first_good_attempt_wins() {
    let client = ScriptedCompletion::new([GOOD]);
    let out = generate_questions(&client, &Prompts::default(), &Limits::default(), "doc").await.unwrap();
    assert!(!out.degraded);
    assert_eq!(out.questions[2], "What does the Calvin cycle fix into sugars during the second stage?");
    let calls = client.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].temperature, 0.7);
    assert_eq!(calls[0].max_output_tokens, 400);
  }

  #[tokio::test]
  async fn retries_until_three_questions_parse() {
    let client = ScriptedCompletion::new(["1. Only one good question is present in this first response here?", GOOD]);
    let out = generate_questions(&client, &Prompts::default(), &Limits::default(), "doc").await.unwrap();
    assert!(!out.degraded);
    assert_eq!(client.calls().len(), 2);
  }

  #[tokio::test]
  async fn extra_questions_are_dropped() {
    let response = format!("{GOOD}\n4. Is there a fourth question that should be dropped from the final set?");
    let client = ScriptedCompletion::new([response]);
    let out = generate_questions(&client, &Prompts::default(), &Limits::default(), "doc").await.unwrap();
    assert_eq!(out.questions.len(), 3);
    assert!(out.questions.iter().all(|q| !q.contains("fourth")));
  }

  #[tokio::test]
  async fn exhaustion_returns_three_sentinels() {
    let client = ScriptedCompletion::new(["nope", "still nope", "1. short?"]);
    let out = generate_questions(&client, &Prompts::default(), &Limits::default(), "doc").await.unwrap();
    assert!(out.degraded);
    assert_eq!(out.questions.len(), 3);
    assert!(out.questions.iter().all(|q| q == QUESTION_SENTINEL));
    assert_eq!(client.calls().len(), 3);
  }

  #[tokio::test]
  async fn completion_error_is_not_retried() {
    let client = ScriptedCompletion::failing(CompletionError::Api { status: 429, message: "quota".into() });
    let err = generate_questions(&client, &Prompts::default(), &Limits::default(), "doc").await.unwrap_err();
    assert!(matches!(err, CompletionError::Api { status: 429, .. }));
    assert_eq!(client.calls().len(), 1);
  }

  #[tokio::test]
  async fn evaluation_prompt_and_snippet() {
    let doc = "Chlorophyll absorbs mostly blue and red light, reflecting green.";
    let client = ScriptedCompletion::new(["Chlorophyll absorbs mostly blue and red light. Correct!"]);
    let eval = evaluate_answer(&client, &Prompts::default(), &Limits::default(), doc, "What does chlorophyll absorb?", "blue and red light")
      .await
      .unwrap();
    assert!(classify_feedback(&eval.feedback));
    assert!(eval.snippet.starts_with("Chlorophyll absorbs mostly"));
    assert!(doc.starts_with(&eval.snippet));

    let call = &client.calls()[0];
    assert!(call.prompt.contains("Question: What does chlorophyll absorb?\nUser's Answer: blue and red light\n"));
    assert_eq!(call.max_output_tokens, 300);
    assert_eq!(call.temperature, 0.3);
  }
}
