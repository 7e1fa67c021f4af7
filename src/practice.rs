//! Practice problem generation: prompt, upstream call, JSON extraction,
//! validation, and a single insert.

use tracing::{info, instrument, warn};

use crate::config::Prompts;
use crate::domain::{GeneratedProblem, NewPracticeProblem, PracticeProblem, PracticeProblemRequest};
use crate::error::ApiError;
use crate::gemini::GenerationParams;
use crate::state::AppState;
use crate::util::{fill_template, trunc_for_log};

pub fn build_prompt(prompts: &Prompts, req: &PracticeProblemRequest) -> String {
  fill_template(
    &prompts.problem_template,
    &[("difficulty", &req.difficulty), ("language", &req.language), ("topic", &req.topic)],
  )
}

/// Return the first balanced `{...}` span in `text`.
///
/// Braces inside JSON string literals are ignored. The span is not guaranteed to
/// be the object the model meant to emit; any earlier balanced pair wins.
pub fn extract_json_object(text: &str) -> Option<&str> {
  let start = text.find('{')?;
  let mut depth = 0usize;
  let mut in_string = false;
  let mut escaped = false;

  for (offset, ch) in text[start..].char_indices() {
    if in_string {
      match ch {
        _ if escaped => escaped = false,
        '\\' => escaped = true,
        '"' => in_string = false,
        _ => {}
      }
      continue;
    }
    match ch {
      '"' => in_string = true,
      '{' => depth += 1,
      '}' => {
        depth -= 1;
        if depth == 0 {
          return Some(&text[start..start + offset + 1]);
        }
      }
      _ => {}
    }
  }
  None
}

/// Turn raw model text into a validated problem body.
pub fn parse_problem(text: &str) -> Result<GeneratedProblem, ApiError> {
  let json = extract_json_object(text)
    .ok_or_else(|| ApiError::InvalidResponseFormat("no JSON object found in model output".into()))?;

  let problem: GeneratedProblem =
    serde_json::from_str(json).map_err(|e| ApiError::InvalidResponseFormat(e.to_string()))?;

  problem.validated().map_err(ApiError::InvalidResponseFormat)
}

/// Generate, validate, and persist one practice problem. Nothing is written on any failure path.
#[instrument(level = "info", skip(state, req), fields(language = %req.language, difficulty = %req.difficulty, topic = %req.topic))]
pub async fn generate_problem(state: &AppState, req: &PracticeProblemRequest) -> Result<PracticeProblem, ApiError> {
  let generator = state.generator()?;
  let prompt = build_prompt(&state.prompts, req);
  let params = GenerationParams {
    temperature: state.generation.problem_temperature,
    max_output_tokens: state.generation.problem_max_tokens,
  };

  let content = generator.generate(&prompt, params).await?.unwrap_or_default();

  let problem = parse_problem(&content).map_err(|e| {
    warn!(target: "practice", error = %e, preview = %trunc_for_log(&content, 120), "Model output rejected");
    e
  })?;

  let stored = state.store.insert(NewPracticeProblem::new(problem, req)).await?;
  info!(target: "practice", id = %stored.id, title = %stored.title, backend = state.store.backend(), "Practice problem stored");
  Ok(stored)
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use super::*;
  use crate::gemini::GenerationError;
  use crate::store::MemoryProblemStore;
  use crate::testing::{state_with_store, state_without_generator, FailingStore, ScriptedGenerator};

  const VALID: &str = r#"{
    "title": "Reverse a String",
    "description": "Write a function that reverses a string.",
    "starterCode": "def reverse(s):\n    pass",
    "solution": "def reverse(s):\n    return s[::-1]",
    "testCases": [{"input": "\"abc\"", "output": "\"cba\""}],
    "hints": ["Slicing works", "Try a loop"],
    "concepts": ["strings", "slicing"]
  }"#;

  fn request() -> PracticeProblemRequest {
    PracticeProblemRequest {
      language: "python".into(),
      difficulty: "beginner".into(),
      topic: "strings".into(),
      requesting_user_id: "user-42".into(),
    }
  }

  #[test]
  fn prompt_names_parameters_and_shape() {
    let p = build_prompt(&Prompts::default(), &request());
    assert!(p.starts_with("Generate a beginner level python programming practice problem about strings."));
    for key in ["\"title\"", "\"starterCode\"", "\"testCases\"", "\"hints\"", "\"concepts\""] {
      assert!(p.contains(key), "missing {key}");
    }
  }

  #[test]
  fn request_values_are_not_expanded() {
    let mut req = request();
    req.difficulty = "{topic}".into();
    req.topic = "graphs".into();
    let p = build_prompt(&Prompts::default(), &req);
    assert!(p.starts_with("Generate a {topic} level python programming practice problem about graphs."));
  }

  #[test]
  fn extracts_object_surrounded_by_prose() {
    let text = format!("Sure! Here it is:\n```json\n{VALID}\n```\nGood luck.");
    assert_eq!(extract_json_object(&text), Some(VALID));
  }

  #[test]
  fn braces_inside_strings_do_not_count() {
    let text = r#"{"a": "}{", "b": "\"}"} trailing }"#;
    assert_eq!(extract_json_object(text), Some(r#"{"a": "}{", "b": "\"}"}"#));
  }

  #[test]
  fn first_balanced_span_wins() {
    assert_eq!(extract_json_object("use {x} then {\"title\": 1}"), Some("{x}"));
  }

  #[test]
  fn unbalanced_or_absent_is_none() {
    assert_eq!(extract_json_object("no json here"), None);
    assert_eq!(extract_json_object("{\"open\": true"), None);
    assert_eq!(extract_json_object(""), None);
  }

  #[test]
  fn parse_problem_reports_invalid_format() {
    let err = parse_problem("I cannot help with that.").unwrap_err();
    assert_eq!(err.code(), "invalid_response_format");
    assert!(err.to_string().starts_with("Invalid response format"));

    let err = parse_problem(r#"{"title": "only a title"}"#).unwrap_err();
    assert_eq!(err.code(), "invalid_response_format");
  }

  #[tokio::test]
  async fn valid_output_is_merged_and_stored() {
    let gen = ScriptedGenerator::text(&format!("Here you go: {VALID}"));
    let store = MemoryProblemStore::new();
    let state = state_with_store(gen.clone(), Arc::new(store.clone()));

    let p = generate_problem(&state, &request()).await.unwrap();
    assert_eq!(p.title, "Reverse a String");
    assert_eq!(p.language, "python");
    assert_eq!(p.difficulty, "beginner");
    assert_eq!(p.topic, "strings");
    assert_eq!(p.created_by, "user-42");
    assert_eq!(p.test_cases.len(), 1);
    assert_eq!(store.len().await, 1);

    let params = gen.params();
    assert_eq!(params[0].max_output_tokens, 2000);
    assert_eq!(params[0].temperature, 0.8);
  }

  #[tokio::test]
  async fn no_object_means_no_write() {
    let store = MemoryProblemStore::new();
    let state = state_with_store(ScriptedGenerator::text("Sorry, no."), Arc::new(store.clone()));
    let err = generate_problem(&state, &request()).await.unwrap_err();
    assert_eq!(err.code(), "invalid_response_format");
    assert_eq!(store.len().await, 0);
  }

  #[tokio::test]
  async fn empty_reply_means_invalid_format() {
    let store = MemoryProblemStore::new();
    let state = state_with_store(ScriptedGenerator::empty(), Arc::new(store.clone()));
    let err = generate_problem(&state, &request()).await.unwrap_err();
    assert_eq!(err.code(), "invalid_response_format");
    assert_eq!(store.len().await, 0);
  }

  #[tokio::test]
  async fn upstream_error_propagates_without_write() {
    let store = MemoryProblemStore::new();
    let gen = ScriptedGenerator::failing(|| GenerationError::Api { status: 429, message: "quota".into() });
    let state = state_with_store(gen, Arc::new(store.clone()));
    let err = generate_problem(&state, &request()).await.unwrap_err();
    assert_eq!(err.code(), "upstream_error");
    assert_eq!(store.len().await, 0);
  }

  #[tokio::test]
  async fn store_failure_is_persistence_error() {
    let state = state_with_store(ScriptedGenerator::text(VALID), Arc::new(FailingStore));
    let err = generate_problem(&state, &request()).await.unwrap_err();
    assert_eq!(err.code(), "persistence_error");
  }

  #[tokio::test]
  async fn missing_credential_fails_fast() {
    let state = state_without_generator();
    let err = generate_problem(&state, &request()).await.unwrap_err();
    assert_eq!(err.code(), "configuration_error");
  }
}
