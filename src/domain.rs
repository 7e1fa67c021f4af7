//! Domain models: explanation requests/results and practice problems.
//!
//! Wire-level parsing lives in `protocol`; the types here are already validated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How much depth the explanation should go into.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExplanationMode {
  #[default]
  Simple,
  Detailed,
}

/// A validated explanation request. Exists only for the duration of one call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExplanationRequest {
  pub code: String,
  pub language: String,
  /// 1-based line to focus on.
  pub line_number: Option<u32>,
  pub mode: ExplanationMode,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExplanationResult {
  pub explanation: String,
  /// Heuristic in [60, 95]; see `explain::confidence`.
  pub confidence: u8,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PracticeProblemRequest {
  pub language: String,
  pub difficulty: String,
  pub topic: String,
  pub requesting_user_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestCase {
  #[serde(deserialize_with = "text_or_json")]
  pub input: String,
  #[serde(deserialize_with = "text_or_json")]
  pub output: String,
}

/// Models often emit test values as raw JSON (`[2,7]`, `9`); keep those as their JSON text.
fn text_or_json<'de, D>(deserializer: D) -> Result<String, D::Error>
where
  D: serde::Deserializer<'de>,
{
  match serde_json::Value::deserialize(deserializer)? {
    serde_json::Value::String(s) => Ok(s),
    serde_json::Value::Null => Err(serde::de::Error::custom("test case value is null")),
    other => Ok(other.to_string()),
  }
}

/// Problem body as produced by the upstream model, before it is tied to a request.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GeneratedProblem {
  pub title: String,
  pub description: String,
  pub starter_code: String,
  pub solution: String,
  pub test_cases: Vec<TestCase>,
  pub hints: Vec<String>,
  pub concepts: Vec<String>,
}

impl GeneratedProblem {
  /// Check required content and collapse `concepts` into a set (first occurrence wins).
  pub fn validated(mut self) -> Result<Self, String> {
    for (name, value) in [("title", &self.title), ("description", &self.description), ("solution", &self.solution)] {
      if value.trim().is_empty() {
        return Err(format!("field `{name}` is empty"));
      }
    }

    let mut seen = std::collections::HashSet::new();
    self.concepts.retain(|c| seen.insert(c.trim().to_lowercase()));
    Ok(self)
  }
}

/// Everything the store needs to create a row; identity and timestamp are store-assigned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewPracticeProblem {
  pub problem: GeneratedProblem,
  pub language: String,
  pub difficulty: String,
  pub topic: String,
  pub created_by: String,
}

impl NewPracticeProblem {
  pub fn new(problem: GeneratedProblem, req: &PracticeProblemRequest) -> Self {
    Self {
      problem,
      language: req.language.clone(),
      difficulty: req.difficulty.clone(),
      topic: req.topic.clone(),
      created_by: req.requesting_user_id.clone(),
    }
  }
}

/// Persisted practice problem. Written once, never mutated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeProblem {
  pub id: Uuid,
  pub title: String,
  pub description: String,
  pub starter_code: String,
  pub solution: String,
  pub test_cases: Vec<TestCase>,
  pub hints: Vec<String>,
  pub concepts: Vec<String>,
  pub language: String,
  pub difficulty: String,
  pub topic: String,
  pub created_by: String,
  pub created_at: DateTime<Utc>,
}

impl PracticeProblem {
  pub fn from_new(id: Uuid, created_at: DateTime<Utc>, new: NewPracticeProblem) -> Self {
    let NewPracticeProblem { problem, language, difficulty, topic, created_by } = new;
    Self {
      id,
      title: problem.title,
      description: problem.description,
      starter_code: problem.starter_code,
      solution: problem.solution,
      test_cases: problem.test_cases,
      hints: problem.hints,
      concepts: problem.concepts,
      language,
      difficulty,
      topic,
      created_by,
      created_at,
    }
  }
}
