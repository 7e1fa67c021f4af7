//! Test doubles: a scripted text generator and a store that always fails.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::config::{GenerationSettings, Prompts};
use crate::domain::{NewPracticeProblem, PracticeProblem};
use crate::gemini::{GenerationError, GenerationParams, TextGenerator};
use crate::state::AppState;
use crate::store::{MemoryProblemStore, ProblemStore, StoreError};

type Reply = Arc<dyn Fn() -> Result<Option<String>, GenerationError> + Send + Sync>;

/// Returns the same scripted reply for every call and records what it was asked.
#[derive(Clone)]
pub struct ScriptedGenerator {
  reply: Reply,
  seen: Arc<Mutex<Vec<(String, GenerationParams)>>>,
}

impl ScriptedGenerator {
  fn with(reply: Reply) -> Self {
    Self { reply, seen: Arc::new(Mutex::new(Vec::new())) }
  }

  /// Reply with `text`; an empty string behaves like an upstream answer without text.
  pub fn text(text: &str) -> Self {
    let text = text.to_string();
    Self::with(Arc::new(move || Ok(Some(text.clone()).filter(|t| !t.trim().is_empty()))))
  }

  pub fn empty() -> Self {
    Self::with(Arc::new(|| Ok(None)))
  }

  pub fn failing(err: impl Fn() -> GenerationError + Send + Sync + 'static) -> Self {
    Self::with(Arc::new(move || Err(err())))
  }

  pub fn calls(&self) -> usize {
    self.seen.lock().unwrap().len()
  }

  pub fn prompts(&self) -> Vec<String> {
    self.seen.lock().unwrap().iter().map(|(p, _)| p.clone()).collect()
  }

  pub fn params(&self) -> Vec<GenerationParams> {
    self.seen.lock().unwrap().iter().map(|(_, p)| *p).collect()
  }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
  async fn generate(&self, prompt: &str, params: GenerationParams) -> Result<Option<String>, GenerationError> {
    self.seen.lock().unwrap().push((prompt.to_string(), params));
    (self.reply)()
  }
}

pub struct FailingStore;

#[async_trait]
impl ProblemStore for FailingStore {
  async fn insert(&self, _new: NewPracticeProblem) -> Result<PracticeProblem, StoreError> {
    Err(StoreError::Insert("connection reset".into()))
  }

  async fn recent(&self, _limit: u32) -> Result<Vec<PracticeProblem>, StoreError> {
    Err(StoreError::Query("connection reset".into()))
  }

  fn backend(&self) -> &'static str {
    "failing"
  }
}

pub fn state_with_store(gen: ScriptedGenerator, store: Arc<dyn ProblemStore>) -> AppState {
  AppState::new(Some(Arc::new(gen)), store, Prompts::default(), GenerationSettings::default())
}

pub fn state_with(gen: ScriptedGenerator) -> AppState {
  state_with_store(gen, Arc::new(MemoryProblemStore::new()))
}

pub fn state_without_generator() -> AppState {
  AppState::new(None, Arc::new(MemoryProblemStore::new()), Prompts::default(), GenerationSettings::default())
}
