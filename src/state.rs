//! Application state: configuration, the upstream generator, and the problem store.
//!
//! The generator is optional: when GEMINI_API_KEY is missing the service still
//! starts, and every generation request fails fast with a configuration error.

use std::sync::Arc;

use tracing::{error, info, instrument, warn};

use crate::config::{AppConfig, GenerationSettings, Prompts};
use crate::gemini::{GeminiClient, GenerationError, TextGenerator};
use crate::store::{MemoryProblemStore, MEMORY_STORE_CAPACITY, PgProblemStore, ProblemStore, StoreError};

#[derive(Clone)]
pub struct AppState {
  pub generator: Option<Arc<dyn TextGenerator>>,
  pub store: Arc<dyn ProblemStore>,
  pub prompts: Prompts,
  pub generation: GenerationSettings,
}

impl AppState {
  pub fn new(
    generator: Option<Arc<dyn TextGenerator>>,
    store: Arc<dyn ProblemStore>,
    prompts: Prompts,
    generation: GenerationSettings,
  ) -> Self {
    Self { generator, store, prompts, generation }
  }

  /// Build state from configuration: Gemini client (if keyed) and the store.
  /// A configured DATABASE_URL that cannot be reached is a startup error.
  #[instrument(level = "info", skip_all)]
  pub async fn from_config(cfg: &AppConfig) -> Result<Self, StoreError> {
    let generator: Option<Arc<dyn TextGenerator>> = match GeminiClient::from_settings(&cfg.gemini) {
      Ok(client) => {
        info!(target: "codementor", base_url = %client.base_url, model = %client.model, "Gemini enabled.");
        Some(Arc::new(client))
      }
      Err(e) => {
        error!(target: "codementor", error = %e, "Gemini disabled; explain-code and generate-practice will fail until GEMINI_API_KEY is set.");
        None
      }
    };

    let store: Arc<dyn ProblemStore> = match &cfg.database_url {
      Some(url) => Arc::new(PgProblemStore::connect(url, cfg.database_max_connections).await?),
      None => {
        warn!(target: "codementor", capacity = MEMORY_STORE_CAPACITY, "DATABASE_URL not set; only the most recent practice problems are kept, in memory.");
        Arc::new(MemoryProblemStore::new())
      }
    };

    Ok(Self::new(generator, store, cfg.prompts.clone(), cfg.generation))
  }

  /// The configured generator, or `MissingCredential` before any network call happens.
  pub fn generator(&self) -> Result<&dyn TextGenerator, GenerationError> {
    self.generator.as_deref().ok_or(GenerationError::MissingCredential)
  }
}
