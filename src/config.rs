//! Process configuration: environment variables plus an optional TOML file
//! with prompt templates and generation parameters.
//!
//! Everything is read once at startup into `AppConfig` and injected into
//! `AppState`; nothing below reads the environment lazily.

use serde::Deserialize;
use tracing::{error, info};

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-pro";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;

#[derive(Clone, Debug)]
pub struct AppConfig {
  pub port: u16,
  pub gemini: GeminiSettings,
  pub database_url: Option<String>,
  pub database_max_connections: u32,
  pub prompts: Prompts,
  pub generation: GenerationSettings,
}

/// Upstream connection settings. `api_key` stays `None` when GEMINI_API_KEY is
/// unset; requests then fail with a configuration error before any network call.
#[derive(Clone)]
pub struct GeminiSettings {
  pub api_key: Option<String>,
  pub base_url: String,
  pub model: String,
}

impl std::fmt::Debug for GeminiSettings {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("GeminiSettings")
      .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
      .field("base_url", &self.base_url)
      .field("model", &self.model)
      .finish()
  }
}

/// Shape of the optional TOML file pointed to by PROMPTS_CONFIG_PATH.
#[derive(Clone, Debug, Deserialize, Default)]
pub struct FileConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub generation: GenerationSettings,
}

/// Prompt templates. Placeholders: `{language}`, `{code}`, `{line_number}`,
/// `{focus}`, `{difficulty}`, `{topic}`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub explain_simple_template: String,
  pub explain_detailed_template: String,
  /// Appended (through `{focus}`) when a line number is given.
  pub explain_simple_focus_template: String,
  pub explain_detailed_focus_template: String,
  pub problem_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      explain_simple_template: "Explain this {language} code in simple terms:\n{code}\n\n{focus}".into(),
      explain_detailed_template: "Explain this {language} code in detail, including:\n\
        1. What each line does\n\
        2. The algorithm/logic being used\n\
        3. Time and space complexity\n\
        4. Potential improvements\n\
        5. Common pitfalls to avoid\n\n\
        Code:\n{code}\n\n{focus}"
        .into(),
      explain_simple_focus_template: "Focus on line {line_number}:".into(),
      explain_detailed_focus_template: "Focus specifically on line {line_number}:".into(),
      problem_template: "Generate a {difficulty} level {language} programming practice problem about {topic}.\n\n\
        Return a JSON object with:\n\
        {\n  \
          \"title\": \"Problem title\",\n  \
          \"description\": \"Clear problem description\",\n  \
          \"starterCode\": \"Starter code template\",\n  \
          \"solution\": \"Complete solution\",\n  \
          \"testCases\": [{\"input\": \"test input\", \"output\": \"expected output\"}],\n  \
          \"hints\": [\"hint1\", \"hint2\"],\n  \
          \"concepts\": [\"concept1\", \"concept2\"]\n\
        }"
        .into(),
    }
  }
}

/// Sampling parameters for each upstream call.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationSettings {
  pub explain_temperature: f32,
  pub explain_max_tokens: u32,
  pub problem_temperature: f32,
  pub problem_max_tokens: u32,
}

impl Default for GenerationSettings {
  fn default() -> Self {
    Self {
      explain_temperature: 0.7,
      explain_max_tokens: 1000,
      problem_temperature: 0.8,
      problem_max_tokens: 2000,
    }
  }
}

impl AppConfig {
  /// Read the whole configuration from the process environment.
  pub fn from_env() -> Self {
    let file_cfg = load_file_config_from_env().unwrap_or_default();

    let port = std::env::var("PORT")
      .ok()
      .and_then(|p| p.parse::<u16>().ok())
      .unwrap_or(DEFAULT_PORT);

    let gemini = GeminiSettings {
      api_key: non_empty_env("GEMINI_API_KEY"),
      base_url: non_empty_env("GEMINI_BASE_URL").unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.into()),
      model: non_empty_env("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.into()),
    };

    let database_max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
      .ok()
      .and_then(|v| v.parse::<u32>().ok())
      .filter(|n| *n > 0)
      .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS);

    Self {
      port,
      gemini,
      database_url: non_empty_env("DATABASE_URL"),
      database_max_connections,
      prompts: file_cfg.prompts,
      generation: file_cfg.generation,
    }
  }
}

fn non_empty_env(key: &str) -> Option<String> {
  std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Parse the TOML overrides file. Errors are reported to the caller as text.
pub fn parse_file_config(s: &str) -> Result<FileConfig, String> {
  toml::from_str::<FileConfig>(s).map_err(|e| e.to_string())
}

/// Attempt to load `FileConfig` from PROMPTS_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_file_config_from_env() -> Option<FileConfig> {
  let path = std::env::var("PROMPTS_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match parse_file_config(&s) {
      Ok(cfg) => {
        info!(target: "codementor", %path, "Loaded prompts config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "codementor", %path, error = %e, "Failed to parse TOML config; using defaults");
        None
      }
    },
    Err(e) => {
      error!(target: "codementor", %path, error = %e, "Failed to read TOML config file; using defaults");
      None
    }
  }
}
