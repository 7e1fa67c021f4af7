//! Code explanation: prompt construction, one upstream call, confidence heuristic.

use tracing::{debug, instrument, warn};

use crate::config::Prompts;
use crate::domain::{ExplanationMode, ExplanationRequest, ExplanationResult};
use crate::error::ApiError;
use crate::gemini::{GenerationError, GenerationParams};
use crate::state::AppState;
use crate::util::{fill_template, utf16_len};

pub const FALLBACK_EXPLANATION: &str = "Unable to generate explanation";

pub const MIN_CONFIDENCE: u8 = 60;
pub const MAX_CONFIDENCE: u8 = 95;

/// Build the upstream prompt. Pure function of the request and templates.
pub fn build_prompt(prompts: &Prompts, req: &ExplanationRequest) -> String {
  let (template, focus_template) = match req.mode {
    ExplanationMode::Simple => (&prompts.explain_simple_template, &prompts.explain_simple_focus_template),
    ExplanationMode::Detailed => (&prompts.explain_detailed_template, &prompts.explain_detailed_focus_template),
  };

  let focus = match req.line_number {
    Some(n) => fill_template(focus_template, &[("line_number", &n.to_string())]),
    None => String::new(),
  };

  let prompt = fill_template(template, &[("focus", &focus), ("language", &req.language), ("code", &req.code)]);
  prompt.trim_end().to_string()
}

/// Crude, uncalibrated score: `round(clamp(85 - 2*lines + reply_len/20, 60, 95))`.
///
/// `lines` counts `\n`-separated segments of the code; `reply_len` is the upstream
/// text length in UTF-16 code units (0 when the fallback text is served).
pub fn confidence(code: &str, reply_len: usize) -> u8 {
  let lines = code.split('\n').count() as f64;
  let raw = 85.0 - 2.0 * lines + reply_len as f64 / 20.0;
  raw.clamp(f64::from(MIN_CONFIDENCE), f64::from(MAX_CONFIDENCE)).round() as u8
}

/// Explain the code. Upstream API failures and empty replies degrade to
/// `FALLBACK_EXPLANATION`; a missing credential or transport failure is an error.
#[instrument(level = "info", skip(state, req), fields(language = %req.language, mode = ?req.mode, code_len = req.code.len(), line = ?req.line_number))]
pub async fn explain_code(state: &AppState, req: &ExplanationRequest) -> Result<ExplanationResult, ApiError> {
  let generator = state.generator()?;
  let prompt = build_prompt(&state.prompts, req);
  let params = GenerationParams {
    temperature: state.generation.explain_temperature,
    max_output_tokens: state.generation.explain_max_tokens,
  };

  let reply = match generator.generate(&prompt, params).await {
    Ok(text) => text,
    Err(e @ (GenerationError::MissingCredential | GenerationError::Transport(_))) => return Err(e.into()),
    Err(e) => {
      warn!(target: "explain", error = %e, "Upstream call failed; serving fallback explanation");
      None
    }
  };

  let (explanation, reply_len) = match reply {
    Some(text) => {
      let len = utf16_len(&text);
      (text, len)
    }
    None => (FALLBACK_EXPLANATION.to_string(), 0),
  };

  let confidence = confidence(&req.code, reply_len);
  debug!(target: "explain", reply_len, confidence, "Explanation ready");
  Ok(ExplanationResult { explanation, confidence })
}
