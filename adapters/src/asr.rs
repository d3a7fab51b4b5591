use std::path::Path;
use std::sync::Arc;

use shared_audio::{filter_hypothesis, is_silent};
use thiserror::Error;
use tracing::{info, warn};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters, WhisperState};

use crate::AsrAdapter;

/// Minimum window length to bother transcribing — 0.5s at 16kHz.
const MIN_SAMPLES: usize = 8_000;

/// Segments above this no-speech probability are dropped.
const MAX_NO_SPEECH_PROB: f32 = 0.6;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("model not found: {0}")]
    ModelNotFound(String),
    #[error("whisper context initialization failed: {0}")]
    ContextInit(String),
}

/// Whisper-backed ASR over a sliding audio window.
///
/// The GGML model is loaded once into a `WhisperContext` and shared (via
/// [`WhisperAsr::load_context`]) across every session; each session then
/// gets its own `WhisperState` through [`WhisperAsr::new`], since a
/// `WhisperState` is not safe to drive concurrently from more than one
/// caller.
/// A loaded GGML model, shareable across every session. Re-exported under
/// this alias so downstream crates can hold one without depending on
/// `whisper-rs` directly.
pub type WhisperModel = Arc<WhisperContext>;

pub struct WhisperAsr {
    ctx: WhisperModel,
    state: WhisperState,
}

// whisper-rs declares `WhisperContext` Send+Sync (read-only model weights);
// `WhisperState` holds a raw pointer with no such declaration, but each
// `WhisperAsr` is only ever driven by the single spawn_blocking worker it
// was handed to, never concurrently.
// SAFETY: see above — no concurrent access to `state` ever occurs.
unsafe impl Send for WhisperAsr {}

impl WhisperAsr {
    /// Load the GGML model once at startup. The returned context is shared
    /// (via `Arc`) across every session's own [`WhisperAsr::new`] state.
    pub fn load_context(model_path: impl AsRef<Path>) -> Result<WhisperModel, AdapterError> {
        let path = model_path.as_ref();
        if !path.exists() {
            return Err(AdapterError::ModelNotFound(path.display().to_string()));
        }
        let path_str = path.to_str().ok_or_else(|| {
            AdapterError::ModelNotFound(format!(
                "model path contains non-UTF-8 characters: {}",
                path.display()
            ))
        })?;

        let ctx_params = WhisperContextParameters::default();
        let ctx = WhisperContext::new_with_params(path_str, ctx_params)
            .map_err(|e| AdapterError::ContextInit(e.to_string()))?;

        info!(model = %path.display(), "whisper model loaded");
        Ok(Arc::new(ctx))
    }

    /// Create a per-session adapter sharing `ctx`'s read-only model weights.
    pub fn new(ctx: WhisperModel) -> Result<Self, AdapterError> {
        let state = ctx
            .create_state()
            .map_err(|e| AdapterError::ContextInit(e.to_string()))?;
        Ok(Self { ctx, state })
    }
}

impl AsrAdapter for WhisperAsr {
    fn transcribe(&mut self, samples: &[f32], language_hint: Option<&str>) -> String {
        if samples.len() < MIN_SAMPLES {
            return String::new();
        }
        if is_silent(samples) {
            return String::new();
        }

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_language(language_hint);
        params.set_translate(false);
        params.set_print_progress(false);
        params.set_print_special(false);
        params.set_print_realtime(false);
        params.set_no_context(true);
        params.set_single_segment(false);
        params.set_suppress_nst(true);

        if let Err(e) = self.state.full(params, samples) {
            warn!(error = %e, "whisper inference failed");
            return String::new();
        }

        let n_segments = self.state.full_n_segments();
        let eot_id = self.ctx.token_eot();
        let mut parts: Vec<String> = Vec::new();

        for i in 0..n_segments {
            let Some(segment) = self.state.get_segment(i) else {
                continue;
            };
            if segment.no_speech_probability() > MAX_NO_SPEECH_PROB {
                continue;
            }

            let n_tokens = segment.n_tokens();
            let mut text = String::new();
            for j in 0..n_tokens {
                let Some(token) = segment.get_token(j) else {
                    continue;
                };
                if token.token_id() >= eot_id {
                    continue; // special token
                }
                let Ok(token_text) = token.to_str_lossy() else {
                    continue;
                };
                text.push_str(&token_text);
            }

            let text = text.trim();
            if !text.is_empty() {
                parts.push(text.to_string());
            }
        }

        filter_hypothesis(&parts.join(" "))
    }
}
