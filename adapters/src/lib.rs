//! Narrow, swappable backends behind the pipeline's three contracts.
//!
//! None of these traits return `Result`: a failed transcription, translation
//! or synthesis degrades to an empty string or empty chunk sequence rather
//! than propagating an error, matching the "no error type surfaces past the
//! adapter boundary" policy the orchestrator relies on.

mod asr;
mod mt;
mod tts;

pub use asr::{AdapterError, WhisperAsr, WhisperModel};
pub use mt::PassthroughMt;
pub use tts::ToneTts;

/// Speech-to-text. `samples` is 16kHz mono f32 PCM.
///
/// `language_hint`, when set, names the expected source language (e.g.
/// `"es"`); `None` means auto-detect. Implementations must be `Send` so they
/// can be driven from `tokio::task::spawn_blocking`.
pub trait AsrAdapter: Send {
    fn transcribe(&mut self, samples: &[f32], language_hint: Option<&str>) -> String;
}

/// Machine translation of a single committed segment.
pub trait MtAdapter: Send + Sync {
    fn translate(&self, text: &str, src_lang: &str, tgt_lang: &str) -> String;
}

/// Text-to-speech, streamed as PCM16 mono chunks at a fixed output rate.
pub trait TtsAdapter: Send + Sync {
    fn synthesize_streaming(&self, text: &str, lang: &str) -> Vec<Vec<u8>>;
}
