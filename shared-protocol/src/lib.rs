use serde::{Deserialize, Serialize};

/// Mono PCM16 capture rate the pipeline is built around.
pub const SAMPLE_RATE: u32 = 16_000;

/// Default streaming output rate for synthesized speech.
pub const DEFAULT_TTS_SAMPLE_RATE: u32 = 24_000;

/// Messages sent by the client over the bidirectional stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Must be the first record; may be resent to reconfigure mid-session.
    Config {
        source_lang: String,
        target_lang: String,
    },
    /// PCM16 LE mono audio, base64-encoded.
    Audio {
        seq: i64,
        sample_rate: u32,
        pcm16_base64: String,
    },
    Stop,
}

/// Messages sent by the server over the bidirectional stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Ready,
    PartialTranscript {
        text: String,
    },
    CommittedTranscript {
        text: String,
        segment_id: u64,
    },
    TranslationCommitted {
        text: String,
        source: String,
        segment_id: u64,
    },
    TtsAudioChunk {
        audio_b64: String,
        segment_id: u64,
        sample_rate: u32,
        is_last: bool,
    },
    TtsEnd {
        segment_id: u64,
    },
    Stats {
        asr_ms: f64,
        mt_ms: f64,
        tts_ms: f64,
        e2e_ms: f64,
        commits_total: u64,
        tts_queue: usize,
    },
    Error {
        message: String,
    },
}

/// Internal event record produced by the orchestrator. Kept distinct from
/// `ServerMessage` so the orchestrator never depends on the wire encoding —
/// the session layer is the only place that converts one into the other
/// (e.g. base64-encoding TTS payloads before they go out over the wire).
#[derive(Debug, Clone)]
pub enum OutputEvent {
    PartialTranscript {
        text: String,
    },
    CommittedTranscript {
        text: String,
        segment_id: u64,
    },
    TranslationCommitted {
        text: String,
        source: String,
        segment_id: u64,
    },
    TtsAudioChunk {
        payload: Vec<u8>,
        segment_id: u64,
        is_last: bool,
    },
    TtsEnd {
        segment_id: u64,
    },
    Stats {
        asr_ms: f64,
        mt_ms: f64,
        tts_ms: f64,
        e2e_ms: f64,
        commits_total: u64,
        tts_queue: usize,
    },
    Error {
        message: String,
    },
    Ready,
}
