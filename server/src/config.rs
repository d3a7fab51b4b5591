//! Process-level CLI flags plus environment-driven pipeline tunables.
//!
//! Things that only make sense once per process (listen address, model path)
//! are CLI flags; things a deployment might want to override without a
//! rebuild (window sizes, thresholds) are environment variables with
//! sensible production defaults.

use std::str::FromStr;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "translate-stream")]
pub struct Args {
    #[arg(short, long, default_value = "0.0.0.0", help = "address to listen on")]
    pub address: String,

    #[arg(short, long, default_value_t = 8000, help = "port to listen on")]
    pub port: u16,

    #[arg(short, long, help = "path to whisper GGML model file")]
    pub model: String,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Per-session pipeline tunables, loaded once at startup and shared by
/// every session (runtime `config` messages only change language pair, not
/// these).
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub window_sec: f64,
    pub asr_interval_ms: u64,
    pub commit_stability_k: u32,
    pub commit_timeout_sec: f64,
    pub commit_min_words: usize,
    pub tts_queue_max: u32,
    pub capture_sample_rate: u32,
    pub tts_sample_rate: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window_sec: env_or("WINDOW_SEC", 8.0),
            asr_interval_ms: env_or("ASR_INTERVAL_MS", 500),
            commit_stability_k: env_or("COMMIT_STABILITY_K", 3),
            commit_timeout_sec: env_or("COMMIT_TIMEOUT_SEC", 2.0),
            commit_min_words: env_or("COMMIT_MIN_WORDS", 1),
            tts_queue_max: env_or("TTS_QUEUE_MAX", 5),
            capture_sample_rate: env_or("CAPTURE_SAMPLE_RATE", 16_000),
            tts_sample_rate: env_or("TTS_SAMPLE_RATE", 24_000),
        }
    }
}

/// Supported MVP language pairs.
pub const SUPPORTED_PAIRS: &[(&str, &str)] = &[("es", "en"), ("en", "es")];

pub fn is_supported_pair(src: &str, tgt: &str) -> bool {
    SUPPORTED_PAIRS.iter().any(|&(s, t)| s == src && t == tgt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_production_defaults() {
        // Only valid when the corresponding env vars are unset in the test
        // process, which is the common case in CI.
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.commit_stability_k, 3);
        assert_eq!(cfg.tts_queue_max, 5);
    }

    #[test]
    fn recognizes_mvp_pairs_only() {
        assert!(is_supported_pair("es", "en"));
        assert!(is_supported_pair("en", "es"));
        assert!(!is_supported_pair("fr", "de"));
    }
}
