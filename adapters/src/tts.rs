use std::f32::consts::PI;

use crate::TtsAdapter;

/// Tone frequency for the placeholder waveform (440Hz, amplitude 0.3).
const TONE_HZ: f32 = 440.0;
const AMPLITUDE: f32 = 0.3;

/// Rough words-per-second used to size the placeholder tone so longer
/// committed text yields proportionally longer audio.
const WORDS_PER_SEC: f32 = 2.5;

/// `TtsAdapter` that streams a placeholder sine-wave tone in fixed-duration
/// PCM16 chunks, standing in for a real neural TTS backend (out of scope).
pub struct ToneTts {
    output_sample_rate: u32,
    chunk_samples: usize,
}

impl ToneTts {
    pub fn new(output_sample_rate: u32, chunk_duration_ms: u32) -> Self {
        let chunk_samples = (output_sample_rate as u64 * chunk_duration_ms as u64 / 1000) as usize;
        Self {
            output_sample_rate,
            chunk_samples,
        }
    }
}

impl Default for ToneTts {
    fn default() -> Self {
        Self::new(24_000, 200)
    }
}

impl TtsAdapter for ToneTts {
    fn synthesize_streaming(&self, text: &str, _lang: &str) -> Vec<Vec<u8>> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let n_words = text.split_whitespace().count().max(1) as f32;
        let duration_sec = n_words / WORDS_PER_SEC;
        let total_samples = (duration_sec * self.output_sample_rate as f32) as usize;

        let pcm: Vec<i16> = (0..total_samples)
            .map(|i| {
                let t = i as f32 / self.output_sample_rate as f32;
                let sample = (2.0 * PI * TONE_HZ * t).sin() * AMPLITUDE;
                (sample * i16::MAX as f32) as i16
            })
            .collect();

        pcm.chunks(self.chunk_samples.max(1))
            .map(|chunk| chunk.iter().flat_map(|s| s.to_le_bytes()).collect())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_yields_no_chunks() {
        let tts = ToneTts::default();
        assert!(tts.synthesize_streaming("   ", "en").is_empty());
    }

    #[test]
    fn chunks_are_sized_in_pcm16_frames() {
        let tts = ToneTts::new(24_000, 200);
        let chunks = tts.synthesize_streaming("hello world", "en");
        assert!(!chunks.is_empty());
        // every full chunk is chunk_samples * 2 bytes (i16 little-endian),
        // except possibly the last one which may be shorter.
        for chunk in &chunks[..chunks.len() - 1] {
            assert_eq!(chunk.len(), 4_800 * 2);
        }
    }

    #[test]
    fn longer_text_yields_more_audio() {
        let tts = ToneTts::default();
        let short = tts.synthesize_streaming("hola", "es");
        let long = tts.synthesize_streaming("hola como estas hoy mi amigo", "es");
        assert!(long.len() > short.len());
    }
}
