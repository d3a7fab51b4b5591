use std::collections::HashMap;

/// RMS energy below which a window is treated as silence and ASR is
/// skipped entirely.
pub const MIN_RMS: f32 = 0.008;

/// Known hallucination substrings ASR backends emit on silence/music —
/// subtitle/subscribe boilerplate, watermark domains, music/applause
/// placeholders. Matched case-insensitively.
const HALLUCINATION_PATTERNS: &[&str] = &[
    "subtitle",
    "subscribe",
    "suscríbete",
    "suscribete",
    "suscríbanse",
    "suscribanse",
    "gracias por ver",
    "thank you for watching",
    "music",
    "applause",
    "música",
    "musica",
    "aplausos",
    "amara.org",
    "moroccoenglish",
    "madriman",
    "www.",
];

pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    ((sum_sq / samples.len() as f64).sqrt()) as f32
}

pub fn is_silent(samples: &[f32]) -> bool {
    rms(samples) < MIN_RMS
}

fn matches_hallucination_pattern(text: &str) -> bool {
    let lower = text.to_lowercase();
    HALLUCINATION_PATTERNS.iter().any(|p| lower.contains(p))
}

/// Reject hypotheses of >=4 words that are mostly one or two repeated
/// tokens — a common ASR failure mode on silence/noise.
fn is_repetitive(text: &str, threshold: f32) -> bool {
    let words: Vec<String> = text.split_whitespace().map(str::to_lowercase).collect();
    if words.len() < 4 {
        return false;
    }
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for w in &words {
        *counts.entry(w.as_str()).or_insert(0) += 1;
    }
    if counts.len() <= 2 && words.len() >= 6 {
        return true;
    }
    let most_common = counts.values().copied().max().unwrap_or(0);
    (most_common as f32 / words.len() as f32) > threshold
}

/// Strip an optional `"lang <X>:"` prefix some ASR backends emit, then run
/// the pattern and repetition gates. Returns the empty string if any gate
/// rejects the hypothesis.
pub fn filter_hypothesis(raw: &str) -> String {
    let text = strip_lang_prefix(raw.trim());

    if text.is_empty() {
        return String::new();
    }
    if matches_hallucination_pattern(&text) {
        return String::new();
    }
    if is_repetitive(&text, 0.5) {
        return String::new();
    }
    text
}

fn strip_lang_prefix(text: &str) -> String {
    if let Some(rest) = text.strip_prefix("lang ") {
        if let Some(colon) = rest.find(':') {
            return rest[colon + 1..].trim().to_string();
        }
    }
    text.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_is_gated_by_rms() {
        let silence = vec![0.0_f32; 1000];
        assert!(is_silent(&silence));
        let loud: Vec<f32> = (0..1000).map(|i| ((i % 2) as f32) - 0.5).collect();
        assert!(!is_silent(&loud));
    }

    #[test]
    fn pattern_gate_rejects_boilerplate() {
        assert_eq!(filter_hypothesis("please subscribe to my channel"), "");
        assert_eq!(filter_hypothesis("Gracias por ver el video"), "");
        assert_eq!(filter_hypothesis("visit www.example.com"), "");
    }

    #[test]
    fn pattern_gate_passes_clean_text() {
        assert_eq!(filter_hypothesis("hola como estás"), "hola como estás");
    }

    #[test]
    fn repetition_gate_rejects_degenerate_output() {
        assert_eq!(filter_hypothesis("the the the the the the"), "");
        assert_eq!(filter_hypothesis("no no no no yes yes"), "");
    }

    #[test]
    fn repetition_gate_allows_short_phrases() {
        // fewer than 4 words never triggers the repetition gate.
        assert_eq!(filter_hypothesis("no no no"), "no no no");
    }

    #[test]
    fn repetition_gate_is_case_insensitive() {
        assert_eq!(filter_hypothesis("No No no NO Yes yes"), "");
    }

    #[test]
    fn strips_lang_prefix_before_filtering() {
        assert_eq!(filter_hypothesis("lang es: hola mundo"), "hola mundo");
    }
}
