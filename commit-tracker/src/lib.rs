//! Commit-by-stability algorithm.
//!
//! Instead of relying on voice-activity detection to find speech
//! boundaries, this compares consecutive ASR hypotheses word-by-word. When
//! a word-level prefix stays identical for `stability_k` consecutive ASR
//! runs (or a timeout elapses), that prefix is committed — sent downstream
//! exactly once.
//!
//! Purely functional over `(state, hypothesis) -> (state, events)`: no I/O,
//! no async, no locks. The orchestrator owns one `CommitTracker` per
//! session and calls `update` once per ASR tick.

use std::time::Instant;

const PUNCTUATION: &[char] = &[
    '.', ',', ';', ':', '!', '?', '-', '–', '—', '¿', '¡', '"', '\'', '…', '(', ')', '[', ']',
    '{', '}',
];

/// Lowercase + strip a fixed punctuation set. Used only for comparisons —
/// committed text always preserves the original casing/punctuation.
fn normalize(word: &str) -> String {
    word.chars()
        .filter(|c| !PUNCTUATION.contains(c))
        .collect::<String>()
        .to_lowercase()
}

/// How many words of committed suffix the prefix-stripping search will
/// consider. Bounds cost while covering the longest realistic ASR window
/// at fast speech.
const MAX_LOOKBACK_WORDS: usize = 40;

#[derive(Debug, Clone, PartialEq)]
pub struct CommitEvent {
    pub text: String,
    pub segment_id: u64,
    /// Seconds since the tracker was constructed (monotonic).
    pub timestamp: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct CommitTrackerConfig {
    /// Number of consecutive identical hypotheses a word must hold its
    /// position for before it becomes eligible to commit.
    pub stability_k: u32,
    /// Force-commit everything accumulated so far after this many seconds
    /// with no stability commit.
    pub timeout_sec: f64,
    /// Minimum number of effective words before any commit (stability or
    /// timeout) is allowed to fire.
    pub min_words: usize,
}

impl Default for CommitTrackerConfig {
    fn default() -> Self {
        Self {
            stability_k: 3,
            timeout_sec: 2.0,
            min_words: 1,
        }
    }
}

pub struct CommitTracker {
    config: CommitTrackerConfig,
    committed_words: Vec<String>,
    previous_effective: Vec<String>,
    stability_counts: Vec<u32>,
    segment_id: u64,
    created_at: Instant,
    last_commit_time: Instant,
}

impl CommitTracker {
    pub fn new(config: CommitTrackerConfig) -> Self {
        let now = Instant::now();
        Self {
            config,
            committed_words: Vec::new(),
            previous_effective: Vec::new(),
            stability_counts: Vec::new(),
            segment_id: 0,
            created_at: now,
            last_commit_time: now,
        }
    }

    fn elapsed_secs(&self) -> f64 {
        self.created_at.elapsed().as_secs_f64()
    }

    /// Feed a new ASR hypothesis (whitespace-tokenized). Returns zero or
    /// more newly committed segments.
    pub fn update(&mut self, hypothesis: &str) -> Vec<CommitEvent> {
        let now = Instant::now();
        let words: Vec<String> = hypothesis.split_whitespace().map(str::to_string).collect();

        let effective = self.strip_committed_prefix(&words);
        self.update_stability(&effective);
        self.previous_effective = effective.clone();

        let stable_len = self.longest_stable_prefix();
        let time_since_commit = now.duration_since(self.last_commit_time).as_secs_f64();

        let commit_len = if stable_len >= self.config.min_words {
            Some(stable_len)
        } else if time_since_commit >= self.config.timeout_sec
            && effective.len() >= self.config.min_words
        {
            Some(effective.len())
        } else {
            None
        };

        let Some(commit_len) = commit_len.filter(|&n| n > 0) else {
            return Vec::new();
        };

        let words_to_commit = &effective[..commit_len];
        let committed_text = words_to_commit.join(" ");
        self.segment_id += 1;
        let event = CommitEvent {
            text: committed_text,
            segment_id: self.segment_id,
            timestamp: self.elapsed_secs(),
        };

        self.committed_words.extend_from_slice(words_to_commit);
        self.last_commit_time = now;

        self.previous_effective = effective[commit_len..].to_vec();
        self.stability_counts = vec![0; self.previous_effective.len()];

        vec![event]
    }

    /// Flush any remaining unstable text as a single commit (session
    /// termination path).
    pub fn force_commit(&mut self) -> Vec<CommitEvent> {
        if self.previous_effective.is_empty() {
            return Vec::new();
        }
        let text = self.previous_effective.join(" ");
        if text.trim().is_empty() {
            return Vec::new();
        }
        self.segment_id += 1;
        let event = CommitEvent {
            text,
            segment_id: self.segment_id,
            timestamp: self.elapsed_secs(),
        };
        self.committed_words
            .extend_from_slice(&self.previous_effective);
        self.previous_effective.clear();
        self.stability_counts.clear();
        self.last_commit_time = Instant::now();
        vec![event]
    }

    /// Current uncommitted text (after prefix stripping) — the partial
    /// transcript shown to the client. The raw ASR hypothesis is never
    /// exposed directly; it still contains re-transcribed committed text.
    pub fn effective_uncommitted_text(&self) -> String {
        self.previous_effective.join(" ")
    }

    /// Last 5 committed words, space-joined — available as conditioning
    /// context for the ASR adapter. Not currently wired into the adapter
    /// call; exposed for a future caller to use.
    pub fn context_tail(&self) -> String {
        let tail_start = self.committed_words.len().saturating_sub(5);
        self.committed_words[tail_start..].join(" ")
    }

    pub fn all_committed_text(&self) -> String {
        self.committed_words.join(" ")
    }

    pub fn reset(&mut self) {
        self.committed_words.clear();
        self.previous_effective.clear();
        self.stability_counts.clear();
        self.segment_id = 0;
        self.last_commit_time = Instant::now();
    }

    /// Remove the already-committed prefix from a freshly arrived
    /// hypothesis. The ASR sliding window overlaps
    /// previously committed audio, so each hypothesis re-emits a
    /// variable-length tail of prior commits; the longest prefix match
    /// against the committed suffix strips exactly that re-emission
    /// without needing exact segment alignment.
    fn strip_committed_prefix(&self, words: &[String]) -> Vec<String> {
        if self.committed_words.is_empty() || words.is_empty() {
            return words.to_vec();
        }

        let lookback = self.committed_words.len().min(MAX_LOOKBACK_WORDS);
        let search_committed: Vec<String> = self.committed_words
            [self.committed_words.len() - lookback..]
            .iter()
            .map(|w| normalize(w))
            .collect();
        let words_norm: Vec<String> = words.iter().map(|w| normalize(w)).collect();

        let mut best_strip = 0usize;
        for start in 0..search_committed.len() {
            let suffix = &search_committed[start..];
            let mut match_len = 0usize;
            for j in 0..suffix.len().min(words_norm.len()) {
                if suffix[j] == words_norm[j] {
                    match_len = j + 1;
                } else {
                    break;
                }
            }
            best_strip = best_strip.max(match_len);
        }

        if best_strip == words_norm.len() {
            // Entire hypothesis is already committed text.
            return Vec::new();
        }

        words[best_strip..].to_vec()
    }

    fn update_stability(&mut self, new_words: &[String]) {
        let mut new_counts = Vec::with_capacity(new_words.len());
        for (i, w) in new_words.iter().enumerate() {
            let stable = i < self.previous_effective.len()
                && normalize(w) == normalize(&self.previous_effective[i]);
            if stable {
                let prev_count = self.stability_counts.get(i).copied().unwrap_or(0);
                new_counts.push(prev_count + 1);
            } else {
                new_counts.push(1);
            }
        }
        self.stability_counts = new_counts;
    }

    fn longest_stable_prefix(&self) -> usize {
        let mut length = 0;
        for &count in &self.stability_counts {
            if count >= self.config.stability_k {
                length += 1;
            } else {
                break;
            }
        }
        length
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    fn tracker(stability_k: u32, timeout_sec: f64, min_words: usize) -> CommitTracker {
        CommitTracker::new(CommitTrackerConfig {
            stability_k,
            timeout_sec,
            min_words,
        })
    }

    #[test]
    fn no_commit_until_k_stable() {
        let mut t = tracker(3, 100.0, 2);
        assert!(t.update("hello").is_empty());
        assert!(t.update("hello world").is_empty());
    }

    #[test]
    fn commit_on_stable_prefix() {
        let mut t = tracker(3, 100.0, 2);
        t.update("hello world");
        t.update("hello world");
        let events = t.update("hello world");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].text, "hello world");
        assert_eq!(events[0].segment_id, 1);
    }

    #[test]
    fn incremental_growth_commits_only_new_part() {
        let mut t = tracker(3, 100.0, 2);
        t.update("hello world");
        t.update("hello world");
        let e1 = t.update("hello world");
        assert_eq!(e1[0].text, "hello world");
        assert_eq!(e1[0].segment_id, 1);

        t.update("hello world how are you");
        t.update("hello world how are you");
        let e2 = t.update("hello world how are you");
        assert_eq!(e2.len(), 1);
        assert_eq!(e2[0].text, "how are you");
        assert_eq!(e2[0].segment_id, 2);
    }

    #[test]
    fn reemission_stripping_removes_committed_overlap() {
        let mut t = tracker(2, 100.0, 2);
        t.update("hola como estás");
        let e1 = t.update("hola como estás");
        assert_eq!(e1[0].text, "hola como estás");

        t.update("hola como estás es interesante");
        let e2 = t.update("hola como estás es interesante");
        assert_eq!(e2.len(), 1);
        assert_eq!(e2[0].text, "es interesante");
    }

    #[test]
    fn fully_subsumed_hypothesis_emits_nothing() {
        let mut t = tracker(2, 100.0, 2);
        t.update("hola mundo");
        t.update("hola mundo");

        let events = t.update("hola mundo");
        assert!(events.is_empty());
        assert_eq!(t.effective_uncommitted_text(), "");
    }

    #[test]
    fn timeout_commit_fires_after_elapsed_time() {
        let mut t = tracker(5, 0.05, 2);
        t.update("hello world");
        t.update("hello world again");
        sleep(Duration::from_millis(100));
        let events = t.update("hello world again more");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].segment_id, 1);
    }

    #[test]
    fn force_commit_flushes_unstable_text() {
        let mut t = tracker(10, 100.0, 2);
        t.update("some unstable text");
        let events = t.force_commit();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].text, "some unstable text");
    }

    #[test]
    fn force_commit_on_empty_state_is_noop() {
        let mut t = tracker(3, 100.0, 1);
        assert!(t.force_commit().is_empty());
    }

    #[test]
    fn punctuation_variation_still_matches_for_stripping() {
        let mut t = tracker(2, 100.0, 2);
        t.update("hola, como...");
        t.update("hola, como...");

        t.update("hola como estás bien");
        let events = t.update("hola como estás bien");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].text, "estás bien");
    }

    #[test]
    fn partial_overlap_mid_committed_text_strips_correctly() {
        let mut t = tracker(2, 100.0, 2);
        t.update("uno dos tres cuatro cinco");
        t.update("uno dos tres cuatro cinco");

        // ASR window only covers the tail now — starts mid-committed text.
        t.update("tres cuatro cinco seis siete");
        let events = t.update("tres cuatro cinco seis siete");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].text, "seis siete");
    }

    #[test]
    fn segment_ids_strictly_increase() {
        let mut t = tracker(1, 100.0, 1);
        let mut last_id = 0;
        for phrase in ["one", "one two", "one two three"] {
            for ev in t.update(phrase) {
                assert!(ev.segment_id > last_id);
                last_id = ev.segment_id;
            }
        }
    }

    #[test]
    fn context_tail_returns_last_five_committed_words() {
        let mut t = tracker(1, 100.0, 1);
        t.update("one two three four five six seven");
        assert_eq!(t.context_tail(), "three four five six seven");
    }

    #[test]
    fn reset_clears_all_state() {
        let mut t = tracker(3, 1.0, 2);
        t.update("hello world");
        t.update("hello world");
        t.update("hello world");
        t.reset();
        assert_eq!(t.all_committed_text(), "");
        assert_eq!(t.effective_uncommitted_text(), "");
    }

    #[test]
    fn no_duplication_across_replayed_hypotheses() {
        // Replay a realistic growing-window sequence and assert no
        // committed word index is ever emitted twice.
        let mut t = tracker(2, 100.0, 1);
        let hypotheses = [
            "the quick",
            "the quick",
            "the quick brown fox",
            "the quick brown fox",
            "the quick brown fox jumps over",
            "the quick brown fox jumps over",
        ];
        let mut all_committed_words: Vec<String> = Vec::new();
        for h in hypotheses {
            for ev in t.update(h) {
                for w in ev.text.split_whitespace() {
                    all_committed_words.push(w.to_lowercase());
                }
            }
        }
        let mut seen = std::collections::HashSet::new();
        for (i, w) in all_committed_words.iter().enumerate() {
            let key = (i, w.clone());
            assert!(seen.insert(key), "word emitted twice: {w}");
        }
        // sanity: every word in the final sentence was committed exactly once
        assert_eq!(
            all_committed_words,
            vec!["the", "quick", "brown", "fox", "jumps", "over"]
        );
    }
}
