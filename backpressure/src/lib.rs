//! Adaptive backpressure for the TTS pipeline.
//!
//! Monitors the number of outstanding TTS jobs. When TTS falls behind:
//!   1. First, batch commits into a shared text buffer instead of
//!      synthesizing each one immediately.
//!   2. If still behind, skip TTS entirely for incoming commits (text
//!      events are still emitted).
//!   3. Never drop committed text — only audio is degraded.

use tracing::warn;

pub struct BackpressureController {
    queue_max: u32,
    pending_tts: u32,
    batch_mode: bool,
    skip_tts: bool,
    batch_buffer: Vec<String>,
}

impl BackpressureController {
    pub fn new(queue_max: u32) -> Self {
        Self {
            queue_max,
            pending_tts: 0,
            batch_mode: false,
            skip_tts: false,
            batch_buffer: Vec::new(),
        }
    }

    pub fn on_tts_queued(&mut self) {
        self.pending_tts += 1;
        self.evaluate();
    }

    pub fn on_tts_completed(&mut self) {
        self.pending_tts = self.pending_tts.saturating_sub(1);
        self.evaluate();
    }

    fn evaluate(&mut self) {
        if self.pending_tts > self.queue_max * 2 {
            if !self.skip_tts {
                warn!(
                    queue = self.pending_tts,
                    "TTS backpressure: skipping TTS for some commits"
                );
            }
            self.skip_tts = true;
            self.batch_mode = true;
        } else if self.pending_tts > self.queue_max {
            if !self.batch_mode {
                warn!(
                    queue = self.pending_tts,
                    "TTS backpressure: switching to batch mode"
                );
            }
            self.batch_mode = true;
            self.skip_tts = false;
        } else {
            self.batch_mode = false;
            self.skip_tts = false;
        }
    }

    pub fn should_skip_tts(&self) -> bool {
        self.skip_tts
    }

    pub fn should_batch(&self) -> bool {
        self.batch_mode
    }

    pub fn add_to_batch(&mut self, text: &str) {
        self.batch_buffer.push(text.to_string());
    }

    /// Return the accumulated batch text (if any) and clear the buffer.
    pub fn flush_batch(&mut self) -> Option<String> {
        if self.batch_buffer.is_empty() {
            return None;
        }
        let merged = self.batch_buffer.join(" ");
        self.batch_buffer.clear();
        Some(merged)
    }

    pub fn pending_count(&self) -> u32 {
        self.pending_tts
    }

    pub fn reset(&mut self) {
        self.pending_tts = 0;
        self.batch_mode = false;
        self.skip_tts = false;
        self.batch_buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn under_threshold_does_not_degrade() {
        let mut bp = BackpressureController::new(5);
        for _ in 0..5 {
            bp.on_tts_queued();
        }
        assert!(!bp.should_batch());
        assert!(!bp.should_skip_tts());
    }

    #[test]
    fn over_queue_max_enters_batch_mode() {
        let mut bp = BackpressureController::new(5);
        for _ in 0..6 {
            bp.on_tts_queued();
        }
        assert!(bp.should_batch());
        assert!(!bp.should_skip_tts());
    }

    #[test]
    fn over_double_queue_max_enters_skip_mode() {
        let mut bp = BackpressureController::new(5);
        for _ in 0..11 {
            bp.on_tts_queued();
        }
        assert!(bp.should_skip_tts());
    }

    #[test]
    fn clears_when_queue_drains() {
        let mut bp = BackpressureController::new(5);
        for _ in 0..11 {
            bp.on_tts_queued();
        }
        assert!(bp.should_skip_tts());
        for _ in 0..11 {
            bp.on_tts_completed();
        }
        assert!(!bp.should_skip_tts());
        assert!(!bp.should_batch());
        assert_eq!(bp.pending_count(), 0);
    }

    #[test]
    fn batch_buffer_accumulates_and_flushes_joined() {
        let mut bp = BackpressureController::new(5);
        bp.add_to_batch("hello");
        bp.add_to_batch("world");
        assert_eq!(bp.flush_batch(), Some("hello world".to_string()));
        assert_eq!(bp.flush_batch(), None);
    }

    #[test]
    fn completed_never_underflows_below_zero() {
        let mut bp = BackpressureController::new(5);
        bp.on_tts_completed();
        bp.on_tts_completed();
        assert_eq!(bp.pending_count(), 0);
    }

    #[test]
    fn reset_clears_all_state() {
        let mut bp = BackpressureController::new(5);
        for _ in 0..11 {
            bp.on_tts_queued();
        }
        bp.add_to_batch("pending");
        bp.reset();
        assert_eq!(bp.pending_count(), 0);
        assert!(!bp.should_batch());
        assert!(!bp.should_skip_tts());
        assert_eq!(bp.flush_batch(), None);
    }
}
