//! Pipeline Orchestrator — connects ASR → CommitTracker → MT → TTS.
//!
//! Runs the ASR loop at a fixed interval, feeds hypotheses to the commit
//! tracker, and dispatches committed text to MT then TTS in sequence. All
//! output is emitted as [`OutputEvent`]s on an unbounded channel the
//! session's sender loop drains and encodes onto the wire.

use std::sync::Arc;
use std::time::{Duration, Instant};

use adapters::{AsrAdapter, MtAdapter, TtsAdapter};
use backpressure::BackpressureController;
use commit_tracker::{CommitEvent, CommitTracker, CommitTrackerConfig};
use shared_audio::AudioBuffer;
use shared_protocol::OutputEvent;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::PipelineConfig;

/// Secondary silence gate checked before even calling ASR, to save CPU —
/// the ASR adapter has its own (stricter) energy gate too. Matches the
/// original orchestrator's `_SILENCE_RMS_THRESHOLD`.
const SILENCE_RMS_THRESHOLD: f32 = 0.005;

#[derive(Debug, Default, Clone, Copy)]
struct PipelineStats {
    asr_ms: f64,
    mt_ms: f64,
    tts_ms: f64,
    e2e_ms: f64,
    commits_total: u64,
}

/// Owns the full pipeline for one session. Constructed fresh whenever the
/// client sends a `config` message (initial or runtime reconfigure), since
/// the commit tracker, audio buffer, and backpressure state are all
/// per-language-pair.
pub struct Orchestrator {
    audio: Arc<AudioBuffer>,
    commit_tracker: CommitTracker,
    bp: BackpressureController,
    asr: Box<dyn AsrAdapter>,
    mt: Arc<dyn MtAdapter>,
    tts: Arc<dyn TtsAdapter>,
    source_lang: String,
    target_lang: String,
    window_sec: f64,
    asr_interval: Duration,
    out: mpsc::UnboundedSender<OutputEvent>,
    stats: PipelineStats,
}

/// Handle to a running orchestrator task. Feed audio through `audio()`;
/// call `stop()` to cancel the ASR loop, force-commit remaining text, and
/// await the task's exit.
pub struct OrchestratorHandle {
    join: JoinHandle<()>,
    audio: Arc<AudioBuffer>,
    stop_tx: Option<oneshot::Sender<()>>,
}

impl OrchestratorHandle {
    pub fn audio(&self) -> &Arc<AudioBuffer> {
        &self.audio
    }

    pub async fn stop(mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Err(e) = self.join.await {
            error!(error = %e, "orchestrator task panicked during shutdown");
        }
    }
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        asr: Box<dyn AsrAdapter>,
        mt: Arc<dyn MtAdapter>,
        tts: Arc<dyn TtsAdapter>,
        source_lang: String,
        target_lang: String,
        config: &PipelineConfig,
        out: mpsc::UnboundedSender<OutputEvent>,
    ) -> Self {
        let audio = Arc::new(AudioBuffer::new(
            (config.window_sec * 2.0).max(10.0),
            config.capture_sample_rate,
        ));
        let commit_tracker = CommitTracker::new(CommitTrackerConfig {
            stability_k: config.commit_stability_k,
            timeout_sec: config.commit_timeout_sec,
            min_words: config.commit_min_words,
        });
        let bp = BackpressureController::new(config.tts_queue_max);

        info!(
            source = %source_lang,
            target = %target_lang,
            interval_ms = config.asr_interval_ms,
            window_sec = config.window_sec,
            "pipeline started"
        );

        Self {
            audio,
            commit_tracker,
            bp,
            asr,
            mt,
            tts,
            source_lang,
            target_lang,
            window_sec: config.window_sec,
            asr_interval: Duration::from_millis(config.asr_interval_ms),
            out,
            stats: PipelineStats::default(),
        }
    }

    /// Spawn the periodic ASR-tick loop as its own task and return a handle
    /// for feeding audio and stopping it.
    pub fn spawn(mut self) -> OrchestratorHandle {
        let audio = self.audio.clone();
        let (stop_tx, stop_rx) = oneshot::channel();
        let join = tokio::spawn(async move {
            self.run(stop_rx).await;
        });
        OrchestratorHandle {
            join,
            audio,
            stop_tx: Some(stop_tx),
        }
    }

    async fn run(&mut self, mut stop_rx: oneshot::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.asr_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                _ = &mut stop_rx => {
                    break;
                }
            }
        }
        self.force_commit().await;
        info!("pipeline stopped");
    }

    async fn tick(&mut self) {
        let Some(window) = self.audio.last(self.window_sec) else {
            return;
        };
        if window.len() < (shared_protocol::SAMPLE_RATE as f64 * 0.5) as usize {
            return;
        }
        if shared_audio::rms(&window) < SILENCE_RMS_THRESHOLD {
            return;
        }

        let hint = self.source_lang.clone();
        // Move the boxed adapter into the blocking task and get it back —
        // `AsrAdapter::transcribe` takes `&mut self` and whisper-rs
        // inference is synchronous, so it must run off the event loop.
        let asr = std::mem::replace(&mut self.asr, Box::new(NullAsr));
        let t0 = Instant::now();
        let (asr, hypothesis) = match tokio::task::spawn_blocking(move || {
            let mut asr = asr;
            let text = asr.transcribe(&window, Some(hint.as_str()));
            (asr, text)
        })
        .await
        {
            Ok(pair) => pair,
            Err(e) => {
                error!(error = %e, "ASR task panicked");
                return;
            }
        };
        self.asr = asr;
        self.stats.asr_ms = t0.elapsed().as_secs_f64() * 1000.0;

        if hypothesis.is_empty() {
            return;
        }

        let commit_events = self.commit_tracker.update(&hypothesis);

        let uncommitted = self.commit_tracker.effective_uncommitted_text();
        if !uncommitted.is_empty() {
            self.emit(OutputEvent::PartialTranscript { text: uncommitted });
        }

        for ev in commit_events {
            self.process_commit(ev).await;
        }
    }

    async fn process_commit(&mut self, ev: CommitEvent) {
        let e2e_start = Instant::now();

        self.emit(OutputEvent::CommittedTranscript {
            text: ev.text.clone(),
            segment_id: ev.segment_id,
        });
        self.stats.commits_total += 1;

        if self.bp.should_skip_tts() {
            warn!(segment_id = ev.segment_id, "skipping TTS (backpressure)");
            return;
        }

        if self.bp.should_batch() {
            self.bp.add_to_batch(&ev.text);
            return;
        }

        let mut text_to_process = ev.text.clone();
        if let Some(batched) = self.bp.flush_batch() {
            text_to_process = format!("{batched} {text_to_process}");
        }

        let t0 = Instant::now();
        let translation = {
            let mt = self.mt.clone();
            let text = text_to_process.clone();
            let src = self.source_lang.clone();
            let tgt = self.target_lang.clone();
            match tokio::task::spawn_blocking(move || mt.translate(&text, &src, &tgt)).await {
                Ok(t) => t,
                Err(e) => {
                    error!(error = %e, "MT task panicked");
                    String::new()
                }
            }
        };
        self.stats.mt_ms = t0.elapsed().as_secs_f64() * 1000.0;

        self.emit(OutputEvent::TranslationCommitted {
            text: translation.clone(),
            source: text_to_process,
            segment_id: ev.segment_id,
        });

        self.bp.on_tts_queued();
        let t0 = Instant::now();
        let chunks = {
            let tts = self.tts.clone();
            let lang = self.target_lang.clone();
            match tokio::task::spawn_blocking(move || tts.synthesize_streaming(&translation, &lang)).await {
                Ok(c) => c,
                Err(e) => {
                    error!(error = %e, "TTS task panicked");
                    Vec::new()
                }
            }
        };

        for chunk in &chunks {
            self.emit(OutputEvent::TtsAudioChunk {
                payload: chunk.clone(),
                segment_id: ev.segment_id,
                is_last: false,
            });
        }
        if !chunks.is_empty() {
            self.emit(OutputEvent::TtsEnd {
                segment_id: ev.segment_id,
            });
        }
        self.stats.tts_ms = t0.elapsed().as_secs_f64() * 1000.0;
        self.bp.on_tts_completed();

        self.stats.e2e_ms = e2e_start.elapsed().as_secs_f64() * 1000.0;
        self.emit(OutputEvent::Stats {
            asr_ms: self.stats.asr_ms,
            mt_ms: self.stats.mt_ms,
            tts_ms: self.stats.tts_ms,
            e2e_ms: self.stats.e2e_ms,
            commits_total: self.stats.commits_total,
            tts_queue: self.bp.pending_count() as usize,
        });
    }

    /// Flush remaining unstable text as a final commit — session
    /// termination path.
    async fn force_commit(&mut self) {
        let events = self.commit_tracker.force_commit();
        for ev in events {
            self.process_commit(ev).await;
        }
    }

    fn emit(&self, event: OutputEvent) {
        let _ = self.out.send(event);
    }
}

/// Placeholder dropped into `Orchestrator::asr` for the instant between
/// moving the real adapter into a blocking task and getting it back; never
/// actually invoked.
struct NullAsr;

impl AsrAdapter for NullAsr {
    fn transcribe(&mut self, _samples: &[f32], _language_hint: Option<&str>) -> String {
        String::new()
    }
}
