//! Per-connection session state machine.
//!
//! `AWAITING_CONFIG → RUNNING → CONFIG_CHANGE → RUNNING → CLOSED`: the
//! first message must be `config`; a later `config` message tears down and
//! restarts the pipeline in place rather than requiring a new connection.

use std::sync::Arc;

use anyhow::{Context, Result};
use base64::Engine;
use futures_util::{SinkExt, StreamExt};
use shared_protocol::{ClientMessage, OutputEvent, ServerMessage};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{info, warn};

use crate::config::is_supported_pair;
use crate::orchestrator::{Orchestrator, OrchestratorHandle};
use crate::AppState;

macro_rules! bail_ws {
    ($ws_sender:expr, $($arg:tt)*) => {{
        let msg = format!($($arg)*);
        let m = ServerMessage::Error { message: msg.clone() };
        if let Ok(json) = serde_json::to_string(&m) {
            let _ = $ws_sender.send(Message::Text(json)).await;
        }
        let _ = $ws_sender.send(Message::Close(None)).await;
        return Err(anyhow::anyhow!(msg));
    }};
}

pub async fn handle_connection(stream: TcpStream, state: Arc<AppState>) -> Result<()> {
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    // AWAITING_CONFIG
    let (mut source_lang, mut target_lang) = match ws_receiver.next().await {
        Some(Ok(Message::Text(text))) => match serde_json::from_str::<ClientMessage>(&text) {
            Ok(ClientMessage::Config {
                source_lang,
                target_lang,
            }) => (source_lang, target_lang),
            Ok(_) => bail_ws!(ws_sender, "first message must be config"),
            Err(e) => bail_ws!(ws_sender, "failed to parse config: {}", e),
        },
        Some(Ok(_)) => bail_ws!(ws_sender, "first message must be config"),
        Some(Err(e)) => bail_ws!(ws_sender, "pre-config error: {}", e),
        None => bail_ws!(ws_sender, "connection closed before config"),
    };

    if !is_supported_pair(&source_lang, &target_lang) {
        warn!(
            source = %source_lang,
            target = %target_lang,
            "unsupported language pair, translation will pass through unchanged"
        );
    }

    // RUNNING
    let (mut out_tx, mut out_rx) = mpsc::unbounded_channel();
    let mut handle = spawn_pipeline(&state, &source_lang, &target_lang, out_tx.clone())
        .context("failed to start pipeline")?;

    ws_sender
        .send(Message::Text(serde_json::to_string(&ServerMessage::Ready)?))
        .await?;
    info!(source = %source_lang, target = %target_lang, "session ready");

    loop {
        tokio::select! {
            msg = ws_receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(ClientMessage::Audio { pcm16_base64, .. }) => {
                                match base64::engine::general_purpose::STANDARD.decode(&pcm16_base64) {
                                    Ok(bytes) => handle.audio().append_pcm16(&bytes),
                                    Err(e) => warn!(error = %e, "invalid base64 audio payload"),
                                }
                            }
                            Ok(ClientMessage::Stop) => {
                                info!("client sent stop");
                                break;
                            }
                            Ok(ClientMessage::Config { source_lang: new_src, target_lang: new_tgt }) => {
                                // CONFIG_CHANGE: tear down and rebuild in place.
                                info!(source = %new_src, target = %new_tgt, "runtime reconfigure");
                                handle.stop().await;
                                source_lang = new_src;
                                target_lang = new_tgt;
                                let (new_tx, new_rx) = mpsc::unbounded_channel();
                                out_tx = new_tx.clone();
                                out_rx = new_rx;
                                handle = spawn_pipeline(&state, &source_lang, &target_lang, new_tx)
                                    .context("failed to restart pipeline")?;
                            }
                            Err(e) => {
                                warn!(error = %e, "malformed message, dropping");
                                send_error(&mut ws_sender, format!("cannot parse message: {e}")).await?;
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        ws_sender.send(Message::Pong(data)).await?;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("client disconnected");
                        break;
                    }
                    Some(Ok(_)) => {} // binary/pong/frame: protocol is JSON text + base64 only
                    Some(Err(e)) => bail_ws!(ws_sender, "websocket error: {}", e),
                }
            }
            event = out_rx.recv() => {
                if let Some(ev) = event {
                    send_event(&mut ws_sender, ev, state.config.tts_sample_rate).await?;
                }
            }
        }
    }

    handle.stop().await;
    drop(out_tx);
    while let Ok(ev) = out_rx.try_recv() {
        let _ = send_event(&mut ws_sender, ev, state.config.tts_sample_rate).await;
    }

    let _ = ws_sender.send(Message::Close(None)).await;
    info!("session ended");
    Ok(())
}

fn spawn_pipeline(
    state: &Arc<AppState>,
    source_lang: &str,
    target_lang: &str,
    out_tx: mpsc::UnboundedSender<OutputEvent>,
) -> Result<OrchestratorHandle> {
    let asr = adapters::WhisperAsr::new(state.whisper_model.clone())
        .context("failed to create whisper state for session")?;
    let orchestrator = Orchestrator::new(
        Box::new(asr),
        state.mt.clone(),
        state.tts.clone(),
        source_lang.to_string(),
        target_lang.to_string(),
        &state.config,
        out_tx,
    );
    Ok(orchestrator.spawn())
}

type WsSender = futures_util::stream::SplitSink<
    tokio_tungstenite::WebSocketStream<TcpStream>,
    Message,
>;

/// Emit an `Error` event without closing the connection — protocol
/// violations mid-session (malformed JSON, decode failures) are reported
/// and dropped, not fatal.
async fn send_error(ws_sender: &mut WsSender, message: String) -> Result<()> {
    let msg = ServerMessage::Error { message };
    let json = serde_json::to_string(&msg)?;
    ws_sender.send(Message::Text(json)).await?;
    Ok(())
}

async fn send_event(ws_sender: &mut WsSender, event: OutputEvent, tts_sample_rate: u32) -> Result<()> {
    let msg = match event {
        OutputEvent::Ready => ServerMessage::Ready,
        OutputEvent::PartialTranscript { text } => ServerMessage::PartialTranscript { text },
        OutputEvent::CommittedTranscript { text, segment_id } => {
            ServerMessage::CommittedTranscript { text, segment_id }
        }
        OutputEvent::TranslationCommitted {
            text,
            source,
            segment_id,
        } => ServerMessage::TranslationCommitted {
            text,
            source,
            segment_id,
        },
        OutputEvent::TtsAudioChunk {
            payload,
            segment_id,
            is_last,
        } => ServerMessage::TtsAudioChunk {
            audio_b64: base64::engine::general_purpose::STANDARD.encode(payload),
            segment_id,
            sample_rate: tts_sample_rate,
            is_last,
        },
        OutputEvent::TtsEnd { segment_id } => ServerMessage::TtsEnd { segment_id },
        OutputEvent::Stats {
            asr_ms,
            mt_ms,
            tts_ms,
            e2e_ms,
            commits_total,
            tts_queue,
        } => ServerMessage::Stats {
            asr_ms,
            mt_ms,
            tts_ms,
            e2e_ms,
            commits_total,
            tts_queue,
        },
        OutputEvent::Error { message } => ServerMessage::Error { message },
    };

    let json = serde_json::to_string(&msg)?;
    ws_sender.send(Message::Text(json)).await?;
    Ok(())
}
