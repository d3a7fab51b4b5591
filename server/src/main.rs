mod config;
mod orchestrator;
mod session;

use std::net::SocketAddr;
use std::sync::Arc;

use adapters::{MtAdapter, PassthroughMt, ToneTts, TtsAdapter, WhisperAsr, WhisperModel};
use anyhow::Result;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};

use config::{Args, PipelineConfig};

/// Shared, read-only session state: the loaded model and the MT/TTS
/// backends, all cheap to clone (`Arc`) into each connection's pipeline.
pub struct AppState {
    whisper_model: WhisperModel,
    mt: Arc<dyn MtAdapter>,
    tts: Arc<dyn TtsAdapter>,
    config: PipelineConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let addr: SocketAddr = format!("{}:{}", args.address, args.port).parse()?;
    let config = PipelineConfig::default();

    info!(model = %args.model, "loading whisper model");
    let whisper_model = WhisperAsr::load_context(&args.model)?;

    let state = Arc::new(AppState {
        whisper_model,
        mt: Arc::new(PassthroughMt::new()),
        tts: Arc::new(ToneTts::new(config.tts_sample_rate, 200)),
        config,
    });

    info!(%addr, "listening");
    let listener = TcpListener::bind(addr).await?;
    while let Ok((stream, peer_addr)) = listener.accept().await {
        info!(peer = %peer_addr, "connection accepted");
        let state = state.clone();
        tokio::spawn(async move {
            if let Err(e) = session::handle_connection(stream, state).await {
                error!(error = %e, "connection error");
            }
        });
    }
    Ok(())
}
