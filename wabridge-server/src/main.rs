use std::sync::Arc;

use clap::Parser;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};
use wabridge_core::auth;
use wabridge_core::{BridgeConfig, DialogflowAgent, DialogflowClient, TextToSpeechClient, WhatsAppClient};

use wabridge_server::http::{self, HttpState};
use wabridge_server::subsystems::orchestrator::MessageOrchestrator;
use wabridge_server::subsystems::session_store::SessionStore;
use wabridge_server::subsystems::{sweeper, transcode};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "wabridge.toml")]
    config: String,

    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience — production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config
    let config = match BridgeConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Init logging; RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));
    fmt().with_env_filter(filter).init();

    if args.health {
        let mut healthy = true;

        match transcode::probe(&config.transcode.ffmpeg_path).await {
            Ok(v) => println!("✅ ffmpeg: {}", v),
            Err(e) => {
                println!("❌ ffmpeg not runnable ({}): {}", config.transcode.ffmpeg_path, e);
                healthy = false;
            }
        }

        match auth::token_source(&config.dialogflow.access_token, &config.google).await {
            Ok(tokens) => match tokens.access_token().await {
                Ok(_) => println!("✅ Google credentials issue tokens"),
                Err(e) => {
                    println!("❌ Google token request failed: {}", e);
                    healthy = false;
                }
            },
            Err(e) => {
                println!("❌ Google credentials unavailable: {}", e);
                healthy = false;
            }
        }

        let missing = config.missing_credentials();
        if missing.is_empty() {
            println!("✅ credentials configured");
        } else {
            println!("❌ missing settings: {}", missing.join(", "));
            healthy = false;
        }

        if !healthy {
            std::process::exit(1);
        }
        println!("✅ wabridge health check passed");
        return Ok(());
    }

    let gateway = WhatsAppClient::new(&config.whatsapp)?;
    let dialogflow_tokens =
        auth::token_source(&config.dialogflow.access_token, &config.google).await?;
    let tts_tokens = if config.tts.access_token.is_empty() {
        dialogflow_tokens.clone()
    } else {
        auth::token_source(&config.tts.access_token, &config.google).await?
    };

    let dialogflow = DialogflowClient::new(config.dialogflow.clone(), dialogflow_tokens)?;
    let tts = TextToSpeechClient::new(config.tts.clone(), tts_tokens)?;
    let agent = DialogflowAgent::new(
        dialogflow,
        Arc::new(tts),
        config.transcode.target_sample_rate,
    );

    let sessions = Arc::new(SessionStore::from_config(&config.session));
    let orchestrator = Arc::new(MessageOrchestrator::new(
        Arc::clone(&sessions),
        Arc::new(transcode::FfmpegTranscoder::from_config(&config.transcode)),
        Arc::new(agent),
        Arc::new(gateway),
        config.transcode.target_sample_rate,
    ));

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    // Spawn session expiry loop
    tokio::spawn(sweeper::run_sweep_loop(
        Arc::clone(&sessions),
        config.session.clone(),
        tx.subscribe(),
    ));

    let state = Arc::new(HttpState {
        orchestrator,
        config: config.clone(),
    });
    http::start_http_server(state, tx.subscribe()).await?;

    Ok(())
}
