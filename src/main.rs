use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use callsheet::{
    AdvanceClient, AdvanceOutcome, AppState, Config, CpalMic, OperatorSession, SystemOpener,
    WhisperTranscriber,
};

#[derive(Parser, Debug)]
#[command(name = "callsheet", about = "Record-advance voice memo service")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the advance server
    Serve {
        /// Config file (without extension)
        #[arg(long, default_value = "config/callsheet")]
        config: String,

        /// Override the configured HTTP port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Work the outreach queue from this terminal: record a memo per
    /// record, press Enter to submit and advance
    Operate {
        /// Advance server to work against
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        server: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    match args.command.unwrap_or(Command::Serve {
        config: "config/callsheet".to_string(),
        port: None,
    }) {
        Command::Serve { config, port } => serve(&config, port).await,
        Command::Operate { server } => operate(server).await,
    }
}

async fn serve(config: &str, port: Option<u16>) -> Result<()> {
    let cfg = Config::load(config)?;
    let port = port.unwrap_or(cfg.service.http.port);

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));

    let store = cfg.store.build().context("Failed to build record store")?;

    let api_key = std::env::var(&cfg.transcription.api_key_env).with_context(|| {
        format!(
            "Transcription API key not set ({})",
            cfg.transcription.api_key_env
        )
    })?;
    let transcriber = Arc::new(WhisperTranscriber::new(api_key));

    let state = AppState::new(store, transcriber);
    let app = callsheet::create_router(state);

    let addr = format!("{}:{}", cfg.service.http.bind, port);
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app).await?;

    Ok(())
}

/// Interactive operator loop: one recording cycle per record, Enter to
/// submit and advance, `q` to stop.
async fn operate(server: String) -> Result<()> {
    let mut session = OperatorSession::new(
        Box::new(CpalMic::new()),
        Box::new(SystemOpener),
        AdvanceClient::new(server),
    );

    session
        .load_initial()
        .await
        .context("Failed to load the first record")?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while !session.is_ended() {
        if let Some(record) = session.current_record() {
            println!(
                "Row {}: {} {} — {} ({})",
                record.row, record.first_name, record.last_name, record.company, record.url
            );
        }

        if session.state().is_idle() {
            if let Err(e) = session.start().await {
                eprintln!("Could not start recording: {} (Enter to retry, q to quit)", e);
                match lines.next_line().await? {
                    Some(line) if line.trim() != "q" => continue,
                    _ => break,
                }
            }
        }

        println!("Recording. Enter to submit and advance, q to quit.");
        match lines.next_line().await? {
            Some(line) if line.trim() != "q" => {}
            _ => break,
        }

        match session.advance().await {
            Ok(AdvanceOutcome::Advanced) => {}
            Ok(AdvanceOutcome::Finished(message)) => println!("{}", message),
            Ok(AdvanceOutcome::NotRecording) => {}
            Err(e) => eprintln!("Advance failed: {} (Enter to resubmit)", e),
        }
    }

    if let Some(message) = session.terminal_message() {
        info!("Session {} over: {}", session.session_id(), message);
    }
    Ok(())
}
