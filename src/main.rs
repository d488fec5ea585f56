// Auris - terminal client for emotion-based music recommendations
// Type how you feel, get a predicted emotion and a ranked song list,
// play the previews in order.

use anyhow::Result;
use clap::Parser;
use std::path::Path;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use auris::api::RecommendClient;
use auris::config::Config;
use auris::history::{FileHistoryStore, HistoryLedger};
use auris::ui::App;

#[derive(Parser)]
#[command(name = "auris")]
#[command(about = "Terminal client for the Auris emotion-based music recommender")]
struct Args {
    /// Override the recommendation service base URL
    #[arg(long)]
    api_url: Option<String>,

    /// One-shot mode: print recommendations for this text and exit
    #[arg(long)]
    query: Option<String>,

    /// Enable developer logging (debug output to stderr note)
    #[arg(long)]
    dev: bool,
}

fn init_logging(data_dir: &Path, dev: bool) -> Result<()> {
    // The TUI owns the terminal, so logs go to a rotating file
    let log_dir = data_dir.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "auris.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let base_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,auris=debug"));

    let subscriber = tracing_subscriber::fmt()
        .with_writer(file_writer)
        .with_target(true)
        .with_level(true)
        .with_ansi(false)
        .with_env_filter(base_filter)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    if dev {
        eprintln!("Dev mode: logs in {}", log_dir.display());
    }

    // Keep the non-blocking writer alive for the process lifetime
    std::mem::forget(guard);

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load config - falls back to defaults if missing
    let mut config = Config::load()?;
    if let Some(url) = args.api_url {
        config.api.base_url = url;
    }

    init_logging(&config.data_dir, args.dev)?;
    info!("Auris starting (service at {})", config.api.base_url);

    if let Some(text) = args.query {
        return run_one_shot(&config, &text).await;
    }

    // Fire up the TUI and let it rip
    let mut app = App::new(config)?;
    app.run().await?;

    Ok(())
}

/// Non-interactive mode: one query, plain stdout, still records history.
async fn run_one_shot(config: &Config, text: &str) -> Result<()> {
    let client = RecommendClient::new(
        config.api.base_url.clone(),
        Duration::from_secs(config.api.request_timeout_secs),
    )?;

    let response = client.recommend(text).await?;

    let mut ledger = HistoryLedger::load(FileHistoryStore::new(&config.data_dir));
    ledger.record(text, &response.predicted_emotion);

    println!("Emotion: {}", response.predicted_emotion);
    if let Some(confidence) = response.confidence {
        println!("Confidence: {:.1}%", confidence * 100.0);
    }

    println!();
    for (i, song) in response.songs.iter().enumerate() {
        let preview = if song.has_preview() { "" } else { " (no preview)" };
        println!("{:>2}. {}{}", i + 1, song.display_line(), preview);
    }

    println!();
    println!("Emotion history:");
    for count in ledger.aggregate() {
        println!("  {:<12} {}", count.label, count.count);
    }

    Ok(())
}
