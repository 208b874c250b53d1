use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

mod banner;
mod commands;
mod interactive_app;

use crate::interactive_app::InteractiveApp;

#[derive(Parser, Debug)]
#[command(name = "soulmate")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "SoulMate - roleplay chat in your terminal")]
struct Args {
    /// Load settings from a specific file instead of ~/.soulmate/settings.toml
    #[arg(long, value_name = "PATH")]
    settings: Option<PathBuf>,

    /// Start in the face-to-face scene instead of the phone
    #[arg(long)]
    activity: bool,
}

fn main() -> Result<()> {
    setup_tracing()?;

    // Replies, comment answers and scene changes keep arriving while the
    // prompt is blocked on input.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

async fn async_main() -> Result<()> {
    let args = Args::parse();

    info!(
        "CLI startup: settings={:?}, activity={}",
        args.settings, args.activity
    );

    let mut app = InteractiveApp::new(args.settings, args.activity)?;
    app.run().await
}

fn setup_tracing() -> Result<()> {
    use std::fs;
    use tracing_subscriber::fmt;

    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("/tmp"));
    let trace_dir = home.join(".soulmate").join("trace");
    fs::create_dir_all(&trace_dir)?;

    let log_file = trace_dir.join("soulmate.log");
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file)?;

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(file)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Tracing initialized to {:?}", log_file);
    Ok(())
}
