//! callscreen - incoming call screen for conferencing clients
//!
//! Validates incoming call bundles and runs the call screen controller
//! against console stand-ins for the conferencing SDK.

mod bundle;
mod config;
mod events;
mod handoff;
mod host;
mod screen;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::bundle::IncomingCallBundle;
use crate::config::Config;

#[derive(Parser)]
#[command(name = "callscreen")]
#[command(about = "Incoming call screen for conferencing clients", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate an incoming call bundle (JSON object)
    Check {
        /// Path to the bundle file
        bundle: PathBuf,
    },

    /// Show the call screen for a bundle; drive it with stdin
    /// (`accept`, `decline`, `grant`, `deny`, `resume`, or JSON conference events)
    Ring {
        /// Path to the bundle file
        bundle: PathBuf,

        /// Auto-dismiss after this many milliseconds (overrides config)
        #[arg(long)]
        duration_ms: Option<u64>,

        /// Start without microphone permission
        #[arg(long)]
        deny_microphone: bool,

        /// Pretend the SDK does not know the conference
        #[arg(long)]
        unknown_conference: bool,

        /// Pretend the session socket is not open yet
        #[arg(long)]
        session_closed: bool,
    },

    /// Show or update configuration
    Config {
        /// Set the incoming call auto-dismiss duration in milliseconds
        #[arg(long)]
        set_duration_ms: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match cli.command {
        Commands::Check { bundle } => {
            let bundle = load_bundle(&bundle)?;
            print_bundle(&bundle);
            anyhow::ensure!(bundle.is_valid(), "Bundle has no conference id");
        }
        Commands::Ring {
            bundle,
            duration_ms,
            deny_microphone,
            unknown_conference,
            session_closed,
        } => {
            let config = Config::load().context("Failed to load config")?;
            let bundle = load_bundle(&bundle)?;
            let options = host::RingOptions {
                microphone_granted: !deny_microphone,
                conference_known: !unknown_conference,
                session_open: !session_closed,
            };
            host::ring(bundle, config.settings(duration_ms), options).await?;
        }
        Commands::Config { set_duration_ms } => {
            let mut config = Config::load().context("Failed to load config")?;
            if let Some(ms) = set_duration_ms {
                config.set_incoming_call_duration_ms(ms);
                config.save()?;
                tracing::info!("Saved incoming call duration of {}ms", ms);
            }
            println!("Config file: {}", Config::config_path()?.display());
            println!(
                "Incoming call duration: {}ms",
                config.incoming_call_duration().as_millis()
            );
        }
    }

    Ok(())
}

fn load_bundle(path: &Path) -> Result<IncomingCallBundle> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read bundle {}", path.display()))?;
    let raw: serde_json::Value =
        serde_json::from_str(&content).context("Bundle is not valid JSON")?;
    Ok(IncomingCallBundle::parse(&raw))
}

fn print_bundle(bundle: &IncomingCallBundle) {
    let field = |value: Option<&str>| value.unwrap_or("-").to_string();
    println!("Conference:  {}", field(bundle.conference_id()));
    println!("Caller:      {}", field(bundle.caller_display_name()));
    println!("Avatar:      {}", field(bundle.avatar_url()));
    println!("User ID:     {}", field(bundle.user_id()));
    println!("External ID: {}", field(bundle.external_user_id()));
    for (key, value) in bundle.custom_payload() {
        println!("  {} = {}", key, value);
    }
    println!("Valid: {}", bundle.is_valid());
}
