//! # pulse
//!
//! Command-line host for the Pulse telemetry pipeline.
//!
//! ## Commands
//!
//! - `probe`: Check that a collector answers
//! - `track`: Send one event
//! - `profile`: Submit a profile snapshot
//! - `encrypt`: Print the envelope for a plaintext
//! - `status`: Show effective configuration
//!
//! ## Example
//!
//! ```bash
//! # Check the collector
//! pulse probe --host collector.example.com --https
//!
//! # Send an event
//! pulse track purchase --param product_id=premium --param price=9.99
//!
//! # Update the profile
//! pulse profile --push-token fcm-token
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::{encrypt, probe, profile, status, track};

/// Command-line host for the Pulse telemetry pipeline.
#[derive(Parser, Debug)]
#[command(name = "pulse")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (default: ./pulse.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory for the first-open state file
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check whether a collector answers
    Probe {
        /// Collector host (default: from configuration)
        #[arg(long)]
        host: Option<String>,

        /// Use HTTPS
        #[arg(long)]
        https: bool,
    },

    /// Send one event and wait for delivery
    Track {
        /// Event name
        name: String,

        /// Event parameter as key=value (repeatable)
        #[arg(long = "param", short)]
        params: Vec<String>,

        /// Event parameters as a JSON object
        #[arg(long)]
        json: Option<String>,

        /// User identity (default: from configuration)
        #[arg(long)]
        identity: Option<String>,
    },

    /// Submit a profile snapshot
    Profile {
        /// Push notification token
        #[arg(long)]
        push_token: Option<String>,

        /// Affiliate click id
        #[arg(long)]
        affiliate_id: Option<String>,

        /// Affiliate promo code
        #[arg(long)]
        promo_code: Option<String>,

        /// User identity (default: from configuration)
        #[arg(long)]
        identity: Option<String>,
    },

    /// Print the encrypted envelope for a plaintext
    Encrypt {
        /// Text to encrypt
        text: String,
    },

    /// Show effective configuration and stored state
    Status,
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env("PULSE_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = config::load(cli.config.as_deref())?;
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => config::default_data_dir()?,
    };

    match cli.command {
        Commands::Probe { host, https } => {
            probe::run(&settings, host.as_deref(), https).await?;
        }
        Commands::Track {
            name,
            params,
            json,
            identity,
        } => {
            let parameters = track::parse_parameters(&params, json.as_deref())?;
            track::run(&settings, &data_dir, &name, parameters, identity.as_deref()).await?;
        }
        Commands::Profile {
            push_token,
            affiliate_id,
            promo_code,
            identity,
        } => {
            let fields = profile::fields(
                &settings,
                identity,
                push_token,
                affiliate_id,
                promo_code,
            );
            profile::run(&settings, &data_dir, fields).await?;
        }
        Commands::Encrypt { text } => {
            encrypt::run(&text)?;
        }
        Commands::Status => {
            status::run(&settings, &data_dir).await?;
        }
    }

    Ok(())
}
