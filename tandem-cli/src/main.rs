mod console_observer;
mod loopback;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tandem_core::PeerIdentity;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tandem", version)]
#[command(about = "Two-party peer sessions over a broadcast relay")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect two in-process peers through the local relay.
    Loopback {
        #[arg(long, default_value = "loopback")]
        room: String,

        /// STUN/TURN URL, may be repeated. Host candidates only when omitted.
        #[arg(long = "ice-server")]
        ice_servers: Vec<String>,

        #[arg(long, default_value_t = 30)]
        timeout_secs: u64,

        /// JSON file with optional `session` and `transport` sections.
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(long, default_value = "hello from tandem")]
        message: String,
    },

    /// Print a freshly generated peer identity.
    Identity,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match Cli::parse().command {
        Commands::Loopback {
            room,
            ice_servers,
            timeout_secs,
            config,
            message,
        } => {
            let options = loopback::LoopbackOptions::load(
                room,
                ice_servers,
                timeout_secs,
                config.as_deref(),
                message,
            )?;
            loopback::run(options).await?;
        }
        Commands::Identity => println!("{}", PeerIdentity::generate()),
    }

    Ok(())
}
