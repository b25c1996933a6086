//! relaygate - single-endpoint forwarding gateway
//!
//! Accepts `{destinationId, credential, payload}` requests, forwards them to
//! one upstream API and relays the (possibly streaming) response.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use relaygate::config::Config;

#[derive(Parser)]
#[command(name = "relaygate")]
#[command(about = "Single-endpoint forwarding gateway with streaming relay")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the relay server
    Serve {
        /// Path to configuration file (defaults and environment when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override listen address
        #[arg(short, long)]
        listen: Option<String>,
    },

    /// Validate configuration
    Check {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn init_tracing(level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("relaygate={level},tower_http={level}").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, listen } => {
            let config = Config::load(config.as_deref())?;
            init_tracing(&config.logging.level);

            tracing::info!("Starting relaygate");
            if let Some(addr) = &listen {
                tracing::info!(listen = %addr, "Override listen address");
            }

            relaygate::proxy::run_server(config, listen).await
        }

        Commands::Check { config } => {
            init_tracing("info");
            let loaded = Config::load(config.as_deref())?;
            tracing::info!(
                listen = %loaded.server.listen_addr(),
                upstream = %loaded.upstream.url_template,
                timeout_ms = loaded.upstream.timeout_ms,
                require_payload = loaded.relay.require_payload,
                "Configuration is valid"
            );
            Ok(())
        }
    }
}
