#![warn(missing_docs)]

//! ossbridge OSS gateway server

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use ossbridge_gateway::config::GatewayConfig;
use ossbridge_gateway::gateway::Gateway;
use ossbridge_gateway::keystone::KeystoneClient;
use ossbridge_gateway::server;
use ossbridge_gateway::swift_client::SwiftClient;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "ossb-gateway")]
#[command(about = "OSS protocol gateway in front of a Swift object store", long_about = None)]
struct Cli {
    /// Config file (.toml or .json)
    #[arg(short, long, default_value = "/etc/ossbridge/gateway.toml")]
    config: PathBuf,

    /// Shared secret; overrides the config file
    #[arg(long, env = "OSSB_SHARED_SECRET", hide_env_values = true)]
    shared_secret: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = if cli.config.exists() {
        GatewayConfig::from_file(&cli.config)?
    } else {
        GatewayConfig::default()
    };
    if let Some(secret) = cli.shared_secret {
        config.shared_secret = secret;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    if !cli.config.exists() {
        tracing::warn!("Config file not found, using defaults: {}", cli.config.display());
    }
    config.validate()?;
    tracing::info!("ossbridge gateway starting...");

    let addr = config.bind.socket_addr()?;
    let backend = Arc::new(SwiftClient::new(&config.backend_url, config.backend_timeout_secs));
    let identity = Arc::new(KeystoneClient::new(config.auth_base(), config.auth_timeout_secs));
    tracing::info!(
        backend = %config.backend_url,
        identity = %identity.token_url(),
        oss_acl = config.oss_acl,
        "configured"
    );
    let gateway = Arc::new(Gateway::new(Arc::new(config), backend, identity));

    server::serve(gateway, addr).await?;
    Ok(())
}
