use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use registry_keywords::webhook::npm_search::DEFAULT_REGISTRY_URL;
use registry_keywords::webhook::{router, NpmSearchClient, FIND_PACKAGE_ROUTE};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "chatbot-webhook",
    about = "Dialogflow webhook that answers npm package lookups"
)]
struct WebhookCli {
    /// Interface to bind the HTTP server to
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// Base URL of the npm registry used for searches
    #[arg(long, env = "NPM_REGISTRY_URL", default_value = DEFAULT_REGISTRY_URL)]
    registry_url: String,

    /// Seconds before a registry search times out
    #[arg(long, default_value_t = 10)]
    search_timeout_secs: u64,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = WebhookCli::parse();
    setup_tracing(cli.verbose);

    let search = NpmSearchClient::new(
        &cli.registry_url,
        Duration::from_secs(cli.search_timeout_secs.max(1)),
    )?;
    let app = router(search);

    let addr: SocketAddr = format!("{}:{}", cli.host, cli.port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", cli.host, cli.port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, route = FIND_PACKAGE_ROUTE, "chatbot webhook listening");
    axum::serve(listener, app)
        .await
        .context("server shutdown")?;
    Ok(())
}

fn setup_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("registry_keywords=debug,chatbot_webhook=debug,info")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
