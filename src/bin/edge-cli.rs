use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use reqwest::Method;
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use url::Url;

use tenant_edge::auth::{
    ApiClient, CredentialSource, CredentialStore, HttpCredentialSource, RefreshScheduler,
    RefreshSettings,
};
use tenant_edge::config::{AuthConfig, ObservabilityConfig};
use tenant_edge::lifecycle::{signals, Shutdown};
use tenant_edge::observability::logging;

#[derive(Parser)]
#[command(name = "edge-cli")]
#[command(about = "Authenticated client for a running tenant edge", long_about = None)]
struct Cli {
    #[arg(short, long, env = "EDGE_URL", default_value = "http://localhost:8080")]
    url: Url,

    /// Value of the refresh cookie.
    #[arg(short, long, env = "EDGE_REFRESH_TOKEN")]
    refresh_token: Option<String>,

    #[arg(long, default_value = "refresh-token")]
    cookie_name: String,

    #[arg(long, default_value = "/refresh-token")]
    refresh_path: String,

    /// Milliseconds a protected call waits for a credential.
    #[arg(long, default_value_t = 10_000)]
    wait_timeout_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Call an API path, attaching the bearer credential unless the path is unprotected
    Call {
        method: String,
        path: String,
        /// JSON request body
        #[arg(short, long)]
        data: Option<String>,
    },
    /// Mint a credential and print its expiry
    Refresh,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init_logging(&ObservabilityConfig {
        log_level: "warn".to_string(),
        ..ObservabilityConfig::default()
    })?;

    let http = reqwest::Client::new();
    let endpoint = cli.url.join(&cli.refresh_path)?;
    let source = Arc::new(HttpCredentialSource::new(
        http.clone(),
        endpoint,
        cli.cookie_name.clone(),
        cli.refresh_token.clone(),
    ));

    match cli.command {
        Commands::Refresh => {
            let credential = source.fetch().await?;
            println!("expires_at: {}", credential.expires_at.format(&Rfc3339)?);
        }
        Commands::Call { method, path, data } => {
            let method = Method::from_bytes(method.to_uppercase().as_bytes())?;
            let store = Arc::new(CredentialStore::new());
            let client = ApiClient::new(
                http,
                cli.url.clone(),
                store.clone(),
                AuthConfig::default().unprotected_prefixes,
                Duration::from_millis(cli.wait_timeout_ms),
            );

            let scheduler = RefreshScheduler::new(source, store, RefreshSettings::default());
            let shutdown = Shutdown::new();
            scheduler.stop_on(shutdown.subscribe());
            tokio::spawn(signals::forward_signals(shutdown));
            if !client.is_unprotected(client.url(&path)?.path()) {
                scheduler.start().await?;
            }

            let mut builder = client.request(method, &path)?;
            if let Some(data) = data {
                let json: Value = serde_json::from_str(&data)?;
                builder = builder.json(&json);
            }
            let res = client.send(builder).await?;
            scheduler.stop();
            print_response(res).await?;
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    println!("status: {status}");

    let text = res.text().await?;
    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{text}"),
    }
    Ok(())
}
