//! Interconnect client CLI.
//!
//! Binds a [`ServiceConnection`] to the domain-selection service and runs a
//! single operation through it.  The service is hosted in-process by
//! [`LocalBinder`] + [`InMemoryDomainService`], so the CLI exercises the full
//! bind → call → disconnect path without a platform transport.
//!
//! # Usage
//!
//! ```text
//! interconnect-client [OPTIONS] <COMMAND>
//!
//! Commands:
//!   get        <PACKAGE>                       Blocking lookup
//!   get-async  <PACKAGE>                       Callback-based lookup, awaited
//!   select     <PACKAGE> <DOMAIN>... [--component <C>]
//!
//! Options:
//!   --config <PATH>          Config file [env: INTERCONNECT_CONFIG]
//!   --seed <PKG=D1,D2>       Pre-populate selections (repeatable)
//!   --delivery-delay-ms <MS> Delay asynchronous results [default: 0]
//!   --json                   Print results as JSON
//! ```
//!
//! Log level comes from `RUST_LOG`, falling back to `[logging] level` in the
//! config file.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use interconnect_core::{ComponentName, DomainList};
use tracing::info;
use tracing_subscriber::EnvFilter;

use interconnect_client::infrastructure::{
    binder::LocalBinder,
    config::{config_file_path, load_config, ClientConfig},
    memory_service::{DeliveryMode, InMemoryDomainService},
};
use interconnect_client::ServiceConnection;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Client for the Interconnect domain-selection service.
#[derive(Debug, Parser)]
#[command(
    name = "interconnect-client",
    about = "Query and update domain selections through a bound service connection",
    version
)]
struct Cli {
    /// Path to the TOML config file.  Defaults to the platform config directory.
    #[arg(long, env = "INTERCONNECT_CONFIG")]
    config: Option<PathBuf>,

    /// Pre-populate the in-process service: `package=domain1,domain2`.
    #[arg(long = "seed", value_parser = parse_seed)]
    seeds: Vec<(String, DomainList)>,

    /// Delay before asynchronous results are delivered, in milliseconds.
    #[arg(long, default_value_t = 0)]
    delivery_delay_ms: u64,

    /// Print results as JSON instead of one domain per line.
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Look up the selected domains with the blocking call.
    Get { package: String },

    /// Look up the selected domains with the callback-based call.
    GetAsync { package: String },

    /// Select domains for a package.
    Select {
        package: String,
        /// Component the selection is made for.  Defaults to the bound service.
        #[arg(long)]
        component: Option<ComponentName>,
        #[arg(required = true)]
        domains: Vec<String>,
    },
}

fn parse_seed(raw: &str) -> Result<(String, DomainList), String> {
    let (package, domains) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected PACKAGE=DOMAIN[,DOMAIN...], got '{raw}'"))?;
    if package.is_empty() {
        return Err(format!("empty package in '{raw}'"));
    }
    let domains = domains
        .split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .collect();
    Ok((package.to_string(), domains))
}

fn resolve_config(cli: &Cli) -> anyhow::Result<ClientConfig> {
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => match config_file_path() {
            Ok(path) => path,
            Err(_) => return Ok(ClientConfig::default()),
        },
    };
    load_config(&path).with_context(|| format!("failed to load config from {}", path.display()))
}

fn print_domains(domains: &DomainList, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(domains)?);
    } else {
        for domain in domains {
            println!("{domain}");
        }
    }
    Ok(())
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .init();

    // ── In-process service ────────────────────────────────────────────────────
    let delivery = match cli.delivery_delay_ms {
        0 => DeliveryMode::Immediate,
        ms => DeliveryMode::Delayed(Duration::from_millis(ms)),
    };
    let service = Arc::new(InMemoryDomainService::with_delivery(delivery));
    for (package, domains) in &cli.seeds {
        service.seed(package.clone(), domains.clone());
    }

    let component = config.service.component.clone();
    let binder = LocalBinder::new();
    binder.register_service(component.clone(), service);

    // ── Bind ──────────────────────────────────────────────────────────────────
    let connection: Arc<ServiceConnection<LocalBinder>> = binder
        .connect(&component)
        .with_context(|| format!("failed to bind {component}"))?;
    let bound_to = tokio::time::timeout(config.service.bind_timeout(), connection.wait_until_bound())
        .await
        .with_context(|| format!("timed out binding {component}"))??;
    info!("bound to {component} ({bound_to})");

    // ── Run the command ───────────────────────────────────────────────────────
    let result = match cli.command {
        Command::Get { package } => connection
            .get_selected_domains(&package)
            .map_err(anyhow::Error::from)
            .and_then(|domains| print_domains(&domains, cli.json)),
        Command::GetAsync { package } => match connection.get_selected_domains_async(&package).await {
            Ok(domains) => print_domains(&domains, cli.json),
            Err(e) => Err(e.into()),
        },
        Command::Select {
            package,
            component: target,
            domains,
        } => {
            let target = target.unwrap_or_else(|| component.clone());
            let domains: DomainList = domains.into_iter().collect();
            connection
                .select_domains(&package, &domains, &target)
                .map_err(anyhow::Error::from)
                .and_then(|()| print_domains(&connection.get_selected_domains(&package)?, cli.json))
        }
    };

    connection.disconnect();
    result
}
