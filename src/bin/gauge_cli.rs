//! Gauge Scope CLI - one-off lookups without the server
//!
//! Run with: cargo run --bin gauge-cli -- verify 0x...

use alloy_primitives::Address;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, Result};
use console::style;
use std::path::PathBuf;

use gauge_scope::build_service;
use gauge_scope::config::Config;
use gauge_scope::metadata::{GaugeMetadata, RemoteApi};
use gauge_scope::verifier::parse_address;

#[derive(Parser)]
#[command(name = "gauge-cli", version, about = "Verify Curve gauges and inspect provider boosts")]
struct Cli {
    /// Node URL; defaults to the RPC_URL resolution used by the server
    #[arg(long, env = "RPC_URL")]
    rpc_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Walk the factory trust chain for an address
    Verify { address: String },

    /// Boosts on a gauge for the provider wallets, or the given ones
    Boosts {
        gauge: String,
        #[arg(long = "wallet")]
        wallets: Vec<String>,
    },

    /// Download the gauge list and write it as the local snapshot
    Snapshot {
        #[arg(short, long)]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let mut config = Config::from_env()?;
    if let Some(rpc_url) = cli.rpc_url {
        config.rpc_url = rpc_url;
    }

    match cli.command {
        Commands::Verify { address } => verify(&config, &address).await,
        Commands::Boosts { gauge, wallets } => boosts(&config, &gauge, &wallets).await,
        Commands::Snapshot { out } => snapshot(&config, out).await,
    }
}

async fn verify(config: &Config, address: &str) -> Result<()> {
    let service = build_service(config)?;
    let outcome = service.verifier().verify(Some(address)).await;

    let verdict = if outcome.is_valid {
        style("✅ VALID").green().bold()
    } else {
        style("❌ INVALID").red().bold()
    };
    println!("{} {}", verdict, address);
    println!("   └─ {}", outcome.message);
    println!("   └─ {}ms", outcome.elapsed_ms);

    Ok(())
}

async fn boosts(config: &Config, gauge: &str, wallets: &[String]) -> Result<()> {
    let gauge = parse_address(gauge)?;
    let named: Vec<(String, Address)> = if wallets.is_empty() {
        config.provider_wallets.clone()
    } else {
        wallets
            .iter()
            .map(|w| -> Result<(String, Address)> { Ok((w.clone(), parse_address(w)?)) })
            .collect::<Result<_>>()?
    };

    let service = build_service(config)?;
    let addresses: Vec<Address> = named.iter().map(|(_, a)| *a).collect();
    let entries = service.boosts().compute_batch(&addresses, gauge).await;

    println!("{}", style(format!("Boosts on {}", gauge.to_checksum(None))).cyan().bold());
    println!("═══════════════════════════════════════════════════");
    for (name, wallet) in &named {
        match entries.get(wallet) {
            Some(entry) => println!(
                "  {:<12} {:>8}  {:>8.4}% of supply",
                name,
                entry.formatted(),
                entry.pct_of_total_supply
            ),
            None => println!("  {:<12} {:>8}", name, "N/A"),
        }
    }

    Ok(())
}

async fn snapshot(config: &Config, out: PathBuf) -> Result<()> {
    let api = RemoteApi::new(config.gauge_api_url.clone(), config.gauge_api_timeout())?;
    println!("📡 Fetching {}", config.gauge_api_url);

    let raw = api.fetch_raw().await?;
    // Refuse to write something the cache could not load back
    let metadata = GaugeMetadata::from_json(&raw).map_err(|e| eyre!("Gauge list rejected: {}", e))?;

    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&out, &raw).await?;

    println!(
        "{} {} gauges across {} pools -> {}",
        style("✅ Saved").green().bold(),
        metadata.gauge_count(),
        metadata.pool_count(),
        out.display()
    );

    Ok(())
}
