//! Service Configuration
//!
//! Everything is read from the environment (and `.env`), or from a TOML
//! file. Address lists default to the mainnet constants in `chain`.

use alloy_primitives::Address;
use eyre::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::chain::{CURVE_GAUGES_API, MULTICALL3, PROVIDER_WALLETS, TRUSTED_FACTORIES};
use crate::verifier::parse_address;

const LOCAL_RPC: &str = "http://localhost:8545";

// ============================================
// MAIN CONFIGURATION
// ============================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    // ========== Chain ==========
    /// JSON-RPC endpoint used for eth_call / eth_getCode
    pub rpc_url: String,

    /// Per-call RPC timeout
    pub rpc_timeout_secs: u64,

    /// Multicall3 deployment
    pub multicall_address: Address,

    /// Factories whose gauges verify
    pub trusted_factories: Vec<Address>,

    /// Wallets reported on every gauge-info response, by provider name
    pub provider_wallets: Vec<(String, Address)>,

    // ========== Gauge metadata ==========
    pub gauge_api_url: String,

    /// Snapshot of the gauge list, tried before the API
    pub gauge_snapshot_path: Option<PathBuf>,

    pub gauge_api_timeout_secs: u64,

    pub cache_ttl_secs: u64,

    // ========== Server ==========
    pub bind_addr: String,

    /// Admin routes reject every request while unset
    pub admin_api_key: Option<String>,

    // ========== Logging ==========
    pub log_level: String,
    pub log_json: bool,
}

impl Config {
    /// Load configuration from environment variables and .env file
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let trusted_factories = match env::var("TRUSTED_FACTORIES") {
            Ok(list) => parse_address_list(&list)?,
            Err(_) => Self::default_trusted_factories(),
        };
        let provider_wallets = match env::var("PROVIDER_WALLETS") {
            Ok(pairs) => parse_provider_wallets(&pairs)?,
            Err(_) => Self::default_provider_wallets(),
        };
        let multicall_address = match env::var("MULTICALL_ADDRESS") {
            Ok(raw) => parse_address(&raw)?,
            Err(_) => MULTICALL3,
        };

        Ok(Self {
            rpc_url: resolve_rpc_url(
                env::var("RPC_URL").ok(),
                env::var("MAINNET_RPC").ok(),
                env::var("WEB3_INFURA_PROJECT_ID").ok(),
            ),
            rpc_timeout_secs: env::var("RPC_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
            multicall_address,
            trusted_factories,
            provider_wallets,

            gauge_api_url: env::var("GAUGE_API_URL").unwrap_or_else(|_| CURVE_GAUGES_API.to_string()),
            gauge_snapshot_path: env::var("GAUGE_SNAPSHOT_PATH").ok().map(PathBuf::from),
            gauge_api_timeout_secs: env::var("GAUGE_API_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
            cache_ttl_secs: env::var("CACHE_TTL_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .unwrap_or(300),

            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string()),
            admin_api_key: env::var("ADMIN_API_KEY").ok().filter(|k| !k.is_empty()),

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_json: env::var("LOG_JSON")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
        })
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    fn default_trusted_factories() -> Vec<Address> {
        TRUSTED_FACTORIES.iter().map(|(address, _)| *address).collect()
    }

    fn default_provider_wallets() -> Vec<(String, Address)> {
        PROVIDER_WALLETS
            .iter()
            .map(|(name, wallet)| (name.to_string(), *wallet))
            .collect()
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }

    pub fn gauge_api_timeout(&self) -> Duration {
        Duration::from_secs(self.gauge_api_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Validate configuration before serving
    pub fn validate(&self) -> Result<()> {
        if self.rpc_url.is_empty() || self.rpc_url.contains("YOUR_API_KEY") {
            return Err(eyre::eyre!("Invalid RPC_URL - please set a valid node URL"));
        }
        if self.trusted_factories.is_empty() {
            return Err(eyre::eyre!("TRUSTED_FACTORIES is empty - no gauge could ever verify"));
        }
        if self.rpc_timeout_secs == 0 || self.gauge_api_timeout_secs == 0 {
            return Err(eyre::eyre!("Timeouts must be at least one second"));
        }
        if self.cache_ttl_secs == 0 {
            return Err(eyre::eyre!("CACHE_TTL_SECS must be positive"));
        }
        if self.gauge_api_url.is_empty() && self.gauge_snapshot_path.is_none() {
            return Err(eyre::eyre!(
                "No gauge metadata source - set GAUGE_API_URL or GAUGE_SNAPSHOT_PATH"
            ));
        }
        self.bind_addr
            .parse::<std::net::SocketAddr>()
            .map_err(|e| eyre::eyre!("Invalid BIND_ADDR '{}': {}", self.bind_addr, e))?;

        Ok(())
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        println!("╔════════════════════════════════════════════════════════════╗");
        println!("║              GAUGE SCOPE - CONFIGURATION                   ║");
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ CHAIN                                                      ║");
        println!("║ • RPC:             {:<40} ║", redact(&self.rpc_url));
        println!("║ • RPC Timeout:     {:<40} ║", format!("{}s", self.rpc_timeout_secs));
        println!("║ • Multicall3:      {:<40} ║", self.multicall_address.to_checksum(None));
        println!("║ • Trusted Factories: {:<38} ║", self.trusted_factories.len());
        println!("║ • Provider Wallets:  {:<38} ║", self.provider_wallets.len());
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ GAUGE METADATA                                             ║");
        println!("║ • Snapshot:        {:<40} ║",
            match &self.gauge_snapshot_path {
                Some(path) => path.display().to_string(),
                None => "✗ Not Set".to_string(),
            }
        );
        println!("║ • Cache TTL:       {:<40} ║", format!("{}s", self.cache_ttl_secs));
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ SERVER                                                     ║");
        println!("║ • Bind:            {:<40} ║", self.bind_addr);
        println!("║ • Admin API:       {:<40} ║",
            if self.admin_api_key.is_some() { "✓ Configured" } else { "✗ Disabled" }
        );
        println!("╚════════════════════════════════════════════════════════════╝");
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_url: LOCAL_RPC.to_string(),
            rpc_timeout_secs: 10,
            multicall_address: MULTICALL3,
            trusted_factories: Self::default_trusted_factories(),
            provider_wallets: Self::default_provider_wallets(),
            gauge_api_url: CURVE_GAUGES_API.to_string(),
            gauge_snapshot_path: None,
            gauge_api_timeout_secs: 10,
            cache_ttl_secs: 300,
            bind_addr: "0.0.0.0:8000".to_string(),
            admin_api_key: None,
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}

// ============================================
// PARSING HELPERS
// ============================================

/// Node URL by priority: explicit URL, mainnet override, Infura project, local node.
pub fn resolve_rpc_url(explicit: Option<String>, mainnet: Option<String>, infura_id: Option<String>) -> String {
    let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

    non_empty(explicit)
        .or_else(|| non_empty(mainnet))
        .or_else(|| non_empty(infura_id).map(|id| format!("https://mainnet.infura.io/v3/{}", id.trim())))
        .unwrap_or_else(|| LOCAL_RPC.to_string())
}

/// Comma-separated addresses.
pub fn parse_address_list(raw: &str) -> Result<Vec<Address>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| parse_address(s).map_err(eyre::Report::from))
        .collect()
}

/// Comma-separated `name=0x..` pairs.
pub fn parse_provider_wallets(raw: &str) -> Result<Vec<(String, Address)>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|pair| -> Result<(String, Address)> {
            let (name, address) = pair
                .split_once('=')
                .ok_or_else(|| eyre::eyre!("Provider wallet '{}' is not name=address", pair))?;
            Ok((name.trim().to_string(), parse_address(address)?))
        })
        .collect()
}

/// Hide API keys embedded in provider URLs.
fn redact(url: &str) -> String {
    match url.rsplit_once('/') {
        Some((base, key)) if key.len() >= 16 => format!("{}/***", base),
        _ => url.to_string(),
    }
}

// ============================================
// TESTS
// ============================================
