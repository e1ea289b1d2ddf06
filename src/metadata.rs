//! Gauge Metadata Sources
//!
//! The Curve API (`getAllGauges`) answers `{success, data}` where `data`
//! maps pool names to pool records, each naming its gauge. A local snapshot
//! of the same document is consulted before the API.

use alloy_primitives::Address;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, trace};

use crate::error::UpstreamFetchError;

// ============================================
// PAYLOAD
// ============================================

/// One pool record from the gauge list.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolMetadata {
    pub pool_name: String,
    pub data: Value,
}

impl PoolMetadata {
    fn str_field(&self, key: &str) -> Option<String> {
        self.data.get(key).and_then(Value::as_str).map(str::to_string)
    }

    fn bool_field(&self, key: &str) -> bool {
        self.data.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn pool_address(&self) -> Option<String> {
        self.str_field("poolAddress").or_else(|| self.str_field("swap"))
    }

    pub fn lp_token(&self) -> Option<String> {
        self.str_field("swap_token")
    }

    pub fn blockchain(&self) -> String {
        self.str_field("blockchainId").unwrap_or_else(|| "ethereum".to_string())
    }

    pub fn side_chain(&self) -> bool {
        self.bool_field("side_chain")
    }

    pub fn is_killed(&self) -> bool {
        self.bool_field("is_killed")
    }

    pub fn has_no_crv(&self) -> bool {
        self.bool_field("hasNoCrv")
    }

    pub fn factory(&self) -> bool {
        self.bool_field("factory")
    }

    pub fn pool_type(&self) -> Option<String> {
        self.str_field("type")
    }

    pub fn gauge_data(&self, key: &str) -> Value {
        self.data
            .get("gauge_data")
            .and_then(|g| g.get(key))
            .cloned()
            .unwrap_or(Value::Null)
    }

    pub fn gauge_controller(&self) -> Value {
        self.data
            .get("gauge_controller")
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()))
    }

    pub fn gauge_relative_weight(&self) -> Value {
        self.data
            .get("gauge_controller")
            .and_then(|g| g.get("gauge_relative_weight"))
            .cloned()
            .unwrap_or(Value::Null)
    }
}

/// Every known pool, indexed by gauge address.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GaugeMetadata {
    gauges: HashMap<Address, PoolMetadata>,
    pool_count: usize,
}

#[derive(Debug, Deserialize)]
struct GaugeListResponse {
    success: Option<bool>,
    data: Option<Map<String, Value>>,
}

/// Gauge addresses in the upstream list are not reliably checksummed.
fn parse_gauge(raw: &str) -> Option<Address> {
    raw.trim().to_ascii_lowercase().parse().ok()
}

impl GaugeMetadata {
    /// Parse a `getAllGauges` document; anything else is an error.
    pub fn from_json(raw: &[u8]) -> Result<Self, UpstreamFetchError> {
        let response: GaugeListResponse = serde_json::from_slice(raw)?;
        if response.success != Some(true) {
            return Err(UpstreamFetchError::Unsuccessful);
        }
        let data = response.data.ok_or(UpstreamFetchError::MissingField("data"))?;

        let pool_count = data.len();
        let mut gauges: HashMap<Address, PoolMetadata> = HashMap::with_capacity(pool_count);
        for (pool_name, pool) in data {
            let gauge = pool
                .get("gauge")
                .and_then(Value::as_str)
                .and_then(|raw| parse_gauge(raw));
            let Some(gauge) = gauge else {
                trace!("Pool {} has no usable gauge", pool_name);
                continue;
            };
            // Several pools can share a gauge; the first one listed wins
            match gauges.entry(gauge) {
                Entry::Occupied(kept) => {
                    debug!("Gauge {} of pool {} already listed under {}", gauge, pool_name, kept.get().pool_name);
                }
                Entry::Vacant(slot) => {
                    slot.insert(PoolMetadata { pool_name, data: pool });
                }
            }
        }

        Ok(Self { gauges, pool_count })
    }

    pub fn find(&self, gauge: &Address) -> Option<&PoolMetadata> {
        self.gauges.get(gauge)
    }

    pub fn gauge_count(&self) -> usize {
        self.gauges.len()
    }

    pub fn pool_count(&self) -> usize {
        self.pool_count
    }
}

// ============================================
// SOURCES
// ============================================

/// Where a cached payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceTag {
    LocalFile,
    RemoteApi,
    /// Kept after every source failed.
    Stale,
}

impl std::fmt::Display for SourceTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceTag::LocalFile => write!(f, "local-file"),
            SourceTag::RemoteApi => write!(f, "remote-api"),
            SourceTag::Stale => write!(f, "stale"),
        }
    }
}

#[async_trait]
pub trait MetadataSource: Send + Sync {
    fn tag(&self) -> SourceTag;

    async fn fetch(&self) -> Result<GaugeMetadata, UpstreamFetchError>;
}

/// Snapshot file on local disk.
pub struct LocalSnapshot {
    path: Option<PathBuf>,
}

impl LocalSnapshot {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

#[async_trait]
impl MetadataSource for LocalSnapshot {
    fn tag(&self) -> SourceTag {
        SourceTag::LocalFile
    }

    async fn fetch(&self) -> Result<GaugeMetadata, UpstreamFetchError> {
        let path = self
            .path
            .as_ref()
            .ok_or(UpstreamFetchError::NotConfigured { source_name: "local snapshot" })?;

        let raw = tokio::fs::read(path).await?;
        let metadata = GaugeMetadata::from_json(&raw)?;
        debug!("Loaded {} gauges from {}", metadata.gauge_count(), path.display());
        Ok(metadata)
    }
}

/// The Curve gauge list API.
pub struct RemoteApi {
    http_client: Client,
    url: String,
}

impl RemoteApi {
    pub fn new(url: String, timeout: Duration) -> Result<Self, UpstreamFetchError> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self { http_client, url })
    }

    /// Raw document bytes, for writing snapshots.
    pub async fn fetch_raw(&self) -> Result<Vec<u8>, UpstreamFetchError> {
        let response = self.http_client.get(&self.url).send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl MetadataSource for RemoteApi {
    fn tag(&self) -> SourceTag {
        SourceTag::RemoteApi
    }

    async fn fetch(&self) -> Result<GaugeMetadata, UpstreamFetchError> {
        let raw = self.fetch_raw().await?;
        let metadata = GaugeMetadata::from_json(&raw)?;
        debug!("Fetched {} gauges from {}", metadata.gauge_count(), self.url);
        Ok(metadata)
    }
}

// ============================================
// TESTS
// ============================================
