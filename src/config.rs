// Configuration management module
// Loads settings from environment variables via the config crate, with the
// APP__ prefix convention and comma-separated helpers for list values.

use std::collections::HashMap;
use std::str::FromStr;

use alloy_primitives::Address;
use anyhow::{Context, Result};
use serde::Deserialize;
use url::Url;

use crate::router::routes::RoutePriority;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Chain this instance initiates transfers from.
    pub source_chain: u64,
    /// "chainId=url" pairs, comma-separated, e.g.
    /// "1=https://eth.example,42161=https://arb.example".
    pub rpc_endpoints: String,
    /// 0x-prefixed address of the transacting account.
    pub sender_address: String,
    /// Attestation service base URL (hash lookups).
    pub attestation_base: Url,
    /// Optional faster tx-keyed attestation endpoint.
    pub attestation_fast_base: Option<Url>,
    /// Relay network API base URL.
    pub relay_api_base: Url,
    /// Comma-separated destination chain allow-list; empty/absent = any.
    pub allowed_destinations: Option<String>,
    /// USD price of the wrapped native asset, for fee conversion.
    pub native_price_usd: Option<f64>,
    /// Default routing priority (cost/speed/reliability).
    pub route_priority: Option<String>,
    /// Concurrency control for bridge() calls.
    pub max_inflight: Option<usize>,
    /// HTTP API listen address.
    pub api_listen: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;
        Ok(cfg.try_deserialize()?)
    }

    pub fn sender(&self) -> Result<Address> {
        Address::from_str(&self.sender_address)
            .with_context(|| format!("invalid sender address: {}", self.sender_address))
    }

    pub fn rpc_endpoint_map(&self) -> Result<HashMap<u64, String>> {
        let mut map = HashMap::new();
        for pair in self.rpc_endpoints.split(',').filter(|p| !p.trim().is_empty()) {
            let (chain, url) = pair
                .split_once('=')
                .with_context(|| format!("rpc endpoint entry {pair:?} is not chainId=url"))?;
            let chain: u64 = chain
                .trim()
                .parse()
                .with_context(|| format!("bad chain id in rpc endpoint entry {pair:?}"))?;
            map.insert(chain, url.trim().to_string());
        }
        Ok(map)
    }

    pub fn allowed_destination_list(&self) -> Result<Vec<u64>> {
        let Some(raw) = &self.allowed_destinations else {
            return Ok(Vec::new());
        };
        raw.split(',')
            .filter(|p| !p.trim().is_empty())
            .map(|p| {
                p.trim()
                    .parse()
                    .with_context(|| format!("bad chain id {p:?} in allowed destinations"))
            })
            .collect()
    }

    pub fn priority(&self) -> RoutePriority {
        match self.route_priority.as_deref() {
            Some("speed") => RoutePriority::Speed,
            Some("reliability") => RoutePriority::Reliability,
            _ => RoutePriority::Cost,
        }
    }
}
