// Protocol engines module
// This file defines the capability contract every bridging protocol engine
// implements, plus the request/quote/status types shared with the router.
// The router depends only on the BridgeProtocol trait, never on an engine.

pub mod cctp;
pub mod relay;
pub mod wire;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::BridgeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolId {
    Cctp,
    Relay,
}

impl ProtocolId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cctp => "cctp",
            Self::Relay => "relay",
        }
    }
}

impl fmt::Display for ProtocolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProtocolId {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cctp" => Ok(Self::Cctp),
            "relay" => Ok(Self::Relay),
            other => Err(BridgeError::InvalidTrackingId(format!(
                "unknown protocol tag {other:?}"
            ))),
        }
    }
}

/// Token descriptor carried inside a request. Per-chain contract addresses
/// because the "same" stablecoin is a different deployment on every chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenDescriptor {
    pub symbol: String,
    pub decimals: u8,
    pub addresses: HashMap<u64, Address>,
}

impl TokenDescriptor {
    /// The one protocol-supported asset, wired from the chain registry.
    pub fn usdc() -> Self {
        let addresses = crate::chains::CHAINS
            .iter()
            .map(|c| (c.chain_id, c.usdc))
            .collect();
        Self {
            symbol: "USDC".to_string(),
            decimals: 6,
            addresses,
        }
    }

    pub fn address_on(&self, chain_id: u64) -> Option<Address> {
        self.addresses.get(&chain_id).copied()
    }
}

/// Immutable input to every protocol call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeRequest {
    pub token: TokenDescriptor,
    /// Human decimal amount, e.g. "100" or "0.5".
    pub amount: String,
    pub destination_chain: u64,
    /// Defaults to the sender when absent.
    pub recipient: Option<Address>,
    /// Explicit protocol override; skips route selection when set.
    pub protocol: Option<ProtocolId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeBreakdown {
    pub protocol_fee_usd: f64,
    pub gas_fee_usd: f64,
    pub total_usd: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeEstimate {
    pub min_seconds: u64,
    pub max_seconds: u64,
    pub display: String,
}

impl TimeEstimate {
    pub fn new(min_seconds: u64, max_seconds: u64, display: &str) -> Self {
        Self {
            min_seconds,
            max_seconds,
            display: display.to_string(),
        }
    }

    /// Midpoint used as the speed metric during scoring.
    pub fn midpoint_seconds(&self) -> u64 {
        (self.min_seconds + self.max_seconds) / 2
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeQuote {
    pub protocol: ProtocolId,
    pub input_amount: U256,
    pub output_amount: U256,
    pub fees: FeeBreakdown,
    pub max_slippage_bps: u16,
    pub eta: TimeEstimate,
    pub route_description: String,
    /// Unix ms past which the provider stops honoring the quote. Attestation
    /// quotes never expire; relay quotes do.
    pub expires_at_ms: Option<u64>,
}

impl BridgeQuote {
    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.expires_at_ms.is_some_and(|at| now_ms >= at)
    }
}

/// Static capability info an engine declares to the router registry.
#[derive(Debug, Clone)]
pub struct ProtocolInfo {
    pub id: ProtocolId,
    pub supported_tokens: Vec<&'static str>,
    pub typical_time: TimeEstimate,
    pub charges_protocol_fee: bool,
    /// 0-100; overridden by the measured tracker once it has enough samples.
    pub base_reliability: u8,
}

/// Protocol-specific state needed to re-resolve an in-flight transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ProtocolPayload {
    Cctp {
        /// Raw wire message emitted by the burn; consumed unmodified by the
        /// mint on the destination chain.
        message: Vec<u8>,
        message_hash: B256,
        burn_tx: B256,
        nonce: u64,
    },
    Relay {
        deposit_tx: B256,
        destination_chain: u64,
    },
}

/// Protocol-agnostic transfer phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgePhase {
    Pending,
    AttestationPending,
    AttestationReady,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeStatus {
    pub phase: BridgePhase,
    pub message: String,
    /// 0-100.
    pub progress: u8,
    /// Attestation bytes or fill transaction, when known.
    pub proof: Option<String>,
    pub error: Option<String>,
}

impl BridgeStatus {
    pub fn new(phase: BridgePhase, message: impl Into<String>, progress: u8) -> Self {
        Self {
            phase,
            message: message.into(),
            progress,
            proof: None,
            error: None,
        }
    }

    pub fn with_proof(mut self, proof: impl Into<String>) -> Self {
        self.proof = Some(proof.into());
        self
    }
}

/// What an engine hands back after a successful initiation.
#[derive(Debug, Clone)]
pub struct BridgeInitiation {
    pub protocol: ProtocolId,
    pub source_tx: B256,
    /// Raw units actually committed on the source chain.
    pub amount: U256,
    pub fee_charged_usd: f64,
    pub recipient: Address,
    pub payload: ProtocolPayload,
}

/// Capability contract between the router and every protocol engine.
#[async_trait]
pub trait BridgeProtocol: Send + Sync {
    fn info(&self) -> &ProtocolInfo;

    fn supported_chains(&self) -> Vec<u64>;

    /// True only when both chains are configured for this protocol, they
    /// differ, and the token is supported (case-insensitive symbol match).
    fn is_route_supported(&self, source: u64, dest: u64, token: &str) -> bool;

    async fn is_available(&self) -> bool;

    async fn quote(&self, req: &BridgeRequest) -> Result<BridgeQuote, BridgeError>;

    async fn estimate_fees(&self, req: &BridgeRequest) -> Result<FeeBreakdown, BridgeError>;

    async fn initiate(&self, req: &BridgeRequest) -> Result<BridgeInitiation, BridgeError>;

    /// One status probe; never blocks beyond a single network read.
    async fn status(&self, payload: &ProtocolPayload) -> Result<BridgeStatus, BridgeError>;

    /// Bounded poll loop until the protocol's settlement signal arrives.
    async fn wait_for_settlement(
        &self,
        payload: &ProtocolPayload,
    ) -> Result<BridgeStatus, BridgeError>;

    fn reliability_score(&self) -> u8;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_tags_round_trip_lowercase() {
        for id in [ProtocolId::Cctp, ProtocolId::Relay] {
            assert_eq!(id.as_str().parse::<ProtocolId>().unwrap(), id);
            assert_eq!(id.to_string(), id.as_str());
        }
        assert!("CCTP".parse::<ProtocolId>().is_err());
        assert!("hop".parse::<ProtocolId>().is_err());
    }

    #[test]
    fn usdc_descriptor_covers_the_registry() {
        let usdc = TokenDescriptor::usdc();
        assert_eq!(usdc.decimals, 6);
        for chain in crate::chains::CHAINS {
            assert_eq!(usdc.address_on(chain.chain_id), Some(chain.usdc));
        }
        assert!(usdc.address_on(999_999).is_none());
    }

    #[test]
    fn quote_expiry_checks_against_now() {
        let mut quote = BridgeQuote {
            protocol: ProtocolId::Relay,
            input_amount: U256::from(1u64),
            output_amount: U256::from(1u64),
            fees: FeeBreakdown { protocol_fee_usd: 0.0, gas_fee_usd: 0.0, total_usd: 0.0 },
            max_slippage_bps: 0,
            eta: TimeEstimate::new(30, 120, "1-2 minutes"),
            route_description: String::new(),
            expires_at_ms: Some(1_000),
        };
        assert!(!quote.is_expired(999));
        assert!(quote.is_expired(1_000));
        quote.expires_at_ms = None;
        assert!(!quote.is_expired(u64::MAX));
    }
}
