// Error types and error handling module
// This file defines the bridge error taxonomy and the retry metadata
// callers use to build automatic retry policies

use std::time::Duration;

use thiserror::Error;

/// Fixed retry hint attached to an all-routes-failed aggregate. The source
/// system shipped this as a constant regardless of which protocols failed;
/// preserved as-is rather than tuned.
pub const ALL_ROUTES_RETRY_AFTER: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum BridgeError {
    // -- route errors --
    #[error("unsupported route: {source_chain} -> {dest_chain} for {token}")]
    UnsupportedRoute {
        source_chain: u64,
        dest_chain: u64,
        token: String,
    },
    #[error("source and destination are the same chain ({chain})")]
    SameChain { chain: u64 },
    #[error("no route found; protocols checked: {}", .checked.join(", "))]
    NoRouteFound { checked: Vec<String> },
    #[error("all routes failed: {}", format_failures(.failures))]
    AllRoutesFailed {
        failures: Vec<(String, Box<BridgeError>)>,
    },

    // -- funds / initiation errors --
    #[error("insufficient funds: need {needed} raw units, have {available}")]
    InsufficientFunds { needed: String, available: String },
    #[error("approval failed: {0}")]
    Approval(String),
    #[error("burn submission failed: {0}")]
    Burn(String),
    #[error("deposit submission failed: {0}")]
    Deposit(String),
    #[error("burn event missing from receipt of {tx}")]
    BurnEventMissing { tx: String },
    #[error("deposit event missing from receipt of {tx}")]
    DepositEventMissing { tx: String },

    // -- attestation / settlement-wait errors --
    #[error("attestation service error (http {status}): {message}")]
    AttestationApi { status: u16, message: String },
    #[error("attestation not ready after {}s", .waited.as_secs())]
    AttestationTimeout { waited: Duration },

    // -- completion errors --
    #[error("message destined for domain {message_domain}, but completion attempted on domain {chain_domain}")]
    DomainMismatch {
        message_domain: u32,
        chain_domain: u32,
    },
    #[error("nonce {nonce} already consumed on the destination chain")]
    NonceAlreadyUsed { nonce: u64 },
    #[error("completion failed: {0}")]
    Completion(String),

    // -- wire format errors --
    #[error("message too short: got {length} bytes, need at least {expected}")]
    MessageTooShort { length: usize, expected: usize },

    // -- limit / validation errors --
    #[error("destination chain {chain} not allowed; allowed: {allowed:?}")]
    DestinationNotAllowed { chain: u64, allowed: Vec<u64> },
    #[error("recipient is not a valid address: {address}")]
    InvalidRecipient { address: String },
    #[error("amount exceeds per-transaction limit of {limit_usd} USD")]
    TransactionLimitExceeded { limit_usd: f64 },
    #[error("daily spending limit reached; resets at {resets_at_ms} (unix ms)")]
    DailyLimitExceeded { resets_at_ms: u64 },

    // -- tracking / lookup errors --
    #[error("chain {chain_id} is not a configured domain")]
    UnknownChain { chain_id: u64 },
    #[error("malformed tracking identifier: {0}")]
    InvalidTrackingId(String),
    #[error("no transfer known for tracking identifier {0}")]
    UnknownTransfer(String),

    // -- amount / input errors --
    #[error("invalid amount {amount:?}: {reason}")]
    InvalidAmount { amount: String, reason: String },

    // -- collaborator errors --
    #[error("quote expired for {protocol}")]
    QuoteExpired { protocol: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("rpc error: {0}")]
    Rpc(String),
}

impl BridgeError {
    /// Whether an automatic retry of the same call can reasonably succeed.
    pub fn retryable(&self) -> bool {
        match self {
            Self::AllRoutesFailed { .. }
            | Self::Approval(_)
            | Self::Burn(_)
            | Self::Deposit(_)
            | Self::AttestationApi { .. }
            | Self::AttestationTimeout { .. }
            | Self::Completion(_)
            | Self::DailyLimitExceeded { .. }
            | Self::QuoteExpired { .. }
            | Self::Transport(_)
            | Self::Rpc(_) => true,
            Self::UnsupportedRoute { .. }
            | Self::SameChain { .. }
            | Self::NoRouteFound { .. }
            | Self::InsufficientFunds { .. }
            | Self::BurnEventMissing { .. }
            | Self::DepositEventMissing { .. }
            | Self::DomainMismatch { .. }
            | Self::NonceAlreadyUsed { .. }
            | Self::MessageTooShort { .. }
            | Self::DestinationNotAllowed { .. }
            | Self::InvalidRecipient { .. }
            | Self::TransactionLimitExceeded { .. }
            | Self::UnknownChain { .. }
            | Self::InvalidTrackingId(_)
            | Self::UnknownTransfer(_)
            | Self::InvalidAmount { .. } => false,
        }
    }

    /// Optional hint for when a retry becomes worthwhile.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::AllRoutesFailed { .. } => Some(ALL_ROUTES_RETRY_AFTER),
            Self::DailyLimitExceeded { resets_at_ms } => {
                let now = crate::now_unix_ms();
                Some(Duration::from_millis(resets_at_ms.saturating_sub(now)))
            }
            _ => None,
        }
    }

    /// One-line actionable suggestion surfaced next to the machine-readable kind.
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::UnsupportedRoute { .. } => {
                "pick a chain pair and token supported by at least one protocol"
            }
            Self::SameChain { .. } => "choose a destination chain different from the source",
            Self::NoRouteFound { .. } => "relax constraints or try again once a protocol is back up",
            Self::AllRoutesFailed { .. } => {
                "wait ~30s and retry; per-protocol outages are usually transient"
            }
            Self::InsufficientFunds { .. } => "top up the source-chain balance or reduce the amount",
            Self::Approval(_) => "retry; the approval hit transient network or gas conditions",
            Self::Burn(_) | Self::Deposit(_) => "retry the initiation; funds were not moved",
            Self::BurnEventMissing { .. } | Self::DepositEventMissing { .. } => {
                "inspect the transaction on an explorer; contract addresses may be misconfigured"
            }
            Self::AttestationApi { .. } => "retry; the attestation service returned a transient error",
            Self::AttestationTimeout { .. } => {
                "resume waiting with the saved tracking identifier; the transfer is not lost"
            }
            Self::DomainMismatch { .. } => "complete on the chain the message was destined for",
            Self::NonceAlreadyUsed { .. } => "this transfer was already completed; do not resubmit",
            Self::Completion(_) => "retry completion; the mint transaction can be resubmitted safely",
            Self::MessageTooShort { .. } => {
                "the message bytes are truncated; re-fetch them from the burn receipt"
            }
            Self::DestinationNotAllowed { .. } => "add the chain to the allow-list or pick an allowed one",
            Self::InvalidRecipient { .. } => "provide a 0x-prefixed 20-byte hex address",
            Self::TransactionLimitExceeded { .. } => "split the transfer or raise the per-transaction limit",
            Self::DailyLimitExceeded { .. } => "retry after the daily window resets",
            Self::UnknownChain { .. } => "use a chain id present in the static chain registry",
            Self::InvalidTrackingId(_) => "use the identifier exactly as returned by bridge()",
            Self::UnknownTransfer(_) => "the transfer was initiated elsewhere; query the owning instance",
            Self::InvalidAmount { .. } => "use a decimal amount within the token's precision",
            Self::QuoteExpired { .. } => "request a fresh quote and retry",
            Self::Transport(_) | Self::Rpc(_) => "check endpoint connectivity and retry",
        }
    }
}

fn format_failures(failures: &[(String, Box<BridgeError>)]) -> String {
    failures
        .iter()
        .map(|(proto, err)| format!("{proto}: {err}"))
        .collect::<Vec<_>>()
        .join("; ")
}
