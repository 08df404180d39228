// Route types and comparison results
// Priorities, hard constraints, and the shapes the router hands back from
// quote comparison and route selection.

use serde::{Deserialize, Serialize};

use crate::protocols::BridgeQuote;

/// What the caller optimizes for. Remaining metrics only break exact ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutePriority {
    #[default]
    Cost,
    Speed,
    Reliability,
}

/// Hard constraints applied before scoring. Filtering down to zero
/// candidates is a normal outcome, not an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteConstraints {
    pub max_fee_usd: Option<f64>,
    pub max_time_minutes: Option<u64>,
    /// When non-empty, only these protocols are considered.
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl RouteConstraints {
    pub fn admits(&self, quote: &BridgeQuote, now_ms: u64) -> bool {
        if quote.is_expired(now_ms) {
            return false;
        }
        if let Some(max_fee) = self.max_fee_usd {
            if quote.fees.total_usd > max_fee {
                return false;
            }
        }
        if let Some(max_minutes) = self.max_time_minutes {
            if quote.eta.midpoint_seconds() > max_minutes * 60 {
                return false;
            }
        }
        let tag = quote.protocol.as_str();
        if !self.include.is_empty()
            && !self.include.iter().any(|p| p.eq_ignore_ascii_case(tag))
        {
            return false;
        }
        if self.exclude.iter().any(|p| p.eq_ignore_ascii_case(tag)) {
            return false;
        }
        true
    }
}

/// Outcome of querying every available adapter concurrently. A protocol that
/// failed to quote is listed with its error text instead of sinking the
/// whole comparison.
#[derive(Debug)]
pub struct RouteComparison {
    pub quotes: Vec<BridgeQuote>,
    pub failures: Vec<(String, String)>,
    /// Every protocol whose support/availability was evaluated.
    pub checked: Vec<String>,
}

/// Winning quote plus a human-readable recommendation.
#[derive(Debug, Clone, Serialize)]
pub struct SelectedRoute {
    pub quote: BridgeQuote,
    pub reason: String,
    /// Present when there was a runner-up to compare against.
    pub estimated_saving: Option<String>,
}
