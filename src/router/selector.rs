// Route selector
// Pure scoring and ranking over a set of quotes: filter by hard constraints,
// rank by the priority's primary metric, break exact ties deterministically
// (lowest fee, then fastest, then protocol name).

use std::cmp::Ordering;
use std::collections::HashMap;

use tracing::debug;

use crate::protocols::BridgeQuote;
use crate::router::routes::{RouteConstraints, RoutePriority, SelectedRoute};

/// Reliability assumed for a protocol with no supplied score.
pub const DEFAULT_RELIABILITY: u8 = 80;

fn reliability_of(quote: &BridgeQuote, scores: &HashMap<String, u8>) -> u8 {
    scores
        .get(quote.protocol.as_str())
        .copied()
        .unwrap_or(DEFAULT_RELIABILITY)
}

fn primary_metric(quote: &BridgeQuote, priority: RoutePriority, scores: &HashMap<String, u8>) -> f64 {
    match priority {
        RoutePriority::Cost => quote.fees.total_usd,
        RoutePriority::Speed => quote.eta.midpoint_seconds() as f64,
        // Lower is better for the sort, so invert.
        RoutePriority::Reliability => 100.0 - f64::from(reliability_of(quote, scores)),
    }
}

fn compare(
    a: &BridgeQuote,
    b: &BridgeQuote,
    priority: RoutePriority,
    scores: &HashMap<String, u8>,
) -> Ordering {
    primary_metric(a, priority, scores)
        .partial_cmp(&primary_metric(b, priority, scores))
        .unwrap_or(Ordering::Equal)
        .then_with(|| {
            a.fees
                .total_usd
                .partial_cmp(&b.fees.total_usd)
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| a.eta.midpoint_seconds().cmp(&b.eta.midpoint_seconds()))
        .then_with(|| a.protocol.as_str().cmp(b.protocol.as_str()))
}

/// Constraint-filter and rank quotes best-first. An empty result means no
/// eligible route, which is a normal outcome.
pub fn rank_quotes(
    quotes: &[BridgeQuote],
    priority: RoutePriority,
    constraints: &RouteConstraints,
    scores: &HashMap<String, u8>,
) -> Vec<BridgeQuote> {
    let now_ms = crate::now_unix_ms();
    let mut eligible: Vec<BridgeQuote> = quotes
        .iter()
        .filter(|q| constraints.admits(q, now_ms))
        .cloned()
        .collect();
    eligible.sort_by(|a, b| compare(a, b, priority, scores));
    debug!(
        candidates = quotes.len(),
        eligible = eligible.len(),
        ?priority,
        "ranked quotes"
    );
    eligible
}

/// Pick the best route and explain the choice. Returns None when constraint
/// filtering leaves nothing eligible.
pub fn select_route(
    quotes: &[BridgeQuote],
    priority: RoutePriority,
    constraints: &RouteConstraints,
    scores: &HashMap<String, u8>,
) -> Option<SelectedRoute> {
    let ranked = rank_quotes(quotes, priority, constraints, scores);
    let mut iter = ranked.into_iter();
    let winner = iter.next()?;
    let runner_up = iter.next();

    let reason = match priority {
        RoutePriority::Cost => format!(
            "lowest total fee (${:.2}) via {}",
            winner.fees.total_usd, winner.protocol
        ),
        RoutePriority::Speed => format!(
            "fastest settlement ({}) via {}",
            winner.eta.display, winner.protocol
        ),
        RoutePriority::Reliability => format!(
            "highest reliability ({}/100) via {}",
            reliability_of(&winner, scores),
            winner.protocol
        ),
    };

    let estimated_saving = runner_up.and_then(|second| match priority {
        RoutePriority::Cost | RoutePriority::Reliability => {
            let saved = second.fees.total_usd - winner.fees.total_usd;
            (saved > 0.005).then(|| format!("saves ${saved:.2} vs {}", second.protocol))
        }
        RoutePriority::Speed => {
            let saved_s = second
                .eta
                .midpoint_seconds()
                .saturating_sub(winner.eta.midpoint_seconds());
            (saved_s >= 60).then(|| format!("saves ~{} min vs {}", saved_s / 60, second.protocol))
        }
    });

    Some(SelectedRoute { quote: winner, reason, estimated_saving })
}
