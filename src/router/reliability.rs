// Protocol reliability tracker
// EWMA over observed initiation outcomes per protocol. A protocol keeps its
// static score until enough samples accumulate; after that the measured
// score overrides it in route selection.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::protocols::ProtocolId;

#[derive(Debug, Clone)]
struct ProtocolStats {
    /// EWMA of success (1.0) / failure (0.0) outcomes.
    success_ewma: f64,
    observations: u64,
}

impl ProtocolStats {
    fn new() -> Self {
        Self {
            success_ewma: 1.0,
            observations: 0,
        }
    }

    fn update(&mut self, success: bool, alpha: f64) {
        let observed = if success { 1.0 } else { 0.0 };
        if self.observations == 0 {
            self.success_ewma = observed;
        } else {
            self.success_ewma = alpha * observed + (1.0 - alpha) * self.success_ewma;
        }
        self.observations += 1;
    }
}

pub struct ReliabilityTracker {
    stats: Arc<RwLock<HashMap<ProtocolId, ProtocolStats>>>,
    /// EWMA smoothing factor.
    alpha: f64,
    /// Samples required before the measured score overrides the static one.
    min_observations: u64,
}

impl ReliabilityTracker {
    pub fn new(alpha: f64, min_observations: u64) -> Self {
        Self {
            stats: Arc::new(RwLock::new(HashMap::new())),
            alpha,
            min_observations,
        }
    }

    pub async fn record_outcome(&self, protocol: ProtocolId, success: bool) {
        let mut stats = self.stats.write().await;
        let entry = stats.entry(protocol).or_insert_with(ProtocolStats::new);
        entry.update(success, self.alpha);
        debug!(
            %protocol,
            success,
            ewma = entry.success_ewma,
            observations = entry.observations,
            "recorded protocol outcome"
        );
    }

    /// Measured 0-100 score, present only once enough samples exist.
    pub async fn score_override(&self, protocol: ProtocolId) -> Option<u8> {
        let stats = self.stats.read().await;
        let entry = stats.get(&protocol)?;
        if entry.observations < self.min_observations {
            return None;
        }
        Some((entry.success_ewma * 100.0).round().clamp(0.0, 100.0) as u8)
    }

    /// Selector input: measured overrides where available, indexed by tag.
    pub async fn overrides(&self) -> HashMap<String, u8> {
        let stats = self.stats.read().await;
        stats
            .iter()
            .filter(|(_, s)| s.observations >= self.min_observations)
            .map(|(id, s)| {
                (
                    id.as_str().to_string(),
                    (s.success_ewma * 100.0).round().clamp(0.0, 100.0) as u8,
                )
            })
            .collect()
    }

    pub async fn observation_count(&self, protocol: ProtocolId) -> u64 {
        let stats = self.stats.read().await;
        stats.get(&protocol).map(|s| s.observations).unwrap_or(0)
    }
}

impl Default for ReliabilityTracker {
    fn default() -> Self {
        Self::new(0.2, 5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_score_holds_until_enough_samples() {
        let tracker = ReliabilityTracker::new(0.2, 5);
        for _ in 0..4 {
            tracker.record_outcome(ProtocolId::Cctp, true).await;
        }
        assert_eq!(tracker.score_override(ProtocolId::Cctp).await, None);

        tracker.record_outcome(ProtocolId::Cctp, true).await;
        assert_eq!(tracker.score_override(ProtocolId::Cctp).await, Some(100));
    }

    #[tokio::test]
    async fn failures_pull_the_measured_score_down() {
        let tracker = ReliabilityTracker::new(0.5, 1);
        tracker.record_outcome(ProtocolId::Relay, true).await;
        tracker.record_outcome(ProtocolId::Relay, false).await;
        tracker.record_outcome(ProtocolId::Relay, false).await;

        let score = tracker.score_override(ProtocolId::Relay).await.unwrap();
        assert!(score < 50, "score was {score}");

        let overrides = tracker.overrides().await;
        assert_eq!(overrides.get("relay").copied(), Some(score));
        assert!(overrides.get("cctp").is_none());
    }
}
