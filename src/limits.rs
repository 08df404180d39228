// Spending-limits collaborator interface
// The policy engine that authorizes amounts and destinations lives outside
// this crate; the router only needs a check-and-record call and its error
// kinds (transaction limit, daily limit).

use async_trait::async_trait;

use crate::errors::BridgeError;
use crate::protocols::BridgeRequest;

/// What remains spendable after a check-and-record, echoed back to callers.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct LimitSnapshot {
    pub remaining_today_usd: f64,
    pub daily_limit_usd: f64,
}

#[async_trait]
pub trait SpendPolicy: Send + Sync {
    /// Authorize and record a spend keyed by token, amount, and destination
    /// chain. Rejections surface as TransactionLimitExceeded,
    /// DailyLimitExceeded, or DestinationNotAllowed.
    async fn check_and_record(&self, req: &BridgeRequest)
        -> Result<Option<LimitSnapshot>, BridgeError>;
}

/// Pass-through policy for deployments without a limits engine wired in.
pub struct NoLimits;

#[async_trait]
impl SpendPolicy for NoLimits {
    async fn check_and_record(
        &self,
        _req: &BridgeRequest,
    ) -> Result<Option<LimitSnapshot>, BridgeError> {
        Ok(None)
    }
}
