// Bridge router and HTTP API
// The single entry point callers use instead of talking to engines
// directly: concurrent quote comparison, route selection, initiation with
// per-protocol fallback, and tracking-id status dispatch.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router as AxumRouter,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::control::{AdmissionControl, CircuitBreakers};
use crate::errors::BridgeError;
use crate::limits::{LimitSnapshot, NoLimits, SpendPolicy};
use crate::metrics;
use crate::protocols::{
    BridgeProtocol, BridgeQuote, BridgeRequest, BridgeStatus, ProtocolId, ProtocolPayload,
    TokenDescriptor,
};
use crate::router::reliability::ReliabilityTracker;
use crate::router::routes::{RouteComparison, RouteConstraints, RoutePriority, SelectedRoute};
use crate::router::selector;
use crate::router::tracking::TrackingId;
use crate::router::validation::{parse_recipient, Validator};
use crate::state::{TransferRecord, TransferStore};

/// Protocol-agnostic result of a successful bridge initiation.
#[derive(Debug, Clone, Serialize)]
pub struct UnifiedBridgeResult {
    pub tracking_id: String,
    pub protocol: ProtocolId,
    pub source_tx_hash: String,
    /// Raw units committed on the source chain.
    pub amount: String,
    pub fee_usd: f64,
    pub recipient: String,
    pub payload: ProtocolPayload,
    pub limits: Option<LimitSnapshot>,
}

pub struct BridgeRouter {
    source_chain: u64,
    adapters: Vec<Arc<dyn BridgeProtocol>>,
    validator: Validator,
    limits: Arc<dyn SpendPolicy>,
    store: TransferStore,
    reliability: Arc<ReliabilityTracker>,
    admission: AdmissionControl,
    breakers: CircuitBreakers,
    priority: RoutePriority,
    constraints: RouteConstraints,
}

impl BridgeRouter {
    pub fn new(source_chain: u64, adapters: Vec<Arc<dyn BridgeProtocol>>) -> Self {
        Self {
            source_chain,
            adapters,
            validator: Validator::default(),
            limits: Arc::new(NoLimits),
            store: TransferStore::default(),
            reliability: Arc::new(ReliabilityTracker::default()),
            admission: AdmissionControl::new(32),
            breakers: CircuitBreakers::new(),
            priority: RoutePriority::default(),
            constraints: RouteConstraints::default(),
        }
    }

    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_limits(mut self, limits: Arc<dyn SpendPolicy>) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_preferences(mut self, priority: RoutePriority, constraints: RouteConstraints) -> Self {
        self.priority = priority;
        self.constraints = constraints;
        self
    }

    pub fn with_max_inflight(mut self, max_inflight: usize) -> Self {
        self.admission = AdmissionControl::new(max_inflight);
        self
    }

    pub fn store(&self) -> &TransferStore {
        &self.store
    }

    pub fn reliability(&self) -> &Arc<ReliabilityTracker> {
        &self.reliability
    }

    fn adapter(&self, protocol: ProtocolId) -> Option<&Arc<dyn BridgeProtocol>> {
        self.adapters.iter().find(|a| a.info().id == protocol)
    }

    /// Static scores overlaid with measured overrides once those exist.
    async fn reliability_scores(&self) -> std::collections::HashMap<String, u8> {
        let mut scores: std::collections::HashMap<String, u8> = self
            .adapters
            .iter()
            .map(|a| (a.info().id.as_str().to_string(), a.reliability_score()))
            .collect();
        scores.extend(self.reliability.overrides().await);
        scores
    }

    /// Query every available, supporting adapter concurrently. One adapter's
    /// failure is isolated; the comparison errors only when zero quotes come
    /// back, enumerating which protocols were checked.
    pub async fn compare_routes(
        &self,
        req: &BridgeRequest,
    ) -> Result<RouteComparison, BridgeError> {
        let mut checked = Vec::new();
        let mut tasks = Vec::new();

        for adapter in &self.adapters {
            let id = adapter.info().id;
            checked.push(id.as_str().to_string());

            if !adapter.is_route_supported(
                self.source_chain,
                req.destination_chain,
                &req.token.symbol,
            ) {
                continue;
            }
            if self.breakers.is_open(id).await {
                warn!(%id, "protocol skipped: circuit open");
                continue;
            }
            if !adapter.is_available().await {
                continue;
            }

            let adapter = adapter.clone();
            let req = req.clone();
            tasks.push(async move {
                let started = Instant::now();
                let result = adapter.quote(&req).await;
                metrics::QUOTE_LATENCY
                    .with_label_values(&[id.as_str()])
                    .observe(started.elapsed().as_secs_f64());
                (id, result)
            });
        }

        // The one genuinely concurrent spot: total latency is bounded by the
        // slowest protocol, not the sum.
        let results = futures::future::join_all(tasks).await;

        let mut quotes = Vec::new();
        let mut failures = Vec::new();
        for (id, result) in results {
            match result {
                Ok(quote) => quotes.push(quote),
                Err(err) => {
                    warn!(%id, error = %err, "quote failed; excluded from comparison");
                    failures.push((id.as_str().to_string(), err.to_string()));
                }
            }
        }

        if quotes.is_empty() {
            return Err(BridgeError::NoRouteFound { checked });
        }
        Ok(RouteComparison { quotes, failures, checked })
    }

    /// Compare and pick, without initiating. None selection means the
    /// constraints filtered every quote out.
    pub async fn compare_and_select(
        &self,
        req: &BridgeRequest,
    ) -> Result<(RouteComparison, Option<SelectedRoute>), BridgeError> {
        let comparison = self.compare_routes(req).await?;
        let scores = self.reliability_scores().await;
        let selected =
            selector::select_route(&comparison.quotes, self.priority, &self.constraints, &scores);
        Ok((comparison, selected))
    }

    /// Validate, compare, select (or honor an explicit override), then
    /// initiate down the ranked list until a protocol succeeds.
    pub async fn bridge(&self, req: &BridgeRequest) -> Result<UnifiedBridgeResult, BridgeError> {
        let _permit = self.admission.acquire().await;

        self.validator.validate(req, self.source_chain)?;
        let limit_snapshot = self.limits.check_and_record(req).await?;

        let comparison = self.compare_routes(req).await?;
        let ranked: Vec<BridgeQuote> = match req.protocol {
            Some(preferred) => {
                let filtered: Vec<BridgeQuote> = comparison
                    .quotes
                    .iter()
                    .filter(|q| q.protocol == preferred)
                    .cloned()
                    .collect();
                if filtered.is_empty() {
                    return Err(BridgeError::NoRouteFound {
                        checked: vec![preferred.as_str().to_string()],
                    });
                }
                filtered
            }
            None => {
                let scores = self.reliability_scores().await;
                let ranked = selector::rank_quotes(
                    &comparison.quotes,
                    self.priority,
                    &self.constraints,
                    &scores,
                );
                if ranked.is_empty() {
                    return Err(BridgeError::NoRouteFound { checked: comparison.checked });
                }
                ranked
            }
        };

        let mut failures: Vec<(String, Box<BridgeError>)> = Vec::new();
        for quote in ranked {
            let Some(adapter) = self.adapter(quote.protocol) else {
                continue;
            };
            match adapter.initiate(req).await {
                Ok(init) => {
                    self.breakers.record_success(init.protocol).await;
                    self.reliability.record_outcome(init.protocol, true).await;
                    metrics::BRIDGE_ATTEMPTS
                        .with_label_values(&[init.protocol.as_str(), "ok"])
                        .inc();

                    let tracking = TrackingId::mint(
                        init.protocol,
                        self.source_chain,
                        req.destination_chain,
                    );
                    let tracking_id = tracking.to_string();
                    self.store
                        .insert(TransferRecord {
                            tracking_id: tracking_id.clone(),
                            protocol: init.protocol,
                            source_chain: self.source_chain,
                            dest_chain: req.destination_chain,
                            payload: init.payload.clone(),
                            phase: crate::protocols::BridgePhase::Pending,
                            created_at_ms: tracking.minted_at_ms,
                        })
                        .await;

                    info!(
                        %tracking_id,
                        protocol = %init.protocol,
                        tx = %init.source_tx,
                        "bridge initiated"
                    );
                    return Ok(UnifiedBridgeResult {
                        tracking_id,
                        protocol: init.protocol,
                        source_tx_hash: format!("{:#x}", init.source_tx),
                        amount: init.amount.to_string(),
                        fee_usd: init.fee_charged_usd,
                        recipient: format!("{:#x}", init.recipient),
                        payload: init.payload,
                        limits: limit_snapshot,
                    });
                }
                Err(err) => {
                    self.breakers.record_failure(quote.protocol).await;
                    self.reliability.record_outcome(quote.protocol, false).await;
                    metrics::BRIDGE_ATTEMPTS
                        .with_label_values(&[quote.protocol.as_str(), "err"])
                        .inc();
                    warn!(protocol = %quote.protocol, error = %err, "initiation failed");
                    // Each protocol's original error is preserved, never
                    // summarized away.
                    failures.push((quote.protocol.as_str().to_string(), Box::new(err)));
                }
            }
        }

        Err(BridgeError::AllRoutesFailed { failures })
    }

    /// Parse the identifier, recover the owning protocol, dispatch to its
    /// adapter, and keep the stored phase current.
    pub async fn status_by_tracking_id(&self, id: &str) -> Result<BridgeStatus, BridgeError> {
        let tracking: TrackingId = id.parse()?;
        let record = self
            .store
            .get(id)
            .await
            .ok_or_else(|| BridgeError::UnknownTransfer(id.to_string()))?;
        let adapter = self.adapter(tracking.protocol).ok_or_else(|| {
            BridgeError::NoRouteFound {
                checked: vec![tracking.protocol.as_str().to_string()],
            }
        })?;

        let status = adapter.status(&record.payload).await?;
        self.store.update_phase(id, status.phase).await;
        Ok(status)
    }

    /// Like status, but blocks through the owning protocol's bounded
    /// settlement wait.
    pub async fn wait_by_tracking_id(&self, id: &str) -> Result<BridgeStatus, BridgeError> {
        let tracking: TrackingId = id.parse()?;
        let record = self
            .store
            .get(id)
            .await
            .ok_or_else(|| BridgeError::UnknownTransfer(id.to_string()))?;
        let adapter = self.adapter(tracking.protocol).ok_or_else(|| {
            BridgeError::NoRouteFound {
                checked: vec![tracking.protocol.as_str().to_string()],
            }
        })?;

        let status = adapter.wait_for_settlement(&record.payload).await?;
        self.store.update_phase(id, status.phase).await;
        Ok(status)
    }
}

// ---------------------------------------------------------------------------
// HTTP API
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ApiBridgeRequest {
    pub amount: String,
    pub destination_chain: u64,
    pub recipient: Option<String>,
    pub protocol: Option<ProtocolId>,
}

impl ApiBridgeRequest {
    fn into_request(self) -> Result<BridgeRequest, BridgeError> {
        let recipient = self
            .recipient
            .as_deref()
            .map(parse_recipient)
            .transpose()?;
        Ok(BridgeRequest {
            token: TokenDescriptor::usdc(),
            amount: self.amount,
            destination_chain: self.destination_chain,
            recipient,
            protocol: self.protocol,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
    pub suggestion: String,
}

fn error_response(err: BridgeError) -> (StatusCode, Json<ErrorResponse>) {
    let status = if err.retryable() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::BAD_REQUEST
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
            retryable: err.retryable(),
            retry_after_secs: err.retry_after().map(|d| d.as_secs()),
            suggestion: err.suggestion().to_string(),
        }),
    )
}

#[derive(Debug, Serialize)]
pub struct QuoteResponse {
    pub quotes: Vec<BridgeQuote>,
    pub failures: Vec<(String, String)>,
    pub selected: Option<SelectedRoute>,
}

/// Create the HTTP router with API endpoints.
pub fn create_api_router(router: Arc<BridgeRouter>) -> AxumRouter {
    AxumRouter::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_endpoint))
        .route("/api/v1/quote", post(quote_routes))
        .route("/api/v1/bridge", post(execute_bridge))
        .route("/api/v1/status/:id", get(transfer_status))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::cors::CorsLayer::permissive())
        .with_state(router)
}

async fn health_check() -> StatusCode {
    StatusCode::OK
}

async fn metrics_endpoint() -> Result<String, (StatusCode, Json<ErrorResponse>)> {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let mut buf = Vec::new();
    encoder
        .encode(&prometheus::gather(), &mut buf)
        .map_err(|e| error_response(BridgeError::Transport(e.to_string())))?;
    String::from_utf8(buf).map_err(|e| error_response(BridgeError::Transport(e.to_string())))
}

async fn quote_routes(
    State(router): State<Arc<BridgeRouter>>,
    Json(api_req): Json<ApiBridgeRequest>,
) -> Result<Json<QuoteResponse>, (StatusCode, Json<ErrorResponse>)> {
    let req = api_req.into_request().map_err(error_response)?;
    let (comparison, selected) = router
        .compare_and_select(&req)
        .await
        .map_err(error_response)?;
    Ok(Json(QuoteResponse {
        quotes: comparison.quotes,
        failures: comparison.failures,
        selected,
    }))
}

async fn execute_bridge(
    State(router): State<Arc<BridgeRouter>>,
    Json(api_req): Json<ApiBridgeRequest>,
) -> Result<Json<UnifiedBridgeResult>, (StatusCode, Json<ErrorResponse>)> {
    let req = api_req.into_request().map_err(error_response)?;
    let result = router.bridge(&req).await.map_err(error_response)?;
    Ok(Json(result))
}

async fn transfer_status(
    State(router): State<Arc<BridgeRouter>>,
    Path(id): Path<String>,
) -> Result<Json<BridgeStatus>, (StatusCode, Json<ErrorResponse>)> {
    let status = router
        .status_by_tracking_id(&id)
        .await
        .map_err(error_response)?;
    Ok(Json(status))
}
