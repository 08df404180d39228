// Intent/relay protocol engine
// The user deposits on the source chain and an independent relayer fronts
// the funds on the destination chain; settlement is observed via the fill,
// not a notarized message. Quotes come from the relay network and expire.

use std::sync::Arc;
use std::time::{Duration, Instant};

use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::{SolCall, SolEvent};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::amount::{approx_f64, parse_stablecoin_amount};
use crate::bindings::{IRelayPool, IERC20};
use crate::chains::{self, ChainInfo};
use crate::errors::BridgeError;
use crate::metrics;
use crate::protocols::{
    BridgeInitiation, BridgePhase, BridgeProtocol, BridgeQuote, BridgeRequest, BridgeStatus,
    FeeBreakdown, ProtocolId, ProtocolInfo, ProtocolPayload, TimeEstimate,
};
use crate::transport::relay::{FillPoll, RelayApi, RelayFee, RelayQuoteResponse};
use crate::transport::{decode_uint_word, ChainRpc, TxRequest};

const SUPPORTED_TOKEN: &str = "USDC";

/// Cache lives shorter than the provider's ~60s quote expiry so a cached
/// quote is never served after the provider would reject it.
const QUOTE_CACHE_TTL: Duration = Duration::from_secs(30);

const DEPOSIT_GAS_UNITS: u64 = 140_000;
/// Used when the live gas price cannot be fetched; a quote is still produced.
const FALLBACK_GAS_PRICE_WEI: u64 = 20_000_000_000;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(10 * 60);

/// Exact request shape a cached quote is keyed on.
#[derive(Debug, Clone, PartialEq, Eq)]
struct QuoteKey {
    token: String,
    amount: U256,
    destination_chain: u64,
    recipient: Address,
}

struct QuoteCacheEntry {
    key: QuoteKey,
    response: RelayQuoteResponse,
    fetched_at: Instant,
}

impl QuoteCacheEntry {
    fn is_fresh(&self, key: &QuoteKey, now: Instant) -> bool {
        self.key == *key && now.duration_since(self.fetched_at) < QUOTE_CACHE_TTL
    }
}

pub struct RelayEngine {
    info: ProtocolInfo,
    source_chain: u64,
    sender: Address,
    rpc: Arc<dyn ChainRpc>,
    api: RelayApi,
    /// USD price of the network's wrapped native asset, for fee conversion.
    wrapped_native_price_usd: f64,
    poll_interval: Duration,
    max_wait: Duration,
    /// Single-slot cache; hit and fetch-and-store are mutually exclusive
    /// because the lock is held across the fetch.
    cache: Mutex<Option<QuoteCacheEntry>>,
}

impl RelayEngine {
    pub fn new(
        source_chain: u64,
        sender: Address,
        rpc: Arc<dyn ChainRpc>,
        api: RelayApi,
        wrapped_native_price_usd: f64,
    ) -> Self {
        Self {
            info: ProtocolInfo {
                id: ProtocolId::Relay,
                supported_tokens: vec![SUPPORTED_TOKEN],
                typical_time: TimeEstimate::new(30, 120, "1-2 minutes"),
                charges_protocol_fee: true,
                base_reliability: 88,
            },
            source_chain,
            sender,
            rpc,
            api,
            wrapped_native_price_usd,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_wait: DEFAULT_MAX_WAIT,
            cache: Mutex::new(None),
        }
    }

    pub fn with_polling(mut self, interval: Duration, max_wait: Duration) -> Self {
        self.poll_interval = interval;
        self.max_wait = max_wait;
        self
    }

    fn check_route(
        &self,
        dest_chain: u64,
        token: &str,
    ) -> Result<(&'static ChainInfo, &'static ChainInfo), BridgeError> {
        if self.source_chain == dest_chain {
            return Err(BridgeError::SameChain { chain: dest_chain });
        }
        let unsupported = || BridgeError::UnsupportedRoute {
            source_chain: self.source_chain,
            dest_chain,
            token: token.to_string(),
        };
        if !token.eq_ignore_ascii_case(SUPPORTED_TOKEN) {
            return Err(unsupported());
        }
        if !chains::relay_supported(self.source_chain) || !chains::relay_supported(dest_chain) {
            return Err(unsupported());
        }
        let source = chains::by_chain_id(self.source_chain).ok_or_else(unsupported)?;
        let dest = chains::by_chain_id(dest_chain).ok_or_else(unsupported)?;
        Ok((source, dest))
    }

    /// USD value of a fee leg. Stablecoins are 1:1, the wrapped native asset
    /// converts via the configured price, and anything else contributes zero
    /// rather than failing the whole quote.
    fn fee_to_usd(&self, fee: &RelayFee, token_decimals: u8) -> f64 {
        let raw: U256 = match fee.total.parse() {
            Ok(v) => v,
            Err(_) => return 0.0,
        };
        match fee.asset.to_ascii_uppercase().as_str() {
            "USDC" | "USDT" | "DAI" => approx_f64(raw) / 10f64.powi(token_decimals as i32),
            "WETH" | "WAVAX" | "WPOL" => {
                approx_f64(raw) / 1e18 * self.wrapped_native_price_usd
            }
            other => {
                debug!(asset = other, "no configured price; fee leg valued at zero");
                0.0
            }
        }
    }

    /// Fixed gas-unit estimate times the live gas price, with a hard-coded
    /// fallback price so a quote is still produced when the fetch fails.
    async fn gas_fee_usd(&self) -> f64 {
        let gas_price = match self.rpc.gas_price().await {
            Ok(price) => price,
            Err(err) => {
                warn!(error = %err, "gas price fetch failed; using fallback");
                U256::from(FALLBACK_GAS_PRICE_WEI)
            }
        };
        let wei = gas_price.saturating_mul(U256::from(DEPOSIT_GAS_UNITS));
        approx_f64(wei) / 1e18 * self.wrapped_native_price_usd
    }

    /// Cache hit within TTL returns the stored response; otherwise fetch and
    /// store. Staleness eviction is explicit, not implicit in the read path.
    async fn get_or_fetch_quote(
        &self,
        key: QuoteKey,
        token_address: Address,
    ) -> Result<RelayQuoteResponse, BridgeError> {
        let mut slot = self.cache.lock().await;
        let now = Instant::now();

        if let Some(entry) = slot.as_ref() {
            if entry.is_fresh(&key, now) {
                debug!("relay quote served from cache");
                return Ok(entry.response.clone());
            }
            *slot = None;
        }

        let response = self
            .api
            .fetch_quote(
                token_address,
                key.amount,
                self.source_chain,
                key.destination_chain,
                key.recipient,
            )
            .await?;
        *slot = Some(QuoteCacheEntry {
            key,
            response: response.clone(),
            fetched_at: now,
        });
        Ok(response)
    }

    async fn build_quote(&self, req: &BridgeRequest) -> Result<BridgeQuote, BridgeError> {
        let (source, _dest) = self.check_route(req.destination_chain, &req.token.symbol)?;
        let amount = parse_stablecoin_amount(&req.amount, req.token.decimals)?;
        let recipient = req.recipient.unwrap_or(self.sender);
        let token_address = req
            .token
            .address_on(self.source_chain)
            .unwrap_or(source.usdc);

        let key = QuoteKey {
            token: req.token.symbol.to_ascii_uppercase(),
            amount,
            destination_chain: req.destination_chain,
            recipient,
        };
        let response = self.get_or_fetch_quote(key, token_address).await?;

        let mut protocol_fee_usd = self.fee_to_usd(&response.relay_fee, req.token.decimals);
        if let Some(lp_fee) = &response.lp_fee {
            protocol_fee_usd += self.fee_to_usd(lp_fee, req.token.decimals);
        }
        let gas_fee_usd = self.gas_fee_usd().await;

        let output_amount: U256 = response
            .output_amount
            .parse()
            .map_err(|_| BridgeError::Transport("relay quote output amount not a number".into()))?;

        let fill_secs = response.estimated_fill_time_sec.max(15);
        Ok(BridgeQuote {
            protocol: ProtocolId::Relay,
            input_amount: amount,
            output_amount,
            fees: FeeBreakdown {
                protocol_fee_usd,
                gas_fee_usd,
                total_usd: protocol_fee_usd + gas_fee_usd,
            },
            max_slippage_bps: 10,
            eta: TimeEstimate::new(
                fill_secs / 2,
                fill_secs * 2,
                &format!("~{fill_secs} seconds"),
            ),
            route_description: format!(
                "deposit on chain {} -> relayer fill on chain {}",
                self.source_chain, req.destination_chain
            ),
            expires_at_ms: Some(crate::now_unix_ms() + response.quote_expiry_sec * 1_000),
        })
    }

    /// Poll the fill status instead of an attestation service; completion is
    /// relayer-performed.
    pub async fn wait_for_fill(&self, deposit_tx: B256) -> Result<String, BridgeError> {
        let started = Instant::now();
        loop {
            match self.api.fill_status(deposit_tx).await? {
                FillPoll::Filled { fill_tx } => {
                    metrics::ATTESTATION_WAIT
                        .with_label_values(&[ProtocolId::Relay.as_str()])
                        .observe(started.elapsed().as_secs_f64());
                    info!(deposit = %format!("{deposit_tx:#x}"), %fill_tx, "relayer fill observed");
                    return Ok(fill_tx);
                }
                FillPoll::Pending => {
                    let waited = started.elapsed();
                    if waited >= self.max_wait {
                        return Err(BridgeError::AttestationTimeout { waited });
                    }
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }

    fn payload_deposit(payload: &ProtocolPayload) -> Result<B256, BridgeError> {
        match payload {
            ProtocolPayload::Relay { deposit_tx, .. } => Ok(*deposit_tx),
            ProtocolPayload::Cctp { .. } => Err(BridgeError::Rpc(
                "attestation payload handed to the relay engine".into(),
            )),
        }
    }
}

#[async_trait]
impl BridgeProtocol for RelayEngine {
    fn info(&self) -> &ProtocolInfo {
        &self.info
    }

    fn supported_chains(&self) -> Vec<u64> {
        chains::CHAINS
            .iter()
            .filter(|c| chains::relay_supported(c.chain_id))
            .map(|c| c.chain_id)
            .collect()
    }

    fn is_route_supported(&self, source: u64, dest: u64, token: &str) -> bool {
        source != dest
            && token.eq_ignore_ascii_case(SUPPORTED_TOKEN)
            && chains::relay_supported(source)
            && chains::relay_supported(dest)
    }

    async fn is_available(&self) -> bool {
        chains::relay_supported(self.source_chain)
    }

    async fn quote(&self, req: &BridgeRequest) -> Result<BridgeQuote, BridgeError> {
        self.build_quote(req).await
    }

    async fn estimate_fees(&self, req: &BridgeRequest) -> Result<FeeBreakdown, BridgeError> {
        self.build_quote(req).await.map(|q| q.fees)
    }

    async fn initiate(&self, req: &BridgeRequest) -> Result<BridgeInitiation, BridgeError> {
        let (source, _dest) = self.check_route(req.destination_chain, &req.token.symbol)?;
        let amount = parse_stablecoin_amount(&req.amount, req.token.decimals)?;
        let recipient = req.recipient.unwrap_or(self.sender);
        let quote = self.build_quote(req).await?;

        let balance = decode_uint_word(
            &self
                .rpc
                .call(
                    source.usdc,
                    IERC20::balanceOfCall { owner: self.sender }.abi_encode(),
                )
                .await?,
        )?;
        if balance < amount {
            return Err(BridgeError::InsufficientFunds {
                needed: amount.to_string(),
                available: balance.to_string(),
            });
        }

        let allowance = decode_uint_word(
            &self
                .rpc
                .call(
                    source.usdc,
                    IERC20::allowanceCall {
                        owner: self.sender,
                        spender: source.relay_pool,
                    }
                    .abi_encode(),
                )
                .await?,
        )?;
        if allowance < amount {
            let tx = self
                .rpc
                .send_transaction(TxRequest {
                    to: source.usdc,
                    data: IERC20::approveCall {
                        spender: source.relay_pool,
                        amount,
                    }
                    .abi_encode(),
                    value: U256::ZERO,
                })
                .await
                .map_err(|e| BridgeError::Approval(e.to_string()))?;
            let receipt = self.rpc.wait_for_receipt(tx).await?;
            if !receipt.status {
                return Err(BridgeError::Approval(format!(
                    "approval transaction {tx:#x} reverted"
                )));
            }
        }

        let data = IRelayPool::depositForCall {
            recipient,
            token: source.usdc,
            amount,
            destinationChainId: U256::from(req.destination_chain),
        }
        .abi_encode();
        let deposit_tx = self
            .rpc
            .send_transaction(TxRequest {
                to: source.relay_pool,
                data,
                value: U256::ZERO,
            })
            .await
            .map_err(|e| BridgeError::Deposit(e.to_string()))?;
        let receipt = self.rpc.wait_for_receipt(deposit_tx).await?;
        if !receipt.status {
            return Err(BridgeError::Deposit(format!(
                "deposit transaction {deposit_tx:#x} reverted"
            )));
        }

        let deposited = receipt.logs.iter().any(|log| {
            log.topics.first() == Some(&IRelayPool::FundsDeposited::SIGNATURE_HASH)
        });
        if !deposited {
            return Err(BridgeError::DepositEventMissing {
                tx: format!("{deposit_tx:#x}"),
            });
        }

        info!(deposit = %format!("{deposit_tx:#x}"), "deposit confirmed");
        Ok(BridgeInitiation {
            protocol: ProtocolId::Relay,
            source_tx: deposit_tx,
            amount,
            fee_charged_usd: quote.fees.total_usd,
            recipient,
            payload: ProtocolPayload::Relay {
                deposit_tx,
                destination_chain: req.destination_chain,
            },
        })
    }

    async fn status(&self, payload: &ProtocolPayload) -> Result<BridgeStatus, BridgeError> {
        let deposit_tx = Self::payload_deposit(payload)?;
        Ok(match self.api.fill_status(deposit_tx).await? {
            FillPoll::Pending => BridgeStatus::new(
                BridgePhase::Pending,
                "deposit confirmed; waiting for a relayer fill",
                40,
            ),
            FillPoll::Filled { fill_tx } => BridgeStatus::new(
                BridgePhase::Completed,
                "relayer fill confirmed on the destination chain",
                100,
            )
            .with_proof(fill_tx),
        })
    }

    async fn wait_for_settlement(
        &self,
        payload: &ProtocolPayload,
    ) -> Result<BridgeStatus, BridgeError> {
        let deposit_tx = Self::payload_deposit(payload)?;
        let fill_tx = self.wait_for_fill(deposit_tx).await?;
        Ok(BridgeStatus::new(
            BridgePhase::Completed,
            "relayer fill confirmed on the destination chain",
            100,
        )
        .with_proof(fill_tx))
    }

    fn reliability_score(&self) -> u8 {
        self.info.base_reliability
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocols::TokenDescriptor;
    use crate::test_support::MockRpc;
    use alloy_primitives::address;
    use httpmock::prelude::*;

    fn sender() -> Address {
        address!("1111111111111111111111111111111111111111")
    }

    fn quote_body(relay_fee_total: &str, fee_asset: &str) -> serde_json::Value {
        serde_json::json!({
            "relayFee": {"asset": fee_asset, "total": relay_fee_total},
            "lpFee": {"asset": "USDC", "total": "20000"},
            "estimatedFillTimeSec": 60,
            "quoteExpirySec": 60,
            "outputAmount": "99880000"
        })
    }

    fn engine_with(server: &MockServer, rpc: Arc<MockRpc>) -> RelayEngine {
        RelayEngine::new(
            1,
            sender(),
            rpc,
            RelayApi::new(server.base_url().parse().unwrap()),
            3_000.0,
        )
        .with_polling(Duration::from_millis(10), Duration::from_millis(100))
    }

    fn usdc_request(dest: u64) -> BridgeRequest {
        BridgeRequest {
            token: TokenDescriptor::usdc(),
            amount: "100".into(),
            destination_chain: dest,
            recipient: Some(sender()),
            protocol: None,
        }
    }

    #[test]
    fn route_support_requires_relay_pools_on_both_ends() {
        let server = MockServer::start();
        let engine = engine_with(&server, Arc::new(MockRpc::new(1, sender())));
        assert!(engine.is_route_supported(1, 42161, "usdc"));
        assert!(!engine.is_route_supported(1, 1, "USDC"));
        // Avalanche has no relay pool configured.
        assert!(!engine.is_route_supported(1, 43114, "USDC"));
        assert!(!engine.is_route_supported(1, 42161, "WETH"));
    }

    #[tokio::test]
    async fn stablecoin_fees_are_dollar_for_dollar() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/quote");
            then.status(200).json_body(quote_body("100000", "USDC"));
        });
        let engine = engine_with(&server, Arc::new(MockRpc::new(1, sender())));

        let quote = engine.quote(&usdc_request(42161)).await.unwrap();
        // 0.10 relay fee + 0.02 lp fee, both USDC at 6 decimals.
        assert!((quote.fees.protocol_fee_usd - 0.12).abs() < 1e-9);
        assert!(quote.expires_at_ms.is_some());
        assert_eq!(quote.output_amount, U256::from(99_880_000u64));
    }

    #[tokio::test]
    async fn wrapped_native_fee_uses_configured_price() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/quote");
            // 0.001 WETH at $3000 = $3, lp fee 0.02 USDC.
            then.status(200)
                .json_body(quote_body("1000000000000000", "WETH"));
        });
        let engine = engine_with(&server, Arc::new(MockRpc::new(1, sender())));

        let quote = engine.quote(&usdc_request(42161)).await.unwrap();
        assert!((quote.fees.protocol_fee_usd - 3.02).abs() < 1e-9);
    }

    #[tokio::test]
    async fn unknown_fee_asset_contributes_zero() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/quote");
            then.status(200).json_body(quote_body("123456789", "BONK"));
        });
        let engine = engine_with(&server, Arc::new(MockRpc::new(1, sender())));

        let quote = engine.quote(&usdc_request(42161)).await.unwrap();
        // Only the 0.02 USDC lp fee survives.
        assert!((quote.fees.protocol_fee_usd - 0.02).abs() < 1e-9);
    }

    #[tokio::test]
    async fn gas_price_failure_falls_back_and_still_quotes() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/quote");
            then.status(200).json_body(quote_body("100000", "USDC"));
        });
        let mut rpc = MockRpc::new(1, sender());
        rpc.gas_price_fails = true;
        let engine = engine_with(&server, Arc::new(rpc));

        let quote = engine.quote(&usdc_request(42161)).await.unwrap();
        // 140k gas at the 20 gwei fallback, native at $3000.
        let expected = 140_000f64 * 20e9 / 1e18 * 3_000.0;
        assert!((quote.fees.gas_fee_usd - expected).abs() < 1e-9);
    }

    #[tokio::test]
    async fn identical_requests_hit_the_cache() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/quote");
            then.status(200).json_body(quote_body("100000", "USDC"));
        });
        let engine = engine_with(&server, Arc::new(MockRpc::new(1, sender())));

        engine.quote(&usdc_request(42161)).await.unwrap();
        engine.quote(&usdc_request(42161)).await.unwrap();
        assert_eq!(mock.hits(), 1, "second quote served from cache");

        // A different request shape misses.
        engine.quote(&usdc_request(8453)).await.unwrap();
        assert_eq!(mock.hits(), 2);
    }

    #[tokio::test]
    async fn initiate_deposits_after_approval_and_returns_payload() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/quote");
            then.status(200).json_body(quote_body("100000", "USDC"));
        });
        let rpc = MockRpc::new(1, sender());
        let source = chains::by_chain_id(1).unwrap();
        rpc.set_balance(source.usdc, sender(), U256::from(1_000_000_000u64));
        let rpc = Arc::new(rpc);
        let engine = engine_with(&server, rpc.clone());

        let result = engine.initiate(&usdc_request(42161)).await.unwrap();
        assert_eq!(result.protocol, ProtocolId::Relay);
        assert!(matches!(
            result.payload,
            ProtocolPayload::Relay { destination_chain: 42161, .. }
        ));

        let sent = rpc.sent_transactions();
        assert_eq!(sent.len(), 2, "approval then deposit");
        assert_eq!(&sent[0].data[..4], IERC20::approveCall::SELECTOR.as_slice());
        assert_eq!(
            &sent[1].data[..4],
            IRelayPool::depositForCall::SELECTOR.as_slice()
        );
    }

    #[tokio::test]
    async fn wait_for_fill_times_out_as_retryable() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path_contains("/fills/");
            then.status(404);
        });
        let engine = engine_with(&server, Arc::new(MockRpc::new(1, sender())));

        let err = engine.wait_for_fill(B256::repeat_byte(0x11)).await.unwrap_err();
        assert!(matches!(err, BridgeError::AttestationTimeout { .. }));
        assert!(err.retryable());
    }

    #[tokio::test]
    async fn fill_status_maps_to_unified_phases() {
        let server = MockServer::start();
        let tx = B256::repeat_byte(0x33);
        server.mock(|when, then| {
            when.method(GET).path(format!("/fills/{tx:#x}"));
            then.status(200)
                .json_body(serde_json::json!({"status": "filled", "fillTx": "0xbeef"}));
        });
        let engine = engine_with(&server, Arc::new(MockRpc::new(1, sender())));

        let payload = ProtocolPayload::Relay { deposit_tx: tx, destination_chain: 42161 };
        let status = engine.status(&payload).await.unwrap();
        assert_eq!(status.phase, BridgePhase::Completed);
        assert_eq!(status.proof.as_deref(), Some("0xbeef"));
    }
}
