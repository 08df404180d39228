// Attestation (burn/mint) protocol engine
// Burns on the source chain, waits for the notary's attestation, and mints
// on the destination chain with the attested message. The message hash is
// the cross-chain correlation key; the saved bytes make a burned-but-never-
// completed transfer recoverable indefinitely.

use std::sync::Arc;
use std::time::{Duration, Instant};

use alloy_primitives::{keccak256, Address, B256, U256};
use alloy_sol_types::{SolCall, SolEvent};
use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::amount::parse_stablecoin_amount;
use crate::bindings::{IMessageTransmitter, ITokenMessenger, IERC20};
use crate::chains::{self, ChainInfo};
use crate::errors::BridgeError;
use crate::metrics;
use crate::protocols::wire::{self, MessageHeader};
use crate::protocols::{
    BridgeInitiation, BridgePhase, BridgeProtocol, BridgeQuote, BridgeRequest, BridgeStatus,
    FeeBreakdown, ProtocolId, ProtocolInfo, ProtocolPayload, TimeEstimate,
};
use crate::transport::attestation::{AttestationClient, AttestationPoll};
use crate::transport::{decode_uint_word, ChainRpc, TxRequest};

const SUPPORTED_TOKEN: &str = "USDC";

/// Gas spent across both legs (burn + mint), used for fee estimates.
const BURN_GAS_UNITS: u64 = 170_000;
const MINT_GAS_UNITS: u64 = 140_000;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(20 * 60);

/// Native lifecycle of an attestation-protocol transfer. Failure states are
/// reachable only from the corresponding in-flight state; there is no
/// automatic rollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CctpState {
    Initiated,
    Approving,
    Burned,
    AttestationPending,
    AttestationReady,
    Completing,
    Completed,
    BurnFailed,
    AttestationTimedOut,
    CompletionFailed,
}

impl CctpState {
    /// Collapse the native lifecycle into the protocol-agnostic phase.
    pub fn unified(self) -> BridgePhase {
        match self {
            Self::Initiated | Self::Approving | Self::Burned => BridgePhase::Pending,
            Self::AttestationPending => BridgePhase::AttestationPending,
            Self::AttestationReady | Self::Completing => BridgePhase::AttestationReady,
            Self::Completed => BridgePhase::Completed,
            Self::BurnFailed | Self::AttestationTimedOut | Self::CompletionFailed => {
                BridgePhase::Failed
            }
        }
    }
}

pub struct CctpEngine {
    info: ProtocolInfo,
    source_chain: u64,
    sender: Address,
    rpc: Arc<dyn ChainRpc>,
    attestation: AttestationClient,
    /// USD price of the source chain's native asset, for gas-fee quoting.
    native_price_usd: f64,
    poll_interval: Duration,
    max_wait: Duration,
}

impl CctpEngine {
    pub fn new(
        source_chain: u64,
        sender: Address,
        rpc: Arc<dyn ChainRpc>,
        attestation: AttestationClient,
        native_price_usd: f64,
    ) -> Self {
        Self {
            info: ProtocolInfo {
                id: ProtocolId::Cctp,
                supported_tokens: vec![SUPPORTED_TOKEN],
                typical_time: TimeEstimate::new(600, 1200, "10-20 minutes"),
                charges_protocol_fee: false,
                base_reliability: 95,
            },
            source_chain,
            sender,
            rpc,
            attestation,
            native_price_usd,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_wait: DEFAULT_MAX_WAIT,
        }
    }

    pub fn with_polling(mut self, interval: Duration, max_wait: Duration) -> Self {
        self.poll_interval = interval;
        self.max_wait = max_wait;
        self
    }

    /// Same-chain and unsupported-route are distinct fatal kinds.
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
        let source = chains::by_chain_id(self.source_chain).ok_or_else(unsupported)?;
        let dest = chains::by_chain_id(dest_chain).ok_or_else(unsupported)?;
        Ok((source, dest))
    }

    async fn erc20_balance(&self, token: Address, owner: Address) -> Result<U256, BridgeError> {
        let data = IERC20::balanceOfCall { owner }.abi_encode();
        decode_uint_word(&self.rpc.call(token, data).await?)
    }

    async fn erc20_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, BridgeError> {
        let data = IERC20::allowanceCall { owner, spender }.abi_encode();
        decode_uint_word(&self.rpc.call(token, data).await?)
    }

    /// Submit an approval only when the current allowance falls short.
    async fn ensure_allowance(
        &self,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> Result<Option<B256>, BridgeError> {
        let allowance = self.erc20_allowance(token, self.sender, spender).await?;
        debug!(%allowance, %amount, "checked spender allowance");
        if allowance >= amount {
            return Ok(None);
        }

        let data = IERC20::approveCall { spender, amount }.abi_encode();
        let tx = self
            .rpc
            .send_transaction(TxRequest { to: token, data, value: U256::ZERO })
            .await
            .map_err(|e| BridgeError::Approval(e.to_string()))?;
        let receipt = self.rpc.wait_for_receipt(tx).await?;
        if !receipt.status {
            return Err(BridgeError::Approval(format!(
                "approval transaction {tx:#x} reverted"
            )));
        }
        info!(tx = %format!("{tx:#x}"), "approval confirmed");
        Ok(Some(tx))
    }

    async fn gas_fee_usd(&self, gas_units: u64) -> Result<f64, BridgeError> {
        let gas_price = self.rpc.gas_price().await?;
        let wei = gas_price.saturating_mul(U256::from(gas_units));
        // f64 is fine for a USD display estimate.
        let native = crate::amount::approx_f64(wei) / 1e18;
        Ok(native * self.native_price_usd)
    }

    /// Block until the notary signs off, polling on a fixed interval with a
    /// hard ceiling. Safe to call again after a timeout; polling never
    /// mutates anything.
    pub async fn wait_for_attestation(&self, message_hash: B256) -> Result<String, BridgeError> {
        let started = Instant::now();
        loop {
            match self.attestation.by_message_hash(message_hash).await? {
                AttestationPoll::Ready { attestation } => {
                    metrics::ATTESTATION_WAIT
                        .with_label_values(&[ProtocolId::Cctp.as_str()])
                        .observe(started.elapsed().as_secs_f64());
                    info!(
                        hash = %format!("{message_hash:#x}"),
                        waited_s = started.elapsed().as_secs(),
                        "attestation ready"
                    );
                    return Ok(attestation);
                }
                AttestationPoll::Pending => {
                    let waited = started.elapsed();
                    if waited >= self.max_wait {
                        return Err(BridgeError::AttestationTimeout { waited });
                    }
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }

    /// Complete a transfer on the destination chain. `dest_rpc` must be the
    /// chain the message is destined for; a mismatch fails closed because it
    /// indicates caller error, not network failure.
    pub async fn complete(
        &self,
        message: &[u8],
        attestation: &str,
        dest_rpc: &dyn ChainRpc,
    ) -> Result<B256, BridgeError> {
        let header = MessageHeader::decode(message)?;

        let dest_chain_id = dest_rpc.chain_id().await?;
        let dest = chains::by_chain_id(dest_chain_id)
            .ok_or(BridgeError::UnknownChain { chain_id: dest_chain_id })?;
        if dest.domain != header.destination_domain {
            return Err(BridgeError::DomainMismatch {
                message_domain: header.destination_domain,
                chain_domain: dest.domain,
            });
        }

        // Read-then-act: concurrent completions of the same message can both
        // pass this check; the second mint then reverts on chain.
        let key = nonce_key(header.source_domain, header.nonce);
        let used = decode_uint_word(
            &dest_rpc
                .call(
                    dest.message_transmitter,
                    IMessageTransmitter::usedNoncesCall { nonceKey: key }.abi_encode(),
                )
                .await?,
        )?;
        if !used.is_zero() {
            return Err(BridgeError::NonceAlreadyUsed { nonce: header.nonce });
        }

        let attestation_bytes = hex::decode(attestation.trim_start_matches("0x"))
            .map_err(|e| BridgeError::Completion(format!("attestation is not hex: {e}")))?;
        let data = IMessageTransmitter::receiveMessageCall {
            message: message.to_vec().into(),
            attestation: attestation_bytes.into(),
        }
        .abi_encode();

        let tx = dest_rpc
            .send_transaction(TxRequest {
                to: dest.message_transmitter,
                data,
                value: U256::ZERO,
            })
            .await
            .map_err(|e| BridgeError::Completion(e.to_string()))?;
        let receipt = dest_rpc.wait_for_receipt(tx).await?;
        if !receipt.status {
            return Err(BridgeError::Completion(format!(
                "mint transaction {tx:#x} reverted"
            )));
        }
        info!(tx = %format!("{tx:#x}"), nonce = header.nonce, "mint confirmed");
        Ok(tx)
    }

    fn payload_hash(payload: &ProtocolPayload) -> Result<(B256, B256), BridgeError> {
        match payload {
            ProtocolPayload::Cctp { message_hash, burn_tx, .. } => Ok((*message_hash, *burn_tx)),
            ProtocolPayload::Relay { .. } => Err(BridgeError::Rpc(
                "relay payload handed to the attestation engine".into(),
            )),
        }
    }
}

/// Destination-chain nonce bookkeeping key: keccak256(sourceDomain || nonce).
pub fn nonce_key(source_domain: u32, nonce: u64) -> B256 {
    let mut buf = [0u8; 12];
    buf[..4].copy_from_slice(&source_domain.to_be_bytes());
    buf[4..].copy_from_slice(&nonce.to_be_bytes());
    keccak256(buf)
}

#[async_trait]
impl BridgeProtocol for CctpEngine {
    fn info(&self) -> &ProtocolInfo {
        &self.info
    }

    fn supported_chains(&self) -> Vec<u64> {
        chains::CHAINS.iter().map(|c| c.chain_id).collect()
    }

    fn is_route_supported(&self, source: u64, dest: u64, token: &str) -> bool {
        source != dest
            && token.eq_ignore_ascii_case(SUPPORTED_TOKEN)
            && chains::domain_for_chain(source).is_some()
            && chains::domain_for_chain(dest).is_some()
    }

    async fn is_available(&self) -> bool {
        chains::domain_for_chain(self.source_chain).is_some()
    }

    async fn quote(&self, req: &BridgeRequest) -> Result<BridgeQuote, BridgeError> {
        self.check_route(req.destination_chain, &req.token.symbol)?;
        let amount = parse_stablecoin_amount(&req.amount, req.token.decimals)?;
        let fees = self.estimate_fees(req).await?;
        Ok(BridgeQuote {
            protocol: ProtocolId::Cctp,
            input_amount: amount,
            // Burn/mint moves the full amount; the cost is gas only.
            output_amount: amount,
            fees,
            max_slippage_bps: 0,
            eta: self.info.typical_time.clone(),
            route_description: format!(
                "burn on chain {} -> attestation -> mint on chain {}",
                self.source_chain, req.destination_chain
            ),
            expires_at_ms: None,
        })
    }

    async fn estimate_fees(&self, req: &BridgeRequest) -> Result<FeeBreakdown, BridgeError> {
        self.check_route(req.destination_chain, &req.token.symbol)?;
        let gas_fee_usd = self.gas_fee_usd(BURN_GAS_UNITS + MINT_GAS_UNITS).await?;
        Ok(FeeBreakdown {
            protocol_fee_usd: 0.0,
            gas_fee_usd,
            total_usd: gas_fee_usd,
        })
    }

    async fn initiate(&self, req: &BridgeRequest) -> Result<BridgeInitiation, BridgeError> {
        let (source, dest) = self.check_route(req.destination_chain, &req.token.symbol)?;
        let amount = parse_stablecoin_amount(&req.amount, req.token.decimals)?;
        let recipient = req.recipient.unwrap_or(self.sender);

        let balance = self.erc20_balance(source.usdc, self.sender).await?;
        if balance < amount {
            return Err(BridgeError::InsufficientFunds {
                needed: amount.to_string(),
                available: balance.to_string(),
            });
        }

        self.ensure_allowance(source.usdc, source.token_messenger, amount)
            .await?;

        let data = ITokenMessenger::depositForBurnCall {
            amount,
            destinationDomain: dest.domain,
            mintRecipient: wire::pad_address(recipient),
            burnToken: source.usdc,
        }
        .abi_encode();
        let burn_tx = self
            .rpc
            .send_transaction(TxRequest {
                to: source.token_messenger,
                data,
                value: U256::ZERO,
            })
            .await
            .map_err(|e| BridgeError::Burn(e.to_string()))?;
        let receipt = self.rpc.wait_for_receipt(burn_tx).await?;
        if !receipt.status {
            return Err(BridgeError::Burn(format!(
                "burn transaction {burn_tx:#x} reverted"
            )));
        }

        // The transaction succeeded, so the event must be there; its absence
        // is a parse failure, not a burn failure.
        let message = receipt
            .logs
            .iter()
            .filter(|log| {
                log.topics.first() == Some(&IMessageTransmitter::MessageSent::SIGNATURE_HASH)
            })
            .find_map(|log| {
                IMessageTransmitter::MessageSent::decode_raw_log(
                    log.topics.iter().copied(),
                    &log.data,
                    true,
                )
                .ok()
            })
            .map(|event| event.message.to_vec())
            .ok_or(BridgeError::BurnEventMissing {
                tx: format!("{burn_tx:#x}"),
            })?;

        let header = MessageHeader::decode(&message)?;
        let message_hash = wire::message_hash(&message);
        info!(
            burn_tx = %format!("{burn_tx:#x}"),
            nonce = header.nonce,
            hash = %format!("{message_hash:#x}"),
            "burn confirmed"
        );

        let fee_charged_usd = match self.gas_fee_usd(BURN_GAS_UNITS).await {
            Ok(fee) => fee,
            Err(err) => {
                warn!(error = %err, "gas fee estimate failed post-burn; reporting zero");
                0.0
            }
        };

        Ok(BridgeInitiation {
            protocol: ProtocolId::Cctp,
            source_tx: burn_tx,
            amount,
            fee_charged_usd,
            recipient,
            payload: ProtocolPayload::Cctp {
                message,
                message_hash,
                burn_tx,
                nonce: header.nonce,
            },
        })
    }

    async fn status(&self, payload: &ProtocolPayload) -> Result<BridgeStatus, BridgeError> {
        let (message_hash, burn_tx) = Self::payload_hash(payload)?;

        // Prefer the faster tx-keyed lookup when the service offers one.
        let source_domain = chains::domain_for_chain(self.source_chain)
            .ok_or(BridgeError::UnknownChain { chain_id: self.source_chain })?;
        let poll = match self.attestation.by_source_tx(source_domain, burn_tx).await? {
            Some((poll, _message)) => poll,
            None => self.attestation.by_message_hash(message_hash).await?,
        };

        Ok(match poll {
            AttestationPoll::Pending => BridgeStatus::new(
                CctpState::AttestationPending.unified(),
                "burn confirmed; waiting for the attestation service",
                50,
            ),
            AttestationPoll::Ready { attestation } => BridgeStatus::new(
                CctpState::AttestationReady.unified(),
                "attestation ready; transfer can be completed",
                75,
            )
            .with_proof(attestation),
        })
    }

    async fn wait_for_settlement(
        &self,
        payload: &ProtocolPayload,
    ) -> Result<BridgeStatus, BridgeError> {
        let (message_hash, _) = Self::payload_hash(payload)?;
        let attestation = self.wait_for_attestation(message_hash).await?;
        Ok(BridgeStatus::new(
            CctpState::AttestationReady.unified(),
            "attestation ready; transfer can be completed",
            75,
        )
        .with_proof(attestation))
    }

    fn reliability_score(&self) -> u8 {
        self.info.base_reliability
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocols::wire::{BurnBody, BurnMessage};
    use crate::test_support::MockRpc;
    use alloy_primitives::address;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sender() -> Address {
        address!("1111111111111111111111111111111111111111")
    }

    fn recipient() -> Address {
        address!("2222222222222222222222222222222222222222")
    }

    fn burn_message(nonce: u64, amount: u64, source_domain: u32, dest_domain: u32) -> BurnMessage {
        BurnMessage {
            header: MessageHeader {
                version: wire::MESSAGE_VERSION,
                source_domain,
                destination_domain: dest_domain,
                nonce,
                sender: wire::pad_address(sender()),
                recipient: wire::pad_address(recipient()),
                destination_caller: B256::ZERO,
            },
            body: BurnBody {
                version: wire::BODY_VERSION,
                burn_token: wire::pad_address(chains::by_chain_id(1).unwrap().usdc),
                mint_recipient: wire::pad_address(recipient()),
                amount: U256::from(amount),
                message_sender: wire::pad_address(sender()),
            },
        }
    }

    fn engine_on(rpc: Arc<MockRpc>) -> CctpEngine {
        let attestation = AttestationClient::new("http://unused.invalid".parse().unwrap(), None);
        CctpEngine::new(1, sender(), rpc, attestation, 3_000.0)
            .with_polling(Duration::from_millis(10), Duration::from_millis(200))
    }

    fn usdc_request(dest: u64) -> BridgeRequest {
        BridgeRequest {
            token: crate::protocols::TokenDescriptor::usdc(),
            amount: "100".into(),
            destination_chain: dest,
            recipient: Some(recipient()),
            protocol: None,
        }
    }

    #[test]
    fn route_support_rejects_same_chain_and_is_case_insensitive() {
        let rpc = Arc::new(MockRpc::new(1, sender()));
        let engine = engine_on(rpc);
        assert!(!engine.is_route_supported(1, 1, "USDC"));
        assert!(!engine.is_route_supported(42161, 42161, "usdc"));
        assert!(engine.is_route_supported(1, 42161, "usdc"));
        assert!(engine.is_route_supported(1, 42161, "UsDc"));
        assert!(!engine.is_route_supported(1, 42161, "DAI"));
        assert!(!engine.is_route_supported(1, 999_999, "USDC"));
    }

    #[tokio::test]
    async fn same_chain_and_unsupported_route_are_distinct_kinds() {
        let rpc = Arc::new(MockRpc::new(1, sender()));
        let engine = engine_on(rpc);

        let err = engine.initiate(&usdc_request(1)).await.unwrap_err();
        assert!(matches!(err, BridgeError::SameChain { chain: 1 }));
        assert!(!err.retryable());

        let err = engine.initiate(&usdc_request(999_999)).await.unwrap_err();
        assert!(matches!(err, BridgeError::UnsupportedRoute { .. }));
        assert!(!err.retryable());
    }

    #[tokio::test]
    async fn insufficient_balance_is_fatal() {
        let rpc = Arc::new(MockRpc::new(1, sender()));
        let usdc = chains::by_chain_id(1).unwrap().usdc;
        rpc.set_balance(usdc, sender(), U256::from(50_000_000u64)); // 50 USDC

        let err = engine_on(rpc).initiate(&usdc_request(42161)).await.unwrap_err();
        assert!(matches!(err, BridgeError::InsufficientFunds { .. }));
        assert!(!err.retryable());
    }

    #[tokio::test]
    async fn zero_allowance_triggers_approval_before_burn() {
        let mut rpc = MockRpc::new(1, sender());
        rpc.burn_message = Some(burn_message(123, 100_000_000, 0, 3).encode());
        let source = chains::by_chain_id(1).unwrap();
        rpc.set_balance(source.usdc, sender(), U256::from(1_000_000_000u64)); // 1000 USDC
        let rpc = Arc::new(rpc);

        let engine = engine_on(rpc.clone());
        let result = engine.initiate(&usdc_request(42161)).await.unwrap();

        let sent = rpc.sent_transactions();
        assert_eq!(sent.len(), 2, "expected approval then burn");
        assert_eq!(&sent[0].data[..4], IERC20::approveCall::SELECTOR.as_slice());
        assert_eq!(
            &sent[1].data[..4],
            ITokenMessenger::depositForBurnCall::SELECTOR.as_slice()
        );

        match &result.payload {
            ProtocolPayload::Cctp { nonce, message_hash, message: bytes, .. } => {
                assert_eq!(*nonce, 123);
                assert_eq!(*message_hash, wire::message_hash(bytes));
                assert_eq!(bytes.len(), wire::BURN_MESSAGE_LEN);
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[tokio::test]
    async fn sufficient_allowance_skips_approval() {
        let mut rpc = MockRpc::new(1, sender());
        rpc.burn_message = Some(burn_message(7, 100_000_000, 0, 3).encode());
        let source = chains::by_chain_id(1).unwrap();
        rpc.set_balance(source.usdc, sender(), U256::from(1_000_000_000u64));
        rpc.set_allowance(
            source.usdc,
            sender(),
            source.token_messenger,
            U256::from(500_000_000u64),
        );
        let rpc = Arc::new(rpc);

        engine_on(rpc.clone()).initiate(&usdc_request(42161)).await.unwrap();

        let sent = rpc.sent_transactions();
        assert_eq!(sent.len(), 1, "expected burn only");
        assert_eq!(
            &sent[0].data[..4],
            ITokenMessenger::depositForBurnCall::SELECTOR.as_slice()
        );
    }

    #[tokio::test]
    async fn missing_burn_event_is_a_fatal_parse_failure() {
        let mut rpc = MockRpc::new(1, sender());
        rpc.omit_burn_event = true;
        let source = chains::by_chain_id(1).unwrap();
        rpc.set_balance(source.usdc, sender(), U256::from(1_000_000_000u64));

        let err = engine_on(Arc::new(rpc))
            .initiate(&usdc_request(42161))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::BurnEventMissing { .. }));
        assert!(!err.retryable());
    }

    #[tokio::test]
    async fn complete_rejects_domain_mismatch() {
        let engine = engine_on(Arc::new(MockRpc::new(1, sender())));
        // Message destined for arbitrum (domain 3), completion attempted on
        // an ethereum rpc (domain 0).
        let message = burn_message(9, 1_000_000, 0, 3).encode();
        let eth_rpc = MockRpc::new(1, sender());

        let err = engine
            .complete(&message, "0xdead", &eth_rpc)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BridgeError::DomainMismatch { message_domain: 3, chain_domain: 0 }
        ));
        assert!(!err.retryable());
    }

    #[tokio::test]
    async fn complete_twice_fails_with_nonce_already_used() {
        let engine = engine_on(Arc::new(MockRpc::new(1, sender())));
        let message = burn_message(55, 1_000_000, 0, 3).encode();
        let arb_rpc = MockRpc::new(42161, sender());

        engine.complete(&message, "0xdead", &arb_rpc).await.unwrap();

        let err = engine
            .complete(&message, "0xdead", &arb_rpc)
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::NonceAlreadyUsed { nonce: 55 }));
        assert!(!err.retryable());
    }

    #[tokio::test]
    async fn complete_refuses_a_nonce_consumed_elsewhere() {
        let engine = engine_on(Arc::new(MockRpc::new(1, sender())));
        let message = burn_message(77, 1_000_000, 0, 3).encode();
        let arb_rpc = MockRpc::new(42161, sender());
        // Another completer got there first.
        arb_rpc.mark_nonce_used(nonce_key(0, 77));

        let err = engine
            .complete(&message, "0xdead", &arb_rpc)
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::NonceAlreadyUsed { nonce: 77 }));
    }

    #[tokio::test]
    async fn reverted_mint_is_a_retryable_completion_error() {
        let engine = engine_on(Arc::new(MockRpc::new(1, sender())));
        let message = burn_message(4, 1_000_000, 0, 3).encode();
        let mut arb_rpc = MockRpc::new(42161, sender());
        arb_rpc.revert_mint = true;

        let err = engine
            .complete(&message, "0xdead", &arb_rpc)
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Completion(_)));
        assert!(err.retryable());
    }

    /// Counter-backed attestation endpoint: 404 twice, then complete.
    async fn spawn_flaky_attestation_service(attestation: &'static str) -> (SocketAddr, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = hits.clone();
        let app = axum::Router::new().route(
            "/:hash",
            axum::routing::get(move || {
                let hits = hits_clone.clone();
                async move {
                    let n = hits.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        Err(axum::http::StatusCode::NOT_FOUND)
                    } else {
                        Ok(axum::Json(serde_json::json!({
                            "status": "complete",
                            "attestation": attestation,
                        })))
                    }
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (addr, hits)
    }

    #[tokio::test]
    async fn attestation_wait_resolves_on_third_poll() {
        let (addr, hits) = spawn_flaky_attestation_service("abc123").await;
        let attestation =
            AttestationClient::new(format!("http://{addr}").parse().unwrap(), None);
        let engine = CctpEngine::new(
            1,
            sender(),
            Arc::new(MockRpc::new(1, sender())),
            attestation,
            3_000.0,
        )
        .with_polling(Duration::from_millis(10), Duration::from_secs(5));

        let result = engine
            .wait_for_attestation(B256::repeat_byte(0x42))
            .await
            .unwrap();
        assert_eq!(result, "0xabc123", "service value with 0x prefix normalized");
        assert_eq!(hits.load(Ordering::SeqCst), 3, "resolved on the third poll");
    }

    #[tokio::test]
    async fn attestation_wait_times_out_with_elapsed() {
        let server = httpmock::MockServer::start();
        server.mock(|when, then| {
            when.method(httpmock::Method::GET);
            then.status(404);
        });
        let attestation = AttestationClient::new(server.base_url().parse().unwrap(), None);
        let engine = CctpEngine::new(
            1,
            sender(),
            Arc::new(MockRpc::new(1, sender())),
            attestation,
            3_000.0,
        )
        .with_polling(Duration::from_millis(10), Duration::from_millis(50));

        let err = engine
            .wait_for_attestation(B256::repeat_byte(0x42))
            .await
            .unwrap_err();
        match err {
            BridgeError::AttestationTimeout { waited } => {
                assert!(waited >= Duration::from_millis(50));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        assert!(BridgeError::AttestationTimeout { waited: Duration::ZERO }.retryable());
    }

    #[test]
    fn native_states_collapse_to_the_unified_enum() {
        assert_eq!(CctpState::Initiated.unified(), BridgePhase::Pending);
        assert_eq!(CctpState::Approving.unified(), BridgePhase::Pending);
        assert_eq!(
            CctpState::AttestationPending.unified(),
            BridgePhase::AttestationPending
        );
        assert_eq!(
            CctpState::AttestationReady.unified(),
            BridgePhase::AttestationReady
        );
        assert_eq!(CctpState::Completed.unified(), BridgePhase::Completed);
        for failure in [
            CctpState::BurnFailed,
            CctpState::AttestationTimedOut,
            CctpState::CompletionFailed,
        ] {
            assert_eq!(failure.unified(), BridgePhase::Failed);
        }
    }

    #[test]
    fn nonce_key_binds_domain_and_nonce() {
        assert_ne!(nonce_key(0, 1), nonce_key(1, 1));
        assert_ne!(nonce_key(0, 1), nonce_key(0, 2));
        assert_eq!(nonce_key(3, 99), nonce_key(3, 99));
    }

    #[test]
    fn relay_payload_is_rejected() {
        let payload = ProtocolPayload::Relay {
            deposit_tx: B256::ZERO,
            destination_chain: 42161,
        };
        assert!(CctpEngine::payload_hash(&payload).is_err());
    }
}
