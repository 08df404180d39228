// Shared test doubles
// In-memory ChainRpc with scripted balances/allowances/receipts, plus a
// scriptable protocol adapter for router tests.

use std::collections::HashMap;
use std::sync::Mutex;

use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::{SolCall, SolEvent};
use async_trait::async_trait;

use crate::bindings::{IMessageTransmitter, IRelayPool, ITokenMessenger, IERC20};
use crate::errors::BridgeError;
use crate::protocols::wire;
use crate::protocols::{
    BridgeInitiation, BridgePhase, BridgeProtocol, BridgeQuote, BridgeRequest, BridgeStatus,
    FeeBreakdown, ProtocolId, ProtocolInfo, ProtocolPayload, TimeEstimate,
};
use crate::transport::{ChainRpc, LogEntry, TxReceipt, TxRequest};

#[derive(Default)]
struct MockChainState {
    balances: HashMap<(Address, Address), U256>,
    allowances: HashMap<(Address, Address, Address), U256>,
    used_nonces: std::collections::HashSet<B256>,
    sent: Vec<TxRequest>,
    receipts: HashMap<B256, TxReceipt>,
    next_tx: u64,
}

pub struct MockRpc {
    pub chain_id: u64,
    pub sender: Address,
    pub gas_price_wei: U256,
    pub gas_price_fails: bool,
    /// Message bytes attached as a MessageSent log to burn receipts.
    pub burn_message: Option<Vec<u8>>,
    /// When true, mint submissions produce reverted receipts.
    pub revert_mint: bool,
    /// When true, burn receipts carry no MessageSent log.
    pub omit_burn_event: bool,
    inner: Mutex<MockChainState>,
}

impl MockRpc {
    pub fn new(chain_id: u64, sender: Address) -> Self {
        Self {
            chain_id,
            sender,
            gas_price_wei: U256::from(20_000_000_000u64),
            gas_price_fails: false,
            burn_message: None,
            revert_mint: false,
            omit_burn_event: false,
            inner: Mutex::new(MockChainState::default()),
        }
    }

    pub fn set_balance(&self, token: Address, owner: Address, amount: U256) {
        self.inner.lock().unwrap().balances.insert((token, owner), amount);
    }

    pub fn set_allowance(&self, token: Address, owner: Address, spender: Address, amount: U256) {
        self.inner
            .lock()
            .unwrap()
            .allowances
            .insert((token, owner, spender), amount);
    }

    pub fn mark_nonce_used(&self, key: B256) {
        self.inner.lock().unwrap().used_nonces.insert(key);
    }

    pub fn sent_transactions(&self) -> Vec<TxRequest> {
        self.inner.lock().unwrap().sent.clone()
    }

    fn next_tx_hash(state: &mut MockChainState) -> B256 {
        state.next_tx += 1;
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&state.next_tx.to_be_bytes());
        B256::from(bytes)
    }

    fn word(value: U256) -> Vec<u8> {
        value.to_be_bytes::<32>().to_vec()
    }
}

#[async_trait]
impl ChainRpc for MockRpc {
    async fn chain_id(&self) -> Result<u64, BridgeError> {
        Ok(self.chain_id)
    }

    async fn balance(&self, _address: Address) -> Result<U256, BridgeError> {
        Ok(U256::from(10u64).pow(U256::from(18u64)))
    }

    async fn gas_price(&self) -> Result<U256, BridgeError> {
        if self.gas_price_fails {
            return Err(BridgeError::Rpc("gas price unavailable".into()));
        }
        Ok(self.gas_price_wei)
    }

    async fn call(&self, to: Address, data: Vec<u8>) -> Result<Vec<u8>, BridgeError> {
        let state = self.inner.lock().unwrap();
        if data.len() < 4 {
            return Err(BridgeError::Rpc("calldata too short".into()));
        }
        let selector: [u8; 4] = data[..4].try_into().unwrap();
        match selector {
            IERC20::balanceOfCall::SELECTOR => {
                let owner = Address::from_slice(&data[16..36]);
                let balance = state
                    .balances
                    .get(&(to, owner))
                    .copied()
                    .unwrap_or(U256::ZERO);
                Ok(Self::word(balance))
            }
            IERC20::allowanceCall::SELECTOR => {
                let owner = Address::from_slice(&data[16..36]);
                let spender = Address::from_slice(&data[48..68]);
                let allowance = state
                    .allowances
                    .get(&(to, owner, spender))
                    .copied()
                    .unwrap_or(U256::ZERO);
                Ok(Self::word(allowance))
            }
            IMessageTransmitter::usedNoncesCall::SELECTOR => {
                let key = B256::from_slice(&data[4..36]);
                let used = if state.used_nonces.contains(&key) {
                    U256::from(1u64)
                } else {
                    U256::ZERO
                };
                Ok(Self::word(used))
            }
            _ => Err(BridgeError::Rpc(format!(
                "mock has no handler for selector 0x{}",
                hex::encode(selector)
            ))),
        }
    }

    async fn send_transaction(&self, tx: TxRequest) -> Result<B256, BridgeError> {
        let mut state = self.inner.lock().unwrap();
        let tx_hash = Self::next_tx_hash(&mut state);
        let selector: [u8; 4] = tx.data[..4]
            .try_into()
            .map_err(|_| BridgeError::Rpc("calldata too short".into()))?;

        let mut status = true;
        let mut logs = Vec::new();

        match selector {
            IERC20::approveCall::SELECTOR => {
                let call = IERC20::approveCall::abi_decode(&tx.data, true)
                    .map_err(|e| BridgeError::Rpc(e.to_string()))?;
                state
                    .allowances
                    .insert((tx.to, self.sender, call.spender), call.amount);
            }
            ITokenMessenger::depositForBurnCall::SELECTOR => {
                if self.omit_burn_event {
                    // Successful transaction, no MessageSent log.
                } else if let Some(message) = &self.burn_message {
                    let event = IMessageTransmitter::MessageSent {
                        message: message.clone().into(),
                    };
                    logs.push(LogEntry {
                        address: tx.to,
                        topics: vec![IMessageTransmitter::MessageSent::SIGNATURE_HASH],
                        data: event.encode_data(),
                    });
                }
            }
            IRelayPool::depositForCall::SELECTOR => {
                let call = IRelayPool::depositForCall::abi_decode(&tx.data, true)
                    .map_err(|e| BridgeError::Rpc(e.to_string()))?;
                let event = IRelayPool::FundsDeposited {
                    token: call.token,
                    amount: call.amount,
                    destinationChainId: call.destinationChainId,
                    recipient: call.recipient,
                };
                logs.push(LogEntry {
                    address: tx.to,
                    topics: vec![IRelayPool::FundsDeposited::SIGNATURE_HASH],
                    data: event.encode_data(),
                });
            }
            IMessageTransmitter::receiveMessageCall::SELECTOR => {
                if self.revert_mint {
                    status = false;
                } else {
                    let call = IMessageTransmitter::receiveMessageCall::abi_decode(&tx.data, true)
                        .map_err(|e| BridgeError::Rpc(e.to_string()))?;
                    let header = wire::MessageHeader::decode(&call.message)?;
                    state.used_nonces.insert(crate::protocols::cctp::nonce_key(
                        header.source_domain,
                        header.nonce,
                    ));
                }
            }
            _ => {}
        }

        state.sent.push(tx);
        state
            .receipts
            .insert(tx_hash, TxReceipt { tx_hash, status, logs });
        Ok(tx_hash)
    }

    async fn wait_for_receipt(&self, tx: B256) -> Result<TxReceipt, BridgeError> {
        self.inner
            .lock()
            .unwrap()
            .receipts
            .get(&tx)
            .cloned()
            .ok_or_else(|| BridgeError::Rpc(format!("no receipt for {tx:#x}")))
    }
}

/// Scriptable adapter for router tests: fixed quote or fixed failure, with
/// initiation outcomes queued per call.
pub struct StaticProtocol {
    info: ProtocolInfo,
    pub available: bool,
    pub quote_result: Mutex<Option<Result<BridgeQuote, BridgeError>>>,
    pub initiate_fails_with: Mutex<Option<BridgeError>>,
    pub initiations: Mutex<usize>,
}

impl StaticProtocol {
    pub fn new(id: ProtocolId, fee_usd: f64, min_s: u64, max_s: u64) -> Self {
        let quote = BridgeQuote {
            protocol: id,
            input_amount: U256::from(100_000_000u64),
            output_amount: U256::from(100_000_000u64),
            fees: FeeBreakdown {
                protocol_fee_usd: 0.0,
                gas_fee_usd: fee_usd,
                total_usd: fee_usd,
            },
            max_slippage_bps: 0,
            eta: TimeEstimate::new(min_s, max_s, "test"),
            route_description: format!("{id} test route"),
            expires_at_ms: None,
        };
        Self {
            info: ProtocolInfo {
                id,
                supported_tokens: vec!["USDC"],
                typical_time: TimeEstimate::new(min_s, max_s, "test"),
                charges_protocol_fee: false,
                base_reliability: 90,
            },
            available: true,
            quote_result: Mutex::new(Some(Ok(quote))),
            initiate_fails_with: Mutex::new(None),
            initiations: Mutex::new(0),
        }
    }

    pub fn failing_quotes(id: ProtocolId) -> Self {
        let proto = Self::new(id, 1.0, 60, 120);
        *proto.quote_result.lock().unwrap() = Some(Err(BridgeError::Transport("quote api down".into())));
        proto
    }
}

#[async_trait]
impl BridgeProtocol for StaticProtocol {
    fn info(&self) -> &ProtocolInfo {
        &self.info
    }

    fn supported_chains(&self) -> Vec<u64> {
        crate::chains::CHAINS.iter().map(|c| c.chain_id).collect()
    }

    fn is_route_supported(&self, source: u64, dest: u64, token: &str) -> bool {
        source != dest && token.eq_ignore_ascii_case("USDC")
    }

    async fn is_available(&self) -> bool {
        self.available
    }

    async fn quote(&self, _req: &BridgeRequest) -> Result<BridgeQuote, BridgeError> {
        match &*self.quote_result.lock().unwrap() {
            Some(Ok(quote)) => Ok(quote.clone()),
            Some(Err(err)) => Err(BridgeError::Transport(err.to_string())),
            None => Err(BridgeError::Transport("no quote scripted".into())),
        }
    }

    async fn estimate_fees(&self, req: &BridgeRequest) -> Result<FeeBreakdown, BridgeError> {
        self.quote(req).await.map(|q| q.fees)
    }

    async fn initiate(&self, req: &BridgeRequest) -> Result<BridgeInitiation, BridgeError> {
        *self.initiations.lock().unwrap() += 1;
        if let Some(err) = self.initiate_fails_with.lock().unwrap().take() {
            return Err(err);
        }
        Ok(BridgeInitiation {
            protocol: self.info.id,
            source_tx: B256::repeat_byte(0xab),
            amount: U256::from(100_000_000u64),
            fee_charged_usd: 0.1,
            recipient: req.recipient.unwrap_or(Address::repeat_byte(0x22)),
            payload: ProtocolPayload::Relay {
                deposit_tx: B256::repeat_byte(0xab),
                destination_chain: req.destination_chain,
            },
        })
    }

    async fn status(&self, _payload: &ProtocolPayload) -> Result<BridgeStatus, BridgeError> {
        Ok(BridgeStatus::new(BridgePhase::Pending, "scripted", 10))
    }

    async fn wait_for_settlement(
        &self,
        _payload: &ProtocolPayload,
    ) -> Result<BridgeStatus, BridgeError> {
        Ok(BridgeStatus::new(BridgePhase::Completed, "scripted", 100))
    }

    fn reliability_score(&self) -> u8 {
        self.info.base_reliability
    }
}
