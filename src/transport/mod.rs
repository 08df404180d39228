// Transport layer
// Collaborator traits for chain access and signing, plus the HTTP clients
// for the JSON-RPC, attestation, and relay-network services.

pub mod attestation;
pub mod jsonrpc;
pub mod relay;

use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;

use crate::errors::BridgeError;

/// A transaction the engines want submitted. Calldata is prebuilt by the
/// typed bindings; nonce/gas/fee fields belong to the signing collaborator.
#[derive(Debug, Clone)]
pub struct TxRequest {
    pub to: Address,
    pub data: Vec<u8>,
    pub value: U256,
}

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct TxReceipt {
    pub tx_hash: B256,
    pub status: bool,
    pub logs: Vec<LogEntry>,
}

/// Chain access the engines depend on. One implementation per RPC endpoint;
/// tests substitute an in-memory mock.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    async fn chain_id(&self) -> Result<u64, BridgeError>;
    /// Native-asset balance; token balances go through `call`.
    async fn balance(&self, address: Address) -> Result<U256, BridgeError>;
    async fn gas_price(&self) -> Result<U256, BridgeError>;
    /// eth_call against latest state.
    async fn call(&self, to: Address, data: Vec<u8>) -> Result<Vec<u8>, BridgeError>;
    async fn send_transaction(&self, tx: TxRequest) -> Result<B256, BridgeError>;
    async fn wait_for_receipt(&self, tx: B256) -> Result<TxReceipt, BridgeError>;
}

/// External signing collaborator. Implementations own key material and the
/// transaction envelope format; this crate never sees either.
#[async_trait]
pub trait TxSigner: Send + Sync {
    fn address(&self) -> Address;
    /// Produce a fully signed raw transaction for submission.
    async fn sign_transaction(&self, tx: &TxRequest) -> Result<Vec<u8>, BridgeError>;
}

/// Decode a single uint256 return word from an eth_call result.
pub fn decode_uint_word(ret: &[u8]) -> Result<U256, BridgeError> {
    if ret.len() < 32 {
        return Err(BridgeError::Rpc(format!(
            "expected a 32-byte return word, got {} bytes",
            ret.len()
        )));
    }
    Ok(U256::from_be_slice(&ret[..32]))
}
