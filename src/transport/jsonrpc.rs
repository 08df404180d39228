// JSON-RPC transport layer implementation
// Thin EVM JSON-RPC client backing the ChainRpc trait. Receipt polling uses
// bounded exponential backoff; everything else is a single round trip.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoff};
use reqwest::Client;
use serde_json::{json, Value};

use crate::errors::BridgeError;
use crate::transport::{ChainRpc, LogEntry, TxReceipt, TxRequest, TxSigner};

#[derive(Clone)]
pub struct EvmRpc {
    http: Client,
    url: String,
    from: Address,
    /// With a signer, submissions go through eth_sendRawTransaction; without
    /// one, the node (or an account-abstraction proxy) signs via
    /// eth_sendTransaction.
    signer: Option<Arc<dyn TxSigner>>,
}

impl EvmRpc {
    pub fn new(url: impl Into<String>, from: Address) -> Self {
        Self {
            http: Client::new(),
            url: url.into(),
            from,
            signer: None,
        }
    }

    pub fn with_signer(mut self, signer: Arc<dyn TxSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.url
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, BridgeError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let resp = self
            .http
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| BridgeError::Transport(format!("jsonrpc send: {e}")))?;
        if !resp.status().is_success() {
            return Err(BridgeError::Rpc(format!("http {}", resp.status())));
        }
        let body: Value = resp
            .json()
            .await
            .map_err(|e| BridgeError::Transport(format!("json parse: {e}")))?;
        if let Some(err) = body.get("error") {
            return Err(BridgeError::Rpc(err.to_string()));
        }
        Ok(body.get("result").cloned().unwrap_or(Value::Null))
    }

    fn parse_quantity(value: &Value) -> Result<U256, BridgeError> {
        let text = value
            .as_str()
            .ok_or_else(|| BridgeError::Rpc(format!("expected hex quantity, got {value}")))?;
        let digits = text.strip_prefix("0x").unwrap_or(text);
        U256::from_str_radix(digits, 16)
            .map_err(|e| BridgeError::Rpc(format!("bad hex quantity {text}: {e}")))
    }

    fn parse_hash(value: &Value) -> Result<B256, BridgeError> {
        let text = value
            .as_str()
            .ok_or_else(|| BridgeError::Rpc(format!("expected hash, got {value}")))?;
        let bytes = hex::decode(text.strip_prefix("0x").unwrap_or(text))
            .map_err(|e| BridgeError::Rpc(format!("bad hash {text}: {e}")))?;
        if bytes.len() != 32 {
            return Err(BridgeError::Rpc(format!("hash {text} is not 32 bytes")));
        }
        Ok(B256::from_slice(&bytes))
    }

    fn parse_receipt(value: &Value) -> Result<TxReceipt, BridgeError> {
        let status = value
            .get("status")
            .and_then(Value::as_str)
            .map(|s| s == "0x1")
            .unwrap_or(false);
        let tx_hash = Self::parse_hash(
            value
                .get("transactionHash")
                .ok_or_else(|| BridgeError::Rpc("receipt missing transactionHash".into()))?,
        )?;
        let mut logs = Vec::new();
        for log in value.get("logs").and_then(Value::as_array).unwrap_or(&vec![]) {
            let address_text = log
                .get("address")
                .and_then(Value::as_str)
                .ok_or_else(|| BridgeError::Rpc("log missing address".into()))?;
            let address: Address = address_text
                .parse()
                .map_err(|e| BridgeError::Rpc(format!("bad log address {address_text}: {e}")))?;
            let mut topics = Vec::new();
            for topic in log.get("topics").and_then(Value::as_array).unwrap_or(&vec![]) {
                topics.push(Self::parse_hash(topic)?);
            }
            let data_text = log.get("data").and_then(Value::as_str).unwrap_or("0x");
            let data = hex::decode(data_text.strip_prefix("0x").unwrap_or(data_text))
                .map_err(|e| BridgeError::Rpc(format!("bad log data: {e}")))?;
            logs.push(LogEntry { address, topics, data });
        }
        Ok(TxReceipt { tx_hash, status, logs })
    }
}

#[async_trait]
impl ChainRpc for EvmRpc {
    async fn chain_id(&self) -> Result<u64, BridgeError> {
        let result = self.request("eth_chainId", json!([])).await?;
        Ok(Self::parse_quantity(&result)?.to::<u64>())
    }

    async fn balance(&self, address: Address) -> Result<U256, BridgeError> {
        let result = self
            .request("eth_getBalance", json!([format!("{address:#x}"), "latest"]))
            .await?;
        Self::parse_quantity(&result)
    }

    async fn gas_price(&self) -> Result<U256, BridgeError> {
        let result = self.request("eth_gasPrice", json!([])).await?;
        Self::parse_quantity(&result)
    }

    async fn call(&self, to: Address, data: Vec<u8>) -> Result<Vec<u8>, BridgeError> {
        let result = self
            .request(
                "eth_call",
                json!([{ "to": format!("{to:#x}"), "data": format!("0x{}", hex::encode(&data)) }, "latest"]),
            )
            .await?;
        let text = result
            .as_str()
            .ok_or_else(|| BridgeError::Rpc(format!("expected call data, got {result}")))?;
        hex::decode(text.strip_prefix("0x").unwrap_or(text))
            .map_err(|e| BridgeError::Rpc(format!("bad call result: {e}")))
    }

    async fn send_transaction(&self, tx: TxRequest) -> Result<B256, BridgeError> {
        let result = match &self.signer {
            Some(signer) => {
                let raw = signer.sign_transaction(&tx).await?;
                self.request(
                    "eth_sendRawTransaction",
                    json!([format!("0x{}", hex::encode(&raw))]),
                )
                .await?
            }
            None => {
                self.request(
                    "eth_sendTransaction",
                    json!([{
                        "from": format!("{:#x}", self.from),
                        "to": format!("{:#x}", tx.to),
                        "data": format!("0x{}", hex::encode(&tx.data)),
                        "value": format!("{:#x}", tx.value),
                    }]),
                )
                .await?
            }
        };
        Self::parse_hash(&result)
    }

    async fn wait_for_receipt(&self, tx: B256) -> Result<TxReceipt, BridgeError> {
        let backoff = ExponentialBackoff {
            initial_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(5),
            max_elapsed_time: Some(Duration::from_secs(120)),
            multiplier: 2.0,
            ..Default::default()
        };

        retry(backoff, || async {
            let result = self
                .request("eth_getTransactionReceipt", json!([format!("{tx:#x}")]))
                .await
                .map_err(backoff::Error::transient)?;
            if result.is_null() {
                return Err(backoff::Error::transient(BridgeError::Rpc(
                    "receipt not yet available".into(),
                )));
            }
            Self::parse_receipt(&result).map_err(backoff::Error::permanent)
        })
        .await
        .map_err(|e| BridgeError::Transport(format!("receipt wait for {tx:#x}: {e}")))
    }
}
