// Relay-network HTTP client
// Fetches provider quotes for intent/relay transfers and polls fill status.
// Settlement is observed through the relayer's fill, not a notarized message.

use alloy_primitives::{Address, B256, U256};
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::errors::BridgeError;

/// Fee leg denominated in some asset; conversion to USD happens in the engine.
#[derive(Debug, Clone, Deserialize)]
pub struct RelayFee {
    pub asset: String,
    /// Raw integer units of `asset`.
    pub total: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayQuoteResponse {
    pub relay_fee: RelayFee,
    pub lp_fee: Option<RelayFee>,
    pub estimated_fill_time_sec: u64,
    /// Seconds until the provider stops honoring this quote.
    pub quote_expiry_sec: u64,
    pub output_amount: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FillPoll {
    Pending,
    Filled { fill_tx: String },
}

#[derive(Debug, Deserialize)]
struct FillStatusResponse {
    status: String,
    #[serde(rename = "fillTx")]
    fill_tx: Option<String>,
}

#[derive(Clone)]
pub struct RelayApi {
    http: Client,
    base: Url,
}

impl RelayApi {
    pub fn new(base: Url) -> Self {
        Self { http: Client::new(), base }
    }

    pub async fn fetch_quote(
        &self,
        token: Address,
        amount: U256,
        origin_chain: u64,
        destination_chain: u64,
        recipient: Address,
    ) -> Result<RelayQuoteResponse, BridgeError> {
        let url = format!(
            "{}/quote?inputToken={token:#x}&amount={amount}&originChainId={origin_chain}&destinationChainId={destination_chain}&recipient={recipient:#x}",
            self.base.as_str().trim_end_matches('/'),
        );
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| BridgeError::Transport(format!("relay quote fetch: {e}")))?;
        if !resp.status().is_success() {
            return Err(BridgeError::Transport(format!(
                "relay quote http {}",
                resp.status()
            )));
        }
        resp.json()
            .await
            .map_err(|e| BridgeError::Transport(format!("relay quote parse: {e}")))
    }

    /// `GET {base}/fills/{depositTx}`; 404 means the relayer has not picked
    /// the deposit up yet.
    pub async fn fill_status(&self, deposit_tx: B256) -> Result<FillPoll, BridgeError> {
        let url = format!(
            "{}/fills/{deposit_tx:#x}",
            self.base.as_str().trim_end_matches('/')
        );
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| BridgeError::Transport(format!("relay fill fetch: {e}")))?;
        if resp.status().as_u16() == 404 {
            return Ok(FillPoll::Pending);
        }
        if !resp.status().is_success() {
            return Err(BridgeError::Transport(format!(
                "relay fill http {}",
                resp.status()
            )));
        }
        let body: FillStatusResponse = resp
            .json()
            .await
            .map_err(|e| BridgeError::Transport(format!("relay fill parse: {e}")))?;
        match (body.status.as_str(), body.fill_tx) {
            ("filled", Some(tx)) => Ok(FillPoll::Filled { fill_tx: tx }),
            _ => Ok(FillPoll::Pending),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, b256};
    use httpmock::prelude::*;

    #[tokio::test]
    async fn quote_round_trip() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/quote");
            then.status(200).json_body(serde_json::json!({
                "relayFee": {"asset": "USDC", "total": "100000"},
                "lpFee": {"asset": "USDC", "total": "20000"},
                "estimatedFillTimeSec": 60,
                "quoteExpirySec": 60,
                "outputAmount": "99880000"
            }));
        });

        let api = RelayApi::new(server.base_url().parse().unwrap());
        let quote = api
            .fetch_quote(
                address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"),
                U256::from(100_000_000u64),
                1,
                42161,
                address!("2222222222222222222222222222222222222222"),
            )
            .await
            .unwrap();
        assert_eq!(quote.relay_fee.total, "100000");
        assert_eq!(quote.estimated_fill_time_sec, 60);
        assert_eq!(quote.output_amount, "99880000");
    }

    #[tokio::test]
    async fn unfilled_deposit_is_pending() {
        let server = MockServer::start();
        let tx = b256!("1234567890123456789012345678901234567890123456789012345678901234");
        server.mock(|when, then| {
            when.method(GET).path(format!("/fills/{tx:#x}"));
            then.status(404);
        });

        let api = RelayApi::new(server.base_url().parse().unwrap());
        assert_eq!(api.fill_status(tx).await.unwrap(), FillPoll::Pending);
    }

    #[tokio::test]
    async fn filled_deposit_carries_fill_tx() {
        let server = MockServer::start();
        let tx = b256!("1234567890123456789012345678901234567890123456789012345678901234");
        server.mock(|when, then| {
            when.method(GET).path(format!("/fills/{tx:#x}"));
            then.status(200)
                .json_body(serde_json::json!({"status": "filled", "fillTx": "0xbeef"}));
        });

        let api = RelayApi::new(server.base_url().parse().unwrap());
        assert_eq!(
            api.fill_status(tx).await.unwrap(),
            FillPoll::Filled { fill_tx: "0xbeef".into() }
        );
    }
}
