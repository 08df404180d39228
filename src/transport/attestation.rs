// Attestation service client
// Looks up notarized attestations by message hash, with a faster variant
// keyed on the source transaction. A 404 or 400 means the burn has not been
// indexed yet and is reported as pending, never as an error.

use alloy_primitives::B256;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::errors::BridgeError;

/// One poll of the attestation service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttestationPoll {
    Pending,
    Ready { attestation: String },
}

#[derive(Debug, Deserialize)]
struct HashLookupResponse {
    status: Option<String>,
    attestation: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TxLookupResponse {
    messages: Vec<TxMessageEntry>,
}

#[derive(Debug, Deserialize)]
struct TxMessageEntry {
    status: String,
    attestation: Option<String>,
    message: Option<String>,
}

#[derive(Clone)]
pub struct AttestationClient {
    http: Client,
    base: Url,
    fast_base: Option<Url>,
}

impl AttestationClient {
    pub fn new(base: Url, fast_base: Option<Url>) -> Self {
        Self {
            http: Client::new(),
            base,
            fast_base,
        }
    }

    /// `GET {base}/{0x-prefixed hash}` -> `{status, attestation}`.
    pub async fn by_message_hash(&self, hash: B256) -> Result<AttestationPoll, BridgeError> {
        let url = format!("{}/{hash:#x}", self.base.as_str().trim_end_matches('/'));
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| BridgeError::Transport(format!("attestation fetch: {e}")))?;

        let status = resp.status();
        if status.as_u16() == 404 || status.as_u16() == 400 {
            // Very recent burns are not yet indexed.
            debug!(%url, status = status.as_u16(), "attestation not indexed yet");
            return Ok(AttestationPoll::Pending);
        }
        if !status.is_success() {
            return Err(BridgeError::AttestationApi {
                status: status.as_u16(),
                message: format!("lookup of {hash:#x} failed"),
            });
        }

        let body: HashLookupResponse = resp
            .json()
            .await
            .map_err(|e| BridgeError::Transport(format!("attestation parse: {e}")))?;
        Ok(Self::classify(body.status.as_deref(), body.attestation))
    }

    /// Faster variant: `GET {fastBase}/{sourceDomain}/{txHash}` returning
    /// `{messages: [...]}`. Also yields the attested message bytes.
    pub async fn by_source_tx(
        &self,
        source_domain: u32,
        tx_hash: B256,
    ) -> Result<Option<(AttestationPoll, Option<String>)>, BridgeError> {
        let Some(fast_base) = &self.fast_base else {
            return Ok(None);
        };
        let url = format!(
            "{}/{source_domain}/{tx_hash:#x}",
            fast_base.as_str().trim_end_matches('/')
        );
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| BridgeError::Transport(format!("attestation fast fetch: {e}")))?;

        let status = resp.status();
        if status.as_u16() == 404 || status.as_u16() == 400 {
            return Ok(Some((AttestationPoll::Pending, None)));
        }
        if !status.is_success() {
            return Err(BridgeError::AttestationApi {
                status: status.as_u16(),
                message: format!("fast lookup of {tx_hash:#x} failed"),
            });
        }

        let body: TxLookupResponse = resp
            .json()
            .await
            .map_err(|e| BridgeError::Transport(format!("attestation parse: {e}")))?;
        let Some(entry) = body.messages.into_iter().next() else {
            return Ok(Some((AttestationPoll::Pending, None)));
        };
        let message = entry.message.clone();
        Ok(Some((
            Self::classify(Some(entry.status.as_str()), entry.attestation),
            message,
        )))
    }

    fn classify(status: Option<&str>, attestation: Option<String>) -> AttestationPoll {
        match (status, attestation) {
            (Some("complete"), Some(att)) => AttestationPoll::Ready {
                attestation: normalize_hex(&att),
            },
            _ => AttestationPoll::Pending,
        }
    }
}

/// The service sometimes omits the 0x prefix; callers always see one.
pub fn normalize_hex(value: &str) -> String {
    if value.starts_with("0x") {
        value.to_string()
    } else {
        format!("0x{value}")
    }
}
