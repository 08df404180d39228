// Burn-message wire codec
// Fixed-layout big-endian message: a transport header shared by every
// attestation-protocol message, followed by the burn body. The keccak256
// hash of the full bytes is the cross-chain correlation key.

use alloy_primitives::{keccak256, Address, B256, U256};

use crate::errors::BridgeError;

/// version(4) sourceDomain(4) destinationDomain(4) nonce(8)
/// sender(32) recipient(32) destinationCaller(32)
pub const HEADER_LEN: usize = 116;
/// bodyVersion(4) burnToken(32) mintRecipient(32) amount(32) messageSender(32)
pub const BODY_LEN: usize = 132;
pub const BURN_MESSAGE_LEN: usize = HEADER_LEN + BODY_LEN;

pub const MESSAGE_VERSION: u32 = 0;
pub const BODY_VERSION: u32 = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeader {
    pub version: u32,
    pub source_domain: u32,
    pub destination_domain: u32,
    pub nonce: u64,
    pub sender: B256,
    pub recipient: B256,
    pub destination_caller: B256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BurnBody {
    pub version: u32,
    pub burn_token: B256,
    pub mint_recipient: B256,
    pub amount: U256,
    pub message_sender: B256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BurnMessage {
    pub header: MessageHeader,
    pub body: BurnBody,
}

impl MessageHeader {
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.version.to_be_bytes());
        out.extend_from_slice(&self.source_domain.to_be_bytes());
        out.extend_from_slice(&self.destination_domain.to_be_bytes());
        out.extend_from_slice(&self.nonce.to_be_bytes());
        out.extend_from_slice(self.sender.as_slice());
        out.extend_from_slice(self.recipient.as_slice());
        out.extend_from_slice(self.destination_caller.as_slice());
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, BridgeError> {
        if bytes.len() < HEADER_LEN {
            return Err(BridgeError::MessageTooShort {
                length: bytes.len(),
                expected: HEADER_LEN,
            });
        }
        Ok(Self {
            version: be_u32(&bytes[0..4]),
            source_domain: be_u32(&bytes[4..8]),
            destination_domain: be_u32(&bytes[8..12]),
            nonce: be_u64(&bytes[12..20]),
            sender: B256::from_slice(&bytes[20..52]),
            recipient: B256::from_slice(&bytes[52..84]),
            destination_caller: B256::from_slice(&bytes[84..116]),
        })
    }
}

impl BurnBody {
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.version.to_be_bytes());
        out.extend_from_slice(self.burn_token.as_slice());
        out.extend_from_slice(self.mint_recipient.as_slice());
        out.extend_from_slice(&self.amount.to_be_bytes::<32>());
        out.extend_from_slice(self.message_sender.as_slice());
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, BridgeError> {
        if bytes.len() < BODY_LEN {
            return Err(BridgeError::MessageTooShort {
                length: HEADER_LEN + bytes.len(),
                expected: BURN_MESSAGE_LEN,
            });
        }
        Ok(Self {
            version: be_u32(&bytes[0..4]),
            burn_token: B256::from_slice(&bytes[4..36]),
            mint_recipient: B256::from_slice(&bytes[36..68]),
            amount: U256::from_be_slice(&bytes[68..100]),
            message_sender: B256::from_slice(&bytes[100..132]),
        })
    }
}

impl BurnMessage {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(BURN_MESSAGE_LEN);
        self.header.encode_into(&mut out);
        self.body.encode_into(&mut out);
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, BridgeError> {
        let header = MessageHeader::decode(bytes)?;
        let body = BurnBody::decode(&bytes[HEADER_LEN..])?;
        Ok(Self { header, body })
    }

    /// The correlation key used against the attestation service.
    pub fn hash(&self) -> B256 {
        keccak256(self.encode())
    }
}

/// Hash of raw message bytes without decoding them first.
pub fn message_hash(bytes: &[u8]) -> B256 {
    keccak256(bytes)
}

/// Left-pad a 20-byte address into the 32-byte field the wire format uses.
pub fn pad_address(addr: Address) -> B256 {
    B256::left_padding_from(addr.as_slice())
}

/// Recover an address from a left-padded 32-byte field.
pub fn unpad_address(word: B256) -> Address {
    Address::from_slice(&word.as_slice()[12..])
}

fn be_u32(bytes: &[u8]) -> u32 {
    u32::from_be_bytes(bytes.try_into().expect("slice length checked by caller"))
}

fn be_u64(bytes: &[u8]) -> u64 {
    u64::from_be_bytes(bytes.try_into().expect("slice length checked by caller"))
}
