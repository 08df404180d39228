// Tracking identifier registry
// Opaque, self-describing identifiers of the form
// {protocol}-{sourceChainId}-{destChainId}-{unixMillis}-{randomSuffix}.
// They round-trip losslessly and are validated against this exact shape
// before any embedded field is trusted.

use std::fmt;
use std::str::FromStr;

use rand::Rng;

use crate::errors::BridgeError;
use crate::protocols::ProtocolId;

const SUFFIX_LEN: usize = 8;
const SUFFIX_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingId {
    pub protocol: ProtocolId,
    pub source_chain: u64,
    pub dest_chain: u64,
    pub minted_at_ms: u64,
    pub suffix: String,
}

impl TrackingId {
    /// Mint a fresh identifier. Immutable once minted and never reused:
    /// the millisecond timestamp plus a 36^8 random suffix keeps collisions
    /// negligible even for many mints in the same millisecond.
    pub fn mint(protocol: ProtocolId, source_chain: u64, dest_chain: u64) -> Self {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..SUFFIX_LEN)
            .map(|_| SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())] as char)
            .collect();
        Self {
            protocol,
            source_chain,
            dest_chain,
            minted_at_ms: crate::now_unix_ms(),
            suffix,
        }
    }
}

impl fmt::Display for TrackingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}-{}-{}",
            self.protocol, self.source_chain, self.dest_chain, self.minted_at_ms, self.suffix
        )
    }
}

impl FromStr for TrackingId {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = |reason: &str| BridgeError::InvalidTrackingId(format!("{s:?}: {reason}"));

        let parts: Vec<&str> = s.split('-').collect();
        if parts.len() != 5 {
            return Err(malformed("expected exactly 5 dash-separated fields"));
        }
        let protocol: ProtocolId = parts[0]
            .parse()
            .map_err(|_| malformed("unknown protocol tag"))?;
        let source_chain: u64 = parts[1]
            .parse()
            .map_err(|_| malformed("source chain id is not a number"))?;
        let dest_chain: u64 = parts[2]
            .parse()
            .map_err(|_| malformed("destination chain id is not a number"))?;
        let minted_at_ms: u64 = parts[3]
            .parse()
            .map_err(|_| malformed("timestamp is not a number"))?;
        let suffix = parts[4];
        if suffix.is_empty() || !suffix.bytes().all(|b| SUFFIX_ALPHABET.contains(&b)) {
            return Err(malformed("suffix must be lowercase alphanumeric"));
        }
        Ok(Self {
            protocol,
            source_chain,
            dest_chain,
            minted_at_ms,
            suffix: suffix.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn display_shape_is_five_dash_separated_fields() {
        let id = TrackingId::mint(ProtocolId::Cctp, 1, 42161);
        let text = id.to_string();
        assert!(text.starts_with("cctp-1-42161-"));
        assert_eq!(text.split('-').count(), 5);
    }

    #[test]
    fn round_trips_losslessly() {
        for protocol in [ProtocolId::Cctp, ProtocolId::Relay] {
            let id = TrackingId::mint(protocol, 1, 8453);
            let reparsed: TrackingId = id.to_string().parse().unwrap();
            assert_eq!(reparsed, id);
        }
    }

    #[test]
    fn ten_thousand_mints_are_unique() {
        let ids: HashSet<String> = (0..10_000)
            .map(|_| TrackingId::mint(ProtocolId::Cctp, 1, 42161).to_string())
            .collect();
        assert_eq!(ids.len(), 10_000);
        for id in &ids {
            let parsed: TrackingId = id.parse().unwrap();
            assert_eq!(parsed.protocol, ProtocolId::Cctp);
            assert_eq!(parsed.source_chain, 1);
            assert_eq!(parsed.dest_chain, 42161);
        }
    }

    #[test]
    fn malformed_identifiers_are_rejected() {
        for bad in [
            "",
            "cctp-1-42161-123",                    // missing suffix
            "cctp-1-42161-123-abc-extra",          // too many fields
            "hop-1-42161-123-abcdefgh",            // unknown protocol
            "cctp-x-42161-123-abcdefgh",           // non-numeric chain
            "cctp-1-42161-soon-abcdefgh",          // non-numeric timestamp
            "cctp-1-42161-123-ABCDEFGH",           // uppercase suffix
            "CCTP-1-42161-123-abcdefgh",           // uppercase protocol tag
        ] {
            assert!(bad.parse::<TrackingId>().is_err(), "accepted {bad:?}");
        }
    }
}
