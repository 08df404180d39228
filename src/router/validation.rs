// Pre-flight validation module
// Protocol-independent checks that run synchronously before any network
// call, so a request that cannot succeed never touches an endpoint.

use tracing::debug;

use crate::errors::BridgeError;
use crate::protocols::BridgeRequest;

#[derive(Debug, Clone, Default)]
pub struct Validator {
    /// Empty means any destination is allowed.
    allowed_destinations: Vec<u64>,
}

impl Validator {
    pub fn new(allowed_destinations: Vec<u64>) -> Self {
        Self { allowed_destinations }
    }

    pub fn validate(&self, req: &BridgeRequest, source_chain: u64) -> Result<(), BridgeError> {
        if req.destination_chain == source_chain {
            return Err(BridgeError::SameChain { chain: source_chain });
        }

        if !self.allowed_destinations.is_empty()
            && !self.allowed_destinations.contains(&req.destination_chain)
        {
            return Err(BridgeError::DestinationNotAllowed {
                chain: req.destination_chain,
                allowed: self.allowed_destinations.clone(),
            });
        }

        // Recipient arrives pre-parsed when it came through the typed API;
        // the JSON surface funnels through parse_recipient below first.
        debug!(dest = req.destination_chain, "pre-flight validation passed");
        Ok(())
    }
}

/// Syntactic recipient check for string surfaces: 0x-prefixed 20-byte hex.
pub fn parse_recipient(raw: &str) -> Result<alloy_primitives::Address, BridgeError> {
    raw.parse().map_err(|_| BridgeError::InvalidRecipient {
        address: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocols::TokenDescriptor;

    fn request(dest: u64) -> BridgeRequest {
        BridgeRequest {
            token: TokenDescriptor::usdc(),
            amount: "100".into(),
            destination_chain: dest,
            recipient: None,
            protocol: None,
        }
    }

    #[test]
    fn same_chain_is_rejected_before_anything_else() {
        let validator = Validator::new(vec![1]); // dest 1 would otherwise pass
        let err = validator.validate(&request(1), 1).unwrap_err();
        assert!(matches!(err, BridgeError::SameChain { chain: 1 }));
    }

    #[test]
    fn allow_list_rejects_other_destinations_listing_the_set() {
        let validator = Validator::new(vec![1, 8453]);
        let err = validator.validate(&request(42161), 1).unwrap_err();
        match err {
            BridgeError::DestinationNotAllowed { chain, allowed } => {
                assert_eq!(chain, 42161);
                assert_eq!(allowed, vec![1, 8453]);
            }
            other => panic!("expected DestinationNotAllowed, got {other:?}"),
        }
        assert!(validator.validate(&request(8453), 1).is_ok());
    }

    #[test]
    fn empty_allow_list_means_any_destination() {
        let validator = Validator::default();
        assert!(validator.validate(&request(42161), 1).is_ok());
        assert!(validator.validate(&request(999_999), 1).is_ok());
    }

    #[test]
    fn recipient_strings_must_be_well_formed_addresses() {
        assert!(parse_recipient("0x2222222222222222222222222222222222222222").is_ok());
        assert!(parse_recipient("0x1234").is_err());
        assert!(parse_recipient("not-an-address").is_err());
        assert!(parse_recipient("0xzz22222222222222222222222222222222222222").is_err());
    }
}
