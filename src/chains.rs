// Static chain registry
// Maps chain ids to protocol domains and the per-chain contract addresses
// the engines need. Lookups return Option so an unsupported chain is a
// typed outcome, never a panic.

use alloy_primitives::{address, Address};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainInfo {
    pub chain_id: u64,
    pub name: &'static str,
    /// Attestation-protocol domain. Distinct from the chain id.
    pub domain: u32,
    pub usdc: Address,
    pub token_messenger: Address,
    pub message_transmitter: Address,
    pub relay_pool: Address,
    pub native_symbol: &'static str,
}

pub static CHAINS: &[ChainInfo] = &[
    ChainInfo {
        chain_id: 1,
        name: "ethereum",
        domain: 0,
        usdc: address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"),
        token_messenger: address!("bd3fa81b58ba92a82136038b25adec7066af3155"),
        message_transmitter: address!("0a992d191deec32afe36203ad87d7d289a738f81"),
        relay_pool: address!("5c7bcd6e7de5423a257d81b442095a1a6ced35c5"),
        native_symbol: "ETH",
    },
    ChainInfo {
        chain_id: 43114,
        name: "avalanche",
        domain: 1,
        usdc: address!("b97ef9ef8734c71904d8002f8b6bc66dd9c48a6e"),
        token_messenger: address!("6b25532e1060ce10cc3b0a99e5683b91bfde6982"),
        message_transmitter: address!("8186359af5f57fbb40c6b14a588d2a59c0c29880"),
        relay_pool: address!("0000000000000000000000000000000000000000"),
        native_symbol: "AVAX",
    },
    ChainInfo {
        chain_id: 10,
        name: "optimism",
        domain: 2,
        usdc: address!("0b2c639c533813f4aa9d7837cacdc7371c7fbcbe"),
        token_messenger: address!("2b4069517957735be00cee0fadae88a26365528f"),
        message_transmitter: address!("4d41f22c5a0e5c74090899e5a8fb597a8842b3e8"),
        relay_pool: address!("6f26bf09b1c792e3228e5467807a900a503c0281"),
        native_symbol: "ETH",
    },
    ChainInfo {
        chain_id: 42161,
        name: "arbitrum",
        domain: 3,
        usdc: address!("af88d065e77c8cc2239327c5edb3a432268e5831"),
        token_messenger: address!("19330d10d9cc8751218eaf51e8885d058642e08a"),
        message_transmitter: address!("c30362313fbba5cf9163f0bb16a0e01f01a896ca"),
        relay_pool: address!("e35e9842fceaca96570b734083f4a58e8f7c5f2a"),
        native_symbol: "ETH",
    },
    ChainInfo {
        chain_id: 8453,
        name: "base",
        domain: 6,
        usdc: address!("833589fcd6edb6e08f4c7c32d4f71b54bda02913"),
        token_messenger: address!("1682ae6375c4e4a97e4b583bc394c861a46d8962"),
        message_transmitter: address!("ad09780d193884d503182ad4588450c416d6f9d4"),
        relay_pool: address!("09aea4b2242abc8bb4bb78d537a67a245a7bec64"),
        native_symbol: "ETH",
    },
    ChainInfo {
        chain_id: 137,
        name: "polygon",
        domain: 7,
        usdc: address!("3c499c542cef5e3811e1192ce70d8cc03d5c3359"),
        token_messenger: address!("9daf8c91aefae50b9c0e69629d3f6ca40ca3b3fe"),
        message_transmitter: address!("f3be9355363857f3e001be68856a2f96b4c39ba9"),
        relay_pool: address!("9295ee1d8c5b022be115a2ad3c30c72e34e7f096"),
        native_symbol: "POL",
    },
];

pub fn by_chain_id(chain_id: u64) -> Option<&'static ChainInfo> {
    CHAINS.iter().find(|c| c.chain_id == chain_id)
}

pub fn by_domain(domain: u32) -> Option<&'static ChainInfo> {
    CHAINS.iter().find(|c| c.domain == domain)
}

pub fn domain_for_chain(chain_id: u64) -> Option<u32> {
    by_chain_id(chain_id).map(|c| c.domain)
}

/// Chains the relay network currently operates pools on.
pub fn relay_supported(chain_id: u64) -> bool {
    by_chain_id(chain_id).is_some_and(|c| c.relay_pool != Address::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_and_domain_lookups_agree() {
        for chain in CHAINS {
            assert_eq!(by_chain_id(chain.chain_id), Some(chain));
            assert_eq!(by_domain(chain.domain), Some(chain));
        }
    }

    #[test]
    fn unknown_chain_is_a_typed_outcome() {
        assert!(by_chain_id(999_999).is_none());
        assert!(domain_for_chain(999_999).is_none());
        assert!(by_domain(255).is_none());
    }

    #[test]
    fn avalanche_has_no_relay_pool() {
        assert!(!relay_supported(43114));
        assert!(relay_supported(1));
        assert!(relay_supported(42161));
    }
}
