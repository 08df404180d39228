// Typed contract bindings
// Inline sol! interfaces for the handful of calls and events the engines
// touch. Calldata building and log decoding go through these types only.

use alloy_sol_types::sol;

sol! {
    /// Minimal ERC-20 surface: balance, allowance, approve.
    interface IERC20 {
        function balanceOf(address owner) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
    }

    /// Burn side of the attestation protocol.
    interface ITokenMessenger {
        function depositForBurn(
            uint256 amount,
            uint32 destinationDomain,
            bytes32 mintRecipient,
            address burnToken
        ) external returns (uint64 nonce);
    }

    /// Mint side of the attestation protocol, plus nonce bookkeeping.
    interface IMessageTransmitter {
        function receiveMessage(bytes message, bytes attestation) external returns (bool success);
        function usedNonces(bytes32 nonceKey) external view returns (uint256);
        event MessageSent(bytes message);
    }

    /// Relay-network pool: deposit on the source chain, filled by a relayer
    /// on the destination chain.
    interface IRelayPool {
        function depositFor(
            address recipient,
            address token,
            uint256 amount,
            uint256 destinationChainId
        ) external;
        event FundsDeposited(address token, uint256 amount, uint256 destinationChainId, address recipient);
    }
}
