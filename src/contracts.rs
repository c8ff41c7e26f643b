//! Call surfaces of the contracts the relay talks to, and thin helpers to
//! read from and transact with them through an [`Eip155MetaTransactionProvider`].

use alloy_primitives::{Address, U256};
use alloy_sol_types::{SolCall, sol};

use crate::chain::eip155::{Eip155MetaTransactionProvider, MetaTransaction, SubmittedTransaction};
use crate::error::RelayError;

sol! {
    #[allow(missing_docs)]
    #[derive(Debug)]
    interface IERC20 {
        function approve(address spender, uint256 value) external returns (bool);
        function allowance(address owner, address spender) external view returns (uint256);
    }

    /// Relay endpoint on the L2, forwarding registration calls to the L1 endpoint.
    #[allow(missing_docs)]
    #[allow(clippy::too_many_arguments)]
    #[derive(Debug)]
    interface IRelayL2 {
        function commit(bytes32 commitment) external;
        function register(
            string name,
            address owner,
            uint256 duration,
            bytes32 secret,
            address resolver,
            bytes[] data,
            bool reverseRecord,
            uint16 ownerControlledFuses
        ) external payable;
    }

    /// Relay endpoint on the L1, receiving channel messages and calling the registrar.
    #[allow(missing_docs)]
    #[derive(Debug)]
    interface IRelayL1 {
        function allowlistSourceChain(uint64 sourceChainSelector, bool allowed) external;
        function allowlistSender(address sender, bool allowed) external;
        function allowlistedSourceChains(uint64 sourceChainSelector) external view returns (bool);
        function allowlistedSenders(address sender) external view returns (bool);
    }

    /// Owner-only sweep of native balance, present on both relay endpoints.
    #[allow(missing_docs)]
    #[derive(Debug)]
    interface IWithdrawable {
        function withdraw(address beneficiary) external;
    }

    /// ENS `ETHRegistrarController`.
    #[allow(missing_docs)]
    #[allow(clippy::too_many_arguments)]
    #[derive(Debug)]
    interface IRegistrarController {
        function commit(bytes32 commitment) external;
        function register(
            string name,
            address owner,
            uint256 duration,
            bytes32 secret,
            address resolver,
            bytes[] data,
            bool reverseRecord,
            uint16 ownerControlledFuses
        ) external payable;
        function makeCommitment(
            string name,
            address owner,
            uint256 duration,
            bytes32 secret,
            address resolver,
            bytes[] data,
            bool reverseRecord,
            uint16 ownerControlledFuses
        ) external pure returns (bytes32);
        function commitments(bytes32 commitment) external view returns (uint256);
        function minCommitmentAge() external view returns (uint256);
        function maxCommitmentAge() external view returns (uint256);
        function rentPrice(string name, uint256 duration) external view returns (uint256 base, uint256 premium);
        function available(string name) external view returns (bool);
        function nameWrapper() external view returns (address);
    }

    /// ENS `NameWrapper`, holder of every name the controller registers.
    #[allow(missing_docs)]
    #[derive(Debug)]
    interface INameWrapper {
        function ownerOf(uint256 id) external view returns (address owner);
    }
}

/// Executes a read-only call and decodes its return value.
pub async fn view<P, C>(provider: &P, to: Address, call: C) -> Result<C::Return, RelayError>
where
    P: Eip155MetaTransactionProvider,
    C: SolCall,
{
    let output = provider.call(to, call.abi_encode().into()).await?;
    let decoded = C::abi_decode_returns(&output)?;
    Ok(decoded)
}

/// Sends `call` to `to` with `value` attached, failing on a reverted receipt.
pub async fn transact<P, C>(
    provider: &P,
    to: Address,
    call: C,
    value: U256,
    confirmations: u64,
) -> Result<SubmittedTransaction, RelayError>
where
    P: Eip155MetaTransactionProvider,
    C: SolCall,
{
    let tx = MetaTransaction::new(to, call.abi_encode())
        .with_value(value)
        .with_confirmations(confirmations);
    let receipt = provider.send_transaction(tx).await?;
    if !receipt.success {
        return Err(RelayError::Reverted(receipt.hash));
    }
    Ok(receipt)
}
