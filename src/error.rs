//! Error taxonomy shared by every relay operation.
//!
//! Local validation failures ([`RelayError::InvalidAddress`] and friends) are raised
//! before any transaction is built. Everything else is reported by a chain, either
//! as a failed transport call or as a reverted transaction.

use alloy_primitives::{Address, B256, TxHash, U256};

use crate::chain::eip155::{ChainSelector, MetaTransactionSendError};
use crate::registration::RegistrationState;
use crate::timestamp::UnixTimestamp;

/// Register attempted outside of the commitment's validity window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CommitTimingViolation {
    #[error("commitment is too new: registration allowed from {ready_at}, now {now}")]
    TooEarly {
        ready_at: UnixTimestamp,
        now: UnixTimestamp,
    },
    #[error("commitment is too old: expired at {expired_at}, now {now}")]
    TooLate {
        expired_at: UnixTimestamp,
        now: UnixTimestamp,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Invalid {field} address: {value}")]
    InvalidAddress { field: &'static str, value: String },
    #[error("Commitment must be 32 bytes, got {0}")]
    InvalidCommitment(usize),
    #[error("Registration duration is zero or below the registrar minimum")]
    InvalidDuration,
    #[error("Resolver is required when resolver data is supplied")]
    ResolverRequired,
    #[error("Reverse record can only be set by the owner itself, not through the relay")]
    ReverseRecordUnsupported,
    #[error("Insufficient payment: sent {sent}, required {required}")]
    InsufficientPayment { sent: U256, required: U256 },
    #[error("Message from chain {selector} sender {sender} is not allowlisted")]
    AllowlistRejected {
        selector: ChainSelector,
        sender: Address,
    },
    #[error(transparent)]
    CommitTiming(#[from] CommitTimingViolation),
    #[error("Commitment {0} was never recorded on L1")]
    CommitmentNotFound(B256),
    #[error("Commitment {commitment} was not delivered to L1 within {waited_secs}s")]
    CommitNotDelivered { commitment: B256, waited_secs: u64 },
    #[error("Registration of {name} not observed on L1 within {waited_secs}s")]
    RegistrationNotObserved { name: String, waited_secs: u64 },
    #[error("Registration cannot move from {from} to {to}")]
    StateTransition {
        from: RegistrationState,
        to: RegistrationState,
    },
    #[error("Name {0} is not available")]
    NameUnavailable(String),
    #[error("Caller {0} is not the endpoint owner")]
    NotOwner(Address),
    #[error("Transaction {0} reverted")]
    Reverted(TxHash),
    #[error("Contract call failed: {0}")]
    ContractCall(String),
    #[error(transparent)]
    Transaction(#[from] MetaTransactionSendError),
    #[error("Deployment for {chain} has no {field} configured")]
    Deployment { chain: String, field: &'static str },
    #[error("Operation cancelled")]
    Cancelled,
}

impl From<alloy_sol_types::Error> for RelayError {
    fn from(value: alloy_sol_types::Error) -> Self {
        RelayError::ContractCall(format!("{value}"))
    }
}
