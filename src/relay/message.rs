//! What travels through the messaging channel.
//!
//! The L2 endpoint wraps registrar-controller calldata in a channel message; the
//! L1 endpoint authenticates the message by its source chain selector and sender,
//! then replays the calldata against the controller.

use alloy_primitives::{Address, Bytes, U256, hex};
use alloy_sol_types::{SolCall, SolInterface};

use crate::chain::eip155::ChainSelector;
use crate::commitment::{Commitment, RegistrationRequest};
use crate::contracts::IRegistrarController::{self, IRegistrarControllerCalls};
use crate::error::RelayError;

/// A registrar call carried by a relay message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayCall {
    Commit(Commitment),
    Register(RegistrationRequest),
}

impl RelayCall {
    /// Controller calldata for this call.
    pub fn encode(&self) -> Bytes {
        match self {
            RelayCall::Commit(commitment) => IRegistrarController::commitCall {
                commitment: commitment.as_b256(),
            }
            .abi_encode()
            .into(),
            RelayCall::Register(request) => register_call(request).abi_encode().into(),
        }
    }

    pub fn decode(data: &[u8]) -> Result<Self, RelayError> {
        match IRegistrarControllerCalls::abi_decode(data)? {
            IRegistrarControllerCalls::commit(call) => Ok(RelayCall::Commit(
                Commitment::from_slice(call.commitment.as_slice())?,
            )),
            IRegistrarControllerCalls::register(call) => {
                let duration = u64_from(call.duration, "duration")?;
                let mut request =
                    RegistrationRequest::new(call.name, call.owner, duration, call.secret)
                        .with_resolver_data(call.data)
                        .with_reverse_record(call.reverseRecord)
                        .with_fuses(call.ownerControlledFuses);
                if call.resolver != Address::ZERO {
                    request = request.with_resolver(call.resolver);
                }
                Ok(RelayCall::Register(request))
            }
            other => Err(RelayError::ContractCall(format!(
                "call 0x{} cannot be relayed",
                hex::encode(other.selector())
            ))),
        }
    }
}

/// Controller `register` call for `request`, argument for argument.
pub fn register_call(request: &RegistrationRequest) -> IRegistrarController::registerCall {
    IRegistrarController::registerCall {
        name: request.name().to_string(),
        owner: request.owner(),
        duration: U256::from(request.duration()),
        secret: request.secret(),
        resolver: request.resolver_or_zero(),
        data: request.resolver_data().to_vec(),
        reverseRecord: request.reverse_record(),
        ownerControlledFuses: request.fuses(),
    }
}

pub(crate) fn u64_from(value: U256, what: &str) -> Result<u64, RelayError> {
    if value > U256::from(u64::MAX) {
        return Err(RelayError::ContractCall(format!("{what} {value} exceeds u64")));
    }
    Ok(value.as_limbs()[0])
}

/// A message as delivered to the L1 endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayMessage {
    pub source_chain_selector: ChainSelector,
    pub sender: Address,
    pub data: Bytes,
    /// Native value that came with the message, available to pay the registrar.
    pub value: U256,
}

impl RelayMessage {
    pub fn new(source_chain_selector: ChainSelector, sender: Address, call: &RelayCall) -> Self {
        Self {
            source_chain_selector,
            sender,
            data: call.encode(),
            value: U256::ZERO,
        }
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    pub fn call(&self) -> Result<RelayCall, RelayError> {
        RelayCall::decode(&self.data)
    }
}
