//! Scripted two-chain world for tests.
//!
//! [`MockWorld`] holds an L2 with a payment token and a relay endpoint, and an
//! L1 running [`LocalL1Endpoint`]. Calls on the L2 endpoint become channel
//! messages; they are delivered lazily, whenever L1 is next touched and the
//! configured latency has elapsed. Block time follows the tokio clock, so tests
//! with a paused runtime fast-forward through commit windows.

use alloy_primitives::{Address, Bytes, TxHash, U256, address, b256, keccak256};
use alloy_sol_types::{SolCall, SolInterface, SolValue};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

use crate::chain::eip155::{
    ChainSelector, Eip155ChainReference, Eip155MetaTransactionProvider, MetaTransaction,
    MetaTransactionSendError, SubmittedTransaction,
};
use crate::commitment::{Commitment, RegistrationRequest};
use crate::contracts::IERC20::IERC20Calls;
use crate::contracts::INameWrapper::INameWrapperCalls;
use crate::contracts::IRegistrarController::{self, IRegistrarControllerCalls};
use crate::contracts::IRelayL1::IRelayL1Calls;
use crate::contracts::IRelayL2::IRelayL2Calls;
use crate::contracts::IWithdrawable;
use crate::endpoint_local::{Delivery, LocalL1Endpoint, LocalRegistrar};
use crate::error::RelayError;
use crate::networks::KnownNetwork;
use crate::registration::CommitWindow;
use crate::relay::message::{RelayCall, RelayMessage};
use crate::timestamp::UnixTimestamp;

pub const SIGNER: Address = address!("0x2B5AD5c4795c026514f8317c7a215E218DcCD6cF");
pub const L1_ENDPOINT: Address = address!("0xF04A02c5Ec0dB6E363771C9171Ca00A4f33Eb298");
pub const L2_ENDPOINT: Address = address!("0xB0F30A5F70708c83c9d92A434DABe8372bE9Aa8c");
pub const CONTROLLER: Address = address!("0xfed6a969aaa60e4961fcd3ebf1a2e8913ac65b72");
pub const NAME_WRAPPER: Address = address!("0x0635513f179D50A207757E05759CbD106d7dFcE8");
pub const TOKEN: Address = address!("0xE4aB69C077896252FAFBD49EFD26B5D171A32410");

pub const MIN_COMMITMENT_AGE: u64 = 60;
pub const MAX_COMMITMENT_AGE: u64 = 86_400;
pub const PRICE_PER_SECOND: u64 = 1_000_000_000;
pub const GENESIS: u64 = 1_700_000_000;

pub const L1_CHAIN: u64 = 11155111;
pub const L2_CHAIN: u64 = 84532;

/// The request used throughout the tests: `example` for one year.
pub fn example_request() -> RegistrationRequest {
    RegistrationRequest::new(
        "example",
        address!("0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045"),
        31556952,
        b256!("0xdeadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeef"),
    )
    .with_resolver(address!("0x231b0Ee14048e9dCcD1d247744d114a4EB5E8E63"))
}

/// A fresh L1 endpoint owned by [`SIGNER`], with nothing allowed yet.
pub fn local_endpoint() -> LocalL1Endpoint {
    let registrar = LocalRegistrar::new(
        CommitWindow::new(MIN_COMMITMENT_AGE, MAX_COMMITMENT_AGE),
        U256::from(PRICE_PER_SECOND),
    );
    LocalL1Endpoint::new(SIGNER, registrar)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    L1,
    L2,
}

struct InFlight {
    deliver_at: UnixTimestamp,
    message: RelayMessage,
}

struct World {
    started: Instant,
    skew: u64,
    latency: u64,
    channel_open: bool,
    tx_count: u64,
    endpoint: LocalL1Endpoint,
    l1_balances: HashMap<Address, U256>,
    l2_balances: HashMap<Address, U256>,
    allowances: HashMap<(Address, Address), U256>,
    sent_l1: Vec<MetaTransaction>,
    sent_l2: Vec<MetaTransaction>,
    in_flight: Vec<InFlight>,
    deliveries: Vec<Result<Delivery, String>>,
}

impl World {
    fn now(&self) -> UnixTimestamp {
        UnixTimestamp::from_secs(GENESIS + self.started.elapsed().as_secs() + self.skew)
    }

    fn next_tx(&mut self, success: bool) -> SubmittedTransaction {
        self.tx_count += 1;
        SubmittedTransaction {
            hash: TxHash::from(keccak256(self.tx_count.to_be_bytes())),
            block_number: Some(self.tx_count),
            success,
        }
    }

    /// Hands every due message to the L1 endpoint, in send order.
    fn pump(&mut self) {
        if !self.channel_open {
            return;
        }
        let now = self.now();
        let (due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.in_flight)
            .into_iter()
            .partition(|m| m.deliver_at <= now);
        self.in_flight = pending;
        for InFlight { message, .. } in due {
            let outcome = self.endpoint.receive(&message, now).map_err(|e| e.to_string());
            self.deliveries.push(outcome);
        }
    }

    fn forward(&mut self, data: Bytes, value: U256) {
        let message = RelayMessage {
            source_chain_selector: ChainSelector::base_sepolia(),
            sender: L2_ENDPOINT,
            data,
            value,
        };
        let deliver_at = self.now() + self.latency;
        self.in_flight.push(InFlight {
            deliver_at,
            message,
        });
    }

    fn sweep(balances: &mut HashMap<Address, U256>, from: Address, to: Address) {
        let amount = balances.remove(&from).unwrap_or_default();
        *balances.entry(to).or_default() += amount;
    }

    fn execute_l2(&mut self, signer: Address, tx: &MetaTransaction) -> Result<(), String> {
        if tx.to == TOKEN {
            let IERC20Calls::approve(call) =
                IERC20Calls::abi_decode(&tx.calldata).map_err(|e| e.to_string())?
            else {
                return Err("unsupported token call".into());
            };
            self.allowances.insert((signer, call.spender), call.value);
            return Ok(());
        }
        if tx.to != L2_ENDPOINT {
            return Err(format!("no contract at {}", tx.to));
        }
        if tx.calldata.starts_with(&IWithdrawable::withdrawCall::SELECTOR) {
            let call = IWithdrawable::withdrawCall::abi_decode(&tx.calldata)
                .map_err(|e| e.to_string())?;
            if signer != self.endpoint.owner() {
                return Err("not owner".into());
            }
            Self::sweep(&mut self.l2_balances, L2_ENDPOINT, call.beneficiary);
            return Ok(());
        }
        match IRelayL2Calls::abi_decode(&tx.calldata).map_err(|e| e.to_string())? {
            IRelayL2Calls::commit(_) | IRelayL2Calls::register(_) => {
                self.forward(tx.calldata.clone(), tx.value);
                Ok(())
            }
        }
    }

    fn execute_l1(&mut self, signer: Address, tx: &MetaTransaction) -> Result<(), String> {
        if tx.to != L1_ENDPOINT {
            return Err(format!("no contract at {}", tx.to));
        }
        if tx.calldata.starts_with(&IWithdrawable::withdrawCall::SELECTOR) {
            let call = IWithdrawable::withdrawCall::abi_decode(&tx.calldata)
                .map_err(|e| e.to_string())?;
            let amount = self.endpoint.withdraw(signer).map_err(|e| e.to_string())?;
            *self.l1_balances.entry(call.beneficiary).or_default() += amount;
            return Ok(());
        }
        let result = match IRelayL1Calls::abi_decode(&tx.calldata).map_err(|e| e.to_string())? {
            IRelayL1Calls::allowlistSourceChain(call) => self.endpoint.allowlist_source_chain(
                signer,
                ChainSelector::new(call.sourceChainSelector),
                call.allowed,
            ),
            IRelayL1Calls::allowlistSender(call) => {
                self.endpoint
                    .allowlist_sender(signer, call.sender, call.allowed)
            }
            _ => Err(RelayError::ContractCall("view called as transaction".into())),
        };
        result.map_err(|e| e.to_string())
    }

    fn read_l2(&self, to: Address, data: &[u8]) -> Result<Vec<u8>, String> {
        if to != TOKEN {
            return Err(format!("no contract at {to}"));
        }
        match IERC20Calls::abi_decode(data).map_err(|e| e.to_string())? {
            IERC20Calls::allowance(call) => Ok(self
                .allowances
                .get(&(call.owner, call.spender))
                .copied()
                .unwrap_or_default()
                .abi_encode()),
            IERC20Calls::approve(_) => Err("approve is not a view".into()),
        }
    }

    fn read_l1(&self, to: Address, data: &[u8]) -> Result<Vec<u8>, String> {
        let now = self.now();
        if to == L1_ENDPOINT {
            return match IRelayL1Calls::abi_decode(data).map_err(|e| e.to_string())? {
                IRelayL1Calls::allowlistedSourceChains(call) => Ok(self
                    .endpoint
                    .is_chain_allowed(ChainSelector::new(call.sourceChainSelector))
                    .abi_encode()),
                IRelayL1Calls::allowlistedSenders(call) => {
                    Ok(self.endpoint.is_sender_allowed(call.sender).abi_encode())
                }
                _ => Err("not a view".into()),
            };
        }
        if to == NAME_WRAPPER {
            let INameWrapperCalls::ownerOf(call) =
                INameWrapperCalls::abi_decode(data).map_err(|e| e.to_string())?;
            let owner = self
                .endpoint
                .registrar()
                .owner_of_node(call.id.to_be_bytes::<32>().into(), now)
                .unwrap_or_default();
            return Ok(owner.abi_encode());
        }
        if to != CONTROLLER {
            return Err(format!("no contract at {to}"));
        }
        let registrar = self.endpoint.registrar();
        let encoded = match IRegistrarControllerCalls::abi_decode(data).map_err(|e| e.to_string())? {
            IRegistrarControllerCalls::commitments(call) => {
                let at = Commitment::from_slice(call.commitment.as_slice())
                    .ok()
                    .and_then(|c| registrar.commitment_time(&c))
                    .map(|t| t.as_secs())
                    .unwrap_or_default();
                U256::from(at).abi_encode()
            }
            IRegistrarControllerCalls::minCommitmentAge(_) => {
                U256::from(registrar.window().min_age).abi_encode()
            }
            IRegistrarControllerCalls::maxCommitmentAge(_) => {
                U256::from(registrar.window().max_age).abi_encode()
            }
            IRegistrarControllerCalls::rentPrice(call) => {
                let duration = call.duration.saturating_to::<u64>();
                (registrar.rent_price(duration), U256::ZERO).abi_encode_params()
            }
            IRegistrarControllerCalls::available(call) => {
                registrar.available(&call.name, now).abi_encode()
            }
            IRegistrarControllerCalls::nameWrapper(_) => NAME_WRAPPER.abi_encode(),
            IRegistrarControllerCalls::makeCommitment(call) => {
                let register = IRegistrarController::registerCall {
                    name: call.name,
                    owner: call.owner,
                    duration: call.duration,
                    secret: call.secret,
                    resolver: call.resolver,
                    data: call.data,
                    reverseRecord: call.reverseRecord,
                    ownerControlledFuses: call.ownerControlledFuses,
                };
                let RelayCall::Register(request) =
                    RelayCall::decode(&register.abi_encode()).map_err(|e| e.to_string())?
                else {
                    return Err("register did not decode as register".into());
                };
                request.commitment().as_b256().abi_encode()
            }
            _ => return Err("not a view".into()),
        };
        Ok(encoded)
    }
}

/// Both chains and the channel between them.
#[derive(Clone)]
pub struct MockWorld {
    inner: Arc<Mutex<World>>,
}

impl Default for MockWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl MockWorld {
    pub fn new() -> Self {
        let world = World {
            started: Instant::now(),
            skew: 0,
            latency: 0,
            channel_open: true,
            tx_count: 0,
            endpoint: local_endpoint(),
            l1_balances: HashMap::new(),
            l2_balances: HashMap::new(),
            allowances: HashMap::new(),
            sent_l1: Vec::new(),
            sent_l2: Vec::new(),
            in_flight: Vec::new(),
            deliveries: Vec::new(),
        };
        Self {
            inner: Arc::new(Mutex::new(world)),
        }
    }

    /// Channel messages take `secs` of block time to reach L1.
    pub fn with_latency(self, secs: u64) -> Self {
        self.inner.lock().unwrap().latency = secs;
        self
    }

    pub fn l1(&self) -> MockChain {
        self.l1_as(SIGNER)
    }

    pub fn l1_as(&self, signer: Address) -> MockChain {
        MockChain {
            world: self.inner.clone(),
            side: Side::L1,
            chain: Eip155ChainReference::new(L1_CHAIN),
            signer,
        }
    }

    pub fn l2(&self) -> MockChain {
        MockChain {
            world: self.inner.clone(),
            side: Side::L2,
            chain: Eip155ChainReference::new(L2_CHAIN),
            signer: SIGNER,
        }
    }

    /// Lets messages from the L2 endpoint through, as the endpoint owner would.
    pub fn allow_l2(&self) {
        let mut world = self.inner.lock().unwrap();
        world
            .endpoint
            .allowlist_source_chain(SIGNER, ChainSelector::base_sepolia(), true)
            .unwrap();
        world.endpoint.allowlist_sender(SIGNER, L2_ENDPOINT, true).unwrap();
    }

    /// Stops or resumes delivery. Messages sent meanwhile wait in flight.
    pub fn set_channel_open(&self, open: bool) {
        self.inner.lock().unwrap().channel_open = open;
    }

    /// Moves both chains' block time forward without waiting.
    pub fn skip(&self, secs: u64) {
        self.inner.lock().unwrap().skew += secs;
    }

    pub fn now(&self) -> UnixTimestamp {
        self.inner.lock().unwrap().now()
    }

    /// Messages sent on L2 and not yet delivered.
    pub fn in_flight(&self) -> Vec<RelayMessage> {
        let world = self.inner.lock().unwrap();
        world.in_flight.iter().map(|m| m.message.clone()).collect()
    }

    /// Outcome of every delivered message, in delivery order.
    pub fn deliveries(&self) -> Vec<Result<Delivery, String>> {
        let mut world = self.inner.lock().unwrap();
        world.pump();
        world.deliveries.clone()
    }

    /// Snapshot of the L1 endpoint after pending deliveries.
    pub fn endpoint(&self) -> LocalL1Endpoint {
        let mut world = self.inner.lock().unwrap();
        world.pump();
        world.endpoint.clone()
    }

    pub fn fund_l1(&self, address: Address, amount: U256) {
        let mut world = self.inner.lock().unwrap();
        if address == L1_ENDPOINT {
            world.endpoint.fund(amount);
        } else {
            *world.l1_balances.entry(address).or_default() += amount;
        }
    }

    pub fn fund_l2(&self, address: Address, amount: U256) {
        *self
            .inner
            .lock()
            .unwrap()
            .l2_balances
            .entry(address)
            .or_default() += amount;
    }
}

/// One side of a [`MockWorld`], signing as a fixed address.
#[derive(Clone)]
pub struct MockChain {
    world: Arc<Mutex<World>>,
    side: Side,
    chain: Eip155ChainReference,
    signer: Address,
}

impl MockChain {
    /// L2 of a world of its own.
    pub fn l2() -> Self {
        MockWorld::new().l2()
    }

    /// L1 of a world of its own.
    pub fn l1() -> Self {
        MockWorld::new().l1()
    }

    /// Transactions submitted on this chain, from any signer.
    pub fn sent(&self) -> Vec<MetaTransaction> {
        let world = self.world.lock().unwrap();
        match self.side {
            Side::L1 => world.sent_l1.clone(),
            Side::L2 => world.sent_l2.clone(),
        }
    }
}

impl Eip155MetaTransactionProvider for MockChain {
    fn chain(&self) -> &Eip155ChainReference {
        &self.chain
    }

    fn signer_address(&self) -> Address {
        self.signer
    }

    /// Executes `tx` at once. Failed execution yields a reverted receipt, not an error.
    async fn send_transaction(
        &self,
        tx: MetaTransaction,
    ) -> Result<SubmittedTransaction, MetaTransactionSendError> {
        let mut world = self.world.lock().unwrap();
        let outcome = match self.side {
            Side::L1 => {
                world.pump();
                world.sent_l1.push(tx.clone());
                world.execute_l1(self.signer, &tx)
            }
            Side::L2 => {
                world.sent_l2.push(tx.clone());
                world.execute_l2(self.signer, &tx)
            }
        };
        if let Err(reason) = &outcome {
            tracing::debug!(%reason, to = %tx.to, "Mock transaction reverted");
        }
        Ok(world.next_tx(outcome.is_ok()))
    }

    async fn call(&self, to: Address, calldata: Bytes) -> Result<Bytes, MetaTransactionSendError> {
        let mut world = self.world.lock().unwrap();
        let output = match self.side {
            Side::L1 => {
                world.pump();
                world.read_l1(to, &calldata)
            }
            Side::L2 => world.read_l2(to, &calldata),
        };
        output
            .map(Bytes::from)
            .map_err(MetaTransactionSendError::Custom)
    }

    async fn balance(&self, address: Address) -> Result<U256, MetaTransactionSendError> {
        let mut world = self.world.lock().unwrap();
        let balance = match self.side {
            Side::L1 => {
                world.pump();
                if address == L1_ENDPOINT {
                    world.endpoint.balance()
                } else {
                    world.l1_balances.get(&address).copied().unwrap_or_default()
                }
            }
            Side::L2 => world.l2_balances.get(&address).copied().unwrap_or_default(),
        };
        Ok(balance)
    }

    async fn latest_timestamp(&self) -> Result<UnixTimestamp, MetaTransactionSendError> {
        let mut world = self.world.lock().unwrap();
        if self.side == Side::L1 {
            world.pump();
        }
        Ok(world.now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::IRelayL2;

    #[tokio::test]
    async fn test_message_waits_for_latency() {
        let world = MockWorld::new().with_latency(30);
        world.allow_l2();
        let commitment = example_request().commitment();
        let call = IRelayL2::commitCall {
            commitment: commitment.as_b256(),
        };
        world
            .l2()
            .send_transaction(MetaTransaction::new(L2_ENDPOINT, call.abi_encode()))
            .await
            .unwrap();

        assert!(world.deliveries().is_empty());
        assert_eq!(world.in_flight().len(), 1);
        world.skip(30);
        assert_eq!(world.deliveries(), vec![Ok(Delivery::Committed(commitment))]);
        assert!(world.in_flight().is_empty());
    }

    #[tokio::test]
    async fn test_failed_execution_is_a_reverted_receipt() {
        let world = MockWorld::new();
        let receipt = world
            .l1()
            .send_transaction(MetaTransaction::new(Address::with_last_byte(1), Bytes::new()))
            .await
            .unwrap();
        assert!(!receipt.success);
    }
}
