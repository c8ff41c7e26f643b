//! In-memory L1 endpoint and the registrar controller behind it.
//!
//! This is the receiving side of the relay, run locally: the allowlist gate,
//! the commitment store, the commit window, rent and the final registry write.
//! It lets a registration plan be rehearsed end to end without a chain, and it
//! is what the client components are tested against.

use alloy_primitives::{Address, B256, U256};
use std::collections::{HashMap, HashSet};

use crate::chain::eip155::ChainSelector;
use crate::commitment::{Commitment, RegistrationRequest};
use crate::error::RelayError;
use crate::registrar::eth_node;
use crate::registration::CommitWindow;
use crate::relay::message::{RelayCall, RelayMessage};
use crate::timestamp::UnixTimestamp;

/// Minimum registration duration accepted by the ENS controller (28 days).
pub const MIN_REGISTRATION_DURATION: u64 = 28 * 24 * 60 * 60;

/// What a delivered message did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Committed(Commitment),
    /// The commitment was already stored and unexpired. Nothing changed.
    AlreadyCommitted(Commitment),
    Registered {
        name: String,
        owner: Address,
        expires: UnixTimestamp,
        /// Part of the attached payment kept by the endpoint.
        refund: U256,
    },
}

/// The name registry controller: commitments, rent and ownership.
#[derive(Debug, Clone)]
pub struct LocalRegistrar {
    window: CommitWindow,
    /// Rent in wei per second of registration.
    price_per_second: U256,
    commitments: HashMap<B256, UnixTimestamp>,
    names: HashMap<String, (Address, UnixTimestamp)>,
}

impl LocalRegistrar {
    pub fn new(window: CommitWindow, price_per_second: U256) -> Self {
        Self {
            window,
            price_per_second,
            commitments: HashMap::new(),
            names: HashMap::new(),
        }
    }

    pub fn window(&self) -> CommitWindow {
        self.window
    }

    pub fn commitment_time(&self, commitment: &Commitment) -> Option<UnixTimestamp> {
        self.commitments.get(&commitment.as_b256()).copied()
    }

    pub fn rent_price(&self, duration: u64) -> U256 {
        self.price_per_second.saturating_mul(U256::from(duration))
    }

    pub fn available(&self, name: &str, now: UnixTimestamp) -> bool {
        match self.names.get(name) {
            Some((_, expires)) => *expires <= now,
            None => true,
        }
    }

    pub fn owner_of(&self, name: &str) -> Option<Address> {
        self.names.get(name).map(|(owner, _)| *owner)
    }

    /// Owner of the unexpired name whose `.eth` namehash is `node`.
    pub fn owner_of_node(&self, node: B256, now: UnixTimestamp) -> Option<Address> {
        self.names
            .iter()
            .find(|(name, (_, expires))| *expires > now && eth_node(name) == node)
            .map(|(_, (owner, _))| *owner)
    }

    /// Stores `commitment` at `now`. An unexpired commitment is left untouched.
    pub fn commit(&mut self, commitment: Commitment, now: UnixTimestamp) -> Delivery {
        if let Some(at) = self.commitment_time(&commitment) {
            if !self.window.is_expired(at, now) {
                return Delivery::AlreadyCommitted(commitment);
            }
        }
        self.commitments.insert(commitment.as_b256(), now);
        Delivery::Committed(commitment)
    }

    /// Reveals `request`, paid with `value`. Every check runs before anything is
    /// consumed, so a rejected call leaves the commitment in place.
    pub fn register(
        &mut self,
        request: &RegistrationRequest,
        value: U256,
        now: UnixTimestamp,
    ) -> Result<Delivery, RelayError> {
        let commitment = request.commitment();
        let committed_at = self
            .commitment_time(&commitment)
            .ok_or(RelayError::CommitmentNotFound(commitment.as_b256()))?;
        self.window.check(committed_at, now)?;
        if !self.available(request.name(), now) {
            return Err(RelayError::NameUnavailable(request.name().to_string()));
        }
        if request.duration() < MIN_REGISTRATION_DURATION {
            return Err(RelayError::InvalidDuration);
        }
        if !request.resolver_data().is_empty() && request.resolver().is_none() {
            return Err(RelayError::ResolverRequired);
        }
        let price = self.rent_price(request.duration());
        if value < price {
            return Err(RelayError::InsufficientPayment {
                sent: value,
                required: price,
            });
        }

        self.commitments.remove(&commitment.as_b256());
        let expires = now + request.duration();
        self.names
            .insert(request.name().to_string(), (request.owner(), expires));
        Ok(Delivery::Registered {
            name: request.name().to_string(),
            owner: request.owner(),
            expires,
            refund: value - price,
        })
    }
}

/// The L1 relay endpoint: owner-administered allowlist in front of a registrar.
#[derive(Debug, Clone)]
pub struct LocalL1Endpoint {
    owner: Address,
    allowed_chains: HashSet<ChainSelector>,
    allowed_senders: HashSet<Address>,
    balance: U256,
    registrar: LocalRegistrar,
}

impl LocalL1Endpoint {
    pub fn new(owner: Address, registrar: LocalRegistrar) -> Self {
        Self {
            owner,
            allowed_chains: HashSet::new(),
            allowed_senders: HashSet::new(),
            balance: U256::ZERO,
            registrar,
        }
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn balance(&self) -> U256 {
        self.balance
    }

    pub fn fund(&mut self, amount: U256) {
        self.balance = self.balance.saturating_add(amount);
    }

    pub fn registrar(&self) -> &LocalRegistrar {
        &self.registrar
    }

    fn only_owner(&self, caller: Address) -> Result<(), RelayError> {
        if caller != self.owner {
            return Err(RelayError::NotOwner(caller));
        }
        Ok(())
    }

    pub fn allowlist_source_chain(
        &mut self,
        caller: Address,
        selector: ChainSelector,
        allowed: bool,
    ) -> Result<(), RelayError> {
        self.only_owner(caller)?;
        if allowed {
            self.allowed_chains.insert(selector);
        } else {
            self.allowed_chains.remove(&selector);
        }
        Ok(())
    }

    pub fn allowlist_sender(
        &mut self,
        caller: Address,
        sender: Address,
        allowed: bool,
    ) -> Result<(), RelayError> {
        self.only_owner(caller)?;
        if allowed {
            self.allowed_senders.insert(sender);
        } else {
            self.allowed_senders.remove(&sender);
        }
        Ok(())
    }

    pub fn is_chain_allowed(&self, selector: ChainSelector) -> bool {
        self.allowed_chains.contains(&selector)
    }

    pub fn is_sender_allowed(&self, sender: Address) -> bool {
        self.allowed_senders.contains(&sender)
    }

    /// Handles a message delivered by the channel at L1 time `now`.
    ///
    /// Messages from a source chain or sender that is not allowed are rejected
    /// before their payload is even decoded. A rejected message changes nothing.
    pub fn receive(
        &mut self,
        message: &RelayMessage,
        now: UnixTimestamp,
    ) -> Result<Delivery, RelayError> {
        if !self.is_chain_allowed(message.source_chain_selector)
            || !self.is_sender_allowed(message.sender)
        {
            return Err(RelayError::AllowlistRejected {
                selector: message.source_chain_selector,
                sender: message.sender,
            });
        }
        match message.call()? {
            RelayCall::Commit(commitment) => Ok(self.registrar.commit(commitment, now)),
            RelayCall::Register(request) => {
                if request.reverse_record() {
                    return Err(RelayError::ReverseRecordUnsupported);
                }
                let delivery = self.registrar.register(&request, message.value, now)?;
                if let Delivery::Registered { refund, .. } = &delivery {
                    self.balance = self.balance.saturating_add(*refund);
                }
                Ok(delivery)
            }
        }
    }

    /// Empties the balance. Returns the amount the beneficiary receives, zero when
    /// there was nothing to send.
    pub fn withdraw(&mut self, caller: Address) -> Result<U256, RelayError> {
        self.only_owner(caller)?;
        Ok(std::mem::take(&mut self.balance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CommitTimingViolation;
    use crate::networks::KnownNetwork;
    use crate::testing::{
        L2_ENDPOINT, MIN_COMMITMENT_AGE, SIGNER, example_request, local_endpoint,
    };

    const T0: u64 = 1_700_000_000;

    fn ts(secs: u64) -> UnixTimestamp {
        UnixTimestamp::from_secs(secs)
    }

    fn message(call: RelayCall) -> RelayMessage {
        RelayMessage::new(ChainSelector::base_sepolia(), L2_ENDPOINT, &call)
    }

    fn allowed_endpoint() -> LocalL1Endpoint {
        let mut endpoint = local_endpoint();
        endpoint
            .allowlist_source_chain(SIGNER, ChainSelector::base_sepolia(), true)
            .unwrap();
        endpoint.allowlist_sender(SIGNER, L2_ENDPOINT, true).unwrap();
        endpoint
    }

    fn committed_endpoint() -> (LocalL1Endpoint, U256) {
        let mut endpoint = allowed_endpoint();
        let request = example_request();
        endpoint
            .receive(&message(RelayCall::Commit(request.commitment())), ts(T0))
            .unwrap();
        let price = endpoint.registrar().rent_price(request.duration());
        (endpoint, price)
    }

    fn register_message(request: RegistrationRequest, value: U256) -> RelayMessage {
        message(RelayCall::Register(request)).with_value(value)
    }

    #[test]
    fn test_allowlist_gate_all_combinations() {
        let commitment = example_request().commitment();
        for chain_allowed in [false, true] {
            for sender_allowed in [false, true] {
                let mut endpoint = local_endpoint();
                endpoint
                    .allowlist_source_chain(SIGNER, ChainSelector::base_sepolia(), chain_allowed)
                    .unwrap();
                endpoint
                    .allowlist_sender(SIGNER, L2_ENDPOINT, sender_allowed)
                    .unwrap();
                let result = endpoint.receive(&message(RelayCall::Commit(commitment)), ts(T0));
                if chain_allowed && sender_allowed {
                    assert_eq!(result.unwrap(), Delivery::Committed(commitment));
                } else {
                    assert!(
                        matches!(result, Err(RelayError::AllowlistRejected { .. })),
                        "chain {chain_allowed} sender {sender_allowed}"
                    );
                    assert_eq!(endpoint.registrar().commitment_time(&commitment), None);
                }
            }
        }
    }

    #[test]
    fn test_other_chain_or_sender_rejected() {
        let mut endpoint = allowed_endpoint();
        let call = RelayCall::Commit(example_request().commitment());
        let other_chain =
            RelayMessage::new(ChainSelector::arbitrum_sepolia(), L2_ENDPOINT, &call);
        assert!(endpoint.receive(&other_chain, ts(T0)).is_err());
        let other_sender =
            RelayMessage::new(ChainSelector::base_sepolia(), Address::with_last_byte(9), &call);
        assert!(endpoint.receive(&other_sender, ts(T0)).is_err());
    }

    #[test]
    fn test_only_owner_configures() {
        let mut endpoint = local_endpoint();
        let stranger = Address::with_last_byte(0x42);
        assert!(matches!(
            endpoint.allowlist_sender(stranger, stranger, true),
            Err(RelayError::NotOwner(_))
        ));
        assert!(matches!(
            endpoint.allowlist_source_chain(stranger, ChainSelector::base_sepolia(), true),
            Err(RelayError::NotOwner(_))
        ));
        assert!(matches!(endpoint.withdraw(stranger), Err(RelayError::NotOwner(_))));
        assert!(!endpoint.is_sender_allowed(stranger));
    }

    #[test]
    fn test_replayed_commit_is_noop() {
        let (mut endpoint, _) = committed_endpoint();
        let commitment = example_request().commitment();
        let replay = endpoint
            .receive(&message(RelayCall::Commit(commitment)), ts(T0 + 30))
            .unwrap();
        assert_eq!(replay, Delivery::AlreadyCommitted(commitment));
        assert_eq!(
            endpoint.registrar().commitment_time(&commitment),
            Some(ts(T0))
        );
    }

    #[test]
    fn test_expired_commit_can_be_renewed() {
        let (mut endpoint, _) = committed_endpoint();
        let commitment = example_request().commitment();
        let later = ts(T0) + endpoint.registrar().window().max_age;
        let renewed = endpoint
            .receive(&message(RelayCall::Commit(commitment)), later)
            .unwrap();
        assert_eq!(renewed, Delivery::Committed(commitment));
        assert_eq!(endpoint.registrar().commitment_time(&commitment), Some(later));
    }

    #[test]
    fn test_round_trip_and_tampered_copy() {
        let (mut endpoint, price) = committed_endpoint();
        let at = ts(T0) + MIN_COMMITMENT_AGE;

        let tampered = RegistrationRequest::new(
            "example",
            Address::with_last_byte(0xee),
            example_request().duration(),
            example_request().secret(),
        )
        .with_resolver(example_request().resolver_or_zero());
        assert!(matches!(
            endpoint.receive(&register_message(tampered, price), at),
            Err(RelayError::CommitmentNotFound(_))
        ));

        let delivery = endpoint
            .receive(&register_message(example_request(), price), at)
            .unwrap();
        assert!(matches!(delivery, Delivery::Registered { ref name, .. } if name == "example"));
        assert_eq!(
            endpoint.registrar().owner_of("example"),
            Some(example_request().owner())
        );
        // The commitment is consumed.
        assert_eq!(
            endpoint.registrar().commitment_time(&example_request().commitment()),
            None
        );
        assert!(!endpoint.registrar().available("example", at));
    }

    #[test]
    fn test_timing_window() {
        let (mut endpoint, price) = committed_endpoint();
        let window = endpoint.registrar().window();

        let too_early = endpoint.receive(
            &register_message(example_request(), price),
            ts(T0) + (window.min_age - 1),
        );
        assert!(matches!(
            too_early,
            Err(RelayError::CommitTiming(CommitTimingViolation::TooEarly { .. }))
        ));

        let mut late = endpoint.clone();
        let too_late = late.receive(
            &register_message(example_request(), price),
            ts(T0) + (window.max_age + 1),
        );
        assert!(matches!(
            too_late,
            Err(RelayError::CommitTiming(CommitTimingViolation::TooLate { .. }))
        ));

        let on_time = endpoint.receive(
            &register_message(example_request(), price),
            ts(T0) + window.min_age,
        );
        assert!(on_time.is_ok());
    }

    #[test]
    fn test_register_without_commit_fails_fast() {
        let mut endpoint = allowed_endpoint();
        let price = endpoint.registrar().rent_price(example_request().duration());
        assert!(matches!(
            endpoint.receive(&register_message(example_request(), price), ts(T0)),
            Err(RelayError::CommitmentNotFound(_))
        ));
    }

    #[test]
    fn test_payment_checks() {
        let (mut endpoint, price) = committed_endpoint();
        let at = ts(T0) + MIN_COMMITMENT_AGE;
        let short = price - U256::from(1u64);
        assert_eq!(
            endpoint
                .receive(&register_message(example_request(), short), at)
                .unwrap_err()
                .to_string(),
            RelayError::InsufficientPayment {
                sent: short,
                required: price
            }
            .to_string()
        );
        // Nothing consumed by the failed attempt.
        assert!(endpoint
            .registrar()
            .commitment_time(&example_request().commitment())
            .is_some());

        let extra = U256::from(1_000u64);
        let delivery = endpoint
            .receive(&register_message(example_request(), price + extra), at)
            .unwrap();
        assert!(matches!(delivery, Delivery::Registered { refund, .. } if refund == extra));
        assert_eq!(endpoint.balance(), extra);
    }

    #[test]
    fn test_reverse_record_rejected() {
        let mut endpoint = allowed_endpoint();
        let request = example_request().with_reverse_record(true);
        endpoint
            .receive(&message(RelayCall::Commit(request.commitment())), ts(T0))
            .unwrap();
        let price = endpoint.registrar().rent_price(request.duration());
        assert!(matches!(
            endpoint.receive(&register_message(request, price), ts(T0) + MIN_COMMITMENT_AGE),
            Err(RelayError::ReverseRecordUnsupported)
        ));
    }

    #[test]
    fn test_withdraw_empties_balance() {
        let mut endpoint = local_endpoint();
        endpoint.fund(U256::from(123u64));
        assert_eq!(endpoint.withdraw(SIGNER).unwrap(), U256::from(123u64));
        assert_eq!(endpoint.balance(), U256::ZERO);
        assert_eq!(endpoint.withdraw(SIGNER).unwrap(), U256::ZERO);
    }
}
