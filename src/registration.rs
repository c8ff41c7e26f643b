//! Registration lifecycle.
//!
//! A registration moves `Uncommitted -> Committed -> Registered`, or ends up
//! `Expired` when the reveal does not land inside the commit window. The state
//! is never stored anywhere but in memory: it is derived from registrar reads,
//! so an interrupted run picks up where the chain says it is.

use alloy_primitives::TxHash;
use std::fmt::{Display, Formatter};

use crate::error::{CommitTimingViolation, RelayError};
use crate::timestamp::UnixTimestamp;

/// Registrar's commit window, in seconds after the commit was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitWindow {
    pub min_age: u64,
    pub max_age: u64,
}

impl CommitWindow {
    pub fn new(min_age: u64, max_age: u64) -> Self {
        Self { min_age, max_age }
    }

    pub fn ready_at(&self, committed_at: UnixTimestamp) -> UnixTimestamp {
        committed_at + self.min_age
    }

    pub fn expires_at(&self, committed_at: UnixTimestamp) -> UnixTimestamp {
        committed_at + self.max_age
    }

    pub fn is_expired(&self, committed_at: UnixTimestamp, now: UnixTimestamp) -> bool {
        now >= self.expires_at(committed_at)
    }

    /// Registration is allowed from `committed_at + min_age` (inclusive) until
    /// `committed_at + max_age` (exclusive).
    pub fn check(
        &self,
        committed_at: UnixTimestamp,
        now: UnixTimestamp,
    ) -> Result<(), CommitTimingViolation> {
        let ready_at = self.ready_at(committed_at);
        if now < ready_at {
            return Err(CommitTimingViolation::TooEarly { ready_at, now });
        }
        let expired_at = self.expires_at(committed_at);
        if now >= expired_at {
            return Err(CommitTimingViolation::TooLate { expired_at, now });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationState {
    Uncommitted,
    Committed { at: UnixTimestamp },
    Registered,
    Expired { at: UnixTimestamp },
}

impl Display for RegistrationState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistrationState::Uncommitted => write!(f, "uncommitted"),
            RegistrationState::Committed { at } => write!(f, "committed at {at}"),
            RegistrationState::Registered => write!(f, "registered"),
            RegistrationState::Expired { at } => write!(f, "expired (committed at {at})"),
        }
    }
}

impl RegistrationState {
    /// Derives the state from what the registrar reports at L1 time `now`.
    ///
    /// `committed_at` is the stored commit time of the request's commitment, `None`
    /// when the registrar holds none (never delivered, or consumed by a registration).
    /// An unavailable name without a commitment reads as `Registered`, so callers
    /// must first rule out that someone else holds it.
    pub fn derive(
        committed_at: Option<UnixTimestamp>,
        name_available: bool,
        window: &CommitWindow,
        now: UnixTimestamp,
    ) -> Self {
        match committed_at {
            Some(at) if window.is_expired(at, now) => RegistrationState::Expired { at },
            Some(at) => RegistrationState::Committed { at },
            None if !name_available => RegistrationState::Registered,
            None => RegistrationState::Uncommitted,
        }
    }

    fn can_move_to(&self, next: &RegistrationState) -> bool {
        use RegistrationState::*;
        if self == next {
            return true;
        }
        match (self, next) {
            (Uncommitted, Committed { .. } | Registered) => true,
            (Committed { .. }, Registered) => true,
            (Committed { at }, Expired { at: expired }) => at == expired,
            (Expired { .. }, Committed { .. } | Registered) => true,
            _ => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RegistrationState::Registered)
    }
}

/// In-run record of a registration: its current state and every transaction
/// submitted for it.
#[derive(Debug, Clone)]
pub struct RegistrationTracker {
    state: RegistrationState,
    approve_tx: Option<TxHash>,
    commit_tx: Option<TxHash>,
    register_tx: Option<TxHash>,
}

impl Default for RegistrationTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistrationTracker {
    pub fn new() -> Self {
        Self {
            state: RegistrationState::Uncommitted,
            approve_tx: None,
            commit_tx: None,
            register_tx: None,
        }
    }

    pub fn state(&self) -> RegistrationState {
        self.state
    }

    pub fn approve_tx(&self) -> Option<TxHash> {
        self.approve_tx
    }

    pub fn commit_tx(&self) -> Option<TxHash> {
        self.commit_tx
    }

    pub fn register_tx(&self) -> Option<TxHash> {
        self.register_tx
    }

    /// Moves to `next`, rejecting transitions the registrar can never produce.
    pub fn advance(&mut self, next: RegistrationState) -> Result<(), RelayError> {
        if !self.state.can_move_to(&next) {
            return Err(RelayError::StateTransition {
                from: self.state,
                to: next,
            });
        }
        if self.state != next {
            tracing::info!(from = %self.state, to = %next, "Registration state changed");
        }
        self.state = next;
        Ok(())
    }

    /// Adopts `observed` as the current state without a transition check.
    ///
    /// Used once at the start of a run: whatever the registrar reports is where a
    /// previous, interrupted run left off.
    pub fn resume(&mut self, observed: RegistrationState) {
        if self.state != observed {
            tracing::info!(state = %observed, "Resuming from observed state");
        }
        self.state = observed;
    }

    pub fn record_approve(&mut self, tx: TxHash) {
        self.approve_tx = Some(tx);
    }

    pub fn record_commit(&mut self, tx: TxHash) {
        self.commit_tx = Some(tx);
    }

    pub fn record_register(&mut self, tx: TxHash) {
        self.register_tx = Some(tx);
    }
}
