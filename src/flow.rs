//! End-to-end registration of one name through the relay.
//!
//! The flow never trusts its own memory over the chain: it observes the
//! registrar first and continues from there, so re-running after a crash or a
//! timeout resumes instead of starting over. Commits are relayed from L2 but
//! confirmed by reading L1, since an L2 receipt says nothing about delivery.

use alloy_primitives::{Address, U256};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::chain::eip155::{ChainSelector, Eip155MetaTransactionProvider};
use crate::commitment::{Commitment, RegistrationRequest};
use crate::config::FlowConfig;
use crate::deployment::Deployment;
use crate::error::{CommitTimingViolation, RelayError};
use crate::payment::PaymentApprover;
use crate::registrar::RegistrarView;
use crate::registration::{CommitWindow, RegistrationState, RegistrationTracker};
use crate::relay::{AllowlistConfigurator, L2RelayClient};
use crate::timestamp::UnixTimestamp;

/// Contracts a flow talks to on both chains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowTargets {
    pub l1_endpoint: Address,
    pub controller: Address,
    pub l2_endpoint: Address,
    pub l2_selector: ChainSelector,
    pub payment_token: Address,
}

impl FlowTargets {
    pub fn from_deployments(l1: &Deployment, l2: &Deployment) -> Result<Self, RelayError> {
        Ok(Self {
            l1_endpoint: l1.endpoint(),
            controller: l1.registrar()?,
            l2_endpoint: l2.endpoint(),
            l2_selector: l2.selector()?,
            payment_token: l2.payment_token()?,
        })
    }
}

pub struct RegistrationFlow<L1, L2> {
    request: RegistrationRequest,
    payment: U256,
    targets: FlowTargets,
    config: FlowConfig,
    l2: L2RelayClient<L2>,
    approver: PaymentApprover<L2>,
    registrar: RegistrarView<L1>,
    allowlist: AllowlistConfigurator<L1>,
    tracker: RegistrationTracker,
}

impl<L1, L2> RegistrationFlow<L1, L2>
where
    L1: Eip155MetaTransactionProvider + Clone,
    L2: Eip155MetaTransactionProvider + Clone,
{
    pub fn new(
        request: RegistrationRequest,
        payment: U256,
        l1: L1,
        l2: L2,
        targets: FlowTargets,
        config: FlowConfig,
    ) -> Self {
        Self {
            request,
            payment,
            l2: L2RelayClient::new(l2.clone(), targets.l2_endpoint),
            approver: PaymentApprover::new(l2, targets.payment_token),
            registrar: RegistrarView::new(l1.clone(), targets.controller),
            allowlist: AllowlistConfigurator::new(l1, targets.l1_endpoint),
            targets,
            config,
            tracker: RegistrationTracker::new(),
        }
    }

    /// Receipt confirmations to wait for on L2 submissions.
    pub fn with_confirmations(mut self, confirmations: u64) -> Self {
        self.l2 = self.l2.with_confirmations(confirmations);
        self.approver = self.approver.with_confirmations(confirmations);
        self
    }

    pub fn request(&self) -> &RegistrationRequest {
        &self.request
    }

    pub fn tracker(&self) -> &RegistrationTracker {
        &self.tracker
    }

    /// Drives the registration to `Registered`.
    ///
    /// Stops with [`RelayError::Cancelled`] as soon as `cancel` fires during a
    /// wait. Transactions already sent stay sent; their hashes are in [`Self::tracker`].
    #[instrument(skip_all, err, fields(name = %self.request.name(), commitment = %self.request.commitment()))]
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<RegistrationState, RelayError> {
        self.request.validate_for_relay()?;
        let commitment = self.request.commitment();
        self.check_commitment(commitment).await?;
        self.check_allowlist().await?;

        let window = self.registrar.commit_window().await?;
        let observation = self.registrar.observe(&self.request, &window).await?;
        self.tracker.resume(observation.state);
        if observation.state.is_terminal() {
            tracing::warn!("Name already registered, nothing to do");
            return Ok(observation.state);
        }

        if let Some(tx) = self
            .approver
            .ensure(self.targets.l2_endpoint, self.config.allowance)
            .await?
        {
            self.tracker.record_approve(tx.hash);
        }

        let committed_at = match observation.state {
            RegistrationState::Committed { at } => {
                tracing::info!(%at, "Commitment already on L1");
                at
            }
            RegistrationState::Uncommitted if self.tracker.commit_tx().is_some() => {
                tracing::info!("Commit already sent, waiting for delivery");
                self.await_commit(cancel, commitment, &window).await?
            }
            _ => {
                let tx = self.l2.commit(commitment).await?;
                self.tracker.record_commit(tx.hash);
                self.await_commit(cancel, commitment, &window).await?
            }
        };
        self.tracker
            .advance(RegistrationState::Committed { at: committed_at })?;

        self.await_ready(cancel, committed_at, &window).await?;
        self.preflight().await?;

        let tx = self.l2.register(&self.request, self.payment).await?;
        self.tracker.record_register(tx.hash);
        self.await_registration(cancel, committed_at, &window).await
    }

    async fn check_commitment(&self, commitment: Commitment) -> Result<(), RelayError> {
        let expected = self.registrar.make_commitment(&self.request).await?;
        if expected != commitment {
            return Err(RelayError::ContractCall(format!(
                "registrar computes commitment {expected}, local encoding gives {commitment}"
            )));
        }
        Ok(())
    }

    /// Reports a missing allowlist entry early. Messages would be dropped on L1
    /// otherwise, and the flow could only tell by timing out.
    async fn check_allowlist(&self) -> Result<(), RelayError> {
        let authorized = self
            .allowlist
            .is_authorized(self.targets.l2_selector, self.targets.l2_endpoint)
            .await?;
        if !authorized {
            tracing::warn!(
                selector = %self.targets.l2_selector,
                sender = %self.targets.l2_endpoint,
                "L2 endpoint is not allowlisted on L1; relayed calls will be rejected"
            );
        }
        Ok(())
    }

    async fn pause(&self, cancel: &CancellationToken, duration: Duration) -> Result<(), RelayError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(RelayError::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.config.poll_interval_secs.max(1))
    }

    /// `None` when the timeout is too large to land on the clock: wait forever.
    fn delivery_deadline(&self) -> Option<Instant> {
        Instant::now().checked_add(Duration::from_secs(self.config.delivery_timeout_secs))
    }

    fn past(deadline: Option<Instant>) -> bool {
        deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Polls L1 until a live commit time shows up for `commitment`.
    async fn await_commit(
        &self,
        cancel: &CancellationToken,
        commitment: Commitment,
        window: &CommitWindow,
    ) -> Result<UnixTimestamp, RelayError> {
        let deadline = self.delivery_deadline();
        loop {
            if let Some(at) = self.registrar.commitment_time(commitment).await? {
                let now = self.registrar.latest_timestamp().await?;
                if !window.is_expired(at, now) {
                    tracing::info!(%at, "Commitment delivered");
                    return Ok(at);
                }
            }
            if Self::past(deadline) {
                return Err(RelayError::CommitNotDelivered {
                    commitment: commitment.as_b256(),
                    waited_secs: self.config.delivery_timeout_secs,
                });
            }
            self.pause(cancel, self.poll_interval()).await?;
        }
    }

    /// Waits until L1 time reaches the start of the commit window.
    async fn await_ready(
        &mut self,
        cancel: &CancellationToken,
        committed_at: UnixTimestamp,
        window: &CommitWindow,
    ) -> Result<(), RelayError> {
        loop {
            let now = self.registrar.latest_timestamp().await?;
            match window.check(committed_at, now) {
                Ok(()) => return Ok(()),
                Err(CommitTimingViolation::TooEarly { ready_at, now }) => {
                    let wait = now.until(ready_at).max(Duration::from_secs(1));
                    tracing::info!(%ready_at, wait_secs = wait.as_secs(), "Waiting for commitment to mature");
                    self.pause(cancel, wait).await?;
                }
                Err(late @ CommitTimingViolation::TooLate { .. }) => {
                    self.tracker
                        .advance(RegistrationState::Expired { at: committed_at })?;
                    return Err(late.into());
                }
            }
        }
    }

    /// Rejects a register the registrar is bound to refuse, before paying for it.
    async fn preflight(&self) -> Result<(), RelayError> {
        let price = self
            .registrar
            .rent_price(self.request.name(), self.request.duration())
            .await?;
        let required = price.total();
        if self.payment < required {
            return Err(RelayError::InsufficientPayment {
                sent: self.payment,
                required,
            });
        }
        if !self.registrar.available(self.request.name()).await? {
            return Err(RelayError::NameUnavailable(self.request.name().to_string()));
        }
        tracing::info!(payment = %self.payment, %required, "Preflight passed");
        Ok(())
    }

    async fn await_registration(
        &mut self,
        cancel: &CancellationToken,
        committed_at: UnixTimestamp,
        window: &CommitWindow,
    ) -> Result<RegistrationState, RelayError> {
        let deadline = self.delivery_deadline();
        loop {
            let observation = self.registrar.observe(&self.request, window).await?;
            match observation.state {
                RegistrationState::Registered => {
                    self.tracker.advance(RegistrationState::Registered)?;
                    tracing::info!("Name registered");
                    return Ok(RegistrationState::Registered);
                }
                RegistrationState::Expired { at } => {
                    self.tracker.advance(observation.state)?;
                    return Err(CommitTimingViolation::TooLate {
                        expired_at: window.expires_at(at),
                        now: observation.now,
                    }
                    .into());
                }
                RegistrationState::Committed { .. } | RegistrationState::Uncommitted => {}
            }
            if Self::past(deadline) {
                tracing::warn!(%committed_at, "Registration not observed before deadline");
                return Err(RelayError::RegistrationNotObserved {
                    name: self.request.name().to_string(),
                    waited_secs: self.config.delivery_timeout_secs,
                });
            }
            self.pause(cancel, self.poll_interval()).await?;
        }
    }
}
