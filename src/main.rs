//! Relay client entrypoint.
//!
//! Runs, in order and as configured:
//! - allowlisting of the L2 endpoint on the L1 endpoint,
//! - registration of one name, resuming from whatever state L1 reports,
//! - withdrawal of native balance from both endpoints.
//!
//! Environment:
//! - `.env` values loaded at startup
//! - `CONFIG` or `--config` selects the configuration file
//! - `RUST_LOG` sets the log filter
//! - `OTEL_*` variables enable OpenTelemetry export

use alloy_primitives::Address;
use dotenvy::dotenv;
use std::sync::Arc;

use ens_ccip_relay::chain::ChainRegistry;
use ens_ccip_relay::chain::eip155::{Eip155ChainProvider, Eip155MetaTransactionProvider};
use ens_ccip_relay::commitment::{RegistrationParams, RegistrationRequest};
use ens_ccip_relay::config::{Config, ConfigError};
use ens_ccip_relay::deployment::Deployment;
use ens_ccip_relay::flow::{FlowTargets, RegistrationFlow};
use ens_ccip_relay::relay::AllowlistConfigurator;
use ens_ccip_relay::util::{SigDown, Telemetry};
use ens_ccip_relay::withdraw::{Withdrawal, WithdrawalManager};

type Provider = Arc<Eip155ChainProvider>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env variables
    dotenv().ok();

    let _telemetry = Telemetry::init()?;

    let config = Config::load()?;
    let deployments = config.deployments();
    let chains: ChainRegistry<Provider> =
        ChainRegistry::from_deployments(&deployments.chain_configs(config.signer())).await?;

    let l1_deployment = deployments.require(config.l1())?;
    let l2_deployment = deployments.require(config.l2())?;
    let l1 = provider(&chains, l1_deployment)?;
    let l2 = provider(&chains, l2_deployment)?;

    let sig_down = SigDown::try_new()?;
    let cancel = sig_down.cancellation_token();

    if config.configure_allowlist() {
        let allowlist = AllowlistConfigurator::new(l1.clone(), l1_deployment.endpoint())
            .with_confirmations(l1_deployment.confirmations());
        allowlist
            .authorize(l2_deployment.selector()?, l2_deployment.endpoint())
            .await?;
    }

    if let Some(registration) = config.registration() {
        let params = RegistrationParams::from_config(registration, l2.signer_address());
        let request = RegistrationRequest::try_from(params)?;
        let targets = FlowTargets::from_deployments(l1_deployment, l2_deployment)?;
        tracing::info!(
            name = %request.name(),
            owner = %request.owner(),
            commitment = %request.commitment(),
            "Starting registration"
        );
        let mut flow = RegistrationFlow::new(
            request,
            registration.payment.wei(),
            l1.clone(),
            l2.clone(),
            targets,
            config.flow().clone(),
        )
        .with_confirmations(l2_deployment.confirmations());

        if let Err(e) = flow.run(&cancel).await {
            let tracker = flow.tracker();
            tracing::error!(
                state = %tracker.state(),
                approve_tx = ?tracker.approve_tx(),
                commit_tx = ?tracker.commit_tx(),
                register_tx = ?tracker.register_tx(),
                "Registration stopped: {e}"
            );
            sig_down.shutdown().await;
            return Err(e.into());
        }
    }

    if let Some(withdraw) = config.withdraw() {
        let beneficiary = withdraw
            .beneficiary
            .map(Address::from)
            .unwrap_or_else(|| l1.signer_address());
        for (provider, deployment) in [(&l1, l1_deployment), (&l2, l2_deployment)] {
            let manager = WithdrawalManager::new(provider.clone(), deployment.endpoint())
                .with_confirmations(deployment.confirmations());
            if let Withdrawal::Withdrawn { amount, tx } = manager.withdraw(beneficiary).await? {
                tracing::info!(chain = %deployment.chain_id(), %amount, tx = %tx.hash, "Endpoint balance withdrawn");
            }
        }
    }

    sig_down.shutdown().await;
    Ok(())
}

fn provider(chains: &ChainRegistry<Provider>, deployment: &Deployment) -> Result<Provider, ConfigError> {
    chains
        .by_chain_id(&deployment.chain_id())
        .cloned()
        .ok_or_else(|| ConfigError::MissingDeployment(deployment.chain_id()))
}
