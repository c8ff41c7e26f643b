//! Client for registering ENS names from an L2 through a cross-chain relay.
//!
//! Registration on the L1 name registry is a two-step commit/reveal. This crate
//! runs both steps from an L2: calls go to an L2 endpoint contract, travel through
//! a cross-chain messaging channel, and are replayed by an L1 endpoint against the
//! registrar controller. The L1 endpoint only honors messages from allowlisted
//! source chains and senders.
//!
//! # Modules
//!
//! - [`commitment`] - the registration request and its commitment hash.
//! - [`relay`] - L2 relay client, L1 allowlist administration, the channel message.
//! - [`payment`] - payment token approval for the L2 endpoint.
//! - [`withdraw`] - sweeping native balance off either endpoint.
//! - [`registrar`] - read-only view of the L1 registrar controller.
//! - [`registration`] - registration states and the commit window.
//! - [`flow`] - end-to-end registration, resumable from on-chain state.
//! - [`endpoint_local`] - in-memory L1 endpoint and registrar.
//! - [`chain`] - CAIP-2 ids, channel selectors and the alloy-based provider.
//! - [`deployment`], [`networks`], [`config`] - where everything is deployed.

pub mod chain;
pub mod commitment;
pub mod config;
pub mod contracts;
pub mod deployment;
pub mod endpoint_local;
pub mod error;
pub mod flow;
pub mod networks;
pub mod payment;
pub mod registrar;
pub mod registration;
pub mod relay;
pub mod timestamp;
pub mod util;
pub mod withdraw;

#[cfg(test)]
pub(crate) mod testing;
