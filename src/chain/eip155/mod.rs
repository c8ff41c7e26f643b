//! EVM chain access via EIP-155.
//!
//! - [`Eip155ChainReference`] - numeric chain id (`11155111` for Sepolia).
//! - [`ChainSelector`] - the messaging channel's identifier for a network.
//! - [`Eip155ChainProvider`] - signing provider with pending-aware nonce management.
//! - [`Eip155MetaTransactionProvider`] - the submission and read surface the relay
//!   components are written against.

pub mod config;
pub mod pending_nonce_manager;
pub mod provider;
pub mod types;

pub use pending_nonce_manager::*;
pub use provider::*;
pub use types::*;
