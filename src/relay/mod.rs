//! Both sides of the relay as seen from the client.
//!
//! - [`l2::L2RelayClient`] - commit and register through the L2 endpoint.
//! - [`l1::AllowlistConfigurator`] - which chains and senders the L1 endpoint accepts.
//! - [`message`] - the channel message and the registrar call it carries.

pub mod l1;
pub mod l2;
pub mod message;

pub use l1::*;
pub use l2::*;
pub use message::*;
