//! Process-level helpers for the binary.
//!
//! - [`sig_down`] - cancellation on SIGINT/SIGTERM
//! - [`telemetry`] - tracing subscriber and optional OpenTelemetry export

pub mod sig_down;
pub mod telemetry;

pub use sig_down::*;
pub use telemetry::*;
