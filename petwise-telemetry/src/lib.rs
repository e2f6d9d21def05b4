//! # petwise-telemetry
//!
//! Logging initialisation and phase timing for the Petwise crates.
//!
//! Every crate logs through `tracing` macros with structured fields; binaries
//! call [`init_telemetry`] once at startup to install a subscriber. The
//! [`PhaseTimer`] records the named, ordered phase durations that end up in
//! each turn's evaluation log.

mod init;
mod phase;

pub use init::{LogFormat, TelemetryError, init_telemetry};
pub use phase::{PhaseTimer, PhaseTiming};

// Re-export tracing for convenience
pub use tracing::{debug, error, info, trace, warn};
