//! A MESI and Dragon cache coherence protocol simulator.
//!
//! A fixed number of processors, each with a private set-associative cache,
//! replay instruction traces while a shared snooping bus keeps the caches
//! coherent. The simulation is cycle-stepped and deterministic.

pub mod bus;
pub mod cache;
pub mod commons;
pub mod error;
pub mod processor;
pub mod protocol;
pub mod simulator;
pub mod stats;
pub mod utils;

pub use commons::{Addr, Instr, Instructions, Protocol, SystemSpec};
pub use error::{ConfigError, SimError, TraceError};
pub use simulator::{simulate, Simulator};
pub use stats::{ProcStats, Report};
