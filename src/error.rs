//! Error types for configuration, trace loading and the simulator as a whole.

use std::io;
use std::num::ParseIntError;
use std::path::PathBuf;

use thiserror::Error;

/// Rejected system configurations. Raised before any core is built.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown protocol `{0}` (expected MESI or Dragon)")]
    UnknownProtocol(String),

    #[error("{what} must be non-zero")]
    Zero { what: &'static str },

    #[error("{what} must be a power of two, got {value}")]
    NotPowerOfTwo { what: &'static str, value: u32 },

    #[error("cache size {cache_size} is not divisible into {assoc}-way sets of {block_size}-byte blocks")]
    Geometry {
        cache_size: u32,
        block_size: u32,
        assoc: u32,
    },

    #[error("{offset_bits} offset bits plus {index_bits} index bits exceed the 32-bit address")]
    AddressTooWide { offset_bits: u32, index_bits: u32 },

    #[error("{traces} traces supplied for {procs} processors")]
    TraceCount { traces: usize, procs: usize },
}

/// Why a single trace record was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("expected `<kind> <value>`, got `{0}`")]
    Shape(String),

    #[error("invalid instruction kind `{0}`")]
    Kind(String),

    #[error("`{0}` is not a hex number")]
    NotHex(String),

    #[error("invalid hex value `{value}`: {source}")]
    Value {
        value: String,
        source: ParseIntError,
    },
}

/// Failures while loading or tokenizing instruction traces.
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("cannot read trace for core {core} at {}", path.display())]
    Io {
        core: usize,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{}:{line}: {reason}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        reason: RecordError,
    },
}

#[derive(Debug, Error)]
pub enum SimError {
    #[error("invalid configuration")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Trace(#[from] TraceError),
}
