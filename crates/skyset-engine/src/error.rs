//! Engine error types

use thiserror::Error;

/// Transport-level outcome of a remote control-plane call.
///
/// `NotFound` is part of the protocol, not a fault: the state fetcher turns
/// it into a confirmed-absent entry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("resource not found")]
    NotFound,

    #[error("API error: {0}")]
    Api(String),

    #[error("timeout: {0}")]
    Timeout(String),
}

/// Convergence engine errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// Bad desired input, detected before any remote call is issued.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// A state read failed for something other than "not found". Fatal to
    /// the run: convergence never proceeds with unknown current state.
    #[error("failed to read current state of {resource}: {source}")]
    RemoteRead {
        resource: String,
        source: RemoteError,
    },

    /// A generated value could not be made globally unique.
    #[error("no unique value derived from '{seed}' after {attempts} attempts")]
    GenerationExhausted { seed: String, attempts: u32 },

    /// A create/update call failed. Contained to the node's dependency
    /// subtree; surfaced through the run report rather than aborting it.
    #[error("mutation of {resource} failed: {source}")]
    RemoteMutation {
        resource: String,
        source: RemoteError,
    },

    #[error("run cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, EngineError>;
