//! Error types for network assembly

use thiserror::Error;

use crate::Gid;

/// Result type for assembly operations
pub type Result<T> = std::result::Result<T, NetError>;

/// Errors that can occur while assembling a network
///
/// Every variant is fatal for the current run. Assembly is a pure function of
/// its configuration, so nothing here is ever retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NetError {
    /// Malformed or missing configuration
    #[error("Invalid network configuration: {reason}")]
    Configuration {
        /// Reason for invalid configuration
        reason: String,
    },

    /// Invalid parameter value
    #[error("Invalid parameter {parameter}: {value} (expected {constraint})")]
    InvalidParameter {
        /// Parameter name
        parameter: String,
        /// Invalid value
        value: String,
        /// Constraint description
        constraint: String,
    },

    /// Feed kind tag outside the closed set
    #[error("Unknown feed kind '{tag}'")]
    UnknownFeedKind {
        /// The unrecognized tag
        tag: String,
    },

    /// Two populations declared under one name
    #[error("Duplicate population name '{name}'")]
    DuplicatePopulation {
        /// Offending name
        name: String,
    },

    /// State machine transition invoked out of sequence
    #[error("Operation '{operation}' is not valid in state {state}")]
    Ordering {
        /// Requested operation
        operation: &'static str,
        /// State the assembler was in
        state: String,
    },

    /// Gid outside every allocated range
    #[error("Gid {gid} is outside the allocated range 0..{total}")]
    GidOutOfRange {
        /// Gid that was looked up
        gid: Gid,
        /// Total number of allocated gids
        total: u32,
    },

    /// Gid not owned by this rank, or of the wrong kind
    #[error("Gid {gid} is not a local {what} of rank {rank}")]
    NotLocal {
        /// Gid that was looked up
        gid: Gid,
        /// Kind of agent that was expected
        what: &'static str,
        /// Rank the lookup ran on
        rank: usize,
    },

    /// Worker communication failure
    #[error("Communication failure on rank {rank}: {reason}")]
    Communication {
        /// Rank that observed the failure
        rank: usize,
        /// Reason for the failure
        reason: String,
    },
}

impl NetError {
    /// Create an invalid configuration error
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(
        parameter: impl Into<String>,
        value: impl Into<String>,
        constraint: impl Into<String>,
    ) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            value: value.into(),
            constraint: constraint.into(),
        }
    }

    /// Create an ordering error
    pub fn ordering(operation: &'static str, state: impl ToString) -> Self {
        Self::Ordering {
            operation,
            state: state.to_string(),
        }
    }

    /// Create a communication error
    pub fn communication(rank: usize, reason: impl Into<String>) -> Self {
        Self::Communication {
            rank,
            reason: reason.into(),
        }
    }

    /// True for the configuration class of errors
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Configuration { .. }
                | Self::InvalidParameter { .. }
                | Self::UnknownFeedKind { .. }
                | Self::DuplicatePopulation { .. }
        )
    }

    /// True for out-of-sequence state machine calls
    pub fn is_ordering(&self) -> bool {
        matches!(self, Self::Ordering { .. })
    }

    /// True for failed gid lookups
    pub fn is_lookup(&self) -> bool {
        matches!(self, Self::GidOutOfRange { .. } | Self::NotLocal { .. })
    }
}
