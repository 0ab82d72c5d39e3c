//! Error types for topology generation and simulation
//!
//! Two families:
//! - [`BuildError`] - configuration errors raised while generating a creature's graph
//! - [`SimError`] - sequencing and resource errors raised by the baked simulation
//!
//! Numerical degeneracies (zero-length springs, collapsed basis vectors) are
//! recovered locally inside the kernels and never surface here.

use thiserror::Error;

/// Fatal configuration errors reported by the topology generator
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildError {
    #[error("subdivision count must be positive, got {0}")]
    InvalidSubdivisions(usize),

    #[error("vertex {vertex} already has an anchor record")]
    DuplicateAnchor { vertex: u32 },

    #[error("margin requests {requested} columns but the bell's terminal row only has {available}")]
    MarginWiderThanBell { requested: usize, available: usize },

    #[error("margin column count {columns} does not evenly divide the bell's terminal row ({available})")]
    MarginNotDivisor { columns: usize, available: usize },

    #[error("margin has {rows} rows, but strands rooted on it need at least {required}")]
    MarginTooShallow { rows: usize, required: usize },

    #[error("{requested} strands requested but the margin only has {columns} columns")]
    TooManyStrands { requested: usize, columns: usize },

    #[error("tentacles require a margin to root on")]
    MissingMargin,

    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("vertex {vertex} has no anchor record to inherit from")]
    MissingAnchor { vertex: u32 },

    #[error("vertex {vertex} does not exist (graph has {count} vertices)")]
    UnknownVertex { vertex: u32, count: usize },
}

/// Errors raised by the bake stage and the integrator pipeline
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error("simulation is already baked")]
    AlreadyBaked,

    #[error("simulation has not been baked yet")]
    NotBaked,

    #[error("operation rejected while a fixed step is in progress")]
    StepInProgress,

    #[error("vertex {vertex} is out of range (buffer holds {count})")]
    VertexOutOfRange { vertex: u32, count: usize },

    #[error("snapshot holds {got} vertices, buffer holds {expected}")]
    SnapshotLength { expected: usize, got: usize },

    #[error("failed to allocate {buffer} buffer with {len} elements")]
    Allocation { buffer: &'static str, len: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_error_messages_name_the_mismatch() {
        let err = BuildError::MarginWiderThanBell {
            requested: 300,
            available: 200,
        };
        let msg = err.to_string();
        assert!(msg.contains("300"));
        assert!(msg.contains("200"));
    }

    #[test]
    fn test_sim_error_equality() {
        assert_eq!(SimError::AlreadyBaked, SimError::AlreadyBaked);
        assert_ne!(SimError::AlreadyBaked, SimError::NotBaked);
    }
}
