//! # Medusa - anchored soft-body jellyfish
//!
//! A mass-spring network hung from a moving rigid carrier, plus the
//! procedural generator that builds the network for a creature.
//!
//! Data flows one way: [`topology::build`] produces a [`graph::SoftBodyGraph`],
//! [`sim::bake`] flattens it into parallel buffers, and [`sim::SoftBody::step`]
//! advances it frame by frame.

pub mod carrier;
pub mod config;
pub mod error;
pub mod graph;
pub mod shape;
pub mod sim;
pub mod topology;

pub use carrier::{CarrierState, CarrierTransform};
pub use config::SimConfig;
pub use error::{BuildError, SimError};
pub use sim::{bake, SoftBody};
pub use topology::{Creature, Species, SpeciesConfig};

/// Common imports for internal use
pub mod prelude {
    pub use crate::carrier::{CarrierState, CarrierTransform};
    pub use crate::config::SimConfig;
    pub use crate::error::{BuildError, SimError};
    pub use crate::graph::{Anchor, AnchorFrame, RestLength, SoftBodyGraph, VertexId};
    pub use crate::shape::{BellShape, ShapeFn};
    pub use crate::sim::{bake, SimState, SoftBody};
    pub use crate::topology::{Creature, Species, SpeciesConfig};
    pub use glam::{Quat, Vec3};
}
