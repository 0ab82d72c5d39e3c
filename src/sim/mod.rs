//! Baked simulation: GPU-layout buffers, parallel kernels, fixed-step integrator

pub mod buffers;
pub mod integrator;
pub mod kernels;
pub mod turbulence;

pub use buffers::{BakedBuffers, GpuAnchor, GpuSkin, GpuSpring, GpuVertex, InfluencerSpan};
pub use integrator::{bake, SimState, SoftBody, StepStats};
pub use kernels::resolve_anchor;
pub use turbulence::TurbulenceField;
