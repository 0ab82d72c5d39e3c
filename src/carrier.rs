//! Carrier snapshots
//!
//! The carrier is the rigid body the soft-body network hangs from. The engine
//! never holds a reference to it; callers pass a [`CarrierState`] into every
//! step and the integrator keeps the previous one for sub-step interpolation.

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::f32::consts::{PI, TAU};

/// Rigid transform of the carrier (translation, rotation, scale)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CarrierTransform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for CarrierTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl CarrierTransform {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            scale: Vec3::ONE,
        }
    }

    pub fn from_position(position: Vec3) -> Self {
        Self::new(position, Quat::IDENTITY)
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Local-to-world matrix
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// Interpolate towards `target`: position linearly, rotation spherically.
    /// Scale is taken from `target`.
    pub fn interpolate(&self, target: &Self, t: f32) -> Self {
        Self {
            position: self.position.lerp(target.position, t),
            rotation: self.rotation.slerp(target.rotation, t),
            scale: target.scale,
        }
    }

    pub fn translated(&self, delta: Vec3) -> Self {
        Self {
            position: self.position + delta,
            ..*self
        }
    }
}

/// One snapshot of the carrier: transform plus animation phase (radians)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CarrierState {
    pub transform: CarrierTransform,
    pub phase: f32,
}

impl CarrierState {
    pub fn new(transform: CarrierTransform, phase: f32) -> Self {
        Self { transform, phase }
    }

    /// Interpolated snapshot between `self` (previous) and `target` (current).
    /// Returns `target` exactly for `t >= 1`.
    pub fn interpolate(&self, target: &Self, t: f32) -> Self {
        if t >= 1.0 {
            return *target;
        }
        Self {
            transform: self.transform.interpolate(&target.transform, t),
            phase: self.phase + shortest_angle(self.phase, target.phase) * t,
        }
    }
}

/// Signed angular difference `to - from`, wrapped into [-PI, PI)
pub fn shortest_angle(from: f32, to: f32) -> f32 {
    (to - from + PI).rem_euclid(TAU) - PI
}
