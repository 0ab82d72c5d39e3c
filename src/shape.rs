//! Body shape seam
//!
//! The anchor-resolution kernel asks a [`ShapeFn`] for the carrier-local
//! resting position of a body-relative (zenith, azimuth) coordinate at a given
//! animation phase. The engine treats it as opaque; [`BellShape`] is the
//! pulsing bell used by the demo and presets, and any `Fn` closure with the
//! same signature works as well.

use glam::Vec3;
use noise::{NoiseFn, Perlin};
use std::f32::consts::PI;

/// Carrier-local displacement formula evaluated by the anchor kernel.
///
/// Implementations must be pure and continuous in every input. They are
/// evaluated concurrently from many kernel units.
pub trait ShapeFn: Send + Sync {
    /// Local position for `zenith` (0 at the pole, 1 at the equator) and
    /// `azimuth` (radians about the principal axis). `flatten` blends the
    /// lower bell towards its rim plane (0 = outer surface, 1 = subumbrella).
    fn position(&self, phase: f32, zenith: f32, azimuth: f32, flatten: f32) -> Vec3;
}

impl<F> ShapeFn for F
where
    F: Fn(f32, f32, f32, f32) -> Vec3 + Send + Sync,
{
    fn position(&self, phase: f32, zenith: f32, azimuth: f32, flatten: f32) -> Vec3 {
        self(phase, zenith, azimuth, flatten)
    }
}

/// Pulsing, slightly wobbly jellyfish bell
///
/// # Formula
/// ```text
/// zenith'  = zenith * (0.9 + 0.18 * n1)
/// phase'   = phase - lerp(0, 0.95 * zenith', zenith') + PI/2
/// radius   = (0.3 * sin(phase') + 1.3) * riffles(zenith, azimuth)
/// polar    = (0.15 * sin(phase' + 3) + 0.5) * zenith' * PI
/// p        = (sin(az) * sin(polar) * radius, cos(polar), cos(az) * sin(polar) * radius) + 0.12 * n2
/// p.y      = lerp(p.y, 0, smoothstep(0, 0.95, 1 - zenith) * 0.1 * flatten)
/// ```
/// where `n1`/`n2` are slow Perlin wobbles scrolled by the phase. Every term
/// is periodic in the phase with period `TAU`.
#[derive(Clone)]
pub struct BellShape {
    noise: Perlin,
}

impl std::fmt::Debug for BellShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BellShape").finish_non_exhaustive()
    }
}

impl Default for BellShape {
    fn default() -> Self {
        Self::new(0)
    }
}

impl BellShape {
    const NOISE_RADIUS: f32 = 0.2;

    pub fn new(seed: u32) -> Self {
        Self {
            noise: Perlin::new(seed),
        }
    }

    /// Noise scrolled around a circle in the fourth dimension, so the value
    /// at `phase` and `phase + TAU` is the same.
    fn scrolled_noise(&self, position: Vec3, phase: f32) -> f32 {
        let (sin_p, cos_p) = phase.sin_cos();
        self.noise.get([
            position.x as f64,
            position.y as f64,
            (position.z + cos_p * Self::NOISE_RADIUS) as f64,
            (sin_p * Self::NOISE_RADIUS) as f64,
        ]) as f32
    }
}

impl ShapeFn for BellShape {
    fn position(&self, phase: f32, zenith: f32, azimuth: f32, flatten: f32) -> Vec3 {
        let (sin_az, cos_az) = azimuth.sin_cos();

        let zenith_noise =
            self.scrolled_noise(Vec3::new(sin_az * 0.02, cos_az * 0.02, 12.69), phase) * 6.0;
        let modified_zenith = zenith * (zenith_noise * 0.03 + 0.9);

        let modified_phase = phase - lerp(0.0, modified_zenith * 0.95, modified_zenith) + PI * 0.5;

        let riffle_wave = (azimuth * 16.0 + 0.5 * PI).sin() * 0.02 + 1.0;
        let riffles = lerp(1.0, riffle_wave, smoothstep(0.5, 1.0, zenith));
        let xr = (modified_phase.sin() * 0.3 + 1.3) * riffles;

        let polar = (f32::sin(modified_phase + 3.0) * 0.15 + 0.5) * modified_zenith * PI;
        let radius = polar.sin() * xr;
        let mut result = Vec3::new(sin_az * radius, polar.cos(), cos_az * radius);

        let bump = self.scrolled_noise(
            Vec3::new(
                sin_az * modified_zenith * 0.02,
                cos_az * modified_zenith * 0.02,
                42.69,
            ),
            phase,
        ) * 6.0;
        result += Vec3::splat(bump * 0.02);

        let flatten_factor = smoothstep(0.0, 0.95, 1.0 - zenith) * 0.1 * flatten;
        result.y = lerp(result.y, 0.0, flatten_factor);

        result
    }
}

/// Static unit hemisphere, handy for tests and tooling: no phase dependence.
#[derive(Debug, Clone, Copy, Default)]
pub struct Hemisphere {
    pub radius: f32,
}

impl ShapeFn for Hemisphere {
    fn position(&self, _phase: f32, zenith: f32, azimuth: f32, flatten: f32) -> Vec3 {
        let polar = zenith * PI * 0.5;
        let (sin_az, cos_az) = azimuth.sin_cos();
        let ring = polar.sin() * self.radius;
        let y = polar.cos() * self.radius * (1.0 - 0.1 * flatten);
        Vec3::new(sin_az * ring, y, cos_az * ring)
    }
}

pub(crate) fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

pub(crate) fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}
