//! Water turbulence: a smooth, time-varying vector noise field

use glam::Vec3;
use noise::{NoiseFn, Perlin};

use crate::config::TurbulenceConfig;

/// Three decorrelated Perlin fields sampled in (x, y, z, t)
#[derive(Clone)]
pub struct TurbulenceField {
    x: Perlin,
    y: Perlin,
    z: Perlin,
    strength: f32,
    frequency: f32,
    speed: f32,
}

impl std::fmt::Debug for TurbulenceField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurbulenceField")
            .field("strength", &self.strength)
            .field("frequency", &self.frequency)
            .field("speed", &self.speed)
            .finish_non_exhaustive()
    }
}

impl TurbulenceField {
    pub fn new(config: &TurbulenceConfig) -> Self {
        let seed = config.seed;
        Self {
            x: Perlin::new(seed),
            y: Perlin::new(seed.wrapping_add(1)),
            z: Perlin::new(seed.wrapping_add(2)),
            strength: config.strength,
            frequency: config.frequency,
            speed: config.speed,
        }
    }

    pub fn is_calm(&self) -> bool {
        self.strength == 0.0
    }

    /// Acceleration at world position `p` and simulation time `t`
    pub fn sample(&self, p: Vec3, t: f32) -> Vec3 {
        if self.is_calm() {
            return Vec3::ZERO;
        }
        let q = p * self.frequency;
        let point = [q.x as f64, q.y as f64, q.z as f64, (t * self.speed) as f64];
        Vec3::new(
            self.x.get(point) as f32,
            self.y.get(point) as f32,
            self.z.get(point) as f32,
        ) * self.strength
    }
}
