//! Simulation configuration with layered loading
//!
//! Configuration is loaded from multiple sources (lowest to highest priority):
//! 1. Compiled defaults
//! 2. `medusa.ron` file (if exists)
//! 3. Environment variables prefixed with `MEDUSA_`
//!
//! Example environment variable: `MEDUSA_WATER__DRAG=0.99`

use anyhow::{ensure, Context, Result};
use config::{Config, Environment, File};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main simulation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SimConfig {
    #[serde(default)]
    pub stepping: SteppingConfig,

    #[serde(default)]
    pub water: WaterConfig,

    #[serde(default)]
    pub turbulence: TurbulenceConfig,

    #[serde(default)]
    pub animation: AnimationConfig,
}

/// Fixed-timestep accumulator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SteppingConfig {
    /// Length of one physics step in seconds
    pub fixed_time_step: f32,
    /// Frame deltas above this are clamped before accumulation
    pub max_frame_delta: f32,
    /// Hard cap on physics steps run for one frame
    pub max_steps_per_frame: u32,
}

impl Default for SteppingConfig {
    fn default() -> Self {
        Self {
            fixed_time_step: 1.0 / 360.0,
            max_frame_delta: 0.05,
            max_steps_per_frame: 20,
        }
    }
}

/// Environment forces acting on free vertices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaterConfig {
    /// Fraction of velocity kept per step (1.0 = no drag)
    pub drag: f32,
    /// Constant acceleration, world space
    pub gravity: Vec3,
    /// Constant drift acceleration, world space
    pub current: Vec3,
}

impl Default for WaterConfig {
    fn default() -> Self {
        Self {
            drag: 0.998,
            gravity: Vec3::new(0.0, -0.2, 0.0),
            current: Vec3::new(0.5, 0.0, 0.2),
        }
    }
}

/// Spatially and temporally varying noise field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TurbulenceConfig {
    pub strength: f32,
    /// Spatial frequency (world units to noise units)
    pub frequency: f32,
    /// Temporal scroll speed
    pub speed: f32,
    pub seed: u32,
}

impl Default for TurbulenceConfig {
    fn default() -> Self {
        Self {
            strength: 1.0,
            frequency: 1.0,
            speed: 0.8,
            seed: 0,
        }
    }
}

/// Caller-side animation defaults (phase advance, warm-up)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    /// Pulse cycles per second
    pub phase_speed: f32,
    /// Frames simulated with a stationary carrier before the body is shown
    pub pre_roll_frames: u32,
    pub pre_roll_delta: f32,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            phase_speed: 0.2,
            pre_roll_frames: 120,
            pre_roll_delta: 0.016,
        }
    }
}

impl SimConfig {
    /// Load configuration from `medusa.ron` in the working directory
    pub fn load() -> Result<Self> {
        Self::load_from("medusa")
    }

    /// Load configuration with layered priority:
    /// 1. Compiled defaults (lowest priority)
    /// 2. RON file at `path` (if exists, extension optional)
    /// 3. Environment variables prefixed with `MEDUSA_` (highest priority)
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let name = path.as_ref().to_string_lossy().into_owned();
        let defaults = Self::default();

        let builder = Config::builder()
            // Layer 1: Compiled defaults
            .set_default(
                "stepping.fixed_time_step",
                defaults.stepping.fixed_time_step as f64,
            )?
            .set_default(
                "stepping.max_frame_delta",
                defaults.stepping.max_frame_delta as f64,
            )?
            .set_default(
                "stepping.max_steps_per_frame",
                defaults.stepping.max_steps_per_frame as i64,
            )?
            .set_default("water.drag", defaults.water.drag as f64)?
            .set_default("turbulence.strength", defaults.turbulence.strength as f64)?
            .set_default("turbulence.frequency", defaults.turbulence.frequency as f64)?
            .set_default("turbulence.speed", defaults.turbulence.speed as f64)?
            .set_default("turbulence.seed", defaults.turbulence.seed as i64)?
            .set_default("animation.phase_speed", defaults.animation.phase_speed as f64)?
            .set_default(
                "animation.pre_roll_frames",
                defaults.animation.pre_roll_frames as i64,
            )?
            .set_default(
                "animation.pre_roll_delta",
                defaults.animation.pre_roll_delta as f64,
            )?
            // Layer 2: Config file (optional, won't error if missing)
            .add_source(
                File::with_name(&name)
                    .format(config::FileFormat::Ron)
                    .required(false),
            )
            // Layer 3: Environment variables (MEDUSA_WATER__DRAG, etc.)
            .add_source(
                Environment::with_prefix("MEDUSA")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build().context("Failed to build configuration")?;

        let config: Self = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the integrator cannot run with
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.stepping.fixed_time_step > 0.0,
            "fixed_time_step must be positive, got {}",
            self.stepping.fixed_time_step
        );
        ensure!(
            self.stepping.max_frame_delta >= 0.0,
            "max_frame_delta must not be negative, got {}",
            self.stepping.max_frame_delta
        );
        ensure!(
            self.stepping.max_steps_per_frame >= 1,
            "max_steps_per_frame must be at least 1"
        );
        ensure!(
            self.water.drag > 0.0 && self.water.drag <= 1.0,
            "water drag must be in (0, 1], got {}",
            self.water.drag
        );
        ensure!(
            self.turbulence.frequency >= 0.0,
            "turbulence frequency must not be negative"
        );
        Ok(())
    }

    /// Calm water: no current, no turbulence. Gravity and drag are kept.
    pub fn still_water() -> Self {
        Self {
            water: WaterConfig {
                current: Vec3::ZERO,
                ..WaterConfig::default()
            },
            turbulence: TurbulenceConfig {
                strength: 0.0,
                ..TurbulenceConfig::default()
            },
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SimConfig::default();
        assert_eq!(config.stepping.fixed_time_step, 1.0 / 360.0);
        assert_eq!(config.stepping.max_frame_delta, 0.05);
        assert_eq!(config.stepping.max_steps_per_frame, 20);
        assert_eq!(config.water.drag, 0.998);
        assert_eq!(config.animation.pre_roll_frames, 120);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_config_with_defaults() {
        // Should load defaults when no config file exists
        let config =
            SimConfig::load_from("definitely_missing_medusa_config").expect("Failed to load config");
        assert_eq!(config.stepping.max_steps_per_frame, 20);
        assert_eq!(config.water.current, Vec3::new(0.5, 0.0, 0.2));
    }

    #[test]
    fn test_validate_rejects_bad_drag() {
        let mut config = SimConfig::default();
        config.water.drag = 1.5;
        assert!(config.validate().is_err());
        config.water.drag = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_still_water() {
        let config = SimConfig::still_water();
        assert_eq!(config.water.current, Vec3::ZERO);
        assert_eq!(config.turbulence.strength, 0.0);
        assert_eq!(config.water.gravity, WaterConfig::default().gravity);
    }

    #[test]
    fn test_ron_roundtrip() {
        let config = SimConfig::default();
        let text = ron::to_string(&config).unwrap();
        let parsed: SimConfig = ron::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
