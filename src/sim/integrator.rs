//! Fixed-timestep integrator pipeline
//!
//! [`SoftBody`] owns the graph, the baked buffers and the two most recent
//! carrier snapshots. Each visual frame feeds [`SoftBody::step`] with the
//! carrier's current state; the accumulator drains in fixed steps, and each
//! step interpolates the carrier by the fraction of this frame's planned steps
//! already consumed.

use glam::Vec3;
use rayon::prelude::*;

use super::buffers::{BakedBuffers, GpuVertex, REST_RELATIVE};
use super::kernels::{self, Environment};
use super::turbulence::TurbulenceField;
use crate::carrier::CarrierState;
use crate::config::SimConfig;
use crate::error::SimError;
use crate::graph::SoftBodyGraph;
use crate::shape::ShapeFn;

/// Lifecycle of one instance. There is no way back to `Unbaked`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimState {
    Unbaked,
    Idle,
    /// A fixed step is running. Seen from outside only if a step was
    /// interrupted, in which case the instance stays locked.
    Stepping,
}

/// Running counters over all frames since bake
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StepStats {
    pub frames: u64,
    pub total_steps: u64,
    pub last_frame_steps: u32,
    /// Frames that hit `max_steps_per_frame`
    pub truncated_frames: u64,
    /// Simulated seconds
    pub sim_time: f64,
}

pub struct SoftBody<S: ShapeFn> {
    graph: SoftBodyGraph,
    shape: S,
    config: SimConfig,
    turbulence: TurbulenceField,
    state: SimState,
    buffers: Option<BakedBuffers>,
    accumulator: f32,
    previous: CarrierState,
    ready: bool,
    stats: StepStats,
}

impl<S: ShapeFn> std::fmt::Debug for SoftBody<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoftBody")
            .field("state", &self.state)
            .field("vertices", &self.graph.vertex_count())
            .field("springs", &self.graph.spring_count())
            .field("ready", &self.ready)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

/// Bake `graph` into a ready-to-step instance posed at `initial`
pub fn bake<S: ShapeFn>(
    graph: SoftBodyGraph,
    shape: S,
    config: SimConfig,
    initial: CarrierState,
) -> Result<SoftBody<S>, SimError> {
    let mut body = SoftBody::new(graph, shape, config);
    body.bake(initial)?;
    Ok(body)
}

impl<S: ShapeFn> SoftBody<S> {
    pub fn new(graph: SoftBodyGraph, shape: S, config: SimConfig) -> Self {
        let turbulence = TurbulenceField::new(&config.turbulence);
        Self {
            graph,
            shape,
            config,
            turbulence,
            state: SimState::Unbaked,
            buffers: None,
            accumulator: 0.0,
            previous: CarrierState::default(),
            ready: false,
            stats: StepStats::default(),
        }
    }

    /// Upload the graph, pose every anchored vertex at `initial` and resolve
    /// relative rest lengths from the posed positions. Exactly once.
    pub fn bake(&mut self, initial: CarrierState) -> Result<(), SimError> {
        if self.state != SimState::Unbaked {
            return Err(SimError::AlreadyBaked);
        }

        let mut buffers = BakedBuffers::upload(&self.graph)?;
        let matrix = initial.transform.matrix();

        kernels::resolve_anchors(
            &mut buffers.anchor_targets,
            &buffers.anchors,
            &matrix,
            initial.phase,
            &self.shape,
        );
        kernels::apply_anchors(
            &mut buffers.vertices,
            &buffers.vertex_anchor,
            &buffers.anchors,
            &buffers.anchor_targets,
            true,
        );

        let relative = buffers
            .springs
            .iter()
            .filter(|s| s.mode == REST_RELATIVE)
            .count();
        kernels::resolve_rest_lengths(&mut buffers.springs, &buffers.vertices);
        let degenerate = buffers
            .springs
            .iter()
            .filter(|s| s.rest_length <= f32::EPSILON)
            .count();
        if degenerate > 0 {
            log::warn!(
                "{} springs have a zero rest length after bake and will pull their endpoints together",
                degenerate
            );
        }

        if !buffers.skins.is_empty() {
            kernels::resolve_skins(&mut buffers.skin_targets, &buffers.skins, &buffers.vertices);
            kernels::apply_skins(&mut buffers.vertices, &buffers.vertex_skin, &buffers.skin_targets);
        }

        log::info!(
            "Baked soft body: {} vertices, {} springs ({} relative), {} anchors, {} skin records",
            buffers.vertices.len(),
            buffers.springs.len(),
            relative,
            buffers.anchors.len(),
            buffers.skins.len()
        );

        self.buffers = Some(buffers);
        self.previous = initial;
        self.accumulator = 0.0;
        self.state = SimState::Idle;
        Ok(())
    }

    /// Advance by one visual frame of length `dt` towards `current`
    pub fn step(&mut self, current: CarrierState, dt: f32) -> Result<(), SimError> {
        self.ensure_idle()?;

        let stepping = &self.config.stepping;
        let fixed = stepping.fixed_time_step;
        let max_steps = stepping.max_steps_per_frame;

        self.accumulator += dt.max(0.0).min(stepping.max_frame_delta);
        let available = (self.accumulator / fixed).floor() as u32;
        let planned = available.min(max_steps);

        self.state = SimState::Stepping;
        for i in 1..=planned {
            let t = i as f32 / planned as f32;
            let carrier = self.previous.interpolate(&current, t);
            self.fixed_step(&carrier, fixed)?;
            self.accumulator -= fixed;
        }
        self.accumulator = self.accumulator.max(0.0);

        if available > max_steps {
            self.accumulator = self.accumulator.min(fixed * max_steps as f32);
            self.stats.truncated_frames += 1;
            if self.stats.truncated_frames == 1 {
                log::warn!(
                    "Frame needed {} steps, capped at {}; simulation is falling behind",
                    available,
                    max_steps
                );
            } else {
                log::debug!("Frame capped at {} of {} steps", max_steps, available);
            }
        }

        if planned > 0 {
            self.previous = current;
        }
        self.state = SimState::Idle;

        self.stats.frames += 1;
        self.stats.total_steps += planned as u64;
        self.stats.last_frame_steps = planned;
        Ok(())
    }

    fn fixed_step(&mut self, carrier: &CarrierState, dt: f32) -> Result<(), SimError> {
        let buffers = self.buffers.as_mut().ok_or(SimError::NotBaked)?;
        let matrix = carrier.transform.matrix();

        kernels::resolve_anchors(
            &mut buffers.anchor_targets,
            &buffers.anchors,
            &matrix,
            carrier.phase,
            &self.shape,
        );
        kernels::apply_anchors(
            &mut buffers.vertices,
            &buffers.vertex_anchor,
            &buffers.anchors,
            &buffers.anchor_targets,
            false,
        );

        let env = Environment {
            gravity: self.config.water.gravity,
            current: self.config.water.current,
            turbulence: &self.turbulence,
            time: self.stats.sim_time as f32,
        };
        kernels::accumulate_forces(
            &mut buffers.forces,
            &buffers.vertices,
            &buffers.springs,
            &buffers.spans,
            &buffers.influencers,
            &env,
        );
        kernels::integrate(&mut buffers.vertices, &buffers.forces, self.config.water.drag, dt);

        if !buffers.skins.is_empty() {
            kernels::resolve_skins(&mut buffers.skin_targets, &buffers.skins, &buffers.vertices);
            kernels::apply_skins(&mut buffers.vertices, &buffers.vertex_skin, &buffers.skin_targets);
        }

        self.stats.sim_time += dt as f64;
        Ok(())
    }

    /// Warm up with a stationary carrier, then mark the body ready
    pub fn pre_roll(&mut self, frames: u32, dt: f32) -> Result<(), SimError> {
        for _ in 0..frames {
            self.step(self.previous, dt)?;
        }
        self.ready = true;
        log::debug!("Pre-rolled {} frames", frames);
        Ok(())
    }

    /// Pre-roll with the configured frame count and delta
    pub fn warm_up(&mut self) -> Result<(), SimError> {
        let animation = &self.config.animation;
        let (frames, dt) = (animation.pre_roll_frames, animation.pre_roll_delta);
        self.pre_roll(frames, dt)
    }

    /// Translate every vertex by `delta`, along with the remembered carrier
    /// snapshot, so a discontinuous carrier reset does not drag the body.
    pub fn teleport(&mut self, delta: Vec3) -> Result<(), SimError> {
        self.ensure_idle()?;
        let buffers = self.buffers.as_mut().ok_or(SimError::NotBaked)?;

        buffers.vertices.par_iter_mut().for_each(|vertex| {
            vertex.position += delta;
            vertex.previous += delta;
        });
        self.previous.transform = self.previous.transform.translated(delta);

        log::debug!("Teleported {} vertices by {}", buffers.vertices.len(), delta);
        Ok(())
    }

    /// Full copy of the vertex buffer
    pub fn snapshot(&self) -> Result<Vec<GpuVertex>, SimError> {
        Ok(self.baked()?.vertices.clone())
    }

    /// Replace the whole vertex buffer. Lengths must match.
    pub fn upload_snapshot(&mut self, vertices: &[GpuVertex]) -> Result<(), SimError> {
        self.ensure_idle()?;
        let buffers = self.buffers.as_mut().ok_or(SimError::NotBaked)?;
        if vertices.len() != buffers.vertices.len() {
            return Err(SimError::SnapshotLength {
                expected: buffers.vertices.len(),
                got: vertices.len(),
            });
        }
        buffers.vertices.copy_from_slice(vertices);
        Ok(())
    }

    pub fn position_of(&self, vertex: u32) -> Result<Vec3, SimError> {
        let vertices = &self.baked()?.vertices;
        vertices
            .get(vertex as usize)
            .map(|v| v.position)
            .ok_or(SimError::VertexOutOfRange {
                vertex,
                count: vertices.len(),
            })
    }

    pub fn positions(&self) -> Result<Vec<Vec3>, SimError> {
        Ok(self.baked()?.vertices.iter().map(|v| v.position).collect())
    }

    /// Raw vertex records for upload to a renderer
    pub fn vertex_bytes(&self) -> Result<&[u8], SimError> {
        Ok(bytemuck::cast_slice(&self.baked()?.vertices))
    }

    /// Endpoints of every spring, for line-list debug drawing
    pub fn spring_segments(&self) -> Result<Vec<(Vec3, Vec3)>, SimError> {
        let buffers = self.baked()?;
        Ok(buffers
            .springs
            .iter()
            .map(|s| {
                (
                    buffers.vertices[s.a as usize].position,
                    buffers.vertices[s.b as usize].position,
                )
            })
            .collect())
    }

    /// Forces gathered during the last fixed step
    pub fn forces(&self) -> Result<&[Vec3], SimError> {
        Ok(&self.baked()?.forces)
    }

    /// Rest lengths as resolved at bake
    pub fn rest_lengths(&self) -> Result<Vec<f32>, SimError> {
        Ok(self.baked()?.springs.iter().map(|s| s.rest_length).collect())
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn state(&self) -> SimState {
        self.state
    }

    pub fn stats(&self) -> StepStats {
        self.stats
    }

    pub fn graph(&self) -> &SoftBodyGraph {
        &self.graph
    }

    pub fn shape(&self) -> &S {
        &self.shape
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Carrier snapshot the next frame interpolates from
    pub fn previous_carrier(&self) -> CarrierState {
        self.previous
    }

    /// Time carried over to the next frame
    pub fn accumulator(&self) -> f32 {
        self.accumulator
    }

    fn ensure_idle(&self) -> Result<(), SimError> {
        match self.state {
            SimState::Unbaked => Err(SimError::NotBaked),
            SimState::Stepping => Err(SimError::StepInProgress),
            SimState::Idle => Ok(()),
        }
    }

    fn baked(&self) -> Result<&BakedBuffers, SimError> {
        self.buffers.as_ref().ok_or(SimError::NotBaked)
    }
}
