//! Marginal tentacles
//!
//! Each tentacle is a chain rooted on one margin column. Its first three
//! nodes are the column's three lowest margin vertices; the rest are new free
//! vertices anchored at the lowest one's (zenith, azimuth) with an offset that
//! keeps dropping by a jittered segment length. Every node is tied to the
//! previous node (stretch) and to the one before that (bend), with absolute
//! rest lengths taken from the offsets. Bending stiffness tapers from root
//! to tip.

use glam::Vec3;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::margin::MarginRows;
use crate::error::BuildError;
use crate::graph::{Anchor, RestLength, SoftBodyGraph, VertexId};
use crate::shape::lerp;

/// Margin vertices every tentacle starts with
const ROOT_NODES: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TentacleParams {
    pub count: usize,
    /// Nodes per tentacle including the three margin roots
    pub length: usize,
    pub segment_min: f32,
    pub segment_max: f32,
    pub stretch_stiffness: f32,
    /// Bending stiffness at the root
    pub bend_base: f32,
    /// Bending stiffness at the tip
    pub bend_tip: f32,
    /// Random shift of each root column, as a fraction of the column spacing
    pub root_jitter: f32,
}

impl Default for TentacleParams {
    fn default() -> Self {
        Self {
            count: 20,
            length: 30,
            segment_min: 0.24,
            segment_max: 0.30,
            stretch_stiffness: 3000.0,
            bend_base: 2000.0,
            bend_tip: 100.0,
            root_jitter: 0.0,
        }
    }
}

impl TentacleParams {
    pub fn validate(&self, margin: &MarginRows) -> Result<(), BuildError> {
        if margin.depth() < ROOT_NODES {
            return Err(BuildError::MarginTooShallow {
                rows: margin.depth(),
                required: ROOT_NODES,
            });
        }
        if self.count > margin.width() {
            return Err(BuildError::TooManyStrands {
                requested: self.count,
                columns: margin.width(),
            });
        }
        if self.length <= ROOT_NODES {
            return Err(BuildError::InvalidParameter {
                name: "length",
                reason: format!(
                    "tentacles need more than {} nodes, got {}",
                    ROOT_NODES, self.length
                ),
            });
        }
        if !(self.segment_min > 0.0 && self.segment_max >= self.segment_min) {
            return Err(BuildError::InvalidParameter {
                name: "segment_min",
                reason: format!(
                    "segment range {}..{} is empty or not positive",
                    self.segment_min, self.segment_max
                ),
            });
        }
        if !(self.bend_tip >= 0.0 && self.bend_base >= self.bend_tip) {
            return Err(BuildError::InvalidParameter {
                name: "bend_base",
                reason: format!(
                    "bending must taper from root to tip, got {}..{}",
                    self.bend_base, self.bend_tip
                ),
            });
        }
        if !(0.0..1.0).contains(&self.root_jitter) {
            return Err(BuildError::InvalidParameter {
                name: "root_jitter",
                reason: format!("must be in [0, 1), got {}", self.root_jitter),
            });
        }
        Ok(())
    }
}

pub fn generate<R: Rng>(
    graph: &mut SoftBodyGraph,
    margin: &MarginRows,
    params: &TentacleParams,
    rng: &mut R,
) -> Result<Vec<Vec<VertexId>>, BuildError> {
    params.validate(margin)?;
    let width = margin.width();
    let depth = margin.depth();
    let spacing = width as f32 / params.count.max(1) as f32;

    let mut strands = Vec::with_capacity(params.count);
    for x in 0..params.count {
        let jitter = if params.root_jitter > 0.0 {
            rng.random::<f32>() * params.root_jitter * spacing
        } else {
            0.0
        };
        let column = ((x as f32 * spacing + jitter).floor() as usize) % width;

        let mut ids: Vec<VertexId> = (depth - ROOT_NODES..depth)
            .map(|row| margin.rows[row][column])
            .collect();
        let mut offsets: Vec<Vec3> = Vec::with_capacity(params.length);
        for &id in &ids {
            let anchor = graph
                .anchor_of(id)
                .ok_or(BuildError::MissingAnchor { vertex: id })?;
            offsets.push(anchor.offset);
        }

        let pivot = ids[ROOT_NODES - 1];
        let pivot_anchor = *graph
            .anchor_of(pivot)
            .ok_or(BuildError::MissingAnchor { vertex: pivot })?;
        let mut offset = pivot_anchor.offset;

        for y in ROOT_NODES..params.length {
            let segment = params.segment_min
                + rng.random::<f32>() * (params.segment_max - params.segment_min);
            offset.y -= segment;
            let progress = y as f32 / (params.length - 1) as f32;

            let vertex = graph.add_strand_vertex(Vec3::ZERO, false, progress);
            graph.register_anchor(
                Anchor::new(vertex, pivot_anchor.zenith, pivot_anchor.azimuth, false)
                    .with_offset(offset),
            )?;

            let prev = y - 1;
            let before = y - 2;
            graph.add_spring(
                ids[prev],
                vertex,
                params.stretch_stiffness,
                RestLength::Absolute(offset.distance(offsets[prev])),
            )?;
            graph.add_spring(
                ids[before],
                vertex,
                lerp(params.bend_tip, params.bend_base, 1.0 - progress),
                RestLength::Absolute(offset.distance(offsets[before])),
            )?;

            ids.push(vertex);
            offsets.push(offset);
        }
        strands.push(ids);
    }

    log::debug!(
        "Tentacles: {} strands of {} nodes",
        strands.len(),
        params.length
    );
    Ok(strands)
}
