//! Graph Store: the vertex/spring network before it is baked
//!
//! Holds, in insertion order:
//! - vertices (initial position, fixed flag, strand progress)
//! - springs (endpoints, stiffness, rest length)
//! - per-vertex incident-spring lists ("influencers")
//! - anchor records (at most one per vertex)
//! - derived-skin records
//!
//! Ids are dense indices into these lists and are frozen once the graph is
//! handed to the bake stage.

pub mod anchor;

pub use anchor::{Anchor, AnchorFrame, SkinSegment};

use ahash::HashMap;
use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::BuildError;

/// Dense vertex index
pub type VertexId = u32;

/// Dense spring index
pub type SpringId = u32;

/// One physics node as declared by the generator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    /// Initial position. Anchored vertices are overwritten at bake time.
    pub position: Vec3,
    /// Fixed vertices are never integrated
    pub fixed: bool,
    /// Normalized position along a strand (0 at the root), 0 elsewhere
    pub progress: f32,
}

/// Rest length of a spring
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RestLength {
    /// Factor of the endpoint distance measured at bake time
    Relative(f32),
    /// Length in world units
    Absolute(f32),
}

impl RestLength {
    pub fn is_relative(&self) -> bool {
        matches!(self, RestLength::Relative(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Spring {
    pub a: VertexId,
    pub b: VertexId,
    /// Spring constant; 0 contributes no force
    pub stiffness: f32,
    pub rest: RestLength,
}

/// Signed reference from a vertex to one of its incident springs.
///
/// Stored as `(spring + 1) * sign`, positive when the vertex is the spring's
/// first endpoint and negative when it is the second, so zero never occurs.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct Incidence(i32);

impl Incidence {
    pub fn first(spring: SpringId) -> Self {
        Self(spring as i32 + 1)
    }

    pub fn second(spring: SpringId) -> Self {
        Self(-(spring as i32 + 1))
    }

    pub fn spring(self) -> usize {
        (self.0.unsigned_abs() - 1) as usize
    }

    /// +1 for the first endpoint, -1 for the second
    pub fn sign(self) -> f32 {
        if self.0 > 0 {
            1.0
        } else {
            -1.0
        }
    }

    pub fn raw(self) -> i32 {
        self.0
    }
}

/// Mutable vertex/spring graph produced by the topology generator
#[derive(Debug, Clone, Default)]
pub struct SoftBodyGraph {
    vertices: Vec<Vertex>,
    springs: Vec<Spring>,
    incidence: Vec<Vec<Incidence>>,
    anchors: Vec<Anchor>,
    anchor_index: HashMap<VertexId, usize>,
    skins: Vec<SkinSegment>,
}

impl SoftBodyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_vertex(&mut self, position: Vec3, fixed: bool) -> VertexId {
        self.add_strand_vertex(position, fixed, 0.0)
    }

    /// Add a vertex that sits `progress` (0..1) along a strand
    pub fn add_strand_vertex(&mut self, position: Vec3, fixed: bool, progress: f32) -> VertexId {
        let id = self.vertices.len() as VertexId;
        self.vertices.push(Vertex {
            position,
            fixed,
            progress,
        });
        self.incidence.push(Vec::new());
        id
    }

    /// Add a spring and record it in both endpoints' influencer lists
    pub fn add_spring(
        &mut self,
        a: VertexId,
        b: VertexId,
        stiffness: f32,
        rest: RestLength,
    ) -> Result<SpringId, BuildError> {
        self.check_vertex(a)?;
        self.check_vertex(b)?;
        if a == b {
            return Err(BuildError::InvalidParameter {
                name: "spring",
                reason: format!("spring connects vertex {} to itself", a),
            });
        }
        if !(stiffness >= 0.0 && stiffness.is_finite()) {
            return Err(BuildError::InvalidParameter {
                name: "stiffness",
                reason: format!("must be finite and non-negative, got {}", stiffness),
            });
        }
        let valid_rest = match rest {
            RestLength::Relative(f) | RestLength::Absolute(f) => f > 0.0 && f.is_finite(),
        };
        if !valid_rest {
            return Err(BuildError::InvalidParameter {
                name: "rest_length",
                reason: format!("must be finite and positive, got {:?}", rest),
            });
        }

        let id = self.springs.len() as SpringId;
        self.springs.push(Spring {
            a,
            b,
            stiffness,
            rest,
        });
        self.incidence[a as usize].push(Incidence::first(id));
        self.incidence[b as usize].push(Incidence::second(id));
        Ok(id)
    }

    pub fn register_anchor(&mut self, anchor: Anchor) -> Result<(), BuildError> {
        self.check_vertex(anchor.vertex)?;
        if self.anchor_index.contains_key(&anchor.vertex) {
            return Err(BuildError::DuplicateAnchor {
                vertex: anchor.vertex,
            });
        }
        if anchor.fixed != self.vertices[anchor.vertex as usize].fixed {
            return Err(BuildError::InvalidParameter {
                name: "anchor",
                reason: format!(
                    "anchor fixed flag disagrees with vertex {}",
                    anchor.vertex
                ),
            });
        }
        self.anchor_index.insert(anchor.vertex, self.anchors.len());
        self.anchors.push(anchor);
        Ok(())
    }

    /// Register a derived-skin record. The target must be a fixed vertex
    /// with no anchor and no springs so the integrator never touches it.
    pub fn register_skin(&mut self, segment: SkinSegment) -> Result<(), BuildError> {
        for &driver in &segment.drivers {
            self.check_vertex(driver)?;
        }
        self.check_vertex(segment.target)?;
        let target = segment.target as usize;
        if !self.vertices[target].fixed
            || self.anchor_index.contains_key(&segment.target)
            || !self.incidence[target].is_empty()
        {
            return Err(BuildError::InvalidParameter {
                name: "skin_target",
                reason: format!(
                    "vertex {} must be fixed, unanchored and spring-free",
                    segment.target
                ),
            });
        }
        self.skins.push(segment);
        Ok(())
    }

    /// Add a render-only vertex and bind it to four drivers in one go
    pub fn add_skin_vertex(
        &mut self,
        drivers: [VertexId; 4],
        side: Vec3,
        width: f32,
    ) -> Result<VertexId, BuildError> {
        let initial = drivers
            .iter()
            .filter_map(|&d| self.vertices.get(d as usize))
            .fold(Vec3::ZERO, |acc, v| acc + v.position * 0.25);
        let target = self.add_vertex(initial, true);
        self.register_skin(SkinSegment {
            drivers,
            side,
            width,
            target,
        })?;
        Ok(target)
    }

    pub fn anchor_of(&self, vertex: VertexId) -> Option<&Anchor> {
        self.anchor_index
            .get(&vertex)
            .map(|&index| &self.anchors[index])
    }

    pub fn incidence(&self, vertex: VertexId) -> &[Incidence] {
        self.incidence
            .get(vertex as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn vertex(&self, vertex: VertexId) -> Option<&Vertex> {
        self.vertices.get(vertex as usize)
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn springs(&self) -> &[Spring] {
        &self.springs
    }

    pub fn anchors(&self) -> &[Anchor] {
        &self.anchors
    }

    pub fn skins(&self) -> &[SkinSegment] {
        &self.skins
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn spring_count(&self) -> usize {
        self.springs.len()
    }

    /// Total number of influencer entries (twice the spring count)
    pub fn incidence_count(&self) -> usize {
        self.incidence.iter().map(Vec::len).sum()
    }

    /// Overwrite the initial position of an unanchored vertex
    pub fn set_position(&mut self, vertex: VertexId, position: Vec3) -> Result<(), BuildError> {
        self.check_vertex(vertex)?;
        self.vertices[vertex as usize].position = position;
        Ok(())
    }

    fn check_vertex(&self, vertex: VertexId) -> Result<(), BuildError> {
        if (vertex as usize) < self.vertices.len() {
            Ok(())
        } else {
            Err(BuildError::UnknownVertex {
                vertex,
                count: self.vertices.len(),
            })
        }
    }
}
