//! Baked buffers: flat, GPU-layout records uploaded once per creature
//!
//! The graph's variable-length influencer lists are flattened into a
//! prefix-sum pointer table (`start`, `count`) per vertex plus one signed index
//! array, so each vertex can gather its spring forces without touching any
//! other vertex's output slot.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use crate::error::SimError;
use crate::graph::{Anchor, AnchorFrame, RestLength, SoftBodyGraph};

/// Marks an unresolved relative rest length
pub const REST_RELATIVE: u32 = 1;

/// Marks "no record" in the per-vertex slot tables
pub const NO_SLOT: u32 = u32::MAX;

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct GpuVertex {
    pub position: Vec3,
    /// 1 for fixed, 0 for free
    pub fixed: u32,
    pub previous: Vec3,
    /// Normalized strand position
    pub progress: f32,
    /// Cosmetic normal (skin kernel output), not physically derived
    pub normal: Vec3,
    pub _pad: u32,
}

impl GpuVertex {
    pub fn is_fixed(&self) -> bool {
        self.fixed != 0
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct GpuSpring {
    pub a: u32,
    pub b: u32,
    pub stiffness: f32,
    /// Relative factor until resolved, then unused
    pub factor: f32,
    pub rest_length: f32,
    /// [`REST_RELATIVE`] until the init kernel resolves it
    pub mode: u32,
    pub _pad: [u32; 2],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct GpuAnchor {
    pub vertex: u32,
    pub fixed: u32,
    pub zenith: f32,
    pub azimuth: f32,
    pub offset: Vec3,
    pub directional_offset: f32,
    /// 1 for the bottom-reference frame
    pub bottom: u32,
    pub _pad: [u32; 3],
}

impl From<&Anchor> for GpuAnchor {
    fn from(anchor: &Anchor) -> Self {
        Self {
            vertex: anchor.vertex,
            fixed: anchor.fixed as u32,
            zenith: anchor.zenith,
            azimuth: anchor.azimuth,
            offset: anchor.offset,
            directional_offset: anchor.directional_offset,
            bottom: (anchor.frame == AnchorFrame::Bottom) as u32,
            _pad: [0; 3],
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct GpuSkin {
    pub drivers: [u32; 4],
    pub side: Vec3,
    pub width: f32,
    pub target: u32,
    pub _pad: [u32; 3],
}

/// Slice of the flat influencer array belonging to one vertex
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct InfluencerSpan {
    pub start: u32,
    pub count: u32,
}

/// All device-side state of one baked soft body
#[derive(Debug, Clone)]
pub struct BakedBuffers {
    pub vertices: Vec<GpuVertex>,
    pub forces: Vec<Vec3>,
    pub springs: Vec<GpuSpring>,
    pub spans: Vec<InfluencerSpan>,
    /// Signed spring references, `(spring + 1) * sign`
    pub influencers: Vec<i32>,
    pub anchors: Vec<GpuAnchor>,
    /// Resolved anchor targets, one slot per anchor
    pub anchor_targets: Vec<Vec3>,
    /// Anchor record per vertex or [`NO_SLOT`]
    pub vertex_anchor: Vec<u32>,
    pub skins: Vec<GpuSkin>,
    /// Resolved skin positions and normals, one slot per skin record
    pub skin_targets: Vec<(Vec3, Vec3)>,
    /// Skin record per vertex or [`NO_SLOT`]
    pub vertex_skin: Vec<u32>,
}

fn alloc<T>(buffer: &'static str, len: usize) -> Result<Vec<T>, SimError> {
    let mut data = Vec::new();
    data.try_reserve_exact(len)
        .map_err(|_| SimError::Allocation { buffer, len })?;
    Ok(data)
}

impl BakedBuffers {
    /// Flatten `graph` into freshly allocated buffers. Fails as a whole if
    /// any buffer cannot be allocated.
    pub fn upload(graph: &SoftBodyGraph) -> Result<Self, SimError> {
        let vertex_count = graph.vertex_count();
        let spring_count = graph.spring_count();
        let anchor_count = graph.anchors().len();
        let skin_count = graph.skins().len();
        let influencer_count = graph.incidence_count();

        let mut vertices = alloc("vertex", vertex_count)?;
        let mut forces = alloc("force", vertex_count)?;
        let mut springs = alloc("spring", spring_count)?;
        let mut spans = alloc("influencer pointer", vertex_count)?;
        let mut influencers = alloc("influencer", influencer_count)?;
        let mut anchors = alloc("anchor", anchor_count)?;
        let mut anchor_targets = alloc("anchor target", anchor_count)?;
        let mut vertex_anchor = alloc("vertex anchor slot", vertex_count)?;
        let mut skins = alloc("skin", skin_count)?;
        let mut skin_targets = alloc("skin target", skin_count)?;
        let mut vertex_skin = alloc("vertex skin slot", vertex_count)?;

        for (id, vertex) in graph.vertices().iter().enumerate() {
            vertices.push(GpuVertex {
                position: vertex.position,
                fixed: vertex.fixed as u32,
                previous: vertex.position,
                progress: vertex.progress,
                normal: Vec3::Y,
                _pad: 0,
            });
            forces.push(Vec3::ZERO);

            let incident = graph.incidence(id as u32);
            spans.push(InfluencerSpan {
                start: influencers.len() as u32,
                count: incident.len() as u32,
            });
            influencers.extend(incident.iter().map(|inc| inc.raw()));
        }

        springs.extend(graph.springs().iter().map(|spring| {
            let (factor, rest_length, mode) = match spring.rest {
                RestLength::Relative(f) => (f, 0.0, REST_RELATIVE),
                RestLength::Absolute(l) => (1.0, l, 0),
            };
            GpuSpring {
                a: spring.a,
                b: spring.b,
                stiffness: spring.stiffness,
                factor,
                rest_length,
                mode,
                _pad: [0; 2],
            }
        }));

        vertex_anchor.resize(vertex_count, NO_SLOT);
        for (index, anchor) in graph.anchors().iter().enumerate() {
            anchors.push(GpuAnchor::from(anchor));
            vertex_anchor[anchor.vertex as usize] = index as u32;
        }
        anchor_targets.resize(anchor_count, Vec3::ZERO);

        vertex_skin.resize(vertex_count, NO_SLOT);
        for (index, skin) in graph.skins().iter().enumerate() {
            skins.push(GpuSkin {
                drivers: skin.drivers,
                side: skin.side,
                width: skin.width,
                target: skin.target,
                _pad: [0; 3],
            });
            vertex_skin[skin.target as usize] = index as u32;
        }
        skin_targets.resize(skin_count, (Vec3::ZERO, Vec3::Y));

        log::debug!(
            "Uploaded {} vertices, {} springs, {} influencers, {} anchors, {} skin records",
            vertex_count,
            spring_count,
            influencers.len(),
            anchor_count,
            skin_count
        );

        Ok(Self {
            vertices,
            forces,
            springs,
            spans,
            influencers,
            anchors,
            anchor_targets,
            vertex_anchor,
            skins,
            skin_targets,
            vertex_skin,
        })
    }

    /// Signed influencer entries of one vertex
    pub fn influencers_of(&self, vertex: usize) -> &[i32] {
        let span = self.spans[vertex];
        let start = span.start as usize;
        &self.influencers[start..start + span.count as usize]
    }
}
