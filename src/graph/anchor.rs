//! Anchor ("bridge") records and derived-skin records
//!
//! An anchor ties a physics vertex to a body-relative coordinate on the
//! carrier. A derived-skin record ties a render-only vertex to four physics
//! drivers.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::VertexId;

/// Which local frame an anchor's offset is expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AnchorFrame {
    /// Offset is added in the carrier's own local axes (bell surface, margin, tentacles)
    #[default]
    Surface,
    /// Offset is expressed in a (tangent, up, radial) frame around the
    /// flattened subumbrella point (oral arms hanging below the bell)
    Bottom,
}

impl AnchorFrame {
    /// Flatten factor handed to the shape function
    pub fn flatten(self) -> f32 {
        match self {
            AnchorFrame::Surface => 0.0,
            AnchorFrame::Bottom => 1.0,
        }
    }
}

/// Body-relative resting coordinate for one vertex
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub vertex: VertexId,
    /// Polar parameter: 0 at the carrier's forward pole, 1 at the equator
    pub zenith: f32,
    /// Angle about the carrier's principal axis (radians)
    pub azimuth: f32,
    /// Extra displacement, used to grow strands below an anchored point
    pub offset: Vec3,
    pub frame: AnchorFrame,
    /// Displacement along the inward radial axis (lofts the muscle layer)
    pub directional_offset: f32,
    /// Fixed anchors are hard-pinned every step; free ones only seed the
    /// initial position at bake time
    pub fixed: bool,
}

impl Anchor {
    pub fn new(vertex: VertexId, zenith: f32, azimuth: f32, fixed: bool) -> Self {
        Self {
            vertex,
            zenith,
            azimuth,
            offset: Vec3::ZERO,
            frame: AnchorFrame::Surface,
            directional_offset: 0.0,
            fixed,
        }
    }

    pub fn with_offset(mut self, offset: Vec3) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_frame(mut self, frame: AnchorFrame) -> Self {
        self.frame = frame;
        self
    }

    pub fn with_directional_offset(mut self, directional_offset: f32) -> Self {
        self.directional_offset = directional_offset;
        self
    }
}

/// Render-only vertex reconstructed from four physics drivers.
///
/// Drivers are ordered `[upper-left, upper-right, lower-left, lower-right]`
/// on the driving quad. `side` is expressed in the quad's own frame
/// (x across, y along, z normal).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkinSegment {
    pub drivers: [VertexId; 4],
    pub side: Vec3,
    pub width: f32,
    /// Dedicated render slot written by the skin kernel
    pub target: VertexId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anchor_builder() {
        let anchor = Anchor::new(3, 0.5, 1.0, true)
            .with_offset(Vec3::new(0.0, -0.1, 0.0))
            .with_frame(AnchorFrame::Bottom)
            .with_directional_offset(0.02);

        assert_eq!(anchor.vertex, 3);
        assert!(anchor.fixed);
        assert_eq!(anchor.frame, AnchorFrame::Bottom);
        assert_eq!(anchor.offset.y, -0.1);
        assert_eq!(anchor.directional_offset, 0.02);
    }

    #[test]
    fn test_flatten_factor() {
        assert_eq!(AnchorFrame::Surface.flatten(), 0.0);
        assert_eq!(AnchorFrame::Bottom.flatten(), 1.0);
    }
}
