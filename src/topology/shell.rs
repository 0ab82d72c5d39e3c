//! Render-shell description
//!
//! Each bell surface (outer exumbrella, inner subumbrella) is emitted as a
//! list of parametric vertex descriptors plus a triangle index list. A
//! descriptor either carries its own (zenith, azimuth) for the shape function
//! or names four physics drivers it follows. No positions are produced here.

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::graph::VertexId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShellSide {
    Outer,
    Inner,
}

impl ShellSide {
    /// Side vector pointing away from the shell's visible face
    pub fn side_vector(self) -> Vec3 {
        match self {
            ShellSide::Outer => Vec3::Z,
            ShellSide::Inner => Vec3::NEG_Z,
        }
    }
}

/// One render vertex of a shell
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShellVertex {
    pub zenith: f32,
    pub azimuth: f32,
    /// Polar texture coordinate `(sin az, cos az) * zenith`
    pub uv: Vec2,
    pub side: Vec3,
    /// Thickness along `side`
    pub width: f32,
    /// Physics vertices this descriptor follows, if any
    pub drivers: Option<[VertexId; 4]>,
}

/// Handle to a shell vertex together with the parameters later stages need
/// when they derive new descriptors from it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowVertex {
    /// Index into the owning shell's vertex list
    pub ptr: u32,
    pub zenith: f32,
    pub azimuth: f32,
    /// Anchor offset of the backing physics vertex
    pub offset: Vec3,
    pub physics: Option<VertexId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShellMesh {
    pub side: ShellSide,
    pub vertices: Vec<ShellVertex>,
    pub indices: Vec<u32>,
}

impl ShellMesh {
    pub fn new(side: ShellSide) -> Self {
        Self {
            side,
            vertices: Vec::new(),
            indices: Vec::new(),
        }
    }

    fn push(
        &mut self,
        zenith: f32,
        azimuth: f32,
        side: Vec3,
        width: f32,
        drivers: Option<[VertexId; 4]>,
    ) -> u32 {
        let ptr = self.vertices.len() as u32;
        let (sin_az, cos_az) = azimuth.sin_cos();
        self.vertices.push(ShellVertex {
            zenith,
            azimuth,
            uv: Vec2::new(sin_az * zenith, cos_az * zenith),
            side,
            width,
            drivers,
        });
        ptr
    }

    /// Descriptor evaluated directly by the shape function
    pub fn add_from_params(&mut self, zenith: f32, azimuth: f32, side: Vec3, width: f32) -> RowVertex {
        let ptr = self.push(zenith, azimuth, side, width, None);
        RowVertex {
            ptr,
            zenith,
            azimuth,
            offset: Vec3::ZERO,
            physics: None,
        }
    }

    /// Descriptor following four physics-backed row vertices.
    ///
    /// Zenith is their mean, pushed down by the mean anchor drop and along
    /// `side.y * width`; azimuth is their circular mean.
    pub fn add_from_drivers(&mut self, quad: [RowVertex; 4], side: Vec3, width: f32) -> RowVertex {
        let (sx, cx) = quad
            .iter()
            .fold((0.0, 0.0), |(s, c), v| (s + v.azimuth.sin(), c + v.azimuth.cos()));
        let azimuth = f32::atan2(sx, cx);
        let mut zenith = quad.iter().map(|v| v.zenith).sum::<f32>() * 0.25;
        zenith -= quad.iter().map(|v| v.offset.y).sum::<f32>() * 0.25;
        zenith += side.y * width;

        let drivers = match quad.map(|v| v.physics) {
            [Some(a), Some(b), Some(c), Some(d)] => Some([a, b, c, d]),
            _ => None,
        };
        let ptr = self.push(zenith, azimuth, side, width, drivers);
        RowVertex {
            ptr,
            zenith,
            azimuth,
            offset: Vec3::ZERO,
            physics: None,
        }
    }

    /// Add a triangle given in outer-shell winding; the inner shell stores
    /// it mirrored so both shells face outwards from the wall between them.
    pub fn add_face(&mut self, a: u32, b: u32, c: u32) {
        match self.side {
            ShellSide::Outer => self.indices.extend_from_slice(&[a, b, c]),
            ShellSide::Inner => self.indices.extend_from_slice(&[c, b, a]),
        }
    }

    /// Stitch two closed rows of equal length into a band of quads
    pub fn stitch_rows(&mut self, upper: &[RowVertex], lower: &[RowVertex]) {
        let width = upper.len().min(lower.len());
        for x in 0..width {
            let next = (x + 1) % width;
            let v0 = upper[x].ptr;
            let v1 = upper[next].ptr;
            let v2 = lower[x].ptr;
            let v3 = lower[next].ptr;
            self.add_face(v2, v1, v0);
            self.add_face(v1, v2, v3);
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.indices.chunks_exact(3).map(|t| [t[0], t[1], t[2]])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inner_winding_is_mirrored() {
        let mut outer = ShellMesh::new(ShellSide::Outer);
        let mut inner = ShellMesh::new(ShellSide::Inner);
        outer.add_face(0, 1, 2);
        inner.add_face(0, 1, 2);
        assert_eq!(outer.indices, vec![0, 1, 2]);
        assert_eq!(inner.indices, vec![2, 1, 0]);
    }

    #[test]
    fn test_driver_descriptor_averages_azimuth_across_seam() {
        let mut mesh = ShellMesh::new(ShellSide::Outer);
        let quad = [3.1f32, -3.1, 3.1, -3.1].map(|az| RowVertex {
            ptr: 0,
            zenith: 1.0,
            azimuth: az,
            offset: Vec3::new(0.0, -0.1, 0.0),
            physics: Some(7),
        });
        let v = mesh.add_from_drivers(quad, Vec3::Z, 0.0);
        // Mean of angles either side of PI is PI, not 0
        assert!(v.azimuth.abs() > 3.0);
        assert!((v.zenith - 1.1).abs() < 1e-6);
        assert_eq!(mesh.vertices[0].drivers, Some([7, 7, 7, 7]));
    }

    #[test]
    fn test_stitch_rows_wraps() {
        let mut mesh = ShellMesh::new(ShellSide::Outer);
        let upper: Vec<_> = (0..4)
            .map(|i| mesh.add_from_params(0.5, i as f32, Vec3::Z, 0.0))
            .collect();
        let lower: Vec<_> = (0..4)
            .map(|i| mesh.add_from_params(0.6, i as f32, Vec3::Z, 0.0))
            .collect();
        mesh.stitch_rows(&upper, &lower);
        assert_eq!(mesh.triangle_count(), 8);
        assert!(mesh.triangles().all(|t| t.iter().all(|&i| i < 8)));
    }
}
