//! Icosahedral bell shell
//!
//! The bell is the upper cap of a subdivided icosahedron:
//! - rings `1..=N` cover the five faces around the top pole, ring `y` holds `5*y` vertices
//! - rings `N+1..=N+N/2` continue down the ten-face belt, each holding `5*N` vertices
//!
//! Directions are lerped along the flat faces and re-normalized onto the unit
//! sphere, then converted to (zenith, azimuth). Outer and inner shells are
//! generated from the same direction rows so their rings align index for index.

use glam::Vec3;
use std::f32::consts::{PI, TAU};

use super::shell::{RowVertex, ShellMesh};
use crate::error::BuildError;

/// Faces meeting at an icosahedron pole
pub const FACES: usize = 5;

const CIRCUMRADIUS: f32 = 0.951057;

/// Rings of a generated shell, pole side first
#[derive(Debug, Clone, Default)]
pub struct BellRows {
    rings: Vec<Vec<RowVertex>>,
}

impl BellRows {
    pub fn ring_count(&self) -> usize {
        self.rings.len()
    }

    /// Ring `y` (1-based, the pole itself has no vertex)
    pub fn ring(&self, y: usize) -> &[RowVertex] {
        y.checked_sub(1)
            .and_then(|i| self.rings.get(i))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Lowest ring; the margin hangs from it
    pub fn terminal(&self) -> &[RowVertex] {
        self.rings.last().map(Vec::as_slice).unwrap_or(&[])
    }

    fn at(&self, y: usize, index: usize) -> u32 {
        let ring = self.ring(y);
        ring[index % ring.len()].ptr
    }
}

/// Unit direction rows of the subdivided cap, ring 1 first
pub fn ico_directions(subdivisions: usize) -> Result<Vec<Vec<Vec3>>, BuildError> {
    if subdivisions == 0 {
        return Err(BuildError::InvalidSubdivisions(subdivisions));
    }
    let n = subdivisions;

    let ico_radius = 1.0 / (2.0 * (36.0f32).to_radians().sin());
    let alpha = ico_radius.acos();
    let h = CIRCUMRADIUS - alpha.sin();

    let pole = Vec3::new(0.0, CIRCUMRADIUS, 0.0);
    let ring_point = |angle: f32, y: f32| Vec3::new(angle.sin() * ico_radius, y, angle.cos() * ico_radius);
    let top: Vec<Vec3> = (0..=FACES)
        .map(|i| ring_point(i as f32 * TAU / FACES as f32, h))
        .collect();
    let bottom: Vec<Vec3> = (0..=FACES)
        .map(|i| ring_point((0.5 + i as f32) * TAU / FACES as f32, -h))
        .collect();

    let mut rows = Vec::with_capacity(n + n / 2);

    for y in 1..=n {
        let ratio = y as f32 / n as f32;
        let mut row = Vec::with_capacity(FACES * y);
        for f in 0..FACES {
            let e0 = pole.lerp(top[f], ratio);
            let e1 = pole.lerp(top[f + 1], ratio);
            for x in 0..y {
                row.push(e0.lerp(e1, x as f32 / y as f32).normalize());
            }
        }
        rows.push(row);
    }

    for y in 1..=n / 2 {
        let ratio = y as f32 / n as f32;
        let mut row = Vec::with_capacity(FACES * n);
        for f in 0..FACES {
            let e0 = top[f].lerp(bottom[f], ratio);
            let e1 = top[f + 1].lerp(bottom[f], ratio);
            let e2 = top[f + 1].lerp(bottom[f + 1], ratio);
            let down = n - y;
            for x in 0..down {
                row.push(e0.lerp(e1, x as f32 / down as f32).normalize());
            }
            for x in 0..y {
                row.push(e1.lerp(e2, x as f32 / y as f32).normalize());
            }
        }
        rows.push(row);
    }

    Ok(rows)
}

/// (zenith, azimuth) of a unit direction: zenith spans a quarter turn from
/// the +Y pole to the equator, azimuth is measured from +Z towards +X
pub fn spherical_params(direction: Vec3) -> (f32, f32) {
    let radial = (direction.x * direction.x + direction.z * direction.z).sqrt();
    let zenith = f32::atan2(radial, direction.y) / (PI * 0.5);
    let azimuth = f32::atan2(direction.x, direction.z);
    (zenith, azimuth)
}

/// Emit one shell's vertex descriptors and faces
pub fn generate_shell(mesh: &mut ShellMesh, subdivisions: usize) -> Result<BellRows, BuildError> {
    let directions = ico_directions(subdivisions)?;
    let side = mesh.side.side_vector();

    let rings = directions
        .iter()
        .map(|row| {
            row.iter()
                .map(|&dir| {
                    let (zenith, azimuth) = spherical_params(dir);
                    mesh.add_from_params(zenith, azimuth, side, 0.0)
                })
                .collect()
        })
        .collect();
    let rows = BellRows { rings };

    emit_faces(mesh, &rows, subdivisions);

    log::debug!(
        "Bell shell {:?}: {} rings, {} vertices, {} triangles",
        mesh.side,
        rows.ring_count(),
        mesh.vertex_count(),
        mesh.triangle_count()
    );
    Ok(rows)
}

fn emit_faces(mesh: &mut ShellMesh, rows: &BellRows, n: usize) {
    // Pole cap: the five ring-1 vertices fan around ring[0]
    let r = rows.ring(1);
    mesh.add_face(r[0].ptr, r[1].ptr, r[2].ptr);
    mesh.add_face(r[0].ptr, r[2].ptr, r[3].ptr);
    mesh.add_face(r[0].ptr, r[3].ptr, r[4].ptr);

    let top = |face: usize, row: usize, index: usize| rows.at(row, face * row + index);

    for y in 2..=n {
        for f in 0..FACES {
            for x in 0..y {
                let v0 = top(f, y, x);
                let v1 = top(f, y - 1, x);
                let v2 = top(f, y, x + 1);
                mesh.add_face(v2, v1, v0);

                if x < y - 1 {
                    let v3 = top(f, y - 1, x + 1);
                    mesh.add_face(v1, v2, v3);
                }
            }
        }
    }

    let downlooking = |face: usize, row: usize, index: usize| rows.at(n + row, face * n + index);
    let uplooking =
        |face: usize, row: usize, index: usize| rows.at(n + row, face * n + (n - row) + index);

    for y in 1..=n / 2 {
        for f in 0..FACES {
            for x in 0..n - y {
                let v0 = downlooking(f, y, x);
                let v1 = downlooking(f, y - 1, x + 1);
                let v2 = downlooking(f, y, x + 1);
                let v3 = downlooking(f, y - 1, x + 2);
                mesh.add_face(v2, v1, v0);
                mesh.add_face(v1, v2, v3);
            }
            for x in 0..y {
                let v0 = uplooking(f, y, x);
                let v1 = uplooking(f, y - 1, x);
                let v2 = uplooking(f, y, x + 1);
                let v3 = uplooking(f, y - 1, x + 1);
                mesh.add_face(v2, v1, v0);
                mesh.add_face(v1, v2, v3);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::shell::ShellSide;

    #[test]
    fn test_ring_sizes() {
        let rows = ico_directions(4).unwrap();
        let sizes: Vec<usize> = rows.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![5, 10, 15, 20, 20, 20]);
    }

    #[test]
    fn test_zero_subdivisions_rejected() {
        assert_eq!(
            ico_directions(0).unwrap_err(),
            BuildError::InvalidSubdivisions(0)
        );
    }

    #[test]
    fn test_directions_are_unit_and_upper() {
        for row in ico_directions(6).unwrap() {
            for dir in row {
                assert!((dir.length() - 1.0).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn test_zenith_grows_ring_by_ring() {
        let rows = ico_directions(8).unwrap();
        let mean = |row: &Vec<Vec3>| {
            row.iter().map(|&d| spherical_params(d).0).sum::<f32>() / row.len() as f32
        };
        for pair in rows.windows(2) {
            assert!(mean(&pair[1]) > mean(&pair[0]));
        }
        // The belt ends on the equator
        assert!(rows
            .iter()
            .flatten()
            .all(|&d| spherical_params(d).0 <= 1.0 + 1e-5));
    }

    #[test]
    fn test_spherical_params_axes() {
        let (z, _) = spherical_params(Vec3::Y);
        assert_eq!(z, 0.0);
        let (z, a) = spherical_params(Vec3::Z);
        assert!((z - 1.0).abs() < 1e-6);
        assert_eq!(a, 0.0);
        let (_, a) = spherical_params(Vec3::X);
        assert!((a - PI * 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_outer_and_inner_rings_align() {
        let mut outer = ShellMesh::new(ShellSide::Outer);
        let mut inner = ShellMesh::new(ShellSide::Inner);
        let a = generate_shell(&mut outer, 5).unwrap();
        let b = generate_shell(&mut inner, 5).unwrap();

        assert_eq!(a.ring_count(), b.ring_count());
        for y in 1..=a.ring_count() {
            for (va, vb) in a.ring(y).iter().zip(b.ring(y)) {
                assert_eq!(va.zenith, vb.zenith);
                assert_eq!(va.azimuth, vb.azimuth);
            }
        }
        assert_eq!(outer.triangle_count(), inner.triangle_count());
    }

    #[test]
    fn test_pole_cap_and_triangle_indices_valid() {
        let mut mesh = ShellMesh::new(ShellSide::Outer);
        let rows = generate_shell(&mut mesh, 4).unwrap();

        let cap: Vec<[u32; 3]> = mesh.triangles().take(3).collect();
        let ring1: Vec<u32> = rows.ring(1).iter().map(|v| v.ptr).collect();
        assert_eq!(cap[0], [ring1[0], ring1[1], ring1[2]]);
        assert_eq!(cap[2], [ring1[0], ring1[3], ring1[4]]);

        let count = mesh.vertex_count() as u32;
        for tri in mesh.triangles() {
            assert!(tri.iter().all(|&i| i < count));
            assert!(tri[0] != tri[1] && tri[1] != tri[2] && tri[0] != tri[2]);
        }
    }

    #[test]
    fn test_single_subdivision_is_just_the_cap() {
        let mut mesh = ShellMesh::new(ShellSide::Outer);
        let rows = generate_shell(&mut mesh, 1).unwrap();
        assert_eq!(rows.ring_count(), 1);
        assert_eq!(rows.terminal().len(), 5);
        assert_eq!(mesh.triangle_count(), 3);
    }
}
