//! Data-parallel kernels of the fixed-step pipeline
//!
//! Each kernel is one rayon dispatch over a flat buffer; the dispatch returns
//! only after every unit has run, which is the barrier between stages. Every
//! unit writes exactly one output slot of its own:
//! - anchors resolve into a per-anchor target slot, then each vertex pulls its own target
//! - forces are gathered per vertex from its influencer span
//! - integration and skin application touch only the unit's own vertex

use glam::{Mat4, Vec3};
use rayon::prelude::*;

use super::buffers::{GpuAnchor, GpuSkin, GpuSpring, GpuVertex, InfluencerSpan, NO_SLOT, REST_RELATIVE};
use super::turbulence::TurbulenceField;
use crate::shape::ShapeFn;

/// World position of an anchor under carrier `matrix` at `phase`.
///
/// Surface anchors add their offset in carrier-local axes. Bottom anchors
/// express it in a (tangent, up, radial) frame around the flattened base
/// point. The directional offset always pulls inwards along the radial axis.
pub fn resolve_anchor<S: ShapeFn + ?Sized>(
    anchor: &GpuAnchor,
    matrix: &Mat4,
    phase: f32,
    shape: &S,
) -> Vec3 {
    let bottom = anchor.bottom != 0;
    let flatten = if bottom { 1.0 } else { 0.0 };
    let base = shape.position(phase, anchor.zenith, anchor.azimuth, flatten);

    let (sin_az, cos_az) = anchor.azimuth.sin_cos();
    let radial = Vec3::new(base.x, 0.0, base.z)
        .try_normalize()
        .unwrap_or(Vec3::new(sin_az, 0.0, cos_az));

    let offset = if bottom {
        let tangent = Vec3::Y.cross(radial);
        tangent * anchor.offset.x + Vec3::Y * anchor.offset.y + radial * anchor.offset.z
    } else {
        anchor.offset
    };

    let local = base + offset - radial * anchor.directional_offset;
    matrix.transform_point3(local)
}

pub fn resolve_anchors<S: ShapeFn + ?Sized>(
    targets: &mut [Vec3],
    anchors: &[GpuAnchor],
    matrix: &Mat4,
    phase: f32,
    shape: &S,
) {
    targets
        .par_iter_mut()
        .zip(anchors.par_iter())
        .for_each(|(target, anchor)| {
            *target = resolve_anchor(anchor, matrix, phase, shape);
        });
}

/// Pin anchored vertices to their resolved targets. Regular steps move
/// only fixed anchors; `init` also seeds free anchored vertices.
pub fn apply_anchors(
    vertices: &mut [GpuVertex],
    vertex_anchor: &[u32],
    anchors: &[GpuAnchor],
    targets: &[Vec3],
    init: bool,
) {
    vertices
        .par_iter_mut()
        .zip(vertex_anchor.par_iter())
        .for_each(|(vertex, &slot)| {
            if slot == NO_SLOT {
                return;
            }
            let index = slot as usize;
            if init || anchors[index].fixed != 0 {
                vertex.position = targets[index];
                vertex.previous = targets[index];
            }
        });
}

/// Turn relative rest lengths into absolute ones from current positions
pub fn resolve_rest_lengths(springs: &mut [GpuSpring], vertices: &[GpuVertex]) {
    springs.par_iter_mut().for_each(|spring| {
        if spring.mode == REST_RELATIVE {
            let a = vertices[spring.a as usize].position;
            let b = vertices[spring.b as usize].position;
            spring.rest_length = spring.factor * a.distance(b);
            spring.mode = 0;
        }
    });
}

/// Hooke force on endpoint `a` (endpoint `b` receives the negation).
/// Zero for zero stiffness or coincident endpoints.
pub fn spring_force(spring: &GpuSpring, a: Vec3, b: Vec3) -> Vec3 {
    let delta = b - a;
    let length = delta.length();
    if spring.stiffness == 0.0 || length <= f32::EPSILON {
        return Vec3::ZERO;
    }
    delta * (spring.stiffness * (length - spring.rest_length) / length)
}

/// Environment acting on every free vertex
#[derive(Debug, Clone, Copy)]
pub struct Environment<'a> {
    pub gravity: Vec3,
    pub current: Vec3,
    pub turbulence: &'a TurbulenceField,
    pub time: f32,
}

/// Gather spring and environment forces into each vertex's own slot
pub fn accumulate_forces(
    forces: &mut [Vec3],
    vertices: &[GpuVertex],
    springs: &[GpuSpring],
    spans: &[InfluencerSpan],
    influencers: &[i32],
    env: &Environment<'_>,
) {
    forces.par_iter_mut().enumerate().for_each(|(i, force)| {
        let vertex = &vertices[i];
        if vertex.is_fixed() {
            *force = Vec3::ZERO;
            return;
        }

        let mut total = env.gravity + env.current + env.turbulence.sample(vertex.position, env.time);

        let span = spans[i];
        let start = span.start as usize;
        for &signed in &influencers[start..start + span.count as usize] {
            let spring = &springs[(signed.unsigned_abs() - 1) as usize];
            let a = vertices[spring.a as usize].position;
            let b = vertices[spring.b as usize].position;
            let on_a = spring_force(spring, a, b);
            total += if signed > 0 { on_a } else { -on_a };
        }
        *force = total;
    });
}

/// Position Verlet with per-step velocity retention (`drag`), unit mass
pub fn integrate(vertices: &mut [GpuVertex], forces: &[Vec3], drag: f32, dt: f32) {
    let dt2 = dt * dt;
    vertices
        .par_iter_mut()
        .zip(forces.par_iter())
        .for_each(|(vertex, &force)| {
            if vertex.is_fixed() {
                return;
            }
            let next = vertex.position + (vertex.position - vertex.previous) * drag + force * dt2;
            vertex.previous = vertex.position;
            vertex.position = next;
        });
}

/// Skin position and normal from four drivers: their average, displaced by
/// `side * width` in the quad's own (across, along, normal) frame
pub fn skin_point(skin: &GpuSkin, vertices: &[GpuVertex]) -> (Vec3, Vec3) {
    let [p0, p1, p2, p3] = skin.drivers.map(|d| vertices[d as usize].position);
    let center = (p0 + p1 + p2 + p3) * 0.25;

    let across = ((p1 - p0) + (p3 - p2)).try_normalize().unwrap_or(Vec3::X);
    let along_raw = (p2 - p0) + (p3 - p1);
    let normal = across
        .cross(along_raw)
        .try_normalize()
        .unwrap_or_else(|| across.any_orthonormal_vector());
    let along = normal.cross(across);

    let side = across * skin.side.x + along * skin.side.y + normal * skin.side.z;
    (center + side * skin.width, normal)
}

pub fn resolve_skins(targets: &mut [(Vec3, Vec3)], skins: &[GpuSkin], vertices: &[GpuVertex]) {
    targets
        .par_iter_mut()
        .zip(skins.par_iter())
        .for_each(|(target, skin)| *target = skin_point(skin, vertices));
}

pub fn apply_skins(vertices: &mut [GpuVertex], vertex_skin: &[u32], targets: &[(Vec3, Vec3)]) {
    vertices
        .par_iter_mut()
        .zip(vertex_skin.par_iter())
        .for_each(|(vertex, &slot)| {
            if slot == NO_SLOT {
                return;
            }
            let (position, normal) = targets[slot as usize];
            vertex.position = position;
            vertex.previous = position;
            vertex.normal = normal;
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TurbulenceConfig;
    use crate::shape::Hemisphere;
    use glam::Quat;

    fn anchor(zenith: f32, azimuth: f32, offset: Vec3, bottom: bool) -> GpuAnchor {
        GpuAnchor {
            vertex: 0,
            fixed: 1,
            zenith,
            azimuth,
            offset,
            directional_offset: 0.0,
            bottom: bottom as u32,
            _pad: [0; 3],
        }
    }

    fn vertex(position: Vec3, fixed: bool) -> GpuVertex {
        GpuVertex {
            position,
            fixed: fixed as u32,
            previous: position,
            progress: 0.0,
            normal: Vec3::Y,
            _pad: 0,
        }
    }

    fn spring(a: u32, b: u32, stiffness: f32, rest_length: f32) -> GpuSpring {
        GpuSpring {
            a,
            b,
            stiffness,
            factor: 1.0,
            rest_length,
            mode: 0,
            _pad: [0; 2],
        }
    }

    #[test]
    fn test_surface_anchor_adds_local_offset() {
        let shape = Hemisphere { radius: 1.0 };
        let a = anchor(1.0, 0.0, Vec3::new(0.0, -0.5, 0.0), false);
        let p = resolve_anchor(&a, &Mat4::IDENTITY, 0.0, &shape);
        assert!(p.abs_diff_eq(Vec3::new(0.0, -0.5, 1.0), 1e-5));
    }

    #[test]
    fn test_anchor_follows_carrier_transform() {
        let shape = Hemisphere { radius: 1.0 };
        let a = anchor(0.0, 0.0, Vec3::ZERO, false);
        let matrix = Mat4::from_rotation_translation(
            Quat::from_rotation_z(std::f32::consts::FRAC_PI_2),
            Vec3::new(5.0, 0.0, 0.0),
        );
        let p = resolve_anchor(&a, &matrix, 0.0, &shape);
        // Pole (0, 1, 0) rotated a quarter turn about Z lands on -X
        assert!(p.abs_diff_eq(Vec3::new(4.0, 0.0, 0.0), 1e-5));
    }

    #[test]
    fn test_bottom_anchor_frame() {
        let shape = Hemisphere { radius: 1.0 };
        // At azimuth 0 the radial axis is +Z and the tangent is +X
        let a = anchor(0.5, 0.0, Vec3::new(0.1, -1.0, 0.2), true);
        let base = shape.position(0.0, 0.5, 0.0, 1.0);
        let p = resolve_anchor(&a, &Mat4::IDENTITY, 0.0, &shape);
        assert!(p.abs_diff_eq(base + Vec3::new(0.1, -1.0, 0.2), 1e-5));
    }

    #[test]
    fn test_degenerate_radial_falls_back_to_azimuth() {
        let shape = Hemisphere { radius: 1.0 };
        // Pole has no horizontal component
        let mut a = anchor(0.0, std::f32::consts::FRAC_PI_2, Vec3::ZERO, true);
        a.directional_offset = 0.25;
        let p = resolve_anchor(&a, &Mat4::IDENTITY, 0.0, &shape);
        assert!(p.is_finite());
        assert!((p.x + 0.25).abs() < 1e-5);
    }

    #[test]
    fn test_directional_offset_pulls_inwards() {
        let shape = Hemisphere { radius: 1.0 };
        let mut a = anchor(1.0, 0.0, Vec3::ZERO, false);
        a.directional_offset = 0.1;
        let p = resolve_anchor(&a, &Mat4::IDENTITY, 0.0, &shape);
        assert!(p.abs_diff_eq(Vec3::new(0.0, 0.0, 0.9), 1e-5));
    }

    #[test]
    fn test_spring_force_signs() {
        let s = spring(0, 1, 10.0, 1.0);
        // Stretched: a is pulled towards b
        let f = spring_force(&s, Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0));
        assert!(f.abs_diff_eq(Vec3::new(10.0, 0.0, 0.0), 1e-5));
        // Compressed: a is pushed away
        let f = spring_force(&s, Vec3::ZERO, Vec3::new(0.5, 0.0, 0.0));
        assert!(f.abs_diff_eq(Vec3::new(-5.0, 0.0, 0.0), 1e-5));
    }

    #[test]
    fn test_zero_stiffness_and_zero_length_give_no_force() {
        let slack = spring(0, 1, 0.0, 1.0);
        assert_eq!(spring_force(&slack, Vec3::ZERO, Vec3::splat(9.0)), Vec3::ZERO);
        let s = spring(0, 1, 10.0, 1.0);
        assert_eq!(spring_force(&s, Vec3::ONE, Vec3::ONE), Vec3::ZERO);
    }

    #[test]
    fn test_gathered_forces_are_equal_and_opposite() {
        let vertices = vec![
            vertex(Vec3::ZERO, false),
            vertex(Vec3::new(3.0, 0.0, 0.0), false),
        ];
        let springs = vec![spring(0, 1, 2.0, 1.0)];
        let spans = vec![
            InfluencerSpan { start: 0, count: 1 },
            InfluencerSpan { start: 1, count: 1 },
        ];
        let influencers = vec![1, -1];
        let turbulence = TurbulenceField::new(&TurbulenceConfig {
            strength: 0.0,
            ..TurbulenceConfig::default()
        });
        let env = Environment {
            gravity: Vec3::ZERO,
            current: Vec3::ZERO,
            turbulence: &turbulence,
            time: 0.0,
        };
        let mut forces = vec![Vec3::ZERO; 2];
        accumulate_forces(&mut forces, &vertices, &springs, &spans, &influencers, &env);

        assert!(forces[0].abs_diff_eq(Vec3::new(4.0, 0.0, 0.0), 1e-5));
        assert!(forces[1].abs_diff_eq(-forces[0], 1e-6));
    }

    #[test]
    fn test_fixed_vertices_are_not_integrated() {
        let mut vertices = vec![vertex(Vec3::ZERO, true), vertex(Vec3::ZERO, false)];
        let forces = vec![Vec3::Y, Vec3::Y];
        integrate(&mut vertices, &forces, 1.0, 0.5);
        assert_eq!(vertices[0].position, Vec3::ZERO);
        assert!(vertices[1].position.abs_diff_eq(Vec3::new(0.0, 0.25, 0.0), 1e-6));
        assert_eq!(vertices[1].previous, Vec3::ZERO);
    }

    #[test]
    fn test_verlet_keeps_velocity_scaled_by_drag() {
        let mut v = vertex(Vec3::new(1.0, 0.0, 0.0), false);
        v.previous = Vec3::ZERO;
        let mut vertices = vec![v];
        integrate(&mut vertices, &[Vec3::ZERO], 0.5, 0.1);
        assert!(vertices[0].position.abs_diff_eq(Vec3::new(1.5, 0.0, 0.0), 1e-6));
    }

    #[test]
    fn test_relative_rest_resolution() {
        let vertices = vec![vertex(Vec3::ZERO, true), vertex(Vec3::new(0.0, 2.0, 0.0), false)];
        let mut springs = vec![GpuSpring {
            factor: 1.2,
            mode: REST_RELATIVE,
            ..spring(0, 1, 1.0, 0.0)
        }];
        resolve_rest_lengths(&mut springs, &vertices);
        assert!((springs[0].rest_length - 2.4).abs() < 1e-6);
        assert_eq!(springs[0].mode, 0);

        // Already resolved springs are left alone
        let moved = vec![vertex(Vec3::ZERO, true), vertex(Vec3::new(0.0, 5.0, 0.0), false)];
        resolve_rest_lengths(&mut springs, &moved);
        assert!((springs[0].rest_length - 2.4).abs() < 1e-6);
    }

    #[test]
    fn test_skin_point_frame() {
        // Flat quad in the XY plane hanging downwards
        let vertices = vec![
            vertex(Vec3::new(0.0, 0.0, 0.0), false),
            vertex(Vec3::new(1.0, 0.0, 0.0), false),
            vertex(Vec3::new(0.0, -1.0, 0.0), false),
            vertex(Vec3::new(1.0, -1.0, 0.0), false),
        ];
        let skin = GpuSkin {
            drivers: [0, 1, 2, 3],
            side: Vec3::Z,
            width: 0.5,
            target: 4,
            _pad: [0; 3],
        };
        let (p, n) = skin_point(&skin, &vertices);
        // across = +X, along = -Y, normal = X x -Y = -Z
        assert!(n.abs_diff_eq(Vec3::NEG_Z, 1e-6));
        assert!(p.abs_diff_eq(Vec3::new(0.5, -0.5, -0.5), 1e-6));
    }

    #[test]
    fn test_skin_point_collapsed_quad_is_finite() {
        let vertices = vec![vertex(Vec3::ONE, false); 4];
        let skin = GpuSkin {
            drivers: [0, 1, 2, 3],
            side: Vec3::new(0.3, 0.4, 0.5),
            width: 1.0,
            target: 4,
            _pad: [0; 3],
        };
        let (p, n) = skin_point(&skin, &vertices);
        assert!(p.is_finite());
        assert!((n.length() - 1.0).abs() < 1e-5);
    }
}
