//! Oral arms hanging from the subumbrella
//!
//! Two styles:
//! - [`OralArmStyle::Strand`]: one chain per arm with seeded length jitter,
//!   absolute rest lengths and bending stiffness tapering towards the tip
//! - [`OralArmStyle::Ribbon`]: a `rows x width` grid per arm with relative rest
//!   lengths, periodic long-range contraction springs and a derived skin
//!
//! Both anchor in the bottom-reference frame: offsets are measured from the
//! flattened subumbrella point, not along the bell surface.

use glam::Vec3;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f32::consts::{PI, TAU};

use crate::error::BuildError;
use crate::graph::{Anchor, AnchorFrame, RestLength, SoftBodyGraph, VertexId};
use crate::shape::lerp;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum OralArmStyle {
    #[default]
    None,
    Strand(StrandArmParams),
    Ribbon(RibbonArmParams),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrandArmParams {
    pub arms: usize,
    pub nodes: usize,
    /// Nominal arm length before the per-arm scale
    pub length: f32,
    pub length_scale_min: f32,
    pub length_scale_max: f32,
    pub attachment_zenith: f32,
    pub stretch_stiffness: f32,
    pub bend_base: f32,
    pub bend_tip: f32,
}

impl Default for StrandArmParams {
    fn default() -> Self {
        Self {
            arms: 4,
            nodes: 50,
            length: 8.0,
            length_scale_min: 0.75,
            length_scale_max: 1.5,
            attachment_zenith: 0.2,
            stretch_stiffness: 3000.0,
            bend_base: 1500.0,
            bend_tip: 75.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RibbonArmParams {
    pub arms: usize,
    pub rows: usize,
    /// Vertices across the ribbon (at least 3)
    pub width: usize,
    pub attachment_zenith: f32,
    pub stiffness: f32,
    /// Nominal row drop; each row adds up to 50% on top
    pub row_spacing: f32,
    /// Sideways scatter of each node's offset
    pub scatter: f32,
    /// Rows between long-range contraction springs
    pub contraction_period: usize,
    /// Stiffness ratio of contraction springs
    pub contraction_stiffness: f32,
    /// Rest factor range of contraction springs
    pub contraction_rest_min: f32,
    pub contraction_rest_max: f32,
    /// Half-width of the skin at the root
    pub skin_width: f32,
}

impl Default for RibbonArmParams {
    fn default() -> Self {
        Self {
            arms: 4,
            rows: 35,
            width: 5,
            attachment_zenith: 0.2,
            stiffness: 600.0,
            row_spacing: 0.1,
            scatter: 0.1,
            contraction_period: 5,
            contraction_stiffness: 0.2,
            contraction_rest_min: 0.3,
            contraction_rest_max: 0.5,
            skin_width: 0.04,
        }
    }
}

/// Generated layout of one arm
#[derive(Debug, Clone, PartialEq)]
pub enum OralArm {
    Strand(Vec<VertexId>),
    Ribbon {
        /// Physics grid, `rows x width`
        grid: Vec<Vec<VertexId>>,
        /// Skin vertex rings, one per grid row after the first
        skin_rows: Vec<Vec<VertexId>>,
        /// Triangles over skin vertex ids
        skin_indices: Vec<u32>,
    },
}

impl OralArm {
    /// Physics vertices of the arm, root first
    pub fn physics_vertices(&self) -> Vec<VertexId> {
        match self {
            OralArm::Strand(ids) => ids.clone(),
            OralArm::Ribbon { grid, .. } => grid.iter().flatten().copied().collect(),
        }
    }
}

pub fn generate<R: Rng>(
    graph: &mut SoftBodyGraph,
    style: &OralArmStyle,
    rng: &mut R,
) -> Result<Vec<OralArm>, BuildError> {
    let arms = match style {
        OralArmStyle::None => Vec::new(),
        OralArmStyle::Strand(params) => generate_strands(graph, params, rng)?,
        OralArmStyle::Ribbon(params) => generate_ribbons(graph, params, rng)?,
    };
    log::debug!("Oral arms: {} arms ({} style)", arms.len(), style_name(style));
    Ok(arms)
}

fn style_name(style: &OralArmStyle) -> &'static str {
    match style {
        OralArmStyle::None => "none",
        OralArmStyle::Strand(_) => "strand",
        OralArmStyle::Ribbon(_) => "ribbon",
    }
}

fn generate_strands<R: Rng>(
    graph: &mut SoftBodyGraph,
    params: &StrandArmParams,
    rng: &mut R,
) -> Result<Vec<OralArm>, BuildError> {
    if params.nodes < 2 {
        return Err(BuildError::InvalidParameter {
            name: "nodes",
            reason: format!("an oral arm needs at least 2 nodes, got {}", params.nodes),
        });
    }
    if !(params.length > 0.0
        && params.length_scale_min > 0.0
        && params.length_scale_max >= params.length_scale_min)
    {
        return Err(BuildError::InvalidParameter {
            name: "length",
            reason: "arm length and scale range must be positive".to_string(),
        });
    }

    let mut arms = Vec::with_capacity(params.arms);
    for i in 0..params.arms {
        let scale = lerp(
            params.length_scale_min,
            params.length_scale_max,
            rng.random::<f32>(),
        );
        let spacing = params.length * scale / params.nodes as f32;
        let azimuth = i as f32 / params.arms as f32 * TAU;

        let mut ids: Vec<VertexId> = Vec::with_capacity(params.nodes);
        let mut offset = Vec3::ZERO;
        for p in 0..params.nodes {
            let fixed = p == 0;
            let t = p as f32 / (params.nodes - 1) as f32;
            let vertex = graph.add_strand_vertex(Vec3::ZERO, fixed, t);
            graph.register_anchor(
                Anchor::new(vertex, params.attachment_zenith, azimuth, fixed)
                    .with_offset(offset)
                    .with_frame(AnchorFrame::Bottom),
            )?;

            if p > 0 {
                graph.add_spring(
                    vertex,
                    ids[p - 1],
                    params.stretch_stiffness,
                    RestLength::Absolute(spacing),
                )?;
            }
            if p > 1 {
                let bend = lerp(params.bend_tip, params.bend_base, 1.0 - t);
                graph.add_spring(vertex, ids[p - 2], bend, RestLength::Absolute(2.0 * spacing))?;
            }

            ids.push(vertex);
            offset.y -= spacing;
        }
        arms.push(OralArm::Strand(ids));
    }
    Ok(arms)
}

fn generate_ribbons<R: Rng>(
    graph: &mut SoftBodyGraph,
    params: &RibbonArmParams,
    rng: &mut R,
) -> Result<Vec<OralArm>, BuildError> {
    if params.width < 3 {
        return Err(BuildError::InvalidParameter {
            name: "width",
            reason: format!("ribbons need at least 3 columns, got {}", params.width),
        });
    }
    if params.rows < 2 {
        return Err(BuildError::InvalidParameter {
            name: "rows",
            reason: format!("ribbons need at least 2 rows, got {}", params.rows),
        });
    }
    if params.contraction_period == 0 {
        return Err(BuildError::InvalidParameter {
            name: "contraction_period",
            reason: "must be at least 1".to_string(),
        });
    }

    let rows = params.rows;
    let width = params.width;
    let stiffness = params.stiffness;
    let period = params.contraction_period;

    let mut arms = Vec::with_capacity(params.arms);
    for i in 0..params.arms {
        let azimuth = i as f32 / params.arms as f32 * TAU;
        let mut offset = Vec3::new(0.0, params.row_spacing * 0.5, 0.0);

        let mut grid: Vec<Vec<VertexId>> = Vec::with_capacity(rows);
        for y in 0..rows {
            let mut row = Vec::with_capacity(width);
            let taper = 0.05 + (1.0 - y as f32 / rows as f32) * 0.1;
            for x in 0..width {
                offset.x = (rng.random::<f32>() - 0.5) * params.scatter;
                let across = (x as f32 / (width - 1) as f32 - 0.5) * 2.0;
                let zenith = params.attachment_zenith + across * taper;
                let fixed = y == 0;

                let vertex = graph.add_vertex(Vec3::ZERO, fixed);
                graph.register_anchor(
                    Anchor::new(vertex, zenith, azimuth, fixed)
                        .with_offset(offset)
                        .with_frame(AnchorFrame::Bottom),
                )?;
                row.push(vertex);
            }
            offset.y -= params.row_spacing * (1.0 + rng.random::<f32>() * 0.5);
            grid.push(row);
        }

        for y in 1..rows {
            for x in 0..width {
                let v0 = grid[y][x];
                let unit = RestLength::Relative(1.0);
                graph.add_spring(v0, grid[y - 1][x], stiffness, unit)?;
                if x > 0 {
                    graph.add_spring(v0, grid[y][x - 1], stiffness, unit)?;
                }
                if x > 1 {
                    graph.add_spring(v0, grid[y][x - 2], stiffness, unit)?;
                }
                if y > 1 {
                    graph.add_spring(v0, grid[y - 2][x], stiffness, unit)?;
                }
                if y > period.max(3) && (y - 3) % period == 0 {
                    let rest = lerp(
                        params.contraction_rest_min,
                        params.contraction_rest_max,
                        rng.random::<f32>(),
                    );
                    graph.add_spring(
                        v0,
                        grid[y - period][x],
                        stiffness * params.contraction_stiffness,
                        RestLength::Relative(rest),
                    )?;
                }
            }
        }

        let (skin_rows, skin_indices) = build_skin(graph, &grid, params)?;
        arms.push(OralArm::Ribbon {
            grid,
            skin_rows,
            skin_indices,
        });
    }
    Ok(arms)
}

/// Skin ring for every grid row after the first: a left edge, a front and a
/// back vertex per quad column, and a right edge, closed into a loop
fn build_skin(
    graph: &mut SoftBodyGraph,
    grid: &[Vec<VertexId>],
    params: &RibbonArmParams,
) -> Result<(Vec<Vec<VertexId>>, Vec<u32>), BuildError> {
    let rows = grid.len();
    let width = params.width;
    let left = Vec3::NEG_X;
    let right = Vec3::X;
    let back = Vec3::NEG_Z;

    let mut skin_rows = Vec::with_capacity(rows.saturating_sub(1));
    for y in 1..rows {
        let half_width = if y == rows - 1 {
            0.0
        } else {
            params.skin_width * 0.5 * (1.0 + (1.0 - y as f32 / rows as f32))
        };
        let thickness = half_width * 2.0;

        let mut front_row = Vec::with_capacity(width + 1);
        let mut back_row = Vec::with_capacity(width - 1);
        for x in 0..width - 1 {
            let drivers = [grid[y - 1][x], grid[y - 1][x + 1], grid[y][x], grid[y][x + 1]];
            let t = x as f32 / (width - 2) as f32;
            let angle = lerp(-PI * 0.4, PI * 0.4, t);
            let smooth = Vec3::new(angle.sin(), 0.0, angle.cos());

            if x == 0 {
                front_row.push(graph.add_skin_vertex(drivers, left, thickness)?);
            }
            front_row.push(graph.add_skin_vertex(drivers, smooth, thickness)?);
            back_row.push(graph.add_skin_vertex(drivers, back, thickness)?);
            if x == width - 2 {
                front_row.push(graph.add_skin_vertex(drivers, right, thickness)?);
            }
        }
        back_row.reverse();
        front_row.extend(back_row);
        skin_rows.push(front_row);
    }

    let mut indices = Vec::new();
    for pair in skin_rows.windows(2) {
        let (prev, curr) = (&pair[0], &pair[1]);
        let ring = prev.len().min(curr.len());
        for k in 0..ring {
            let next = (k + 1) % ring;
            let (v0, v1, v2, v3) = (prev[k], prev[next], curr[k], curr[next]);
            indices.extend_from_slice(&[v2, v1, v0, v1, v2, v3]);
        }
    }
    Ok((skin_rows, indices))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256StarStar;

    #[test]
    fn test_strand_arms_layout() {
        let mut graph = SoftBodyGraph::new();
        let mut rng = Xoshiro256StarStar::seed_from_u64(11);
        let params = StrandArmParams::default();
        let arms = generate(&mut graph, &OralArmStyle::Strand(params.clone()), &mut rng).unwrap();

        assert_eq!(arms.len(), 4);
        assert_eq!(graph.vertex_count(), 4 * 50);
        // stretch for every node after the root, bend for every node after the second
        assert_eq!(graph.spring_count(), 4 * (49 + 48));

        for arm in &arms {
            let ids = arm.physics_vertices();
            let root = graph.anchor_of(ids[0]).unwrap();
            assert!(root.fixed);
            assert_eq!(root.frame, AnchorFrame::Bottom);
            assert_eq!(root.zenith, params.attachment_zenith);
            assert!(ids[1..].iter().all(|&v| !graph.vertex(v).unwrap().fixed));
        }
    }

    #[test]
    fn test_strand_length_scale_within_range() {
        let mut graph = SoftBodyGraph::new();
        let mut rng = Xoshiro256StarStar::seed_from_u64(2);
        let params = StrandArmParams::default();
        let arms = generate(&mut graph, &OralArmStyle::Strand(params.clone()), &mut rng).unwrap();

        for arm in &arms {
            let ids = arm.physics_vertices();
            let tip = graph.anchor_of(*ids.last().unwrap()).unwrap();
            let spacing = -tip.offset.y / (params.nodes - 1) as f32;
            let length = spacing * params.nodes as f32;
            assert!(length >= params.length * params.length_scale_min - 1e-3);
            assert!(length <= params.length * params.length_scale_max + 1e-3);
        }
    }

    #[test]
    fn test_strand_progress_spans_root_to_tip() {
        let mut graph = SoftBodyGraph::new();
        let mut rng = Xoshiro256StarStar::seed_from_u64(4);
        let arms = generate(&mut graph, &OralArmStyle::Strand(StrandArmParams::default()), &mut rng)
            .unwrap();
        for arm in &arms {
            let ids = arm.physics_vertices();
            assert_eq!(graph.vertex(ids[0]).unwrap().progress, 0.0);
            let tip = graph.vertex(*ids.last().unwrap()).unwrap();
            assert!((tip.progress - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_strand_bending_tapers() {
        let mut graph = SoftBodyGraph::new();
        let mut rng = Xoshiro256StarStar::seed_from_u64(2);
        let params = StrandArmParams::default();
        generate(&mut graph, &OralArmStyle::Strand(params.clone()), &mut rng).unwrap();

        let bends: Vec<f32> = graph
            .springs()
            .iter()
            .filter(|s| s.stiffness != params.stretch_stiffness)
            .take(48)
            .map(|s| s.stiffness)
            .collect();
        assert!(bends.windows(2).all(|w| w[1] < w[0]));
        assert!(bends[0] <= params.bend_base && *bends.last().unwrap() >= params.bend_tip);
    }

    #[test]
    fn test_ribbon_grid_and_skin() {
        let mut graph = SoftBodyGraph::new();
        let mut rng = Xoshiro256StarStar::seed_from_u64(3);
        let params = RibbonArmParams::default();
        let arms = generate(&mut graph, &OralArmStyle::Ribbon(params.clone()), &mut rng).unwrap();

        assert_eq!(arms.len(), 4);
        let OralArm::Ribbon {
            grid,
            skin_rows,
            skin_indices,
        } = &arms[0]
        else {
            panic!("expected ribbon");
        };
        assert_eq!(grid.len(), 35);
        assert!(grid.iter().all(|row| row.len() == 5));
        assert!(grid[0].iter().all(|&v| graph.vertex(v).unwrap().fixed));

        // left + right edges plus front and back per quad column
        assert_eq!(skin_rows.len(), 34);
        assert!(skin_rows.iter().all(|row| row.len() == 2 + 2 * 4));
        assert_eq!(skin_indices.len(), 33 * 10 * 6);

        assert_eq!(graph.skins().len(), 4 * 34 * 10);
        for skin in graph.skins() {
            let target = graph.vertex(skin.target).unwrap();
            assert!(target.fixed);
            assert!(graph.anchor_of(skin.target).is_none());
        }
    }

    #[test]
    fn test_ribbon_contraction_springs() {
        let mut graph = SoftBodyGraph::new();
        let mut rng = Xoshiro256StarStar::seed_from_u64(3);
        let params = RibbonArmParams {
            arms: 1,
            ..RibbonArmParams::default()
        };
        generate(&mut graph, &OralArmStyle::Ribbon(params.clone()), &mut rng).unwrap();

        let contraction: Vec<_> = graph
            .springs()
            .iter()
            .filter(|s| s.stiffness < params.stiffness)
            .collect();
        // rows 8, 13, 18, 23, 28, 33 across 5 columns
        assert_eq!(contraction.len(), 6 * 5);
        for s in contraction {
            match s.rest {
                RestLength::Relative(f) => assert!((0.3..=0.5).contains(&f)),
                RestLength::Absolute(_) => panic!("contraction springs are relative"),
            }
        }
    }

    #[test]
    fn test_ribbon_rejects_narrow_width() {
        let mut graph = SoftBodyGraph::new();
        let mut rng = Xoshiro256StarStar::seed_from_u64(3);
        let params = RibbonArmParams {
            width: 2,
            ..RibbonArmParams::default()
        };
        assert!(generate(&mut graph, &OralArmStyle::Ribbon(params), &mut rng).is_err());
    }
}
