//! Bell margin: the physics skirt hanging from the bell's terminal ring
//!
//! The margin is a closed grid `columns` wide and `rows` deep:
//! - row 0 is pinned to the terminal ring (fixed anchors)
//! - lower rows are free, each seeded a little further down and outwards
//! - rows `1..=muscle_rows` each get a fixed muscle anchor lofted inwards and
//!   tied to the margin vertex by a weak spring
//! - structural springs run down and across, shear springs along both diagonals
//!
//! The margin also extends both render shells with a seam row, driver-following
//! rows of increasing thickness and a downward-facing cap row.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::shell::{RowVertex, ShellMesh};
use crate::error::BuildError;
use crate::graph::{Anchor, RestLength, SoftBodyGraph, VertexId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarginParams {
    /// Grid depth including the pinned row
    pub rows: usize,
    /// Columns around the ring; `None` takes every terminal-ring vertex.
    /// Must evenly divide the terminal ring.
    pub columns: Option<usize>,
    /// Vertical drop per row before `spread` is applied
    pub row_spacing: f32,
    pub spread: f32,
    pub structural_stiffness: f32,
    /// Rest length factor of structural springs (>1 keeps the skirt taut)
    pub structural_rest: f32,
    pub shear_stiffness: f32,
    pub muscle_rows: usize,
    /// Muscle stiffness at row 0; row `y` uses `muscle_stiffness / (y + 1)^3`
    pub muscle_stiffness: f32,
    /// Render thickness of the lowest row
    pub depth: f32,
}

impl Default for MarginParams {
    fn default() -> Self {
        Self {
            rows: 4,
            columns: None,
            row_spacing: 0.06,
            spread: 0.7,
            structural_stiffness: 2500.0,
            structural_rest: 1.2,
            shear_stiffness: 250.0,
            muscle_rows: 3,
            muscle_stiffness: 1200.0,
            depth: 0.025,
        }
    }
}

impl MarginParams {
    pub fn validate(&self) -> Result<(), BuildError> {
        if self.rows < 3 {
            return Err(BuildError::MarginTooShallow {
                rows: self.rows,
                required: 3,
            });
        }
        if self.muscle_rows >= self.rows {
            return Err(BuildError::InvalidParameter {
                name: "muscle_rows",
                reason: format!(
                    "{} muscle rows leave no free row in a {}-row margin",
                    self.muscle_rows, self.rows
                ),
            });
        }
        if self.row_spacing <= 0.0 || self.spread <= 0.0 {
            return Err(BuildError::InvalidParameter {
                name: "row_spacing",
                reason: "row spacing and spread must be positive".to_string(),
            });
        }
        Ok(())
    }
}

/// Physics ids of the margin grid, one closed row per entry
#[derive(Debug, Clone, PartialEq)]
pub struct MarginRows {
    pub rows: Vec<Vec<VertexId>>,
    pub muscles: Vec<VertexId>,
}

impl MarginRows {
    pub fn width(&self) -> usize {
        self.rows.first().map(Vec::len).unwrap_or(0)
    }

    pub fn depth(&self) -> usize {
        self.rows.len()
    }
}

/// Column stride into the terminal ring
fn column_stride(params: &MarginParams, available: usize) -> Result<usize, BuildError> {
    let columns = params.columns.unwrap_or(available);
    if columns == 0 {
        return Err(BuildError::InvalidParameter {
            name: "columns",
            reason: "margin needs at least one column".to_string(),
        });
    }
    if columns > available {
        return Err(BuildError::MarginWiderThanBell {
            requested: columns,
            available,
        });
    }
    if available % columns != 0 {
        return Err(BuildError::MarginNotDivisor { columns, available });
    }
    Ok(available / columns)
}

pub fn generate(
    graph: &mut SoftBodyGraph,
    outer: &mut ShellMesh,
    inner: &mut ShellMesh,
    terminal: &[RowVertex],
    params: &MarginParams,
) -> Result<MarginRows, BuildError> {
    params.validate()?;
    let stride = column_stride(params, terminal.len())?;
    let pivots: Vec<RowVertex> = terminal.iter().step_by(stride).copied().collect();
    let width = pivots.len();
    let height = params.rows;

    let mut rows: Vec<Vec<VertexId>> = Vec::with_capacity(height);
    let mut infos: Vec<Vec<RowVertex>> = Vec::with_capacity(height);
    let mut muscles = Vec::new();

    for y in 0..height {
        let mut row = Vec::with_capacity(width);
        let mut info_row = Vec::with_capacity(width);

        for pivot in &pivots {
            let (sin_az, cos_az) = pivot.azimuth.sin_cos();
            let drop = y as f32 * params.row_spacing;
            let offset = Vec3::new(sin_az * drop, -drop, cos_az * drop) * params.spread;
            let fixed = y == 0;

            let vertex = graph.add_vertex(Vec3::ZERO, fixed);
            graph.register_anchor(
                Anchor::new(vertex, pivot.zenith, pivot.azimuth, fixed).with_offset(offset),
            )?;

            if y >= 1 && y <= params.muscle_rows {
                let muscle = graph.add_vertex(Vec3::ZERO, true);
                graph.register_anchor(
                    Anchor::new(muscle, pivot.zenith, pivot.azimuth, true)
                        .with_directional_offset(-offset.y),
                )?;
                let stiffness = params.muscle_stiffness / ((y + 1) as f32).powi(3);
                graph.add_spring(vertex, muscle, stiffness, RestLength::Relative(1.0))?;
                muscles.push(muscle);
            }

            row.push(vertex);
            info_row.push(RowVertex {
                ptr: 0,
                zenith: pivot.zenith,
                azimuth: pivot.azimuth,
                offset,
                physics: Some(vertex),
            });
        }
        rows.push(row);
        infos.push(info_row);
    }

    for y in 1..height {
        for x in 0..width {
            let next = (x + 1) % width;
            let v0 = rows[y][x];
            let v1 = rows[y - 1][x];
            let v2 = rows[y][next];
            let v3 = rows[y - 1][next];

            let structural = RestLength::Relative(params.structural_rest);
            graph.add_spring(v0, v1, params.structural_stiffness, structural)?;
            if width > 1 {
                graph.add_spring(v0, v2, params.structural_stiffness, structural)?;
                graph.add_spring(v0, v3, params.shear_stiffness, RestLength::Relative(1.0))?;
                graph.add_spring(v1, v2, params.shear_stiffness, RestLength::Relative(1.0))?;
            }
        }
    }

    extend_shells(outer, inner, &pivots, &infos, params);

    log::debug!(
        "Margin: {}x{} grid (stride {}), {} muscles",
        width,
        height,
        stride,
        muscles.len()
    );
    Ok(MarginRows { rows, muscles })
}

fn extend_shells(
    outer: &mut ShellMesh,
    inner: &mut ShellMesh,
    pivots: &[RowVertex],
    infos: &[Vec<RowVertex>],
    params: &MarginParams,
) {
    let width = pivots.len();
    let height = infos.len();
    let outer_side = Vec3::Z;
    let inner_side = Vec3::NEG_Z;
    let down_side = Vec3::Y;

    let mut outer_rows: Vec<Vec<RowVertex>> = vec![pivots.to_vec()];
    let mut inner_rows: Vec<Vec<RowVertex>> = vec![pivots
        .iter()
        .map(|p| inner.add_from_params(p.zenith, p.azimuth, inner_side, 0.0))
        .collect()];
    let mut outer_cap = Vec::with_capacity(width);
    let mut inner_cap = Vec::with_capacity(width);

    for y in 2..height {
        let thickness = (y - 1) as f32 / (height - 2) as f32 * params.depth;
        let mut outer_row = Vec::with_capacity(width);
        let mut inner_row = Vec::with_capacity(width);

        for x in 0..width {
            let next = (x + 1) % width;
            let quad = [infos[y - 1][x], infos[y - 1][next], infos[y][x], infos[y][next]];

            outer_row.push(outer.add_from_drivers(quad, outer_side, thickness));
            inner_row.push(inner.add_from_drivers(quad, inner_side, thickness));

            if y == height - 1 {
                outer_cap.push(outer.add_from_drivers(quad, down_side, thickness));
                inner_cap.push(inner.add_from_drivers(quad, down_side, thickness));
            }
        }
        outer_rows.push(outer_row);
        inner_rows.push(inner_row);
    }
    outer_rows.push(outer_cap);
    inner_rows.push(inner_cap);

    for pair in outer_rows.windows(2) {
        outer.stitch_rows(&pair[0], &pair[1]);
    }
    for pair in inner_rows.windows(2) {
        inner.stitch_rows(&pair[0], &pair[1]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::bell::generate_shell;
    use crate::topology::shell::ShellSide;

    fn shells(subdivisions: usize) -> (ShellMesh, ShellMesh, Vec<RowVertex>) {
        let mut outer = ShellMesh::new(ShellSide::Outer);
        let mut inner = ShellMesh::new(ShellSide::Inner);
        let rows = generate_shell(&mut outer, subdivisions).unwrap();
        generate_shell(&mut inner, subdivisions).unwrap();
        let terminal = rows.terminal().to_vec();
        (outer, inner, terminal)
    }

    #[test]
    fn test_full_width_margin() {
        let (mut outer, mut inner, terminal) = shells(4);
        let mut graph = SoftBodyGraph::new();
        let margin = generate(
            &mut graph,
            &mut outer,
            &mut inner,
            &terminal,
            &MarginParams::default(),
        )
        .unwrap();

        assert_eq!(margin.width(), 20);
        assert_eq!(margin.depth(), 4);
        assert_eq!(margin.muscles.len(), 20 * 3);
        // Top row pinned, the rest free
        assert!(margin.rows[0].iter().all(|&v| graph.vertex(v).unwrap().fixed));
        assert!(margin.rows[1..]
            .iter()
            .flatten()
            .all(|&v| !graph.vertex(v).unwrap().fixed));
        // Every margin vertex and muscle is anchored
        assert_eq!(graph.anchors().len(), 20 * 4 + 60);
        // 4 springs per cell below row 0, plus one per muscle
        assert_eq!(graph.spring_count(), 3 * 20 * 4 + 60);
    }

    #[test]
    fn test_anchor_offsets_drop_and_spread() {
        let (mut outer, mut inner, terminal) = shells(4);
        let mut graph = SoftBodyGraph::new();
        let params = MarginParams::default();
        let margin = generate(&mut graph, &mut outer, &mut inner, &terminal, &params).unwrap();

        let top = graph.anchor_of(margin.rows[0][3]).unwrap();
        assert_eq!(top.offset, Vec3::ZERO);
        assert!(top.fixed);

        let low = graph.anchor_of(margin.rows[3][3]).unwrap();
        let expected_drop = 3.0 * params.row_spacing * params.spread;
        assert!((low.offset.y + expected_drop).abs() < 1e-6);
        assert!(!low.fixed);
        assert_eq!(low.zenith, top.zenith);
    }

    #[test]
    fn test_muscle_lofted_and_weakening() {
        let (mut outer, mut inner, terminal) = shells(4);
        let mut graph = SoftBodyGraph::new();
        let params = MarginParams::default();
        let margin = generate(&mut graph, &mut outer, &mut inner, &terminal, &params).unwrap();

        let v1 = margin.rows[1][0];
        let (muscle_spring, muscle) = graph
            .incidence(v1)
            .iter()
            .map(|inc| graph.springs()[inc.spring()])
            .find_map(|s| {
                let other = if s.a == v1 { s.b } else { s.a };
                margin.muscles.contains(&other).then_some((s, other))
            })
            .unwrap();

        let anchor = graph.anchor_of(muscle).unwrap();
        assert!(anchor.fixed);
        assert!(anchor.directional_offset > 0.0);
        assert!((muscle_spring.stiffness - params.muscle_stiffness / 8.0).abs() < 1e-3);
    }

    #[test]
    fn test_column_validation() {
        let (mut outer, mut inner, terminal) = shells(4);
        let mut graph = SoftBodyGraph::new();

        let wide = MarginParams {
            columns: Some(40),
            ..MarginParams::default()
        };
        assert_eq!(
            generate(&mut graph, &mut outer, &mut inner, &terminal, &wide).unwrap_err(),
            BuildError::MarginWiderThanBell {
                requested: 40,
                available: 20
            }
        );

        let odd = MarginParams {
            columns: Some(7),
            ..MarginParams::default()
        };
        assert_eq!(
            generate(&mut graph, &mut outer, &mut inner, &terminal, &odd).unwrap_err(),
            BuildError::MarginNotDivisor {
                columns: 7,
                available: 20
            }
        );

        let half = MarginParams {
            columns: Some(10),
            ..MarginParams::default()
        };
        let margin = generate(&mut graph, &mut outer, &mut inner, &terminal, &half).unwrap();
        assert_eq!(margin.width(), 10);
    }

    #[test]
    fn test_shallow_margin_rejected() {
        let params = MarginParams {
            rows: 2,
            muscle_rows: 1,
            ..MarginParams::default()
        };
        assert_eq!(
            params.validate().unwrap_err(),
            BuildError::MarginTooShallow {
                rows: 2,
                required: 3
            }
        );
    }

    #[test]
    fn test_shells_gain_margin_faces() {
        let (mut outer, mut inner, terminal) = shells(4);
        let before = outer.triangle_count();
        let mut graph = SoftBodyGraph::new();
        generate(
            &mut graph,
            &mut outer,
            &mut inner,
            &terminal,
            &MarginParams::default(),
        )
        .unwrap();

        // seam + rows 2..4 + cap = 4 rows of quads after the seam
        assert_eq!(outer.triangle_count() - before, 2 * 20 * 3);
        assert_eq!(outer.triangle_count(), inner.triangle_count());
        let driven = outer.vertices.iter().filter(|v| v.drivers.is_some()).count();
        assert_eq!(driven, 20 * 3);
    }
}
