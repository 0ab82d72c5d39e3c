//! Procedural topology generator
//!
//! Builds a creature's vertex/spring/anchor/skin records from a subdivision
//! count and a species description. Generation is a fixed sequence of parts:
//! - bell shells (render-only descriptors, icosahedral subdivision)
//! - margin skirt (physics grid hanging off the bell's terminal ring)
//! - tentacles (strands rooted on the margin's lowest rows)
//! - oral arms (strands or ribbons hanging from the subumbrella)
//!
//! Every random choice draws from a per-part `Xoshiro256StarStar` seeded from
//! the species seed, so the same inputs always give the same graph.

pub mod bell;
pub mod margin;
pub mod oral_arms;
pub mod shell;
pub mod tentacles;

pub use bell::BellRows;
pub use margin::{MarginParams, MarginRows};
pub use oral_arms::{OralArm, OralArmStyle, RibbonArmParams, StrandArmParams};
pub use shell::{RowVertex, ShellMesh, ShellSide, ShellVertex};
pub use tentacles::TentacleParams;

use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;
use serde::{Deserialize, Serialize};

use crate::error::BuildError;
use crate::graph::{Anchor, SkinSegment, SoftBodyGraph, Spring, Vertex, VertexId};

/// Closed set of species presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Species {
    /// Moon jelly: full-width margin, many short tentacles, ribbon oral arms
    #[default]
    Aurelia,
    /// Sea nettle: coarser margin, long trailing tentacles, strand oral arms
    Chrysaora,
}

impl Species {
    pub fn all() -> &'static [Species] {
        &[Species::Aurelia, Species::Chrysaora]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Species::Aurelia => "Aurelia",
            Species::Chrysaora => "Chrysaora",
        }
    }

    pub fn config(&self) -> SpeciesConfig {
        match self {
            Species::Aurelia => SpeciesConfig {
                name: self.name().to_string(),
                subdivisions: 24,
                seed: 0,
                margin: Some(MarginParams::default()),
                tentacles: Some(TentacleParams::default()),
                oral_arms: OralArmStyle::Ribbon(RibbonArmParams::default()),
            },
            Species::Chrysaora => SpeciesConfig {
                name: self.name().to_string(),
                subdivisions: 24,
                seed: 0,
                margin: Some(MarginParams {
                    columns: Some(60),
                    ..MarginParams::default()
                }),
                tentacles: Some(TentacleParams {
                    count: 24,
                    length: 40,
                    root_jitter: 0.3,
                    ..TentacleParams::default()
                }),
                oral_arms: OralArmStyle::Strand(StrandArmParams::default()),
            },
        }
    }
}

impl std::fmt::Display for Species {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for Species {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "aurelia" | "moon" => Ok(Species::Aurelia),
            "chrysaora" | "nettle" => Ok(Species::Chrysaora),
            _ => Err(format!(
                "Unknown species: {}. Valid: aurelia, chrysaora",
                s
            )),
        }
    }
}

/// Everything the generator needs to know about one creature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesConfig {
    pub name: String,
    pub subdivisions: usize,
    /// Seed for every randomized sub-choice
    pub seed: u64,
    #[serde(default)]
    pub margin: Option<MarginParams>,
    #[serde(default)]
    pub tentacles: Option<TentacleParams>,
    #[serde(default)]
    pub oral_arms: OralArmStyle,
}

impl Default for SpeciesConfig {
    fn default() -> Self {
        Species::default().config()
    }
}

impl SpeciesConfig {
    pub fn from_ron(text: &str) -> anyhow::Result<Self> {
        Ok(ron::from_str(text)?)
    }

    pub fn to_ron(&self) -> anyhow::Result<String> {
        Ok(ron::ser::to_string_pretty(
            self,
            ron::ser::PrettyConfig::default(),
        )?)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Generation order for this species
    pub fn parts(&self) -> Vec<Part> {
        let mut parts = vec![Part::Bell];
        if let Some(margin) = &self.margin {
            parts.push(Part::Margin(margin.clone()));
        }
        if let Some(tentacles) = &self.tentacles {
            parts.push(Part::Tentacles(tentacles.clone()));
        }
        if !matches!(self.oral_arms, OralArmStyle::None) {
            parts.push(Part::OralArms(self.oral_arms.clone()));
        }
        parts
    }

    /// Build with this config's own subdivision count
    pub fn build(&self) -> Result<Creature, BuildError> {
        build(self.subdivisions, self)
    }
}

/// One generation stage. Later parts read what earlier ones produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Bell,
    Margin(MarginParams),
    Tentacles(TentacleParams),
    OralArms(OralArmStyle),
}

impl Part {
    pub fn name(&self) -> &'static str {
        match self {
            Part::Bell => "bell",
            Part::Margin(_) => "margin",
            Part::Tentacles(_) => "tentacles",
            Part::OralArms(_) => "oral_arms",
        }
    }

    /// Per-part stream id mixed into the species seed
    fn salt(&self) -> u64 {
        match self {
            Part::Bell => 0x0B_E11,
            Part::Margin(_) => 0x3A_2617,
            Part::Tentacles(_) => 0x7E_17AC,
            Part::OralArms(_) => 0x0A_A135,
        }
    }

    fn generate(&self, creature: &mut Creature, seed: u64) -> Result<(), BuildError> {
        let mut rng = Xoshiro256StarStar::seed_from_u64(seed ^ self.salt());
        match self {
            Part::Bell => {
                creature.bell = bell::generate_shell(&mut creature.outer, creature.subdivisions)?;
                creature.inner_bell =
                    bell::generate_shell(&mut creature.inner, creature.subdivisions)?;
            }
            Part::Margin(params) => {
                let rows = margin::generate(
                    &mut creature.graph,
                    &mut creature.outer,
                    &mut creature.inner,
                    creature.bell.terminal(),
                    params,
                )?;
                creature.margin = Some(rows);
            }
            Part::Tentacles(params) => {
                let margin = creature.margin.as_ref().ok_or(BuildError::MissingMargin)?;
                creature.tentacles =
                    tentacles::generate(&mut creature.graph, margin, params, &mut rng)?;
            }
            Part::OralArms(style) => {
                creature.oral_arms = oral_arms::generate(&mut creature.graph, style, &mut rng)?;
            }
        }
        Ok(())
    }
}

/// Generator output: the graph plus the layout the renderer and tooling need
#[derive(Debug, Clone)]
pub struct Creature {
    pub subdivisions: usize,
    pub graph: SoftBodyGraph,
    pub outer: ShellMesh,
    pub inner: ShellMesh,
    pub bell: BellRows,
    pub inner_bell: BellRows,
    pub margin: Option<MarginRows>,
    pub tentacles: Vec<Vec<VertexId>>,
    pub oral_arms: Vec<OralArm>,
}

impl Creature {
    fn empty(subdivisions: usize) -> Self {
        Self {
            subdivisions,
            graph: SoftBodyGraph::new(),
            outer: ShellMesh::new(ShellSide::Outer),
            inner: ShellMesh::new(ShellSide::Inner),
            bell: BellRows::default(),
            inner_bell: BellRows::default(),
            margin: None,
            tentacles: Vec::new(),
            oral_arms: Vec::new(),
        }
    }

    /// The four record lists the bake stage consumes
    pub fn records(&self) -> (&[Vertex], &[Spring], &[Anchor], &[SkinSegment]) {
        (
            self.graph.vertices(),
            self.graph.springs(),
            self.graph.anchors(),
            self.graph.skins(),
        )
    }
}

/// Generate a creature. Pure function of `subdivisions` and `species`
/// (including its seed).
pub fn build(subdivisions: usize, species: &SpeciesConfig) -> Result<Creature, BuildError> {
    if subdivisions == 0 {
        return Err(BuildError::InvalidSubdivisions(subdivisions));
    }

    let mut creature = Creature::empty(subdivisions);
    for part in species.parts() {
        part.generate(&mut creature, species.seed)?;
        log::debug!(
            "Generated {} for {}: {} vertices, {} springs so far",
            part.name(),
            species.name,
            creature.graph.vertex_count(),
            creature.graph.spring_count()
        );
    }

    log::info!(
        "Built {} (subdivisions {}): {} vertices, {} springs, {} anchors, {} skin segments",
        species.name,
        subdivisions,
        creature.graph.vertex_count(),
        creature.graph.spring_count(),
        creature.graph.anchors().len(),
        creature.graph.skins().len()
    );
    Ok(creature)
}
