//! Cluster synthesis: impact tier, journey stage, spatial hotspot and color
//! for every problem cluster of a generation.

use std::collections::HashMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::distribution::AXIS_SLOTS;
use crate::impact::{classify_impact, sample_cluster_impact, ImpactLevel};
use crate::taxonomy::{JourneyStage, Taxonomy, TaxonomyOrigin};

use super::GeneratorConfig;

/// Cluster colors, handed out in order of first appearance of a name.
pub const PALETTE: [&str; 20] = [
    "#ff4d4f", "#ff7a45", "#ffa940", "#ffc53d", "#ffec3d", "#bae637", "#73d13d", "#36cfc9",
    "#40a9ff", "#597ef7", "#9254de", "#f759ab", "#e6f7ff", "#d3adf7", "#87e8de", "#ffd8bf",
    "#b7eb8f", "#adc6ff", "#ffadd2", "#fffb8f",
];

/// Stage draw weights: half of all clusters land in Purchase, a fifth in
/// Retention, the rest spread over the remaining stages.
const PURCHASE_SHARE: f64 = 0.5;
const RETENTION_SHARE: f64 = 0.2;
const OTHER_STAGES: [JourneyStage; 5] = [
    JourneyStage::Awareness,
    JourneyStage::Consideration,
    JourneyStage::Onboarding,
    JourneyStage::ActiveUse,
    JourneyStage::Advocacy,
];

/// Integer slot indices around which a cluster's signals are scattered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hotspot {
    pub job_index: usize,
    pub segment_index: usize,
    pub context_index: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    pub name: String,
    pub templates: Vec<String>,
    pub hotspot: Hotspot,
    pub impact_score: f64,
    pub impact_level: ImpactLevel,
    pub journey_stage: JourneyStage,
    pub color: String,
}

/// First-seen-name color assignment over [`PALETTE`].
#[derive(Debug, Default)]
pub struct ColorAssigner {
    assigned: HashMap<String, &'static str>,
}

impl ColorAssigner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn color_for(&mut self, name: &str) -> &'static str {
        if let Some(color) = self.assigned.get(name) {
            return color;
        }
        let color = PALETTE[self.assigned.len() % PALETTE.len()];
        self.assigned.insert(name.to_string(), color);
        color
    }
}

/// Weighted stage draw used when the taxonomy does not fix a stage.
pub fn sample_journey_stage<R: Rng + ?Sized>(rng: &mut R) -> JourneyStage {
    let roll = rng.gen::<f64>();
    if roll < PURCHASE_SHARE {
        JourneyStage::Purchase
    } else if roll < PURCHASE_SHARE + RETENTION_SHARE {
        JourneyStage::Retention
    } else {
        OTHER_STAGES[rng.gen_range(0..OTHER_STAGES.len())]
    }
}

/// Hotspot draw: segment biased toward the dominant set, job and context uniform.
pub fn sample_hotspot<R: Rng + ?Sized>(rng: &mut R, config: &GeneratorConfig) -> Hotspot {
    let segment_index = if !config.dominant_segments.is_empty()
        && rng.gen::<f64>() < config.dominant_segment_bias
    {
        config.dominant_segments[rng.gen_range(0..config.dominant_segments.len())]
    } else {
        rng.gen_range(0..AXIS_SLOTS)
    };
    Hotspot {
        job_index: rng.gen_range(0..AXIS_SLOTS),
        segment_index,
        context_index: rng.gen_range(0..AXIS_SLOTS),
    }
}

/// Number of clusters a taxonomy yields under `config`.
///
/// A built-in taxonomy cycles its problem names up to `total_clusters`; an
/// external config supplies its cluster list directly.
pub fn cluster_count(taxonomy: &Taxonomy, config: &GeneratorConfig) -> usize {
    match taxonomy.origin {
        TaxonomyOrigin::BuiltIn => config.total_clusters,
        TaxonomyOrigin::External => taxonomy.problems.len(),
    }
}

/// Build the ordered cluster list. Order is the impact rank.
pub fn synthesize_clusters<R: Rng + ?Sized>(
    rng: &mut R,
    taxonomy: &Taxonomy,
    config: &GeneratorConfig,
) -> Vec<Cluster> {
    let total = cluster_count(taxonomy, config);
    let mut colors = ColorAssigner::new();
    let mut clusters = Vec::with_capacity(total);

    for rank in 0..total {
        let problem = &taxonomy.problems[rank % taxonomy.problems.len()];

        let impact_score =
            sample_cluster_impact(rng, rank, config.very_high_count, config.high_count);
        let journey_stage = match problem.journey_stage {
            Some(stage) => stage,
            None => sample_journey_stage(rng),
        };
        let hotspot = sample_hotspot(rng, config);

        clusters.push(Cluster {
            name: problem.name.clone(),
            templates: problem.templates.clone(),
            hotspot,
            impact_score,
            impact_level: classify_impact(impact_score),
            journey_stage,
            color: colors.color_for(&problem.name).to_string(),
        });
    }

    clusters
}
