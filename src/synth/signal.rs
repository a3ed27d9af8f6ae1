//! Signal synthesis.
//!
//! Two passes: first every signal slot is assigned a cluster and the root
//! cause slot of each cluster name is fixed, then each slot is built
//! independently (position, labels, text, impact).

use std::collections::HashMap;

use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::distribution::{clamp_index, index_to_coordinate, nearest_slot};
use crate::impact::{classify_impact, sample_symptom_impact, ImpactLevel};
use crate::taxonomy::{Axis, JourneyStage, Taxonomy};

use super::cluster::Cluster;
use super::GeneratorConfig;

/// First numeric suffix of signal ids.
pub const SIGNAL_ID_BASE: usize = 1000;

/// Sources used when a description matches no keyword rule.
pub const GENERIC_SOURCES: [&str; 4] = [
    "Customer reviews",
    "User sessions",
    "Support requests",
    "In-depth interviews",
];

static SOURCE_RULES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"(?i)\b(search(ed|es|ing)?|query|filters?|typed)\b", "Internal search logs"),
        (r"(?i)\b(ticket|support|agent|refund)\b", "Support tickets"),
        (r"(?i)\b(reviews?|rating|stars?)\b", "Customer reviews"),
        (r"(?i)\b(chat|asked)\b", "Chat transcripts"),
        (r"(?i)\b(session|abandon(ed)?|cart|checkout|scrolled|tapped)\b", "Session recordings"),
        (r"(?i)\b(interview|told us)\b", "In-depth interviews"),
    ]
    .into_iter()
    .filter_map(|(pattern, source)| Regex::new(pattern).ok().map(|re| (re, source)))
    .collect()
});

/// One synthetic observation in the cube.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    pub id: String,
    /// World position `[x, y, z]` = `[job, context, segment]`.
    pub position: [f64; 3],
    pub cluster_name: String,
    pub is_root_cause: bool,
    pub description: String,
    pub source: String,
    pub job_category: String,
    pub job_index: usize,
    pub segment: String,
    pub segment_index: usize,
    pub context: String,
    pub context_index: usize,
    pub journey_stage: JourneyStage,
    pub impact_score: f64,
    pub impact_level: ImpactLevel,
    pub color: String,
}

impl Signal {
    /// Slot index of this signal on an axis.
    pub fn slot(&self, axis: Axis) -> usize {
        match axis {
            Axis::Job => self.job_index,
            Axis::Context => self.context_index,
            Axis::Segment => self.segment_index,
        }
    }
}

/// Keyword-inferred provenance of a description, if any rule matches.
pub fn infer_source(description: &str) -> Option<&'static str> {
    SOURCE_RULES
        .iter()
        .find(|(re, _)| re.is_match(description))
        .map(|(_, source)| *source)
}

/// Assign a cluster index to every signal slot.
///
/// With `guarantee_coverage` the slots are dealt round-robin over a shuffled
/// cluster order and then shuffled, so every cluster receives at least one
/// slot whenever `count >= clusters`. Otherwise each slot draws its cluster
/// independently and uniformly.
pub fn allocate_slots<R: Rng + ?Sized>(
    rng: &mut R,
    count: usize,
    clusters: usize,
    guarantee_coverage: bool,
) -> Vec<usize> {
    if clusters == 0 {
        return Vec::new();
    }
    if !guarantee_coverage {
        return (0..count).map(|_| rng.gen_range(0..clusters)).collect();
    }

    let mut order: Vec<usize> = (0..clusters).collect();
    order.shuffle(rng);
    let mut slots: Vec<usize> = (0..count).map(|k| order[k % clusters]).collect();
    slots.shuffle(rng);
    slots
}

/// Mark the root cause slot of every cluster name: the first slot whose
/// cluster carries that name.
pub fn root_cause_slots(slots: &[usize], clusters: &[Cluster]) -> Vec<bool> {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    let mut roots = vec![false; slots.len()];
    for (k, &cluster) in slots.iter().enumerate() {
        let name = clusters[cluster].name.as_str();
        if !seen.contains_key(name) {
            seen.insert(name, k);
            roots[k] = true;
        }
    }
    roots
}

/// Build every signal from the cluster list.
pub fn synthesize_signals<R: Rng + ?Sized>(
    rng: &mut R,
    taxonomy: &Taxonomy,
    clusters: &[Cluster],
    config: &GeneratorConfig,
) -> Vec<Signal> {
    let slots = allocate_slots(rng, config.count, clusters.len(), config.guarantee_coverage);
    let roots = root_cause_slots(&slots, clusters);

    slots
        .iter()
        .zip(roots)
        .enumerate()
        .map(|(k, (&cluster, is_root))| {
            build_signal(rng, k, &clusters[cluster], is_root, taxonomy, config)
        })
        .collect()
}

fn build_signal<R: Rng + ?Sized>(
    rng: &mut R,
    k: usize,
    cluster: &Cluster,
    is_root_cause: bool,
    taxonomy: &Taxonomy,
    config: &GeneratorConfig,
) -> Signal {
    let impact_score = if is_root_cause {
        cluster.impact_score
    } else {
        sample_symptom_impact(rng, cluster.impact_score, cluster.impact_level)
    };

    let mut indices = [
        cluster.hotspot.job_index as f64,
        cluster.hotspot.context_index as f64,
        cluster.hotspot.segment_index as f64,
    ];
    for index in indices.iter_mut() {
        *index += symmetric(rng, config.axis_noise);
    }
    if rng.gen::<f64>() < config.drift_probability {
        let axis = rng.gen_range(0..3);
        indices[axis] += symmetric(rng, config.drift_span);
    }
    let indices = indices.map(clamp_index);

    let position = [
        index_to_coordinate(rng, indices[0], config.coordinate_jitter),
        index_to_coordinate(rng, indices[1], config.coordinate_jitter),
        index_to_coordinate(rng, indices[2], config.coordinate_jitter),
    ];
    let job_index = nearest_slot(indices[0]);
    let context_index = nearest_slot(indices[1]);
    let segment_index = nearest_slot(indices[2]);

    let description = cluster
        .templates
        .choose(rng)
        .cloned()
        .unwrap_or_else(|| cluster.name.clone());
    let source = match infer_source(&description) {
        Some(source) => source,
        None => GENERIC_SOURCES[rng.gen_range(0..GENERIC_SOURCES.len())],
    };

    Signal {
        id: format!("sig-{}", SIGNAL_ID_BASE + k),
        position,
        cluster_name: cluster.name.clone(),
        is_root_cause,
        description,
        source: source.to_string(),
        job_category: label(taxonomy, Axis::Job, job_index),
        job_index,
        segment: label(taxonomy, Axis::Segment, segment_index),
        segment_index,
        context: label(taxonomy, Axis::Context, context_index),
        context_index,
        journey_stage: cluster.journey_stage,
        impact_score,
        impact_level: classify_impact(impact_score),
        color: cluster.color.clone(),
    }
}

fn label(taxonomy: &Taxonomy, axis: Axis, slot: usize) -> String {
    taxonomy.label(axis, slot).unwrap_or_default().to_string()
}

/// Uniform draw in `[-half, half)`, zero for a non-positive width.
fn symmetric<R: Rng + ?Sized>(rng: &mut R, half: f64) -> f64 {
    if half > 0.0 {
        rng.gen_range(-half..half)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn keyword_rules_pick_sources() {
        assert_eq!(infer_source("Searched 'tall fit'"), Some("Internal search logs"));
        assert_eq!(infer_source("Ticket: refund pending"), Some("Support tickets"));
        assert_eq!(infer_source("Review: too short"), Some("Customer reviews"));
        assert_eq!(infer_source("Asked about wool"), Some("Chat transcripts"));
        assert_eq!(infer_source("Abandoned cart"), Some("Session recordings"));
        assert_eq!(infer_source("Interview: I hate pilling"), Some("In-depth interviews"));
        assert_eq!(infer_source("Photo of a torn hem"), None);
    }

    #[test]
    fn dealt_allocation_covers_every_cluster_evenly() {
        let mut rng = StdRng::seed_from_u64(4);
        let slots = allocate_slots(&mut rng, 1000, 45, true);
        let mut counts = vec![0usize; 45];
        for s in &slots {
            counts[*s] += 1;
        }
        assert!(counts.iter().all(|&c| c == 22 || c == 23), "{counts:?}");
    }

    #[test]
    fn independent_allocation_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(4);
        let slots = allocate_slots(&mut rng, 500, 7, false);
        assert_eq!(slots.len(), 500);
        assert!(slots.iter().all(|&s| s < 7));
        assert!(allocate_slots(&mut rng, 10, 0, true).is_empty());
    }

    #[test]
    fn symmetric_handles_zero_width() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(symmetric(&mut rng, 0.0), 0.0);
        for _ in 0..100 {
            let v = symmetric(&mut rng, 0.5);
            assert!((-0.5..0.5).contains(&v));
        }
    }
}
