//! Cluster detail panel data, related-signal lookup and co-pilot context.

use serde::Serialize;

use crate::aggregate::{aggregate, scale_percent, GroupKey, GroupScore};
use crate::copilot::HypothesisSet;
use crate::distribution::distance;
use crate::impact::ImpactLevel;
use crate::synth::{Generation, Signal};
use crate::taxonomy::JourneyStage;

/// Groups listed per axis in cluster details.
pub const TOP_GROUPS: usize = 3;
/// Signals listed in cluster details.
pub const TOP_SIGNALS: usize = 7;
/// Neighbors returned by [`related_signals`].
pub const RELATED_SIGNALS: usize = 5;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterDetails {
    pub cluster_name: String,
    pub color: String,
    pub journey_stage: JourneyStage,
    pub impact_level: ImpactLevel,
    /// Sum of impact over the cluster's signals.
    pub total_impact: f64,
    /// Share of the whole generation's impact, 0–100.
    pub relative_impact_percent: f64,
    pub signal_count: usize,
    pub top_jobs: Vec<GroupScore>,
    pub top_segments: Vec<GroupScore>,
    pub top_contexts: Vec<GroupScore>,
    pub pulsar_signal: Option<Signal>,
    pub top_signals: Vec<Signal>,
}

/// Details for one cluster name, or `None` if no cluster carries it.
pub fn cluster_details(generation: &Generation, name: &str) -> Option<ClusterDetails> {
    let cluster = generation.cluster(name)?;
    let members: Vec<&Signal> = generation.signals_in_cluster(name).collect();
    let taxonomy = &generation.taxonomy;

    let total_impact: f64 = members.iter().map(|s| s.impact_score).sum();
    let top = |key: GroupKey| {
        let mut groups = aggregate(members.iter().copied(), taxonomy, key);
        groups.truncate(TOP_GROUPS);
        groups
    };

    let mut ranked = members.clone();
    ranked.sort_by(|a, b| {
        b.impact_score
            .partial_cmp(&a.impact_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    Some(ClusterDetails {
        cluster_name: cluster.name.clone(),
        color: cluster.color.clone(),
        journey_stage: cluster.journey_stage,
        impact_level: cluster.impact_level,
        total_impact,
        relative_impact_percent: scale_percent(total_impact, generation.total_impact()),
        signal_count: members.len(),
        top_jobs: top(GroupKey::Job),
        top_segments: top(GroupKey::Segment),
        top_contexts: top(GroupKey::Context),
        pulsar_signal: members.iter().find(|s| s.is_root_cause).map(|s| (*s).clone()),
        top_signals: ranked
            .into_iter()
            .take(TOP_SIGNALS)
            .cloned()
            .collect(),
    })
}

/// Nearest signals sharing `selected`'s job, closest first, excluding itself.
pub fn related_signals<'a>(
    signals: &'a [Signal],
    selected: &Signal,
    limit: usize,
) -> Vec<&'a Signal> {
    let mut candidates: Vec<(f64, &Signal)> = signals
        .iter()
        .filter(|s| s.id != selected.id && s.job_index == selected.job_index)
        .map(|s| (distance(&s.position, &selected.position), s))
        .collect();
    candidates.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
    candidates.into_iter().take(limit).map(|(_, s)| s).collect()
}

/// Context string handed to the co-pilot chat for a cluster.
pub fn copilot_context(
    product_name: &str,
    details: &ClusterDetails,
    hypotheses: Option<&HypothesisSet>,
) -> String {
    let groups = |items: &[GroupScore]| {
        items
            .iter()
            .map(|g| format!("{} ({:.1})", g.label, g.score))
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut out = String::new();
    out.push_str(&format!("Product: {product_name}\n"));
    out.push_str(&format!("Cluster: {}\n", details.cluster_name));
    out.push_str(&format!("Total Impact: {:.1}\n", details.total_impact));
    out.push_str(&format!(
        "Relative Impact: {:.1}% of total product friction.\n",
        details.relative_impact_percent
    ));
    out.push_str(&format!("Top Segments: {}\n", groups(&details.top_segments)));
    out.push_str(&format!("Top Contexts: {}\n", groups(&details.top_contexts)));
    out.push_str(&format!("Top Jobs: {}\n", groups(&details.top_jobs)));
    if let Some(pulsar) = &details.pulsar_signal {
        out.push_str(&format!(
            "Pulsar Signal: \"{}\" (Source: {})\n",
            pulsar.description, pulsar.source
        ));
    }
    out.push_str(&format!("Top {TOP_SIGNALS} Signals samples:\n"));
    for s in &details.top_signals {
        out.push_str(&format!("- \"{}\" (Impact: {:.1})\n", s.description, s.impact_score));
    }
    if let Some(h) = hypotheses {
        let join = |items: &[crate::copilot::Hypothesis]| {
            items
                .iter()
                .map(|h| h.text.as_str())
                .collect::<Vec<_>>()
                .join(" | ")
        };
        out.push_str("Existing Hypotheses:\n");
        out.push_str(&format!("- Quick: {}\n", join(&h.quick_wins)));
        out.push_str(&format!("- Balanced: {}\n", join(&h.balanced)));
        out.push_str(&format!("- Revolutionary: {}\n", join(&h.revolutionary)));
    }
    out
}
