//! Impact aggregation and ranking over a grouping key.
//!
//! Aggregation always runs over the full, unfiltered signal set. Groups are
//! ranked by summed impact, descending; ties keep taxonomy order.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::synth::Signal;
use crate::taxonomy::{Axis, Taxonomy};

/// Partition used to group signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupKey {
    Job,
    Segment,
    Context,
    Cluster,
}

impl GroupKey {
    pub const ALL: [GroupKey; 4] = [
        GroupKey::Job,
        GroupKey::Segment,
        GroupKey::Context,
        GroupKey::Cluster,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GroupKey::Job => "job",
            GroupKey::Segment => "segment",
            GroupKey::Context => "context",
            GroupKey::Cluster => "cluster",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "job" | "jobs" => Some(GroupKey::Job),
            "segment" | "segments" => Some(GroupKey::Segment),
            "context" | "contexts" => Some(GroupKey::Context),
            "cluster" | "clusters" => Some(GroupKey::Cluster),
            _ => None,
        }
    }

    /// The cube axis this key groups by, if any.
    pub fn axis(&self) -> Option<Axis> {
        match self {
            GroupKey::Job => Some(Axis::Job),
            GroupKey::Segment => Some(Axis::Segment),
            GroupKey::Context => Some(Axis::Context),
            GroupKey::Cluster => None,
        }
    }

    fn label<'a>(&self, signal: &'a Signal) -> &'a str {
        match self {
            GroupKey::Job => &signal.job_category,
            GroupKey::Segment => &signal.segment,
            GroupKey::Context => &signal.context,
            GroupKey::Cluster => &signal.cluster_name,
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ranked group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupScore {
    pub label: String,
    /// Position of the group in taxonomy order, used to break ties.
    pub order: usize,
    /// Sum of impact over the group's signals.
    pub score: f64,
    /// `score` relative to the top group, 0–100.
    pub percent: f64,
    /// 1-based rank.
    pub rank: usize,
    pub signal_count: usize,
}

/// Aggregate `signals` by `key`, ranked descending.
///
/// Only groups present in the data are returned. The tie-break order is the
/// taxonomy's slot order for axis keys and problem order for clusters; labels
/// unknown to the taxonomy follow in order of first occurrence.
pub fn aggregate<'a, I>(signals: I, taxonomy: &Taxonomy, key: GroupKey) -> Vec<GroupScore>
where
    I: IntoIterator<Item = &'a Signal>,
{
    let mut index: HashMap<&'a str, usize> = HashMap::new();
    let mut groups: Vec<GroupScore> = Vec::new();

    for signal in signals {
        let label = key.label(signal);
        let slot = *index.entry(label).or_insert_with(|| {
            groups.push(GroupScore {
                label: label.to_string(),
                order: taxonomy_order(taxonomy, key, signal),
                score: 0.0,
                percent: 0.0,
                rank: 0,
                signal_count: 0,
            });
            groups.len() - 1
        });
        groups[slot].score += signal.impact_score;
        groups[slot].signal_count += 1;
    }

    // Unknown labels share usize::MAX; the stable sort keeps first occurrence.
    groups.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.order.cmp(&b.order))
    });

    let max = groups.first().map(|g| g.score).unwrap_or(0.0);
    for (i, group) in groups.iter_mut().enumerate() {
        group.rank = i + 1;
        group.percent = scale_percent(group.score, max);
    }
    groups
}

/// `score / max * 100`, or 0 when no group has a positive score.
pub fn scale_percent(score: f64, max: f64) -> f64 {
    if max > 0.0 {
        score / max * 100.0
    } else {
        0.0
    }
}

fn taxonomy_order(taxonomy: &Taxonomy, key: GroupKey, signal: &Signal) -> usize {
    match key.axis() {
        Some(axis) => signal.slot(axis),
        None => taxonomy
            .problem_names()
            .position(|name| name == signal.cluster_name)
            .unwrap_or(usize::MAX),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impact::classify_impact;
    use crate::taxonomy::{default_taxonomy, JourneyStage};

    fn signal(job: usize, cluster: &str, impact: f64) -> Signal {
        let taxonomy = default_taxonomy();
        Signal {
            id: format!("sig-{job}-{cluster}"),
            position: [0.0; 3],
            cluster_name: cluster.to_string(),
            is_root_cause: false,
            description: String::new(),
            source: String::new(),
            job_category: taxonomy.jobs[job].clone(),
            job_index: job,
            segment: taxonomy.segments[0].clone(),
            segment_index: 0,
            context: taxonomy.contexts[0].clone(),
            context_index: 0,
            journey_stage: JourneyStage::Purchase,
            impact_score: impact,
            impact_level: classify_impact(impact),
            color: String::new(),
        }
    }

    #[test]
    fn sums_and_scales_per_group() {
        let taxonomy = default_taxonomy();
        let data = vec![signal(2, "a", 1.0), signal(2, "a", 2.0), signal(5, "b", 1.5)];
        let groups = aggregate(&data, &taxonomy, GroupKey::Job);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].label, taxonomy.jobs[2]);
        assert_eq!(groups[0].score, 3.0);
        assert_eq!(groups[0].percent, 100.0);
        assert_eq!(groups[0].signal_count, 2);
        assert_eq!(groups[1].percent, 50.0);
        assert_eq!(groups[1].rank, 2);
    }

    #[test]
    fn ties_follow_taxonomy_order() {
        let taxonomy = default_taxonomy();
        let data = vec![signal(7, "a", 1.0), signal(1, "a", 1.0), signal(4, "a", 1.0)];
        let groups = aggregate(&data, &taxonomy, GroupKey::Job);
        let order: Vec<usize> = groups.iter().map(|g| g.order).collect();
        assert_eq!(order, vec![1, 4, 7]);
    }

    #[test]
    fn unknown_cluster_names_rank_after_known_ties() {
        let taxonomy = default_taxonomy();
        let known = taxonomy.problems[3].name.clone();
        let data = vec![
            signal(0, "zeta", 1.0),
            signal(0, "alpha", 1.0),
            signal(0, &known, 1.0),
        ];
        let groups = aggregate(&data, &taxonomy, GroupKey::Cluster);
        let labels: Vec<&str> = groups.iter().map(|g| g.label.as_str()).collect();
        assert_eq!(labels, vec![known.as_str(), "zeta", "alpha"]);
    }

    #[test]
    fn all_zero_scores_scale_to_zero() {
        let taxonomy = default_taxonomy();
        let data = vec![signal(0, "a", 0.0), signal(1, "b", 0.0)];
        let groups = aggregate(&data, &taxonomy, GroupKey::Job);
        assert!(groups.iter().all(|g| g.percent == 0.0));
        assert!(aggregate(&Vec::<Signal>::new(), &taxonomy, GroupKey::Segment).is_empty());
    }

    #[test]
    fn key_parsing() {
        assert_eq!(GroupKey::from_str("Clusters"), Some(GroupKey::Cluster));
        assert_eq!(GroupKey::from_str("job"), Some(GroupKey::Job));
        assert_eq!(GroupKey::from_str("stage"), None);
    }
}
