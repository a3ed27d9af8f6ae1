//! Filter state, per-signal visibility, highlight geometry and connections.
//!
//! The cluster filter excludes; every other filter only dims. Dimmed signals
//! stay in the render set but take no part in interaction or connections.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::distribution::{distance, slot_bounds, CUBE_HALF_EXTENT};
use crate::impact::ImpactLevel;
use crate::synth::Signal;
use crate::taxonomy::{Axis, JourneyStage};

/// Maximum distance between two same-job signals that are connected.
pub const CONNECTION_THRESHOLD: f64 = 3.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Visible,
    Dimmed,
    Hidden,
}

/// Active filters. The default state filters nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterState {
    pub active_job: Option<usize>,
    pub active_segment: Option<usize>,
    pub active_context: Option<usize>,
    pub active_cluster: Option<String>,
    pub selected_stages: BTreeSet<JourneyStage>,
    pub selected_impact_levels: BTreeSet<ImpactLevel>,
    pub show_pulsars_only: bool,
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_job(mut self, slot: usize) -> Self {
        self.active_job = Some(slot);
        self
    }

    pub fn with_segment(mut self, slot: usize) -> Self {
        self.active_segment = Some(slot);
        self
    }

    pub fn with_context(mut self, slot: usize) -> Self {
        self.active_context = Some(slot);
        self
    }

    pub fn with_cluster(mut self, name: impl Into<String>) -> Self {
        self.active_cluster = Some(name.into());
        self
    }

    pub fn with_stage(mut self, stage: JourneyStage) -> Self {
        self.selected_stages.insert(stage);
        self
    }

    pub fn with_impact_level(mut self, level: ImpactLevel) -> Self {
        self.selected_impact_levels.insert(level);
        self
    }

    pub fn with_pulsars_only(mut self, on: bool) -> Self {
        self.show_pulsars_only = on;
        self
    }

    /// The single-select filter for an axis.
    pub fn axis(&self, axis: Axis) -> Option<usize> {
        match axis {
            Axis::Job => self.active_job,
            Axis::Context => self.active_context,
            Axis::Segment => self.active_segment,
        }
    }

    /// Set or clear the single-select filter for an axis.
    pub fn set_axis(&mut self, axis: Axis, slot: Option<usize>) {
        match axis {
            Axis::Job => self.active_job = slot,
            Axis::Context => self.active_context = slot,
            Axis::Segment => self.active_segment = slot,
        }
    }

    /// Select a slot, or clear it if it is already selected.
    pub fn toggle_axis(&mut self, axis: Axis, slot: usize) {
        let next = if self.axis(axis) == Some(slot) {
            None
        } else {
            Some(slot)
        };
        self.set_axis(axis, next);
    }

    pub fn toggle_stage(&mut self, stage: JourneyStage) {
        if !self.selected_stages.remove(&stage) {
            self.selected_stages.insert(stage);
        }
    }

    pub fn toggle_impact_level(&mut self, level: ImpactLevel) {
        if !self.selected_impact_levels.remove(&level) {
            self.selected_impact_levels.insert(level);
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Axes with an active single-select filter, in `[x, y, z]` order.
    pub fn active_axes(&self) -> Vec<(Axis, usize)> {
        Axis::ALL
            .iter()
            .filter_map(|&axis| self.axis(axis).map(|slot| (axis, slot)))
            .collect()
    }

    pub fn visibility(&self, signal: &Signal) -> Visibility {
        if let Some(cluster) = &self.active_cluster {
            if &signal.cluster_name != cluster {
                return Visibility::Hidden;
            }
        }
        if self.is_dimmed(signal) {
            Visibility::Dimmed
        } else {
            Visibility::Visible
        }
    }

    fn is_dimmed(&self, signal: &Signal) -> bool {
        let axis_miss = Axis::ALL
            .iter()
            .any(|&axis| matches!(self.axis(axis), Some(slot) if signal.slot(axis) != slot));
        axis_miss
            || (!self.selected_stages.is_empty()
                && !self.selected_stages.contains(&signal.journey_stage))
            || (!self.selected_impact_levels.is_empty()
                && !self.selected_impact_levels.contains(&signal.impact_level))
            || (self.show_pulsars_only && !signal.is_root_cause)
    }

    pub fn is_visible(&self, signal: &Signal) -> bool {
        self.visibility(signal) == Visibility::Visible
    }

    /// Number of signals that are neither dimmed nor hidden.
    pub fn visible_count(&self, signals: &[Signal]) -> usize {
        signals.iter().filter(|s| self.is_visible(s)).count()
    }

    /// Emphasis geometry for the active axis filters, if any.
    pub fn highlight_region(&self) -> Option<Region> {
        Region::from_axes(&self.active_axes())
    }

    /// Intersection of two or more axis filters.
    pub fn intersection_region(&self) -> Option<Region> {
        self.highlight_region()
            .filter(|region| !matches!(region, Region::Slab { .. }))
    }
}

/// Axis-aligned box in world space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl Aabb {
    fn cube() -> Self {
        Self {
            min: [-CUBE_HALF_EXTENT; 3],
            max: [CUBE_HALF_EXTENT; 3],
        }
    }

    /// Restrict one axis to a slot.
    fn restrict(mut self, axis: Axis, slot: usize) -> Self {
        let (lo, hi) = slot_bounds(slot);
        let c = axis.world_component();
        self.min[c] = lo;
        self.max[c] = hi;
        self
    }

    pub fn size(&self) -> [f64; 3] {
        [
            self.max[0] - self.min[0],
            self.max[1] - self.min[1],
            self.max[2] - self.min[2],
        ]
    }
}

/// Highlight shape derived from the active axis filters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Region {
    /// One axis fixed: a full-size slab one slot thick.
    Slab { axis: Axis, bounds: Aabb },
    /// Two axes fixed: a column running along the free axis.
    Column { free_axis: Axis, bounds: Aabb },
    /// All three axes fixed: a single grid cell.
    Cell { bounds: Aabb },
}

impl Region {
    fn from_axes(active: &[(Axis, usize)]) -> Option<Self> {
        let bounds = active
            .iter()
            .fold(Aabb::cube(), |b, &(axis, slot)| b.restrict(axis, slot));
        match active {
            [] => None,
            [(axis, _)] => Some(Region::Slab {
                axis: *axis,
                bounds,
            }),
            [_, _] => {
                let free_axis = Axis::ALL
                    .into_iter()
                    .find(|a| active.iter().all(|(b, _)| b != a))?;
                Some(Region::Column { free_axis, bounds })
            }
            _ => Some(Region::Cell { bounds }),
        }
    }

    pub fn bounds(&self) -> &Aabb {
        match self {
            Region::Slab { bounds, .. } | Region::Column { bounds, .. } | Region::Cell { bounds } => {
                bounds
            }
        }
    }
}

/// Edge between two signals, by index into the signal slice.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub from: usize,
    pub to: usize,
    pub distance: f64,
}

/// Connect visible same-job signals closer than `threshold`.
///
/// The visible set is computed first and the pairwise pass only runs within
/// each job group of it.
pub fn connections(signals: &[Signal], filter: &FilterState, threshold: f64) -> Vec<Connection> {
    let mut by_job: Vec<Vec<usize>> = Vec::new();
    for (i, signal) in signals.iter().enumerate() {
        if !filter.is_visible(signal) {
            continue;
        }
        if by_job.len() <= signal.job_index {
            by_job.resize_with(signal.job_index + 1, Vec::new);
        }
        by_job[signal.job_index].push(i);
    }

    let mut edges = Vec::new();
    for group in &by_job {
        for (a, &i) in group.iter().enumerate() {
            for &j in &group[a + 1..] {
                let d = distance(&signals[i].position, &signals[j].position);
                if d < threshold {
                    edges.push(Connection {
                        from: i,
                        to: j,
                        distance: d,
                    });
                }
            }
        }
    }
    edges
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impact::classify_impact;

    fn signal(job: usize, segment: usize, context: usize, cluster: &str) -> Signal {
        Signal {
            id: format!("sig-{job}{segment}{context}"),
            position: [job as f64, context as f64, segment as f64],
            cluster_name: cluster.to_string(),
            is_root_cause: false,
            description: String::new(),
            source: String::new(),
            job_category: format!("job {job}"),
            job_index: job,
            segment: format!("segment {segment}"),
            segment_index: segment,
            context: format!("context {context}"),
            context_index: context,
            journey_stage: JourneyStage::Purchase,
            impact_score: 1.0,
            impact_level: classify_impact(1.0),
            color: String::new(),
        }
    }

    #[test]
    fn cluster_filter_hides_and_axis_filter_dims() {
        let s = signal(1, 2, 3, "a");
        let other = signal(1, 2, 3, "b");
        let filter = FilterState::new().with_cluster("a");
        assert_eq!(filter.visibility(&s), Visibility::Visible);
        assert_eq!(filter.visibility(&other), Visibility::Hidden);

        let filter = FilterState::new().with_job(4);
        assert_eq!(filter.visibility(&s), Visibility::Dimmed);
        let filter = FilterState::new().with_job(1).with_context(3).with_segment(2);
        assert_eq!(filter.visibility(&s), Visibility::Visible);
    }

    #[test]
    fn multi_select_and_pulsar_filters_dim() {
        let mut s = signal(0, 0, 0, "a");
        let filter = FilterState::new().with_stage(JourneyStage::Retention);
        assert_eq!(filter.visibility(&s), Visibility::Dimmed);
        let filter = filter.with_stage(JourneyStage::Purchase);
        assert_eq!(filter.visibility(&s), Visibility::Visible);

        let filter = FilterState::new().with_impact_level(ImpactLevel::Micro);
        assert_eq!(filter.visibility(&s), Visibility::Dimmed);

        let filter = FilterState::new().with_pulsars_only(true);
        assert_eq!(filter.visibility(&s), Visibility::Dimmed);
        s.is_root_cause = true;
        assert_eq!(filter.visibility(&s), Visibility::Visible);
    }

    #[test]
    fn toggles_flip_state() {
        let mut filter = FilterState::new();
        filter.toggle_axis(Axis::Segment, 3);
        assert_eq!(filter.active_segment, Some(3));
        filter.toggle_axis(Axis::Segment, 3);
        assert_eq!(filter.active_segment, None);
        filter.toggle_stage(JourneyStage::Advocacy);
        filter.toggle_impact_level(ImpactLevel::High);
        assert_eq!(filter.selected_stages.len(), 1);
        filter.toggle_stage(JourneyStage::Advocacy);
        assert!(filter.selected_stages.is_empty());
        filter.clear();
        assert_eq!(filter, FilterState::default());
    }

    #[test]
    fn region_shape_follows_active_axis_count() {
        assert_eq!(FilterState::new().highlight_region(), None);

        let slab = FilterState::new().with_context(0).highlight_region().unwrap();
        assert!(matches!(slab, Region::Slab { axis: Axis::Context, .. }));
        assert_eq!(slab.bounds().size(), [20.0, 2.0, 20.0]);
        assert_eq!(FilterState::new().with_context(0).intersection_region(), None);

        let cell = FilterState::new()
            .with_job(0)
            .with_segment(9)
            .with_context(5)
            .highlight_region()
            .unwrap();
        assert!(matches!(cell, Region::Cell { .. }));
        assert_eq!(cell.bounds().min, [-10.0, 0.0, 8.0]);
        assert_eq!(cell.bounds().max, [-8.0, 2.0, 10.0]);
    }

    #[test]
    fn connections_only_join_visible_same_job_neighbors() {
        let data = vec![
            signal(0, 0, 0, "a"),
            signal(0, 1, 0, "a"),
            signal(1, 0, 0, "a"),
            signal(0, 9, 9, "a"),
        ];
        let edges = connections(&data, &FilterState::new(), CONNECTION_THRESHOLD);
        assert_eq!(edges.len(), 1);
        assert_eq!((edges[0].from, edges[0].to), (0, 1));

        let dimmed = FilterState::new().with_segment(0);
        assert!(connections(&data, &dimmed, CONNECTION_THRESHOLD).is_empty());
    }
}
