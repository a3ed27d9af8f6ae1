//! Render-layer view of a generation: read-only points with selection and
//! filter flags.

use serde::Serialize;

use crate::filter::{FilterState, Visibility};
use crate::synth::Signal;

/// A signal as handed to the renderer.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderPoint<'a> {
    pub signal: &'a Signal,
    pub is_selected: bool,
    pub is_dimmed: bool,
    pub is_hidden: bool,
}

impl RenderPoint<'_> {
    /// Hover and click only apply to fully visible points.
    pub fn is_interactive(&self) -> bool {
        !self.is_dimmed && !self.is_hidden
    }
}

/// Build render points for every signal.
pub fn render_points<'a>(
    signals: &'a [Signal],
    filter: &FilterState,
    selection: &Selection,
) -> Vec<RenderPoint<'a>> {
    signals
        .iter()
        .map(|signal| {
            let visibility = filter.visibility(signal);
            RenderPoint {
                signal,
                is_selected: selection.is_selected(signal),
                is_dimmed: visibility == Visibility::Dimmed,
                is_hidden: visibility == Visibility::Hidden,
            }
        })
        .collect()
}

/// Currently selected signal id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    selected: Option<String>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn is_selected(&self, signal: &Signal) -> bool {
        self.selected.as_deref() == Some(signal.id.as_str())
    }

    /// Select a point. Dimmed and hidden points are ignored; returns whether
    /// the selection changed.
    pub fn select(&mut self, point: &RenderPoint<'_>) -> bool {
        if !point.is_interactive() || self.is_selected(point.signal) {
            return false;
        }
        self.selected = Some(point.signal.id.clone());
        true
    }

    pub fn clear(&mut self) {
        self.selected = None;
    }

    /// Drop the selection if the signal no longer exists in `signals`.
    pub fn retain_in(&mut self, signals: &[Signal]) {
        if let Some(id) = &self.selected {
            if !signals.iter().any(|s| &s.id == id) {
                self.selected = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::synthesize;
    use crate::synth::GeneratorConfig;
    use crate::taxonomy::default_taxonomy;

    #[test]
    fn selection_ignores_dimmed_points() {
        let generation = synthesize(
            default_taxonomy(),
            &GeneratorConfig::default().with_count(200).with_seed(12),
        )
        .unwrap();
        let target = &generation.signals[0];
        let filter = FilterState::new().with_job((target.job_index + 1) % 10);
        let mut selection = Selection::new();

        let points = render_points(&generation.signals, &filter, &selection);
        assert!(points[0].is_dimmed);
        assert!(!selection.select(&points[0]));
        assert_eq!(selection.selected_id(), None);

        let open = render_points(&generation.signals, &FilterState::new(), &selection);
        assert!(selection.select(&open[0]));
        let points = render_points(&generation.signals, &FilterState::new(), &selection);
        assert!(points[0].is_selected);
        assert_eq!(points.iter().filter(|p| p.is_selected).count(), 1);
    }

    #[test]
    fn selection_is_dropped_after_regeneration() {
        let config = GeneratorConfig::default().with_count(50).with_seed(1);
        let generation = synthesize(default_taxonomy(), &config).unwrap();
        let points = render_points(&generation.signals, &FilterState::new(), &Selection::new());
        let mut selection = Selection::new();
        selection.select(&points[10]);

        let smaller = synthesize(default_taxonomy(), &config.with_count(5)).unwrap();
        selection.retain_in(&smaller.signals);
        assert_eq!(selection.selected_id(), None);
    }
}
