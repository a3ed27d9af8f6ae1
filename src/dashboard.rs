//! Plain-text rendering of rankings, cluster details and hypotheses.
//!
//! Renderers return `String` so the CLI decides where output goes. Labels may
//! come from a generated taxonomy and are sanitized before printing.

use crate::aggregate::{GroupKey, GroupScore};
use crate::copilot::{Hypothesis, HypothesisSet};
use crate::insight::ClusterDetails;

const SEPARATOR: &str =
    "================================================================================";
const RULE: &str = "────────────────────────────────────────────────────────────────";

/// Width of a 100% bar.
pub const BAR_WIDTH: usize = 30;

const LABEL_WIDTH: usize = 40;

// =============================================================================
// Rankings
// =============================================================================

/// Ranked bar table, one row per group.
pub fn render_rankings(key: GroupKey, scores: &[GroupScore]) -> String {
    let mut out = String::new();
    out.push_str(&format!("{SEPARATOR}\n"));
    out.push_str(&format!(" Ranking by {key} ({} groups)\n", scores.len()));
    out.push_str(&format!("{SEPARATOR}\n"));

    if scores.is_empty() {
        out.push_str("  No signals.\n");
        return out;
    }

    for s in scores {
        out.push_str(&format!(
            " {:>3}. {:width$} {:bar_width$} {:>8.2} ({:>5.1}%) n={}\n",
            s.rank,
            truncate_str(&s.label, LABEL_WIDTH),
            bar(s.percent),
            s.score,
            s.percent,
            s.signal_count,
            width = LABEL_WIDTH,
            bar_width = BAR_WIDTH,
        ));
    }
    out
}

fn bar(percent: f64) -> String {
    let filled = ((percent.clamp(0.0, 100.0) / 100.0) * BAR_WIDTH as f64).round() as usize;
    "#".repeat(filled)
}

// =============================================================================
// Cluster details
// =============================================================================

pub fn render_cluster_details(details: &ClusterDetails) -> String {
    let mut out = String::new();
    out.push_str(&format!("{RULE}\n"));
    out.push_str(&format!("Cluster:  {}\n", truncate_str(&details.cluster_name, 70)));
    out.push_str(&format!("{RULE}\n"));
    out.push_str(&format!("Stage:    {}\n", details.journey_stage));
    out.push_str(&format!("Level:    {}\n", details.impact_level));
    out.push_str(&format!(
        "Impact:   {:.2} ({:.1}% of total)\n",
        details.total_impact, details.relative_impact_percent
    ));
    out.push_str(&format!("Signals:  {}\n", details.signal_count));
    out.push_str(&format!("Color:    {}\n", details.color));

    for (title, groups) in [
        ("Top jobs", &details.top_jobs),
        ("Top segments", &details.top_segments),
        ("Top contexts", &details.top_contexts),
    ] {
        if groups.is_empty() {
            continue;
        }
        out.push('\n');
        out.push_str(&format!("{title}:\n"));
        for g in groups {
            out.push_str(&format!(
                "  {}. {} ({:.0}%)\n",
                g.rank,
                truncate_str(&g.label, 60),
                g.percent
            ));
        }
    }

    if let Some(pulsar) = &details.pulsar_signal {
        out.push('\n');
        out.push_str(&format!("Root cause [{}]:\n", pulsar.id));
        out.push_str(&format!("  {}\n", truncate_str(&pulsar.description, 74)));
    }

    if !details.top_signals.is_empty() {
        out.push('\n');
        out.push_str("Top signals:\n");
        for s in &details.top_signals {
            out.push_str(&format!(
                "  [{:8}] {:>5.2} {:14} {}\n",
                s.id,
                s.impact_score,
                truncate_str(&s.source, 14),
                truncate_str(&s.description, 50)
            ));
        }
    }
    out.push_str(&format!("{RULE}\n"));
    out
}

// =============================================================================
// Hypotheses
// =============================================================================

pub fn render_hypotheses(cluster_name: &str, set: &HypothesisSet) -> String {
    let mut out = String::new();
    out.push_str(&format!("Hypotheses for {}\n", truncate_str(cluster_name, 60)));
    if set.is_empty() {
        out.push_str("  No hypotheses available.\n");
        return out;
    }
    write_section(&mut out, "Quick wins", &set.quick_wins);
    write_section(&mut out, "Balanced", &set.balanced);
    write_section(&mut out, "Revolutionary", &set.revolutionary);
    out
}

fn write_section(out: &mut String, title: &str, items: &[Hypothesis]) {
    if items.is_empty() {
        return;
    }
    out.push('\n');
    out.push_str(&format!("{title} ({}):\n", items.len()));
    for h in items {
        out.push_str(&format!("  - {}\n", strip_ansi(h.text.trim())));
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn truncate_str(s: &str, max: usize) -> String {
    let clean = strip_ansi(s);
    if clean.chars().count() <= max {
        clean
    } else {
        let truncated: String = clean.chars().take(max.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}

/// Remove terminal escape sequences and control characters from generated
/// text. Newlines and tabs are kept.
fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\x1b' => match chars.peek() {
                // CSI: parameters and intermediates, then one final byte
                Some('[') => {
                    chars.next();
                    while chars.next_if(|n| ('\x20'..='\x3f').contains(n)).is_some() {}
                    chars.next_if(|n| ('\x40'..='\x7e').contains(n));
                }
                // OSC: terminated by BEL or ESC '\'
                Some(']') => {
                    chars.next();
                    while let Some(next) = chars.next() {
                        if next == '\x07' {
                            break;
                        }
                        if next == '\x1b' && chars.next_if_eq(&'\\').is_some() {
                            break;
                        }
                    }
                }
                _ => {}
            },
            '\n' | '\t' => out.push(c),
            c if c < '\x20' => {}
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(label: &str, rank: usize, percent: f64) -> GroupScore {
        GroupScore {
            label: label.to_string(),
            order: rank - 1,
            score: percent / 10.0,
            percent,
            rank,
            signal_count: 4,
        }
    }

    #[test]
    fn strip_ansi_removes_csi_osc_and_controls() {
        assert_eq!(strip_ansi("\x1b[31mred\x1b[0m"), "red");
        assert_eq!(strip_ansi("\x1b]52;c;payload\x07rest"), "rest");
        assert_eq!(strip_ansi("a\x01b\nc\td"), "ab\nc\td");
    }

    #[test]
    fn truncate_marks_long_labels() {
        let result = truncate_str("\x1b[1mLook confident at an important business meeting", 20);
        assert!(result.ends_with("..."));
        assert_eq!(result.chars().count(), 20);
        assert_eq!(truncate_str("short", 20), "short");
    }

    #[test]
    fn rankings_scale_bars_to_the_top_group() {
        let text = render_rankings(
            GroupKey::Segment,
            &[score("Students", 1, 100.0), score("Retirees", 2, 50.0)],
        );
        assert!(text.contains("Ranking by segment (2 groups)"));
        let rows: Vec<&str> = text.lines().filter(|l| l.contains("n=4")).collect();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].contains(&"#".repeat(BAR_WIDTH)));
        assert!(rows[1].contains(&"#".repeat(BAR_WIDTH / 2)));
        assert!(!rows[1].contains(&"#".repeat(BAR_WIDTH / 2 + 1)));
    }

    #[test]
    fn empty_rankings_and_hypotheses_say_so() {
        assert!(render_rankings(GroupKey::Job, &[]).contains("No signals."));
        assert!(render_hypotheses("X", &HypothesisSet::default()).contains("No hypotheses"));
    }

    #[test]
    fn hypotheses_are_grouped_by_category() {
        let set = HypothesisSet {
            quick_wins: vec![Hypothesis {
                text: "We believe that a size chart helps".into(),
            }],
            balanced: vec![],
            revolutionary: vec![Hypothesis {
                text: "We believe that 3D fitting wins".into(),
            }],
        };
        let text = render_hypotheses("Size mismatch", &set);
        assert!(text.contains("Quick wins (1):"));
        assert!(!text.contains("Balanced"));
        assert!(text.contains("Revolutionary (1):"));
    }
}
