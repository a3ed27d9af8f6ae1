//! Impact levels, their thresholds, and impact sampling.
//!
//! The thresholds below are a fixed contract: every impact filter, every
//! synthesized cluster and every signal level is derived from them. Nothing
//! else in the crate may restate these numbers.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Minimum score classified as [`ImpactLevel::VeryHigh`].
pub const VERY_HIGH_MIN: f64 = 2.5;
/// Minimum score classified as [`ImpactLevel::High`].
pub const HIGH_MIN: f64 = 1.5;
/// Minimum score classified as [`ImpactLevel::Medium`].
pub const MEDIUM_MIN: f64 = 0.8;
/// Minimum score classified as [`ImpactLevel::Low`].
pub const LOW_MIN: f64 = 0.3;

/// Default number of top-ranked clusters forced into the very-high band.
pub const DEFAULT_VERY_HIGH_COUNT: usize = 5;
/// Default number of clusters forced into the high band after the very-high ones.
pub const DEFAULT_HIGH_COUNT: usize = 2;

/// Sampling band for very-high clusters.
pub const VERY_HIGH_BAND: (f64, f64) = (6.5, 7.0);
/// Sampling band for high clusters.
pub const HIGH_BAND: (f64, f64) = (1.5, 2.49);
/// Sampling band for medium clusters in the tail mixture.
pub const MEDIUM_BAND: (f64, f64) = (0.8, 1.2);
/// Sampling band for low clusters in the tail mixture.
pub const LOW_BAND: (f64, f64) = (0.3, 0.79);
/// Sampling band for micro clusters in the tail mixture.
pub const MICRO_BAND: (f64, f64) = (0.05, 0.29);

/// Tail mixture weights: medium, then low; the remainder is micro.
pub const MEDIUM_SHARE: f64 = 0.4;
pub const LOW_SHARE: f64 = 0.4;

/// Symptom score for very-high clusters: `BASE + U(0, SPAN)`.
pub const VERY_HIGH_SYMPTOM_BASE: f64 = 0.2;
pub const VERY_HIGH_SYMPTOM_SPAN: f64 = 0.7;

/// Symptom score for every other cluster:
/// `max(FLOOR, impact * FACTOR + U(-NOISE, NOISE))`.
pub const SYMPTOM_FACTOR: f64 = 0.6;
pub const SYMPTOM_NOISE: f64 = 0.1;
pub const SYMPTOM_FLOOR: f64 = 0.1;

/// Categorical impact bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImpactLevel {
    VeryHigh,
    High,
    Medium,
    Low,
    Micro,
}

impl ImpactLevel {
    /// All levels, most severe first.
    pub const ALL: [ImpactLevel; 5] = [
        ImpactLevel::VeryHigh,
        ImpactLevel::High,
        ImpactLevel::Medium,
        ImpactLevel::Low,
        ImpactLevel::Micro,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ImpactLevel::VeryHigh => "VERY_HIGH",
            ImpactLevel::High => "HIGH",
            ImpactLevel::Medium => "MEDIUM",
            ImpactLevel::Low => "LOW",
            ImpactLevel::Micro => "MICRO",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().replace([' ', '-'], "_").as_str() {
            "VERY_HIGH" => Some(ImpactLevel::VeryHigh),
            "HIGH" => Some(ImpactLevel::High),
            "MEDIUM" => Some(ImpactLevel::Medium),
            "LOW" => Some(ImpactLevel::Low),
            "MICRO" => Some(ImpactLevel::Micro),
            _ => None,
        }
    }
}

impl fmt::Display for ImpactLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a score into its impact level.
pub fn classify_impact(score: f64) -> ImpactLevel {
    if score >= VERY_HIGH_MIN {
        ImpactLevel::VeryHigh
    } else if score >= HIGH_MIN {
        ImpactLevel::High
    } else if score >= MEDIUM_MIN {
        ImpactLevel::Medium
    } else if score >= LOW_MIN {
        ImpactLevel::Low
    } else {
        ImpactLevel::Micro
    }
}

/// Sample a cluster impact score from its generation rank.
///
/// Ranks `0..very_high_count` land in the very-high band, the next
/// `high_count` ranks in the high band, and the rest in the tail mixture.
/// The exact tier counts hold for any population size.
pub fn sample_cluster_impact<R: Rng + ?Sized>(
    rng: &mut R,
    rank: usize,
    very_high_count: usize,
    high_count: usize,
) -> f64 {
    if rank < very_high_count {
        return sample_band(rng, VERY_HIGH_BAND);
    }
    if rank < very_high_count + high_count {
        return sample_band(rng, HIGH_BAND);
    }

    let roll = rng.gen::<f64>();
    if roll < MEDIUM_SHARE {
        sample_band(rng, MEDIUM_BAND)
    } else if roll < MEDIUM_SHARE + LOW_SHARE {
        sample_band(rng, LOW_BAND)
    } else {
        sample_band(rng, MICRO_BAND)
    }
}

/// Sample the reduced score of a non-root signal in a cluster.
pub fn sample_symptom_impact<R: Rng + ?Sized>(
    rng: &mut R,
    cluster_impact: f64,
    cluster_level: ImpactLevel,
) -> f64 {
    if cluster_level == ImpactLevel::VeryHigh {
        return VERY_HIGH_SYMPTOM_BASE + rng.gen_range(0.0..VERY_HIGH_SYMPTOM_SPAN);
    }
    let noise = rng.gen_range(-SYMPTOM_NOISE..SYMPTOM_NOISE);
    (cluster_impact * SYMPTOM_FACTOR + noise).max(SYMPTOM_FLOOR)
}

fn sample_band<R: Rng + ?Sized>(rng: &mut R, (lo, hi): (f64, f64)) -> f64 {
    rng.gen_range(lo..hi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn thresholds_are_inclusive_lower_bounds() {
        assert_eq!(classify_impact(2.5), ImpactLevel::VeryHigh);
        assert_eq!(classify_impact(2.4999), ImpactLevel::High);
        assert_eq!(classify_impact(1.5), ImpactLevel::High);
        assert_eq!(classify_impact(0.8), ImpactLevel::Medium);
        assert_eq!(classify_impact(0.3), ImpactLevel::Low);
        assert_eq!(classify_impact(0.2999), ImpactLevel::Micro);
        assert_eq!(classify_impact(0.0), ImpactLevel::Micro);
    }

    #[test]
    fn bands_classify_into_their_own_level() {
        let cases = [
            (VERY_HIGH_BAND, ImpactLevel::VeryHigh),
            (HIGH_BAND, ImpactLevel::High),
            (MEDIUM_BAND, ImpactLevel::Medium),
            (LOW_BAND, ImpactLevel::Low),
            (MICRO_BAND, ImpactLevel::Micro),
        ];
        for ((lo, hi), level) in cases {
            assert_eq!(classify_impact(lo), level);
            assert_eq!(classify_impact(hi - 1e-9), level);
        }
    }

    #[test]
    fn ranked_sampling_fills_top_tiers_exactly() {
        let mut rng = StdRng::seed_from_u64(5);
        let levels: Vec<ImpactLevel> = (0..45)
            .map(|rank| classify_impact(sample_cluster_impact(&mut rng, rank, 5, 2)))
            .collect();
        assert!(levels[..5].iter().all(|l| *l == ImpactLevel::VeryHigh));
        assert!(levels[5..7].iter().all(|l| *l == ImpactLevel::High));
        assert!(levels[7..]
            .iter()
            .all(|l| matches!(l, ImpactLevel::Medium | ImpactLevel::Low | ImpactLevel::Micro)));
    }

    #[test]
    fn symptom_scores_respect_their_ranges() {
        let mut rng = StdRng::seed_from_u64(17);
        for _ in 0..1_000 {
            let vh = sample_symptom_impact(&mut rng, 6.8, ImpactLevel::VeryHigh);
            assert!((0.2..0.9).contains(&vh));

            let micro = sample_symptom_impact(&mut rng, 0.05, ImpactLevel::Micro);
            assert!(micro >= SYMPTOM_FLOOR);

            let med = sample_symptom_impact(&mut rng, 1.0, ImpactLevel::Medium);
            assert!((0.5..0.7).contains(&med));
        }
    }

    #[test]
    fn level_parsing_accepts_common_spellings() {
        assert_eq!(ImpactLevel::from_str("very high"), Some(ImpactLevel::VeryHigh));
        assert_eq!(ImpactLevel::from_str("VERY_HIGH"), Some(ImpactLevel::VeryHigh));
        assert_eq!(ImpactLevel::from_str("micro"), Some(ImpactLevel::Micro));
        assert_eq!(ImpactLevel::from_str("huge"), None);
    }
}
