//! Random distribution helpers and slot/coordinate mapping for the value cube.
//!
//! The cube spans `[-10, 10]` on every axis and is divided into ten slots of
//! width 2. Slot `i` is centred at `-9 + 2i`. Indices may be fractional while a
//! signal is being placed (noise and drift are applied in index space), and are
//! rounded to a categorical slot only when picking the label.

use rand::Rng;

/// Number of categorical slots per axis.
pub const AXIS_SLOTS: usize = 10;

/// Half the edge length of the cube.
pub const CUBE_HALF_EXTENT: f64 = 10.0;

/// Width of one slot in world units.
pub const SLOT_WIDTH: f64 = 2.0;

/// Upper bound for fractional indices after noise and drift.
pub const MAX_FRACTIONAL_INDEX: f64 = 9.9;

/// Default jitter for [`index_to_coordinate`].
pub const DEFAULT_JITTER: f64 = 0.8;

/// Sample from a normal distribution using the Box–Muller transform.
///
/// The first uniform sample is drawn from `(0, 1]` so `ln` never sees zero.
pub fn gaussian<R: Rng + ?Sized>(rng: &mut R, mean: f64, std_dev: f64) -> f64 {
    let u1 = 1.0 - rng.gen::<f64>();
    let u2 = rng.gen::<f64>();
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    mean + z * std_dev
}

/// Centre coordinate of a (possibly fractional) slot index.
pub fn slot_center(index: f64) -> f64 {
    -CUBE_HALF_EXTENT + SLOT_WIDTH / 2.0 + index * SLOT_WIDTH
}

/// Map a slot index to a jittered coordinate around the slot centre.
pub fn index_to_coordinate<R: Rng + ?Sized>(rng: &mut R, index: f64, jitter: f64) -> f64 {
    gaussian(rng, slot_center(index), jitter)
}

/// Clamp a fractional index into `[0, MAX_FRACTIONAL_INDEX]`.
pub fn clamp_index(index: f64) -> f64 {
    index.clamp(0.0, MAX_FRACTIONAL_INDEX)
}

/// Round a fractional index to its categorical slot.
///
/// `9.9` rounds to `10`, which is not a slot, so the result is capped at the
/// last slot.
pub fn nearest_slot(index: f64) -> usize {
    let rounded = clamp_index(index).round() as usize;
    rounded.min(AXIS_SLOTS - 1)
}

/// World-space `[min, max]` span covered by a slot.
pub fn slot_bounds(slot: usize) -> (f64, f64) {
    let min = -CUBE_HALF_EXTENT + slot as f64 * SLOT_WIDTH;
    (min, min + SLOT_WIDTH)
}

/// Euclidean distance between two points.
pub fn distance(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    (dx * dx + dy * dy + dz * dz).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn slot_centers_span_the_cube() {
        assert_eq!(slot_center(0.0), -9.0);
        assert_eq!(slot_center(9.0), 9.0);
        assert_eq!(slot_center(4.5), 0.0);
    }

    #[test]
    fn gaussian_with_zero_std_returns_mean() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            assert_eq!(gaussian(&mut rng, 3.5, 0.0), 3.5);
        }
    }

    #[test]
    fn gaussian_is_finite_and_roughly_centred() {
        let mut rng = StdRng::seed_from_u64(11);
        let n = 20_000;
        let samples: Vec<f64> = (0..n).map(|_| gaussian(&mut rng, 2.0, 0.5)).collect();
        assert!(samples.iter().all(|v| v.is_finite()));
        let mean = samples.iter().sum::<f64>() / n as f64;
        assert!((mean - 2.0).abs() < 0.05, "mean drifted: {mean}");
    }

    #[test]
    fn seeded_coordinates_are_reproducible() {
        let mut a = StdRng::seed_from_u64(99);
        let mut b = StdRng::seed_from_u64(99);
        for i in 0..10 {
            let idx = i as f64 + 0.3;
            assert_eq!(
                index_to_coordinate(&mut a, idx, DEFAULT_JITTER),
                index_to_coordinate(&mut b, idx, DEFAULT_JITTER)
            );
        }
    }

    #[test]
    fn nearest_slot_stays_in_range() {
        assert_eq!(nearest_slot(-3.0), 0);
        assert_eq!(nearest_slot(0.49), 0);
        assert_eq!(nearest_slot(0.5), 1);
        assert_eq!(nearest_slot(9.9), 9);
        assert_eq!(nearest_slot(42.0), 9);
    }

    #[test]
    fn slot_bounds_tile_the_axis() {
        assert_eq!(slot_bounds(0), (-10.0, -8.0));
        assert_eq!(slot_bounds(9), (8.0, 10.0));
        for s in 0..AXIS_SLOTS - 1 {
            assert_eq!(slot_bounds(s).1, slot_bounds(s + 1).0);
        }
    }
}
