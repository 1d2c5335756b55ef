//! Weighted Selector
//!
//! Stateless weighted-random choice over an explicit random source. Callers
//! inject the RNG, so a seeded `StdRng` makes outcomes reproducible.

use leadflow_core::WeightedOperator;
use rand::Rng;

/// Anything that carries a selection weight.
pub trait Weighted {
    fn weight(&self) -> f64;
}

impl Weighted for WeightedOperator {
    fn weight(&self) -> f64 {
        self.weight
    }
}

impl<T> Weighted for (T, f64) {
    fn weight(&self) -> f64 {
        self.1
    }
}

/// Probability mass of a candidate. Negative and non-finite weights count as zero.
fn mass<T: Weighted>(candidate: &T) -> f64 {
    let weight = candidate.weight();
    if weight.is_finite() && weight > 0.0 {
        weight
    } else {
        0.0
    }
}

/// Pick one candidate with probability proportional to its weight.
///
/// - empty input returns `None`
/// - when every weight is zero, a uniformly random candidate is returned
/// - otherwise `r` is drawn from `[0, total)` and the first candidate whose
///   cumulative weight reaches `r` wins; zero-weight candidates are stepped
///   over, so they can never win this branch
pub fn select<'a, T, R>(candidates: &'a [T], rng: &mut R) -> Option<&'a T>
where
    T: Weighted,
    R: Rng + ?Sized,
{
    select_index(candidates, rng).map(|index| &candidates[index])
}

/// Index form of [`select`].
pub fn select_index<T, R>(candidates: &[T], rng: &mut R) -> Option<usize>
where
    T: Weighted,
    R: Rng + ?Sized,
{
    if candidates.is_empty() {
        return None;
    }

    let mut total: f64 = candidates.iter().map(mass).sum();
    if total <= 0.0 {
        return Some(rng.random_range(0..candidates.len()));
    }

    // Finite weights can still overflow when summed; rescale so the draw
    // range stays finite. Relative proportions are unchanged.
    let mut scale = 1.0;
    if !total.is_finite() {
        scale = candidates.iter().map(mass).fold(0.0, f64::max);
        total = candidates.iter().map(|c| mass(c) / scale).sum();
    }

    let r = rng.random_range(0.0..total);
    let mut cumulative = 0.0;
    let mut last_positive = None;
    for (index, candidate) in candidates.iter().enumerate() {
        let weight = mass(candidate) / scale;
        if weight == 0.0 {
            continue;
        }
        cumulative += weight;
        last_positive = Some(index);
        if cumulative >= r {
            return Some(index);
        }
    }

    // Unreachable in practice: the walk adds weights in the same order as
    // `total`. Falling back to the last weighted candidate keeps a zero
    // weight from ever winning.
    tracing::warn!(
        r,
        cumulative,
        total,
        "Weighted walk ended below the draw; using last weighted candidate"
    );
    last_positive
}
