//! Blended similarity/proximity scoring and the two-tier ordering policy.

use std::cmp::Ordering;

/// Blends semantic similarity with exponentially decayed proximity:
/// `alpha * similarity + (1 - alpha) * exp(-distance_m / scale_m)`.
///
/// At distance zero the proximity term is exactly `1 - alpha`; it decays
/// toward zero as distance grows past `scale_m`.
pub fn blend_score(similarity: f64, distance_m: f64, alpha: f64, scale_m: f64) -> f64 {
	alpha * similarity + (1.0 - alpha) * (-(distance_m / scale_m)).exp()
}

/// Orders candidates with two deliberately different sort keys: items scoring
/// at or above `score_floor` come first, best score first; the rest follow,
/// nearest first. When relevance is weak, plain nearness is the more useful
/// signal, so the weak partition ignores score entirely.
///
/// Both sorts are stable, so input order breaks exact ties.
pub fn two_tier_order<T>(
	items: Vec<T>,
	score: impl Fn(&T) -> f64,
	distance_m: impl Fn(&T) -> f64,
	score_floor: f64,
) -> Vec<T> {
	let (mut strong, mut weak): (Vec<T>, Vec<T>) =
		items.into_iter().partition(|item| score(item) >= score_floor);

	strong.sort_by(|a, b| score(b).partial_cmp(&score(a)).unwrap_or(Ordering::Equal));
	weak.sort_by(|a, b| distance_m(a).partial_cmp(&distance_m(b)).unwrap_or(Ordering::Equal));
	strong.extend(weak);

	strong
}
