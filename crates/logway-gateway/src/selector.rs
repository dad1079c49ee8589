/// Weight-proportional selection over the healthy subset of a
/// registry snapshot.
///
/// The selector is stateless: each call receives a point-in-time
/// snapshot, so concurrent admits and evictions never produce torn
/// reads. Iteration order is the snapshot's id-sorted order, which
/// keeps selection reproducible under a seeded RNG.

use rand::Rng;
use thiserror::Error;

use logway_protocol::status::AnalyzerSnapshot;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectError {
    #[error("no healthy analyzer available")]
    NoHealthyAnalyzer,
    #[error("healthy analyzers carry no selectable weight")]
    InvalidWeights,
}

/// Pick one healthy analyzer with probability `w_i / Σ w_j`.
pub fn pick<'a, R: Rng>(
    snapshot: &'a [AnalyzerSnapshot],
    rng: &mut R,
) -> Result<&'a AnalyzerSnapshot, SelectError> {
    pick_excluding(snapshot, None, rng)
}

/// Weighted pick that skips `exclude`, used when re-routing a failed
/// message to a different analyzer.
pub fn pick_excluding<'a, R: Rng>(
    snapshot: &'a [AnalyzerSnapshot],
    exclude: Option<&str>,
    rng: &mut R,
) -> Result<&'a AnalyzerSnapshot, SelectError> {
    let healthy: Vec<&AnalyzerSnapshot> = snapshot
        .iter()
        .filter(|a| a.healthy && exclude != Some(a.id.as_str()))
        .collect();

    match healthy.len() {
        0 => return Err(SelectError::NoHealthyAnalyzer),
        1 => return Ok(healthy[0]),
        _ => {}
    }

    let total: f64 = healthy.iter().map(|a| a.weight).sum();
    if !(total.is_finite() && total > 0.0) {
        return Err(SelectError::InvalidWeights);
    }

    let draw = rng.gen_range(0.0..total);
    let mut cumulative = 0.0;
    for analyzer in &healthy {
        cumulative += analyzer.weight;
        if draw < cumulative {
            return Ok(analyzer);
        }
    }
    // Unreachable with exact arithmetic; covers floating-point drift
    // in the cumulative sum.
    Ok(healthy[healthy.len() - 1])
}
