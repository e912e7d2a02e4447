//! Priority distributions over the defects a submission actually exhibits.
//!
//! Absent defects are masked out *before* normalising. Softmaxing over the
//! whole catalog would leak probability mass onto defects the student never
//! made.

/// Softmax of `scores` restricted to positions where `present` is true.
///
/// The result is aligned with `scores`: present positions sum to 1, absent
/// positions are exactly 0. With nothing present the result is all zeros.
/// The maximum present score is subtracted before exponentiating.
pub fn softmax_present(scores: &[f64], present: &[bool]) -> Vec<f64> {
    debug_assert_eq!(scores.len(), present.len());
    let max = scores
        .iter()
        .zip(present)
        .filter(|(_, p)| **p)
        .map(|(s, _)| *s)
        .fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return vec![0.0; scores.len()];
    }

    let exps: Vec<f64> = scores
        .iter()
        .zip(present)
        .map(|(s, p)| if *p { (s - max).exp() } else { 0.0 })
        .collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

/// Zero out scores of absent defects.
pub fn mask_absent(scores: &[f64], present: &[bool]) -> Vec<f64> {
    scores
        .iter()
        .zip(present)
        .map(|(s, p)| if *p { *s } else { 0.0 })
        .collect()
}
