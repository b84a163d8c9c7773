//! Annealed loss coefficients for the internal heads
//!
//! Deeper heads get larger ceilings, and every coefficient ramps up linearly
//! from 0.01 towards its ceiling over the run. The final head is not part of
//! the sequence; its weight is always 1.

/// Ceiling for every IC head: `0.01 + (i + 1) / num_output`.
///
/// Returns `num_output - 1` entries (empty for a single-head model).
pub fn max_coeffs(num_output: usize) -> Vec<f32> {
    let n = num_output as f32;
    (0..num_output.saturating_sub(1))
        .map(|i| 0.01 + (i + 1) as f32 / n)
        .collect()
}

/// Coefficients in effect at `epoch`: `min(max, 0.01 + epoch * max / epochs)`.
pub fn current_coeffs(epoch: usize, epochs: usize, max: &[f32]) -> Vec<f32> {
    if epochs == 0 {
        return max.to_vec();
    }
    let progress = epoch as f32 / epochs as f32;
    max.iter().map(|&m| m.min(0.01 + progress * m)).collect()
}
