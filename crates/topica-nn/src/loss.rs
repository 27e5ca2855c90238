//! Binary cross-entropy on logits.

use crate::error::Result;
use candle_core::Tensor;

/// Mean BCE between `logits` and `{0, 1}` `targets`.
///
/// Computed as `max(x, 0) - x * t + log(1 + exp(-|x|))`, which stays finite
/// for large `|x|`.
pub fn binary_cross_entropy_with_logits(logits: &Tensor, targets: &Tensor) -> Result<Tensor> {
    let positive = logits.relu()?;
    let log_term = logits.abs()?.neg()?.exp()?.affine(1.0, 1.0)?.log()?;
    let loss = ((positive - logits.mul(targets)?)? + log_term)?;
    Ok(loss.mean_all()?)
}
