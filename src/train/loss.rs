//! Cross-entropy losses over one or many prediction heads
//!
//! Every function returns the loss value together with `dL/dlogits` for each
//! head, ready to be handed to [`crate::model::SdnModel::backward`].

use crate::{Error, Result};
use ndarray::{Array2, Axis};

/// Row-wise softmax: exp(x_i - max) / sum(exp(x_j - max))
pub fn softmax_rows(logits: &Array2<f32>) -> Array2<f32> {
    let mut probs = logits.clone();
    for mut row in probs.axis_iter_mut(Axis(0)) {
        let max = row.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
        row.mapv_inplace(|v| (v - max).exp());
        let sum: f32 = row.sum();
        row.mapv_inplace(|v| v / sum);
    }
    probs
}

/// Mean cross entropy of `logits` against integer `labels`.
///
/// Returns `(loss, dL/dlogits)` where the gradient is
/// `(softmax - onehot) / batch`.
pub fn cross_entropy(logits: &Array2<f32>, labels: &[usize]) -> Result<(f32, Array2<f32>)> {
    let (rows, classes) = logits.dim();
    if rows != labels.len() {
        return Err(Error::ShapeMismatch {
            context: "cross entropy labels".to_string(),
            expected: vec![rows],
            actual: vec![labels.len()],
        });
    }
    if rows == 0 {
        return Ok((0.0, Array2::zeros((0, classes))));
    }

    let mut grad = softmax_rows(logits);
    let mut total = 0.0;
    for (i, &label) in labels.iter().enumerate() {
        if label >= classes {
            return Err(Error::InvalidLabel {
                label,
                num_classes: classes,
            });
        }
        total -= (grad[[i, label]] + 1e-10).max(f32::MIN_POSITIVE).ln();
        grad[[i, label]] -= 1.0;
    }
    let n = rows as f32;
    grad.mapv_inplace(|g| g / n);
    Ok((total / n, grad))
}

/// Blended multi-head loss and the gradient for every head.
#[derive(Debug, Clone)]
pub struct SdnLoss {
    pub value: f32,
    /// `dL/dlogits`, one entry per head in head order.
    pub grads: Vec<Array2<f32>>,
}

/// `sum(coeffs[i] * CE(head_i)) + CE(head_last)`
///
/// `coeffs` weights the IC heads only; `None` weights every head with 1.
pub fn sdn_loss(outputs: &[Array2<f32>], labels: &[usize], coeffs: Option<&[f32]>) -> Result<SdnLoss> {
    let Some(last) = outputs.len().checked_sub(1) else {
        return Err(Error::config("loss needs at least one head"));
    };
    if let Some(c) = coeffs {
        if c.len() != last {
            return Err(Error::config(format!(
                "{} loss coefficients for {} internal heads",
                c.len(),
                last
            )));
        }
    }

    let mut value = 0.0;
    let mut grads = Vec::with_capacity(outputs.len());
    for (i, logits) in outputs.iter().enumerate() {
        let weight = match coeffs {
            Some(c) if i < last => c[i],
            _ => 1.0,
        };
        let (loss, mut grad) = cross_entropy(logits, labels)?;
        value += weight * loss;
        grad.mapv_inplace(|g| g * weight);
        grads.push(grad);
    }
    Ok(SdnLoss { value, grads })
}

/// Unweighted sum over the internal heads; the final head gets no gradient.
///
/// Used when the backbone is frozen and only the IC heads learn.
pub fn ic_only_loss(outputs: &[Array2<f32>], labels: &[usize]) -> Result<SdnLoss> {
    let Some(last) = outputs.len().checked_sub(1) else {
        return Err(Error::config("loss needs at least one head"));
    };
    let mut value = 0.0;
    let mut grads = Vec::with_capacity(outputs.len());
    for logits in &outputs[..last] {
        let (loss, grad) = cross_entropy(logits, labels)?;
        value += loss;
        grads.push(grad);
    }
    grads.push(Array2::zeros(outputs[last].raw_dim()));
    Ok(SdnLoss { value, grads })
}
