//! Per-pass loss, accuracy and confusion counts.

use serde::{Deserialize, Serialize};

/// Binary confusion counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub tp: usize,
    pub fp: usize,
    #[serde(rename = "fn")]
    pub fn_: usize,
    pub tn: usize,
}

impl ConfusionMatrix {
    pub fn record(&mut self, predicted: bool, actual: bool) {
        match (actual, predicted) {
            (true, true) => self.tp += 1,
            (false, true) => self.fp += 1,
            (true, false) => self.fn_ += 1,
            (false, false) => self.tn += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.tp + self.fp + self.fn_ + self.tn
    }

    pub fn precision(&self) -> f64 {
        ratio(self.tp, self.tp + self.fp)
    }

    pub fn recall(&self) -> f64 {
        ratio(self.tp, self.tp + self.fn_)
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Hard prediction from a logit: clamp to `[0, 1]` then round.
pub fn predict(logit: f32) -> f32 {
    logit.clamp(0.0, 1.0).round()
}

/// Accumulator for one training or evaluation pass.
#[derive(Debug, Clone, Default)]
pub struct PassMetrics {
    loss_sum: f64,
    examples: usize,
    correct: usize,
    confusion: ConfusionMatrix,
}

impl PassMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a batch whose mean loss was `batch_loss` over `n` examples.
    pub fn record_loss(&mut self, batch_loss: f64, n: usize) {
        self.loss_sum += batch_loss * n as f64;
        self.examples += n;
    }

    /// Add a batch: its mean loss plus per-example logits and labels.
    pub fn record_batch(&mut self, batch_loss: f64, logits: &[f32], labels: &[f32]) {
        debug_assert_eq!(logits.len(), labels.len());
        self.record_loss(batch_loss, logits.len());
        for (&logit, &label) in logits.iter().zip(labels) {
            let pred = predict(logit);
            if pred == label {
                self.correct += 1;
            }
            self.confusion.record(pred > 0.5, label > 0.5);
        }
    }

    pub fn examples(&self) -> usize {
        self.examples
    }

    /// Example-weighted mean loss; 0 for an empty pass.
    pub fn loss(&self) -> f64 {
        ratio_f(self.loss_sum, self.examples)
    }

    /// Fraction of examples predicted correctly; 0 for an empty pass.
    pub fn accuracy(&self) -> f64 {
        ratio(self.correct, self.examples)
    }

    pub fn confusion(&self) -> ConfusionMatrix {
        self.confusion
    }

    pub fn summary(&self) -> PassSummary {
        PassSummary {
            loss: self.loss(),
            accuracy: self.accuracy(),
            confusion: self.confusion,
        }
    }
}

fn ratio_f(num: f64, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num / den as f64
    }
}

/// Final numbers of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PassSummary {
    pub loss: f64,
    pub accuracy: f64,
    pub confusion: ConfusionMatrix,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weighted_loss() {
        let mut m = PassMetrics::new();
        m.record_loss(0.4, 2);
        m.record_loss(0.9, 3);
        assert!((m.loss() - 0.7).abs() < 1e-12);
        assert_eq!(m.examples(), 5);
    }

    #[test]
    fn test_predict_clamps_and_rounds() {
        assert_eq!(predict(-3.0), 0.0);
        assert_eq!(predict(0.4), 0.0);
        assert_eq!(predict(0.6), 1.0);
        assert_eq!(predict(7.5), 1.0);
    }

    #[test]
    fn test_confusion_standard_definitions() {
        let mut m = PassMetrics::new();
        m.record_batch(0.5, &[2.0, 2.0, -1.0, -1.0, 0.9], &[1.0, 0.0, 1.0, 0.0, 1.0]);
        let c = m.confusion();
        assert_eq!(c, ConfusionMatrix { tp: 2, fp: 1, fn_: 1, tn: 1 });
        assert_eq!(c.total(), m.examples());
        assert!((m.accuracy() - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_empty_pass() {
        let m = PassMetrics::new();
        assert_eq!(m.loss(), 0.0);
        assert_eq!(m.accuracy(), 0.0);
    }

    #[test]
    fn test_confusion_serializes_fn_key() {
        let json = serde_json::to_string(&ConfusionMatrix::default()).unwrap();
        assert!(json.contains("\"fn\":0"));
    }
}
