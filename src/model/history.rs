//! Append-only loss history across validation checkpoints

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

/// Time series of loss/metric values recorded at each validation point.
///
/// The four sequences always have the same length: one [`LossHistory::add`]
/// appends one entry to each, and nothing ever removes entries. The loss
/// weights are recorded at compile time and used only when the history is
/// displayed or summed, never to rewrite stored values.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LossHistory {
    pub steps: Vec<u64>,
    pub loss_train: Vec<Vec<f32>>,
    pub loss_test: Vec<Vec<f32>>,
    pub metrics_test: Vec<Vec<f32>>,
    loss_weights: Option<Vec<f32>>,
}

impl LossHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the weights used for display-time weighting.
    pub fn update_loss_weights(&mut self, weights: Vec<f32>) {
        self.loss_weights = Some(weights);
    }

    pub fn loss_weights(&self) -> Option<&[f32]> {
        self.loss_weights.as_deref()
    }

    /// Append one record to all four sequences.
    pub fn add(
        &mut self,
        step: u64,
        loss_train: Vec<f32>,
        loss_test: Vec<f32>,
        metrics_test: Vec<f32>,
    ) {
        self.steps.push(step);
        self.loss_train.push(loss_train);
        self.loss_test.push(loss_test);
        self.metrics_test.push(metrics_test);
    }

    /// Number of validation records.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Display-weighted sum of one loss vector.
    fn weighted_sum(&self, losses: &[f32]) -> f32 {
        match &self.loss_weights {
            Some(w) => losses.iter().zip(w.iter()).map(|(l, w)| l * w).sum(),
            None => losses.iter().sum(),
        }
    }

    /// Weighted train-loss totals per record.
    pub fn train_totals(&self) -> Vec<f32> {
        self.loss_train.iter().map(|l| self.weighted_sum(l)).collect()
    }

    /// Weighted test-loss totals per record.
    pub fn test_totals(&self) -> Vec<f32> {
        self.loss_test.iter().map(|l| self.weighted_sum(l)).collect()
    }

    /// Export as pretty-printed JSON.
    pub fn to_json(&self) -> crate::Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| crate::Error::Serialization(e.to_string()))
    }

    /// Export as whitespace-separated text with the conventional header.
    pub fn save_txt(&self, fname: impl AsRef<Path>) -> crate::Result<()> {
        let mut out = std::fs::File::create(fname)?;
        writeln!(out, "# step, loss_train, loss_test, metrics_test")?;
        for (i, step) in self.steps.iter().enumerate() {
            write!(out, "{step}")?;
            for v in &self.loss_train[i] {
                write!(out, " {v:e}")?;
            }
            for v in &self.loss_test[i] {
                write!(out, " {v:e}")?;
            }
            for v in &self.metrics_test[i] {
                write!(out, " {v:e}")?;
            }
            writeln!(out)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn add_appends_to_all_four_sequences() {
        let mut history = LossHistory::new();
        history.add(0, vec![1.0, 2.0], vec![1.5], vec![0.1]);
        history.add(10, vec![0.5, 1.0], vec![0.8], vec![0.05]);
        assert_eq!(history.len(), 2);
        assert_eq!(history.steps, vec![0, 10]);
        assert_eq!(history.loss_train.len(), 2);
        assert_eq!(history.loss_test.len(), 2);
        assert_eq!(history.metrics_test.len(), 2);
    }

    #[test]
    fn totals_apply_display_weights_only() {
        let mut history = LossHistory::new();
        history.add(0, vec![1.0, 2.0], vec![3.0, 4.0], vec![]);
        assert_relative_eq!(history.train_totals()[0], 3.0);

        history.update_loss_weights(vec![2.0, 0.5]);
        assert_relative_eq!(history.train_totals()[0], 3.0);
        assert_relative_eq!(history.test_totals()[0], 8.0);
        // Stored values are untouched
        assert_eq!(history.loss_train[0], vec![1.0, 2.0]);
    }

    #[test]
    fn save_txt_has_header_and_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loss.dat");
        let mut history = LossHistory::new();
        history.add(0, vec![1.0], vec![2.0], vec![0.5]);
        history.add(5, vec![0.5], vec![1.0], vec![0.25]);
        history.save_txt(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "# step, loss_train, loss_test, metrics_test"
        );
        assert_eq!(lines.count(), 2);
    }

    #[test]
    fn serializes_to_json() {
        let mut history = LossHistory::new();
        history.add(1, vec![0.5], vec![0.4], vec![0.1]);
        let json = history.to_json().unwrap();
        assert!(json.contains("\"steps\""));
        assert!(json.contains("loss_train"));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// All four sequences stay the same length under any add sequence.
        #[test]
        fn sequences_share_length(records in proptest::collection::vec(
            (0u64..10_000, 1usize..4, 0usize..4), 0..50
        )) {
            let mut history = LossHistory::new();
            for (step, n_losses, n_metrics) in records {
                history.add(
                    step,
                    vec![1.0; n_losses],
                    vec![1.0; n_losses],
                    vec![0.0; n_metrics],
                );
                prop_assert_eq!(history.steps.len(), history.loss_train.len());
                prop_assert_eq!(history.steps.len(), history.loss_test.len());
                prop_assert_eq!(history.steps.len(), history.metrics_test.len());
            }
        }

        /// The history never shrinks.
        #[test]
        fn history_never_shrinks(adds in 1usize..100) {
            let mut history = LossHistory::new();
            let mut prev = 0;
            for i in 0..adds {
                history.add(i as u64, vec![1.0], vec![1.0], vec![]);
                prop_assert!(history.len() > prev);
                prev = history.len();
            }
        }
    }
}
