//! Mutable snapshot of the current training moment

use crate::graph::Values;
use ndarray::Array2;
use std::io::Write;
use std::path::Path;

/// The training state one [`Model`](crate::model::Model) mutates as it
/// runs: counters, the current batch and held-out split, the results of the
/// latest evaluation, and the best result seen so far.
///
/// Batch and split fields are replaced wholesale on update, never partially
/// mutated. The `best_*` fields only move when a strictly lower summed
/// train loss is observed, so the best loss is non-increasing across a run.
#[derive(Clone, Debug, Default)]
pub struct TrainState {
    /// Epochs completed in this run.
    pub epoch: u64,
    /// Optimizer updates applied in this run.
    pub step: u64,

    /// Current training minibatch.
    pub x_train: Option<Array2<f32>>,
    pub y_train: Option<Values>,
    /// Held-out split, fixed for the run.
    pub x_test: Option<Array2<f32>>,
    pub y_test: Option<Values>,

    /// Results of the latest evaluation.
    pub y_pred_train: Option<Values>,
    pub loss_train: Vec<f32>,
    pub loss_test: Vec<f32>,
    pub y_pred_test: Option<Values>,
    pub y_std_test: Option<Values>,
    pub metrics_test: Vec<f32>,

    /// Snapshot with the minimum summed train loss seen so far.
    pub best_loss_train: f32,
    pub best_loss_test: f32,
    pub best_y: Option<Values>,
    pub best_ystd: Option<Values>,
    pub best_metrics: Vec<f32>,
}

impl TrainState {
    pub fn new() -> Self {
        Self {
            best_loss_train: f32::INFINITY,
            best_loss_test: f32::INFINITY,
            ..Self::default()
        }
    }

    /// Replace the training batch wholesale.
    pub fn update_data_train(&mut self, x: Array2<f32>, y: Values) {
        self.x_train = Some(x);
        self.y_train = Some(y);
    }

    /// Replace the held-out split wholesale.
    pub fn update_data_test(&mut self, x: Array2<f32>, y: Values) {
        self.x_test = Some(x);
        self.y_test = Some(y);
    }

    /// Promote the latest evaluation to the best snapshot if its summed
    /// train loss is strictly lower than the best seen.
    pub fn update_best(&mut self) {
        let sum_train: f32 = self.loss_train.iter().sum();
        if self.best_loss_train > sum_train {
            self.best_loss_train = sum_train;
            self.best_loss_test = self.loss_test.iter().sum();
            self.best_y = self.y_pred_test.clone();
            self.best_ystd = self.y_std_test.clone();
            self.best_metrics = self.metrics_test.clone();
        }
    }

    /// Export the training batch and the held-out split with the best
    /// prediction (and its std band when present) as whitespace-separated
    /// text with the conventional column headers.
    pub fn save_txt(
        &self,
        fname_train: impl AsRef<Path>,
        fname_test: impl AsRef<Path>,
    ) -> crate::Result<()> {
        let (x_train, y_train) = match (&self.x_train, &self.y_train) {
            (Some(x), Some(y)) => (x, y.merged()),
            _ => return Err(crate::Error::NoData("no training batch".to_string())),
        };
        let mut train = std::fs::File::create(fname_train)?;
        writeln!(train, "# x, y")?;
        write_columns(&mut train, &[x_train, &y_train])?;

        let (x_test, y_test) = match (&self.x_test, &self.y_test) {
            (Some(x), Some(y)) => (x, y.merged()),
            _ => return Err(crate::Error::NoData("no test split".to_string())),
        };
        let best_y = self
            .best_y
            .as_ref()
            .ok_or_else(|| crate::Error::NoData("no best prediction".to_string()))?
            .merged();

        let mut test = std::fs::File::create(fname_test)?;
        writeln!(test, "# x, y_true, y_pred, y_std")?;
        match &self.best_ystd {
            Some(std) => {
                let std = std.merged();
                write_columns(&mut test, &[x_test, &y_test, &best_y, &std])?;
            }
            None => write_columns(&mut test, &[x_test, &y_test, &best_y])?,
        }
        Ok(())
    }
}

/// Write blocks side by side, one sample per row.
fn write_columns(out: &mut dyn Write, blocks: &[&Array2<f32>]) -> crate::Result<()> {
    let nrows = blocks.first().map_or(0, |b| b.nrows());
    for i in 0..nrows {
        let mut first = true;
        for block in blocks {
            for v in block.row(i) {
                if !first {
                    write!(out, " ")?;
                }
                write!(out, "{v:e}")?;
                first = false;
            }
        }
        writeln!(out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn best_updates_only_on_strictly_lower_summed_loss() {
        let mut state = TrainState::new();
        state.loss_train = vec![0.5, 0.5];
        state.loss_test = vec![0.4];
        state.metrics_test = vec![0.1];
        state.update_best();
        assert_relative_eq!(state.best_loss_train, 1.0);
        assert_relative_eq!(state.best_loss_test, 0.4);

        // Equal sum: no update of the test-side snapshot
        state.loss_train = vec![1.0];
        state.loss_test = vec![9.9];
        state.update_best();
        assert_relative_eq!(state.best_loss_test, 0.4);

        // Strictly lower: snapshot moves
        state.loss_train = vec![0.25, 0.25];
        state.loss_test = vec![0.2];
        state.metrics_test = vec![0.05];
        state.update_best();
        assert_relative_eq!(state.best_loss_train, 0.5);
        assert_relative_eq!(state.best_loss_test, 0.2);
        assert_eq!(state.best_metrics, vec![0.05]);
    }

    #[test]
    fn fresh_state_has_infinite_best_losses_and_zero_counters() {
        let state = TrainState::new();
        assert!(state.best_loss_train.is_infinite());
        assert!(state.best_loss_test.is_infinite());
        assert_eq!(state.epoch, 0);
        assert_eq!(state.step, 0);
    }

    #[test]
    fn batch_updates_replace_wholesale() {
        let mut state = TrainState::new();
        state.update_data_train(array![[1.0]], Values::Single(array![[2.0]]));
        state.update_data_train(array![[3.0], [4.0]], Values::Single(array![[5.0], [6.0]]));
        assert_eq!(state.x_train.as_ref().unwrap().nrows(), 2);
    }

    #[test]
    fn save_txt_writes_headers_and_band() {
        let dir = tempfile::tempdir().unwrap();
        let train_path = dir.path().join("train.dat");
        let test_path = dir.path().join("test.dat");

        let mut state = TrainState::new();
        state.update_data_train(array![[0.0], [1.0]], Values::Single(array![[0.0], [1.0]]));
        state.update_data_test(array![[0.5]], Values::Single(array![[0.6]]));
        state.loss_train = vec![0.1];
        state.loss_test = vec![0.2];
        state.y_pred_test = Some(Values::Single(array![[0.55]]));
        state.y_std_test = Some(Values::Single(array![[0.01]]));
        state.update_best();

        state.save_txt(&train_path, &test_path).unwrap();

        let train = std::fs::read_to_string(&train_path).unwrap();
        assert!(train.starts_with("# x, y\n"));
        assert_eq!(train.lines().count(), 3);

        let test = std::fs::read_to_string(&test_path).unwrap();
        assert!(test.starts_with("# x, y_true, y_pred, y_std\n"));
        let row: Vec<&str> = test.lines().nth(1).unwrap().split_whitespace().collect();
        assert_eq!(row.len(), 4);
    }

    #[test]
    fn save_txt_without_batch_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let state = TrainState::new();
        assert!(state
            .save_txt(dir.path().join("a"), dir.path().join("b"))
            .is_err());
    }
}
