//! In-memory fitting dataset

use super::DataProvider;
use crate::graph::Values;
use crate::loss::Loss;
use crate::{Error, Result};
use ndarray::{Array1, Array2, Axis};
use std::path::Path;

/// Per-column standardizer fitted on the training inputs.
#[derive(Clone, Debug)]
pub struct Scaler {
    mean: Array1<f32>,
    std: Array1<f32>,
}

impl Scaler {
    /// Fit on the columns of `x`.
    fn fit(x: &Array2<f32>) -> Self {
        let mean = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(x.ncols()));
        let mut std = Array1::zeros(x.ncols());
        for (j, col) in x.axis_iter(Axis(1)).enumerate() {
            let m = mean[j];
            let var = col.iter().map(|v| (v - m) * (v - m)).sum::<f32>() / col.len().max(1) as f32;
            // Constant columns pass through unscaled.
            std[j] = if var > 0.0 { var.sqrt() } else { 1.0 };
        }
        Self { mean, std }
    }

    /// Standardize `x` in place.
    pub fn transform(&self, x: &mut Array2<f32>) {
        for mut row in x.rows_mut() {
            for (j, v) in row.iter_mut().enumerate() {
                *v = (*v - self.mean[j]) / self.std[j];
            }
        }
    }

    /// Map standardized values back to the original scale.
    pub fn inverse(&self, x: &mut Array2<f32>) {
        for mut row in x.rows_mut() {
            for (j, v) in row.iter_mut().enumerate() {
                *v = *v * self.std[j] + self.mean[j];
            }
        }
    }
}

/// Fitting dataset: a fixed train/test split held in memory, inputs
/// standardized with statistics fitted on the training half.
///
/// Batch draws return the full split; subsampling strategies belong to
/// other providers.
#[derive(Clone, Debug)]
pub struct DataSet {
    train_x: Array2<f32>,
    train_y: Array2<f32>,
    test_x: Array2<f32>,
    test_y: Array2<f32>,
    scaler_x: Scaler,
}

impl DataSet {
    /// Build from arrays already split into train and test halves.
    pub fn from_arrays(
        train_x: Array2<f32>,
        train_y: Array2<f32>,
        test_x: Array2<f32>,
        test_y: Array2<f32>,
    ) -> Result<Self> {
        if train_x.nrows() == 0 {
            return Err(Error::NoData("empty training split".to_string()));
        }
        let scaler_x = Scaler::fit(&train_x);
        let mut train_x = train_x;
        let mut test_x = test_x;
        scaler_x.transform(&mut train_x);
        scaler_x.transform(&mut test_x);
        Ok(Self {
            train_x,
            train_y,
            test_x,
            test_y,
            scaler_x,
        })
    }

    /// Load whitespace-separated text files, selecting input and target
    /// columns by index. Lines starting with `#` are skipped.
    pub fn from_files(
        fname_train: impl AsRef<Path>,
        fname_test: impl AsRef<Path>,
        col_x: &[usize],
        col_y: &[usize],
    ) -> Result<Self> {
        let train = load_txt(fname_train.as_ref())?;
        let test = load_txt(fname_test.as_ref())?;
        let train_x = select_columns(&train, col_x)?;
        let train_y = select_columns(&train, col_y)?;
        let test_x = select_columns(&test, col_x)?;
        let test_y = select_columns(&test, col_y)?;
        Self::from_arrays(train_x, train_y, test_x, test_y)
    }

    /// The input scaler fitted on the training split.
    pub fn scaler_x(&self) -> &Scaler {
        &self.scaler_x
    }

    fn merged_pair(targets: &Values, outputs: &Values) -> (Array2<f32>, Array2<f32>) {
        (targets.merged(), outputs.merged())
    }
}

impl DataProvider for DataSet {
    fn losses(&self, targets: &Values, outputs: &Values, loss: Loss) -> Vec<f32> {
        let (t, o) = Self::merged_pair(targets, outputs);
        vec![loss.value(&t, &o)]
    }

    fn loss_cotangents(
        &self,
        targets: &Values,
        outputs: &Values,
        loss: Loss,
        weights: &[f32],
    ) -> Values {
        let w = weights.first().copied().unwrap_or(1.0);
        match (targets, outputs) {
            (Values::Single(t), Values::Single(o)) => Values::Single(loss.gradient(t, o) * w),
            _ => {
                let (t, o) = Self::merged_pair(targets, outputs);
                Values::Single(loss.gradient(&t, &o) * w)
            }
        }
    }

    fn train_next_batch(&mut self, _batch_size: usize) -> Result<(Array2<f32>, Values)> {
        Ok((self.train_x.clone(), Values::Single(self.train_y.clone())))
    }

    fn test(&mut self, _n: usize) -> Result<(Array2<f32>, Values)> {
        Ok((self.test_x.clone(), Values::Single(self.test_y.clone())))
    }
}

/// Parse a whitespace-separated numeric table.
fn load_txt(path: &Path) -> Result<Array2<f32>> {
    let text = std::fs::read_to_string(path)?;
    let mut rows: Vec<Vec<f32>> = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let row = line
            .split_whitespace()
            .map(|tok| {
                tok.parse::<f32>()
                    .map_err(|e| Error::Serialization(format!("bad value {tok:?}: {e}")))
            })
            .collect::<Result<Vec<f32>>>()?;
        rows.push(row);
    }
    if rows.is_empty() {
        return Err(Error::NoData(format!("{}", path.display())));
    }
    let ncols = rows[0].len();
    if let Some(bad) = rows.iter().find(|r| r.len() != ncols) {
        return Err(Error::ShapeMismatch {
            expected: vec![ncols],
            got: vec![bad.len()],
        });
    }
    let flat: Vec<f32> = rows.into_iter().flatten().collect();
    let nrows = flat.len() / ncols;
    Array2::from_shape_vec((nrows, ncols), flat).map_err(|e| Error::Serialization(e.to_string()))
}

fn select_columns(table: &Array2<f32>, cols: &[usize]) -> Result<Array2<f32>> {
    for &c in cols {
        if c >= table.ncols() {
            return Err(Error::ShapeMismatch {
                expected: vec![table.ncols()],
                got: vec![c],
            });
        }
    }
    Ok(table.select(Axis(1), cols))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;
    use std::io::Write;

    fn toy_dataset() -> DataSet {
        DataSet::from_arrays(
            array![[0.0], [2.0], [4.0]],
            array![[0.0], [1.0], [2.0]],
            array![[1.0], [3.0]],
            array![[0.5], [1.5]],
        )
        .unwrap()
    }

    #[test]
    fn inputs_are_standardized_with_train_statistics() {
        let mut ds = toy_dataset();
        let (x, _) = ds.train_next_batch(3).unwrap();
        let mean = x.mean().unwrap();
        assert_relative_eq!(mean, 0.0, epsilon = 1e-6);
        let var = x.iter().map(|v| v * v).sum::<f32>() / x.len() as f32;
        assert_relative_eq!(var, 1.0, epsilon = 1e-5);

        // Test inputs use the train scaler, so they need not be centered.
        let (xt, _) = ds.test(2).unwrap();
        assert!(xt.mean().unwrap().abs() > 1e-6);
    }

    #[test]
    fn scaler_inverse_round_trips() {
        let ds = toy_dataset();
        let mut x = array![[0.0], [2.0], [4.0]];
        ds.scaler_x().transform(&mut x);
        ds.scaler_x().inverse(&mut x);
        assert_relative_eq!(x[[0, 0]], 0.0, epsilon = 1e-5);
        assert_relative_eq!(x[[2, 0]], 4.0, epsilon = 1e-5);
    }

    #[test]
    fn one_loss_component_with_matching_cotangent() {
        let ds = toy_dataset();
        let t = Values::Single(array![[1.0], [2.0]]);
        let o = Values::Single(array![[1.5], [2.5]]);
        let losses = ds.losses(&t, &o, Loss::MeanSquaredError);
        assert_eq!(losses.len(), 1);
        assert_relative_eq!(losses[0], 0.25, epsilon = 1e-6);

        let cot = ds.loss_cotangents(&t, &o, Loss::MeanSquaredError, &[2.0]);
        match cot {
            Values::Single(c) => assert_relative_eq!(c[[0, 0]], 2.0 * 0.5, epsilon = 1e-6),
            Values::Multi(_) => panic!("expected single cotangent"),
        }
    }

    #[test]
    fn loads_text_files_with_column_selectors() {
        let dir = tempfile::tempdir().unwrap();
        let path_train = dir.path().join("train.dat");
        let path_test = dir.path().join("test.dat");
        let mut f = std::fs::File::create(&path_train).unwrap();
        writeln!(f, "# x y z").unwrap();
        writeln!(f, "0.0 0.0 1.0").unwrap();
        writeln!(f, "1.0 2.0 3.0").unwrap();
        let mut f = std::fs::File::create(&path_test).unwrap();
        writeln!(f, "0.5 1.0 2.0").unwrap();

        let mut ds = DataSet::from_files(&path_train, &path_test, &[0], &[2]).unwrap();
        let (_, y) = ds.train_next_batch(2).unwrap();
        match y {
            Values::Single(y) => assert_eq!(y, array![[1.0], [3.0]]),
            Values::Multi(_) => panic!("expected single targets"),
        }
    }

    #[test]
    fn empty_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.dat");
        std::fs::write(&path, "# header only\n").unwrap();
        assert!(DataSet::from_files(&path, &path, &[0], &[1]).is_err());
    }

    #[test]
    fn ragged_rows_are_a_shape_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ragged.dat");
        std::fs::write(&path, "1.0 2.0\n3.0\n").unwrap();
        assert!(matches!(
            DataSet::from_files(&path, &path, &[0], &[1]),
            Err(Error::ShapeMismatch { .. })
        ));
    }
}
