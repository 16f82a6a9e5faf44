//! Per-head value arrays exchanged with the execution engine
//!
//! A network with a single (possibly vector-valued) target produces one
//! `(n, k)` array; a network with several named targets produces one array
//! per head. Both shapes travel through feed construction, evaluation, and
//! metric computation as one tagged type, so the two cases never rely on
//! runtime type inspection.

use ndarray::Array2;

/// Output or target values of a network, tagged by target structure.
#[derive(Clone, Debug, PartialEq)]
pub enum Values {
    /// One array covering every output column, shape `(n, k)`.
    Single(Array2<f32>),
    /// One array per named target head, in head order.
    Multi(Vec<Array2<f32>>),
}

impl Values {
    /// Number of sample rows.
    pub fn nrows(&self) -> usize {
        match self {
            Values::Single(a) => a.nrows(),
            Values::Multi(heads) => heads.first().map_or(0, |a| a.nrows()),
        }
    }

    /// Total number of output columns across heads.
    pub fn ncols(&self) -> usize {
        match self {
            Values::Single(a) => a.ncols(),
            Values::Multi(heads) => heads.iter().map(|a| a.ncols()).sum(),
        }
    }

    /// Number of heads (1 for `Single`).
    pub fn num_heads(&self) -> usize {
        match self {
            Values::Single(_) => 1,
            Values::Multi(heads) => heads.len(),
        }
    }

    /// View the head arrays in order. `Single` exposes its one array.
    pub fn heads(&self) -> Vec<&Array2<f32>> {
        match self {
            Values::Single(a) => vec![a],
            Values::Multi(heads) => heads.iter().collect(),
        }
    }

    /// Stack all heads side by side into one `(n, total_cols)` array.
    pub fn merged(&self) -> Array2<f32> {
        match self {
            Values::Single(a) => a.clone(),
            Values::Multi(heads) => {
                let n = self.nrows();
                let total = self.ncols();
                let mut out = Array2::zeros((n, total));
                let mut col = 0;
                for head in heads {
                    out.slice_mut(ndarray::s![.., col..col + head.ncols()])
                        .assign(head);
                    col += head.ncols();
                }
                out
            }
        }
    }

    /// Elementwise mean over a non-empty set of structurally identical samples.
    pub fn mean_over(samples: &[Values]) -> Option<Values> {
        let first = samples.first()?;
        let scale = 1.0 / samples.len() as f32;
        Some(match first {
            Values::Single(first) => {
                let mut acc = Array2::zeros(first.raw_dim());
                for s in samples {
                    if let Values::Single(a) = s {
                        acc += a;
                    }
                }
                Values::Single(acc * scale)
            }
            Values::Multi(heads) => {
                let mut acc: Vec<Array2<f32>> =
                    heads.iter().map(|h| Array2::zeros(h.raw_dim())).collect();
                for s in samples {
                    if let Values::Multi(hs) = s {
                        for (a, h) in acc.iter_mut().zip(hs) {
                            *a += h;
                        }
                    }
                }
                Values::Multi(acc.into_iter().map(|a| a * scale).collect())
            }
        })
    }

    /// Elementwise standard deviation over samples, given their mean.
    pub fn std_over(samples: &[Values], mean: &Values) -> Option<Values> {
        if samples.is_empty() {
            return None;
        }
        let scale = 1.0 / samples.len() as f32;
        Some(match mean {
            Values::Single(m) => {
                let mut acc = Array2::zeros(m.raw_dim());
                for s in samples {
                    if let Values::Single(a) = s {
                        let d = a - m;
                        acc += &(&d * &d);
                    }
                }
                Values::Single((acc * scale).mapv(f32::sqrt))
            }
            Values::Multi(means) => {
                let mut acc: Vec<Array2<f32>> =
                    means.iter().map(|m| Array2::zeros(m.raw_dim())).collect();
                for s in samples {
                    if let Values::Multi(hs) = s {
                        for ((a, h), m) in acc.iter_mut().zip(hs).zip(means) {
                            let d = h - m;
                            *a += &(&d * &d);
                        }
                    }
                }
                Values::Multi(
                    acc.into_iter()
                        .map(|a| (a * scale).mapv(f32::sqrt))
                        .collect(),
                )
            }
        })
    }
}
