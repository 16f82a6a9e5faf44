//! Reference network definitions
//!
//! A compiled network for the harness needs parameters, a forward pass
//! honoring the feed flags, and a pullback. [`LinearNet`] is the bundled
//! reference: an affine map with optional input dropout, one array output
//! or several named heads, and a configurable initializer.

use crate::graph::{Feed, Network, Regularization, Session, Values};
use crate::init::Initializer;
use crate::{Error, Result};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use std::cell::RefCell;

/// Affine network `y = x·W + b` with optional input dropout.
///
/// With one head the network has a single `(n, d_out)` output; with several
/// heads it produces one array per head, in head order. Dropout draws a
/// fresh mask per stochastic forward pass; the mask from a training-mode
/// pass is replayed by the following pullback.
pub struct LinearNet {
    d_in: usize,
    head_widths: Vec<usize>,
    single: bool,
    w: Array2<f32>,
    b: Array1<f32>,
    dropout_rate: f32,
    initializer: Initializer,
    regularizer: Option<Regularization>,
    rng: RefCell<StdRng>,
    last_mask: RefCell<Option<Array2<f32>>>,
}

impl LinearNet {
    /// Single-target network with `d_out` output columns.
    pub fn new(d_in: usize, d_out: usize) -> Self {
        Self::build(d_in, vec![d_out], true)
    }

    /// Multi-target network with one head per entry of `head_widths`.
    pub fn multi(d_in: usize, head_widths: Vec<usize>) -> Self {
        Self::build(d_in, head_widths, false)
    }

    fn build(d_in: usize, head_widths: Vec<usize>, single: bool) -> Self {
        let total: usize = head_widths.iter().sum();
        Self {
            d_in,
            head_widths,
            single,
            w: Array2::zeros((d_in, total)),
            b: Array1::zeros(total),
            dropout_rate: 0.0,
            initializer: Initializer::GlorotUniform,
            regularizer: None,
            rng: RefCell::new(StdRng::from_entropy()),
            last_mask: RefCell::new(None),
        }
    }

    /// Input dropout rate in `[0, 1)`.
    pub fn dropout(mut self, rate: f32) -> Self {
        self.dropout_rate = rate;
        self
    }

    pub fn initializer(mut self, initializer: Initializer) -> Self {
        self.initializer = initializer;
        self
    }

    pub fn regularizer(mut self, regularizer: Regularization) -> Self {
        self.regularizer = Some(regularizer);
        self
    }

    /// Fix the dropout RNG, for reproducible stochastic passes.
    pub fn seed(self, seed: u64) -> Self {
        *self.rng.borrow_mut() = StdRng::seed_from_u64(seed);
        self
    }

    fn total_out(&self) -> usize {
        self.b.len()
    }

    /// Dropout-masked inputs for a stochastic pass, identity otherwise.
    fn masked_inputs(&self, feed: &Feed<'_>) -> Array2<f32> {
        if !feed.dropout || self.dropout_rate <= 0.0 {
            self.last_mask.replace(None);
            return feed.inputs.clone();
        }
        let keep = 1.0 - self.dropout_rate;
        let mut rng = self.rng.borrow_mut();
        let mask = Array2::from_shape_fn(feed.inputs.raw_dim(), |_| {
            if rng.gen::<f32>() < keep {
                1.0 / keep
            } else {
                0.0
            }
        });
        let masked = feed.inputs * &mask;
        // A training pass replays this mask in the matching pullback.
        self.last_mask.replace(if feed.training { Some(mask) } else { None });
        masked
    }

    fn split_heads(&self, out: Array2<f32>) -> Values {
        if self.single {
            return Values::Single(out);
        }
        let mut heads = Vec::with_capacity(self.head_widths.len());
        let mut col = 0;
        for &width in &self.head_widths {
            heads.push(out.slice(ndarray::s![.., col..col + width]).to_owned());
            col += width;
        }
        Values::Multi(heads)
    }
}

impl Network for LinearNet {
    fn param_len(&self) -> usize {
        self.w.len() + self.b.len()
    }

    fn params(&self) -> Array1<f32> {
        let mut flat = Vec::with_capacity(self.param_len());
        flat.extend(self.w.iter().copied());
        flat.extend(self.b.iter().copied());
        Array1::from(flat)
    }

    fn set_params(&mut self, flat: ArrayView1<'_, f32>) -> Result<()> {
        if flat.len() != self.param_len() {
            return Err(Error::ShapeMismatch {
                expected: vec![self.param_len()],
                got: vec![flat.len()],
            });
        }
        let (w_flat, b_flat) = flat.split_at(ndarray::Axis(0), self.w.len());
        self.w = Array2::from_shape_vec(
            (self.d_in, self.total_out()),
            w_flat.iter().copied().collect(),
        )
        .map_err(|e| Error::Serialization(e.to_string()))?;
        self.b = b_flat.to_owned();
        Ok(())
    }

    fn initialize(&mut self, rng: &mut dyn RngCore) -> Result<()> {
        self.w = self.initializer.sample(self.d_in, self.total_out(), rng);
        self.b = Array1::zeros(self.total_out());
        Ok(())
    }

    fn forward(&self, _session: &mut Session, feed: &Feed<'_>) -> Result<Values> {
        if feed.inputs.ncols() != self.d_in {
            return Err(Error::ShapeMismatch {
                expected: vec![self.d_in],
                got: vec![feed.inputs.ncols()],
            });
        }
        let z = self.masked_inputs(feed);
        let out = z.dot(&self.w) + &self.b;
        Ok(self.split_heads(out))
    }

    fn pullback(
        &self,
        _session: &mut Session,
        feed: &Feed<'_>,
        cotangents: &Values,
    ) -> Result<Array1<f32>> {
        let c = cotangents.merged();
        if c.ncols() != self.total_out() || c.nrows() != feed.inputs.nrows() {
            return Err(Error::ShapeMismatch {
                expected: vec![feed.inputs.nrows(), self.total_out()],
                got: c.shape().to_vec(),
            });
        }
        let z = match self.last_mask.borrow().as_ref() {
            Some(mask) if feed.training && feed.dropout => feed.inputs * mask,
            _ => feed.inputs.clone(),
        };
        let grad_w = z.t().dot(&c);
        let grad_b = c.sum_axis(Axis(0));

        let mut flat = Vec::with_capacity(self.param_len());
        flat.extend(grad_w.iter().copied());
        flat.extend(grad_b.iter().copied());
        Ok(Array1::from(flat))
    }

    fn regularizer(&self) -> Option<Regularization> {
        self.regularizer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{DataId, SessionOptions};
    use approx::assert_relative_eq;
    use ndarray::array;

    fn session() -> Session {
        Session::open(SessionOptions::default()).unwrap()
    }

    #[test]
    fn forward_is_affine() {
        let mut net = LinearNet::new(2, 1);
        net.set_params(array![1.0, 2.0, 0.5].view()).unwrap();
        let x = array![[1.0, 1.0], [2.0, 0.0]];
        let y = Values::Single(array![[0.0], [0.0]]);
        let feed = Feed::new(false, false, DataId::Train, &x, &y);
        let out = net.forward(&mut session(), &feed).unwrap();
        match out {
            Values::Single(o) => {
                assert_relative_eq!(o[[0, 0]], 3.5);
                assert_relative_eq!(o[[1, 0]], 2.5);
            }
            Values::Multi(_) => panic!("expected single output"),
        }
    }

    #[test]
    fn params_round_trip() {
        let mut net = LinearNet::new(3, 2);
        let mut rng = StdRng::seed_from_u64(7);
        net.initialize(&mut rng).unwrap();
        let before = net.params();
        net.set_params(before.view()).unwrap();
        assert_eq!(net.params(), before);
        assert_eq!(net.param_len(), 3 * 2 + 2);
    }

    #[test]
    fn set_params_rejects_wrong_length() {
        let mut net = LinearNet::new(2, 1);
        assert!(matches!(
            net.set_params(array![1.0].view()),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn pullback_matches_finite_differences() {
        let mut net = LinearNet::new(2, 1);
        let mut rng = StdRng::seed_from_u64(3);
        net.initialize(&mut rng).unwrap();

        let x = array![[0.5, -1.0], [2.0, 0.3], [1.0, 1.0]];
        let y_true = array![[1.0], [0.0], [2.0]];
        let y = Values::Single(y_true.clone());
        let mut sess = session();

        // Objective: MSE between forward output and y_true
        let objective = |net: &LinearNet, sess: &mut Session| {
            let feed = Feed::new(false, false, DataId::Train, &x, &y);
            match net.forward(sess, &feed).unwrap() {
                Values::Single(o) => crate::loss::Loss::MeanSquaredError.value(&y_true, &o),
                Values::Multi(_) => unreachable!(),
            }
        };

        let feed = Feed::new(false, false, DataId::Train, &x, &y);
        let out = net.forward(&mut sess, &feed).unwrap();
        let cot = match &out {
            Values::Single(o) => {
                Values::Single(crate::loss::Loss::MeanSquaredError.gradient(&y_true, o))
            }
            Values::Multi(_) => unreachable!(),
        };
        let analytic = net.pullback(&mut sess, &feed, &cot).unwrap();

        let base = net.params();
        let eps = 1e-3;
        for i in 0..net.param_len() {
            let mut bumped = base.clone();
            bumped[i] += eps;
            net.set_params(bumped.view()).unwrap();
            let f_plus = objective(&net, &mut sess);
            bumped[i] -= 2.0 * eps;
            net.set_params(bumped.view()).unwrap();
            let f_minus = objective(&net, &mut sess);
            net.set_params(base.view()).unwrap();
            let numeric = (f_plus - f_minus) / (2.0 * eps);
            assert_relative_eq!(analytic[i], numeric, epsilon = 1e-2, max_relative = 0.05);
        }
    }

    #[test]
    fn multi_head_outputs_split_by_width() {
        let mut net = LinearNet::multi(1, vec![1, 2]);
        let mut rng = StdRng::seed_from_u64(11);
        net.initialize(&mut rng).unwrap();
        let x = array![[1.0], [2.0]];
        let y = Values::Multi(vec![array![[0.0], [0.0]], array![[0.0, 0.0], [0.0, 0.0]]]);
        let feed = Feed::new(false, false, DataId::Train, &x, &y);
        match net.forward(&mut session(), &feed).unwrap() {
            Values::Multi(heads) => {
                assert_eq!(heads.len(), 2);
                assert_eq!(heads[0].shape(), &[2, 1]);
                assert_eq!(heads[1].shape(), &[2, 2]);
            }
            Values::Single(_) => panic!("expected multi output"),
        }
    }

    #[test]
    fn dropout_off_passes_are_deterministic() {
        let mut net = LinearNet::new(1, 1).dropout(0.5).seed(5);
        let mut rng = StdRng::seed_from_u64(9);
        net.initialize(&mut rng).unwrap();
        let x = array![[1.0], [2.0]];
        let y = Values::Single(array![[0.0], [0.0]]);
        let mut sess = session();
        let feed = Feed::new(false, false, DataId::Test, &x, &y);
        let a = net.forward(&mut sess, &feed).unwrap();
        let b = net.forward(&mut sess, &feed).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn dropout_on_passes_average_toward_deterministic_output() {
        let mut net = LinearNet::new(4, 1).dropout(0.3).seed(13);
        let mut rng = StdRng::seed_from_u64(17);
        net.initialize(&mut rng).unwrap();
        let x = array![[1.0, -0.5, 2.0, 0.25]];
        let y = Values::Single(array![[0.0]]);
        let mut sess = session();

        let det_feed = Feed::new(false, false, DataId::Test, &x, &y);
        let det = match net.forward(&mut sess, &det_feed).unwrap() {
            Values::Single(o) => o[[0, 0]],
            Values::Multi(_) => unreachable!(),
        };

        let mut samples = Vec::new();
        for _ in 0..4000 {
            let feed = Feed::new(false, true, DataId::Test, &x, &y);
            match net.forward(&mut sess, &feed).unwrap() {
                Values::Single(o) => samples.push(o[[0, 0]]),
                Values::Multi(_) => unreachable!(),
            }
        }
        let mean = samples.iter().sum::<f32>() / samples.len() as f32;
        assert_relative_eq!(mean, det, epsilon = 0.1 * det.abs().max(0.1));
    }

    #[test]
    fn wrong_input_width_is_a_shape_error() {
        let net = LinearNet::new(3, 1);
        let x = array![[1.0, 2.0]];
        let y = Values::Single(array![[0.0]]);
        let feed = Feed::new(false, false, DataId::Train, &x, &y);
        assert!(matches!(
            net.forward(&mut session(), &feed),
            Err(Error::ShapeMismatch { .. })
        ));
    }
}
