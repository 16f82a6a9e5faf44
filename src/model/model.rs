//! Training orchestrator
//!
//! [`Model`] wires a data provider and a network to one optimizer and runs
//! the training/evaluation loop: compile fixes the objective and optimizer
//! choice, train opens a session, dispatches to the stochastic or the batch
//! strategy, and reports the accumulated history and final state.

use super::{CallbackList, LossHistory, TrainState};
use crate::data::DataProvider;
use crate::graph::{DataId, Feed, Network, Session, SessionOptions, Values};
use crate::loss::Loss;
use crate::metrics::Metric;
use crate::optim::{
    minimize, BatchObjective, Decay, DecayConfig, Optimizer, OptimizerChoice, StopCriteria,
};
use crate::{Error, Result};
use ndarray::Array1;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::io::Write;

/// Fixed number of stochastic forward passes for the Monte-Carlo dropout
/// uncertainty estimate.
const UNCERTAINTY_SAMPLES: usize = 1000;

/// Compile-time configuration: optimizer, learning rate, batch shape, loss
/// and metric identifiers, optional decay and loss weights.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompileConfig {
    pub optimizer: String,
    pub lr: f32,
    pub batch_size: usize,
    pub ntest: usize,
    pub loss: String,
    pub decay: Option<DecayConfig>,
    pub loss_weights: Option<Vec<f32>>,
    #[serde(skip)]
    metrics: Vec<Metric>,
}

impl CompileConfig {
    pub fn new(optimizer: impl Into<String>, lr: f32, batch_size: usize, ntest: usize) -> Self {
        Self {
            optimizer: optimizer.into(),
            lr,
            batch_size,
            ntest,
            loss: "MSE".to_string(),
            decay: None,
            loss_weights: None,
            metrics: Vec::new(),
        }
    }

    pub fn loss(mut self, loss: impl Into<String>) -> Self {
        self.loss = loss.into();
        self
    }

    /// Resolve metric identifiers through the registry. Unknown names fail
    /// here, at lookup time.
    pub fn metrics(mut self, names: &[&str]) -> Result<Self> {
        for name in names {
            self.metrics.push(Metric::from_name(name)?);
        }
        Ok(self)
    }

    /// Append an already-built metric (e.g. a callable passed through).
    pub fn metric(mut self, metric: Metric) -> Self {
        self.metrics.push(metric);
        self
    }

    pub fn decay(mut self, decay: DecayConfig) -> Self {
        self.decay = Some(decay);
        self
    }

    pub fn loss_weights(mut self, weights: Vec<f32>) -> Self {
        self.loss_weights = Some(weights);
        self
    }
}

/// Run-time options for one `train` call.
pub struct TrainOptions {
    pub epochs: u64,
    pub validation_every: u64,
    pub uncertainty: bool,
    /// Accepted for signature compatibility; the reference behavior keeps
    /// this threshold inert.
    pub errstop: Option<f32>,
    pub callbacks: CallbackList,
}

impl TrainOptions {
    pub fn new(epochs: u64) -> Self {
        Self {
            epochs,
            validation_every: 1000,
            uncertainty: false,
            errstop: None,
            callbacks: CallbackList::new(),
        }
    }

    pub fn validation_every(mut self, every: u64) -> Self {
        self.validation_every = every.max(1);
        self
    }

    pub fn uncertainty(mut self, enabled: bool) -> Self {
        self.uncertainty = enabled;
        self
    }

    pub fn errstop(mut self, threshold: f32) -> Self {
        self.errstop = Some(threshold);
        self
    }

    pub fn callback<C: super::Callback + 'static>(mut self, callback: C) -> Self {
        self.callbacks.add(callback);
        self
    }
}

/// Objective state fixed by `compile` for the rest of the model's life.
struct Compiled {
    choice: OptimizerChoice,
    lr: f32,
    batch_size: usize,
    ntest: usize,
    loss: Loss,
    metrics: Vec<Metric>,
    decay: Option<Decay>,
    loss_weights: Option<Vec<f32>>,
}

/// The training harness over one data provider and one network.
pub struct Model<D: DataProvider, N: Network> {
    data: D,
    net: N,
    compiled: Option<Compiled>,
    train_state: TrainState,
    losshistory: LossHistory,
    rng: StdRng,
}

impl<D: DataProvider, N: Network> Model<D, N> {
    pub fn new(data: D, net: N) -> Self {
        Self {
            data,
            net,
            compiled: None,
            train_state: TrainState::new(),
            losshistory: LossHistory::new(),
            rng: StdRng::from_entropy(),
        }
    }

    /// Fix the parameter-initialization seed, for reproducible runs.
    pub fn seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Fix the objective and optimizer choice. Unknown optimizer, decay, or
    /// loss identifiers fail here, before any session work. Compiling again
    /// fully replaces the previous configuration.
    pub fn compile(&mut self, config: CompileConfig) -> Result<()> {
        println!("Compiling model...");

        let choice = OptimizerChoice::from_name(&config.optimizer)?;
        let loss = Loss::from_name(&config.loss)?;
        let decay = match &config.decay {
            Some(spec) => Some(Decay::from_config(spec, config.lr)?),
            None => None,
        };
        if let Some(weights) = &config.loss_weights {
            self.losshistory.update_loss_weights(weights.clone());
        }

        self.compiled = Some(Compiled {
            choice,
            lr: config.lr,
            batch_size: config.batch_size,
            ntest: config.ntest,
            loss,
            metrics: config.metrics,
            decay,
            loss_weights: config.loss_weights,
        });
        Ok(())
    }

    /// Run one training session and return the accumulated history and the
    /// final state. The session is released on every exit path.
    pub fn train(&mut self, mut options: TrainOptions) -> Result<(LossHistory, TrainState)> {
        if self.compiled.is_none() {
            return Err(Error::NotCompiled);
        }
        println!("Training model...");

        // Fresh counters for this run
        self.train_state = TrainState::new();

        let mut session = Session::open(SessionOptions::default().allow_growth(true))?;
        self.net.initialize(&mut self.rng)?;

        let compiled = self
            .compiled
            .as_mut()
            .ok_or(Error::NotCompiled)?;
        // Initialization rewinds the decay counter along with the weights.
        if let Some(decay) = compiled.decay.as_mut() {
            decay.reset();
        }
        let outcome = match compiled.choice {
            OptimizerChoice::Gradient(kind) => {
                let mut optimizer = kind.build(compiled.lr);
                train_sgd(
                    &mut self.data,
                    &mut self.net,
                    compiled,
                    &mut self.train_state,
                    &mut self.losshistory,
                    &mut session,
                    optimizer.as_mut(),
                    &mut options,
                )
            }
            OptimizerChoice::QuasiNewton(method) => train_batch(
                &mut self.data,
                &mut self.net,
                compiled,
                &mut self.train_state,
                &mut self.losshistory,
                &mut session,
                method,
                &options,
            ),
        };
        // On error the session is still dropped, releasing its arena.
        outcome?;

        session.close();
        Ok((self.losshistory.clone(), self.train_state.clone()))
    }

    pub fn train_state(&self) -> &TrainState {
        &self.train_state
    }

    pub fn loss_history(&self) -> &LossHistory {
        &self.losshistory
    }

    pub fn net(&self) -> &N {
        &self.net
    }

    pub fn data(&self) -> &D {
        &self.data
    }
}

/// Stack the provider's loss components with the regularization penalty
/// and apply the compiled loss weights elementwise.
fn weighted_components<D: DataProvider, N: Network>(
    data: &D,
    net: &N,
    compiled: &Compiled,
    targets: &Values,
    outputs: &Values,
) -> Result<Vec<f32>> {
    let mut components = data.losses(targets, outputs, compiled.loss);
    if let Some(reg) = net.regularizer() {
        components.push(reg.penalty(&net.params()));
    }
    if let Some(weights) = &compiled.loss_weights {
        if weights.len() != components.len() {
            return Err(Error::LossWeightMismatch {
                expected: components.len(),
                got: weights.len(),
            });
        }
        for (c, w) in components.iter_mut().zip(weights) {
            *c *= w;
        }
    }
    Ok(components)
}

/// Weights for the provider's components alone (the slice the cotangent
/// call sees), with the regularizer weight split off.
fn split_weights<N: Network>(
    net: &N,
    compiled: &Compiled,
    n_provider: usize,
) -> (Vec<f32>, f32) {
    match &compiled.loss_weights {
        Some(weights) => {
            let provider = weights.iter().take(n_provider).copied().collect();
            let reg = if net.regularizer().is_some() {
                weights.get(n_provider).copied().unwrap_or(1.0)
            } else {
                1.0
            };
            (provider, reg)
        }
        None => (vec![1.0; n_provider], 1.0),
    }
}

/// Objective gradient for one feed: loss cotangents pulled back through the
/// network, plus the weighted regularization gradient.
fn objective_gradient<D: DataProvider, N: Network>(
    data: &D,
    net: &N,
    compiled: &Compiled,
    session: &mut Session,
    feed: &Feed<'_>,
    targets: &Values,
    outputs: &Values,
) -> Result<Array1<f32>> {
    let n_provider = data.losses(targets, outputs, compiled.loss).len();
    let (provider_weights, reg_weight) = split_weights(net, compiled, n_provider);
    let cotangents = data.loss_cotangents(targets, outputs, compiled.loss, &provider_weights);
    let mut grad = net.pullback(session, feed, &cotangents)?;
    if let Some(reg) = net.regularizer() {
        grad += &(reg.gradient(&net.params()) * reg_weight);
    }
    Ok(grad)
}

/// One stochastic update on the current training batch.
fn sgd_update<D: DataProvider, N: Network>(
    data: &mut D,
    net: &mut N,
    compiled: &Compiled,
    state: &TrainState,
    session: &mut Session,
    optimizer: &mut dyn Optimizer,
) -> Result<()> {
    let (x, y) = match (&state.x_train, &state.y_train) {
        (Some(x), Some(y)) => (x, y),
        _ => return Err(Error::NoData("no training batch drawn".to_string())),
    };
    let feed = Feed::new(true, true, DataId::Train, x, y);
    let outputs = net.forward(session, &feed)?;
    let grad = objective_gradient(data, net, compiled, session, &feed, y, &outputs)?;

    let mut params = net.params();
    optimizer.step(&mut params, &grad);
    net.set_params(params.view())
}

/// The stochastic training loop.
#[allow(clippy::too_many_arguments)]
fn train_sgd<D: DataProvider, N: Network>(
    data: &mut D,
    net: &mut N,
    compiled: &mut Compiled,
    state: &mut TrainState,
    history: &mut LossHistory,
    session: &mut Session,
    optimizer: &mut dyn Optimizer,
    options: &mut TrainOptions,
) -> Result<()> {
    // The held-out split is drawn once and fixed for the whole run.
    let (x_test, y_test) = data.test(compiled.ntest)?;
    state.update_data_test(x_test, y_test);

    options.callbacks.on_train_begin(state);

    for i in 0..options.epochs {
        options.callbacks.on_epoch_begin(state);
        options.callbacks.on_batch_begin(state);

        let (x, y) = data.train_next_batch(compiled.batch_size)?;
        state.update_data_train(x, y);

        if let Some(decay) = compiled.decay.as_mut() {
            optimizer.set_lr(decay.next_lr());
        }
        sgd_update(data, net, compiled, state, session, optimizer)?;

        state.epoch += 1;
        state.step += 1;

        if i % options.validation_every == 0 || i + 1 == options.epochs {
            evaluate(data, net, compiled, state, session, options.uncertainty)?;
            history.add(
                i,
                state.loss_train.clone(),
                state.loss_test.clone(),
                state.metrics_test.clone(),
            );
            println!(
                "Epoch: {}, loss: {:?}, val_loss: {:?}, val_metric: {:?}",
                i, state.loss_train, state.loss_test, state.metrics_test
            );
            std::io::stdout().flush().ok();
            // errstop: threshold accepted but intentionally not acted on.
        }

        options.callbacks.on_batch_end(state);
        options.callbacks.on_epoch_end(state);
    }

    options.callbacks.on_train_end(state);
    Ok(())
}

/// Adapter exposing the compiled objective over flat parameters to the
/// batch methods. Engine errors surface after the minimize call.
struct BatchProblem<'a, D: DataProvider, N: Network> {
    data: &'a D,
    net: &'a mut N,
    compiled: &'a Compiled,
    session: &'a mut Session,
    x: &'a ndarray::Array2<f32>,
    y: &'a Values,
    error: Option<Error>,
}

impl<D: DataProvider, N: Network> BatchProblem<'_, D, N> {
    fn try_value(&mut self, theta: &Array1<f32>) -> Result<f32> {
        self.net.set_params(theta.view())?;
        let feed = Feed::new(true, true, DataId::Train, self.x, self.y);
        let outputs = self.net.forward(self.session, &feed)?;
        let components =
            weighted_components(self.data, self.net, self.compiled, self.y, &outputs)?;
        Ok(components.iter().sum())
    }

    fn try_gradient(&mut self, theta: &Array1<f32>) -> Result<Array1<f32>> {
        self.net.set_params(theta.view())?;
        let feed = Feed::new(true, true, DataId::Train, self.x, self.y);
        let outputs = self.net.forward(self.session, &feed)?;
        objective_gradient(
            self.data,
            self.net,
            self.compiled,
            self.session,
            &feed,
            self.y,
            &outputs,
        )
    }
}

impl<D: DataProvider, N: Network> BatchObjective for BatchProblem<'_, D, N> {
    fn value(&mut self, theta: &Array1<f32>) -> f32 {
        match self.try_value(theta) {
            Ok(v) => v,
            Err(e) => {
                self.error.get_or_insert(e);
                f32::INFINITY
            }
        }
    }

    fn gradient(&mut self, theta: &Array1<f32>) -> Array1<f32> {
        match self.try_gradient(theta) {
            Ok(g) => g,
            Err(e) => {
                self.error.get_or_insert(e);
                Array1::zeros(theta.len())
            }
        }
    }
}

/// The batch path: one fixed minibatch, one minimize-to-convergence call,
/// one evaluation, one history record.
#[allow(clippy::too_many_arguments)]
fn train_batch<D: DataProvider, N: Network>(
    data: &mut D,
    net: &mut N,
    compiled: &Compiled,
    state: &mut TrainState,
    history: &mut LossHistory,
    session: &mut Session,
    method: crate::optim::QuasiNewtonMethod,
    options: &TrainOptions,
) -> Result<()> {
    let (x, y) = data.train_next_batch(compiled.batch_size)?;
    state.update_data_train(x.clone(), y.clone());

    let x0 = net.params();
    let mut problem = BatchProblem {
        data: &*data,
        net: &mut *net,
        compiled,
        session: &mut *session,
        x: &x,
        y: &y,
        error: None,
    };
    let solution = minimize(method, &mut problem, x0, &StopCriteria::default());
    if let Some(e) = problem.error {
        return Err(e);
    }
    net.set_params(solution.x.view())?;

    let (x_test, y_test) = data.test(compiled.ntest)?;
    state.update_data_test(x_test, y_test);
    evaluate(data, net, compiled, state, session, options.uncertainty)?;
    history.add(
        1,
        state.loss_train.clone(),
        state.loss_test.clone(),
        state.metrics_test.clone(),
    );
    println!(
        "loss: {:?}, val_loss: {:?}, val_metric: {:?}",
        state.loss_train, state.loss_test, state.metrics_test
    );
    std::io::stdout().flush().ok();
    Ok(())
}

/// The evaluation procedure: deterministic passes over the train and test
/// splits, or Monte-Carlo dropout sampling over the test split; then metric
/// computation and the update-best rule.
fn evaluate<D: DataProvider, N: Network>(
    data: &mut D,
    net: &mut N,
    compiled: &Compiled,
    state: &mut TrainState,
    session: &mut Session,
    uncertainty: bool,
) -> Result<()> {
    let (x_train, y_train) = match (&state.x_train, &state.y_train) {
        (Some(x), Some(y)) => (x, y),
        _ => return Err(Error::NoData("no training batch drawn".to_string())),
    };
    let feed = Feed::new(false, false, DataId::Train, x_train, y_train);
    let outputs = net.forward(session, &feed)?;
    state.loss_train = weighted_components(data, net, compiled, y_train, &outputs)?;
    state.y_pred_train = Some(outputs);

    let (x_test, y_test) = match (&state.x_test, &state.y_test) {
        (Some(x), Some(y)) => (x, y),
        _ => return Err(Error::NoData("no test split drawn".to_string())),
    };

    if uncertainty {
        let mut loss_samples: Vec<Vec<f32>> = Vec::with_capacity(UNCERTAINTY_SAMPLES);
        let mut pred_samples: Vec<Values> = Vec::with_capacity(UNCERTAINTY_SAMPLES);
        for _ in 0..UNCERTAINTY_SAMPLES {
            let feed = Feed::new(false, true, DataId::Test, x_test, y_test);
            let outputs = net.forward(session, &feed)?;
            loss_samples.push(weighted_components(data, net, compiled, y_test, &outputs)?);
            pred_samples.push(outputs);
        }
        let n_components = loss_samples[0].len();
        let mut loss_mean = vec![0.0f32; n_components];
        for sample in &loss_samples {
            for (acc, v) in loss_mean.iter_mut().zip(sample) {
                *acc += v;
            }
        }
        for acc in loss_mean.iter_mut() {
            *acc /= UNCERTAINTY_SAMPLES as f32;
        }
        state.loss_test = loss_mean;
        let mean = Values::mean_over(&pred_samples)
            .ok_or_else(|| Error::NoData("no uncertainty samples".to_string()))?;
        state.y_std_test = Values::std_over(&pred_samples, &mean);
        state.y_pred_test = Some(mean);
    } else {
        let feed = Feed::new(false, false, DataId::Test, x_test, y_test);
        let outputs = net.forward(session, &feed)?;
        state.loss_test = weighted_components(data, net, compiled, y_test, &outputs)?;
        state.y_pred_test = Some(outputs);
    }

    // Metric list: outer loop over metrics, inner loop over outputs.
    let y_pred_test = state
        .y_pred_test
        .as_ref()
        .ok_or_else(|| Error::NoData("no test prediction".to_string()))?;
    state.metrics_test = match (y_test, y_pred_test) {
        (Values::Multi(truths), Values::Multi(preds)) => compiled
            .metrics
            .iter()
            .flat_map(|m| {
                truths
                    .iter()
                    .zip(preds.iter())
                    .map(|(t, p)| m.compute(t, p))
                    .collect::<Vec<f32>>()
            })
            .collect(),
        _ => {
            let t = y_test.merged();
            let p = y_pred_test.merged();
            compiled.metrics.iter().map(|m| m.compute(&t, &p)).collect()
        }
    };

    state.update_best();
    Ok(())
}
