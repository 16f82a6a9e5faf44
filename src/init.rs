//! Weight initializer registry
//!
//! String identifiers resolve to a closed enumeration of samplers; a
//! directly supplied callable passes through unchanged. Unknown names are
//! a configuration error.

use crate::{Error, Result};
use ndarray::Array2;
use rand::{Rng, RngCore};
use rand_distr::{Distribution, StandardNormal};
use std::sync::Arc;

type InitFn = dyn Fn(usize, usize, &mut dyn RngCore) -> Array2<f32> + Send + Sync;

/// A weight-matrix initializer.
#[derive(Clone)]
pub enum Initializer {
    Zeros,
    HeNormal,
    HeUniform,
    LecunNormal,
    LecunUniform,
    GlorotNormal,
    GlorotUniform,
    Orthogonal,
    /// A user-supplied sampler, passed through untouched.
    Custom(Arc<InitFn>),
}

impl Initializer {
    /// Resolve an initializer identifier.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "zeros" => Ok(Initializer::Zeros),
            "He normal" => Ok(Initializer::HeNormal),
            "He uniform" => Ok(Initializer::HeUniform),
            "LeCun normal" => Ok(Initializer::LecunNormal),
            "LeCun uniform" => Ok(Initializer::LecunUniform),
            "Glorot normal" => Ok(Initializer::GlorotNormal),
            "Glorot uniform" => Ok(Initializer::GlorotUniform),
            "Orthogonal" => Ok(Initializer::Orthogonal),
            _ => Err(Error::UnknownInitializer(name.to_string())),
        }
    }

    /// Wrap a callable as an initializer.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(usize, usize, &mut dyn RngCore) -> Array2<f32> + Send + Sync + 'static,
    {
        Initializer::Custom(Arc::new(f))
    }

    /// Sample a `(fan_in, fan_out)` weight matrix.
    pub fn sample(&self, fan_in: usize, fan_out: usize, rng: &mut dyn RngCore) -> Array2<f32> {
        match self {
            Initializer::Zeros => Array2::zeros((fan_in, fan_out)),
            Initializer::HeNormal => scaled_normal(fan_in, fan_out, 2.0 / fan_in as f32, rng),
            Initializer::HeUniform => scaled_uniform(fan_in, fan_out, 2.0 / fan_in as f32, rng),
            Initializer::LecunNormal => scaled_normal(fan_in, fan_out, 1.0 / fan_in as f32, rng),
            Initializer::LecunUniform => scaled_uniform(fan_in, fan_out, 1.0 / fan_in as f32, rng),
            Initializer::GlorotNormal => {
                scaled_normal(fan_in, fan_out, 2.0 / (fan_in + fan_out) as f32, rng)
            }
            Initializer::GlorotUniform => {
                scaled_uniform(fan_in, fan_out, 2.0 / (fan_in + fan_out) as f32, rng)
            }
            Initializer::Orthogonal => orthogonal(fan_in, fan_out, rng),
            Initializer::Custom(f) => f(fan_in, fan_out, rng),
        }
    }
}

impl std::fmt::Debug for Initializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Initializer::Zeros => "zeros",
            Initializer::HeNormal => "He normal",
            Initializer::HeUniform => "He uniform",
            Initializer::LecunNormal => "LeCun normal",
            Initializer::LecunUniform => "LeCun uniform",
            Initializer::GlorotNormal => "Glorot normal",
            Initializer::GlorotUniform => "Glorot uniform",
            Initializer::Orthogonal => "Orthogonal",
            Initializer::Custom(_) => "custom",
        };
        f.write_str(name)
    }
}

/// Normal samples with variance `scale`.
fn scaled_normal(fan_in: usize, fan_out: usize, scale: f32, rng: &mut dyn RngCore) -> Array2<f32> {
    let std = scale.sqrt();
    Array2::from_shape_fn((fan_in, fan_out), |_| {
        let z: f32 = StandardNormal.sample(&mut *rng);
        z * std
    })
}

/// Uniform samples on `[-limit, limit]` with variance `scale`.
fn scaled_uniform(fan_in: usize, fan_out: usize, scale: f32, rng: &mut dyn RngCore) -> Array2<f32> {
    let limit = (3.0 * scale).sqrt();
    Array2::from_shape_fn((fan_in, fan_out), |_| rng.gen_range(-limit..limit))
}

/// Orthonormal columns via Gram-Schmidt on a Gaussian matrix.
fn orthogonal(fan_in: usize, fan_out: usize, rng: &mut dyn RngCore) -> Array2<f32> {
    let mut m = scaled_normal(fan_in, fan_out, 1.0, rng);
    for j in 0..fan_out.min(fan_in) {
        for k in 0..j {
            let dot: f32 = (0..fan_in).map(|i| m[[i, j]] * m[[i, k]]).sum();
            for i in 0..fan_in {
                m[[i, j]] -= dot * m[[i, k]];
            }
        }
        let norm: f32 = (0..fan_in).map(|i| m[[i, j]] * m[[i, j]]).sum::<f32>().sqrt();
        if norm > 1e-8 {
            for i in 0..fan_in {
                m[[i, j]] /= norm;
            }
        }
    }
    m
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn zeros_is_all_zero() {
        let mut rng = StdRng::seed_from_u64(0);
        let w = Initializer::Zeros.sample(3, 2, &mut rng);
        assert!(w.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn uniform_samples_stay_within_limit() {
        let mut rng = StdRng::seed_from_u64(1);
        let w = Initializer::GlorotUniform.sample(10, 10, &mut rng);
        let limit = (3.0 * 2.0 / 20.0_f32).sqrt();
        assert!(w.iter().all(|&x| x.abs() <= limit));
    }

    #[test]
    fn he_normal_variance_is_roughly_two_over_fan_in() {
        let mut rng = StdRng::seed_from_u64(2);
        let fan_in = 200;
        let w = Initializer::HeNormal.sample(fan_in, 50, &mut rng);
        let var = w.iter().map(|x| x * x).sum::<f32>() / w.len() as f32;
        assert_relative_eq!(var, 2.0 / fan_in as f32, max_relative = 0.15);
    }

    #[test]
    fn orthogonal_columns_are_orthonormal() {
        let mut rng = StdRng::seed_from_u64(3);
        let w = Initializer::Orthogonal.sample(8, 4, &mut rng);
        for j in 0..4 {
            let norm: f32 = (0..8).map(|i| w[[i, j]] * w[[i, j]]).sum();
            assert_relative_eq!(norm, 1.0, epsilon = 1e-4);
            for k in 0..j {
                let dot: f32 = (0..8).map(|i| w[[i, j]] * w[[i, k]]).sum();
                assert_relative_eq!(dot, 0.0, epsilon = 1e-4);
            }
        }
    }

    #[test]
    fn custom_initializer_passes_through() {
        let init = Initializer::custom(|fi, fo, _| Array2::ones((fi, fo)));
        let mut rng = StdRng::seed_from_u64(4);
        let w = init.sample(2, 2, &mut rng);
        assert!(w.iter().all(|&x| x == 1.0));
    }

    #[test]
    fn unknown_name_is_a_configuration_error() {
        assert!(matches!(
            Initializer::from_name("Xavier"),
            Err(crate::Error::UnknownInitializer(_))
        ));
    }
}
