use anyhow::Result;
use derive_builder::Builder;
use log::debug;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::Serialize;

use crate::error::InvalidInputError;
use crate::rbm::Matrix;
use crate::util::VecMath;

pub const DEFAULT_LEARNING_RATE: f64 = 0.5;

#[derive(Builder, Clone, Debug, PartialEq, Serialize)]
#[builder(default)]
pub struct RbmParams {
    /// The step size of each contrastive divergence update.
    pub learning_rate: f64,
    /// The standard deviation of the zero-mean Gaussian
    /// that the initial weights and biases are drawn from.
    /// Must be finite and non-negative.
    pub init_std_dev: f64,
}

impl Default for RbmParams {
    fn default() -> Self {
        RbmParams {
            learning_rate: DEFAULT_LEARNING_RATE,
            init_std_dev: 1.0,
        }
    }
}

/// A Restricted Boltzmann Machine over binary visible and hidden units.
///
/// The weights are stored visible × hidden. Every vector argument is
/// checked against the layer it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rbm {
    weights: Matrix,
    visible_bias: Vec<f64>,
    hidden_bias: Vec<f64>,
    learning_rate: f64,
}

/// e^z / (1 + e^z), without overflowing for large |z|.
fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// ln(1 + e^z), without overflowing for large z.
fn softplus(z: f64) -> f64 {
    z.max(0.0) + (-z.abs()).exp().ln_1p()
}

fn check_length(what: &'static str, expected: usize, vector: &[f64]) -> Result<(), InvalidInputError> {
    if vector.len() != expected {
        return Err(InvalidInputError::LengthMismatch {
            what,
            expected,
            actual: vector.len(),
        });
    }
    Ok(())
}

fn check_learning_rate(learning_rate: f64) -> Result<(), InvalidInputError> {
    if !(learning_rate.is_finite() && learning_rate > 0.0) {
        return Err(InvalidInputError::InvalidParameter {
            name: "learning rate",
            value: learning_rate.to_string(),
        });
    }
    Ok(())
}

fn check_init_std_dev(std_dev: f64) -> Result<(), InvalidInputError> {
    // zero is allowed and starts every weight and bias at exactly 0
    if !(std_dev.is_finite() && std_dev >= 0.0) {
        return Err(InvalidInputError::InvalidParameter {
            name: "initial standard deviation",
            value: std_dev.to_string(),
        });
    }
    Ok(())
}

fn bernoulli<R: Rng + ?Sized>(probs: &[f64], rng: &mut R) -> Vec<f64> {
    probs
        .iter()
        .map(|&p| if p > rng.gen::<f64>() { 1.0 } else { 0.0 })
        .collect()
}

impl Rbm {
    pub fn new<R: Rng + ?Sized>(n_visible: usize, n_hidden: usize, rng: &mut R) -> Result<Self> {
        Self::with_params(n_visible, n_hidden, &RbmParams::default(), rng)
    }

    /// Draw every weight, then every hidden bias, then every
    /// visible bias from Normal(0, `params.init_std_dev`).
    pub fn with_params<R: Rng + ?Sized>(
        n_visible: usize,
        n_hidden: usize,
        params: &RbmParams,
        rng: &mut R,
    ) -> Result<Self> {
        if n_visible == 0 || n_hidden == 0 {
            return Err(InvalidInputError::InvalidParameter {
                name: "layer size",
                value: format!("{n_visible} visible, {n_hidden} hidden"),
            }
            .into());
        }
        check_learning_rate(params.learning_rate)?;
        check_init_std_dev(params.init_std_dev)?;

        let normal = Normal::new(0.0, params.init_std_dev)?;

        let weights = Matrix::from_fn(n_visible, n_hidden, |_, _| normal.sample(rng));
        let hidden_bias = (0..n_hidden).map(|_| normal.sample(rng)).collect();
        let visible_bias = (0..n_visible).map(|_| normal.sample(rng)).collect();

        Ok(Rbm {
            weights,
            visible_bias,
            hidden_bias,
            learning_rate: params.learning_rate,
        })
    }

    /// Assemble a machine from existing parameters.
    pub fn from_parts(
        weights: Matrix,
        visible_bias: Vec<f64>,
        hidden_bias: Vec<f64>,
        learning_rate: f64,
    ) -> Result<Self> {
        if weights.num_rows == 0 || weights.num_cols == 0 {
            return Err(InvalidInputError::InvalidParameter {
                name: "layer size",
                value: format!("{} visible, {} hidden", weights.num_rows, weights.num_cols),
            }
            .into());
        }
        check_length("visible bias", weights.num_rows, &visible_bias)?;
        check_length("hidden bias", weights.num_cols, &hidden_bias)?;
        check_learning_rate(learning_rate)?;

        Ok(Rbm {
            weights,
            visible_bias,
            hidden_bias,
            learning_rate,
        })
    }

    pub fn n_visible(&self) -> usize {
        self.visible_bias.len()
    }

    pub fn n_hidden(&self) -> usize {
        self.hidden_bias.len()
    }

    pub fn weights(&self) -> &Matrix {
        &self.weights
    }

    pub fn visible_bias(&self) -> &[f64] {
        &self.visible_bias
    }

    pub fn hidden_bias(&self) -> &[f64] {
        &self.hidden_bias
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// P(h_j = 1 | x) for every hidden unit.
    pub fn activate_hidden(&self, x: &[f64]) -> Result<Vec<f64>> {
        check_length("visible vector", self.n_visible(), x)?;
        let mut activation = self.weights.vec_mul(x);
        activation.add(&self.hidden_bias);
        Ok(activation.into_iter().map(sigmoid).collect())
    }

    /// P(x_i = 1 | h) for every visible unit.
    pub fn activate_visible(&self, h: &[f64]) -> Result<Vec<f64>> {
        check_length("hidden vector", self.n_hidden(), h)?;
        let mut activation = self.weights.mul_vec(h);
        activation.add(&self.visible_bias);
        Ok(activation.into_iter().map(sigmoid).collect())
    }

    /// A binary hidden vector: unit j is 1 exactly when P(h_j = 1 | x)
    /// exceeds an independent uniform draw.
    pub fn sample_hidden<R: Rng + ?Sized>(&self, x: &[f64], rng: &mut R) -> Result<Vec<f64>> {
        Ok(bernoulli(&self.activate_hidden(x)?, rng))
    }

    pub fn sample_visible<R: Rng + ?Sized>(&self, h: &[f64], rng: &mut R) -> Result<Vec<f64>> {
        Ok(bernoulli(&self.activate_visible(h)?, rng))
    }

    /// One step of contrastive divergence (CD-1) on the training vector `x`.
    pub fn update<R: Rng + ?Sized>(&mut self, x: &[f64], rng: &mut R) -> Result<()> {
        self.contrastive_divergence(x, rng)?;
        Ok(())
    }

    /// Runs CD-1 and returns the sampled reconstruction it trained against.
    fn contrastive_divergence<R: Rng + ?Sized>(
        &mut self,
        x: &[f64],
        rng: &mut R,
    ) -> Result<Vec<f64>> {
        let h1 = self.sample_hidden(x, rng)?;
        let x_reconstr = self.sample_visible(&h1, rng)?;
        let h2_probs = self.activate_hidden(&x_reconstr)?;

        let rate = self.learning_rate;

        for visible_idx in 0..self.n_visible() {
            for hidden_idx in 0..self.n_hidden() {
                let gradient = x[visible_idx] * h1[hidden_idx]
                    - x_reconstr[visible_idx] * h2_probs[hidden_idx];
                self.weights.add(visible_idx, hidden_idx, rate * gradient);
            }
        }

        let mut visible_step = x.to_vec();
        visible_step.sub(&x_reconstr);
        visible_step.scale(rate);
        self.visible_bias.add(&visible_step);

        let mut hidden_step = h1;
        hidden_step.sub(&h2_probs);
        hidden_step.scale(rate);
        self.hidden_bias.add(&hidden_step);

        Ok(x_reconstr)
    }

    /// The textbook energy: -xᵗa - hᵗb - xᵗWh.
    pub fn raw_energy(&self, x: &[f64], h: &[f64]) -> Result<f64> {
        check_length("visible vector", self.n_visible(), x)?;
        check_length("hidden vector", self.n_hidden(), h)?;

        let interaction = x.dot(&self.weights.mul_vec(h));
        Ok(-x.dot(&self.visible_bias) - h.dot(&self.hidden_bias) - interaction)
    }

    /// exp(raw_energy(x, h)), which is always positive.
    ///
    /// Note that this exponentiates the energy as-is rather than its
    /// negation, so it is not proportional to P(x, h).
    pub fn energy(&self, x: &[f64], h: &[f64]) -> Result<f64> {
        Ok(self.raw_energy(x, h)?.exp())
    }

    /// F(x) = -ln Σ_h exp(-raw_energy(x, h)), with the hidden layer summed out.
    pub fn free_energy(&self, x: &[f64]) -> Result<f64> {
        check_length("visible vector", self.n_visible(), x)?;

        let mut activation = self.weights.vec_mul(x);
        activation.add(&self.hidden_bias);
        let hidden_term: f64 = activation.into_iter().map(softplus).sum();

        Ok(-x.dot(&self.visible_bias) - hidden_term)
    }

    /// A single sampled pass down and back up: sample_visible(sample_hidden(x)).
    pub fn reconstruct<R: Rng + ?Sized>(&self, x: &[f64], rng: &mut R) -> Result<Vec<f64>> {
        let h = self.sample_hidden(x, rng)?;
        self.sample_visible(&h, rng)
    }

    /// The squared distance between `x` and one reconstruction of it.
    pub fn reconstruction_error<R: Rng + ?Sized>(&self, x: &[f64], rng: &mut R) -> Result<f64> {
        let reconstruction = self.reconstruct(x, rng)?;
        Ok(squared_distance(x, &reconstruction))
    }

    /// Call [`Rbm::update`] once per sample, `epochs` times over.
    ///
    /// Returns the mean squared reconstruction error of each epoch,
    /// measured against the reconstructions the updates trained on.
    pub fn train<R: Rng + ?Sized>(
        &mut self,
        samples: &[Vec<f64>],
        epochs: usize,
        rng: &mut R,
    ) -> Result<Vec<f64>> {
        for sample in samples {
            check_length("training sample", self.n_visible(), sample)?;
        }

        let mut errors = Vec::with_capacity(epochs);
        for epoch in 0..epochs {
            let mut total_error = 0.0;
            for sample in samples {
                let reconstruction = self.contrastive_divergence(sample, rng)?;
                total_error += squared_distance(sample, &reconstruction);
            }

            let mean_error = total_error / samples.len().max(1) as f64;
            debug!("rbm epoch {}/{}: reconstruction error {:.6}", epoch + 1, epochs, mean_error);
            errors.push(mean_error);
        }

        Ok(errors)
    }
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(a, b)| (a - b).powi(2)).sum()
}
