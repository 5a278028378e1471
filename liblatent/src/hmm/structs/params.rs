use derive_builder::Builder;
use serde::Serialize;

use super::Hmm;
use crate::util::Nats;

/// Which flavor of the Baum-Welch re-estimation step to run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum Variant {
    /// Reproduces the legacy recurrences: pairwise posteriors stop
    /// one step before the last transition and pair `Bwd[t+1]` with
    /// `obs[t+1]`, and the start distribution is re-estimated from
    /// forward row 1.
    #[default]
    Reference,
    /// Exact expectation-maximization for the model's emission
    /// convention. Log-likelihood never decreases between iterations.
    Textbook,
}

#[derive(Builder, Clone, Debug, PartialEq, Serialize)]
#[builder(default)]
pub struct BaumWelchParams {
    /// The number of EM rounds to run.
    pub iterations: usize,
    /// Emit a progress notice every this many iterations (0 disables it).
    pub report_interval: usize,
    pub variant: Variant,
    /// Raise every re-estimated probability to at least this value before
    /// its row is renormalized. With the default of 0.0 there is no floor,
    /// and a state whose expected occupancy reaches zero fails the run
    /// with a `NumericDegeneracyError`.
    pub min_prob: f64,
}

impl Default for BaumWelchParams {
    fn default() -> Self {
        BaumWelchParams {
            iterations: 1000,
            report_interval: 100,
            variant: Variant::Reference,
            min_prob: 0.0,
        }
    }
}

/// A snapshot handed to the Baum-Welch progress callback at the start of
/// each iteration, before that iteration's re-estimation.
pub struct BaumWelchProgress<'a, S, O> {
    pub iteration: usize,
    pub log_likelihood: Nats,
    pub model: &'a Hmm<S, O>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::assert;

    #[test]
    fn test_builder_defaults() -> anyhow::Result<()> {
        let params = BaumWelchParamsBuilder::default().build()?;
        assert!(params == BaumWelchParams::default());
        assert!(params.iterations == 1000);
        assert!(params.variant == Variant::Reference);
        assert!(params.min_prob == 0.0);

        let params = BaumWelchParamsBuilder::default()
            .iterations(10)
            .variant(Variant::Textbook)
            .min_prob(1e-6)
            .build()?;
        assert!(params.iterations == 10);
        assert!(params.report_interval == 100);
        assert!(params.variant == Variant::Textbook);
        assert!(params.min_prob == 1e-6);
        Ok(())
    }
}
