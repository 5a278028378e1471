use anyhow::Result;
use serde::Serialize;

use crate::error::InvalidInputError;
use crate::hmm::structs::{Hmm, Label, ProbMap, ProbTable};
use crate::hmm::{backward, forward};
use crate::util::{Nats, Normalize};

/// Everything forward-backward smoothing produces for one observation sequence.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Smoothing<S> {
    pub forward: ProbTable<S>,
    pub backward: ProbTable<S>,
    /// The smoothed state distribution at each of the T + 1 time steps.
    pub posterior: ProbTable<S>,
    pub log_likelihood: Nats,
}

/// Merge forward and backward tables into per-time-step posteriors.
pub fn posterior<S: Label, O: Label>(
    hmm: &Hmm<S, O>,
    forward_table: &ProbTable<S>,
    backward_table: &ProbTable<S>,
    posterior_table: &mut ProbTable<S>,
) -> Result<()> {
    if forward_table.len() != backward_table.len() {
        return Err(InvalidInputError::LengthMismatch {
            what: "backward table",
            expected: forward_table.len(),
            actual: backward_table.len(),
        }
        .into());
    }

    posterior_table.reuse(forward_table.len());

    for time in 0..forward_table.len() {
        let row = snapshot(hmm, forward_table, backward_table, time)?;
        posterior_table.push(row);
    }

    Ok(())
}

fn snapshot<S: Label, O: Label>(
    hmm: &Hmm<S, O>,
    forward_table: &ProbTable<S>,
    backward_table: &ProbTable<S>,
    time: usize,
) -> Result<ProbMap<S>> {
    let mut row = ProbMap::with_capacity(hmm.num_states());
    for state in &hmm.states {
        row.insert(
            state.clone(),
            forward_table.prob(time, state)? * backward_table.prob(time, state)?,
        );
    }
    row.normalize("posterior table", time)?;
    Ok(row)
}

impl<S: Label, O: Label> Hmm<S, O> {
    /// Forward-backward smoothing over the whole sequence.
    pub fn fwd_bwd(&self, obs: &[O]) -> Result<Smoothing<S>> {
        let mut smoothing = Smoothing {
            forward: ProbTable::new(),
            backward: ProbTable::new(),
            posterior: ProbTable::new(),
            log_likelihood: Nats::default(),
        };

        smoothing.log_likelihood = forward(self, obs, &mut smoothing.forward)?;
        backward(self, obs, &mut smoothing.backward)?;
        posterior(
            self,
            &smoothing.forward,
            &smoothing.backward,
            &mut smoothing.posterior,
        )?;

        Ok(smoothing)
    }

    /// The normalized `(state, probability)` pairs at a single time index,
    /// where `time` ranges over `0..=obs.len()`.
    pub fn fwd_bwd_at(&self, obs: &[O], time: usize) -> Result<Vec<(S, f64)>> {
        if time > obs.len() {
            return Err(InvalidInputError::TimeOutOfRange {
                time,
                length: obs.len() + 1,
            }
            .into());
        }

        let mut forward_table = ProbTable::new();
        let mut backward_table = ProbTable::new();
        forward(self, obs, &mut forward_table)?;
        backward(self, obs, &mut backward_table)?;

        Ok(snapshot(self, &forward_table, &backward_table, time)?
            .into_iter()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hmm::test_models::fever;
    use assert2::{assert, check, let_assert};

    const OBS: [&str; 6] = ["normal", "cold", "dizzy", "dizzy", "cold", "normal"];

    #[test]
    fn test_posterior_sums_to_one() -> anyhow::Result<()> {
        let smoothing = fever().fwd_bwd(&OBS)?;

        assert!(smoothing.forward.len() == OBS.len() + 1);
        assert!(smoothing.backward.len() == OBS.len() + 1);
        assert!(smoothing.posterior.len() == OBS.len() + 1);

        for row in smoothing.posterior.iter() {
            let sum: f64 = row.values().sum();
            check!((sum - 1.0).abs() < 1e-9);
            check!(row.values().all(|p| (0.0..=1.0).contains(p)));
        }
        Ok(())
    }

    #[test]
    fn test_posterior_tracks_evidence() -> anyhow::Result<()> {
        let smoothing = fever().fwd_bwd(&["dizzy", "dizzy", "dizzy"])?;
        for time in 1..smoothing.posterior.len() {
            check!(
                smoothing.posterior.prob(time, &"Fever")?
                    > smoothing.posterior.prob(time, &"Healthy")?
            );
        }
        Ok(())
    }

    #[test]
    fn test_fwd_bwd_at_matches_table() -> anyhow::Result<()> {
        let hmm = fever();
        let smoothing = hmm.fwd_bwd(&OBS)?;

        for time in 0..=OBS.len() {
            let pairs = hmm.fwd_bwd_at(&OBS, time)?;
            assert!(pairs.len() == 2);
            assert!(pairs[0].0 == "Healthy");
            assert!(pairs[1].0 == "Fever");

            let sum: f64 = pairs.iter().map(|(_, p)| p).sum();
            check!((sum - 1.0).abs() < 1e-9);
            for (state, prob) in pairs {
                check!((prob - smoothing.posterior.prob(time, &state)?).abs() < 1e-12);
            }
        }
        Ok(())
    }

    #[test]
    fn test_fwd_bwd_at_out_of_range() {
        let hmm = fever();
        let_assert!(Err(err) = hmm.fwd_bwd_at(&OBS, OBS.len() + 1));
        assert!(
            err.downcast_ref::<InvalidInputError>()
                == Some(&InvalidInputError::TimeOutOfRange {
                    time: 7,
                    length: 7
                })
        );
    }

    #[test]
    fn test_fwd_bwd_empty_observations() {
        let_assert!(Err(err) = fever().fwd_bwd(&[]));
        assert!(err.downcast_ref::<InvalidInputError>() == Some(&InvalidInputError::EmptyObservations));
    }

    #[test]
    fn test_posterior_length_mismatch() -> anyhow::Result<()> {
        let hmm = fever();
        let short = hmm.fwd_bwd(&OBS[..2])?;
        let long = hmm.fwd_bwd(&OBS)?;

        let mut table = ProbTable::new();
        let_assert!(Err(err) = posterior(&hmm, &long.forward, &short.backward, &mut table));
        let_assert!(
            Some(InvalidInputError::LengthMismatch { .. }) = err.downcast_ref::<InvalidInputError>()
        );
        Ok(())
    }
}
