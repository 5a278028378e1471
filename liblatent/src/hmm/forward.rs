use anyhow::Result;

use crate::hmm::structs::{Hmm, Label, ProbMap, ProbTable};
use crate::util::{Nats, Normalize};

/// Run the scaled forward algorithm, filling `forward_table` with T + 1 rows.
///
/// Row 0 is the start distribution. Row t + 1 is the distribution over the
/// state that emitted `obs[t]`, conditioned on `obs[0..=t]`; each row is
/// rescaled to sum to 1, so the entries are not joint probabilities.
///
/// The returned value is the log-likelihood of `obs`, accumulated from the
/// per-step normalizers.
pub fn forward<S: Label, O: Label>(
    hmm: &Hmm<S, O>,
    obs: &[O],
    forward_table: &mut ProbTable<S>,
) -> Result<Nats> {
    hmm.check_observations(obs)?;
    forward_table.reuse(obs.len() + 1);

    let mut first_row = ProbMap::with_capacity(hmm.num_states());
    for state in &hmm.states {
        first_row.insert(state.clone(), hmm.start_prob(state)?);
    }
    forward_table.push(first_row);

    let mut log_likelihood = 0.0;

    for (obs_idx, symbol) in obs.iter().enumerate() {
        let previous_row = &forward_table[obs_idx];
        let mut row = ProbMap::with_capacity(hmm.num_states());

        for state in &hmm.states {
            // fan in and pin on the current observation
            let emission = hmm.emission_prob(state, symbol)?;
            let mut sum = 0.0;
            for (previous_state, previous_prob) in previous_row {
                sum += previous_prob * hmm.transition_prob(previous_state, state)? * emission;
            }
            row.insert(state.clone(), sum);
        }

        let norm = row.normalize("forward table", obs_idx + 1)?;
        log_likelihood += norm.ln();

        forward_table.push(row);
    }

    Ok(Nats(log_likelihood))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{InvalidInputError, NumericDegeneracyError};
    use crate::hmm::test_models::fever;
    use assert2::{assert, check, let_assert};

    /// Sum the joint probability over every hidden path.
    fn brute_force_likelihood(hmm: &Hmm<&str, &str>, obs: &[&str]) -> f64 {
        fn recurse(hmm: &Hmm<&str, &str>, obs: &[&str], state: &str, prob: f64) -> f64 {
            match obs.split_first() {
                None => prob,
                Some((symbol, rest)) => hmm
                    .states
                    .iter()
                    .map(|next| {
                        recurse(
                            hmm,
                            rest,
                            next,
                            prob * hmm.transition[state][next] * hmm.emission[next][symbol],
                        )
                    })
                    .sum(),
            }
        }

        hmm.states
            .iter()
            .map(|state| recurse(hmm, obs, state, hmm.start[state]))
            .sum()
    }

    #[test]
    fn test_forward_rows_are_normalized() -> anyhow::Result<()> {
        let hmm = fever();
        let obs = ["normal", "cold", "dizzy", "dizzy", "normal"];
        let mut table = ProbTable::new();
        forward(&hmm, &obs, &mut table)?;

        assert!(table.len() == obs.len() + 1);
        assert!(table[0] == hmm.start);
        for row in table.iter() {
            let sum: f64 = row.values().sum();
            check!((sum - 1.0).abs() < 1e-9);
        }
        Ok(())
    }

    #[test]
    fn test_forward_first_step() -> anyhow::Result<()> {
        let hmm = fever();
        let mut table = ProbTable::new();
        forward(&hmm, &["normal"], &mut table)?;

        // healthy: (0.6 * 0.7 + 0.4 * 0.4) * 0.5 = 0.29
        // fever:   (0.6 * 0.3 + 0.4 * 0.6) * 0.1 = 0.042
        let norm = 0.29 + 0.042;
        assert!((table.prob(1, &"Healthy")? - 0.29 / norm).abs() < 1e-12);
        assert!((table.prob(1, &"Fever")? - 0.042 / norm).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn test_forward_log_likelihood() -> anyhow::Result<()> {
        let hmm = fever();
        let obs = ["normal", "cold", "dizzy"];
        let mut table = ProbTable::new();
        let log_likelihood = forward(&hmm, &obs, &mut table)?;

        let expected = brute_force_likelihood(&hmm, &obs).ln();
        assert!((log_likelihood.value() - expected).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn test_forward_errors() {
        let hmm = fever();
        let mut table = ProbTable::new();

        let_assert!(Err(err) = forward(&hmm, &[], &mut table));
        assert!(err.downcast_ref::<InvalidInputError>() == Some(&InvalidInputError::EmptyObservations));

        let_assert!(Err(err) = forward(&hmm, &["normal", "sneezing"], &mut table));
        let_assert!(
            Some(InvalidInputError::UnknownSymbol { position: 1, .. }) =
                err.downcast_ref::<InvalidInputError>()
        );
    }

    #[test]
    fn test_forward_degenerate_row() {
        let mut hmm = fever();
        hmm.emission["Healthy"]["dizzy"] = 0.0;
        hmm.emission["Fever"]["dizzy"] = 0.0;

        let mut table = ProbTable::new();
        let_assert!(Err(err) = forward(&hmm, &["normal", "dizzy"], &mut table));
        assert!(
            err.downcast_ref::<NumericDegeneracyError>()
                == Some(&NumericDegeneracyError {
                    table: "forward table",
                    index: 2
                })
        );
    }
}
