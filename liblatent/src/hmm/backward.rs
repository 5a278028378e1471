use anyhow::Result;

use crate::hmm::structs::{Hmm, Label, ProbMap, ProbTable};
use crate::util::Normalize;

/// Run the scaled backward algorithm, filling `backward_table` with T + 1 rows.
///
/// Row T is all ones. Row t is proportional to the probability of
/// `obs[t..]` given the state at t, rescaled to sum to 1.
pub fn backward<S: Label, O: Label>(
    hmm: &Hmm<S, O>,
    obs: &[O],
    backward_table: &mut ProbTable<S>,
) -> Result<()> {
    hmm.check_observations(obs)?;
    backward_table.reuse(obs.len() + 1);
    backward_table.rows.resize(obs.len() + 1, ProbMap::new());

    backward_table.rows[obs.len()] = hmm
        .states
        .iter()
        .map(|state| (state.clone(), 1.0))
        .collect();

    for obs_idx in (0..obs.len()).rev() {
        let next_row = &backward_table[obs_idx + 1];
        let symbol = &obs[obs_idx];
        let mut row = ProbMap::with_capacity(hmm.num_states());

        for state in &hmm.states {
            let mut sum = 0.0;
            for (next_state, next_prob) in next_row {
                sum += next_prob
                    * hmm.transition_prob(state, next_state)?
                    * hmm.emission_prob(next_state, symbol)?;
            }
            row.insert(state.clone(), sum);
        }

        row.normalize("backward table", obs_idx)?;
        backward_table.rows[obs_idx] = row;
    }

    Ok(())
}
