use anyhow::Result;

use crate::error::InvalidInputError;
use crate::hmm::structs::{Hmm, Label, ProbMap};
use crate::util::VecMath;

impl<S: Label, O: Label> Hmm<S, O> {
    /// Decode the most probable hidden state path for `obs`.
    ///
    /// V\[0\]\[z\] = start\[z\] * emission\[z\]\[obs\[0\]\], and each later cell keeps
    /// the best predecessor; the path is recovered by backtracking from the
    /// best final state. Ties go to the state that comes first in `states`.
    ///
    /// No rescaling is done, so very long sequences will underflow.
    pub fn viterbi(&self, obs: &[O]) -> Result<Vec<S>> {
        self.check_observations(obs)?;

        let num_states = self.num_states();
        let mut scores: Vec<Vec<f64>> = Vec::with_capacity(obs.len());
        let mut traceback: Vec<Vec<usize>> = Vec::with_capacity(obs.len());

        let mut first_row = Vec::with_capacity(num_states);
        for state in &self.states {
            first_row.push(self.start_prob(state)? * self.emission_prob(state, &obs[0])?);
        }
        scores.push(first_row);
        traceback.push(vec![0; num_states]);

        let mut candidates: Vec<f64> = vec![0.0; num_states];

        for (obs_idx, symbol) in obs.iter().enumerate().skip(1) {
            let mut row = Vec::with_capacity(num_states);
            let mut pointers = Vec::with_capacity(num_states);

            for state in &self.states {
                for (previous_idx, previous_state) in self.states.iter().enumerate() {
                    candidates[previous_idx] = scores[obs_idx - 1][previous_idx]
                        * self.transition_prob(previous_state, state)?;
                }

                let best_idx = candidates.argmax().ok_or(InvalidInputError::EmptyStates)?;
                row.push(candidates[best_idx] * self.emission_prob(state, symbol)?);
                pointers.push(best_idx);
            }

            scores.push(row);
            traceback.push(pointers);
        }

        let mut state_idx = scores[obs.len() - 1]
            .argmax()
            .ok_or(InvalidInputError::EmptyStates)?;

        let mut path: Vec<S> = Vec::with_capacity(obs.len());
        for obs_idx in (0..obs.len()).rev() {
            path.push(self.states[state_idx].clone());
            state_idx = traceback[obs_idx][state_idx];
        }
        path.reverse();

        Ok(path)
    }

    /// The legacy decoder: fill the same table as [`Hmm::viterbi`], then take
    /// the highest scoring state of every time slice on its own, appending
    /// every state that ties for the maximum.
    ///
    /// The result ignores predecessor links, so it can contain transitions the
    /// model gives zero probability, and it is longer than `obs` when ties occur.
    pub fn viterbi_naive(&self, obs: &[O]) -> Result<Vec<S>> {
        self.check_observations(obs)?;

        let mut table: Vec<ProbMap<S>> = Vec::with_capacity(obs.len());

        let mut first_row = ProbMap::with_capacity(self.num_states());
        for state in &self.states {
            first_row.insert(
                state.clone(),
                self.start_prob(state)? * self.emission_prob(state, &obs[0])?,
            );
        }
        table.push(first_row);

        for (obs_idx, symbol) in obs.iter().enumerate().skip(1) {
            let mut row = ProbMap::with_capacity(self.num_states());
            for state in &self.states {
                let emission = self.emission_prob(state, symbol)?;
                let mut max = 0.0f64;
                for (previous_state, previous_score) in &table[obs_idx - 1] {
                    max = max.max(
                        previous_score * self.transition_prob(previous_state, state)? * emission,
                    );
                }
                row.insert(state.clone(), max);
            }
            table.push(row);
        }

        let mut path = vec![];
        for snapshot in &table {
            let max = snapshot.values().copied().fold(f64::NEG_INFINITY, f64::max);
            path.extend(
                snapshot
                    .iter()
                    .filter(|(_, score)| **score == max)
                    .map(|(state, _)| state.clone()),
            );
        }

        Ok(path)
    }
}
