use anyhow::Result;
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use crate::error::InvalidInputError;
use crate::hmm::structs::{Hmm, Label, ProbMap};

fn draw<'a, K, R: Rng + ?Sized>(distribution: &'a ProbMap<K>, rng: &mut R) -> Result<&'a K> {
    let idx = WeightedIndex::new(distribution.values())?.sample(rng);
    let (key, _) = distribution
        .get_index(idx)
        .ok_or(InvalidInputError::EmptyStates)?;
    Ok(key)
}

impl<S: Label, O: Label> Hmm<S, O> {
    /// Draw `length` steps from the model.
    ///
    /// Returns the hidden state that emitted each observation, together
    /// with the observations themselves; the initial state z_0 is not
    /// included since it emits nothing.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        length: usize,
        rng: &mut R,
    ) -> Result<(Vec<S>, Vec<O>)> {
        if length == 0 {
            return Err(InvalidInputError::SequenceTooShort { length, minimum: 1 }.into());
        }

        let mut states = Vec::with_capacity(length);
        let mut obs = Vec::with_capacity(length);

        let mut state = draw(&self.start, rng)?;
        for _ in 0..length {
            let transition_row = self.transition.get(state).ok_or_else(|| {
                InvalidInputError::MissingEntry {
                    table: "transition matrix",
                    key: format!("{state:?}"),
                }
            })?;
            state = draw(transition_row, rng)?;

            let emission_row = self.emission.get(state).ok_or_else(|| {
                InvalidInputError::MissingEntry {
                    table: "emission matrix",
                    key: format!("{state:?}"),
                }
            })?;

            states.push(state.clone());
            obs.push(draw(emission_row, rng)?.clone());
        }

        Ok((states, obs))
    }
}
