use std::fmt::Debug;
use std::hash::Hash;

use anyhow::Result;
use indexmap::IndexMap;
use serde::Serialize;

use crate::error::InvalidInputError;

/// The bound shared by HMM state labels and observation symbols.
pub trait Label: Clone + Eq + Hash + Debug + Send + Sync {}

impl<T> Label for T where T: Clone + Eq + Hash + Debug + Send + Sync {}

/// A probability for each key, in insertion order.
pub type ProbMap<K> = IndexMap<K, f64>;

/// A row-stochastic matrix keyed by labels: `matrix[row][column]`.
pub type StochasticMatrix<R, C> = IndexMap<R, ProbMap<C>>;

/// The parameter triple that Baum-Welch produces.
#[derive(Debug, Clone, Serialize)]
pub struct HmmParams<S, O> {
    pub start: ProbMap<S>,
    pub transition: StochasticMatrix<S, S>,
    pub emission: StochasticMatrix<S, O>,
}

// IndexMap equality needs hashable keys, which a derive can't express
impl<S: Label, O: Label> PartialEq for HmmParams<S, O> {
    fn eq(&self, other: &Self) -> bool {
        self.start == other.start
            && self.transition == other.transition
            && self.emission == other.emission
    }
}

/// A discrete Hidden Markov Model.
///
/// The chain starts in z_0 ~ `start`, moves with z_(t+1) ~ `transition[z_t]`,
/// and the t-th observation is emitted by the state that was just entered:
/// obs[t] ~ `emission[z_(t+1)]`.
///
/// A model is never modified after construction; learning builds a new one.
#[derive(Debug, Clone, Serialize)]
pub struct Hmm<S, O> {
    pub states: Vec<S>,
    pub start: ProbMap<S>,
    pub transition: StochasticMatrix<S, S>,
    pub emission: StochasticMatrix<S, O>,
}

fn missing(table: &'static str, key: impl Debug) -> InvalidInputError {
    InvalidInputError::MissingEntry {
        table,
        key: format!("{key:?}"),
    }
}

impl<S: Label, O: Label> Hmm<S, O> {
    pub fn new(
        states: Vec<S>,
        start: ProbMap<S>,
        transition: StochasticMatrix<S, S>,
        emission: StochasticMatrix<S, O>,
    ) -> Self {
        Self {
            states,
            start,
            transition,
            emission,
        }
    }

    pub fn from_params(states: &[S], params: &HmmParams<S, O>) -> Self {
        Self::new(
            states.to_vec(),
            params.start.clone(),
            params.transition.clone(),
            params.emission.clone(),
        )
    }

    pub fn into_params(self) -> HmmParams<S, O> {
        HmmParams {
            start: self.start,
            transition: self.transition,
            emission: self.emission,
        }
    }

    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    pub fn start_prob(&self, state: &S) -> Result<f64, InvalidInputError> {
        self.start
            .get(state)
            .copied()
            .ok_or_else(|| missing("start distribution", state))
    }

    pub fn transition_prob(&self, from: &S, to: &S) -> Result<f64, InvalidInputError> {
        self.transition
            .get(from)
            .ok_or_else(|| missing("transition matrix", from))?
            .get(to)
            .copied()
            .ok_or_else(|| missing("transition matrix", (from, to)))
    }

    pub fn emission_prob(&self, state: &S, symbol: &O) -> Result<f64, InvalidInputError> {
        self.emission
            .get(state)
            .ok_or_else(|| missing("emission matrix", state))?
            .get(symbol)
            .copied()
            .ok_or_else(|| missing("emission matrix", (state, symbol)))
    }

    /// Check that an observation sequence can be run through this model.
    pub fn check_observations(&self, obs: &[O]) -> Result<(), InvalidInputError> {
        if self.states.is_empty() {
            return Err(InvalidInputError::EmptyStates);
        }

        if obs.is_empty() {
            return Err(InvalidInputError::EmptyObservations);
        }

        for state in &self.states {
            let row = self
                .emission
                .get(state)
                .ok_or_else(|| missing("emission matrix", state))?;

            if let Some((position, symbol)) =
                obs.iter().enumerate().find(|(_, s)| !row.contains_key(*s))
            {
                return Err(InvalidInputError::UnknownSymbol {
                    position,
                    symbol: format!("{symbol:?}"),
                });
            }
        }

        Ok(())
    }

    /// Check that every table is keyed consistently by the state set,
    /// and that every distribution sums to 1 within `tolerance`.
    pub fn validate(&self, tolerance: f64) -> Result<()> {
        if self.states.is_empty() {
            return Err(InvalidInputError::EmptyStates.into());
        }

        for (idx, state) in self.states.iter().enumerate() {
            if self.states[..idx].contains(state) {
                return Err(InvalidInputError::InvalidParameter {
                    name: "states",
                    value: format!("duplicate state {state:?}"),
                }
                .into());
            }
        }

        check_distribution("start distribution", &self.start, tolerance)?;

        for from in &self.states {
            self.start_prob(from)?;
            for to in &self.states {
                self.transition_prob(from, to)?;
            }

            let transition_row = &self.transition[from];
            if transition_row.len() != self.states.len() {
                return Err(InvalidInputError::LengthMismatch {
                    what: "transition row",
                    expected: self.states.len(),
                    actual: transition_row.len(),
                }
                .into());
            }
            check_distribution("transition matrix", transition_row, tolerance)?;

            let emission_row = self
                .emission
                .get(from)
                .ok_or_else(|| missing("emission matrix", from))?;
            check_distribution("emission matrix", emission_row, tolerance)?;
        }

        Ok(())
    }
}

fn check_distribution<K>(
    name: &'static str,
    distribution: &ProbMap<K>,
    tolerance: f64,
) -> Result<(), InvalidInputError> {
    let in_range = distribution.values().all(|p| (0.0..=1.0).contains(p));
    let sum: f64 = distribution.values().sum();

    if !in_range || (sum - 1.0).abs() > tolerance {
        return Err(InvalidInputError::InvalidParameter {
            name,
            value: format!("probabilities sum to {sum}"),
        });
    }
    Ok(())
}
