pub mod structs;

mod forward;
pub use forward::forward;

mod backward;
pub use backward::backward;

mod posterior;
pub use posterior::{posterior, Smoothing};

mod viterbi;

mod sample;

mod baum_welch;
pub use baum_welch::{baum_welch, baum_welch_with_progress};

#[cfg(test)]
pub(crate) mod test_models {
    use crate::hmm::structs::{Hmm, ProbMap, StochasticMatrix};

    /// Build a model over string labels from dense rows, in the order given.
    pub fn model(
        states: &[&'static str],
        start: &[f64],
        transition: &[&[f64]],
        symbols: &[&'static str],
        emission: &[&[f64]],
    ) -> Hmm<&'static str, &'static str> {
        let start: ProbMap<&str> = states.iter().copied().zip(start.iter().copied()).collect();

        let transition: StochasticMatrix<&str, &str> = states
            .iter()
            .zip(transition)
            .map(|(from, row)| (*from, states.iter().copied().zip(row.iter().copied()).collect()))
            .collect();

        let emission: StochasticMatrix<&str, &str> = states
            .iter()
            .zip(emission)
            .map(|(state, row)| (*state, symbols.iter().copied().zip(row.iter().copied()).collect()))
            .collect();

        Hmm::new(states.to_vec(), start, transition, emission)
    }

    /// The two-state healthy/fever model.
    pub fn fever() -> Hmm<&'static str, &'static str> {
        model(
            &["Healthy", "Fever"],
            &[0.6, 0.4],
            &[&[0.7, 0.3], &[0.4, 0.6]],
            &["normal", "cold", "dizzy"],
            &[&[0.5, 0.4, 0.1], &[0.1, 0.3, 0.6]],
        )
    }
}
