use anyhow::Result;
use log::{debug, info};
use rand::Rng;
use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::error::{InvalidInputError, NumericDegeneracyError};
use crate::hmm::posterior::Smoothing;
use crate::hmm::structs::{
    BaumWelchParams, BaumWelchProgress, Hmm, HmmParams, Label, ProbMap, StochasticMatrix, Variant,
};
use crate::util::Normalize;

/// Learn HMM parameters for `obs_seq` by expectation-maximization.
///
/// See [`baum_welch_with_progress`].
pub fn baum_welch<S, O, R>(
    states: &[S],
    obs_values: &[O],
    obs_seq: &[O],
    params: &BaumWelchParams,
    rng: &mut R,
) -> Result<HmmParams<S, O>>
where
    S: Label,
    O: Label,
    R: Rng + ?Sized,
{
    baum_welch_with_progress(states, obs_values, obs_seq, params, rng, |_| {})
}

/// Learn HMM parameters for `obs_seq` by expectation-maximization,
/// calling `progress` once per iteration.
///
/// The parameters start as independent uniform draws (not normalized).
/// Each iteration builds a fresh [`Hmm`] from the current parameters,
/// smooths the sequence with it, and re-estimates a new parameter
/// triple from the smoothed tables. Every re-estimated distribution is
/// normalized to sum to 1.
///
/// There is no convergence test; exactly `params.iterations` rounds run.
///
/// # Errors
///
/// Besides rejecting invalid input, a run can stall on a state whose
/// expected occupancy underflows to zero. This happens most often with
/// [`Variant::Reference`] on short sequences. Without a floor the run
/// then fails with a [`NumericDegeneracyError`] and no parameters are
/// returned; set `params.min_prob` to a small positive value to keep
/// every re-estimated probability away from zero instead.
pub fn baum_welch_with_progress<S, O, R, F>(
    states: &[S],
    obs_values: &[O],
    obs_seq: &[O],
    params: &BaumWelchParams,
    rng: &mut R,
    mut progress: F,
) -> Result<HmmParams<S, O>>
where
    S: Label,
    O: Label,
    R: Rng + ?Sized,
    F: FnMut(&BaumWelchProgress<S, O>),
{
    check_inputs(states, obs_values, obs_seq)?;
    check_min_prob(params.min_prob)?;

    let mut current = random_params(states, obs_values, rng);

    for iteration in 0..params.iterations {
        let hmm = Hmm::new(
            states.to_vec(),
            current.start,
            current.transition,
            current.emission,
        );
        let smoothing = hmm.fwd_bwd(obs_seq)?;

        if params.report_interval > 0 && iteration % params.report_interval == 0 {
            info!(
                "baum-welch iteration {}/{}: log-likelihood {}",
                iteration, params.iterations, smoothing.log_likelihood
            );
        }
        debug!(
            "baum-welch iteration {}: log-likelihood {}",
            iteration, smoothing.log_likelihood
        );

        progress(&BaumWelchProgress {
            iteration,
            log_likelihood: smoothing.log_likelihood,
            model: &hmm,
        });

        current = reestimate(&hmm, obs_values, obs_seq, &smoothing, params)?;
    }

    Ok(current)
}

fn check_inputs<S: Label, O: Label>(
    states: &[S],
    obs_values: &[O],
    obs_seq: &[O],
) -> Result<(), InvalidInputError> {
    if states.is_empty() {
        return Err(InvalidInputError::EmptyStates);
    }

    if obs_values.is_empty() {
        return Err(InvalidInputError::EmptyAlphabet);
    }

    if obs_seq.is_empty() {
        return Err(InvalidInputError::EmptyObservations);
    }

    if obs_seq.len() < 2 {
        return Err(InvalidInputError::SequenceTooShort {
            length: obs_seq.len(),
            minimum: 2,
        });
    }

    if let Some((position, symbol)) = obs_seq
        .iter()
        .enumerate()
        .find(|(_, symbol)| !obs_values.contains(symbol))
    {
        return Err(InvalidInputError::UnknownSymbol {
            position,
            symbol: format!("{symbol:?}"),
        });
    }

    Ok(())
}

fn check_min_prob(min_prob: f64) -> Result<(), InvalidInputError> {
    if !(0.0..1.0).contains(&min_prob) {
        return Err(InvalidInputError::InvalidParameter {
            name: "minimum probability",
            value: min_prob.to_string(),
        });
    }
    Ok(())
}

fn random_params<S: Label, O: Label, R: Rng + ?Sized>(
    states: &[S],
    obs_values: &[O],
    rng: &mut R,
) -> HmmParams<S, O> {
    let start: ProbMap<S> = states.iter().map(|z| (z.clone(), rng.gen())).collect();

    let transition: StochasticMatrix<S, S> = states
        .iter()
        .map(|from| {
            let row: ProbMap<S> = states.iter().map(|to| (to.clone(), rng.gen())).collect();
            (from.clone(), row)
        })
        .collect();

    let emission: StochasticMatrix<S, O> = states
        .iter()
        .map(|state| {
            let row: ProbMap<O> = obs_values.iter().map(|v| (v.clone(), rng.gen())).collect();
            (state.clone(), row)
        })
        .collect();

    HmmParams {
        start,
        transition,
        emission,
    }
}

/// The pairwise posterior ξ\[t\] as a flat `num_states * num_states` matrix,
/// normalized to sum to 1.
fn pairwise_posterior<S: Label, O: Label>(
    hmm: &Hmm<S, O>,
    smoothing: &Smoothing<S>,
    time: usize,
    symbol: &O,
) -> Result<Vec<f64>> {
    let num_states = hmm.num_states();
    let mut xi = vec![0.0; num_states * num_states];

    for (from_idx, from) in hmm.states.iter().enumerate() {
        let forward = smoothing.forward.prob(time, from)?;
        for (to_idx, to) in hmm.states.iter().enumerate() {
            xi[from_idx * num_states + to_idx] = forward
                * hmm.transition_prob(from, to)?
                * smoothing.backward.prob(time + 1, to)?
                * hmm.emission_prob(to, symbol)?;
        }
    }

    xi.normalize("pairwise posterior", time)?;
    Ok(xi)
}

/// Divide out an expected occupancy. A vanished occupancy is an error
/// unless a floor is set, in which case the entry is left for the floor.
fn divide(
    numerator: f64,
    denominator: f64,
    min_prob: f64,
    table: &'static str,
    index: usize,
) -> Result<f64> {
    if denominator > 0.0 && denominator.is_finite() {
        Ok(numerator / denominator)
    } else if min_prob > 0.0 {
        Ok(0.0)
    } else {
        Err(NumericDegeneracyError { table, index }.into())
    }
}

fn finish_row<K>(
    row: &mut ProbMap<K>,
    min_prob: f64,
    table: &'static str,
    index: usize,
) -> Result<()> {
    if min_prob > 0.0 {
        row.values_mut().for_each(|p| *p = p.max(min_prob));
    }
    row.normalize(table, index)?;
    Ok(())
}

fn reestimate<S: Label, O: Label>(
    hmm: &Hmm<S, O>,
    obs_values: &[O],
    obs_seq: &[O],
    smoothing: &Smoothing<S>,
    params: &BaumWelchParams,
) -> Result<HmmParams<S, O>> {
    let num_states = hmm.num_states();
    let min_prob = params.min_prob;
    let seq_length = obs_seq.len();

    // the pairwise posteriors run over t in [0, pair_end), and the
    // posterior row paired with obs[t] for emissions is t + emission_offset
    let (pair_end, pair_symbol_offset, emission_offset) = match params.variant {
        Variant::Reference => (seq_length - 1, 1, 0),
        Variant::Textbook => (seq_length, 0, 1),
    };

    let xi: Vec<Vec<f64>> = (0..pair_end)
        .into_par_iter()
        .map(|time| pairwise_posterior(hmm, smoothing, time, &obs_seq[time + pair_symbol_offset]))
        .collect::<Result<Vec<_>>>()?;

    let mut start = match params.variant {
        Variant::Reference => smoothing.forward[1].clone(),
        Variant::Textbook => smoothing.posterior[0].clone(),
    };
    finish_row(&mut start, min_prob, "start distribution", 0)?;

    let mut transition = StochasticMatrix::with_capacity(num_states);
    for (from_idx, from) in hmm.states.iter().enumerate() {
        let mut occupancy = 0.0;
        for time in 0..pair_end {
            occupancy += smoothing.posterior.prob(time, from)?;
        }

        let mut row = ProbMap::with_capacity(num_states);
        for (to_idx, to) in hmm.states.iter().enumerate() {
            let expected_transitions: f64 = xi
                .iter()
                .map(|xi_t| xi_t[from_idx * num_states + to_idx])
                .sum();
            row.insert(
                to.clone(),
                divide(
                    expected_transitions,
                    occupancy,
                    min_prob,
                    "transition matrix",
                    from_idx,
                )?,
            );
        }
        finish_row(&mut row, min_prob, "transition matrix", from_idx)?;
        transition.insert(from.clone(), row);
    }

    let mut emission = StochasticMatrix::with_capacity(num_states);
    for (state_idx, state) in hmm.states.iter().enumerate() {
        let mut occupancy = 0.0;
        let mut row: ProbMap<O> = obs_values.iter().map(|v| (v.clone(), 0.0)).collect();

        for (obs_idx, symbol) in obs_seq.iter().enumerate() {
            let prob = smoothing.posterior.prob(obs_idx + emission_offset, state)?;
            occupancy += prob;
            if let Some(count) = row.get_mut(symbol) {
                *count += prob;
            }
        }

        for count in row.values_mut() {
            *count = divide(*count, occupancy, min_prob, "emission matrix", state_idx)?;
        }
        finish_row(&mut row, min_prob, "emission matrix", state_idx)?;
        emission.insert(state.clone(), row);
    }

    Ok(HmmParams {
        start,
        transition,
        emission,
    })
}
