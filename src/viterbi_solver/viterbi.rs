use ndarray::{s, Array1, Array2, ArrayView1, ArrayViewMut1, Zip};
use ndarray_stats::QuantileExt;
use serde::Serialize;
use tracing::{debug, trace};

use super::cancel::CancellationToken;
use super::hmm::HMM;
use crate::error::{Error, Result};

/// Optimal path together with the lattice it was traced back from.
///
/// Unreachable cells hold `f64::NEG_INFINITY`, serialized as `null` in JSON.
#[derive(Debug, Clone, Serialize)]
pub struct Decoding {
    pub path: Array1<usize>,
    /// Log-probability of `path` jointly with the observations.
    pub log_probability: f64,
    /// `scores[[state, t]]` is the best log-probability of a path that
    /// explains the first `t + 1` observations and ends in `state`.
    pub scores: Array2<f64>,
    /// `backpointers[[state, t]]` is the predecessor of `state` on that
    /// path. Column 0 is unused.
    pub backpointers: Array2<usize>,
}

impl Decoding {
    pub fn len(&self) -> usize {
        self.path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }

    pub fn score(&self, state: usize, t: usize) -> f64 {
        self.scores[[state, t]]
    }

    pub fn predecessor(&self, state: usize, t: usize) -> Option<usize> {
        if t == 0 {
            None
        } else {
            Some(self.backpointers[[state, t]])
        }
    }
}

// Only a strictly greater candidate replaces the current best, so ties go to
// the lowest state index.
fn best_predecessor(previous: ArrayView1<f64>, transitions: ArrayView1<f64>) -> (usize, f64) {
    let mut state_from = 0;
    let mut best = f64::NEG_INFINITY;
    for (state, (p, a)) in previous.iter().zip(transitions.iter()).enumerate() {
        let candidate = p + a;
        if candidate > best {
            best = candidate;
            state_from = state;
        }
    }
    (state_from, best)
}

fn check_feasible(column: ArrayView1<f64>, position: usize) -> Result<()> {
    if column.iter().all(|&score| score == f64::NEG_INFINITY) {
        Err(Error::NoFeasiblePath { position })
    } else {
        Ok(())
    }
}

fn check_cancelled(cancel: Option<&CancellationToken>, position: usize) -> Result<()> {
    match cancel {
        Some(token) if token.is_cancelled() => Err(Error::Cancelled { position }),
        _ => Ok(()),
    }
}

/// Log-domain Viterbi decoder over a borrowed model.
///
/// Every call allocates its own lattice, so one decoder can serve any number
/// of sequences, from several threads if needed.
pub struct Viterbi<'a> {
    hmm: &'a HMM,
}

impl<'a> Viterbi<'a> {
    pub fn new(hmm: &'a HMM) -> Self {
        Self { hmm }
    }

    /// Most likely hidden-state path for `observations`.
    pub fn decode(&self, observations: &[usize]) -> Result<Array1<usize>> {
        self.run(observations, None).map(|decoding| decoding.path)
    }

    /// Same as [`Viterbi::decode`], keeping the lattice for inspection.
    pub fn decode_with_lattice(&self, observations: &[usize]) -> Result<Decoding> {
        self.run(observations, None)
    }

    /// Decodes while polling `cancel` once per position.
    pub fn decode_cancellable(&self, observations: &[usize], cancel: &CancellationToken) -> Result<Decoding> {
        self.run(observations, Some(cancel))
    }

    /// Joint log-probability of `path` and `observations` under the model.
    pub fn log_probability(&self, observations: &[usize], path: ArrayView1<usize>) -> Result<f64> {
        self.check_observations(observations)?;
        if path.len() != observations.len() {
            return Err(Error::InvalidObservation(format!(
                "path has {} states for {} observations",
                path.len(),
                observations.len()
            )));
        }
        if let Some(state) = path.iter().find(|&&state| state >= self.hmm.nstates()) {
            return Err(Error::InvalidObservation(format!(
                "path state {} is outside the {} model states",
                state,
                self.hmm.nstates()
            )));
        }

        let mut p = self.hmm.initial_prob(path[0]) + self.hmm.emit_prob(path[0], observations[0]);
        for t in 1..path.len() {
            p += self.hmm.transition_prob(path[t - 1], path[t]) + self.hmm.emit_prob(path[t], observations[t]);
        }
        Ok(p)
    }

    fn check_observations(&self, observations: &[usize]) -> Result<()> {
        if observations.is_empty() {
            return Err(Error::InvalidObservation("observation sequence is empty".into()));
        }
        let nobs = self.hmm.nobs();
        if let Some((t, obs)) = observations.iter().enumerate().find(|&(_, &obs)| obs >= nobs) {
            return Err(Error::InvalidObservation(format!(
                "symbol {} at position {} is outside the alphabet of {} symbols",
                obs, t, nobs
            )));
        }
        Ok(())
    }

    fn fill_column(&self, previous: ArrayView1<f64>, obs: usize, scores: ArrayViewMut1<f64>, backptrs: ArrayViewMut1<usize>) {
        let hmm = self.hmm;
        let cell = |state_to: usize, score: &mut f64, backptr: &mut usize| {
            let emit_prob = hmm.emit_prob(state_to, obs);
            if emit_prob > f64::NEG_INFINITY {
                let (state_from, best) = best_predecessor(previous, hmm.transition(state_to));
                *score = best + emit_prob;
                *backptr = state_from;
            } else {
                *score = f64::NEG_INFINITY;
            }
        };

        let zip = Zip::indexed(scores).and(backptrs);
        #[cfg(feature = "parallel")]
        zip.par_for_each(cell);
        #[cfg(not(feature = "parallel"))]
        zip.for_each(cell);
    }

    fn run(&self, observations: &[usize], cancel: Option<&CancellationToken>) -> Result<Decoding> {
        self.check_observations(observations)?;
        let nstates = self.hmm.nstates();
        let len = observations.len();

        let mut scores = Array2::from_elem((nstates, len), f64::NEG_INFINITY);
        let mut backpointers = Array2::<usize>::zeros((nstates, len));

        check_cancelled(cancel, 0)?;
        scores.column_mut(0).assign(&self.hmm.init_prob(observations[0]));
        trace!(position = 0, scores = ?scores.column(0), "lattice column");
        check_feasible(scores.column(0), 0)?;

        for t in 1..len {
            check_cancelled(cancel, t)?;
            let (previous, current) = scores.multi_slice_mut((s![.., t - 1], s![.., t]));
            self.fill_column(previous.view(), observations[t], current, backpointers.column_mut(t));
            trace!(position = t, scores = ?scores.column(t), "lattice column");
            check_feasible(scores.column(t), t)?;
        }

        let mut end_state = scores.column(len - 1).argmax()?;
        let log_probability = scores[[end_state, len - 1]];
        let mut path = Array1::zeros(len);
        path[len - 1] = end_state;
        for t in (0..len - 1).rev() {
            end_state = backpointers[[end_state, t + 1]];
            path[t] = end_state;
        }
        debug!(len, log_probability, "decoded sequence");

        Ok(Decoding {
            path,
            log_probability,
            scores,
            backpointers,
        })
    }
}
