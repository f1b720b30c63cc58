use ndarray::{s, Array1, Array2, ArrayBase, ArrayView1, Data, Dimension};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use tracing::{debug, warn};

use crate::error::{Error, Result};

const ROW_SUM_TOLERANCE: f64 = 1e-6;

/// Natural log with `ln(0)` mapped to negative infinity.
fn log(n: &f64) -> f64 {
    if *n == 0.0 {
        f64::NEG_INFINITY
    } else {
        n.ln()
    }
}

fn check_entries<S, D>(name: &str, m: &ArrayBase<S, D>) -> Result<()>
where
    S: Data<Elem = f64>,
    D: Dimension,
    D::Pattern: std::fmt::Debug,
{
    for (idx, p) in m.indexed_iter() {
        if !p.is_finite() || *p < 0.0 {
            return Err(Error::InvalidModel(format!(
                "{} entry {:?} is {}, expected a finite non-negative probability",
                name, idx, p
            )));
        }
    }
    Ok(())
}

fn validate(pi: &Array1<f64>, a: &Array2<f64>, b: &Array2<f64>) -> Result<()> {
    let nstates = pi.len();
    if nstates == 0 {
        return Err(Error::InvalidModel("the model needs at least one state".into()));
    }
    if a.dim() != (nstates, nstates) {
        return Err(Error::InvalidModel(format!(
            "transition matrix is {}x{}, expected {}x{}",
            a.nrows(),
            a.ncols(),
            nstates,
            nstates
        )));
    }
    if b.nrows() != nstates {
        return Err(Error::InvalidModel(format!(
            "emission matrix has {} rows, expected one per state ({})",
            b.nrows(),
            nstates
        )));
    }
    if b.ncols() == 0 {
        return Err(Error::InvalidModel("the emission alphabet is empty".into()));
    }
    check_entries("initial", pi)?;
    check_entries("transition", a)?;
    check_entries("emission", b)?;
    Ok(())
}

fn warn_unnormalized(name: &str, idx: usize, sum: f64) {
    if (sum - 1.0).abs() > ROW_SUM_TOLERANCE {
        warn!(row = idx, sum, "{} probabilities do not sum to 1", name);
    }
}

fn normalize_rows(m: &mut Array2<f64>) {
    for mut row in m.rows_mut() {
        let s = row.sum();
        if s > 0.0 {
            row /= s;
        }
    }
}

/// Discrete first-order hidden Markov model.
///
/// The three matrices are kept in natural-log space; a zero probability is
/// stored as `f64::NEG_INFINITY` so the states, transitions and emissions it
/// forbids can never be selected by the decoder.
#[derive(Debug, Clone)]
pub struct HMM {
    a: Array2<f64>,
    b: Array2<f64>,
    pi: Array1<f64>,
}

impl HMM {
    /// Builds a model from probability-domain matrices: `pi` (N), `a` (N x N,
    /// `a[[i, j]] = P(j | i)`) and `b` (N x M, `b[[i, k]] = P(k | i)`).
    ///
    /// Row sums are not enforced, only reported through `tracing`.
    pub fn new(pi: Array1<f64>, a: Array2<f64>, b: Array2<f64>) -> Result<Self> {
        validate(&pi, &a, &b)?;
        warn_unnormalized("initial", 0, pi.sum());
        for (state, row) in a.rows().into_iter().enumerate() {
            warn_unnormalized("transition", state, row.sum());
        }
        for (state, row) in b.rows().into_iter().enumerate() {
            warn_unnormalized("emission", state, row.sum());
        }
        debug!(nstates = pi.len(), nobs = b.ncols(), "built hmm");
        Ok(Self {
            a: a.map(log),
            b: b.map(log),
            pi: pi.map(log),
        })
    }

    /// Treats `pi` and every row of `a` and `b` as relative weights and
    /// rescales them to probability distributions. An all-zero row stays
    /// all-zero.
    pub fn normalized(mut pi: Array1<f64>, mut a: Array2<f64>, mut b: Array2<f64>) -> Result<Self> {
        validate(&pi, &a, &b)?;
        let s = pi.sum();
        if s > 0.0 {
            pi /= s;
        }
        normalize_rows(&mut a);
        normalize_rows(&mut b);
        Self::new(pi, a, b)
    }

    /// Builds a model whose transition matrix carries a silent start state in
    /// row and column 0. Row 0 (minus its first entry) becomes the initial
    /// distribution, the lower-right block the state transitions. Column 0 is
    /// ignored since nothing may return to the start state.
    pub fn with_start_state(a: Array2<f64>, b: Array2<f64>) -> Result<Self> {
        if a.nrows() != a.ncols() || a.nrows() < 2 {
            return Err(Error::InvalidModel(format!(
                "transition matrix with a start state must be square with at least 2 rows, got {}x{}",
                a.nrows(),
                a.ncols()
            )));
        }
        let pi = a.slice(s![0, 1..]).to_owned();
        let inner = a.slice(s![1.., 1..]).to_owned();
        Self::new(pi, inner, b)
    }

    pub fn nstates(&self) -> usize {
        self.a.nrows()
    }

    pub fn nobs(&self) -> usize {
        self.b.ncols()
    }

    /// Log-probability of starting in every state and emitting `obs`.
    pub fn init_prob(&self, obs: usize) -> Array1<f64> {
        &self.pi + &self.b.slice(s![.., obs])
    }

    pub fn initial_prob(&self, state: usize) -> f64 {
        self.pi[state]
    }

    /// Log-probabilities of every transition into `state_to`.
    pub fn transition(&self, state_to: usize) -> ArrayView1<f64> {
        self.a.slice(s![.., state_to])
    }

    pub fn transition_prob(&self, state_from: usize, state_to: usize) -> f64 {
        self.a[[state_from, state_to]]
    }

    pub fn emit_prob(&self, state: usize, obs: usize) -> f64 {
        self.b[[state, obs]]
    }

    pub fn can_emit(&self, state: usize, obs: usize) -> bool {
        self.emit_prob(state, obs) > f64::NEG_INFINITY
    }

    /// Draws a hidden path of length `len` and the observations it emits.
    pub fn sample<R: Rng + ?Sized>(&self, len: usize, rng: &mut R) -> Result<(Array1<usize>, Array1<usize>)> {
        let mut states = Array1::zeros(len);
        let mut observations = Array1::zeros(len);
        if len == 0 {
            return Ok((states, observations));
        }

        let weights = |row: ArrayView1<f64>| WeightedIndex::new(row.iter().map(|p| p.exp())).ok();
        let start = weights(self.pi.view())
            .ok_or_else(|| Error::InvalidModel("every initial probability is zero".into()))?;
        let transitions: Vec<Option<WeightedIndex<f64>>> = self.a.rows().into_iter().map(weights).collect();
        let emissions: Vec<Option<WeightedIndex<f64>>> = self.b.rows().into_iter().map(weights).collect();

        let mut state = start.sample(rng);
        for t in 0..len {
            if t > 0 {
                state = transitions[state]
                    .as_ref()
                    .ok_or_else(|| Error::InvalidModel(format!("state {} has no outgoing transition", state)))?
                    .sample(rng);
            }
            states[t] = state;
            observations[t] = emissions[state]
                .as_ref()
                .ok_or_else(|| Error::InvalidModel(format!("state {} cannot emit any symbol", state)))?
                .sample(rng);
        }
        Ok((states, observations))
    }
}
