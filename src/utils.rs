use csv::{ReaderBuilder, Trim};
use ndarray::{array, Array1, Array2};
use ndarray_csv::Array2Reader;
use tracing::debug;

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::viterbi_solver::hmm::HMM;

/// Characters per line in the aligned output.
pub const DEFAULT_WIDTH: usize = 60;

fn is_line_break(c: char) -> bool {
    c == '\n' || c == '\r'
}

/// Reads a headerless CSV file into an `nrows x ncols` matrix.
pub fn read_matrix(path: &Path, nrows: usize, ncols: usize) -> Result<Array2<f64>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .trim(Trim::All)
        .from_path(path)?;
    Ok(reader.deserialize_array2((nrows, ncols))?)
}

/// Ordered set of observable symbols; a symbol's index is its position.
#[derive(Debug, Clone, PartialEq)]
pub struct Alphabet {
    symbols: Vec<char>,
}

impl Alphabet {
    pub fn new(symbols: &str) -> Result<Self> {
        let symbols: Vec<char> = symbols.chars().collect();
        if symbols.is_empty() {
            return Err(Error::Config("the alphabet is empty".into()));
        }
        for (i, c) in symbols.iter().enumerate() {
            if is_line_break(*c) {
                return Err(Error::Config("the alphabet cannot contain line breaks".into()));
            }
            if symbols[..i].contains(c) {
                return Err(Error::Config(format!("symbol {:?} appears twice in the alphabet", c)));
            }
        }
        Ok(Self { symbols })
    }

    /// The digits `'1'` to `n`, so that face `k` of a die is symbol `k - 1`.
    pub fn digits(n: usize) -> Result<Self> {
        if n == 0 || n > 9 {
            return Err(Error::Config(format!(
                "cannot build a digit alphabet of {} symbols, list the symbols explicitly",
                n
            )));
        }
        let symbols: String = (1..=n).map(|d| char::from(b'0' + d as u8)).collect();
        Self::new(&symbols)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn index_of(&self, symbol: char) -> Option<usize> {
        self.symbols.iter().position(|&c| c == symbol)
    }

    /// Maps every character of `text` to its symbol index, skipping line
    /// breaks. Any other unknown character is an error.
    pub fn encode(&self, text: &str) -> Result<Vec<usize>> {
        let mut sequence = Vec::with_capacity(text.len());
        for (offset, c) in text.chars().enumerate() {
            if is_line_break(c) {
                continue;
            }
            match self.index_of(c) {
                Some(idx) => sequence.push(idx),
                None => {
                    return Err(Error::InvalidObservation(format!(
                        "character {:?} at offset {} is not one of {:?}",
                        c,
                        offset,
                        self.symbols.iter().collect::<String>()
                    )))
                }
            }
        }
        Ok(sequence)
    }

    pub fn decode(&self, sequence: &[usize]) -> String {
        sequence.iter().map(|&idx| self.symbols[idx]).collect()
    }
}

/// Reads an observation file: one symbol per character, line breaks ignored.
pub fn load_observations(path: &Path, alphabet: &Alphabet) -> Result<Vec<usize>> {
    let text = fs::read_to_string(path)?;
    let sequence = alphabet.encode(&text)?;
    debug!(path = %path.display(), len = sequence.len(), "loaded observations");
    Ok(sequence)
}

/// Everything the command line needs around the decoder: the model, how to
/// read its symbols and how to print its states.
#[derive(Debug, Clone)]
pub struct DecoderSetup {
    pub hmm: HMM,
    pub alphabet: Alphabet,
    pub labels: Vec<char>,
    pub width: usize,
}

impl DecoderSetup {
    pub fn new(hmm: HMM, alphabet: Alphabet, labels: &str, width: usize) -> Result<Self> {
        if alphabet.len() != hmm.nobs() {
            return Err(Error::Config(format!(
                "alphabet has {} symbols but the emission matrix has {} columns",
                alphabet.len(),
                hmm.nobs()
            )));
        }
        let labels: Vec<char> = labels.chars().collect();
        if labels.len() != hmm.nstates() {
            return Err(Error::Config(format!(
                "{} state labels given for {} states",
                labels.len(),
                hmm.nstates()
            )));
        }
        if width == 0 {
            return Err(Error::Config("line width must be positive".into()));
        }
        Ok(Self {
            hmm,
            alphabet,
            labels,
            width,
        })
    }

    pub fn label_path(&self, path: &Array1<usize>) -> String {
        path.iter().map(|&state| self.labels[state]).collect()
    }

    pub fn state_of(&self, label: char) -> Option<usize> {
        self.labels.iter().position(|&c| c == label)
    }
}

/// The occasionally dishonest casino: a fair die and a loaded one that rolls
/// a six half of the time.
pub fn dishonest_casino() -> Result<DecoderSetup> {
    let hmm = HMM::with_start_state(
        array![[0.0, 0.5, 0.5], [0.0, 0.95, 0.05], [0.0, 0.1, 0.9]],
        array![
            [1.0 / 6.0, 1.0 / 6.0, 1.0 / 6.0, 1.0 / 6.0, 1.0 / 6.0, 1.0 / 6.0],
            [0.1, 0.1, 0.1, 0.1, 0.1, 0.5]
        ],
    )?;
    DecoderSetup::new(hmm, Alphabet::digits(6)?, "FL", DEFAULT_WIDTH)
}

/// Reads a file of state labels, e.g. the true die sequence of a simulation.
pub fn load_labels(path: &Path, setup: &DecoderSetup) -> Result<Vec<usize>> {
    let text = fs::read_to_string(path)?;
    text.chars()
        .enumerate()
        .filter(|(_, c)| !is_line_break(*c))
        .map(|(offset, c)| {
            setup.state_of(c).ok_or_else(|| {
                Error::InvalidObservation(format!("unknown state label {:?} at offset {}", c, offset))
            })
        })
        .collect()
}

/// Pairs each observation with its state label, `width` columns per block.
pub fn format_alignment(observations: &str, labels: &str, width: usize) -> String {
    let observations: Vec<char> = observations.chars().collect();
    let labels: Vec<char> = labels.chars().collect();
    let mut s = String::new();
    for (obs, lab) in observations.chunks(width.max(1)).zip(labels.chunks(width.max(1))) {
        if !s.is_empty() {
            s.push('\n');
        }
        s.extend(obs);
        s.push('\n');
        s.extend(lab);
        s.push('\n');
    }
    s
}

/// Fraction of positions where `predictions` disagrees with `truth`.
pub fn error_rate(predictions: &Array1<usize>, truth: &[usize]) -> Result<f64> {
    if predictions.len() != truth.len() {
        return Err(Error::InvalidObservation(format!(
            "{} predicted states for {} true states",
            predictions.len(),
            truth.len()
        )));
    }
    if truth.is_empty() {
        return Ok(0.0);
    }
    let errors = predictions.iter().zip(truth).filter(|(p, t)| p != t).count();
    Ok(errors as f64 / truth.len() as f64)
}

/// `key=value` model description. The matrices live next to each other in
/// `hmm_path` as headerless CSV files named `pi`, `A` and `b`.
pub struct Config {
    hmm_path: PathBuf,
    nstates: usize,
    nobs: usize,
    labels: Option<String>,
    alphabet: Option<String>,
    width: usize,
}

impl Config {
    fn new() -> Self {
        Self {
            hmm_path: PathBuf::from("."),
            nstates: 0,
            nobs: 0,
            labels: None,
            alphabet: None,
            width: DEFAULT_WIDTH,
        }
    }

    fn parse_usize(option: &str, value: &str) -> Result<usize> {
        value
            .parse::<usize>()
            .map_err(|error| Error::Config(format!("can not parse {}={:?}: {}", option, value, error)))
    }

    /// Parses a configuration file. A relative `hmm_path` is resolved against
    /// the directory holding the file.
    pub fn from_config_file(filename: &Path) -> Result<Self> {
        let mut instance = Config::new();
        let reader = BufReader::new(File::open(filename)?);
        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let splits: Vec<&str> = line.splitn(2, '=').collect();
            if splits.len() != 2 {
                return Err(Error::Config(format!(
                    "line {} of {} is not an option=value pair",
                    lineno + 1,
                    filename.display()
                )));
            }
            let option = splits[0].trim();
            let value = splits[1].trim();
            match option {
                "hmm_path" => instance.hmm_path = PathBuf::from(value),
                "nstates" => instance.nstates = Self::parse_usize(option, value)?,
                "nobs" => instance.nobs = Self::parse_usize(option, value)?,
                "labels" => instance.labels = Some(value.to_string()),
                "alphabet" => instance.alphabet = Some(value.to_string()),
                "width" => instance.width = Self::parse_usize(option, value)?,
                _ => return Err(Error::Config(format!("unknown option in config file: {:?}", option))),
            };
        }

        if instance.nstates == 0 || instance.nobs == 0 {
            return Err(Error::Config("nstates and nobs must both be set and positive".into()));
        }
        if instance.hmm_path.is_relative() {
            if let Some(dir) = filename.parent() {
                instance.hmm_path = dir.join(&instance.hmm_path);
            }
        }
        debug!(hmm_path = %instance.hmm_path.display(), nstates = instance.nstates, nobs = instance.nobs, "read config");
        Ok(instance)
    }

    pub fn get_transmatrix(&self) -> Result<Array2<f64>> {
        read_matrix(&self.hmm_path.join("A"), self.nstates, self.nstates)
    }

    pub fn get_emissionmatrix(&self) -> Result<Array2<f64>> {
        read_matrix(&self.hmm_path.join("b"), self.nstates, self.nobs)
    }

    pub fn get_initprob(&self) -> Result<Array1<f64>> {
        Ok(read_matrix(&self.hmm_path.join("pi"), 1, self.nstates)?.row(0).to_owned())
    }

    /// Loads the matrices and builds the model with its alphabet and labels.
    /// Labels default to `0`, `1`, ... `9`, `a`, ... up to 36 states.
    pub fn load(&self) -> Result<DecoderSetup> {
        let hmm = HMM::new(self.get_initprob()?, self.get_transmatrix()?, self.get_emissionmatrix()?)?;
        let alphabet = match &self.alphabet {
            Some(symbols) => Alphabet::new(symbols)?,
            None => Alphabet::digits(self.nobs)?,
        };
        let labels = match &self.labels {
            Some(labels) => labels.clone(),
            None => (0..self.nstates)
                .map(|state| std::char::from_digit(state as u32, 36))
                .collect::<Option<String>>()
                .ok_or_else(|| Error::Config(format!("{} states need explicit labels", self.nstates)))?,
        };
        DecoderSetup::new(hmm, alphabet, &labels, self.width)
    }
}
