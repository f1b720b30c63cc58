//! Most likely hidden-state path of a discrete hidden Markov model, computed
//! with the log-domain Viterbi recurrence.
//!
//! ```
//! use casino_viterbi::{utils, Viterbi};
//!
//! let setup = utils::dishonest_casino().unwrap();
//! let rolls = setup.alphabet.encode("3152664").unwrap();
//! let path = Viterbi::new(&setup.hmm).decode(&rolls).unwrap();
//! assert_eq!(setup.label_path(&path), "FFFFFFF");
//! ```

pub mod error;
pub mod utils;
pub mod viterbi_solver;

pub use error::{Error, Result};
pub use viterbi_solver::cancel::CancellationToken;
pub use viterbi_solver::hmm::HMM;
pub use viterbi_solver::viterbi::{Decoding, Viterbi};
