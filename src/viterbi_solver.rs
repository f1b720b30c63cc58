pub mod cancel;
pub mod hmm;
pub mod viterbi;
