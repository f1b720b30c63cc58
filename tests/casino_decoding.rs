use casino_viterbi::utils::{self, Alphabet};
use casino_viterbi::{Error, Viterbi, HMM};
use ndarray::array;

fn decode_rolls(rolls: &str) -> String {
    let setup = utils::dishonest_casino().unwrap();
    let observations = setup.alphabet.encode(rolls).unwrap();
    let path = Viterbi::new(&setup.hmm).decode(&observations).unwrap();
    setup.label_path(&path)
}

#[test]
fn short_mixed_rolls_stay_fair() {
    assert_eq!(decode_rolls("3152664"), "FFFFFFF");
    assert_eq!(decode_rolls("1234"), "FFFF");
}

#[test]
fn runs_of_sixes_are_loaded() {
    assert_eq!(decode_rolls("666"), "LLL");
    assert_eq!(decode_rolls("6666666666"), "LLLLLLLLLL");
    assert_eq!(
        decode_rolls("66666661111111111111111"),
        "LLLLLLLFFFFFFFFFFFFFFFF"
    );
}

#[test]
fn worked_example_score() {
    let setup = utils::dishonest_casino().unwrap();
    let observations = setup.alphabet.encode("3152664").unwrap();
    let decoding = Viterbi::new(&setup.hmm).decode_with_lattice(&observations).unwrap();

    // all fair: ln(0.5) + 7 ln(1/6) + 6 ln(0.95)
    let expected = 0.5f64.ln() + 7.0 * (1.0f64 / 6.0).ln() + 6.0 * 0.95f64.ln();
    approx::assert_abs_diff_eq!(decoding.log_probability, expected, epsilon = 1e-9);
    assert_eq!(decoding.scores.dim(), (2, 7));
    assert_eq!(decoding.len(), 7);
}

#[test]
fn start_state_model_matches_explicit_initial() {
    let explicit = HMM::new(
        array![0.5, 0.5],
        array![[0.95, 0.05], [0.1, 0.9]],
        array![
            [1.0 / 6.0, 1.0 / 6.0, 1.0 / 6.0, 1.0 / 6.0, 1.0 / 6.0, 1.0 / 6.0],
            [0.1, 0.1, 0.1, 0.1, 0.1, 0.5]
        ],
    )
    .unwrap();
    let setup = utils::dishonest_casino().unwrap();
    let observations = setup.alphabet.encode("16662456666121666626").unwrap();
    let a = Viterbi::new(&explicit).decode_with_lattice(&observations).unwrap();
    let b = Viterbi::new(&setup.hmm).decode_with_lattice(&observations).unwrap();
    assert_eq!(a.path, b.path);
    assert_eq!(a.scores, b.scores);
}

#[test]
fn rejects_symbols_outside_the_alphabet() {
    let setup = utils::dishonest_casino().unwrap();
    let viterbi = Viterbi::new(&setup.hmm);
    assert!(matches!(viterbi.decode(&[0, 6]), Err(Error::InvalidObservation(_))));
    assert!(matches!(viterbi.decode(&[]), Err(Error::InvalidObservation(_))));
    assert!(matches!(
        Alphabet::digits(6).unwrap().encode("1239"),
        Err(Error::InvalidObservation(_))
    ));
}

#[test]
fn simulated_rolls_are_mostly_recovered() {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    let setup = utils::dishonest_casino().unwrap();
    let mut rng = StdRng::seed_from_u64(42);
    let (states, rolls) = setup.hmm.sample(3000, &mut rng).unwrap();
    let path = Viterbi::new(&setup.hmm).decode(rolls.as_slice().unwrap()).unwrap();
    let rate = utils::error_rate(&path, states.as_slice().unwrap()).unwrap();
    assert_eq!(path.len(), 3000);
    assert!(rate < 0.5, "error rate {}", rate);
}
