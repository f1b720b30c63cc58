use casino_viterbi::utils::{self, Config};
use casino_viterbi::{Error, Viterbi};

use std::fs;
use std::path::Path;

fn write_casino_model(dir: &Path) {
    let model = dir.join("model");
    fs::create_dir(&model).unwrap();
    fs::write(model.join("pi"), "0.5,0.5\n").unwrap();
    fs::write(model.join("A"), "0.95,0.05\n0.1,0.9\n").unwrap();
    let sixth = "0.16666666666666666";
    fs::write(
        model.join("b"),
        format!("{s},{s},{s},{s},{s},{s}\n0.1,0.1,0.1,0.1,0.1,0.5\n", s = sixth),
    )
    .unwrap();
}

#[test]
fn loads_matrices_from_csv() {
    let dir = tempfile::tempdir().unwrap();
    write_casino_model(dir.path());
    let conf = dir.path().join("casino.conf");
    fs::write(&conf, "# dishonest casino\nhmm_path=model\nnstates=2\nnobs=6\nlabels=FL\nwidth=10\n").unwrap();

    let setup = Config::from_config_file(&conf).unwrap().load().unwrap();
    assert_eq!(setup.hmm.nstates(), 2);
    assert_eq!(setup.width, 10);

    let builtin = utils::dishonest_casino().unwrap();
    let obs = setup.alphabet.encode("66666661111111111111111").unwrap();
    let a = Viterbi::new(&setup.hmm).decode(&obs).unwrap();
    let b = Viterbi::new(&builtin.hmm).decode(&obs).unwrap();
    assert_eq!(a, b);
    assert_eq!(setup.label_path(&a), "LLLLLLLFFFFFFFFFFFFFFFF");
}

#[test]
fn default_labels_and_custom_alphabet() {
    let dir = tempfile::tempdir().unwrap();
    let model = dir.path().join("coin");
    fs::create_dir(&model).unwrap();
    fs::write(model.join("pi"), "1,0\n").unwrap();
    fs::write(model.join("A"), "0.5,0.5\n0.5,0.5\n").unwrap();
    fs::write(model.join("b"), "0.5,0.5\n0.9,0.1\n").unwrap();
    let conf = dir.path().join("coin.conf");
    fs::write(&conf, format!("hmm_path={}\nnstates=2\nnobs=2\nalphabet=HT\n", model.display())).unwrap();

    let setup = Config::from_config_file(&conf).unwrap().load().unwrap();
    assert_eq!(setup.labels, vec!['0', '1']);
    let obs = setup.alphabet.encode("HHH").unwrap();
    let path = Viterbi::new(&setup.hmm).decode(&obs).unwrap();
    assert_eq!(setup.label_path(&path), "011");
}

#[test]
fn wrong_matrix_shape_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    write_casino_model(dir.path());
    let conf = dir.path().join("bad.conf");
    fs::write(&conf, "hmm_path=model\nnstates=3\nnobs=6\nlabels=FLX\n").unwrap();
    let err = Config::from_config_file(&conf).unwrap().load().unwrap_err();
    assert!(matches!(err, Error::Matrix(_)), "{:?}", err);
}

#[test]
fn negative_probability_in_csv_is_an_invalid_model() {
    let dir = tempfile::tempdir().unwrap();
    write_casino_model(dir.path());
    fs::write(dir.path().join("model").join("A"), "1.05,-0.05\n0.1,0.9\n").unwrap();
    let conf = dir.path().join("casino.conf");
    fs::write(&conf, "hmm_path=model\nnstates=2\nnobs=6\nlabels=FL\n").unwrap();
    let err = Config::from_config_file(&conf).unwrap().load().unwrap_err();
    assert!(matches!(err, Error::InvalidModel(_)), "{:?}", err);
}

#[test]
fn malformed_config_files() {
    let dir = tempfile::tempdir().unwrap();
    let conf = dir.path().join("c.conf");

    fs::write(&conf, "hmm_path=model\nnstates=2\nnobs=6\ncolour=blue\n").unwrap();
    assert!(matches!(Config::from_config_file(&conf), Err(Error::Config(_))));

    fs::write(&conf, "nstates two\n").unwrap();
    assert!(matches!(Config::from_config_file(&conf), Err(Error::Config(_))));

    fs::write(&conf, "nstates=two\nnobs=6\n").unwrap();
    assert!(matches!(Config::from_config_file(&conf), Err(Error::Config(_))));

    fs::write(&conf, "hmm_path=model\n").unwrap();
    assert!(matches!(Config::from_config_file(&conf), Err(Error::Config(_))));

    assert!(matches!(
        Config::from_config_file(&dir.path().join("missing.conf")),
        Err(Error::Io(_))
    ));
}

#[test]
fn observation_and_label_files() {
    let dir = tempfile::tempdir().unwrap();
    let setup = utils::dishonest_casino().unwrap();

    let rolls = dir.path().join("rolls");
    fs::write(&rolls, "315\r\n2664\n").unwrap();
    let obs = utils::load_observations(&rolls, &setup.alphabet).unwrap();
    assert_eq!(obs, vec![2, 0, 4, 1, 5, 5, 3]);

    let truth = dir.path().join("truth");
    fs::write(&truth, "FFF\nFLLF\n").unwrap();
    let states = utils::load_labels(&truth, &setup).unwrap();
    assert_eq!(states, vec![0, 0, 0, 0, 1, 1, 0]);

    let path = Viterbi::new(&setup.hmm).decode(&obs).unwrap();
    approx::assert_abs_diff_eq!(utils::error_rate(&path, &states).unwrap(), 2.0 / 7.0);

    fs::write(&truth, "FFQ").unwrap();
    assert!(matches!(utils::load_labels(&truth, &setup), Err(Error::InvalidObservation(_))));
    fs::write(&rolls, "31x").unwrap();
    assert!(matches!(
        utils::load_observations(&rolls, &setup.alphabet),
        Err(Error::InvalidObservation(_))
    ));
}
