use anyhow::{Context, Result};
use clap::{Arg, Command};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use std::path::PathBuf;
use std::time::Instant;

use casino_viterbi::utils::{self, DecoderSetup};
use casino_viterbi::{Decoding, Viterbi};

#[derive(Serialize)]
struct Report<'a> {
    observations: String,
    states: String,
    error_rate: Option<f64>,
    decoding: &'a Decoding,
}

fn load_setup(config: Option<&str>, width: Option<&str>) -> Result<DecoderSetup> {
    let mut setup = match config {
        Some(f) => {
            let path = PathBuf::from(f);
            utils::Config::from_config_file(&path)
                .and_then(|config| config.load())
                .with_context(|| format!("can not load the model described in {}", path.display()))?
        }
        None => utils::dishonest_casino()?,
    };
    if let Some(w) = width {
        setup.width = w
            .parse::<usize>()
            .ok()
            .filter(|&w| w > 0)
            .with_context(|| format!("invalid line width {:?}", w))?;
    }
    Ok(setup)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let matches = Command::new("casino-viterbi")
        .version("0.1")
        .author("Alexandre Dubray <alexandre.dubray@uclouvain.be>")
        .about("Most likely hidden states behind a sequence of observations")
        .arg(Arg::new("observations")
            .value_name("FILE")
            .help("file holding the observations, one symbol per character")
            .takes_value(true)
            .required(true))
        .arg(Arg::new("config")
            .short('c')
            .long("config")
            .value_name("FILE")
            .help("model configuration file (the dishonest casino if absent)")
            .takes_value(true))
        .arg(Arg::new("width")
            .short('w')
            .long("width")
            .value_name("COLUMNS")
            .help("characters per printed line")
            .takes_value(true))
        .arg(Arg::new("truth")
            .short('t')
            .long("truth")
            .value_name("FILE")
            .help("file holding the true state labels, to report the error rate")
            .takes_value(true))
        .arg(Arg::new("json")
            .long("json")
            .help("print the path and the full lattice as JSON")
            .takes_value(false))
        .get_matches();

    let setup = load_setup(matches.value_of("config"), matches.value_of("width"))?;

    let input = PathBuf::from(matches.value_of("observations").context("no observation file provided")?);
    let observations = utils::load_observations(&input, &setup.alphabet)
        .with_context(|| format!("can not read observations from {}", input.display()))?;

    let start = Instant::now();
    let decoding = Viterbi::new(&setup.hmm)
        .decode_with_lattice(&observations)
        .with_context(|| format!("can not decode {}", input.display()))?;
    info!(len = observations.len(), elapsed_ms = start.elapsed().as_millis() as u64, "decoded");

    let error_rate = match matches.value_of("truth") {
        Some(f) => {
            let path = PathBuf::from(f);
            let truth = utils::load_labels(&path, &setup)
                .with_context(|| format!("can not read true states from {}", path.display()))?;
            Some(utils::error_rate(&decoding.path, &truth)?)
        }
        None => None,
    };

    let symbols = setup.alphabet.decode(&observations);
    let states = setup.label_path(&decoding.path);
    if matches.is_present("json") {
        let report = Report {
            observations: symbols,
            states,
            error_rate,
            decoding: &decoding,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", utils::format_alignment(&symbols, &states, setup.width));
        println!("Log probability of the path {:.5}", decoding.log_probability);
        if let Some(rate) = error_rate {
            println!("Error rate {:.5}", rate);
        }
    }
    Ok(())
}
