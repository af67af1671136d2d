use std::env;
use std::path::Path;
use std::process;

use mnist_vae::search::space::SearchSpace;
use mnist_vae::search::study::Study;
use mnist_vae::train::config::RunConfig;
use mnist_vae::train::trial::run_trial;

const DATA_DIR: &str = "MNIST_data";
const STUDY_FILE: &str = "search_study.json";

fn main() {
    // No arguments: train the fixed reference configuration once.
    // Any arguments (their values are ignored): run one search iteration.
    let search_mode = env::args().len() > 1;
    let result = if search_mode { search_once() } else { single_run() };
    if let Err(err) = result {
        eprintln!("error: {}", err);
        process::exit(1);
    }
}

/// Trains the reference configuration and prints its final score.
fn single_run() -> Result<(), String> {
    let score = run_trial(&RunConfig::reference(), Path::new(DATA_DIR))?;
    println!("loss={}", score.value());
    Ok(())
}

/// One propose → train → report iteration against the persistent study.
fn search_once() -> Result<(), String> {
    let mut study = Study::open(Path::new(STUDY_FILE))?;
    let space = SearchSpace::digits();
    let (token, params) = study.propose(&space)?;
    println!("Parameters: {:?} Token: {}", params, token);
    let config = params.into_config(0.99, 150, token as i64);
    let score = run_trial(&config, Path::new(DATA_DIR))?;
    study.report(token, score.value())
}
