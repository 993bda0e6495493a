//! CLI entry point: recovers the last-round key of the Heys cipher.

use std::path::PathBuf;
use std::process::ExitCode;

use rand::Rng;
use structopt::StructOpt;

use heys_cryptanalysis::branch_bound::BetaStrategy;
use heys_cryptanalysis::corpus::Corpus;
use heys_cryptanalysis::driver::{Attack, AttackConfig};
use heys_cryptanalysis::error::Result;
use heys_cryptanalysis::heys::{Heys, ROUNDS};
use heys_cryptanalysis::m2;
use heys_cryptanalysis::options::AttackOptions;
use heys_cryptanalysis::sbox::Sbox;

/// The reference Heys S-box, per `original_source/heys/s_box.py::S_BOX`.
const REFERENCE_SBOX: [u8; 16] = [
    0xF, 0x6, 0x5, 0x8, 0xE, 0xB, 0xA, 0x4, 0xC, 0x0, 0x3, 0x7, 0x2, 0x9, 0x1, 0xD,
];

fn main() -> ExitCode {
    env_logger::init();
    let options = AttackOptions::from_args();

    match run(options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

fn run(options: AttackOptions) -> Result<()> {
    let sbox = Sbox::new(REFERENCE_SBOX)?;

    let config = AttackConfig {
        alphas: options.parsed_alphas(),
        threshold: options.threshold,
        max_approximations: options.max_approximations,
        attempts_per_alpha: 1,
        beta_strategy: BetaStrategy::Exact,
        top_keys: options.top_keys,
        threads: options.processes.unwrap_or_else(num_cpus::get),
        approximations_path: options
            .approximations_path
            .as_ref()
            .map(|p| PathBuf::from(p.as_str())),
    };

    let attack = Attack::new(&sbox, config);

    let (corpus, known_key) = if options.self_test {
        let mut rng = rand::thread_rng();
        let keys: Vec<u16> = (0..=ROUNDS).map(|_| rng.gen()).collect();
        let cipher = Heys::with_tables(attack.tables().clone(), keys.clone())?;
        let corpus = Corpus::generate(&cipher, options.corpus_size)?;
        (corpus, Some(keys[ROUNDS]))
    } else if let Some(path) = &options.corpus {
        (Corpus::load(&PathBuf::from(path.as_str()))?, None)
    } else {
        let mut rng = rand::thread_rng();
        let keys: Vec<u16> = (0..=ROUNDS).map(|_| rng.gen()).collect();
        let cipher = Heys::with_tables(attack.tables().clone(), keys)?;
        (Corpus::generate(&cipher, options.corpus_size)?, None)
    };

    log::info!(
        "running attack over {} known plaintexts, {} threads",
        corpus.len(),
        options.processes.unwrap_or_else(num_cpus::get)
    );

    let result = attack.run(&corpus)?;
    let ranked = m2::rank_keys(&result.votes);

    println!("recovered {} approximations", result.approximations.total());
    println!("top {} candidate last-round keys:", options.top_keys.min(20));
    for (key, votes) in ranked.iter().take(20) {
        println!("  0x{key:04x}  votes={votes}");
    }

    if let Some(expected) = known_key {
        let found = ranked.iter().take(options.top_keys).any(|&(k, _)| k == expected);
        println!(
            "self-test: expected key 0x{expected:04x} {} top {}",
            if found { "found in" } else { "NOT FOUND in" },
            options.top_keys
        );
    }

    Ok(())
}
