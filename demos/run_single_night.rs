//! Worked usage example: load a configuration, run the pipeline, and print
//! each night's outcome.
//!
//! Run with: `cargo run --example run_single_night -- path/to/config.toml`

use std::env;
use std::process;

use m23_engine::catalog::Config;
use m23_engine::pipeline;

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <config.toml>", args[0]);
        process::exit(1);
    }

    let config_text = match std::fs::read_to_string(&args[1]) {
        Ok(text) => text,
        Err(err) => {
            eprintln!("could not read {}: {err}", args[1]);
            process::exit(1);
        }
    };

    let config: Config = match toml::from_str(&config_text) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("could not parse {}: {err}", args[1]);
            process::exit(1);
        }
    };

    // One worker per physical core, capped at the number of configured
    // nights — nights are independent, so parallelism is coarse-grained.
    let max_workers = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(config.input.nights.len().max(1));

    match pipeline::run(&config, max_workers) {
        Ok(outcomes) => {
            let mut failures = 0;
            for outcome in &outcomes {
                match &outcome.result {
                    Ok(state) => println!("{}: reached {state:?}", outcome.label),
                    Err(fatal) => {
                        failures += 1;
                        eprintln!("{}: {fatal}", outcome.label);
                    }
                }
            }
            if failures > 0 {
                process::exit(1);
            }
        }
        Err(err) => {
            eprintln!("pipeline did not start: {err}");
            process::exit(1);
        }
    }
}
