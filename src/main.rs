use backtrace::Backtrace;
use clap::{value_parser, Command};
use ringlog::*;

use std::path::PathBuf;

mod common;
mod monitor;
mod probe;
mod record;
mod report;
mod sampler;

fn main() {
    // custom panic hook to terminate whole process after unwinding
    std::panic::set_hook(Box::new(|s| {
        eprintln!("{s}");
        eprintln!("{:?}", Backtrace::new());
        std::process::exit(101);
    }));

    // parse command line options
    let matches = Command::new(env!("CARGO_BIN_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .long_about(
            "Pingmon probes a host with the platform ping binary on a fixed \
             cadence, records the observed round-trip times, and renders \
             uptime and latency reports.",
        )
        .subcommand_required(true)
        .subcommand(monitor::command())
        .subcommand(report::command())
        .get_matches();

    match matches.subcommand() {
        Some(("monitor", args)) => match monitor::Config::try_from(args.clone()) {
            Ok(config) => monitor::run(config),
            Err(error) => {
                eprintln!("{error}");
                std::process::exit(1);
            }
        },
        Some(("report", args)) => match report::Config::try_from(args.clone()) {
            Ok(config) => report::run(config),
            Err(error) => {
                eprintln!("{error}");
                std::process::exit(1);
            }
        },
        _ => unreachable!(),
    }
}
