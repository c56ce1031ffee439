use super::*;

use clap::ArgMatches;
use std::path::Path;
use std::sync::atomic::Ordering;

use chrono::Local;

use crate::common::{RUNNING, STATE, TERMINATING};
use crate::probe::PingProber;
use crate::record;
use crate::report;
use crate::sampler;

pub struct Config {
    host: String,
    interval: humantime::Duration,
    duration: humantime::Duration,
    verbose: u8,
}

impl TryFrom<ArgMatches> for Config {
    type Error = String;

    fn try_from(
        args: ArgMatches,
    ) -> Result<Self, <Self as std::convert::TryFrom<clap::ArgMatches>>::Error> {
        let interval = *args.get_one::<humantime::Duration>("INTERVAL").unwrap();
        let duration = *args.get_one::<humantime::Duration>("DURATION").unwrap();

        if interval.as_secs() == 0 {
            return Err("interval must be at least one second".to_string());
        }

        if *duration < *interval {
            return Err("duration must be at least one interval".to_string());
        }

        Ok(Config {
            host: args.get_one::<String>("HOST").unwrap().clone(),
            interval,
            duration,
            verbose: *args.get_one::<u8>("VERBOSE").unwrap_or(&0),
        })
    }
}

pub fn command() -> Command {
    Command::new("monitor")
        .about("Probe a host on a fixed cadence and record the results")
        .arg(
            clap::Arg::new("HOST")
                .help("Host to ping")
                .action(clap::ArgAction::Set)
                .required(true)
                .index(1),
        )
        .arg(
            clap::Arg::new("VERBOSE")
                .long("verbose")
                .short('v')
                .help("Increase the verbosity")
                .action(clap::ArgAction::Count),
        )
        .arg(
            clap::Arg::new("INTERVAL")
                .long("interval")
                .short('i')
                .help("Sets the probing interval")
                .action(clap::ArgAction::Set)
                .default_value("60s")
                .value_parser(value_parser!(humantime::Duration)),
        )
        .arg(
            clap::Arg::new("DURATION")
                .long("duration")
                .short('d')
                .help("Sets the total run duration")
                .action(clap::ArgAction::Set)
                .default_value("1h")
                .value_parser(value_parser!(humantime::Duration)),
        )
}

/// Runs the `monitor` mode which probes the host on a fixed cadence for the
/// configured duration, then writes the recording and report artifacts into
/// the working directory. Ctrl-c ends the run early and still finalizes the
/// artifacts from the samples collected so far; a second ctrl-c terminates
/// immediately.
pub fn run(config: Config) {
    // configure debug log
    let debug_output: Box<dyn Output> = Box::new(Stderr::new());

    let level = match config.verbose {
        0 => Level::Info,
        1 => Level::Debug,
        _ => Level::Trace,
    };

    let debug_log = if level <= Level::Info {
        LogBuilder::new().format(ringlog::default_format)
    } else {
        LogBuilder::new()
    }
    .output(debug_output)
    .build()
    .expect("failed to initialize debug log");

    let mut log = MultiLogBuilder::new()
        .level_filter(level.to_level_filter())
        .default(debug_log)
        .build()
        .start();

    // initialize async runtime
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(1)
        .thread_name("pingmon")
        .build()
        .expect("failed to launch async runtime");

    // spawn logging thread
    rt.spawn(async move {
        loop {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            let _ = log.flush();
        }
    });

    ctrlc::set_handler(move || {
        let state = STATE.load(Ordering::SeqCst);

        if state == RUNNING {
            info!("finalizing recording...");
            STATE.store(TERMINATING, Ordering::SeqCst);
        } else {
            info!("terminating immediately");
            std::process::exit(2);
        }
    })
    .expect("failed to set ctrl-c handler");

    // artifacts are named for the host and the moment the run started
    let started = Local::now().naive_local();
    let stamp = started.format("%Y%m%d_%H%M%S").to_string();
    let prefix = format!("{}_{stamp}", config.host);

    info!(
        "starting to ping {} every {} for {}",
        config.host, config.interval, config.duration
    );

    let prober = PingProber::default();

    let samples = match rt.block_on(sampler::run(
        &prober,
        &config.host,
        config.interval.into(),
        config.duration.into(),
    )) {
        Ok(samples) => samples,
        Err(e) => {
            eprintln!("probe failed: {e}");
            std::process::exit(1);
        }
    };

    if STATE.load(Ordering::SeqCst) == TERMINATING {
        info!("run interrupted, keeping {} samples", samples.len());
    }

    let dir = Path::new(".");
    let csv_path = dir.join(format!("{prefix}{}", report::CSV_SUFFIX));

    if let Err(e) = record::write(&samples, &csv_path) {
        eprintln!("failed to save results: {e}");
        std::process::exit(1);
    }

    info!("results saved to {}", csv_path.display());

    if let Err(e) = report::render(&samples, &config.host, &stamp, dir, &prefix) {
        eprintln!("failed to render report: {e}");
        std::process::exit(1);
    }

    // give the logging thread a chance to drain
    std::thread::sleep(std::time::Duration::from_millis(200));
}
