use super::*;

use anyhow::Context;
use clap::ArgMatches;
use histogram::Histogram;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::common::PERCENTILES;
use crate::probe::rtt::Rtt;
use crate::record;
use crate::sampler::Sample;

mod chart;

/// Artifact name suffixes. A run writes `{host}_{YYYYmmdd_HHMMSS}` plus one
/// of these for each artifact.
pub const CSV_SUFFIX: &str = "_ping_results.csv";
pub const PLOT_SUFFIX: &str = "_ping_results_plot.svg";
pub const PIE_SUFFIX: &str = "_ping_results_pie.svg";
pub const SUMMARY_SUFFIX: &str = "_ping_results_summary.json";

pub fn command() -> Command {
    Command::new("report")
        .about("Render charts and a summary from a recorded CSV")
        .arg(
            clap::Arg::new("INPUT")
                .help("Recorded ping results CSV")
                .value_parser(value_parser!(PathBuf))
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
}

pub struct Config {
    input: PathBuf,
    verbose: u8,
}

impl TryFrom<ArgMatches> for Config {
    type Error = String;

    fn try_from(
        args: ArgMatches,
    ) -> Result<Self, <Self as std::convert::TryFrom<clap::ArgMatches>>::Error> {
        Ok(Config {
            input: args.get_one::<PathBuf>("INPUT").unwrap().to_path_buf(),
            verbose: *args.get_one::<u8>("VERBOSE").unwrap_or(&0),
        })
    }
}

/// Runs the `report` mode which re-renders the charts and summary from an
/// existing recording, without probing anything. The artifacts land next to
/// the input file and the host and run timestamp are recovered from its name.
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
        std::process::exit(2);
    })
    .expect("failed to set ctrl-c handler");

    let samples = match record::read(&config.input) {
        Ok(samples) => samples,
        Err(e) => {
            eprintln!("failed to load recording: {e}");
            std::process::exit(1);
        }
    };

    info!(
        "loaded {} samples from {}",
        samples.len(),
        config.input.display()
    );

    let dir = config.input.parent().unwrap_or(Path::new("."));

    let name = config
        .input
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();

    let prefix = name
        .strip_suffix(CSV_SUFFIX)
        .or_else(|| name.strip_suffix(".csv"))
        .unwrap_or(name);

    let (host, stamp) = split_prefix(prefix);

    if let Err(e) = render(&samples, &host, &stamp, dir, prefix) {
        eprintln!("failed to render report: {e}");
        std::process::exit(1);
    }

    // give the logging thread a chance to drain
    std::thread::sleep(std::time::Duration::from_millis(200));
}

/// Writes the three report artifacts for one recording: the latency chart,
/// the uptime pie, and the summary JSON.
pub fn render(
    samples: &[Sample],
    host: &str,
    stamp: &str,
    dir: &Path,
    prefix: &str,
) -> anyhow::Result<()> {
    let title = title_for(host, stamp);

    let online = samples.iter().filter(|s| s.rtt.is_reachable()).count();
    let offline = samples.len() - online;

    let plot_path = dir.join(format!("{prefix}{PLOT_SUFFIX}"));
    std::fs::write(&plot_path, chart::line_chart(samples, &title))
        .with_context(|| format!("failed to write {}", plot_path.display()))?;

    let pie_path = dir.join(format!("{prefix}{PIE_SUFFIX}"));
    std::fs::write(
        &pie_path,
        chart::uptime_pie(online, offline, &format!("Uptime for {title}")),
    )
    .with_context(|| format!("failed to write {}", pie_path.display()))?;

    let summary = Summary::from_samples(host, samples);
    let summary_path = dir.join(format!("{prefix}{SUMMARY_SUFFIX}"));
    let mut json = serde_json::to_string_pretty(&summary).context("failed to serialize summary")?;
    json.push('\n');
    std::fs::write(&summary_path, json)
        .with_context(|| format!("failed to write {}", summary_path.display()))?;

    info!(
        "plots saved to {} and {}",
        plot_path.display(),
        pie_path.display()
    );
    info!("summary saved to {}", summary_path.display());

    Ok(())
}

fn title_for(host: &str, stamp: &str) -> String {
    if stamp.is_empty() {
        format!("Ping Results for {host}")
    } else {
        format!("Ping Results for {host} at {stamp}")
    }
}

/// Splits an artifact prefix back into host and run timestamp. Prefixes look
/// like `{host}_{YYYYmmdd}_{HHMMSS}` and hosts may themselves contain
/// underscores. A prefix that does not match keeps everything as the host.
fn split_prefix(prefix: &str) -> (String, String) {
    let parts: Vec<&str> = prefix.rsplitn(3, '_').collect();

    if parts.len() == 3
        && parts[0].len() == 6
        && parts[0].chars().all(|c| c.is_ascii_digit())
        && parts[1].len() == 8
        && parts[1].chars().all(|c| c.is_ascii_digit())
    {
        (parts[2].to_string(), format!("{}_{}", parts[1], parts[0]))
    } else {
        (prefix.to_string(), String::new())
    }
}

#[derive(Debug, Serialize)]
pub struct Summary {
    pub host: String,
    pub started: Option<String>,
    pub ended: Option<String>,
    pub samples: usize,
    pub online: usize,
    pub offline: usize,
    pub uptime_pct: f64,
    pub rtt_ms: Option<RttSummary>,
}

#[derive(Debug, Serialize)]
pub struct RttSummary {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub percentiles: BTreeMap<String, f64>,
}

impl Summary {
    pub fn from_samples(host: &str, samples: &[Sample]) -> Self {
        let online = samples.iter().filter(|s| s.rtt.is_reachable()).count();
        let offline = samples.len() - online;

        let uptime_pct = if samples.is_empty() {
            0.0
        } else {
            online as f64 / samples.len() as f64 * 100.0
        };

        Self {
            host: host.to_string(),
            started: samples
                .first()
                .map(|s| s.timestamp.format(record::TIMESTAMP_FORMAT).to_string()),
            ended: samples
                .last()
                .map(|s| s.timestamp.format(record::TIMESTAMP_FORMAT).to_string()),
            samples: samples.len(),
            online,
            offline,
            uptime_pct,
            rtt_ms: RttSummary::from_samples(samples),
        }
    }
}

impl RttSummary {
    fn from_samples(samples: &[Sample]) -> Option<Self> {
        let rtts: Vec<f64> = samples
            .iter()
            .filter_map(|s| match s.rtt {
                Rtt::Millis(value) => Some(value),
                Rtt::Unreachable => None,
            })
            .collect();

        if rtts.is_empty() {
            return None;
        }

        let mean = rtts.iter().sum::<f64>() / rtts.len() as f64;
        let min = rtts.iter().cloned().fold(f64::MAX, f64::min);
        let max = rtts.iter().cloned().fold(f64::MIN, f64::max);

        // percentiles come from a histogram over microseconds, so they carry
        // the bucketing error rather than being exact order statistics
        let mut histogram = Histogram::new(7, 32).expect("histogram parameters are valid");

        for value in &rtts {
            let _ = histogram.increment((value.max(0.0) * 1000.0).round() as u64);
        }

        let mut percentiles = BTreeMap::new();
        // the table is percent-valued; the histogram api takes fractions
        let targets: Vec<f64> = PERCENTILES.iter().map(|(_, p)| *p / 100.0).collect();

        if let Ok(Some(buckets)) = histogram.percentiles(&targets) {
            for ((label, _), (_, bucket)) in PERCENTILES.iter().zip(buckets) {
                percentiles.insert((*label).to_string(), bucket.end() as f64 / 1000.0);
            }
        }

        Some(RttSummary {
            mean,
            min,
            max,
            percentiles,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample(secs: u32, rtt: Rtt) -> Sample {
        Sample {
            timestamp: NaiveDate::from_ymd_opt(2025, 6, 1)
                .unwrap()
                .and_hms_opt(8, 30, secs)
                .unwrap(),
            stdout: String::new(),
            stderr: String::new(),
            rtt,
        }
    }

    fn scenario() -> Vec<Sample> {
        vec![
            sample(0, Rtt::Millis(5.0)),
            sample(1, Rtt::Unreachable),
            sample(2, Rtt::Millis(12.5)),
        ]
    }

    #[test]
    fn test_split_prefix() {
        assert_eq!(
            split_prefix("8.8.8.8_20250601_083000"),
            ("8.8.8.8".to_string(), "20250601_083000".to_string())
        );
        assert_eq!(
            split_prefix("my_host_20250601_083000"),
            ("my_host".to_string(), "20250601_083000".to_string())
        );
        assert_eq!(split_prefix("results"), ("results".to_string(), String::new()));
        assert_eq!(
            split_prefix("host_1234_567890"),
            ("host_1234_567890".to_string(), String::new())
        );
    }

    #[test]
    fn test_title_for() {
        assert_eq!(
            title_for("8.8.8.8", "20250601_083000"),
            "Ping Results for 8.8.8.8 at 20250601_083000"
        );
        assert_eq!(title_for("8.8.8.8", ""), "Ping Results for 8.8.8.8");
    }

    #[test]
    fn test_summary_counts() {
        let summary = Summary::from_samples("10.0.0.1", &scenario());

        assert_eq!(summary.host, "10.0.0.1");
        assert_eq!(summary.samples, 3);
        assert_eq!(summary.online, 2);
        assert_eq!(summary.offline, 1);
        assert!((summary.uptime_pct - 200.0 / 3.0).abs() < 1e-9);
        assert_eq!(summary.started.as_deref(), Some("2025-06-01 08:30:00"));
        assert_eq!(summary.ended.as_deref(), Some("2025-06-01 08:30:02"));
    }

    #[test]
    fn test_summary_rtt_aggregates() {
        let samples = vec![
            sample(0, Rtt::Millis(5.0)),
            sample(1, Rtt::Millis(10.0)),
            sample(2, Rtt::Millis(12.5)),
        ];

        let rtt = Summary::from_samples("h", &samples)
            .rtt_ms
            .expect("had reachable samples");

        assert!((rtt.mean - 27.5 / 3.0).abs() < 1e-9);
        assert!((rtt.min - 5.0).abs() < 1e-9);
        assert!((rtt.max - 12.5).abs() < 1e-9);

        // every percentile in the table must come back under its label
        assert_eq!(
            rtt.percentiles.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["p50", "p90", "p99"]
        );

        // bucketed values land at or slightly above the exact latency
        let p50 = rtt.percentiles.get("p50").copied().unwrap();
        let p99 = rtt.percentiles.get("p99").copied().unwrap();
        assert!((10.0..=10.2).contains(&p50), "p50 was {p50}");
        assert!((12.5..=12.7).contains(&p99), "p99 was {p99}");
    }

    #[test]
    fn test_summary_without_reachable_samples() {
        let samples = vec![sample(0, Rtt::Unreachable)];
        let summary = Summary::from_samples("h", &samples);

        assert!(summary.rtt_ms.is_none());
        assert_eq!(summary.uptime_pct, 0.0);

        let value = serde_json::to_value(&summary).unwrap();
        assert!(value["rtt_ms"].is_null());
    }

    #[test]
    fn test_summary_empty() {
        let summary = Summary::from_samples("h", &[]);

        assert_eq!(summary.samples, 0);
        assert_eq!(summary.uptime_pct, 0.0);
        assert!(summary.started.is_none());
        assert!(summary.ended.is_none());
        assert!(summary.rtt_ms.is_none());
    }

    #[test]
    fn test_render_writes_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = "10.0.0.1_20250601_083000";

        render(
            &scenario(),
            "10.0.0.1",
            "20250601_083000",
            dir.path(),
            prefix,
        )
        .unwrap();

        let plot = dir.path().join(format!("{prefix}{PLOT_SUFFIX}"));
        let pie = dir.path().join(format!("{prefix}{PIE_SUFFIX}"));
        let summary = dir.path().join(format!("{prefix}{SUMMARY_SUFFIX}"));

        let svg = std::fs::read_to_string(plot).unwrap();
        assert!(svg.contains("Ping Results for 10.0.0.1 at 20250601_083000"));

        let pie_svg = std::fs::read_to_string(pie).unwrap();
        assert!(pie_svg.contains("Uptime for Ping Results for 10.0.0.1 at 20250601_083000"));

        let text = std::fs::read_to_string(summary).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(value["host"], "10.0.0.1");
        assert_eq!(value["online"], 2);
        assert_eq!(value["offline"], 1);
    }
}
