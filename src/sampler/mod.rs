use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use chrono::{Local, NaiveDateTime, Timelike};

use crate::common::{RUNNING, STATE};
use crate::debug;
use crate::probe::rtt::{self, Rtt};
use crate::probe::{ProbeError, Prober};

/// One recorded observation: when the probe started, what it printed, and the
/// latency extracted from that output.
#[derive(Debug, Clone)]
pub struct Sample {
    pub timestamp: NaiveDateTime,
    pub stdout: String,
    pub stderr: String,
    pub rtt: Rtt,
}

/// Drives the prober on a fixed cadence until `duration` has elapsed and
/// returns the samples in collection order. Each tick probes once, then
/// sleeps a full `interval`, so probe time stretches the cadence rather than
/// eating into the sleep. A probe that cannot run at all aborts the run;
/// unreachable hosts are ordinary samples.
pub async fn run<P: Prober>(
    prober: &P,
    host: &str,
    interval: Duration,
    duration: Duration,
) -> Result<Vec<Sample>, ProbeError> {
    let start = Instant::now();
    let mut samples = Vec::new();

    // sample in a loop until the run state changes or the duration has completed
    while STATE.load(Ordering::Relaxed) == RUNNING {
        if start.elapsed() >= duration {
            break;
        }

        // timestamps are recorded at whole-second granularity
        let now = Local::now().naive_local();
        let timestamp = now.with_nanosecond(0).unwrap_or(now);

        let begin = Instant::now();

        let outcome = prober.probe(host).await?;

        let latency = begin.elapsed();

        debug!("sampling latency: {} us", latency.as_micros());

        let rtt = rtt::extract(&outcome);

        samples.push(Sample {
            timestamp,
            stdout: outcome.stdout,
            stderr: outcome.stderr,
            rtt,
        });

        // wait before the next tick
        tokio::time::sleep(interval).await;
    }

    Ok(samples)
}
