use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;

pub mod rtt;

/// Echo requests sent per probe.
pub const DEFAULT_COUNT: u32 = 4;

/// Per-request reply timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(4);

/// Raw output of one reachability probe. Both streams are captured as text
/// and handed to the extractor untouched.
#[derive(Debug, Clone, Default)]
pub struct ProbeOutcome {
    pub stdout: String,
    pub stderr: String,
}

/// Error for a probe that could not run at all. An unreachable host is not an
/// error: it comes back as a normal `ProbeOutcome` whose text encodes the
/// failure.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("failed to invoke ping: {0}")]
    Spawn(#[from] std::io::Error),
}

/// One latency measurement against a host. The sampling loop is generic over
/// this so tests can drive it with deterministic probers.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, host: &str) -> Result<ProbeOutcome, ProbeError>;
}

/// Probes by spawning the platform `ping` binary and waiting for it to exit.
pub struct PingProber {
    count: u32,
    timeout: Duration,
}

impl PingProber {
    /// `count` echo requests per probe with `timeout` to wait on each reply.
    /// Both are clamped to at least one request and one second, the minimums
    /// `ping` accepts.
    pub fn new(count: u32, timeout: Duration) -> Self {
        Self {
            count: count.max(1),
            timeout: timeout.max(Duration::from_secs(1)),
        }
    }
}

impl Default for PingProber {
    fn default() -> Self {
        Self::new(DEFAULT_COUNT, DEFAULT_TIMEOUT)
    }
}

#[async_trait]
impl Prober for PingProber {
    async fn probe(&self, host: &str) -> Result<ProbeOutcome, ProbeError> {
        let output = Command::new("ping")
            .arg("-c")
            .arg(self.count.to_string())
            .arg("-W")
            .arg(self.timeout.as_secs().to_string())
            .arg(host)
            .output()
            .await?;

        Ok(ProbeOutcome {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prober_clamps_arguments() {
        let prober = PingProber::new(0, Duration::from_millis(10));
        assert_eq!(prober.count, 1);
        assert_eq!(prober.timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_default_prober() {
        let prober = PingProber::default();
        assert_eq!(prober.count, DEFAULT_COUNT);
        assert_eq!(prober.timeout, DEFAULT_TIMEOUT);
    }
}
