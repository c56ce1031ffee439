use super::ProbeOutcome;

/// Marker `ping` prints when a hop reports the destination down.
const UNREACHABLE_MARKER: &str = "Destination Host Unreachable";

/// Marker preceding the round-trip time on each echo reply line.
const RTT_MARKER: &str = "time=";

/// Latency classification for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rtt {
    /// Mean round-trip time across the echo replies of one probe, in
    /// milliseconds.
    Millis(f64),
    /// No usable latency could be determined.
    Unreachable,
}

impl Rtt {
    /// The online/offline split in the report derives from exactly this test.
    pub fn is_reachable(&self) -> bool {
        matches!(self, Rtt::Millis(_))
    }
}

/// Classify one probe's output into a mean round-trip time or `Unreachable`.
///
/// Anything on stderr takes priority over stdout: the probe ran but the
/// platform complained, so the tick counts as unreachable even when stdout
/// carries timing lines. On each remaining line the value is taken from after
/// the last `time=` marker, up to the next whitespace. A malformed value
/// abandons the whole scan and classifies the tick unreachable; it does not
/// skip to the next line.
pub fn extract(outcome: &ProbeOutcome) -> Rtt {
    if outcome.stdout.contains(UNREACHABLE_MARKER) || !outcome.stderr.is_empty() {
        return Rtt::Unreachable;
    }

    let mut rtts = Vec::new();

    for line in outcome.stdout.lines() {
        if let Some((_, rest)) = line.rsplit_once(RTT_MARKER) {
            let token = match rest.split_whitespace().next() {
                Some(token) => token,
                None => return Rtt::Unreachable,
            };

            match token.parse::<f64>() {
                Ok(value) => rtts.push(value),
                Err(_) => return Rtt::Unreachable,
            }
        }
    }

    if rtts.is_empty() {
        Rtt::Unreachable
    } else {
        Rtt::Millis(rtts.iter().sum::<f64>() / rtts.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(stdout: &str, stderr: &str) -> ProbeOutcome {
        ProbeOutcome {
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        }
    }

    fn assert_millis(outcome: &ProbeOutcome, expected: f64) {
        match extract(outcome) {
            Rtt::Millis(value) => assert!(
                (value - expected).abs() < 1e-9,
                "expected {expected} ms, got {value} ms"
            ),
            Rtt::Unreachable => panic!("expected {expected} ms, got unreachable"),
        }
    }

    #[test]
    fn test_mean_of_reply_lines() {
        let outcome = outcome(
            "64 bytes from 1.1.1.1: icmp_seq=1 ttl=58 time=10.0 ms\n\
             64 bytes from 1.1.1.1: icmp_seq=2 ttl=58 time=20.0 ms\n",
            "",
        );
        assert_eq!(extract(&outcome), Rtt::Millis(15.0));
    }

    #[test]
    fn test_single_reply() {
        let outcome = outcome("64 bytes from 1.1.1.1: icmp_seq=1 ttl=58 time=10.3 ms\n", "");
        assert_millis(&outcome, 10.3);
    }

    #[test]
    fn test_realistic_transcript() {
        let outcome = outcome(
            "PING 8.8.8.8 (8.8.8.8) 56(84) bytes of data.\n\
             64 bytes from 8.8.8.8: icmp_seq=1 ttl=117 time=11.6 ms\n\
             64 bytes from 8.8.8.8: icmp_seq=2 ttl=117 time=11.9 ms\n\
             64 bytes from 8.8.8.8: icmp_seq=3 ttl=117 time=12.1 ms\n\
             64 bytes from 8.8.8.8: icmp_seq=4 ttl=117 time=11.8 ms\n\
             \n\
             --- 8.8.8.8 ping statistics ---\n\
             4 packets transmitted, 4 received, 0% packet loss, time 3004ms\n\
             rtt min/avg/max/mdev = 11.585/11.850/12.112/0.187 ms\n",
            "",
        );
        assert_millis(&outcome, 11.85);
    }

    #[test]
    fn test_stderr_wins_over_timing_lines() {
        let outcome = outcome(
            "64 bytes from 1.1.1.1: icmp_seq=1 ttl=58 time=10.0 ms\n",
            "ping: sendmsg: Network is unreachable\n",
        );
        assert_eq!(extract(&outcome), Rtt::Unreachable);
    }

    #[test]
    fn test_unreachable_marker_in_stdout() {
        let outcome = outcome(
            "PING 192.168.1.50 (192.168.1.50) 56(84) bytes of data.\n\
             From 192.168.1.1 icmp_seq=1 Destination Host Unreachable\n",
            "",
        );
        assert_eq!(extract(&outcome), Rtt::Unreachable);
    }

    #[test]
    fn test_marker_wins_over_timing_lines() {
        // intermittent loss: some replies arrived but a hop reported the
        // destination down, so the tick still counts as unreachable
        let outcome = outcome(
            "64 bytes from 192.168.1.50: icmp_seq=1 ttl=64 time=0.5 ms\n\
             From 192.168.1.1 icmp_seq=2 Destination Host Unreachable\n",
            "",
        );
        assert_eq!(extract(&outcome), Rtt::Unreachable);
    }

    #[test]
    fn test_no_timing_lines() {
        let outcome = outcome(
            "PING 10.0.0.9 (10.0.0.9) 56(84) bytes of data.\n\
             \n\
             --- 10.0.0.9 ping statistics ---\n\
             4 packets transmitted, 0 received, 100% packet loss, time 3065ms\n",
            "",
        );
        assert_eq!(extract(&outcome), Rtt::Unreachable);
    }

    #[test]
    fn test_empty_output() {
        let outcome = outcome("", "");
        assert_eq!(extract(&outcome), Rtt::Unreachable);
    }

    #[test]
    fn test_malformed_value_abandons_scan() {
        // the valid line is discarded too, the scan does not resume
        let outcome = outcome(
            "64 bytes from 1.1.1.1: icmp_seq=1 ttl=58 time=abc ms\n\
             64 bytes from 1.1.1.1: icmp_seq=2 ttl=58 time=20.0 ms\n",
            "",
        );
        assert_eq!(extract(&outcome), Rtt::Unreachable);
    }

    #[test]
    fn test_marker_at_line_end() {
        let outcome = outcome("64 bytes from 1.1.1.1: icmp_seq=1 ttl=58 time=\n", "");
        assert_eq!(extract(&outcome), Rtt::Unreachable);
    }

    #[test]
    fn test_value_after_last_marker() {
        // a line with repeated markers reads the value after the last one
        let outcome = outcome("noise time=1.0 real time=30.0 ms\n", "");
        assert_millis(&outcome, 30.0);
    }

    #[test]
    fn test_is_reachable() {
        assert!(Rtt::Millis(0.5).is_reachable());
        assert!(!Rtt::Unreachable.is_reachable());
    }
}
