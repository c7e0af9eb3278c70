//! The readiness probe (`spec.md` §4.2, step 5): bounded polling of the
//! child's health endpoint, used to decide whether an `ApplyConfig` attempt
//! succeeded. Passes when the endpoint reports OK **and** the child's PID
//! is still live.

use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// What the caller must supply so the probe can check liveness without
/// owning the child process directly: a cheap "is this PID still there"
/// check (cheaper than re-running `ChildProcess::poll_exit`, since the
/// probe may run on a thread that doesn't own the `ChildProcess` value).
pub trait LivenessCheck {
    fn is_alive(&self) -> bool;
}

/// Polls `health_url` via blocking HTTP GET until it returns a
/// success (2xx) status, `is_alive` reports the child has exited, or
/// `budget` elapses.
pub fn probe_until_ready(
    health_url: &str,
    liveness: &impl LivenessCheck,
    budget: Duration,
) -> ProbeOutcome {
    let client = match reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()
    {
        Ok(client) => client,
        Err(err) => return ProbeOutcome::Error(err.to_string()),
    };

    let deadline = Instant::now() + budget;
    loop {
        if !liveness.is_alive() {
            return ProbeOutcome::ChildExited;
        }

        if let Ok(response) = client.get(health_url).send() {
            if response.status().is_success() {
                return ProbeOutcome::Ready;
            }
        }

        if Instant::now() >= deadline {
            return ProbeOutcome::TimedOut;
        }

        std::thread::sleep(POLL_INTERVAL.min(deadline.saturating_duration_since(Instant::now())));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Ready,
    TimedOut,
    ChildExited,
    Error(String),
}

impl ProbeOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, ProbeOutcome::Ready)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysAlive;
    impl LivenessCheck for AlwaysAlive {
        fn is_alive(&self) -> bool {
            true
        }
    }

    struct AlreadyExited;
    impl LivenessCheck for AlreadyExited {
        fn is_alive(&self) -> bool {
            false
        }
    }

    #[test]
    fn reports_child_exited_immediately_when_not_alive() {
        let outcome = probe_until_ready(
            "http://127.0.0.1:1/health",
            &AlreadyExited,
            Duration::from_secs(5),
        );
        assert_eq!(outcome, ProbeOutcome::ChildExited);
    }

    #[test]
    fn times_out_when_endpoint_never_responds() {
        // port 0 always refuses immediately, so this completes quickly
        // without needing the full budget to elapse.
        let outcome = probe_until_ready(
            "http://127.0.0.1:0/health",
            &AlwaysAlive,
            Duration::from_millis(400),
        );
        assert_eq!(outcome, ProbeOutcome::TimedOut);
    }
}
