//! The restart-policy state machine (`spec.md` §4.2), distinct from the
//! `ApplyConfig` atomic-apply algorithm: it is triggered only when the
//! child exits *unexpectedly* (not as part of an intentional apply).
//!
//! Generalizes the conventional
//! `sub_agent/on_host/command/restart_policy.rs` `Backoff`/`BackoffStrategy`
//! pair: that implementation hard-codes an exponential-base-2 step with no
//! cap and resets purely on elapsed wall-clock time since the last retry.
//! This spec names `initial_delay`, `max_delay` and `backoff_multiplier`
//! explicitly and additionally asks for a "3 consecutive successful runs"
//! reset rule, so the cap and the multiplier become fields on
//! [`BackoffParams`] and `consecutive_successes` becomes explicit counted
//! state on [`Backoff`] rather than an elapsed-time heuristic.

use std::time::Duration;

/// What the child exit looked like, from the restart policy's point of
/// view: whether it was a clean exit (code 0, no signal).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitOutcome {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl ExitOutcome {
    pub fn success(&self) -> bool {
        self.code == Some(0) && self.signal.is_none()
    }
}

/// What the supervisor's writer thread should do after consulting the
/// restart policy for an unexpected exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartDecision {
    /// Do not restart; settle into `Stopped`.
    Stop,
    /// Wait `Duration` (interruptibly) then restart.
    RetryAfter(Duration),
    /// `max_retries` exhausted; settle into `Failed`.
    GiveUp,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffParams {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub max_retries: u32,
}

impl Default for BackoffParams {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
            max_retries: 5,
        }
    }
}

/// The parameterized exponential-backoff state the `OnFailure` variant
/// carries (`spec.md` §4.2). `retry_count` and `current_delay` advance on
/// every failed run; `consecutive_successes` advances on a run that held
/// `Running` for at least 60s (`spec.md`'s definition of "successful run")
/// and resets the whole sequence once it reaches 3.
#[derive(Debug, Clone, PartialEq)]
pub struct Backoff {
    params: BackoffParams,
    current_delay: Duration,
    retry_count: u32,
    consecutive_successes: u8,
}

const SUCCESSFUL_RUNS_TO_RESET: u8 = 3;

impl Backoff {
    pub fn new(params: BackoffParams) -> Self {
        Self {
            current_delay: params.initial_delay,
            params,
            retry_count: 0,
            consecutive_successes: 0,
        }
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn current_delay(&self) -> Duration {
        self.current_delay
    }

    /// Advances the backoff sequence one failure. Returns the delay to
    /// wait before the next start attempt, or `None` if `max_retries` has
    /// been exhausted.
    pub fn advance(&mut self) -> Option<Duration> {
        if self.retry_count >= self.params.max_retries {
            return None;
        }
        let delay = self.current_delay;
        self.retry_count += 1;
        self.consecutive_successes = 0;
        let next_secs = (self.current_delay.as_secs_f64() * self.params.multiplier)
            .min(self.params.max_delay.as_secs_f64());
        self.current_delay = Duration::from_secs_f64(next_secs);
        Some(delay)
    }

    /// Called once a started run has held `Running` for at least 60s.
    /// After `SUCCESSFUL_RUNS_TO_RESET` such runs, the sequence resets to
    /// its initial state.
    pub fn record_successful_run(&mut self) {
        self.consecutive_successes = self.consecutive_successes.saturating_add(1);
        if self.consecutive_successes >= SUCCESSFUL_RUNS_TO_RESET {
            self.retry_count = 0;
            self.current_delay = self.params.initial_delay;
            self.consecutive_successes = 0;
        }
    }
}

/// The declared restart policy for the supervised child (`spec.md` §3,
/// `RestartPolicy`), as a tagged variant over its three modes. Each
/// variant carries the parameter block (and, for `OnFailure`, mutable
/// backoff state) relevant to it — `Never` and `Always` need no backoff
/// state since they never give up retrying on their own.
#[derive(Debug, Clone, PartialEq)]
pub enum RestartPolicy {
    Never,
    Always { initial_delay: Duration },
    OnFailure(Backoff),
}

impl RestartPolicy {
    pub fn on_failure(params: BackoffParams) -> Self {
        RestartPolicy::OnFailure(Backoff::new(params))
    }

    /// Consults the policy after an *unexpected* child exit.
    pub fn on_unexpected_exit(&mut self, exit: ExitOutcome) -> RestartDecision {
        match self {
            RestartPolicy::Never => RestartDecision::Stop,
            RestartPolicy::Always { initial_delay } => RestartDecision::RetryAfter(*initial_delay),
            RestartPolicy::OnFailure(backoff) => {
                if exit.success() {
                    RestartDecision::Stop
                } else {
                    match backoff.advance() {
                        Some(delay) => RestartDecision::RetryAfter(delay),
                        None => RestartDecision::GiveUp,
                    }
                }
            }
        }
    }

    /// Called once the restarted child has held `Running` for at least
    /// 60s, so `OnFailure`'s backoff can reset after enough good runs.
    pub fn record_successful_run(&mut self) {
        if let RestartPolicy::OnFailure(backoff) = self {
            backoff.record_successful_run();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crash() -> ExitOutcome {
        ExitOutcome {
            code: Some(1),
            signal: None,
        }
    }

    fn clean_exit() -> ExitOutcome {
        ExitOutcome {
            code: Some(0),
            signal: None,
        }
    }

    #[test]
    fn never_never_retries() {
        let mut policy = RestartPolicy::Never;
        assert_eq!(policy.on_unexpected_exit(crash()), RestartDecision::Stop);
    }

    #[test]
    fn always_retries_with_fixed_delay_regardless_of_exit_code() {
        let mut policy = RestartPolicy::Always {
            initial_delay: Duration::from_secs(5),
        };
        assert_eq!(
            policy.on_unexpected_exit(crash()),
            RestartDecision::RetryAfter(Duration::from_secs(5))
        );
        assert_eq!(
            policy.on_unexpected_exit(clean_exit()),
            RestartDecision::RetryAfter(Duration::from_secs(5))
        );
    }

    #[test]
    fn on_failure_treats_clean_exit_as_stop() {
        let mut policy = RestartPolicy::on_failure(BackoffParams::default());
        assert_eq!(
            policy.on_unexpected_exit(clean_exit()),
            RestartDecision::Stop
        );
    }

    #[test]
    fn on_failure_backs_off_exponentially_and_caps_at_max_retries() {
        let params = BackoffParams {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
            max_retries: 3,
        };
        let mut policy = RestartPolicy::on_failure(params);

        assert_eq!(
            policy.on_unexpected_exit(crash()),
            RestartDecision::RetryAfter(Duration::from_secs(1))
        );
        assert_eq!(
            policy.on_unexpected_exit(crash()),
            RestartDecision::RetryAfter(Duration::from_secs(2))
        );
        assert_eq!(
            policy.on_unexpected_exit(crash()),
            RestartDecision::RetryAfter(Duration::from_secs(4))
        );
        assert_eq!(policy.on_unexpected_exit(crash()), RestartDecision::GiveUp);
    }

    #[test]
    fn on_failure_caps_delay_at_max_delay_even_with_large_multiplier() {
        let params = BackoffParams {
            initial_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(30),
            multiplier: 100.0,
            max_retries: 10,
        };
        let mut backoff = Backoff::new(params);

        backoff.advance();
        let second = backoff.advance().unwrap();
        assert_eq!(second, Duration::from_secs(30));
        let third = backoff.advance().unwrap();
        assert_eq!(third, Duration::from_secs(30));
    }

    #[test]
    fn three_consecutive_successful_runs_reset_the_sequence() {
        let params = BackoffParams {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
            max_retries: 3,
        };
        let mut policy = RestartPolicy::on_failure(params);

        policy.on_unexpected_exit(crash());
        policy.on_unexpected_exit(crash());

        policy.record_successful_run();
        policy.record_successful_run();
        policy.record_successful_run();

        // The sequence reset, so the next failure should back off from
        // `initial_delay` again instead of continuing the exponential climb.
        assert_eq!(
            policy.on_unexpected_exit(crash()),
            RestartDecision::RetryAfter(Duration::from_secs(1))
        );
    }
}
