//! Waiter - Poll a remote resource until it settles
//!
//! Control-plane calls return as soon as a request is accepted while the
//! resource itself keeps moving through server-side states. A [`Waiter`]
//! re-issues a status probe on a fixed interval until the observed status
//! reaches the target set of a [`WaitSpec`], leaves its pending set, the
//! timeout elapses, or the operation is cancelled.
//!
//! Per resource type the only differences are data: which statuses are
//! pending, which are the target, and how long to wait.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use log::debug;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Rendering of the "resource not found" sentinel in errors and logs
pub const NOT_FOUND_STATE: &str = "NotFound";

/// A lifecycle status reported by a control plane
pub trait StatusToken: Copy + PartialEq + fmt::Debug + fmt::Display + Send + Sync + 'static {
    /// Whether this status reports that the remote operation failed
    fn is_failure(&self) -> bool;
}

/// Outcome of a single status probe
#[derive(Debug, Clone, PartialEq)]
pub enum Probe<T, S> {
    /// The describe call reported that the resource does not exist
    NotFound,
    /// The resource exists and reported `status`
    Found {
        described: T,
        status: S,
        /// Vendor-supplied reason, only present for failure statuses
        failure_reason: Option<String>,
    },
}

impl<T, S: StatusToken> Probe<T, S> {
    pub fn found(described: T, status: S) -> Self {
        Self::Found {
            described,
            status,
            failure_reason: None,
        }
    }

    /// Attach the vendor failure reason when the status is a failure status
    pub fn with_failure_reason(self, reason: Option<&str>) -> Self {
        match self {
            Self::Found {
                described, status, ..
            } => {
                let failure_reason = reason
                    .filter(|r| status.is_failure() && !r.is_empty())
                    .map(str::to_string);
                Self::Found {
                    described,
                    status,
                    failure_reason,
                }
            }
            Self::NotFound => Self::NotFound,
        }
    }

    pub fn status(&self) -> Option<S> {
        match self {
            Self::Found { status, .. } => Some(*status),
            Self::NotFound => None,
        }
    }
}

/// Pending and target statuses of one kind of wait
#[derive(Debug, Clone, Copy)]
pub struct WaitSpec<S: 'static> {
    /// Statuses that mean "still in progress"
    pub pending: &'static [S],
    /// Statuses that mean "done"; empty means "wait until the resource is gone"
    pub target: &'static [S],
    pub timeout: Duration,
    /// Consecutive not-found probes tolerated while the target is non-empty
    pub not_found_checks: u32,
}

impl<S: 'static> WaitSpec<S> {
    pub const DEFAULT_NOT_FOUND_CHECKS: u32 = 20;

    pub const fn new(pending: &'static [S], target: &'static [S], timeout: Duration) -> Self {
        Self {
            pending,
            target,
            timeout,
            not_found_checks: Self::DEFAULT_NOT_FOUND_CHECKS,
        }
    }

    pub const fn with_not_found_checks(mut self, checks: u32) -> Self {
        self.not_found_checks = checks;
        self
    }
}

impl<S: StatusToken> WaitSpec<S> {
    pub fn is_pending(&self, status: S) -> bool {
        self.pending.contains(&status)
    }

    pub fn is_target(&self, status: S) -> bool {
        self.target.contains(&status)
    }

    /// Pending and target sets must be disjoint; returns the first overlap
    pub fn validate(&self) -> Result<(), S> {
        match self.pending.iter().find(|s| self.target.contains(s)) {
            Some(overlap) => Err(*overlap),
            None => Ok(()),
        }
    }

    fn expected(&self) -> String {
        if self.target.is_empty() {
            return "absent".to_string();
        }
        self.target
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Reasons a wait did not reach its target
#[derive(Debug, Error)]
pub enum WaitError {
    #[error(
        "timeout while waiting for state to become '{expected}' (last state: '{last_state}', timeout: {timeout:?})"
    )]
    Timeout {
        expected: String,
        last_state: String,
        timeout: Duration,
    },

    #[error("unexpected state '{state}', wanted target '{expected}'{}", last_error(.reason))]
    UnexpectedState {
        state: String,
        expected: String,
        reason: Option<String>,
    },

    #[error("couldn't find resource ({checks} retries)")]
    NotFound { checks: u32 },

    #[error("wait cancelled (last state: '{last_state}')")]
    Cancelled { last_state: String },

    #[error("state '{state}' is both pending and target")]
    OverlappingStates { state: String },

    #[error(transparent)]
    Probe(Box<dyn std::error::Error + Send + Sync>),
}

fn last_error(reason: &Option<String>) -> String {
    match reason {
        Some(reason) => format!(". last error: {}", reason),
        None => String::new(),
    }
}

impl WaitError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// The vendor failure reason of an unexpected terminal state
    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            Self::UnexpectedState { reason, .. } => reason.as_deref(),
            _ => None,
        }
    }
}

/// Drives status probes on a fixed poll interval
#[derive(Debug, Clone, Copy)]
pub struct Waiter {
    poll_interval: Duration,
}

impl Default for Waiter {
    fn default() -> Self {
        Self::new()
    }
}

impl Waiter {
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

    pub fn new() -> Self {
        Self::with_poll_interval(Self::DEFAULT_POLL_INTERVAL)
    }

    pub fn with_poll_interval(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Probe until `spec` is satisfied.
    ///
    /// Returns the last described object when a target status is observed,
    /// or `None` when the resource is gone and the target set is empty.
    /// Probe errors are not retried. A spec whose pending and target sets
    /// overlap is rejected before the first probe.
    pub async fn wait<T, S, E, F, Fut>(
        &self,
        spec: &WaitSpec<S>,
        cancel: &CancellationToken,
        mut probe: F,
    ) -> Result<Option<T>, WaitError>
    where
        S: StatusToken,
        E: std::error::Error + Send + Sync + 'static,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Probe<T, S>, E>>,
    {
        spec.validate()
            .map_err(|overlap| WaitError::OverlappingStates {
                state: overlap.to_string(),
            })?;

        let started = Instant::now();
        let mut last_state = String::new();
        let mut not_found = 0u32;
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            let observed = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(WaitError::Cancelled { last_state }),
                result = probe() => result.map_err(|e| WaitError::Probe(Box::new(e)))?,
            };

            match observed {
                Probe::Found {
                    described,
                    status,
                    failure_reason,
                } => {
                    debug!("wait attempt {}: state {}", attempt, status);
                    not_found = 0;
                    last_state = status.to_string();

                    if spec.is_target(status) {
                        return Ok(Some(described));
                    }
                    if !spec.is_pending(status) {
                        return Err(WaitError::UnexpectedState {
                            state: last_state,
                            expected: spec.expected(),
                            reason: failure_reason,
                        });
                    }
                }
                Probe::NotFound => {
                    debug!("wait attempt {}: resource not found", attempt);
                    last_state = NOT_FOUND_STATE.to_string();

                    if spec.target.is_empty() {
                        return Ok(None);
                    }
                    not_found += 1;
                    if not_found > spec.not_found_checks {
                        return Err(WaitError::NotFound {
                            checks: spec.not_found_checks,
                        });
                    }
                }
            }

            if started.elapsed() >= spec.timeout {
                return Err(WaitError::Timeout {
                    expected: spec.expected(),
                    last_state,
                    timeout: spec.timeout,
                });
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(WaitError::Cancelled { last_state }),
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Phase {
        Pending,
        InService,
        Deleting,
        Failed,
    }

    impl fmt::Display for Phase {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            fmt::Debug::fmt(self, f)
        }
    }

    impl StatusToken for Phase {
        fn is_failure(&self) -> bool {
            matches!(self, Phase::Failed)
        }
    }

    const IN_SERVICE: WaitSpec<Phase> =
        WaitSpec::new(&[Phase::Pending], &[Phase::InService], Duration::from_secs(60));
    const DELETED: WaitSpec<Phase> =
        WaitSpec::new(&[Phase::Deleting], &[], Duration::from_secs(60));

    type Step = Result<Probe<&'static str, Phase>, std::io::Error>;

    /// Replays `steps`, repeating the last one, and counts invocations
    fn scripted(steps: Vec<Step>) -> (Arc<AtomicUsize>, impl FnMut() -> std::future::Ready<Step>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut steps: VecDeque<Step> = steps.into();
        let probe = move || {
            counter.fetch_add(1, Ordering::SeqCst);
            let step = if steps.len() > 1 {
                steps.pop_front().unwrap()
            } else {
                match steps.front().unwrap() {
                    Ok(p) => Ok(p.clone()),
                    Err(e) => Err(std::io::Error::new(e.kind(), e.to_string())),
                }
            };
            std::future::ready(step)
        };
        (calls, probe)
    }

    fn found(status: Phase) -> Step {
        Ok(Probe::found("described", status))
    }

    fn waiter() -> Waiter {
        Waiter::with_poll_interval(Duration::from_secs(5))
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_tables_are_rejected_before_probing() {
        const OVERLAP: WaitSpec<Phase> = WaitSpec::new(
            &[Phase::Pending, Phase::InService],
            &[Phase::InService],
            Duration::from_secs(60),
        );
        let (calls, probe) = scripted(vec![found(Phase::InService)]);

        let err = waiter()
            .wait(&OVERLAP, &CancellationToken::new(), probe)
            .await
            .unwrap_err();

        assert!(matches!(err, WaitError::OverlappingStates { ref state } if state == "InService"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn returns_after_exactly_n_probes() {
        let (calls, probe) = scripted(vec![
            found(Phase::Pending),
            found(Phase::Pending),
            found(Phase::InService),
        ]);

        let described = waiter()
            .wait(&IN_SERVICE, &CancellationToken::new(), probe)
            .await
            .unwrap();

        assert_eq!(described, Some("described"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn pending_until_deadline_times_out() {
        let (calls, probe) = scripted(vec![found(Phase::Pending)]);

        let err = waiter()
            .wait(&IN_SERVICE, &CancellationToken::new(), probe)
            .await
            .unwrap_err();

        assert!(err.is_timeout(), "unexpected error: {err}");
        assert!(err.to_string().contains("last state: 'Pending'"));
        // 60s timeout at a 5s interval: probes at 0, 5, ..., 60
        assert_eq!(calls.load(Ordering::SeqCst), 13);
    }

    #[tokio::test(start_paused = true)]
    async fn not_found_with_empty_target_succeeds() {
        let (_, probe) = scripted(vec![
            found(Phase::Deleting),
            Ok(Probe::NotFound),
        ]);

        let described = waiter()
            .wait(&DELETED, &CancellationToken::new(), probe)
            .await
            .unwrap();

        assert_eq!(described, None);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_reason_is_reported_verbatim() {
        let failed = Probe::found("described", Phase::Failed)
            .with_failure_reason(Some("ResourceLimitExceeded: too many apps"));
        let (_, probe) = scripted(vec![found(Phase::Pending), Ok(failed)]);

        let err = waiter()
            .wait(&IN_SERVICE, &CancellationToken::new(), probe)
            .await
            .unwrap_err();

        assert_eq!(err.failure_reason(), Some("ResourceLimitExceeded: too many apps"));
        assert!(
            err.to_string()
                .contains("ResourceLimitExceeded: too many apps")
        );
        assert!(err.to_string().contains("unexpected state 'Failed'"));
    }

    #[test]
    fn failure_reason_ignored_for_non_failure_status() {
        let probe: Probe<(), Phase> =
            Probe::found((), Phase::Pending).with_failure_reason(Some("stale"));
        assert_eq!(
            probe,
            Probe::Found {
                described: (),
                status: Phase::Pending,
                failure_reason: None
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn probe_errors_fail_fast() {
        let (calls, probe) = scripted(vec![Err(std::io::Error::other("throttled"))]);

        let err = waiter()
            .wait(&IN_SERVICE, &CancellationToken::new(), probe)
            .await
            .unwrap_err();

        assert!(matches!(err, WaitError::Probe(_)));
        assert_eq!(err.to_string(), "throttled");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_is_distinct_from_timeout() {
        let cancel = CancellationToken::new();
        let (_, probe) = scripted(vec![found(Phase::Pending)]);

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(12)).await;
            trigger.cancel();
        });

        let err = waiter().wait(&IN_SERVICE, &cancel, probe).await.unwrap_err();

        assert!(err.is_cancelled());
        assert!(!err.is_timeout());
        assert!(err.to_string().contains("Pending"));
    }

    #[tokio::test(start_paused = true)]
    async fn not_found_tolerated_while_resource_becomes_visible() {
        let (calls, probe) = scripted(vec![
            Ok(Probe::NotFound),
            Ok(Probe::NotFound),
            found(Phase::Pending),
            found(Phase::InService),
        ]);

        let described = waiter()
            .wait(&IN_SERVICE, &CancellationToken::new(), probe)
            .await
            .unwrap();

        assert_eq!(described, Some("described"));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn not_found_checks_are_bounded() {
        let spec = IN_SERVICE.with_not_found_checks(2);
        let (calls, probe) = scripted(vec![Ok(Probe::NotFound)]);

        let err = waiter()
            .wait(&spec, &CancellationToken::new(), probe)
            .await
            .unwrap_err();

        assert!(matches!(err, WaitError::NotFound { checks: 2 }));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_terminal_state_without_reason() {
        let (_, probe) = scripted(vec![found(Phase::Deleting)]);

        let err = waiter()
            .wait(&IN_SERVICE, &CancellationToken::new(), probe)
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "unexpected state 'Deleting', wanted target 'InService'"
        );
    }

    #[test]
    fn overlapping_sets_are_rejected() {
        const BAD: WaitSpec<Phase> = WaitSpec::new(
            &[Phase::Pending, Phase::InService],
            &[Phase::InService],
            Duration::from_secs(1),
        );
        assert_eq!(BAD.validate(), Err(Phase::InService));
        assert_eq!(IN_SERVICE.validate(), Ok(()));
        assert_eq!(DELETED.validate(), Ok(()));
    }
}
