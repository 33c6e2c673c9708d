//! Polling wait: re-check a predicate on a fixed interval until it holds.
//!
//! The predicate is evaluated once, synchronously, when the task is created.
//! If it already holds, the returned [`PollTask`] is resolved before it is
//! ever awaited. Otherwise it checks again every interval, counted from
//! creation, forever unless a timeout or a cancellation token was supplied.
//!
//! ```ignore
//! let rows = document.clone();
//! wait_for(move || rows.count(".todo").unwrap_or(0) == 3).await?;
//! ```

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use pin_project::pin_project;
use tokio::time::{Instant, Sleep};
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

/// Delay between two evaluations when the caller does not pick one.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Knobs for a single wait.
#[derive(Debug, Clone)]
pub struct WaitOptions {
    /// Delay between two evaluations of the predicate.
    pub interval: Duration,
    /// Give up with [`WaitError::Timeout`] once this much time has elapsed.
    /// `None` polls until the predicate holds.
    pub timeout: Option<Duration>,
    /// Give up with [`WaitError::Cancelled`] once this token is cancelled.
    pub cancel: Option<CancellationToken>,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: None,
            cancel: None,
        }
    }
}

impl WaitOptions {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// How a successful wait went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    /// Number of times the predicate was evaluated, including the final one.
    pub attempts: u32,
    /// Time between creating the task and the evaluation that held.
    pub elapsed: Duration,
}

/// Why a wait ended without the predicate holding.
///
/// None of these can happen with [`wait_for`]: without a timeout, a token or
/// a fallible predicate the task only ever resolves.
#[derive(Debug)]
pub enum WaitError {
    Timeout { attempts: u32, elapsed: Duration },
    Cancelled { attempts: u32 },
    Predicate { attempts: u32, source: anyhow::Error },
}

impl WaitError {
    pub fn attempts(&self) -> u32 {
        match self {
            WaitError::Timeout { attempts, .. }
            | WaitError::Cancelled { attempts }
            | WaitError::Predicate { attempts, .. } => *attempts,
        }
    }
}

impl std::fmt::Display for WaitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WaitError::Timeout { attempts, elapsed } => write!(
                f,
                "condition still false after {:?} ({} checks)",
                elapsed, attempts
            ),
            WaitError::Cancelled { attempts } => {
                write!(f, "wait cancelled after {} checks", attempts)
            }
            WaitError::Predicate { attempts, source } => {
                write!(f, "predicate failed on check {}: {}", attempts, source)
            }
        }
    }
}

impl std::error::Error for WaitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WaitError::Predicate { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

/// Lifecycle of a [`PollTask`]. `Pending -> Resolved` is the only transition
/// a plain [`wait_for`] can take; `Failed` needs one of the hardening options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Pending,
    Resolved,
    Failed,
}

/// Future returned by [`wait_for`], [`wait_for_with`] and [`try_wait_for`].
///
/// Completes exactly once. Polling it again after completion panics, like any
/// other completed future; the predicate is never evaluated after that point.
#[pin_project]
pub struct PollTask<P> {
    predicate: P,
    interval: Duration,
    timeout: Option<Duration>,
    cancelled: Option<Pin<Box<WaitForCancellationFutureOwned>>>,
    started: Instant,
    /// Next re-check on the interval grid measured from `started`.
    next_check: Instant,
    attempts: u32,
    state: PollState,
    outcome: Option<Result<Resolution, WaitError>>,
    #[pin]
    sleep: Option<Sleep>,
}

impl<P> PollTask<P>
where
    P: FnMut() -> anyhow::Result<bool>,
{
    /// Create the task and evaluate the predicate right away.
    pub fn new(predicate: P, options: WaitOptions) -> Self {
        let started = Instant::now();
        let mut task = Self {
            predicate,
            interval: options.interval,
            timeout: options.timeout,
            cancelled: options.cancel.map(|token| Box::pin(token.cancelled_owned())),
            started,
            next_check: started + options.interval,
            attempts: 0,
            state: PollState::Pending,
            outcome: None,
            sleep: None,
        };
        if let Some(outcome) = evaluate(&mut task.predicate, &mut task.attempts, task.started) {
            settle(&mut task.state, &mut task.outcome, outcome);
        }
        task
    }
}

impl<P> PollTask<P> {
    pub fn state(&self) -> PollState {
        self.state
    }

    pub fn is_resolved(&self) -> bool {
        self.state == PollState::Resolved
    }

    /// How many times the predicate has been evaluated so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

impl<P> Future for PollTask<P>
where
    P: FnMut() -> anyhow::Result<bool>,
{
    type Output = Result<Resolution, WaitError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut this = self.project();
        loop {
            if *this.state != PollState::Pending {
                return match this.outcome.take() {
                    Some(outcome) => Poll::Ready(outcome),
                    None => panic!("PollTask polled after completion"),
                };
            }

            if let Some(cancelled) = this.cancelled.as_mut() {
                if cancelled.as_mut().poll(cx).is_ready() {
                    log::debug!("wait cancelled after {} checks", this.attempts);
                    let error = WaitError::Cancelled {
                        attempts: *this.attempts,
                    };
                    settle(this.state, this.outcome, Err(error));
                    continue;
                }
            }

            match this.sleep.as_mut().as_pin_mut() {
                Some(sleep) => {
                    if sleep.poll(cx).is_pending() {
                        return Poll::Pending;
                    }
                }
                None => {
                    // Only give up between checks, so a check due on the
                    // deadline still runs.
                    let elapsed = this.started.elapsed();
                    if let Some(timeout) = *this.timeout {
                        if elapsed >= timeout {
                            log::warn!(
                                "wait timed out after {:?} ({} checks)",
                                elapsed,
                                this.attempts
                            );
                            let error = WaitError::Timeout {
                                attempts: *this.attempts,
                                elapsed,
                            };
                            settle(this.state, this.outcome, Err(error));
                            continue;
                        }
                    }

                    let mut deadline = *this.next_check;
                    if let Some(timeout) = *this.timeout {
                        deadline = deadline.min(*this.started + timeout);
                    }
                    this.sleep.set(Some(tokio::time::sleep_until(deadline)));
                    continue;
                }
            }

            this.sleep.set(None);
            if let Some(outcome) = evaluate(this.predicate, this.attempts, *this.started) {
                settle(this.state, this.outcome, outcome);
            }
            advance(this.next_check, *this.interval, Instant::now());
        }
    }
}

/// Run the predicate once. `None` means "not yet, keep polling".
fn evaluate<P>(
    predicate: &mut P,
    attempts: &mut u32,
    started: Instant,
) -> Option<Result<Resolution, WaitError>>
where
    P: FnMut() -> anyhow::Result<bool>,
{
    *attempts += 1;
    match predicate() {
        Ok(true) => {
            let resolution = Resolution {
                attempts: *attempts,
                elapsed: started.elapsed(),
            };
            log::debug!(
                "condition held on check {} after {:?}",
                resolution.attempts,
                resolution.elapsed
            );
            Some(Ok(resolution))
        }
        Ok(false) => {
            log::trace!("condition false on check {}", attempts);
            None
        }
        Err(source) => Some(Err(WaitError::Predicate {
            attempts: *attempts,
            source,
        })),
    }
}

/// Move `next_check` to the first grid point after `now`. Grid points missed
/// while the task was not polled are skipped, not replayed.
fn advance(next_check: &mut Instant, interval: Duration, now: Instant) {
    if interval.is_zero() {
        *next_check = now;
        return;
    }
    while *next_check <= now {
        *next_check += interval;
    }
}

fn settle(
    state: &mut PollState,
    outcome: &mut Option<Result<Resolution, WaitError>>,
    result: Result<Resolution, WaitError>,
) {
    debug_assert_eq!(*state, PollState::Pending);
    *state = if result.is_ok() {
        PollState::Resolved
    } else {
        PollState::Failed
    };
    *outcome = Some(result);
}

/// Wait until `predicate` returns `true`, checking every 20ms, forever.
///
/// The returned task never fails; `.await` it and ignore the `Ok`.
pub fn wait_for<F>(predicate: F) -> PollTask<impl FnMut() -> anyhow::Result<bool>>
where
    F: FnMut() -> bool,
{
    wait_for_with(predicate, WaitOptions::default())
}

/// [`wait_for`] with a custom interval, timeout or cancellation token.
pub fn wait_for_with<F>(
    mut predicate: F,
    options: WaitOptions,
) -> PollTask<impl FnMut() -> anyhow::Result<bool>>
where
    F: FnMut() -> bool,
{
    PollTask::new(move || Ok(predicate()), options)
}

/// Wait on a predicate that can fail. The first `Err` ends the wait with
/// [`WaitError::Predicate`].
pub fn try_wait_for<F>(predicate: F, options: WaitOptions) -> PollTask<F>
where
    F: FnMut() -> anyhow::Result<bool>,
{
    PollTask::new(predicate, options)
}
