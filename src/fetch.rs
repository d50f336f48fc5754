use crate::api::ApiError;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::warn;

/// Delay before each retry. 4 attempts total: one initial plus one retry per
/// entry. The schedule is sized for a backend that can take ~45 seconds to
/// cold-start.
pub const RETRY_DELAYS: [Duration; 3] = [
    Duration::from_secs(5),
    Duration::from_secs(10),
    Duration::from_secs(15),
];

const PROGRESS_TICK: Duration = Duration::from_millis(100);

/// Terminal failure of a full fetch sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadError {
    InvalidToken,
    NotFound,
    Failed,
}

/// Non-terminal transitions surfaced while a sequence runs. `Progress`
/// fills linearly from 0 to 100 over each retry delay window.
#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    Loading,
    Retrying { attempt: usize, max_attempts: usize },
    Progress { percent: f64 },
}

/// Bounded-retry fetch sequence: `loading -> (retrying)* -> success | error`.
///
/// 403 and 404 short-circuit without retrying; transient failures walk the
/// [`RETRY_DELAYS`] schedule before giving up. A fetcher runs at most one
/// sequence at a time; delays use the tokio clock, so tests drive the whole
/// schedule instantly under paused time.
pub struct RetryFetcher {
    in_flight: AtomicBool,
}

impl RetryFetcher {
    pub fn new() -> Self {
        Self {
            in_flight: AtomicBool::new(false),
        }
    }

    /// Runs the full schedule, reporting transitions through `on_phase`.
    /// Returns `None` when a sequence is already in flight on this fetcher.
    pub async fn run<T, F, Fut>(
        &self,
        mut attempt: F,
        mut on_phase: impl FnMut(Phase),
    ) -> Option<Result<T, LoadError>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            return None;
        }
        let result = run_schedule(&mut attempt, &mut on_phase).await;
        self.in_flight.store(false, Ordering::SeqCst);
        Some(result)
    }
}

impl Default for RetryFetcher {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_schedule<T, F, Fut>(
    attempt: &mut F,
    on_phase: &mut impl FnMut(Phase),
) -> Result<T, LoadError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    on_phase(Phase::Loading);

    for n in 0..=RETRY_DELAYS.len() {
        match attempt().await {
            Ok(data) => return Ok(data),
            Err(ApiError::InvalidToken) => return Err(LoadError::InvalidToken),
            Err(ApiError::NotFound) => return Err(LoadError::NotFound),
            Err(ApiError::Transient(reason)) => {
                if n == RETRY_DELAYS.len() {
                    break;
                }
                warn!(
                    "attempt {} of {} failed ({reason}), retrying",
                    n + 1,
                    RETRY_DELAYS.len() + 1
                );
                on_phase(Phase::Retrying {
                    attempt: n + 1,
                    max_attempts: RETRY_DELAYS.len(),
                });
                wait_with_progress(RETRY_DELAYS[n], on_phase).await;
            }
        }
    }

    Err(LoadError::Failed)
}

async fn wait_with_progress(total: Duration, on_phase: &mut impl FnMut(Phase)) {
    let start = Instant::now();
    let deadline = start + total;
    loop {
        let now = Instant::now();
        if now >= deadline {
            on_phase(Phase::Progress { percent: 100.0 });
            return;
        }
        let percent = (now - start).as_secs_f64() / total.as_secs_f64() * 100.0;
        on_phase(Phase::Progress {
            percent: percent.min(100.0),
        });
        tokio::time::sleep_until(now + PROGRESS_TICK).await;
    }
}
