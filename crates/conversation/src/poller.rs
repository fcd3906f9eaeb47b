use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use assistant_gateway::{CancelSignal, Run, ThreadsGateway};

use crate::error::ConversationError;

/// Timing knobs for waiting on a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between two status fetches.
    pub interval: Duration,
    /// Upper bound on the total wait for a terminal status.
    pub max_wait: Duration,
    /// Retries of one failed status fetch when the error is transient.
    pub read_retries: u32,
    /// First retry delay, doubled on every further retry.
    pub retry_base_delay: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            max_wait: Duration::from_secs(600),
            read_retries: 3,
            retry_base_delay: Duration::from_secs(1),
        }
    }
}

impl PollPolicy {
    fn retry_delay(&self, attempt: u32) -> Duration {
        self.retry_base_delay
            .saturating_mul(2_u32.saturating_pow(attempt))
    }
}

/// Time source for polling, replaceable with a virtual clock in tests.
pub trait PollClock {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl PollClock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

impl<C: PollClock + ?Sized> PollClock for &C {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration);
    }
}

/// Waits for one run to leave `queued`/`in_progress`.
pub struct RunPoller<'a, G: ?Sized, C: ?Sized> {
    gateway: &'a G,
    clock: &'a C,
    policy: &'a PollPolicy,
    cancel: Option<&'a CancelSignal>,
}

impl<'a, G, C> RunPoller<'a, G, C>
where
    G: ThreadsGateway + ?Sized,
    C: PollClock + ?Sized,
{
    pub fn new(gateway: &'a G, clock: &'a C, policy: &'a PollPolicy) -> Self {
        Self {
            gateway,
            clock,
            policy,
            cancel: None,
        }
    }

    #[must_use]
    pub fn with_cancel_signal(mut self, cancel: Option<&'a CancelSignal>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Returns the first observed run whose status is not pending.
    ///
    /// A run that is already terminal is returned without any fetch.
    pub fn wait_for_run(&self, run: Run) -> Result<Run, ConversationError> {
        let started = self.clock.now();
        // An unrepresentable deadline means the wait is effectively unbounded.
        let deadline = started.checked_add(self.policy.max_wait);
        let mut run = run;
        let mut fetches = 0_u32;

        while run.status.is_pending() {
            self.check_cancelled(&run)?;

            let now = self.clock.now();
            if deadline.is_some_and(|deadline| now >= deadline) {
                tracing::warn!(run_id = %run.id, status = %run.status, fetches, "run poll timed out");
                return Err(timed_out(run, started, now));
            }

            self.clock.sleep(clamp(self.policy.interval, now, deadline));
            run = self.fetch_run(run, started, deadline)?;
            fetches += 1;
            tracing::debug!(run_id = %run.id, status = %run.status, fetches, "polled run");
        }

        Ok(run)
    }

    /// Fetches the run, retrying transient failures within the poll deadline.
    fn fetch_run(
        &self,
        run: Run,
        started: Instant,
        deadline: Option<Instant>,
    ) -> Result<Run, ConversationError> {
        let mut attempt = 0;
        loop {
            match self.gateway.get_run(&run.thread_id, &run.id) {
                Ok(run) => return Ok(run),
                Err(error) if error.is_retryable() && attempt < self.policy.read_retries => {
                    self.check_cancelled(&run)?;
                    let now = self.clock.now();
                    if deadline.is_some_and(|deadline| now >= deadline) {
                        tracing::warn!(
                            run_id = %run.id,
                            %error,
                            "run poll timed out while retrying"
                        );
                        return Err(timed_out(run, started, now));
                    }
                    let delay = clamp(self.policy.retry_delay(attempt), now, deadline);
                    attempt += 1;
                    tracing::warn!(
                        run_id = %run.id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        %error,
                        "retrying run status fetch"
                    );
                    self.clock.sleep(delay);
                }
                Err(error) => return Err(error.into()),
            }
        }
    }

    fn check_cancelled(&self, run: &Run) -> Result<(), ConversationError> {
        let Some(cancel) = self.cancel else {
            return Ok(());
        };
        if !cancel.load(Ordering::SeqCst) {
            return Ok(());
        }

        if let Err(error) = self.gateway.cancel_run(&run.thread_id, &run.id) {
            tracing::warn!(run_id = %run.id, %error, "failed to cancel run");
        }
        Err(ConversationError::Cancelled {
            run_id: run.id.clone(),
        })
    }
}

fn clamp(pause: Duration, now: Instant, deadline: Option<Instant>) -> Duration {
    match deadline {
        Some(deadline) => pause.min(deadline.saturating_duration_since(now)),
        None => pause,
    }
}

fn timed_out(run: Run, started: Instant, now: Instant) -> ConversationError {
    ConversationError::PollTimeout {
        run_id: run.id,
        last_status: run.status,
        waited: now.saturating_duration_since(started),
    }
}
