use crate::clock::{Clock, SystemClock};
use crate::job::{Job, TickSummary};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use trendradar_core::AppConfig;

/// Runs a [`Job`] now and then on a fixed cadence.
pub struct Scheduler<C: Clock = SystemClock> {
    clock: C,
    interval: Duration,
    check_interval: Duration,
}

impl Scheduler<SystemClock> {
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(SystemClock, config.poll_interval(), config.check_interval())
    }
}

impl<C: Clock> Scheduler<C> {
    pub fn new(clock: C, interval: Duration, check_interval: Duration) -> Self {
        Self {
            clock,
            interval,
            check_interval,
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub async fn run_once<J: Job + ?Sized>(&self, job: &J) -> TickSummary {
        job.run_tick(&self.clock).await
    }

    /// Run `job` immediately, then once per interval until `cancel` fires.
    ///
    /// The clock is polled every `check_interval`. Slots missed while a tick
    /// ran long are skipped rather than replayed. Returns the number of ticks.
    pub async fn run_recurring<J: Job + ?Sized>(&self, job: &J, cancel: CancellationToken) -> usize {
        let interval = ChronoDuration::from_std(self.interval).unwrap_or(ChronoDuration::hours(1));
        let mut next_run = self.clock.now();
        let mut ticks = 0;

        info!(
            "Scheduler started: every {}s, checking every {}s",
            self.interval.as_secs(),
            self.check_interval.as_secs()
        );

        while !cancel.is_cancelled() {
            if self.clock.now() >= next_run {
                job.run_tick(&self.clock).await;
                ticks += 1;
                next_run = next_slot(next_run, interval, self.clock.now());
                debug!("Next collection at {}", next_run);
                continue;
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = self.clock.sleep(self.check_interval) => {}
            }
        }

        info!("Scheduler stopped after {} ticks", ticks);
        ticks
    }
}

/// First slot after `now` on the grid `previous + k * interval`, k >= 1.
fn next_slot(
    previous: DateTime<Utc>,
    interval: ChronoDuration,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    let step = interval.num_milliseconds().max(1);
    let elapsed = (now - previous).num_milliseconds();
    let slots = (elapsed / step + 1).max(1);
    previous + ChronoDuration::milliseconds(step.saturating_mul(slots))
}
