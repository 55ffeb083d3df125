//! Next-delay computation

use super::{Schedule, ScheduleError};
use chrono::{DateTime, Utc};
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::warn;

/// Delay used if a cron expression unexpectedly has no future match
const FALLBACK_DELAY: Duration = Duration::from_secs(3600);

/// Computes the delay before each tick.
///
/// The nominal delay is divided by `divisor` so sampling can run finer than
/// the schedule while still landing on its boundaries.
///
/// For cron schedules the nominal delay is the time left until the next
/// match, recomputed on every tick. Each tick therefore waits `1/divisor`
/// of what remains and the delays shrink geometrically towards the
/// boundary: `* * * * * *` with divisor 10 ticks roughly 60 to 70 times
/// per second, not 10, depending on per-tick overhead. Fixed intervals
/// tick exactly `divisor` times per interval.
#[derive(Debug, Clone)]
pub struct Scheduler {
    schedule: Schedule,
    divisor: NonZeroU32,
}

impl Scheduler {
    pub fn new(schedule: Schedule, divisor: u32) -> Result<Self, ScheduleError> {
        let divisor = NonZeroU32::new(divisor).ok_or(ScheduleError::InvalidDivisor(divisor))?;
        Ok(Self { schedule, divisor })
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn divisor(&self) -> u32 {
        self.divisor.get()
    }

    pub fn next_delay(&self) -> Duration {
        self.next_delay_at(Utc::now())
    }

    /// Delay from `now` to the next tick, never negative
    pub fn next_delay_at(&self, now: DateTime<Utc>) -> Duration {
        let nominal = match &self.schedule {
            Schedule::Fixed(interval) => *interval,
            Schedule::Cron(expr) => match expr.next_after(now) {
                // A negative difference saturates to zero
                Some(next) => (next - now).to_std().unwrap_or(Duration::ZERO),
                None => {
                    warn!(schedule = %expr, "Cron expression has no upcoming match");
                    FALLBACK_DELAY
                }
            },
        };

        nominal / self.divisor.get()
    }
}
