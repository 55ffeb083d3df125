//! Sampling schedules
//!
//! A schedule is either a fixed interval or a cron expression. Both are
//! parsed and validated up front so a malformed schedule fails agent
//! construction rather than a later tick.

mod cron;
mod interval;
mod scheduler;

pub use cron::CronExpr;
pub use scheduler::Scheduler;

use crate::error::AgentError;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("empty schedule")]
    Empty,

    #[error("invalid interval '{input}': {reason}")]
    InvalidInterval { input: String, reason: String },

    #[error("invalid cron expression '{input}': {reason}")]
    InvalidCron { input: String, reason: String },

    #[error("sample divisor must be a positive integer, got {0}")]
    InvalidDivisor(u32),
}

impl From<ScheduleError> for AgentError {
    fn from(err: ScheduleError) -> Self {
        AgentError::Config(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schedule {
    /// Constant delay between ticks
    Fixed(Duration),
    /// Delay until the next instant matching the expression
    Cron(CronExpr),
}

impl Schedule {
    pub fn parse(input: &str) -> Result<Self, ScheduleError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ScheduleError::Empty);
        }

        if let Some(interval) = interval::try_parse_interval(input) {
            return interval.map(Schedule::Fixed);
        }

        input.parse().map(Schedule::Cron)
    }
}

impl FromStr for Schedule {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Schedule::parse(s)
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Schedule::Fixed(interval) => write!(f, "@every {}ms", interval.as_millis()),
            Schedule::Cron(expr) => write!(f, "{expr}"),
        }
    }
}
