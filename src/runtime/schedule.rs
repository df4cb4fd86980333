//! Trigger-scheduling policy.
//!
//! A [`WorkflowSchedule`] describes *when* a workflow should be triggered
//! automatically. It is consumed by an external scheduler process; the engine
//! itself only ever sees "a trigger fired, here is the payload". All times
//! are UTC.

use std::str::FromStr;

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveTime, Utc, Weekday};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, Diagnostic)]
pub enum ScheduleError {
    #[error("invalid cron expression '{expression}': {source}")]
    #[diagnostic(
        code(flowloom::schedule::cron),
        help("Expressions use the 7-field cron syntax, e.g. '0 0 9 * * Mon *'.")
    )]
    Cron {
        expression: String,
        #[source]
        source: cron::error::Error,
    },

    #[error("interval must be at least one minute")]
    #[diagnostic(code(flowloom::schedule::zero_interval))]
    ZeroInterval,

    #[error("day-of-month must be between 1 and 31, got {day}")]
    #[diagnostic(code(flowloom::schedule::invalid_day))]
    InvalidDay { day: u32 },

    #[error("calendar arithmetic out of range while computing the next fire time")]
    #[diagnostic(code(flowloom::schedule::out_of_range))]
    OutOfRange,
}

/// When a workflow should fire.
///
/// `OnDemand` and `Event` never produce a fire time of their own; they exist
/// so a schedule row can record that runs are started manually or by an
/// external event key.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum SchedulePolicy {
    Immediately,
    Interval { minutes: u32 },
    Cron { expression: String },
    Daily { time: NaiveTime },
    Weekly { weekday: Weekday, time: NaiveTime },
    Monthly { day: u32, time: NaiveTime },
    Once { at: DateTime<Utc> },
    OnDemand,
    Event { key: String },
}

impl SchedulePolicy {
    /// Next fire time strictly derived from `now`.
    ///
    /// `Ok(None)` means the policy has nothing left to fire (`Once` in the
    /// past, `OnDemand`, `Event`). `Monthly` clamps the requested day to the
    /// target month's length, so `day: 31` fires on April 30.
    pub fn next_run_after(&self, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, ScheduleError> {
        match self {
            Self::Immediately => Ok(Some(now)),
            Self::Interval { minutes } => {
                if *minutes == 0 {
                    return Err(ScheduleError::ZeroInterval);
                }
                now.checked_add_signed(chrono::Duration::minutes(i64::from(*minutes)))
                    .map(Some)
                    .ok_or(ScheduleError::OutOfRange)
            }
            Self::Cron { expression } => {
                let schedule =
                    cron::Schedule::from_str(expression).map_err(|source| ScheduleError::Cron {
                        expression: expression.clone(),
                        source,
                    })?;
                Ok(schedule.after(&now).next())
            }
            Self::Daily { time } => {
                let today = now.date_naive().and_time(*time).and_utc();
                if today > now {
                    Ok(Some(today))
                } else {
                    let tomorrow = now
                        .date_naive()
                        .checked_add_days(Days::new(1))
                        .ok_or(ScheduleError::OutOfRange)?;
                    Ok(Some(tomorrow.and_time(*time).and_utc()))
                }
            }
            Self::Weekly { weekday, time } => {
                let today = now.date_naive();
                let ahead = u64::from(
                    (weekday.num_days_from_monday() + 7 - today.weekday().num_days_from_monday())
                        % 7,
                );
                let date = today
                    .checked_add_days(Days::new(ahead))
                    .ok_or(ScheduleError::OutOfRange)?;
                let candidate = date.and_time(*time).and_utc();
                if candidate > now {
                    Ok(Some(candidate))
                } else {
                    let next_week = date
                        .checked_add_days(Days::new(7))
                        .ok_or(ScheduleError::OutOfRange)?;
                    Ok(Some(next_week.and_time(*time).and_utc()))
                }
            }
            Self::Monthly { day, time } => {
                if *day == 0 || *day > 31 {
                    return Err(ScheduleError::InvalidDay { day: *day });
                }
                let this_month = clamped_date(now.year(), now.month(), *day)
                    .ok_or(ScheduleError::OutOfRange)?;
                let candidate = this_month.and_time(*time).and_utc();
                if candidate > now {
                    return Ok(Some(candidate));
                }
                let (year, month) = if now.month() == 12 {
                    (now.year() + 1, 1)
                } else {
                    (now.year(), now.month() + 1)
                };
                let next_month =
                    clamped_date(year, month, *day).ok_or(ScheduleError::OutOfRange)?;
                Ok(Some(next_month.and_time(*time).and_utc()))
            }
            Self::Once { at } => Ok(if *at > now { Some(*at) } else { None }),
            Self::OnDemand | Self::Event { .. } => Ok(None),
        }
    }
}

fn clamped_date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    let last = last_day_of_month(year, month)?;
    NaiveDate::from_ymd_opt(year, month, day.min(last))
}

fn last_day_of_month(year: i32, month: u32) -> Option<u32> {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    let first_of_next = NaiveDate::from_ymd_opt(next_year, next_month, 1)?;
    Some(first_of_next.pred_opt()?.day())
}

/// One-to-one scheduling row for a workflow.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSchedule {
    pub workflow_id: Uuid,
    pub policy: SchedulePolicy,
    pub enabled: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
    pub run_count: u64,
}

impl WorkflowSchedule {
    pub fn new(workflow_id: Uuid, policy: SchedulePolicy) -> Self {
        Self {
            workflow_id,
            policy,
            enabled: true,
            last_run: None,
            next_run: None,
            run_count: 0,
        }
    }

    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Record a fire at `now` and advance `next_run`.
    pub fn mark_run(&mut self, now: DateTime<Utc>) -> Result<(), ScheduleError> {
        self.last_run = Some(now);
        self.run_count += 1;
        self.next_run = self.policy.next_run_after(now)?;
        Ok(())
    }
}
