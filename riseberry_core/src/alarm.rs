use chrono::{DateTime, Days, FixedOffset, NaiveDateTime, NaiveTime, TimeZone, Utc};
use error_stack::Report;
use serde::{Deserialize, Serialize};

use crate::error::{Result, RiseberryError};

/// Largest UTC offset, in seconds, an alarm may be given in (18 hours).
pub const MAX_ZONE_OFFSET: i32 = 18 * 60 * 60;

/// The single alarm setting held by the clock.
///
/// `hour` and `minute` are a wall-clock time on the civil calendar defined by
/// the fixed UTC offset `zone` (seconds east of UTC).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Alarm {
    pub hour: u32,
    pub minute: u32,
    pub zone: i32,
    pub enabled: bool,
}

impl Alarm {
    pub fn new(hour: u32, minute: u32, zone: i32, enabled: bool) -> Self {
        Self {
            hour,
            minute,
            zone,
            enabled,
        }
    }

    /// Rejects values outside 00:00-23:59 and offsets beyond ±18h.
    pub fn validate(&self) -> Result<()> {
        if self.hour > 23 {
            Err(RiseberryError::InvalidAlarm(format!(
                "hour must be between 0 and 23, got {}",
                self.hour
            )))?
        }
        if self.minute > 59 {
            Err(RiseberryError::InvalidAlarm(format!(
                "minute must be between 0 and 59, got {}",
                self.minute
            )))?
        }
        if !(-MAX_ZONE_OFFSET..=MAX_ZONE_OFFSET).contains(&self.zone) {
            Err(RiseberryError::InvalidAlarm(format!(
                "zone must be within ±{MAX_ZONE_OFFSET} seconds, got {}",
                self.zone
            )))?
        }
        Ok(())
    }

    pub fn offset(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.zone).ok_or_else(|| {
            Report::new(RiseberryError::InvalidAlarm(format!(
                "zone offset {} is out of range",
                self.zone
            )))
        })
    }

    /// Returns the next instant strictly after `now` at which the alarm goes off.
    ///
    /// The date of `now` is taken as observed in the alarm's own offset. When
    /// that day's occurrence is not in the future the alarm moves to the next
    /// calendar day in the same offset.
    pub fn next_fire(&self, now: DateTime<Utc>) -> Result<DateTime<FixedOffset>> {
        self.validate()?;
        let offset = self.offset()?;
        let time = NaiveTime::from_hms_opt(self.hour, self.minute, 0).ok_or_else(|| {
            Report::new(RiseberryError::InvalidAlarm(format!(
                "{:02}:{:02} is not a valid time of day",
                self.hour, self.minute
            )))
        })?;

        let today = now.with_timezone(&offset).date_naive();
        let candidate = at(offset, today.and_time(time))?;
        if candidate > now {
            return Ok(candidate);
        }

        let tomorrow = today.checked_add_days(Days::new(1)).ok_or_else(|| {
            Report::new(RiseberryError::InvalidAlarm(format!(
                "no calendar day after {today}"
            )))
        })?;
        at(offset, tomorrow.and_time(time))
    }
}

fn at(offset: FixedOffset, local: NaiveDateTime) -> Result<DateTime<FixedOffset>> {
    // A fixed offset maps every local time to exactly one instant.
    offset.from_local_datetime(&local).single().ok_or_else(|| {
        Report::new(RiseberryError::InvalidAlarm(format!(
            "{local} does not exist in offset {offset}"
        )))
    })
}

/// Source of the current instant.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
