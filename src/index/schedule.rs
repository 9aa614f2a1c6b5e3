use chrono::{DateTime, Datelike, Duration, NaiveDateTime, NaiveTime, Utc, Weekday};

use crate::config::{ConfigError, ScheduleConfig};

/// Fires once a week at a fixed weekday and time of day, in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeeklySchedule {
    weekday: Weekday,
    time: NaiveTime,
}

impl WeeklySchedule {
    /// `None` if hour or minute is out of range.
    pub fn new(weekday: Weekday, hour: u32, minute: u32) -> Option<Self> {
        Some(Self {
            weekday,
            time: NaiveTime::from_hms_opt(hour, minute, 0)?,
        })
    }

    pub fn from_config(config: &ScheduleConfig) -> Result<Self, ConfigError> {
        let weekday = config.weekday()?;
        Self::new(weekday, config.hour, config.minute).ok_or_else(|| {
            ConfigError::Validation(format!(
                "index_delete.schedule: invalid time {:02}:{:02}",
                config.hour, config.minute
            ))
        })
    }

    pub fn weekday(&self) -> Weekday {
        self.weekday
    }

    pub fn time(&self) -> NaiveTime {
        self.time
    }

    /// First tick strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> DateTime<Utc> {
        let today = after.date_naive();
        let days_ahead = (self.weekday.num_days_from_monday() + 7
            - today.weekday().num_days_from_monday())
            % 7;

        let candidate =
            NaiveDateTime::new(today + Duration::days(days_ahead.into()), self.time).and_utc();

        if candidate > after {
            candidate
        } else {
            candidate + Duration::weeks(1)
        }
    }
}
