//! Business-hours gate: runs are only allowed on configured weekdays,
//! `start <= hour < end`, in a fixed UTC offset.

use chrono::{DateTime, Datelike, FixedOffset, Timelike, Utc, Weekday};

use crate::config::BusinessHoursConfig;
use crate::error::ConfigError;

#[derive(Debug, Clone)]
pub struct BusinessHours {
    enabled: bool,
    start_hour: u32,
    end_hour: u32,
    weekdays: Vec<Weekday>,
    offset: FixedOffset,
}

impl BusinessHours {
    pub fn from_config(config: &BusinessHoursConfig) -> Result<Self, ConfigError> {
        if config.start_hour >= config.end_hour || config.end_hour > 24 {
            return Err(ConfigError::InvalidValue {
                key: "business_hours".to_string(),
                message: format!(
                    "window {}..{} is not a valid hour range",
                    config.start_hour, config.end_hour
                ),
            });
        }
        let offset = FixedOffset::east_opt(config.utc_offset_hours * 3600).ok_or_else(|| {
            ConfigError::InvalidValue {
                key: "business_hours".to_string(),
                message: format!("UTC offset {}h out of range", config.utc_offset_hours),
            }
        })?;

        Ok(Self {
            enabled: config.enabled,
            start_hour: config.start_hour,
            end_hour: config.end_hour,
            weekdays: config.weekdays.clone(),
            offset,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether `at` (converted to the configured offset) falls inside the window.
    pub fn is_open_at(&self, at: DateTime<FixedOffset>) -> bool {
        let local = at.with_timezone(&self.offset);
        self.weekdays.contains(&local.weekday())
            && (self.start_hour..self.end_hour).contains(&local.hour())
    }

    /// Whether a run may start now. Always true when the gate is disabled.
    pub fn allows_run_now(&self) -> bool {
        !self.enabled || self.is_open_at(Utc::now().with_timezone(&self.offset))
    }
}
