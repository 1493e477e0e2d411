//! Maintenance-window gate for the update loop (§4.7 step 3). Windows that cross
//! midnight are modular: `start > end` means "from start to midnight OR from midnight
//! to end".

use chrono::NaiveTime;

use crate::config::MaintenanceWindowConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaintenanceWindow {
    start: NaiveTime,
    end: NaiveTime,
}

#[derive(Debug, thiserror::Error)]
#[error("invalid maintenance window time {0:?}")]
pub struct ParseWindowError(String);

impl MaintenanceWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    pub fn from_config(config: &MaintenanceWindowConfig) -> Result<Self, ParseWindowError> {
        let start = parse_time(&config.start)?;
        let end = parse_time(&config.end)?;
        Ok(Self { start, end })
    }

    /// True when `now` falls inside the configured window, handling the midnight
    /// crossing case by checking the two sub-ranges the crossing splits it into.
    pub fn contains(&self, now: NaiveTime) -> bool {
        if self.start <= self.end {
            self.start <= now && now <= self.end
        } else {
            now >= self.start || now <= self.end
        }
    }
}

fn parse_time(value: &str) -> Result<NaiveTime, ParseWindowError> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|_| ParseWindowError(value.to_string()))
}
