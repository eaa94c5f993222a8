//! Temporal feature derivation from the scheduled departure timestamp.
//!
//! Pure functions of the timestamp; a missing or unparseable timestamp
//! yields sentinel "unknown" features rather than an error, since absent
//! scheduling data must not abort the pipeline.

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// Time-of-day bucket derived from the scheduled departure hour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodOfDay {
    Morning,
    Afternoon,
    Night,
    Unknown,
}

impl PeriodOfDay {
    /// Bucket for an hour of day: [5,12) morning, [12,19) afternoon,
    /// night otherwise. Boundary hours belong to the lower bucket.
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            5..=11 => PeriodOfDay::Morning,
            12..=18 => PeriodOfDay::Afternoon,
            _ => PeriodOfDay::Night,
        }
    }

    /// Numeric code used in the model input encoding (0 = unknown)
    pub fn code(&self) -> f32 {
        match self {
            PeriodOfDay::Unknown => 0.0,
            PeriodOfDay::Morning => 1.0,
            PeriodOfDay::Afternoon => 2.0,
            PeriodOfDay::Night => 3.0,
        }
    }
}

/// A year-relative closed date interval, e.g. Dec 15 - Mar 3.
///
/// Windows whose start falls after their end wrap across the year
/// boundary. Stored as month/day pairs so the set stays valid season
/// after season without re-pinning absolute years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonWindow {
    pub start_month: u32,
    pub start_day: u32,
    pub end_month: u32,
    pub end_day: u32,
}

impl SeasonWindow {
    pub const fn new(start_month: u32, start_day: u32, end_month: u32, end_day: u32) -> Self {
        Self {
            start_month,
            start_day,
            end_month,
            end_day,
        }
    }

    /// The peak-travel windows the delay model was trained against
    pub fn default_windows() -> Vec<SeasonWindow> {
        vec![
            SeasonWindow::new(12, 15, 3, 3),
            SeasonWindow::new(7, 15, 7, 31),
            SeasonWindow::new(9, 11, 9, 30),
            SeasonWindow::new(12, 15, 1, 3),
        ]
    }

    /// Whether the given month/day falls inside this closed interval
    pub fn contains(&self, month: u32, day: u32) -> bool {
        let key = month * 100 + day;
        let start = self.start_month * 100 + self.start_day;
        let end = self.end_month * 100 + self.end_day;

        if start <= end {
            (start..=end).contains(&key)
        } else {
            // Wraps the year boundary
            key >= start || key <= end
        }
    }
}

/// Calendar of high-season windows
#[derive(Debug, Clone)]
pub struct SeasonCalendar {
    windows: Vec<SeasonWindow>,
}

impl SeasonCalendar {
    pub fn new(windows: Vec<SeasonWindow>) -> Self {
        Self { windows }
    }

    /// 1 when the timestamp falls in any configured window
    pub fn is_high_season(&self, timestamp: DateTime<Utc>) -> u8 {
        let month = timestamp.month();
        let day = timestamp.day();
        u8::from(self.windows.iter().any(|w| w.contains(month, day)))
    }
}

impl Default for SeasonCalendar {
    fn default() -> Self {
        Self::new(SeasonWindow::default_windows())
    }
}

/// Calendar/season/time-of-day features for one scheduled departure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedTemporalFeatures {
    /// Month 1-12; 0 when the timestamp is unknown
    pub month: u32,
    /// Day of week; None when the timestamp is unknown
    pub day_of_week: Option<Weekday>,
    pub period_of_day: PeriodOfDay,
    /// 1 if inside a high-season window, else 0
    pub is_high_season: u8,
}

impl DerivedTemporalFeatures {
    /// Sentinel features for records with no usable timestamp
    pub fn unknown() -> Self {
        Self {
            month: 0,
            day_of_week: None,
            period_of_day: PeriodOfDay::Unknown,
            is_high_season: 0,
        }
    }
}

/// Derive temporal features from an optional scheduled departure.
pub fn derive_temporal(
    scheduled: Option<DateTime<Utc>>,
    calendar: &SeasonCalendar,
) -> DerivedTemporalFeatures {
    let Some(timestamp) = scheduled else {
        return DerivedTemporalFeatures::unknown();
    };

    DerivedTemporalFeatures {
        month: timestamp.month(),
        day_of_week: Some(timestamp.weekday()),
        period_of_day: PeriodOfDay::from_hour(timestamp.hour()),
        is_high_season: calendar.is_high_season(timestamp),
    }
}
