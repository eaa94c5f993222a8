//! Flight record data structures

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::features::temporal::PeriodOfDay;

/// A departure later than this many minutes past schedule counts as delayed.
pub const DELAY_THRESHOLD_MINUTES: f64 = 15.0;

/// Flight type tag: domestic ("N") or international ("I")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum FlightType {
    #[default]
    #[serde(rename = "N", alias = "national", alias = "domestic")]
    Domestic,
    #[serde(rename = "I", alias = "international")]
    International,
}

impl FlightType {
    /// Numeric code used in the model input encoding
    pub fn code(&self) -> f32 {
        match self {
            FlightType::Domestic => 0.0,
            FlightType::International => 1.0,
        }
    }
}

/// Represents a scheduled flight to be scored for departure delay risk.
///
/// Field aliases match the upstream source column names so both raw
/// records and the serving endpoint's pre-derived payloads deserialize
/// into the same shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightRecord {
    /// Upstream flight identifier, if any
    #[serde(default)]
    pub flight_id: Option<String>,

    /// Operating airline
    #[serde(alias = "opera", alias = "airline")]
    pub operating_airline: String,

    /// Destination city
    #[serde(alias = "siglades", alias = "destination_city_name")]
    pub destination: String,

    /// Flight type tag
    #[serde(default, alias = "tipovuelo")]
    pub flight_type: FlightType,

    /// Scheduled departure; unparseable values become None rather than
    /// rejecting the record
    #[serde(
        default,
        alias = "fecha_i",
        deserialize_with = "lenient_timestamp"
    )]
    pub scheduled_departure: Option<DateTime<Utc>>,

    /// Actual departure, present only on historical (training) records
    #[serde(
        default,
        alias = "fecha_o",
        deserialize_with = "lenient_timestamp"
    )]
    pub actual_departure: Option<DateTime<Utc>>,

    /// Wind speed reading; the sentinel value means unavailable
    #[serde(default, alias = "wspd")]
    pub wind_speed: Option<f64>,

    /// Pressure reading
    #[serde(default, alias = "pres")]
    pub pressure: Option<f64>,

    /// Average temperature reading
    #[serde(default, alias = "tavg")]
    pub temperature: Option<f64>,

    /// Pre-computed airline historical delay rate, for serving
    /// configurations that skip on-the-fly encoding
    #[serde(default, alias = "opera_historical_delay_rate")]
    pub airline_delay_rate: Option<f64>,

    /// Pre-computed destination historical delay rate
    #[serde(default, alias = "dest_historical_delay_rate")]
    pub destination_delay_rate: Option<f64>,

    /// Pre-derived temporal fields; explicit values take precedence over
    /// derivation from the scheduled timestamp
    #[serde(default, alias = "mes")]
    pub month: Option<u32>,

    /// Pre-derived day-of-week name ("Monday" or "Mon")
    #[serde(default, alias = "day_of_week_name")]
    pub day_of_week: Option<String>,

    /// Pre-derived time-of-day bucket
    #[serde(default, alias = "period_day")]
    pub period_of_day: Option<PeriodOfDay>,

    /// Pre-derived high-season flag
    #[serde(default)]
    pub high_season: Option<u8>,
}

impl FlightRecord {
    /// Create a record with required fields only
    pub fn new(operating_airline: &str, destination: &str) -> Self {
        Self {
            flight_id: None,
            operating_airline: operating_airline.to_string(),
            destination: destination.to_string(),
            flight_type: FlightType::Domestic,
            scheduled_departure: None,
            actual_departure: None,
            wind_speed: None,
            pressure: None,
            temperature: None,
            airline_delay_rate: None,
            destination_delay_rate: None,
            month: None,
            day_of_week: None,
            period_of_day: None,
            high_season: None,
        }
    }

    /// Minutes between actual and scheduled departure, when both are known
    pub fn departure_diff_minutes(&self) -> Option<f64> {
        let scheduled = self.scheduled_departure?;
        let actual = self.actual_departure?;
        Some((actual - scheduled).num_seconds() as f64 / 60.0)
    }

    /// Delay label for training: strictly more than 15 minutes late.
    /// None when the record lacks either timestamp.
    pub fn delay_label(&self) -> Option<bool> {
        self.departure_diff_minutes()
            .map(|diff| diff > DELAY_THRESHOLD_MINUTES)
    }
}

/// Inbound scoring request envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreRequest {
    /// Caller-supplied correlation id
    #[serde(default)]
    pub request_id: Option<String>,
    /// Model to score with; the configured default when absent
    #[serde(default, alias = "model_name")]
    pub model: Option<String>,
    /// The flight to score
    pub flight: FlightRecord,
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS`, or null. Anything else maps
/// to None so one bad timestamp cannot reject the whole record.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<serde_json::Value> = Option::deserialize(deserializer)?;
    let Some(value) = raw else {
        return Ok(None);
    };

    let parsed = match value {
        serde_json::Value::String(s) => parse_timestamp(&s),
        _ => None,
    };
    Ok(parsed)
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}
