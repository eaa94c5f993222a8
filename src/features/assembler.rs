//! Feature vector assembly for delay model inference.
//!
//! Produces the fixed-schema vector the scoring models were trained on.
//! Column order and naming are part of the model contract; the assembler
//! validates the active model's expected schema before any model is
//! invoked, so schema failures are attributable to the feature stage.

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::features::imputer::ImputedReading;
use crate::features::risk_encoder::RiskFeatures;
use crate::features::temporal::DerivedTemporalFeatures;
use crate::types::flight::FlightType;

/// Column names in the exact order the models consume them
pub const FEATURE_COLUMNS: [&str; 13] = [
    "month",
    "day_of_week",
    "period_of_day",
    "high_season",
    "flight_type",
    "airline_delay_rate",
    "destination_delay_rate",
    "wind_speed",
    "wind_speed_missing",
    "pressure",
    "pressure_missing",
    "temperature",
    "temperature_missing",
];

/// Weather readings after imputation, one (value, flag) pair per field
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeatherFeatures {
    pub wind_speed: ImputedReading,
    pub pressure: ImputedReading,
    pub temperature: ImputedReading,
}

/// The assembled model input: ordered, fixed-schema, numeric.
///
/// Categorical encodings: weekday is Monday-first 1-7 (0 unknown);
/// period of day morning=1, afternoon=2, night=3 (0 unknown);
/// flight type N=0, I=1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub month: u32,
    pub day_of_week: u32,
    pub period_of_day: f32,
    pub high_season: u8,
    pub flight_type: f32,
    pub airline_delay_rate: f64,
    pub destination_delay_rate: f64,
    pub wind_speed: f64,
    pub wind_speed_missing: u8,
    pub pressure: f64,
    pub pressure_missing: u8,
    pub temperature: f64,
    pub temperature_missing: u8,
}

impl FeatureVector {
    /// Values in FEATURE_COLUMNS order, as the models consume them
    pub fn to_model_input(&self) -> Vec<f32> {
        let mut input = Vec::with_capacity(FEATURE_COLUMNS.len());
        input.push(self.month as f32);
        input.push(self.day_of_week as f32);
        input.push(self.period_of_day);
        input.push(self.high_season as f32);
        input.push(self.flight_type);
        input.push(self.airline_delay_rate as f32);
        input.push(self.destination_delay_rate as f32);
        input.push(self.wind_speed as f32);
        input.push(self.wind_speed_missing as f32);
        input.push(self.pressure as f32);
        input.push(self.pressure_missing as f32);
        input.push(self.temperature as f32);
        input.push(self.temperature_missing as f32);
        input
    }

    pub fn column_names() -> &'static [&'static str] {
        &FEATURE_COLUMNS
    }
}

/// Assembles derived parts into the vector a specific model expects
#[derive(Debug, Clone)]
pub struct FeatureAssembler {
    /// Column names the active model was trained on, in order
    expected: Vec<String>,
}

impl FeatureAssembler {
    pub fn new(expected: Vec<String>) -> Self {
        Self { expected }
    }

    /// Assembler for the schema this crate emits natively
    pub fn native() -> Self {
        Self::new(FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect())
    }

    /// Validate the expected schema positionally against the columns this
    /// assembler can populate. Runs before the model is ever invoked.
    pub fn validate_schema(&self) -> Result<(), PipelineError> {
        for position in 0..self.expected.len().max(FEATURE_COLUMNS.len()) {
            let expected = self.expected.get(position).map(String::as_str);
            let found = FEATURE_COLUMNS.get(position).copied();
            if expected != found {
                return Err(PipelineError::SchemaMismatch {
                    position,
                    expected: expected.unwrap_or("<none>").to_string(),
                    found: found.unwrap_or("<none>").to_string(),
                });
            }
        }
        Ok(())
    }

    /// Compose derived temporal, risk, and weather features with the raw
    /// pass-through fields into the fixed-schema vector.
    pub fn assemble(
        &self,
        temporal: &DerivedTemporalFeatures,
        risk: &RiskFeatures,
        weather: &WeatherFeatures,
        flight_type: FlightType,
    ) -> Result<FeatureVector, PipelineError> {
        self.validate_schema()?;

        Ok(FeatureVector {
            month: temporal.month,
            day_of_week: temporal
                .day_of_week
                .map(|d| d.number_from_monday())
                .unwrap_or(0),
            period_of_day: temporal.period_of_day.code(),
            high_season: temporal.is_high_season,
            flight_type: flight_type.code(),
            airline_delay_rate: risk.airline_delay_rate,
            destination_delay_rate: risk.destination_delay_rate,
            wind_speed: weather.wind_speed.value,
            wind_speed_missing: weather.wind_speed.missing,
            pressure: weather.pressure.value,
            pressure_missing: weather.pressure.missing,
            temperature: weather.temperature.value,
            temperature_missing: weather.temperature.missing,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::temporal::PeriodOfDay;
    use chrono::Weekday;

    fn sample_parts() -> (DerivedTemporalFeatures, RiskFeatures, WeatherFeatures) {
        let temporal = DerivedTemporalFeatures {
            month: 7,
            day_of_week: Some(Weekday::Fri),
            period_of_day: PeriodOfDay::Afternoon,
            is_high_season: 1,
        };
        let risk = RiskFeatures {
            airline_delay_rate: 0.30,
            destination_delay_rate: 0.22,
        };
        let weather = WeatherFeatures {
            wind_speed: ImputedReading {
                value: 8.0,
                missing: 1,
            },
            pressure: ImputedReading {
                value: 1013.2,
                missing: 0,
            },
            temperature: ImputedReading {
                value: 15.0,
                missing: 0,
            },
        };
        (temporal, risk, weather)
    }

    #[test]
    fn test_model_input_matches_schema_length() {
        let (temporal, risk, weather) = sample_parts();
        let assembler = FeatureAssembler::native();
        let vector = assembler
            .assemble(&temporal, &risk, &weather, FlightType::International)
            .unwrap();

        let input = vector.to_model_input();
        assert_eq!(input.len(), FEATURE_COLUMNS.len());
        assert_eq!(input[0], 7.0); // month
        assert_eq!(input[1], 5.0); // Friday, Monday-first
        assert_eq!(input[2], 2.0); // afternoon
        assert_eq!(input[3], 1.0); // high season
        assert_eq!(input[4], 1.0); // international
        assert_eq!(input[8], 1.0); // wind_speed_missing
    }

    #[test]
    fn test_assembly_is_bit_identical_on_repeat() {
        let (temporal, risk, weather) = sample_parts();
        let assembler = FeatureAssembler::native();

        let first = assembler
            .assemble(&temporal, &risk, &weather, FlightType::Domestic)
            .unwrap();
        let second = assembler
            .assemble(&temporal, &risk, &weather, FlightType::Domestic)
            .unwrap();

        assert_eq!(first, second);
        let a: Vec<u32> = first.to_model_input().iter().map(|v| v.to_bits()).collect();
        let b: Vec<u32> = second.to_model_input().iter().map(|v| v.to_bits()).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_missing_column_fails_before_scoring() {
        let (temporal, risk, weather) = sample_parts();
        // Model trained with an extra trailing column this pipeline
        // cannot populate
        let mut expected: Vec<String> = FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect();
        expected.push("is_holiday".to_string());

        let assembler = FeatureAssembler::new(expected);
        match assembler.assemble(&temporal, &risk, &weather, FlightType::Domestic) {
            Err(PipelineError::SchemaMismatch {
                position,
                expected,
                found,
            }) => {
                assert_eq!(position, 13);
                assert_eq!(expected, "is_holiday");
                assert_eq!(found, "<none>");
            }
            other => panic!("expected schema mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_misordered_column_is_reported() {
        let (temporal, risk, weather) = sample_parts();
        let mut expected: Vec<String> = FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect();
        expected.swap(0, 1);

        let assembler = FeatureAssembler::new(expected);
        match assembler.assemble(&temporal, &risk, &weather, FlightType::Domestic) {
            Err(PipelineError::SchemaMismatch { position, .. }) => assert_eq!(position, 0),
            other => panic!("expected schema mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_temporal_sentinels_encode_as_zero() {
        let (_, risk, weather) = sample_parts();
        let temporal = DerivedTemporalFeatures::unknown();
        let assembler = FeatureAssembler::native();
        let vector = assembler
            .assemble(&temporal, &risk, &weather, FlightType::Domestic)
            .unwrap();

        assert_eq!(vector.month, 0);
        assert_eq!(vector.day_of_week, 0);
        assert_eq!(vector.period_of_day, 0.0);
        assert_eq!(vector.high_season, 0);
    }
}
