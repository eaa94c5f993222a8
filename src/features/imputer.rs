//! Missing-value imputation with missingness flags for weather readings.
//!
//! Upstream sources mark an unavailable reading with a reserved sentinel
//! value; readings may also be genuinely absent. Either way the imputer
//! emits a (value, flag) pair: the flag is always present so the scoring
//! model can use missingness itself as a feature, and the replacement
//! value is the median captured from the training corpus at fit time,
//! never recomputed per request.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

use crate::error::ArtifactError;
use crate::types::flight::FlightRecord;

/// Weather fields eligible for sentinel substitution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeatherField {
    WindSpeed,
    Pressure,
    Temperature,
}

impl WeatherField {
    pub const ALL: [WeatherField; 3] = [
        WeatherField::WindSpeed,
        WeatherField::Pressure,
        WeatherField::Temperature,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            WeatherField::WindSpeed => "wind_speed",
            WeatherField::Pressure => "pressure",
            WeatherField::Temperature => "temperature",
        }
    }

    fn reading(&self, record: &FlightRecord) -> Option<f64> {
        match self {
            WeatherField::WindSpeed => record.wind_speed,
            WeatherField::Pressure => record.pressure,
            WeatherField::Temperature => record.temperature,
        }
    }
}

/// One imputed reading: the value to feed the model and its missing flag
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImputedReading {
    pub value: f64,
    /// 1 if the raw reading was sentinel/absent, else 0
    pub missing: u8,
}

/// Fitted imputer state: per-field training medians plus the sentinel
/// convention. Immutable after fit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImputerState {
    /// Field key -> median of non-sentinel training readings
    medians: HashMap<String, f64>,
    /// Reserved value denoting "reading unavailable"
    sentinel: f64,
}

impl ImputerState {
    /// Compute per-field medians over the training corpus, ignoring
    /// sentinel, absent, and non-finite readings.
    pub fn fit(corpus: &[FlightRecord], sentinel: f64) -> Result<Self, ArtifactError> {
        if corpus.is_empty() {
            return Err(ArtifactError::Invalid(
                "cannot fit imputer on an empty corpus".to_string(),
            ));
        }

        let mut medians = HashMap::new();
        for field in WeatherField::ALL {
            let mut observed: Vec<f64> = corpus
                .iter()
                .filter_map(|r| field.reading(r))
                .filter(|v| v.is_finite() && *v != sentinel)
                .collect();

            if observed.is_empty() {
                warn!(
                    field = field.key(),
                    "No usable training readings; imputing 0.0 for this field"
                );
                medians.insert(field.key().to_string(), 0.0);
                continue;
            }

            observed.sort_by(|a, b| a.partial_cmp(b).unwrap());
            let mid = observed.len() / 2;
            let median = if observed.len() % 2 == 0 {
                (observed[mid - 1] + observed[mid]) / 2.0
            } else {
                observed[mid]
            };
            medians.insert(field.key().to_string(), median);
        }

        Ok(Self { medians, sentinel })
    }

    /// Convert one raw reading into its (value, flag) pair.
    ///
    /// Present, finite, non-sentinel values pass through unchanged with
    /// flag 0, which makes re-application a no-op.
    pub fn transform(&self, field: WeatherField, reading: Option<f64>) -> ImputedReading {
        match reading {
            Some(v) if v.is_finite() && v != self.sentinel => ImputedReading {
                value: v,
                missing: 0,
            },
            _ => ImputedReading {
                value: self.median_for(field),
                missing: 1,
            },
        }
    }

    /// Transform every weather field of a record
    pub fn transform_record(&self, record: &FlightRecord) -> HashMap<WeatherField, ImputedReading> {
        WeatherField::ALL
            .iter()
            .map(|&field| (field, self.transform(field, field.reading(record))))
            .collect()
    }

    pub fn median_for(&self, field: WeatherField) -> f64 {
        self.medians.get(field.key()).copied().unwrap_or(0.0)
    }

    pub fn sentinel(&self) -> f64 {
        self.sentinel
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SENTINEL: f64 = -999.0;

    fn corpus_with_wind(values: &[f64]) -> Vec<FlightRecord> {
        values
            .iter()
            .map(|&w| {
                let mut r = FlightRecord::new("Sky Airline", "Arica");
                r.wind_speed = Some(w);
                r.pressure = Some(1013.0);
                r.temperature = Some(15.0);
                r
            })
            .collect()
    }

    #[test]
    fn test_sentinel_reading_is_flagged_and_imputed() {
        // Training median wind speed is 8.0
        let corpus = corpus_with_wind(&[6.0, 8.0, 10.0]);
        let state = ImputerState::fit(&corpus, SENTINEL).unwrap();

        let imputed = state.transform(WeatherField::WindSpeed, Some(SENTINEL));
        assert_eq!(imputed.missing, 1);
        assert_eq!(imputed.value, 8.0);
    }

    #[test]
    fn test_absent_reading_is_flagged_and_imputed() {
        let corpus = corpus_with_wind(&[6.0, 8.0, 10.0]);
        let state = ImputerState::fit(&corpus, SENTINEL).unwrap();

        let imputed = state.transform(WeatherField::WindSpeed, None);
        assert_eq!(imputed.missing, 1);
        assert_eq!(imputed.value, 8.0);
    }

    #[test]
    fn test_present_reading_passes_through_with_flag() {
        let corpus = corpus_with_wind(&[6.0, 8.0, 10.0]);
        let state = ImputerState::fit(&corpus, SENTINEL).unwrap();

        // Flag is emitted even when no substitution occurred
        let imputed = state.transform(WeatherField::WindSpeed, Some(12.5));
        assert_eq!(imputed.missing, 0);
        assert_eq!(imputed.value, 12.5);
    }

    #[test]
    fn test_transform_is_idempotent() {
        let corpus = corpus_with_wind(&[6.0, 8.0, 10.0]);
        let state = ImputerState::fit(&corpus, SENTINEL).unwrap();

        let first = state.transform(WeatherField::WindSpeed, Some(12.5));
        let again = state.transform(WeatherField::WindSpeed, Some(first.value));
        assert_eq!(first, again);
    }

    #[test]
    fn test_fit_ignores_sentinel_values() {
        let corpus = corpus_with_wind(&[6.0, SENTINEL, 8.0, SENTINEL, 10.0]);
        let state = ImputerState::fit(&corpus, SENTINEL).unwrap();
        assert_eq!(state.median_for(WeatherField::WindSpeed), 8.0);
    }

    #[test]
    fn test_even_count_median_averages_middles() {
        let corpus = corpus_with_wind(&[4.0, 6.0, 10.0, 12.0]);
        let state = ImputerState::fit(&corpus, SENTINEL).unwrap();
        assert_eq!(state.median_for(WeatherField::WindSpeed), 8.0);
    }

    #[test]
    fn test_every_field_gets_a_flag() {
        let corpus = corpus_with_wind(&[6.0, 8.0, 10.0]);
        let state = ImputerState::fit(&corpus, SENTINEL).unwrap();

        let mut record = FlightRecord::new("Sky Airline", "Arica");
        record.wind_speed = Some(SENTINEL);
        record.pressure = Some(1010.0);
        record.temperature = None;

        let readings = state.transform_record(&record);
        assert_eq!(readings.len(), 3);
        assert_eq!(readings[&WeatherField::WindSpeed].missing, 1);
        assert_eq!(readings[&WeatherField::Pressure].missing, 0);
        assert_eq!(readings[&WeatherField::Temperature].missing, 1);
        assert_eq!(readings[&WeatherField::Temperature].value, 15.0);
    }

    #[test]
    fn test_fit_rejects_empty_corpus() {
        let result = ImputerState::fit(&[], SENTINEL);
        assert!(result.is_err());
    }
}
