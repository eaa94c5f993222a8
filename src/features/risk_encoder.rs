//! Historical delay-rate encoding for high-cardinality categoricals.
//!
//! `RiskEncoder::fit` runs during the offline training stage and produces
//! an immutable `RiskEncoderState`; serving code only ever holds the
//! state and performs lookups. Statistics are never recomputed from the
//! records being transformed — everything a lookup returns derives from
//! the training corpus observed strictly before the request being scored.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, warn};

use crate::error::{ArtifactError, PipelineError};
use crate::types::flight::FlightRecord;

/// Categorical columns encoded as historical delay rates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncodedColumn {
    OperatingAirline,
    Destination,
}

impl EncodedColumn {
    pub const ALL: [EncodedColumn; 2] = [EncodedColumn::OperatingAirline, EncodedColumn::Destination];

    pub fn key(&self) -> &'static str {
        match self {
            EncodedColumn::OperatingAirline => "operating_airline",
            EncodedColumn::Destination => "destination",
        }
    }

    fn category<'a>(&self, record: &'a FlightRecord) -> &'a str {
        match self {
            EncodedColumn::OperatingAirline => &record.operating_airline,
            EncodedColumn::Destination => &record.destination,
        }
    }
}

/// Risk features produced for one record
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskFeatures {
    pub airline_delay_rate: f64,
    pub destination_delay_rate: f64,
}

/// Immutable fitted encoder state: per-column category -> delay rate maps
/// plus the corpus-wide mean delay rate used for out-of-vocabulary lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskEncoderState {
    /// Column key -> (category -> mean delay rate)
    columns: HashMap<String, HashMap<String, f64>>,
    /// Corpus-wide mean of the delay target
    global_mean: f64,
    /// Number of labelled training rows the state was fitted from
    fitted_rows: usize,
}

/// Fitting operation, separate from the state it produces
pub struct RiskEncoder;

impl RiskEncoder {
    /// Compute per-category delay-rate means over the labelled subset of
    /// the training corpus. Records lacking either departure timestamp
    /// carry no label and are skipped.
    pub fn fit(
        corpus: &[FlightRecord],
        columns: &[EncodedColumn],
    ) -> Result<RiskEncoderState, ArtifactError> {
        let mut labelled = 0usize;
        let mut delayed_total = 0usize;
        let mut skipped = 0usize;

        // (sum of labels, count) per category, one tally map per column
        let mut tallies: Vec<HashMap<String, (usize, usize)>> =
            vec![HashMap::new(); columns.len()];

        for record in corpus {
            let Some(delayed) = record.delay_label() else {
                skipped += 1;
                continue;
            };
            labelled += 1;
            delayed_total += usize::from(delayed);

            for (column, tally) in columns.iter().zip(tallies.iter_mut()) {
                let entry = tally
                    .entry(column.category(record).to_string())
                    .or_insert((0, 0));
                entry.0 += usize::from(delayed);
                entry.1 += 1;
            }
        }

        if labelled == 0 {
            return Err(ArtifactError::Invalid(
                "training corpus has no labelled rows (both timestamps required)".to_string(),
            ));
        }
        if skipped > 0 {
            warn!(skipped = skipped, "Unlabelled rows skipped during encoder fit");
        }

        let column_maps: HashMap<String, HashMap<String, f64>> = columns
            .iter()
            .zip(tallies)
            .map(|(column, categories)| {
                let rates = categories
                    .into_iter()
                    .map(|(category, (sum, count))| (category, sum as f64 / count as f64))
                    .collect();
                (column.key().to_string(), rates)
            })
            .collect();

        let global_mean = delayed_total as f64 / labelled as f64;

        info!(
            rows = labelled,
            global_mean = global_mean,
            columns = column_maps.len(),
            "Risk encoder fitted"
        );

        Ok(RiskEncoderState {
            columns: column_maps,
            global_mean,
            fitted_rows: labelled,
        })
    }
}

impl RiskEncoderState {
    /// Look up the delay rate for one category; categories never seen in
    /// training resolve to the global mean, never to an error.
    pub fn rate_for(&self, column: EncodedColumn, category: &str) -> Result<f64, PipelineError> {
        self.ensure_fitted()?;
        Ok(self
            .columns
            .get(column.key())
            .and_then(|rates| rates.get(category))
            .copied()
            .unwrap_or(self.global_mean))
    }

    /// Encode both risk columns of a record
    pub fn transform(&self, record: &FlightRecord) -> Result<RiskFeatures, PipelineError> {
        Ok(RiskFeatures {
            airline_delay_rate: self.rate_for(EncodedColumn::OperatingAirline, &record.operating_airline)?,
            destination_delay_rate: self.rate_for(EncodedColumn::Destination, &record.destination)?,
        })
    }

    pub fn global_mean(&self) -> f64 {
        self.global_mean
    }

    pub fn fitted_rows(&self) -> usize {
        self.fitted_rows
    }

    /// An empty state means transform was reached without fit: a
    /// programming defect, not a data condition.
    pub fn ensure_fitted(&self) -> Result<(), PipelineError> {
        if self.fitted_rows == 0 || self.columns.is_empty() || !self.global_mean.is_finite() {
            return Err(PipelineError::EncoderPrecondition);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn labelled_flight(airline: &str, destination: &str, delayed: bool) -> FlightRecord {
        let scheduled = Utc.with_ymd_and_hms(2017, 5, 10, 9, 0, 0).unwrap();
        let mut record = FlightRecord::new(airline, destination);
        record.scheduled_departure = Some(scheduled);
        record.actual_departure = Some(if delayed {
            scheduled + Duration::minutes(40)
        } else {
            scheduled + Duration::minutes(5)
        });
        record
    }

    fn training_corpus() -> Vec<FlightRecord> {
        let mut corpus = Vec::new();
        // Operator "X": 3 of 10 flights delayed
        for i in 0..10 {
            corpus.push(labelled_flight("X", "Antofagasta", i < 3));
        }
        // Another operator to move the global mean off X's rate
        for i in 0..10 {
            corpus.push(labelled_flight("Z", "Iquique", i < 1));
        }
        corpus
    }

    #[test]
    fn test_fit_computes_per_category_rates() {
        let state = RiskEncoder::fit(&training_corpus(), &EncodedColumn::ALL).unwrap();

        let rate = state.rate_for(EncodedColumn::OperatingAirline, "X").unwrap();
        assert!((rate - 0.30).abs() < 1e-9);
        assert_eq!(state.fitted_rows(), 20);
    }

    #[test]
    fn test_unseen_category_falls_back_to_global_mean() {
        let state = RiskEncoder::fit(&training_corpus(), &EncodedColumn::ALL).unwrap();

        // 4 delayed of 20 -> global mean 0.20
        assert!((state.global_mean() - 0.20).abs() < 1e-9);
        let rate = state.rate_for(EncodedColumn::OperatingAirline, "Y").unwrap();
        assert!((rate - 0.20).abs() < 1e-9);
    }

    #[test]
    fn test_columns_are_encoded_independently() {
        let state = RiskEncoder::fit(&training_corpus(), &EncodedColumn::ALL).unwrap();

        let dest = state
            .rate_for(EncodedColumn::Destination, "Antofagasta")
            .unwrap();
        assert!((dest - 0.30).abs() < 1e-9);

        // "X" exists as an airline, not a destination
        let dest = state.rate_for(EncodedColumn::Destination, "X").unwrap();
        assert!((dest - state.global_mean()).abs() < 1e-9);
    }

    #[test]
    fn test_transform_never_recomputes_from_input() {
        let state = RiskEncoder::fit(&training_corpus(), &EncodedColumn::ALL).unwrap();

        // A delayed serving record for operator X must not shift X's rate
        let serving = labelled_flight("X", "Antofagasta", true);
        let features = state.transform(&serving).unwrap();
        assert!((features.airline_delay_rate - 0.30).abs() < 1e-9);

        let again = state.transform(&serving).unwrap();
        assert_eq!(features, again);
    }

    #[test]
    fn test_unfit_state_is_a_precondition_failure() {
        let state = RiskEncoderState {
            columns: HashMap::new(),
            global_mean: f64::NAN,
            fitted_rows: 0,
        };

        let record = FlightRecord::new("X", "Antofagasta");
        match state.transform(&record) {
            Err(PipelineError::EncoderPrecondition) => {}
            other => panic!("expected precondition failure, got {other:?}"),
        }
    }

    #[test]
    fn test_fit_requires_labelled_rows() {
        let corpus = vec![FlightRecord::new("X", "Antofagasta")];
        assert!(RiskEncoder::fit(&corpus, &EncodedColumn::ALL).is_err());
    }
}
