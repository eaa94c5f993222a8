//! Preprocessor artifact and end-to-end feature derivation.
//!
//! `PreprocessorState` is the versioned blob produced by the offline fit
//! stage and loaded wholesale at service startup; it bundles the fitted
//! risk encoder, the fitted imputer, and the feature schema the models
//! were trained on. `FeaturePipeline` composes the derivation stages for
//! one request: temporal -> impute -> risk encode -> assemble.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::{debug, info};

use crate::error::{ArtifactError, PipelineError};
use crate::features::assembler::{FeatureAssembler, FeatureVector, WeatherFeatures, FEATURE_COLUMNS};
use crate::features::imputer::{ImputerState, WeatherField};
use crate::features::risk_encoder::{EncodedColumn, RiskEncoder, RiskEncoderState, RiskFeatures};
use crate::features::temporal::{
    derive_temporal, DerivedTemporalFeatures, SeasonCalendar, SeasonWindow,
};
use crate::types::flight::FlightRecord;

/// Artifact format version; bumped when the schema or state layout changes
const PREPROCESSOR_VERSION: u32 = 1;

/// Fitted preprocessing state, persisted as a versioned JSON blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessorState {
    pub version: u32,
    pub encoder: RiskEncoderState,
    pub imputer: ImputerState,
    /// Feature columns the downstream models were trained on, in order
    pub schema: Vec<String>,
}

impl PreprocessorState {
    /// Offline fit stage: build the full preprocessing state from a
    /// labelled training corpus.
    pub fn fit(corpus: &[FlightRecord], sentinel: f64) -> Result<Self, ArtifactError> {
        let encoder = RiskEncoder::fit(corpus, &EncodedColumn::ALL)?;
        let imputer = ImputerState::fit(corpus, sentinel)?;

        Ok(Self {
            version: PREPROCESSOR_VERSION,
            encoder,
            imputer,
            schema: FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect(),
        })
    }

    /// Load the artifact from disk, verifying it is usable for serving.
    /// Any failure here is fatal at startup.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ArtifactError> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading preprocessor artifact");

        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let state: PreprocessorState = serde_json::from_reader(reader)?;
        state.validate()?;

        info!(
            version = state.version,
            fitted_rows = state.encoder.fitted_rows(),
            global_mean = state.encoder.global_mean(),
            "Preprocessor artifact loaded"
        );
        Ok(state)
    }

    /// Persist the artifact; used by the offline fit stage.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ArtifactError> {
        let file = File::create(path.as_ref())?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    fn validate(&self) -> Result<(), ArtifactError> {
        if self.version != PREPROCESSOR_VERSION {
            return Err(ArtifactError::Invalid(format!(
                "unsupported preprocessor version {} (expected {})",
                self.version, PREPROCESSOR_VERSION
            )));
        }
        if self.schema.is_empty() {
            return Err(ArtifactError::Invalid(
                "preprocessor artifact has an empty feature schema".to_string(),
            ));
        }
        self.encoder
            .ensure_fitted()
            .map_err(|_| ArtifactError::Invalid("risk encoder state is unfit".to_string()))?;
        Ok(())
    }
}

/// Per-request feature derivation over immutable fitted state.
#[derive(Debug, Clone)]
pub struct FeaturePipeline {
    state: PreprocessorState,
    calendar: SeasonCalendar,
    assembler: FeatureAssembler,
}

impl FeaturePipeline {
    pub fn new(state: PreprocessorState, high_season: Vec<SeasonWindow>) -> Self {
        let assembler = FeatureAssembler::new(state.schema.clone());
        Self {
            state,
            calendar: SeasonCalendar::new(high_season),
            assembler,
        }
    }

    /// Derive the model-ready vector for one record.
    ///
    /// Requests may carry pre-derived temporal fields and pre-computed
    /// historical-rate fields; when present they take precedence over
    /// on-the-fly derivation, supporting serving configurations that
    /// resolve these upstream.
    pub fn derive(&self, record: &FlightRecord) -> Result<FeatureVector, PipelineError> {
        let derived = derive_temporal(record.scheduled_departure, &self.calendar);
        if record.scheduled_departure.is_none() && record.period_of_day.is_none() {
            debug!("Scheduled departure missing; temporal features set to unknown");
        }

        let temporal = DerivedTemporalFeatures {
            month: record.month.unwrap_or(derived.month),
            day_of_week: record
                .day_of_week
                .as_deref()
                .and_then(|name| name.parse().ok())
                .or(derived.day_of_week),
            period_of_day: record.period_of_day.unwrap_or(derived.period_of_day),
            is_high_season: record.high_season.unwrap_or(derived.is_high_season),
        };

        let weather = WeatherFeatures {
            wind_speed: self
                .state
                .imputer
                .transform(WeatherField::WindSpeed, record.wind_speed),
            pressure: self
                .state
                .imputer
                .transform(WeatherField::Pressure, record.pressure),
            temperature: self
                .state
                .imputer
                .transform(WeatherField::Temperature, record.temperature),
        };

        let risk = match (record.airline_delay_rate, record.destination_delay_rate) {
            (Some(airline), Some(destination)) => RiskFeatures {
                airline_delay_rate: airline,
                destination_delay_rate: destination,
            },
            _ => self.state.encoder.transform(record)?,
        };

        self.assembler
            .assemble(&temporal, &risk, &weather, record.flight_type)
    }

    pub fn state(&self) -> &PreprocessorState {
        &self.state
    }
}
