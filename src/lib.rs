//! Flight Delay Pipeline Library
//!
//! Real-time scoring of scheduled departures for delay risk: leakage-safe
//! risk feature derivation, fixed-schema vector assembly, and calibrated
//! threshold decisions over interchangeable scoring models.

pub mod audit;
pub mod config;
pub mod consumer;
pub mod error;
pub mod features;
pub mod metrics;
pub mod models;
pub mod producer;
pub mod types;

pub use config::AppConfig;
pub use consumer::RequestConsumer;
pub use error::{ArtifactError, PipelineError};
pub use features::pipeline::{FeaturePipeline, PreprocessorState};
pub use models::inference::DecisionEngine;
pub use models::registry::{ModelKind, ModelRegistry};
pub use producer::DecisionProducer;
pub use types::{decision::PredictionDecision, decision::ScoreResponse, flight::FlightRecord, flight::ScoreRequest};
