//! Configuration management for the delay scoring pipeline

use anyhow::{Context, Result};
use config::{Config, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::features::temporal::SeasonWindow;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub nats: NatsConfig,
    pub models: ModelsConfig,
    pub detection: DetectionConfig,
    #[serde(default)]
    pub features: FeaturesConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub audit: AuditConfig,
}

/// NATS connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Subject for incoming score requests
    pub request_subject: String,
    /// Subject for outgoing decisions
    pub decision_subject: String,
}

/// Model artifact configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    /// Directory containing the ONNX model files and the preprocessor state
    pub artifacts_dir: String,
    /// Fitted preprocessor artifact filename within artifacts_dir
    #[serde(default = "default_preprocessor_file")]
    pub preprocessor_file: String,
    /// Default model when a request does not name one
    #[serde(default = "default_model")]
    pub default_model: String,
    /// Model name -> ONNX filename within artifacts_dir
    #[serde(default = "default_model_files")]
    pub files: HashMap<String, String>,
    /// Per-model operating thresholds (probability >= threshold => DELAY)
    #[serde(default = "default_model_thresholds")]
    pub thresholds: HashMap<String, f64>,
    /// Number of threads for ONNX inference per model (default: 1)
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
}

fn default_onnx_threads() -> usize {
    1
}

fn default_preprocessor_file() -> String {
    "preprocessor.json".to_string()
}

fn default_model() -> String {
    "xgboost".to_string()
}

fn default_model_files() -> HashMap<String, String> {
    let mut files = HashMap::new();
    files.insert("xgboost".to_string(), "xgb_final.onnx".to_string());
    files.insert("random_forest".to_string(), "rf_final.onnx".to_string());
    files.insert(
        "logistic_regression".to_string(),
        "logreg_final.onnx".to_string(),
    );
    files.insert(
        "voting_classifier".to_string(),
        "voting_final.onnx".to_string(),
    );
    files
}

fn default_model_thresholds() -> HashMap<String, f64> {
    let mut thresholds = HashMap::new();
    // Operating points tuned offline per model; xgboost is the recall champion
    thresholds.insert("xgboost".to_string(), 0.35);
    thresholds.insert("random_forest".to_string(), 0.48);
    thresholds.insert("logistic_regression".to_string(), 0.50);
    thresholds.insert("voting_classifier".to_string(), 0.50);
    thresholds
}

/// Decision configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DetectionConfig {
    /// Fallback threshold when a model has no entry in models.thresholds
    #[serde(default = "default_threshold")]
    pub fallback_threshold: f64,
}

fn default_threshold() -> f64 {
    0.35
}

/// Feature derivation configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FeaturesConfig {
    /// Reserved numeric value upstream sources use for "reading unavailable"
    #[serde(default = "default_weather_sentinel")]
    pub weather_sentinel: f64,
    /// High-season date windows, year-relative closed intervals
    #[serde(default = "SeasonWindow::default_windows")]
    pub high_season: Vec<SeasonWindow>,
}

fn default_weather_sentinel() -> f64 {
    -999.0
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            weather_sentinel: default_weather_sentinel(),
            high_season: SeasonWindow::default_windows(),
        }
    }
}

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Number of concurrent scoring tasks
    pub workers: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

/// Audit sink configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    /// Path of the append-only prediction log
    #[serde(default = "default_audit_path")]
    pub path: String,
}

fn default_audit_path() -> String {
    "logs/predictions.jsonl".to_string()
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            path: default_audit_path(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Resolve the operating threshold for a model name
    pub fn threshold_for(&self, model: &str) -> f64 {
        self.models
            .thresholds
            .get(model)
            .copied()
            .unwrap_or(self.detection.fallback_threshold)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            nats: NatsConfig {
                url: "nats://localhost:4222".to_string(),
                request_subject: "flights.score".to_string(),
                decision_subject: "flights.decisions".to_string(),
            },
            models: ModelsConfig {
                artifacts_dir: "models".to_string(),
                preprocessor_file: default_preprocessor_file(),
                default_model: default_model(),
                files: default_model_files(),
                thresholds: default_model_thresholds(),
                onnx_threads: 1,
            },
            detection: DetectionConfig {
                fallback_threshold: default_threshold(),
            },
            features: FeaturesConfig::default(),
            pipeline: PipelineConfig { workers: 4 },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "json".to_string(),
            },
            audit: AuditConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.nats.url, "nats://localhost:4222");
        assert_eq!(config.models.default_model, "xgboost");
        assert_eq!(config.models.files.len(), 4);
        assert_eq!(config.features.weather_sentinel, -999.0);
        assert_eq!(config.features.high_season.len(), 4);
    }

    #[test]
    fn test_model_thresholds() {
        let config = AppConfig::default();
        assert_eq!(config.threshold_for("xgboost"), 0.35);
        assert_eq!(config.threshold_for("random_forest"), 0.48);
        assert_eq!(config.threshold_for("logistic_regression"), 0.50);
        // Unknown models fall back to the detection default
        assert_eq!(config.threshold_for("something_else"), 0.35);
    }
}
