//! ONNX scoring-model artifact loading.
//!
//! All configured models are loaded once at startup; a configured model
//! file that is missing or unreadable is fatal, never deferred to
//! request time.

use ort::session::{builder::GraphOptimizationLevel, Session};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

use crate::config::ModelsConfig;
use crate::error::ArtifactError;
use crate::features::assembler::FEATURE_COLUMNS;
use crate::models::inference::OnnxScorer;
use crate::models::registry::{ModelKind, ModelRegistry, RegisteredModel};

/// Loader for ONNX scoring models
pub struct ModelLoader {
    /// Number of threads for ONNX inference per session
    onnx_threads: usize,
}

impl ModelLoader {
    /// Create a loader, initializing the ONNX runtime once.
    pub fn new(onnx_threads: usize) -> Result<Self, ArtifactError> {
        ort::init()
            .commit()
            .map_err(|e| ArtifactError::Invalid(format!("ONNX runtime init failed: {e}")))?;
        info!(onnx_threads, "ONNX Runtime initialized");
        Ok(Self { onnx_threads })
    }

    /// Load one model session from file
    pub fn load_model<P: AsRef<Path>>(
        &self,
        path: P,
        kind: ModelKind,
        threshold: f64,
    ) -> Result<RegisteredModel, ArtifactError> {
        let path = path.as_ref();
        info!(model = %kind, path = %path.display(), threshold, "Loading ONNX model");

        let session = Session::builder()
            .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|b| b.with_intra_threads(self.onnx_threads))
            .and_then(|b| b.commit_from_file(path))
            .map_err(|e| {
                ArtifactError::Invalid(format!(
                    "failed to load model '{kind}' from {}: {e}",
                    path.display()
                ))
            })?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "float_input".to_string());

        let output_name = session
            .outputs
            .iter()
            .find(|o| o.name.contains("prob") || o.name.contains("output"))
            .map(|o| o.name.clone())
            .unwrap_or_else(|| {
                session
                    .outputs
                    .last()
                    .map(|o| o.name.clone())
                    .unwrap_or_else(|| "probabilities".to_string())
            });

        info!(
            model = %kind,
            input = %input_name,
            output = %output_name,
            "Model loaded"
        );

        Ok(RegisteredModel {
            scorer: Box::new(OnnxScorer::new(
                kind.as_str().to_string(),
                session,
                input_name,
                output_name,
                FEATURE_COLUMNS.len(),
            )),
            threshold,
        })
    }

    /// Load every model named in configuration and build the registry.
    ///
    /// Configuration errors (unknown model key, missing file, default
    /// model absent) refuse startup rather than serving partial state.
    pub fn load_registry(&self, config: &ModelsConfig) -> Result<ModelRegistry, ArtifactError> {
        let artifacts_dir = Path::new(&config.artifacts_dir);
        let mut models = HashMap::new();

        for (name, filename) in &config.files {
            let kind = ModelKind::from_str(name).map_err(|_| {
                ArtifactError::Invalid(format!("configured model '{name}' is not a known kind"))
            })?;

            let threshold = config
                .thresholds
                .get(name)
                .copied()
                .ok_or_else(|| {
                    ArtifactError::Invalid(format!("no threshold configured for model '{name}'"))
                })?;

            let model = self.load_model(artifacts_dir.join(filename), kind, threshold)?;
            models.insert(kind, model);
        }

        if models.is_empty() {
            return Err(ArtifactError::Invalid(format!(
                "no models configured under {}",
                artifacts_dir.display()
            )));
        }

        let default = ModelKind::from_str(&config.default_model).map_err(|_| {
            ArtifactError::Invalid(format!(
                "default model '{}' is not a known kind",
                config.default_model
            ))
        })?;

        let count = models.len();
        let registry = ModelRegistry::new(models, default).map_err(|_| {
            ArtifactError::Invalid(format!(
                "default model '{}' is not among the loaded models",
                config.default_model
            ))
        })?;

        info!(count, default = %default, "All configured models loaded");
        Ok(registry)
    }
}
