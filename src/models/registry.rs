//! Closed registry of interchangeable scoring models.
//!
//! The set of available models is a closed enumerated variant rather
//! than free-form strings: callers select by name, an unknown name is a
//! typed client error, and the registry maps each variant to its loaded
//! model handle. The registry is built once at startup and shared
//! read-only across all requests.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::info;

use crate::error::PipelineError;
use crate::models::inference::ScoringModel;

/// The scoring models this service can serve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Xgboost,
    RandomForest,
    LogisticRegression,
    VotingClassifier,
}

impl ModelKind {
    pub const ALL: [ModelKind; 4] = [
        ModelKind::Xgboost,
        ModelKind::RandomForest,
        ModelKind::LogisticRegression,
        ModelKind::VotingClassifier,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Xgboost => "xgboost",
            ModelKind::RandomForest => "random_forest",
            ModelKind::LogisticRegression => "logistic_regression",
            ModelKind::VotingClassifier => "voting_classifier",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "xgboost" => Ok(ModelKind::Xgboost),
            "random_forest" => Ok(ModelKind::RandomForest),
            "logistic_regression" => Ok(ModelKind::LogisticRegression),
            "voting_classifier" => Ok(ModelKind::VotingClassifier),
            other => Err(PipelineError::UnknownModel(other.to_string())),
        }
    }
}

/// One registered model: the scoring handle plus its operating threshold
pub struct RegisteredModel {
    pub scorer: Box<dyn ScoringModel>,
    pub threshold: f64,
}

/// Immutable model registry, constructed once during initialization
pub struct ModelRegistry {
    models: HashMap<ModelKind, RegisteredModel>,
    default: ModelKind,
}

impl ModelRegistry {
    /// Build a registry. The default model must be among the entries.
    pub fn new(
        models: HashMap<ModelKind, RegisteredModel>,
        default: ModelKind,
    ) -> Result<Self, PipelineError> {
        if !models.contains_key(&default) {
            return Err(PipelineError::UnknownModel(default.as_str().to_string()));
        }

        info!(
            count = models.len(),
            default = %default,
            "Model registry initialized"
        );
        Ok(Self { models, default })
    }

    /// Resolve a request's optional model name to a registered model.
    /// Absent name means the documented default; an unknown or unloaded
    /// name is a client error.
    pub fn resolve(&self, name: Option<&str>) -> Result<(ModelKind, &RegisteredModel), PipelineError> {
        let kind = match name {
            Some(raw) => ModelKind::from_str(raw)?,
            None => self.default,
        };

        let model = self
            .models
            .get(&kind)
            .ok_or_else(|| PipelineError::UnknownModel(kind.as_str().to_string()))?;
        Ok((kind, model))
    }

    pub fn default_kind(&self) -> ModelKind {
        self.default
    }

    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    pub fn model_names(&self) -> Vec<&'static str> {
        self.models.keys().map(|k| k.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::inference::tests_support::StubModel;

    fn registry_with(kinds: &[ModelKind], default: ModelKind) -> Result<ModelRegistry, PipelineError> {
        let models = kinds
            .iter()
            .map(|&kind| {
                (
                    kind,
                    RegisteredModel {
                        scorer: Box::new(StubModel::new(kind.as_str(), 0.5)) as Box<dyn ScoringModel>,
                        threshold: 0.35,
                    },
                )
            })
            .collect();
        ModelRegistry::new(models, default)
    }

    #[test]
    fn test_resolve_default_when_unnamed() {
        let registry = registry_with(&[ModelKind::Xgboost], ModelKind::Xgboost).unwrap();
        let (kind, _) = registry.resolve(None).unwrap();
        assert_eq!(kind, ModelKind::Xgboost);
    }

    #[test]
    fn test_unknown_name_is_client_error() {
        let registry = registry_with(&[ModelKind::Xgboost], ModelKind::Xgboost).unwrap();
        match registry.resolve(Some("gradient_unicorn")) {
            Err(PipelineError::UnknownModel(name)) => assert_eq!(name, "gradient_unicorn"),
            other => panic!("expected unknown model error, got {:?}", other.map(|(k, _)| k)),
        }
    }

    #[test]
    fn test_known_kind_not_loaded_is_rejected() {
        let registry = registry_with(&[ModelKind::Xgboost], ModelKind::Xgboost).unwrap();
        assert!(registry.resolve(Some("random_forest")).is_err());
    }

    #[test]
    fn test_registry_requires_default_model() {
        assert!(registry_with(&[ModelKind::RandomForest], ModelKind::Xgboost).is_err());
    }

    #[test]
    fn test_kind_round_trips_through_str() {
        for kind in ModelKind::ALL {
            assert_eq!(ModelKind::from_str(kind.as_str()).unwrap(), kind);
        }
    }
}
