//! Append-only audit log of served predictions.
//!
//! One JSON record per decision: the input feature values, the decision,
//! the model used, and a timestamp. Entries are appended without ever
//! rewriting prior lines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

use crate::error::ArtifactError;
use crate::features::assembler::FeatureVector;
use crate::types::decision::PredictionDecision;

/// One served prediction, as appended to the audit sink
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub request_id: String,
    pub features: FeatureVector,
    pub probability: f64,
    pub predicted_class: u8,
    pub threshold: f64,
    pub model: String,
    pub timestamp: DateTime<Utc>,
}

impl AuditRecord {
    pub fn new(request_id: &str, features: &FeatureVector, decision: &PredictionDecision) -> Self {
        Self {
            request_id: request_id.to_string(),
            features: features.clone(),
            probability: decision.probability,
            predicted_class: decision.predicted_class,
            threshold: decision.threshold,
            model: decision.model.clone(),
            timestamp: decision.decided_at,
        }
    }
}

/// Append-only JSON-lines audit sink
pub struct AuditLog {
    file: Mutex<File>,
}

impl AuditLog {
    /// Open (or create) the audit file for appending
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ArtifactError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        info!(path = %path.display(), "Audit log opened");
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Append one record as a single JSON line
    pub fn append(&self, record: &AuditRecord) -> Result<(), ArtifactError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mut file = self
            .file
            .lock()
            .map_err(|e| ArtifactError::Invalid(format!("audit lock poisoned: {e}")))?;
        file.write_all(&line)?;
        Ok(())
    }
}
