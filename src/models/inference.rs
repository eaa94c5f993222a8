//! Scoring model invocation and the inference decision engine.
//!
//! `ScoringModel` is the capability contract: anything that maps a
//! model input to a probability of delay. `OnnxScorer` implements it
//! over an ONNX Runtime session; the decision engine is a stateless
//! function over (vector, model, threshold).

use ort::memory::Allocator;
use ort::session::Session;
use ort::value::{DowncastableTarget, DynMapValueType, DynSequenceValueType};
use std::sync::RwLock;
use tracing::debug;

use crate::error::PipelineError;
use crate::features::assembler::FeatureVector;
use crate::types::decision::PredictionDecision;

/// Capability contract for an interchangeable scoring model
pub trait ScoringModel: Send + Sync {
    /// Stable identifier recorded in decisions and audit entries
    fn identifier(&self) -> &str;

    /// Probability of the positive (delay) class for one input, in [0,1]
    fn predict_probability(&self, input: &[f32]) -> Result<f64, PipelineError>;
}

/// ONNX-backed scoring model.
///
/// Sessions require exclusive access to run, so each sits behind its own
/// lock; everything else about the scorer is immutable after load.
pub struct OnnxScorer {
    name: String,
    session: RwLock<Session>,
    input_name: String,
    output_name: String,
    expected_features: usize,
}

impl OnnxScorer {
    pub fn new(
        name: String,
        session: Session,
        input_name: String,
        output_name: String,
        expected_features: usize,
    ) -> Self {
        Self {
            name,
            session: RwLock::new(session),
            input_name,
            output_name,
            expected_features,
        }
    }

    fn scoring_error(&self, detail: impl Into<String>) -> PipelineError {
        PipelineError::Scoring {
            model: self.name.clone(),
            detail: detail.into(),
        }
    }

    /// Extract the positive-class probability from a `[batch, classes]`
    /// or `[classes]` tensor output (XGBoost, random forest exports).
    fn probability_from_tensor(dims: &[i64], data: &[f32]) -> Option<f64> {
        let classes = match dims {
            [_, n] => *n as usize,
            [n] => *n as usize,
            _ => return None,
        };

        match classes {
            0 => None,
            1 => data.first().map(|&v| v as f64),
            _ => data.get(1).map(|&v| v as f64),
        }
    }

    /// Extract the positive-class probability from a seq(map(int64,
    /// float)) output, the shape sklearn ZipMap exports use.
    fn probability_from_sequence_map(
        &self,
        output: &ort::value::DynValue,
    ) -> Result<f64, PipelineError> {
        let allocator = Allocator::default();

        let sequence = output
            .downcast_ref::<DynSequenceValueType>()
            .map_err(|e| self.scoring_error(format!("not a sequence output: {e}")))?;

        let maps = sequence
            .try_extract_sequence::<DynMapValueType>(&allocator)
            .map_err(|e| self.scoring_error(format!("sequence extraction failed: {e}")))?;

        let map_value = maps
            .first()
            .ok_or_else(|| self.scoring_error("empty sequence output"))?;

        let kv_pairs = map_value
            .try_extract_key_values::<i64, f32>()
            .map_err(|e| self.scoring_error(format!("map extraction failed: {e}")))?;

        for (class_id, prob) in &kv_pairs {
            if *class_id == 1 {
                return Ok(*prob as f64);
            }
        }
        // Binary map without class 1: invert class 0
        for (class_id, prob) in &kv_pairs {
            if *class_id == 0 {
                return Ok(1.0 - *prob as f64);
            }
        }

        Err(self.scoring_error("no class probability in map output"))
    }

    /// Try one output value: tensor first, then seq(map). Ok(None) means
    /// the output is neither shape; a malformed seq(map) is an error.
    fn extract_probability(
        &self,
        name: &str,
        output: &ort::value::DynValue,
    ) -> Result<Option<f64>, PipelineError> {
        if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
            let dims: Vec<i64> = shape.iter().copied().collect();
            if let Some(prob) = Self::probability_from_tensor(&dims, data) {
                debug!(model = %self.name, output = %name, prob = prob, "Probability from tensor output");
                return Ok(Some(prob));
            }
            return Ok(None);
        }

        if DynSequenceValueType::can_downcast(&output.dtype()) {
            let prob = self.probability_from_sequence_map(output)?;
            debug!(model = %self.name, output = %name, prob = prob, "Probability from seq(map) output");
            return Ok(Some(prob));
        }

        Ok(None)
    }
}

impl ScoringModel for OnnxScorer {
    fn identifier(&self) -> &str {
        &self.name
    }

    fn predict_probability(&self, input: &[f32]) -> Result<f64, PipelineError> {
        use ort::value::Tensor;

        if input.len() != self.expected_features {
            return Err(PipelineError::SchemaMismatch {
                position: input.len().min(self.expected_features),
                expected: format!("{} features", self.expected_features),
                found: format!("{} features", input.len()),
            });
        }

        let shape = vec![1_i64, input.len() as i64];
        let input_tensor = Tensor::from_array((shape, input.to_vec()))
            .map_err(|e| self.scoring_error(format!("input tensor construction failed: {e}")))?;

        let mut session = self
            .session
            .write()
            .map_err(|e| self.scoring_error(format!("session lock poisoned: {e}")))?;

        let outputs = session
            .run(ort::inputs![&self.input_name => input_tensor])
            .map_err(|e| self.scoring_error(format!("session run failed: {e}")))?;

        // Preferred output first, then any non-label output. An output
        // we cannot read is a scoring failure, never a default score.
        if let Some(output) = outputs.get(self.output_name.as_str()) {
            if let Some(prob) = self.extract_probability(self.output_name.as_str(), &output)? {
                return Ok(prob);
            }
        }
        for (name, output) in outputs.iter() {
            let name: &str = name.as_ref();
            if name == self.output_name || name.contains("label") {
                continue;
            }
            if let Some(prob) = self.extract_probability(name, &output)? {
                return Ok(prob);
            }
        }

        Err(self.scoring_error("no readable probability output"))
    }
}

/// Stateless decision engine: score, threshold, emit the decision record.
pub struct DecisionEngine;

impl DecisionEngine {
    /// Apply a scoring model to an assembled vector and classify against
    /// the operating threshold. The boundary is inclusive: probability
    /// exactly equal to the threshold is a delay alert.
    pub fn decide(
        vector: &FeatureVector,
        model: &dyn ScoringModel,
        threshold: f64,
    ) -> Result<PredictionDecision, PipelineError> {
        let input = vector.to_model_input();
        let probability = model.predict_probability(&input)?;

        if !probability.is_finite() || !(0.0..=1.0).contains(&probability) {
            return Err(PipelineError::Scoring {
                model: model.identifier().to_string(),
                detail: format!("probability {probability} outside [0, 1]"),
            });
        }

        let decision = PredictionDecision::classify(probability, threshold, model.identifier());
        debug!(
            model = %decision.model,
            probability = decision.probability,
            threshold = decision.threshold,
            class = decision.predicted_class,
            "Decision produced"
        );
        Ok(decision)
    }
}

#[cfg(test)]
pub mod tests_support {
    use super::*;

    /// Fixed-probability model for engine and registry tests
    pub struct StubModel {
        name: String,
        probability: f64,
    }

    impl StubModel {
        pub fn new(name: &str, probability: f64) -> Self {
            Self {
                name: name.to_string(),
                probability,
            }
        }
    }

    impl ScoringModel for StubModel {
        fn identifier(&self) -> &str {
            &self.name
        }

        fn predict_probability(&self, _input: &[f32]) -> Result<f64, PipelineError> {
            Ok(self.probability)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::tests_support::StubModel;
    use super::*;
    use crate::features::assembler::{FeatureAssembler, WeatherFeatures};
    use crate::features::imputer::ImputedReading;
    use crate::features::risk_encoder::RiskFeatures;
    use crate::features::temporal::DerivedTemporalFeatures;
    use crate::types::decision::AlertLabel;
    use crate::types::flight::FlightType;

    fn sample_vector() -> FeatureVector {
        let reading = ImputedReading {
            value: 10.0,
            missing: 0,
        };
        FeatureAssembler::native()
            .assemble(
                &DerivedTemporalFeatures::unknown(),
                &RiskFeatures {
                    airline_delay_rate: 0.2,
                    destination_delay_rate: 0.2,
                },
                &WeatherFeatures {
                    wind_speed: reading,
                    pressure: reading,
                    temperature: reading,
                },
                FlightType::Domestic,
            )
            .unwrap()
    }

    #[test]
    fn test_probability_at_threshold_is_delay() {
        let vector = sample_vector();
        let model = StubModel::new("xgboost", 0.35);

        let decision = DecisionEngine::decide(&vector, &model, 0.35).unwrap();
        assert_eq!(decision.predicted_class, 1);
        assert_eq!(decision.label, AlertLabel::Delay);
        assert_eq!(decision.threshold, 0.35);
        assert_eq!(decision.model, "xgboost");
    }

    #[test]
    fn test_probability_one_ulp_below_threshold_is_on_time() {
        let vector = sample_vector();
        let threshold: f64 = 0.35;
        let below = f64::from_bits(threshold.to_bits() - 1);
        assert!(below < threshold);

        let model = StubModel::new("xgboost", below);
        let decision = DecisionEngine::decide(&vector, &model, threshold).unwrap();
        assert_eq!(decision.predicted_class, 0);
        assert_eq!(decision.label, AlertLabel::OnTime);
    }

    #[test]
    fn test_near_threshold_probability_is_on_time() {
        let vector = sample_vector();
        let model = StubModel::new("xgboost", 0.349999);
        let decision = DecisionEngine::decide(&vector, &model, 0.35).unwrap();
        assert_eq!(decision.predicted_class, 0);
    }

    #[test]
    fn test_out_of_range_probability_is_a_scoring_failure() {
        let vector = sample_vector();

        for bad in [1.5, -0.1, f64::NAN] {
            let model = StubModel::new("xgboost", bad);
            match DecisionEngine::decide(&vector, &model, 0.35) {
                Err(PipelineError::Scoring { model, .. }) => assert_eq!(model, "xgboost"),
                other => panic!("expected scoring failure, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_tensor_probability_extraction_shapes() {
        // [1, 2]: class-1 column
        assert_eq!(
            OnnxScorer::probability_from_tensor(&[1, 2], &[0.3, 0.7]),
            Some(0.7f32 as f64)
        );

        // [1, 1]: single probability
        assert_eq!(
            OnnxScorer::probability_from_tensor(&[1, 1], &[0.42]),
            Some(0.42f32 as f64)
        );

        // [2]: bare class vector
        assert_eq!(
            OnnxScorer::probability_from_tensor(&[2], &[0.1, 0.9]),
            Some(0.9f32 as f64)
        );

        // Unreadable rank
        assert_eq!(OnnxScorer::probability_from_tensor(&[], &[]), None);
    }
}
