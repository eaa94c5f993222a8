//! Flight Delay Pipeline - Main Entry Point
//!
//! Consumes score requests from NATS, derives features, runs model
//! inference, and publishes decisions. Supports parallel request
//! processing for high throughput.

use anyhow::{Context, Result};
use flight_delay_pipeline::{
    audit::{AuditLog, AuditRecord},
    config::AppConfig,
    error::PipelineError,
    features::pipeline::{FeaturePipeline, PreprocessorState},
    metrics::{MetricsReporter, PipelineMetrics},
    models::inference::DecisionEngine,
    models::loader::ModelLoader,
    models::registry::ModelRegistry,
    producer::DecisionProducer,
    types::decision::{AlertLabel, ScoreResponse},
    types::flight::ScoreRequest,
    consumer::RequestConsumer,
};
use futures::StreamExt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("flight_delay_pipeline=info".parse()?),
        )
        .init();

    info!("Starting Flight Delay Pipeline");

    // Load configuration
    let config = AppConfig::load()?;
    info!("Configuration loaded successfully");
    info!(
        default_model = %config.models.default_model,
        fallback_threshold = config.detection.fallback_threshold,
        "Serving configuration"
    );

    // Load the fitted preprocessor artifact; missing or corrupt state
    // refuses startup rather than serving partial predictions
    let preprocessor_path =
        Path::new(&config.models.artifacts_dir).join(&config.models.preprocessor_file);
    let preprocessor = PreprocessorState::load(&preprocessor_path)
        .context("Preprocessor artifact unavailable; refusing to start")?;

    let pipeline = Arc::new(FeaturePipeline::new(
        preprocessor,
        config.features.high_season.clone(),
    ));
    info!("Feature pipeline initialized");

    // Load all configured scoring models into the immutable registry
    let loader = ModelLoader::new(config.models.onnx_threads)
        .context("ONNX runtime initialization failed")?;
    let registry = Arc::new(
        loader
            .load_registry(&config.models)
            .context("Model artifacts unavailable; refusing to start")?,
    );
    info!(
        "Model registry initialized with {} models: {:?}",
        registry.model_count(),
        registry.model_names()
    );

    // Open the append-only audit sink
    let audit = Arc::new(AuditLog::open(&config.audit.path)?);

    // Initialize metrics
    let metrics = Arc::new(PipelineMetrics::new());

    // Connect to NATS
    let client = async_nats::connect(&config.nats.url).await?;
    info!("Connected to NATS at {}", config.nats.url);

    // Initialize consumer and producer
    let consumer = RequestConsumer::new(client.clone(), &config.nats.request_subject);
    let producer = Arc::new(DecisionProducer::new(
        client.clone(),
        &config.nats.decision_subject,
    ));

    let num_workers = config.pipeline.workers;
    info!(
        "Starting request processing loop with {} parallel workers",
        num_workers
    );
    info!("Listening on subject: {}", config.nats.request_subject);
    info!("Publishing decisions to: {}", config.nats.decision_subject);

    // Semaphore to limit concurrent processing
    let semaphore = Arc::new(Semaphore::new(num_workers));
    let processed_count = Arc::new(AtomicU64::new(0));

    let config = Arc::new(config);

    // Start metrics reporter (prints summary every 30 seconds)
    let metrics_clone = metrics.clone();
    tokio::spawn(async move {
        let reporter = MetricsReporter::new(metrics_clone, 30);
        reporter.start().await;
    });

    // Process requests in parallel
    let mut subscription = consumer.subscribe().await?;

    while let Some(message) = subscription.next().await {
        let permit = semaphore.clone().acquire_owned().await.unwrap();

        let pipeline = pipeline.clone();
        let registry = registry.clone();
        let producer = producer.clone();
        let audit = audit.clone();
        let metrics = metrics.clone();
        let processed_count = processed_count.clone();
        let config = config.clone();

        tokio::spawn(async move {
            let start_time = Instant::now();

            match serde_json::from_slice::<ScoreRequest>(&message.payload) {
                Ok(request) => {
                    let request_id = request
                        .request_id
                        .clone()
                        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

                    let response =
                        score_request(&request, &request_id, &pipeline, &registry, &audit);

                    match &response {
                        ScoreResponse::Ok {
                            prediction,
                            confidence_score,
                            model_used,
                            ..
                        } => {
                            let processing_time = start_time.elapsed();
                            metrics.record_request(
                                processing_time,
                                *confidence_score,
                                matches!(prediction, AlertLabel::Delay),
                            );
                            debug!(
                                request_id = %request_id,
                                model = %model_used,
                                confidence_score = confidence_score,
                                processing_time_us = processing_time.as_micros(),
                                "Request scored"
                            );
                        }
                        ScoreResponse::Failed { kind, detail, .. } => {
                            metrics.record_failure();
                            warn!(
                                request_id = %request_id,
                                kind = %kind,
                                detail = %detail,
                                "Request failed"
                            );
                        }
                    }

                    if let Err(e) = producer.publish(&response).await {
                        error!(
                            request_id = %request_id,
                            error = %e,
                            "Failed to publish score response"
                        );
                    }

                    let count = processed_count.fetch_add(1, Ordering::Relaxed) + 1;

                    // Log progress every 100 requests
                    if count % 100 == 0 {
                        let throughput = metrics.get_throughput();
                        let processing_stats = metrics.get_processing_stats();
                        info!(
                            processed = count,
                            throughput = format!("{:.1} req/s", throughput),
                            avg_latency_us = processing_stats.mean_us,
                            default_model = %config.models.default_model,
                            "Processing milestone"
                        );
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Failed to deserialize score request");
                    metrics.record_failure();
                }
            }

            drop(permit);
        });
    }

    info!("Pipeline shutting down...");
    metrics.print_summary();

    Ok(())
}

/// Score one request end to end. Per-request failures become an explicit
/// failed-request response; they never mask as low-confidence predictions
/// and never affect other in-flight requests.
fn score_request(
    request: &ScoreRequest,
    request_id: &str,
    pipeline: &FeaturePipeline,
    registry: &ModelRegistry,
    audit: &AuditLog,
) -> ScoreResponse {
    let result = (|| -> Result<ScoreResponse, PipelineError> {
        let (kind, model) = registry.resolve(request.model.as_deref())?;

        let vector = pipeline.derive(&request.flight)?;

        let decision = DecisionEngine::decide(&vector, model.scorer.as_ref(), model.threshold)?;

        if let Err(e) = audit.append(&AuditRecord::new(request_id, &vector, &decision)) {
            // The prediction is still served; the gap is loud in the logs
            error!(request_id = %request_id, model = %kind, error = %e, "Audit append failed");
        }

        Ok(ScoreResponse::from_decision(request_id, &decision))
    })();

    match result {
        Ok(response) => response,
        Err(err) => {
            if matches!(err, PipelineError::EncoderPrecondition) {
                error!(request_id = %request_id, "Encoder precondition violated; this is a defect");
            }
            ScoreResponse::from_error(request_id, &err)
        }
    }
}
