//! Test Flight Producer
//!
//! Generates and publishes synthetic score requests to NATS for pipeline
//! testing.

use chrono::{Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Score request structure matching the pipeline's expected format
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ScoreRequest {
    request_id: String,
    model: Option<String>,
    flight: Flight,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Flight {
    flight_id: String,
    operating_airline: String,
    destination: String,
    flight_type: String,
    scheduled_departure: String,
    wind_speed: f64,
    pressure: f64,
    temperature: f64,
}

const AIRLINES: [&str; 3] = ["Sky Airline", "LATAM Airlines Group", "JetSmart SPA"];
const DESTINATIONS: [&str; 6] = [
    "Antofagasta",
    "Arica",
    "Iquique",
    "Puerto Montt",
    "Calama",
    "Concepcion",
];
const MODELS: [&str; 4] = [
    "xgboost",
    "random_forest",
    "logistic_regression",
    "voting_classifier",
];

/// Upstream convention for an unavailable weather reading
const WEATHER_SENTINEL: f64 = -999.0;

/// Request generator for testing
struct RequestGenerator {
    rng: rand::rngs::ThreadRng,
    request_counter: u64,
}

impl RequestGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
            request_counter: 0,
        }
    }

    /// Generate a request with complete readings
    fn generate_complete(&mut self) -> ScoreRequest {
        self.request_counter += 1;
        let departure = Utc::now() + Duration::hours(self.rng.gen_range(1..72));

        ScoreRequest {
            request_id: format!("req_{:012}", self.request_counter),
            model: if self.rng.gen_bool(0.2) {
                Some(self.random_choice(&MODELS).to_string())
            } else {
                None
            },
            flight: Flight {
                flight_id: format!("fl_{:08}", self.rng.gen_range(1..100_000)),
                operating_airline: self.random_choice(&AIRLINES).to_string(),
                destination: self.random_choice(&DESTINATIONS).to_string(),
                flight_type: if self.rng.gen_bool(0.3) { "I" } else { "N" }.to_string(),
                scheduled_departure: departure.to_rfc3339(),
                wind_speed: self.rng.gen_range(0.0..25.0),
                pressure: self.rng.gen_range(990.0..1030.0),
                temperature: self.rng.gen_range(-2.0..32.0),
            },
        }
    }

    /// Generate a request with degraded inputs: sentinel weather readings
    /// and occasionally an unknown operator
    fn generate_degraded(&mut self) -> ScoreRequest {
        let mut request = self.generate_complete();

        request.flight.wind_speed = WEATHER_SENTINEL;
        if self.rng.gen_bool(0.5) {
            request.flight.pressure = WEATHER_SENTINEL;
        }
        if self.rng.gen_bool(0.3) {
            request.flight.operating_airline = format!(
                "Charter {}",
                self.rng.gen_range(1..100)
            );
        }

        request
    }

    fn random_choice<'a>(&mut self, choices: &[&'a str]) -> &'a str {
        choices[self.rng.gen_range(0..choices.len())]
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("flight_producer=info".parse()?),
        )
        .init();

    info!("Starting Test Flight Producer");

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let nats_url = args
        .get(1)
        .map(|s| s.as_str())
        .unwrap_or("nats://localhost:4222");
    let subject = args.get(2).map(|s| s.as_str()).unwrap_or("flights.score");
    let count: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(100);
    let degraded_rate: f64 = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(0.1);
    let delay_ms: u64 = args.get(5).and_then(|s| s.parse().ok()).unwrap_or(100);

    info!(
        nats_url = %nats_url,
        subject = %subject,
        count = count,
        degraded_rate = degraded_rate,
        delay_ms = delay_ms,
        "Configuration loaded"
    );

    // Connect to NATS
    let client = match async_nats::connect(nats_url).await {
        Ok(c) => {
            info!("Connected to NATS");
            c
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to NATS. Running in dry-run mode.");
            return run_dry_mode(count, degraded_rate, delay_ms).await;
        }
    };

    // Generate and publish requests
    let mut generator = RequestGenerator::new();
    let mut rng = rand::thread_rng();

    info!("Starting to publish {} requests...", count);

    let mut complete_count = 0;
    let mut degraded_count = 0;

    for i in 0..count {
        let request = if rng.gen_bool(degraded_rate) {
            degraded_count += 1;
            generator.generate_degraded()
        } else {
            complete_count += 1;
            generator.generate_complete()
        };

        let payload = serde_json::to_vec(&request)?;

        client.publish(subject.to_string(), payload.into()).await?;

        if (i + 1) % 10 == 0 {
            info!(
                "Published {}/{} requests ({} complete, {} degraded)",
                i + 1,
                count,
                complete_count,
                degraded_count
            );
        }

        tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
    }

    info!(
        "Completed! Published {} requests ({} complete, {} degraded)",
        count, complete_count, degraded_count
    );

    Ok(())
}

async fn run_dry_mode(count: u64, degraded_rate: f64, delay_ms: u64) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no NATS connection)");

    let mut generator = RequestGenerator::new();
    let mut rng = rand::thread_rng();

    for i in 0..count {
        let request = if rng.gen_bool(degraded_rate) {
            generator.generate_degraded()
        } else {
            generator.generate_complete()
        };

        let json = serde_json::to_string_pretty(&request)?;

        if (i + 1) % 10 == 0 || i == 0 {
            info!("Sample request {}:\n{}", i + 1, json);
        }

        tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
    }

    Ok(())
}
