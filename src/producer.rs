//! NATS message producer for scoring decisions

use crate::types::decision::ScoreResponse;
use anyhow::Result;
use async_nats::Client;
use tracing::debug;

/// Producer for publishing decisions (and failed-request responses)
#[derive(Clone)]
pub struct DecisionProducer {
    client: Client,
    subject: String,
}

impl DecisionProducer {
    /// Create a new decision producer
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
        }
    }

    /// Publish a score response
    pub async fn publish(&self, response: &ScoreResponse) -> Result<()> {
        let payload = serde_json::to_vec(response)?;

        self.client
            .publish(self.subject.clone(), payload.into())
            .await?;

        debug!(subject = %self.subject, "Published score response");
        Ok(())
    }

    /// Get the subject name
    pub fn subject(&self) -> &str {
        &self.subject
    }
}

#[cfg(test)]
mod tests {
    // Integration tests would require a running NATS server
}
