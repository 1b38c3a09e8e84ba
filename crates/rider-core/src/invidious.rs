//! Invidious metadata client.
//!
//! Each lookup goes to a randomly chosen instance from the configured pool;
//! when that instance fails, up to `max_attempts` distinct instances are
//! tried before the lookup is reported as failed.

use std::time::Duration;

use rand::seq::SliceRandom;
use tracing::{debug, warn};

use crate::config::FetchConfig;
use crate::error::FetchError;
use crate::fetch::MetadataFetcher;
use crate::track::TrackMetadata;

pub struct InvidiousFetcher {
    client: reqwest::Client,
    instances: Vec<String>,
    max_attempts: usize,
}

pub fn video_url(instance: &str, id: &str) -> String {
    format!("{}/api/v1/videos/{}", instance.trim_end_matches('/'), id)
}

impl InvidiousFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;
        Ok(Self {
            client,
            instances: config
                .instances
                .iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            max_attempts: config.max_attempts.max(1),
        })
    }

    /// Instances to try for one lookup, in random order.
    fn pick_instances(&self) -> Vec<String> {
        let mut pool = self.instances.clone();
        pool.shuffle(&mut rand::thread_rng());
        pool.truncate(self.max_attempts);
        pool
    }

    async fn fetch_from(&self, instance: &str, id: &str) -> Result<TrackMetadata, FetchError> {
        let url = video_url(instance, id);
        debug!("invidious: GET {}", url);
        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| FetchError::Malformed(e.to_string()))
    }
}

impl MetadataFetcher for InvidiousFetcher {
    async fn fetch_track(&self, id: &str) -> Result<TrackMetadata, FetchError> {
        let mut last_err = FetchError::NoInstances;
        for instance in self.pick_instances() {
            match self.fetch_from(&instance, id).await {
                Ok(meta) => {
                    debug!("invidious: {} answered for {}", instance, id);
                    return Ok(meta);
                }
                Err(e) => {
                    warn!("invidious: {} failed for {}: {}", instance, id, e);
                    last_err = e;
                }
            }
        }
        Err(last_err)
    }
}
