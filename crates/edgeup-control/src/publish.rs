//! Aggregator client
//!
//! Nodes registered by a previous run are removed at startup; after link
//! generation either the subscription URL or the raw node list is published.
//! Every operation is best-effort: callers log the error and carry on.

use edgeup_proto::{ArtifactError, NodeEntry, RuntimeConfig, SubscriptionArtifact};
use serde::Serialize;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Aggregator request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to read subscription artifact: {0}")]
    Artifact(#[from] ArtifactError),
}

/// What a publish or delete call ended up doing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// No aggregator configured, or nothing to send
    Skipped,
    /// Nodes removed from the aggregator
    NodesDeleted(usize),
    /// Raw node list uploaded
    NodesUploaded(usize),
    /// Subscription URL uploaded
    SubscriptionUploaded(String),
}

#[derive(Serialize)]
struct NodesBody<'a> {
    nodes: &'a [NodeEntry],
}

#[derive(Serialize)]
struct SubscriptionBody<'a> {
    subscription: [&'a str; 1],
}

/// Thin client over the aggregator's add/delete endpoints
pub struct AggregatorClient {
    http: reqwest::Client,
    base_url: String,
}

impl AggregatorClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Client for the configured aggregator, if any
    pub fn from_config(http: reqwest::Client, config: &RuntimeConfig) -> Option<Self> {
        config
            .upload_url
            .as_ref()
            .map(|url| Self::new(http, url.clone()))
    }

    pub async fn delete_nodes(&self, nodes: &[NodeEntry]) -> Result<(), PublishError> {
        self.post("/api/delete-nodes", &NodesBody { nodes }).await
    }

    pub async fn add_nodes(&self, nodes: &[NodeEntry]) -> Result<(), PublishError> {
        self.post("/api/add-nodes", &NodesBody { nodes }).await
    }

    pub async fn add_subscription(&self, url: &str) -> Result<(), PublishError> {
        self.post("/api/add-subscriptions", &SubscriptionBody { subscription: [url] })
            .await
    }

    async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<(), PublishError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);
        self.http
            .post(&url)
            .json(body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Remove the nodes recorded in a previous run's artifact
    pub async fn delete_stale_nodes(
        &self,
        artifact_path: &Path,
    ) -> Result<PublishOutcome, PublishError> {
        if !artifact_path.exists() {
            return Ok(PublishOutcome::Skipped);
        }

        let nodes = SubscriptionArtifact::load(artifact_path)?.node_entries();
        if nodes.is_empty() {
            return Ok(PublishOutcome::Skipped);
        }

        self.delete_nodes(&nodes).await?;
        info!("Deleted {} stale node(s) from aggregator", nodes.len());
        Ok(PublishOutcome::NodesDeleted(nodes.len()))
    }

    /// Publish this run's links
    ///
    /// With a project URL the subscription URL is published; otherwise the
    /// nodes in the freshly written artifact are.
    pub async fn publish(
        &self,
        config: &RuntimeConfig,
        artifact_path: &Path,
    ) -> Result<PublishOutcome, PublishError> {
        if let Some(subscription_url) = config.subscription_url() {
            self.add_subscription(&subscription_url).await?;
            info!("Subscription uploaded successfully");
            return Ok(PublishOutcome::SubscriptionUploaded(subscription_url));
        }

        if !artifact_path.exists() {
            return Ok(PublishOutcome::Skipped);
        }

        let nodes = SubscriptionArtifact::load(artifact_path)?.node_entries();
        if nodes.is_empty() {
            return Ok(PublishOutcome::Skipped);
        }

        self.add_nodes(&nodes).await?;
        info!("Nodes uploaded successfully");
        Ok(PublishOutcome::NodesUploaded(nodes.len()))
    }
}
