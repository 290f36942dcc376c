//! Stage sequencing for one endpoint
//!
//! `prepare` and `launch` never fail: each step logs its own errors and the
//! run continues with whatever succeeded. Only hostname discovery and link
//! synthesis are fatal to `publish_links`.

use edgeup_proto::{DiscoveredDomain, RuntimeConfig};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::cleanup::remove_stale_artifacts;
use crate::generator::{ConfigGenerator, RenderReport};
use crate::keepalive::register_keepalive;
use crate::links::{GeneratedLinks, IdentityLookup, LinkError, LinkGenerator};
use crate::poll::PollPolicy;
use crate::provision::{download_plan, ArchClass, BinaryProvisioner};
use crate::publish::{AggregatorClient, PublishOutcome};
use crate::resolver::{DomainResolver, LogSource, ResolveError};
use crate::supervisor::{ProcessSet, ProcessSupervisor};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Failed to extract domain: {0}")]
    Resolve(#[from] ResolveError),

    #[error("Failed to generate links: {0}")]
    Links(#[from] LinkError),

    #[error("Failed to read {path:?}: {source}")]
    ReadArtifact {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub struct Pipeline {
    config: Arc<RuntimeConfig>,
    identity: Arc<dyn IdentityLookup>,
    http: reqwest::Client,
    arch: ArchClass,
    poll_policy: PollPolicy,
    log_source: Option<Arc<dyn LogSource>>,
    /// Held across generate-and-read so each caller gets the artifact it wrote
    artifact_lock: Mutex<()>,
}

impl Pipeline {
    pub fn new(config: Arc<RuntimeConfig>, identity: Arc<dyn IdentityLookup>) -> Self {
        Self {
            config,
            identity,
            http: reqwest::Client::new(),
            arch: ArchClass::detect(),
            poll_policy: PollPolicy::default(),
            log_source: None,
            artifact_lock: Mutex::new(()),
        }
    }

    pub fn with_http(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn with_arch(mut self, arch: ArchClass) -> Self {
        self.arch = arch;
        self
    }

    pub fn with_poll_policy(mut self, policy: PollPolicy) -> Self {
        self.poll_policy = policy;
        self
    }

    /// Read the tunnel log from somewhere other than the working directory
    pub fn with_log_source(mut self, source: Arc<dyn LogSource>) -> Self {
        self.log_source = Some(source);
        self
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Create the working directory, retract the previous run's nodes,
    /// clear its leftovers and render the configuration files
    pub async fn prepare(&self) -> RenderReport {
        let work_dir = self.config.work_dir();
        match tokio::fs::create_dir_all(work_dir.root()).await {
            Ok(()) => info!("{:?} is ready", work_dir.root()),
            Err(e) => error!("Failed to create directory {:?}: {}", work_dir.root(), e),
        }

        // Must run before the sweep below removes sub.txt
        if let Some(client) = self.aggregator() {
            if let Err(e) = client.delete_stale_nodes(&work_dir.subscription()).await {
                warn!("Failed to delete stale nodes: {}", e);
            }
        }

        remove_stale_artifacts(&work_dir);

        ConfigGenerator::new(&self.config).render()
    }

    /// Download the executables and start them
    pub async fn launch(&self) -> ProcessSet {
        let plan = download_plan(self.arch, self.config.monitoring_mode().as_ref());
        let provisioner = BinaryProvisioner::new(self.http.clone(), self.config.work_dir());
        let ready = provisioner.provision(&plan).await;
        info!("Provisioned {}/{} executables", ready.len(), plan.len());

        ProcessSupervisor::new(&self.config).supervise()
    }

    /// Discover the tunnel hostname, write the subscription and publish it
    pub async fn publish_links(&self) -> Result<DiscoveredDomain, PipelineError> {
        let _guard = self.artifact_lock.lock().await;
        let domain = self.resolver().resolve().await?;
        let generated = self.generate(&domain).await?;
        self.publish(&generated).await;
        Ok(domain)
    }

    /// Regenerate the subscription and return its contents as stored on disk
    ///
    /// Subprocesses are left as they are; a dead tunnel client is not
    /// restarted here.
    pub async fn refresh_subscription(&self) -> Result<String, PipelineError> {
        let _guard = self.artifact_lock.lock().await;
        let domain = self.resolver().resolve().await?;
        let generated = self.generate(&domain).await?;
        self.publish(&generated).await;

        tokio::fs::read_to_string(&generated.path)
            .await
            .map_err(|source| PipelineError::ReadArtifact {
                path: generated.path.clone(),
                source,
            })
    }

    pub async fn register_keepalive(&self) -> bool {
        register_keepalive(&self.config, &self.http).await
    }

    fn resolver(&self) -> DomainResolver {
        let resolver = DomainResolver::new(&self.config).with_policy(self.poll_policy);
        match &self.log_source {
            Some(source) => resolver.with_source(Arc::clone(source)),
            None => resolver,
        }
    }

    async fn generate(&self, domain: &DiscoveredDomain) -> Result<GeneratedLinks, LinkError> {
        LinkGenerator::new(&self.config, Arc::clone(&self.identity))
            .generate(domain)
            .await
    }

    async fn publish(&self, generated: &GeneratedLinks) -> PublishOutcome {
        let Some(client) = self.aggregator() else {
            return PublishOutcome::Skipped;
        };

        match client.publish(&self.config, &generated.path).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Failed to publish links: {}", e);
                PublishOutcome::Skipped
            }
        }
    }

    fn aggregator(&self) -> Option<AggregatorClient> {
        AggregatorClient::from_config(self.http.clone(), &self.config)
    }
}
