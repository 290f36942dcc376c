//! Renders the proxy, tunnel and monitoring documents into the working directory
//!
//! Rendering is best-effort: a failure is logged and the document skipped. A
//! missing document surfaces later when the executable that needs it fails to
//! start.

use edgeup_proto::{
    AgentConfigDocument, CredentialError, MonitoringMode, ProxyConfigDocument, RuntimeConfig,
    TunnelCredential, TunnelIngressDocument, WorkDir,
};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info};

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Failed to serialize JSON document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to serialize YAML document: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid tunnel secret: {0}")]
    Credential(#[from] CredentialError),

    #[error("Failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Paths of the documents that were written
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RenderReport {
    pub proxy_config: Option<PathBuf>,
    pub tunnel_config: Option<PathBuf>,
    pub agent_config: Option<PathBuf>,
}

pub struct ConfigGenerator<'a> {
    config: &'a RuntimeConfig,
    work_dir: WorkDir,
}

impl<'a> ConfigGenerator<'a> {
    pub fn new(config: &'a RuntimeConfig) -> Self {
        Self {
            config,
            work_dir: config.work_dir(),
        }
    }

    /// Render every applicable document, logging and skipping failures
    pub fn render(&self) -> RenderReport {
        let proxy_config = self
            .write_proxy_config()
            .map_err(|e| error!("Failed to render proxy config: {}", e))
            .ok();

        let tunnel_config = self
            .write_tunnel_config()
            .map_err(|e| error!("Failed to render tunnel config: {}", e))
            .ok()
            .flatten();

        let agent_config = self
            .write_agent_config()
            .map_err(|e| error!("Failed to render monitoring agent config: {}", e))
            .ok()
            .flatten();

        RenderReport {
            proxy_config,
            tunnel_config,
            agent_config,
        }
    }

    pub fn write_proxy_config(&self) -> Result<PathBuf, RenderError> {
        let document = ProxyConfigDocument::build(&self.config.uuid, self.config.argo_port);
        let path = self.work_dir.proxy_config();
        write_document(&path, &document.to_json()?)?;
        Ok(path)
    }

    /// Credentials file and ingress document, for structured secrets only
    pub fn write_tunnel_config(&self) -> Result<Option<PathBuf>, RenderError> {
        let Some(hostname) = self.config.fixed_domain() else {
            info!("ARGO_DOMAIN or ARGO_AUTH is empty, using quick tunnels");
            return Ok(None);
        };

        let secret = match self.config.credential() {
            TunnelCredential::StructuredSecret(secret) => secret,
            other => {
                info!(
                    "Tunnel credential is a {}, no ingress document needed",
                    other.kind()
                );
                return Ok(None);
            }
        };

        let credentials_path = self.work_dir.tunnel_credentials();
        write_document(&credentials_path, secret.raw())?;

        let document = TunnelIngressDocument::new(
            &secret.tunnel_id()?,
            &credentials_path,
            hostname,
            self.config.argo_port,
        );
        let path = self.work_dir.tunnel_config();
        write_document(&path, &document.to_yaml()?)?;
        Ok(Some(path))
    }

    /// Monitoring agent document, for pull mode only
    pub fn write_agent_config(&self) -> Result<Option<PathBuf>, RenderError> {
        let Some(MonitoringMode::Pull { server, key }) = self.config.monitoring_mode() else {
            return Ok(None);
        };

        let document = AgentConfigDocument::new(&key, &server, &self.config.uuid);
        let path = self.work_dir.agent_config();
        write_document(&path, &document.to_yaml()?)?;
        Ok(Some(path))
    }
}

fn write_document(path: &Path, content: &str) -> Result<(), RenderError> {
    fs::write(path, content).map_err(|source| RenderError::Write {
        path: path.to_path_buf(),
        source,
    })
}
