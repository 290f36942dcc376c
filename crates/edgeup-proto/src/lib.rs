//! Shared data model for the edgeup bootstrapper
//!
//! Holds the runtime configuration snapshot, the documents rendered for the
//! external executables, the tunnel credential classification and the
//! subscription artifact codec. Nothing in here performs network or process I/O.

pub mod agent_config;
pub mod config;
pub mod credential;
pub mod ingress;
pub mod proxy_config;
pub mod subscription;

pub use agent_config::AgentConfigDocument;
pub use config::{BinaryRole, MonitoringMode, RuntimeConfig, WorkDir, MONITORING_TLS_PORTS};
pub use credential::{CredentialError, StructuredSecret, TunnelCredential};
pub use ingress::{IngressRule, OriginRequest, TunnelIngressDocument};
pub use proxy_config::{ProxyConfigDocument, LOOPBACK_ADDR};
pub use subscription::{
    ArtifactError, DiscoveredDomain, DomainSource, NodeEntry, NodeScheme, SubscriptionArtifact,
};
