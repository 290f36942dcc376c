//! Connection link synthesis
//!
//! Three links (vless, vmess, trojan) are built from the runtime config, the
//! discovered hostname and a network-identity label, then persisted as one
//! base64 subscription artifact.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use edgeup_proto::proxy_config::{TROJAN_WS_PATH, VLESS_WS_PATH, VMESS_WS_PATH};
use edgeup_proto::{ArtifactError, DiscoveredDomain, RuntimeConfig, SubscriptionArtifact};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Early-data hint appended to every WebSocket path
const EARLY_DATA: &str = "ed=2048";

#[derive(Error, Debug)]
pub enum LinkError {
    #[error("Failed to get ISP info: {0}")]
    Lookup(#[from] reqwest::Error),

    #[error("Failed to serialize vmess parameters: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to save subscription: {0}")]
    Persist(#[from] ArtifactError),
}

/// Country and network operator of this host's egress address
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NetworkIdentity {
    pub country: String,
    #[serde(rename = "asOrganization")]
    pub as_organization: String,
}

impl NetworkIdentity {
    /// `COUNTRY-Operator_Name`, spaces replaced so the label survives in URLs
    pub fn label(&self) -> String {
        format!("{}-{}", self.country, self.as_organization).replace(' ', "_")
    }
}

#[async_trait]
pub trait IdentityLookup: Send + Sync {
    async fn lookup(&self) -> Result<NetworkIdentity, LinkError>;
}

/// Identity lookup against Cloudflare's speed-test metadata endpoint
pub struct CloudflareMeta {
    http: reqwest::Client,
    url: String,
}

impl CloudflareMeta {
    pub const DEFAULT_URL: &'static str = "https://speed.cloudflare.com/meta";

    pub fn new(http: reqwest::Client) -> Self {
        Self::with_url(http, Self::DEFAULT_URL)
    }

    pub fn with_url(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }
}

#[async_trait]
impl IdentityLookup for CloudflareMeta {
    async fn lookup(&self) -> Result<NetworkIdentity, LinkError> {
        let identity = self
            .http
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json::<NetworkIdentity>()
            .await?;
        Ok(identity)
    }
}

/// vmess link parameters, serialized as JSON and base64 encoded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VmessParams {
    pub v: String,
    pub ps: String,
    pub add: String,
    pub port: u16,
    pub id: String,
    pub aid: String,
    pub scy: String,
    pub net: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub host: String,
    pub path: String,
    pub tls: String,
    pub sni: String,
    pub alpn: String,
}

fn ws_path(base: &str) -> String {
    format!("{}?{}", base, EARLY_DATA)
}

fn encode_query_value(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// The three links, in vless / vmess / trojan order
pub fn build_links(
    config: &RuntimeConfig,
    host: &str,
    label: &str,
) -> Result<Vec<String>, LinkError> {
    let remark = format!("{}-{}", config.name, label);

    let vless = format!(
        "vless://{uuid}@{addr}:{port}?encryption=none&security=tls&sni={host}&type=ws&host={host}&path={path}#{remark}",
        uuid = config.uuid,
        addr = config.cfip,
        port = config.cfport,
        host = host,
        path = encode_query_value(&ws_path(VLESS_WS_PATH)),
        remark = remark,
    );

    let params = VmessParams {
        v: "2".to_string(),
        ps: remark.clone(),
        add: config.cfip.clone(),
        port: config.cfport,
        id: config.uuid.clone(),
        aid: "0".to_string(),
        scy: "none".to_string(),
        net: "ws".to_string(),
        kind: "none".to_string(),
        host: host.to_string(),
        path: ws_path(VMESS_WS_PATH),
        tls: "tls".to_string(),
        sni: host.to_string(),
        alpn: String::new(),
    };
    let vmess = format!("vmess://{}", BASE64.encode(serde_json::to_vec(&params)?));

    let trojan = format!(
        "trojan://{uuid}@{addr}:{port}?security=tls&sni={host}&type=ws&host={host}&path={path}#{remark}",
        uuid = config.uuid,
        addr = config.cfip,
        port = config.cfport,
        host = host,
        path = encode_query_value(&ws_path(TROJAN_WS_PATH)),
        remark = remark,
    );

    Ok(vec![vless, vmess, trojan])
}

/// Result of one link generation run
#[derive(Debug, Clone)]
pub struct GeneratedLinks {
    pub artifact: SubscriptionArtifact,
    /// Base64 text as written to disk
    pub encoded: String,
    pub path: PathBuf,
}

pub struct LinkGenerator<'a> {
    config: &'a RuntimeConfig,
    identity: Arc<dyn IdentityLookup>,
}

impl<'a> LinkGenerator<'a> {
    pub fn new(config: &'a RuntimeConfig, identity: Arc<dyn IdentityLookup>) -> Self {
        Self { config, identity }
    }

    /// Look up the identity label, build the links and overwrite the artifact
    ///
    /// A failed lookup aborts the run; no links are written without a label.
    pub async fn generate(&self, domain: &DiscoveredDomain) -> Result<GeneratedLinks, LinkError> {
        let identity = self.identity.lookup().await?;
        let links = build_links(self.config, &domain.hostname, &identity.label())?;
        let artifact = SubscriptionArtifact::from_links(&links);

        let path = self.config.work_dir().subscription();
        let encoded = artifact.persist(&path)?;

        debug!("Subscription blob: {}", encoded);
        info!("sub.txt saved successfully at {:?}", path);

        Ok(GeneratedLinks {
            artifact,
            encoded,
            path,
        })
    }
}
