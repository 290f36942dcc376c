//! Tunnel ingress document for config-file based named tunnels

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Maps one hostname to the local proxy port, everything else to a 404
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TunnelIngressDocument {
    pub tunnel: String,
    #[serde(rename = "credentials-file")]
    pub credentials_file: String,
    pub protocol: String,
    pub ingress: Vec<IngressRule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngressRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    pub service: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_request: Option<OriginRequest>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OriginRequest {
    #[serde(rename = "noTLSVerify")]
    pub no_tls_verify: bool,
}

impl TunnelIngressDocument {
    pub fn new(tunnel_id: &str, credentials_file: &Path, hostname: &str, port: u16) -> Self {
        Self {
            tunnel: tunnel_id.to_string(),
            credentials_file: credentials_file.display().to_string(),
            protocol: "http2".to_string(),
            ingress: vec![
                IngressRule {
                    hostname: Some(hostname.to_string()),
                    service: format!("http://localhost:{}", port),
                    origin_request: Some(OriginRequest {
                        no_tls_verify: true,
                    }),
                },
                IngressRule {
                    hostname: None,
                    service: "http_status:404".to_string(),
                    origin_request: None,
                },
            ],
        }
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}
