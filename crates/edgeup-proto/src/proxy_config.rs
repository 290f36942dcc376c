//! Proxy engine configuration document
//!
//! One public inbound on the tunnel-facing port terminates the tunnel traffic
//! and fans out by WebSocket path to four loopback-only inbounds. Every inbound
//! authenticates with the same identity token.

use serde::{Deserialize, Serialize};

/// Interface the fan-out inbounds bind to
pub const LOOPBACK_ADDR: &str = "127.0.0.1";

pub const VLESS_WS_PATH: &str = "/vless-argo";
pub const VMESS_WS_PATH: &str = "/vmess-argo";
pub const TROJAN_WS_PATH: &str = "/trojan-argo";

const PLAIN_PORT: u16 = 3001;
const VLESS_WS_PORT: u16 = 3002;
const VMESS_WS_PORT: u16 = 3003;
const TROJAN_WS_PORT: u16 = 3004;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyConfigDocument {
    pub log: LogSection,
    pub inbounds: Vec<Inbound>,
    pub dns: DnsSection,
    pub outbounds: Vec<Outbound>,
    pub routing: RoutingSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogSection {
    pub access: String,
    pub error: String,
    pub loglevel: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inbound {
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listen: Option<String>,
    pub protocol: String,
    pub settings: InboundSettings,
    pub stream_settings: StreamSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sniffing: Option<Sniffing>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundSettings {
    pub clients: Vec<InboundClient>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decryption: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallbacks: Vec<Fallback>,
}

/// A client entry; vless/vmess key on `id`, trojan on `password`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundClient {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alter_id: Option<u16>,
}

impl InboundClient {
    /// The identity token this client authenticates with
    pub fn token(&self) -> Option<&str> {
        self.id.as_deref().or(self.password.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fallback {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub dest: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamSettings {
    pub network: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ws_settings: Option<WsSettings>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WsSettings {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sniffing {
    pub enabled: bool,
    pub dest_override: Vec<String>,
    pub metadata_only: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DnsSection {
    pub servers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outbound {
    pub protocol: String,
    pub tag: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingSection {
    pub domain_strategy: String,
    pub rules: Vec<serde_json::Value>,
}

impl ProxyConfigDocument {
    /// Build the document for an identity token and the tunnel-facing port
    pub fn build(uuid: &str, argo_port: u16) -> Self {
        let entry = Inbound {
            port: argo_port,
            listen: None,
            protocol: "vless".to_string(),
            settings: InboundSettings {
                clients: vec![InboundClient {
                    id: Some(uuid.to_string()),
                    flow: Some("xtls-rprx-vision".to_string()),
                    ..Default::default()
                }],
                decryption: Some("none".to_string()),
                fallbacks: vec![
                    Fallback {
                        path: None,
                        dest: PLAIN_PORT,
                    },
                    Fallback {
                        path: Some(VLESS_WS_PATH.to_string()),
                        dest: VLESS_WS_PORT,
                    },
                    Fallback {
                        path: Some(VMESS_WS_PATH.to_string()),
                        dest: VMESS_WS_PORT,
                    },
                    Fallback {
                        path: Some(TROJAN_WS_PATH.to_string()),
                        dest: TROJAN_WS_PORT,
                    },
                ],
            },
            stream_settings: StreamSettings {
                network: "tcp".to_string(),
                security: None,
                ws_settings: None,
            },
            sniffing: None,
        };

        let plain = Inbound {
            port: PLAIN_PORT,
            listen: Some(LOOPBACK_ADDR.to_string()),
            protocol: "vless".to_string(),
            settings: InboundSettings {
                clients: vec![InboundClient {
                    id: Some(uuid.to_string()),
                    ..Default::default()
                }],
                decryption: Some("none".to_string()),
                fallbacks: Vec::new(),
            },
            stream_settings: StreamSettings {
                network: "tcp".to_string(),
                security: Some("none".to_string()),
                ws_settings: None,
            },
            sniffing: None,
        };

        let vless_ws = ws_inbound(
            VLESS_WS_PORT,
            "vless",
            InboundClient {
                id: Some(uuid.to_string()),
                level: Some(0),
                ..Default::default()
            },
            Some("none"),
            Some("none"),
            VLESS_WS_PATH,
        );

        let vmess_ws = ws_inbound(
            VMESS_WS_PORT,
            "vmess",
            InboundClient {
                id: Some(uuid.to_string()),
                alter_id: Some(0),
                ..Default::default()
            },
            None,
            None,
            VMESS_WS_PATH,
        );

        let trojan_ws = ws_inbound(
            TROJAN_WS_PORT,
            "trojan",
            InboundClient {
                password: Some(uuid.to_string()),
                ..Default::default()
            },
            None,
            Some("none"),
            TROJAN_WS_PATH,
        );

        Self {
            log: LogSection {
                access: "/dev/null".to_string(),
                error: "/dev/null".to_string(),
                loglevel: "none".to_string(),
            },
            inbounds: vec![entry, plain, vless_ws, vmess_ws, trojan_ws],
            dns: DnsSection {
                servers: vec!["https+local://8.8.8.8/dns-query".to_string()],
            },
            outbounds: vec![
                Outbound {
                    protocol: "freedom".to_string(),
                    tag: "direct".to_string(),
                },
                Outbound {
                    protocol: "blackhole".to_string(),
                    tag: "block".to_string(),
                },
            ],
            routing: RoutingSection {
                domain_strategy: "AsIs".to_string(),
                rules: Vec::new(),
            },
        }
    }

    /// Serialize as the pretty-printed JSON the engine reads
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

fn ws_inbound(
    port: u16,
    protocol: &str,
    client: InboundClient,
    decryption: Option<&str>,
    security: Option<&str>,
    path: &str,
) -> Inbound {
    Inbound {
        port,
        listen: Some(LOOPBACK_ADDR.to_string()),
        protocol: protocol.to_string(),
        settings: InboundSettings {
            clients: vec![client],
            decryption: decryption.map(str::to_string),
            fallbacks: Vec::new(),
        },
        stream_settings: StreamSettings {
            network: "ws".to_string(),
            security: security.map(str::to_string),
            ws_settings: Some(WsSettings {
                path: path.to_string(),
            }),
        },
        sniffing: Some(Sniffing {
            enabled: true,
            dest_override: vec!["http".to_string(), "tls".to_string(), "quic".to_string()],
            metadata_only: false,
        }),
    }
}
