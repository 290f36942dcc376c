//! Runtime configuration snapshot and working-directory layout

use std::path::{Path, PathBuf};

use crate::credential::TunnelCredential;

/// Ports on which the monitoring server is expected to speak TLS
pub const MONITORING_TLS_PORTS: [u16; 6] = [443, 8443, 2096, 2087, 2083, 2053];

/// Immutable snapshot of every externally supplied parameter
///
/// Built once at process start and shared by reference with every stage.
/// Optional string parameters are `None` when unset or blank.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Aggregator base URL
    pub upload_url: Option<String>,
    /// Public URL of this deployment (used for subscription publishing and keep-alive)
    pub project_url: Option<String>,
    /// Register the project URL with the keep-alive service
    pub auto_access: bool,
    /// Keep-alive registration endpoint
    pub keepalive_url: String,
    /// Working directory for executables, rendered configs and artifacts
    pub file_path: PathBuf,
    /// Sub-path of the subscription route
    pub sub_path: String,
    /// HTTP listen port
    pub port: u16,
    /// Identity token shared by every inbound and every generated link
    pub uuid: String,
    pub nezha_server: Option<String>,
    pub nezha_port: Option<String>,
    pub nezha_key: Option<String>,
    /// Tunnel target hostname
    pub argo_domain: Option<String>,
    /// Tunnel credential (token, JSON secret, or nothing)
    pub argo_auth: Option<String>,
    /// Tunnel-facing proxy port
    pub argo_port: u16,
    /// Preferred edge host or IP written into links
    pub cfip: String,
    pub cfport: u16,
    /// Display name prefix for link labels
    pub name: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            upload_url: None,
            project_url: None,
            auto_access: false,
            keepalive_url: "https://gifted-steel-cheek.glitch.me/add-url".to_string(),
            file_path: PathBuf::from("./tmp"),
            sub_path: "sub".to_string(),
            port: 3000,
            uuid: "ba1bea2a-cbb7-41bd-9333-6531ff8a5b31".to_string(),
            nezha_server: None,
            nezha_port: None,
            nezha_key: None,
            argo_domain: None,
            argo_auth: None,
            argo_port: 8001,
            cfip: "linux.do".to_string(),
            cfport: 443,
            name: "edgeup".to_string(),
        }
    }
}

/// How the monitoring agent reports
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitoringMode {
    /// Agent dials `server:port` with the key as password
    Push {
        server: String,
        port: String,
        key: String,
    },
    /// Agent reads a rendered YAML document
    Pull { server: String, key: String },
}

impl MonitoringMode {
    /// Whether a push-mode agent should enable TLS for this port
    pub fn wants_tls(&self) -> bool {
        match self {
            MonitoringMode::Push { port, .. } => port
                .parse::<u16>()
                .map(|p| MONITORING_TLS_PORTS.contains(&p))
                .unwrap_or(false),
            MonitoringMode::Pull { .. } => false,
        }
    }
}

impl RuntimeConfig {
    /// Normalise an optional parameter: blank strings count as unset
    pub fn non_blank(value: Option<String>) -> Option<String> {
        value.filter(|v| !v.trim().is_empty())
    }

    pub fn work_dir(&self) -> WorkDir {
        WorkDir::new(&self.file_path)
    }

    /// Monitoring mode, if both server and key are configured
    pub fn monitoring_mode(&self) -> Option<MonitoringMode> {
        let server = self.nezha_server.clone()?;
        let key = self.nezha_key.clone()?;
        match &self.nezha_port {
            Some(port) => Some(MonitoringMode::Push {
                server,
                port: port.clone(),
                key,
            }),
            None => Some(MonitoringMode::Pull { server, key }),
        }
    }

    /// Classify the configured tunnel credential
    pub fn credential(&self) -> TunnelCredential {
        TunnelCredential::classify(self.argo_auth.as_deref().unwrap_or(""))
    }

    /// Configured hostname, only when a credential is configured too
    pub fn fixed_domain(&self) -> Option<&str> {
        match (&self.argo_domain, &self.argo_auth) {
            (Some(domain), Some(_)) => Some(domain.as_str()),
            _ => None,
        }
    }

    /// Public subscription URL advertised to the aggregator
    pub fn subscription_url(&self) -> Option<String> {
        self.project_url
            .as_ref()
            .map(|project| format!("{}/{}", project, self.sub_path))
    }
}

/// Executables fetched into the working directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryRole {
    /// Proxy engine serving the inbounds
    ProxyEngine,
    /// Outbound tunnel client
    TunnelClient,
    /// Monitoring agent dialing out to its server
    PushAgent,
    /// Minimal monitoring agent driven by a YAML document
    PullAgent,
}

impl BinaryRole {
    pub fn file_name(self) -> &'static str {
        match self {
            BinaryRole::ProxyEngine => "web",
            BinaryRole::TunnelClient => "bot",
            BinaryRole::PushAgent => "npm",
            BinaryRole::PullAgent => "php",
        }
    }
}

impl std::fmt::Display for BinaryRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.file_name())
    }
}

/// Fixed file layout inside the working directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkDir {
    root: PathBuf,
}

impl WorkDir {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn join(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Proxy engine configuration
    pub fn proxy_config(&self) -> PathBuf {
        self.join("config.json")
    }

    /// Raw structured tunnel secret
    pub fn tunnel_credentials(&self) -> PathBuf {
        self.join("tunnel.json")
    }

    /// Tunnel ingress document
    pub fn tunnel_config(&self) -> PathBuf {
        self.join("tunnel.yml")
    }

    /// Pull-mode monitoring agent document
    pub fn agent_config(&self) -> PathBuf {
        self.join("config.yaml")
    }

    /// Tunnel client boot log
    pub fn boot_log(&self) -> PathBuf {
        self.join("boot.log")
    }

    /// Base64 subscription artifact
    pub fn subscription(&self) -> PathBuf {
        self.join("sub.txt")
    }

    pub fn list(&self) -> PathBuf {
        self.join("list.txt")
    }

    pub fn binary(&self, role: BinaryRole) -> PathBuf {
        self.join(role.file_name())
    }
}
