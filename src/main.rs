//! edgeup - bootstrap a tunneled proxy endpoint
//!
//! Renders configs, fetches and starts the proxy engine, tunnel client and
//! optional monitoring agent, publishes connection links, then serves the
//! subscription over HTTP until interrupted.

use anyhow::{Context, Result};
use clap::{builder::BoolishValueParser, ArgAction, Parser};
use edgeup_api::ApiServer;
use edgeup_control::{spawn_cleanup, CloudflareMeta, Pipeline, CLEANUP_DELAY};
use edgeup_proto::RuntimeConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// edgeup - bootstrap a tunneled proxy endpoint
#[derive(Parser, Debug)]
#[command(name = "edgeup")]
#[command(about = "edgeup - bootstrap a tunneled proxy endpoint")]
#[command(version)]
#[command(long_about = r#"
edgeup downloads and starts a proxy engine behind a tunnel client, discovers
the tunnel's public hostname, writes a base64 subscription with vless, vmess
and trojan links, and serves it over HTTP.

EXAMPLES:
  # Quick tunnel with defaults
  edgeup

  # Named tunnel with token credential
  ARGO_DOMAIN=edge.example.com ARGO_AUTH=$TOKEN edgeup

  # Publish the subscription to an aggregator
  edgeup --upload-url https://agg.example.com --project-url https://app.example.com
"#)]
struct Cli {
    /// Aggregator base URL
    #[arg(long, env = "UPLOAD_URL")]
    upload_url: Option<String>,

    /// Public URL of this deployment
    #[arg(long, env = "PROJECT_URL")]
    project_url: Option<String>,

    /// Register the project URL with the keep-alive service
    #[arg(
        long,
        env = "AUTO_ACCESS",
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new(),
        default_value = "false"
    )]
    auto_access: bool,

    /// Keep-alive registration endpoint
    #[arg(
        long,
        env = "KEEPALIVE_URL",
        default_value = "https://gifted-steel-cheek.glitch.me/add-url"
    )]
    keepalive_url: String,

    /// Working directory for executables and generated files
    #[arg(long, env = "FILE_PATH", default_value = "./tmp")]
    file_path: PathBuf,

    /// Path of the subscription route
    #[arg(long, env = "SUB_PATH", default_value = "sub")]
    sub_path: String,

    /// HTTP listen port (falls back to PORT, then 3000)
    #[arg(long, env = "SERVER_PORT")]
    server_port: Option<u16>,

    #[arg(long, env = "PORT", hide = true)]
    port: Option<u16>,

    /// Identity shared by every inbound and link
    #[arg(
        long,
        env = "UUID",
        default_value = "ba1bea2a-cbb7-41bd-9333-6531ff8a5b31"
    )]
    uuid: String,

    /// Monitoring server host (host:port in pull mode)
    #[arg(long, env = "NEZHA_SERVER")]
    nezha_server: Option<String>,

    /// Monitoring server port; set for push mode
    #[arg(long, env = "NEZHA_PORT")]
    nezha_port: Option<String>,

    /// Monitoring agent key
    #[arg(long, env = "NEZHA_KEY")]
    nezha_key: Option<String>,

    /// Fixed tunnel hostname
    #[arg(long, env = "ARGO_DOMAIN")]
    argo_domain: Option<String>,

    /// Tunnel credential: token or JSON secret
    #[arg(long, env = "ARGO_AUTH")]
    argo_auth: Option<String>,

    /// Local port the tunnel forwards to
    #[arg(long, env = "ARGO_PORT", default_value_t = 8001)]
    argo_port: u16,

    /// Preferred edge host written into links
    #[arg(long, env = "CFIP", default_value = "linux.do")]
    cfip: String,

    /// Preferred edge port written into links
    #[arg(long, env = "CFPORT", default_value_t = 443)]
    cfport: u16,

    /// Link label prefix
    #[arg(long, env = "NAME", default_value = "edgeup")]
    name: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

impl Cli {
    fn into_runtime_config(self) -> RuntimeConfig {
        let defaults = RuntimeConfig::default();
        let text = |value: String, fallback: String| {
            if value.trim().is_empty() {
                fallback
            } else {
                value
            }
        };

        RuntimeConfig {
            upload_url: RuntimeConfig::non_blank(self.upload_url),
            project_url: RuntimeConfig::non_blank(self.project_url),
            auto_access: self.auto_access,
            keepalive_url: text(self.keepalive_url, defaults.keepalive_url),
            file_path: self.file_path,
            sub_path: text(self.sub_path, defaults.sub_path),
            port: self.server_port.or(self.port).unwrap_or(defaults.port),
            uuid: text(self.uuid, defaults.uuid),
            nezha_server: RuntimeConfig::non_blank(self.nezha_server),
            nezha_port: RuntimeConfig::non_blank(self.nezha_port),
            nezha_key: RuntimeConfig::non_blank(self.nezha_key),
            argo_domain: RuntimeConfig::non_blank(self.argo_domain),
            argo_auth: RuntimeConfig::non_blank(self.argo_auth),
            argo_port: self.argo_port,
            cfip: text(self.cfip, defaults.cfip),
            cfport: self.cfport,
            name: text(self.name, defaults.name),
        }
    }
}

/// Setup logging with the specified log level
fn setup_logging(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(log_level)
        .with_context(|| format!("Invalid log level: {}", log_level))?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(filter)
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli.log_level)?;

    let config = Arc::new(cli.into_runtime_config());
    info!("edgeup starting, working directory {:?}", config.file_path);

    let http = reqwest::Client::new();
    let identity = Arc::new(CloudflareMeta::new(http.clone()));
    let pipeline = Pipeline::new(config.clone(), identity).with_http(http);

    pipeline.prepare().await;
    let processes = pipeline.launch().await;

    match pipeline.publish_links().await {
        Ok(domain) => {
            info!("Links published for {}", domain);
            match tokio::fs::read_to_string(config.work_dir().subscription()).await {
                Ok(encoded) => println!("\n{}\n", encoded),
                Err(e) => error!("Failed to read subscription: {}", e),
            }
            spawn_cleanup(config.work_dir(), CLEANUP_DELAY);
        }
        Err(e) => error!("Failed to start services: {}", e),
    }

    pipeline.register_keepalive().await;

    let bind_addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let server = ApiServer::new(bind_addr, pipeline);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let result = tokio::select! {
        _ = &mut ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
            Ok(())
        }
        result = server.start() => result,
    };

    processes.shutdown().await;
    result
}
