//! Launches the proxy engine, the monitoring agent and the tunnel client
//!
//! Subprocesses are started and left running; nothing waits on their exit.
//! Each child is kept in a [`ProcessSet`] so the host can terminate them on
//! shutdown.

use edgeup_proto::{BinaryRole, MonitoringMode, RuntimeConfig, TunnelCredential, WorkDir};
use std::fs::File;
use std::path::PathBuf;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::{Child, Command};
use tracing::{error, info, warn};

#[derive(Error, Debug)]
pub enum SuperviseError {
    #[error("Failed to start {role}: {source}")]
    Spawn {
        role: BinaryRole,
        source: std::io::Error,
    },

    #[error("Failed to open log file {path:?}: {source}")]
    LogFile {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// A running subprocess
#[derive(Debug)]
pub struct SupervisedProcess {
    pub role: BinaryRole,
    child: Child,
}

impl SupervisedProcess {
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }
}

/// Handles to every subprocess started by the supervisor
#[derive(Debug, Default)]
pub struct ProcessSet {
    processes: Vec<SupervisedProcess>,
}

impl ProcessSet {
    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    pub fn roles(&self) -> Vec<BinaryRole> {
        self.processes.iter().map(|p| p.role).collect()
    }

    /// Kill and reap every child still running
    pub async fn shutdown(mut self) {
        for process in self.processes.iter_mut() {
            if let Err(e) = process.child.kill().await {
                warn!("Failed to stop {}: {}", process.role, e);
            } else {
                info!("Stopped {}", process.role);
            }
        }
    }
}

/// Arguments for the tunnel client, by credential variant
pub fn tunnel_args(
    credential: &TunnelCredential,
    work_dir: &WorkDir,
    argo_port: u16,
) -> Vec<String> {
    let mut args: Vec<String> = vec!["tunnel".into(), "--edge-ip-version".into(), "auto".into()];

    match credential {
        TunnelCredential::Token(token) => {
            args.extend([
                "--no-autoupdate".into(),
                "--protocol".into(),
                "http2".into(),
                "run".into(),
                "--token".into(),
                token.clone(),
            ]);
        }
        TunnelCredential::StructuredSecret(_) => {
            args.extend([
                "--config".into(),
                work_dir.tunnel_config().display().to_string(),
                "run".into(),
            ]);
        }
        TunnelCredential::QuickTunnel => {
            args.extend([
                "--no-autoupdate".into(),
                "--protocol".into(),
                "http2".into(),
                "--logfile".into(),
                work_dir.boot_log().display().to_string(),
                "--loglevel".into(),
                "info".into(),
                "--url".into(),
                format!("http://localhost:{}", argo_port),
            ]);
        }
    }

    args
}

/// Binary and arguments for the monitoring agent
pub fn agent_command(mode: &MonitoringMode, work_dir: &WorkDir) -> (BinaryRole, Vec<String>) {
    match mode {
        MonitoringMode::Push { server, port, key } => {
            let mut args = vec![
                "-s".to_string(),
                format!("{}:{}", server, port),
                "-p".to_string(),
                key.clone(),
            ];
            if mode.wants_tls() {
                args.push("--tls".to_string());
            }
            (BinaryRole::PushAgent, args)
        }
        MonitoringMode::Pull { .. } => (
            BinaryRole::PullAgent,
            vec![
                "-c".to_string(),
                work_dir.agent_config().display().to_string(),
            ],
        ),
    }
}

pub struct ProcessSupervisor<'a> {
    config: &'a RuntimeConfig,
    work_dir: WorkDir,
}

impl<'a> ProcessSupervisor<'a> {
    pub fn new(config: &'a RuntimeConfig) -> Self {
        Self {
            config,
            work_dir: config.work_dir(),
        }
    }

    /// Start every applicable subprocess; a failure to start one does not
    /// prevent the others
    pub fn supervise(&self) -> ProcessSet {
        let mut set = ProcessSet::default();

        match self.config.monitoring_mode() {
            Some(mode) => self.track(&mut set, self.start_agent(&mode)),
            None => info!("NEZHA variable is empty, skipping running"),
        }

        self.track(&mut set, self.start_proxy_engine());

        if self.work_dir.binary(BinaryRole::TunnelClient).exists() {
            self.track(&mut set, self.start_tunnel_client());
        } else {
            warn!("Tunnel client was not provisioned, skipping");
        }

        set
    }

    fn track(&self, set: &mut ProcessSet, started: Result<SupervisedProcess, SuperviseError>) {
        match started {
            Ok(process) => {
                info!("{} is running (pid {:?})", process.role, process.id());
                set.processes.push(process);
            }
            Err(e) => error!("{}", e),
        }
    }

    fn start_agent(&self, mode: &MonitoringMode) -> Result<SupervisedProcess, SuperviseError> {
        let (role, args) = agent_command(mode, &self.work_dir);
        self.spawn(role, &args, Stdio::null(), Stdio::null())
    }

    fn start_proxy_engine(&self) -> Result<SupervisedProcess, SuperviseError> {
        let args = vec![
            "-c".to_string(),
            self.work_dir.proxy_config().display().to_string(),
        ];
        self.spawn(BinaryRole::ProxyEngine, &args, Stdio::null(), Stdio::null())
    }

    /// Tunnel output goes to the boot log, which the domain resolver scans
    fn start_tunnel_client(&self) -> Result<SupervisedProcess, SuperviseError> {
        let credential = self.config.credential();
        info!("Starting tunnel client in {} mode", credential.kind());
        let args = tunnel_args(&credential, &self.work_dir, self.config.argo_port);

        let log_path = self.work_dir.boot_log();
        let log = File::create(&log_path).map_err(|source| SuperviseError::LogFile {
            path: log_path.clone(),
            source,
        })?;
        let log_err = log.try_clone().map_err(|source| SuperviseError::LogFile {
            path: log_path,
            source,
        })?;

        self.spawn(
            BinaryRole::TunnelClient,
            &args,
            Stdio::from(log),
            Stdio::from(log_err),
        )
    }

    fn spawn(
        &self,
        role: BinaryRole,
        args: &[String],
        stdout: Stdio,
        stderr: Stdio,
    ) -> Result<SupervisedProcess, SuperviseError> {
        let child = Command::new(self.work_dir.binary(role))
            .args(args)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .spawn()
            .map_err(|source| SuperviseError::Spawn { role, source })?;

        Ok(SupervisedProcess { role, child })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn work_dir() -> WorkDir {
        WorkDir::new("/srv/edge")
    }

    #[test]
    fn test_token_args() {
        let token = "a".repeat(150);
        let args = tunnel_args(&TunnelCredential::classify(&token), &work_dir(), 8001);
        assert_eq!(
            args,
            vec![
                "tunnel",
                "--edge-ip-version",
                "auto",
                "--no-autoupdate",
                "--protocol",
                "http2",
                "run",
                "--token",
                token.as_str()
            ]
        );
    }

    #[test]
    fn test_structured_secret_args() {
        let credential = TunnelCredential::classify(r#"{"TunnelSecret":"x","TunnelID":"y"}"#);
        let args = tunnel_args(&credential, &work_dir(), 8001);
        assert_eq!(
            args,
            vec![
                "tunnel",
                "--edge-ip-version",
                "auto",
                "--config",
                "/srv/edge/tunnel.yml",
                "run"
            ]
        );
    }

    #[test]
    fn test_quick_tunnel_args() {
        let args = tunnel_args(&TunnelCredential::QuickTunnel, &work_dir(), 8001);
        assert!(args.contains(&"--logfile".to_string()));
        assert!(args.contains(&"/srv/edge/boot.log".to_string()));
        assert_eq!(args.last().unwrap(), "http://localhost:8001");
        assert!(!args.contains(&"run".to_string()));
    }

    #[test]
    fn test_push_agent_tls_flag() {
        let mode = MonitoringMode::Push {
            server: "nz.example.com".to_string(),
            port: "2053".to_string(),
            key: "k".to_string(),
        };
        let (role, args) = agent_command(&mode, &work_dir());
        assert_eq!(role, BinaryRole::PushAgent);
        assert_eq!(args, vec!["-s", "nz.example.com:2053", "-p", "k", "--tls"]);

        let plain = MonitoringMode::Push {
            server: "nz.example.com".to_string(),
            port: "5555".to_string(),
            key: "k".to_string(),
        };
        let (_, args) = agent_command(&plain, &work_dir());
        assert!(!args.contains(&"--tls".to_string()));
    }

    #[test]
    fn test_pull_agent_args() {
        let mode = MonitoringMode::Pull {
            server: "nz.example.com:8008".to_string(),
            key: "k".to_string(),
        };
        let (role, args) = agent_command(&mode, &work_dir());
        assert_eq!(role, BinaryRole::PullAgent);
        assert_eq!(args, vec!["-c", "/srv/edge/config.yaml"]);
    }

    #[tokio::test]
    async fn test_missing_binaries_do_not_abort_supervision() {
        let temp = TempDir::new().unwrap();
        let config = RuntimeConfig {
            file_path: temp.path().to_path_buf(),
            nezha_server: Some("nz.example.com".to_string()),
            nezha_key: Some("k".to_string()),
            ..Default::default()
        };

        let set = ProcessSupervisor::new(&config).supervise();

        assert!(set.is_empty());
        assert!(!temp.path().join("boot.log").exists());
    }
}
