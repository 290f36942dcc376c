//! Discovers the public hostname assigned to the tunnel
//!
//! Named tunnels have their hostname configured and resolve immediately.
//! Quick tunnels get a random hostname that only appears in the tunnel
//! client's own log, so the log is polled until it shows up.

use async_trait::async_trait;
use edgeup_proto::{DiscoveredDomain, RuntimeConfig};
use regex_lite::Regex;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tracing::{debug, info};

use crate::poll::{poll_until, PollError, PollPolicy};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Failed to get tunnel domain after {attempts} attempts")]
    Timeout { attempts: u32 },
}

/// Text the tunnel client has logged so far
#[async_trait]
pub trait LogSource: Send + Sync {
    /// Full log contents, or `None` if nothing is readable yet
    async fn read(&self) -> Option<String>;
}

/// Reads the tunnel client's boot log from disk
pub struct FileLogSource {
    path: PathBuf,
}

impl FileLogSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl LogSource for FileLogSource {
    async fn read(&self) -> Option<String> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => Some(content),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                debug!("Failed to read {:?}: {}", self.path, e);
                None
            }
        }
    }
}

fn quick_tunnel_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"https?://([^/]*trycloudflare\.com)/?").expect("quick tunnel pattern is valid")
    })
}

/// First quick-tunnel hostname mentioned in `text`
pub fn extract_quick_tunnel_host(text: &str) -> Option<String> {
    quick_tunnel_pattern()
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

pub struct DomainResolver {
    fixed: Option<String>,
    source: Arc<dyn LogSource>,
    policy: PollPolicy,
}

impl DomainResolver {
    /// Resolver reading the boot log of the configured working directory
    pub fn new(config: &RuntimeConfig) -> Self {
        Self {
            fixed: config.fixed_domain().map(str::to_string),
            source: Arc::new(FileLogSource::new(config.work_dir().boot_log())),
            policy: PollPolicy::default(),
        }
    }

    pub fn with_source(mut self, source: Arc<dyn LogSource>) -> Self {
        self.source = source;
        self
    }

    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub async fn resolve(&self) -> Result<DiscoveredDomain, ResolveError> {
        if let Some(hostname) = &self.fixed {
            info!("ARGO_DOMAIN: {}", hostname);
            return Ok(DiscoveredDomain::configured(hostname.clone()));
        }

        let hostname = poll_until(self.policy, |_| {
            let source = Arc::clone(&self.source);
            async move {
                let text = source.read().await?;
                extract_quick_tunnel_host(&text)
            }
        })
        .await
        .map_err(|PollError::Exhausted { attempts }| ResolveError::Timeout { attempts })?;

        info!("ArgoDomain: {}", hostname);
        Ok(DiscoveredDomain::discovered(hostname))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgeup_proto::DomainSource;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::TempDir;

    /// Empty until `ready_after` reads, then returns `content`
    struct ScriptedLog {
        reads: AtomicU32,
        ready_after: u32,
        content: String,
    }

    impl ScriptedLog {
        fn new(ready_after: u32, content: &str) -> Arc<Self> {
            Arc::new(Self {
                reads: AtomicU32::new(0),
                ready_after,
                content: content.to_string(),
            })
        }

        fn reads(&self) -> u32 {
            self.reads.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LogSource for ScriptedLog {
        async fn read(&self) -> Option<String> {
            let n = self.reads.fetch_add(1, Ordering::SeqCst) + 1;
            (n > self.ready_after).then(|| self.content.clone())
        }
    }

    #[test]
    fn test_extract_host() {
        let log = "2024-01-01T00:00:00Z INF |  https://foo.trycloudflare.com/  |\n";
        assert_eq!(
            extract_quick_tunnel_host(log).as_deref(),
            Some("foo.trycloudflare.com")
        );
        assert_eq!(
            extract_quick_tunnel_host("see http://bar-baz.trycloudflare.com").as_deref(),
            Some("bar-baz.trycloudflare.com")
        );
        assert_eq!(extract_quick_tunnel_host("https://example.com/"), None);
        assert_eq!(extract_quick_tunnel_host(""), None);
    }

    #[tokio::test]
    async fn test_fast_path_never_polls() {
        let config = RuntimeConfig {
            argo_domain: Some("edge.example.com".to_string()),
            argo_auth: Some("a".repeat(150)),
            ..Default::default()
        };
        let log = ScriptedLog::new(0, "https://foo.trycloudflare.com/");

        let domain = DomainResolver::new(&config)
            .with_source(log.clone())
            .resolve()
            .await
            .unwrap();

        assert_eq!(domain, DiscoveredDomain::configured("edge.example.com"));
        assert_eq!(log.reads(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_path_finds_host_written_mid_loop() {
        let log = ScriptedLog::new(5, "INF Your quick Tunnel: https://foo.trycloudflare.com/\n");

        let domain = DomainResolver::new(&RuntimeConfig::default())
            .with_source(log.clone())
            .resolve()
            .await
            .unwrap();

        assert_eq!(domain.hostname, "foo.trycloudflare.com");
        assert_eq!(domain.source, DomainSource::Discovered);
        assert_eq!(log.reads(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_path_times_out_after_thirty_attempts() {
        let log = ScriptedLog::new(u32::MAX, "");

        let result = DomainResolver::new(&RuntimeConfig::default())
            .with_source(log.clone())
            .resolve()
            .await;

        assert_eq!(result, Err(ResolveError::Timeout { attempts: 30 }));
        assert_eq!(log.reads(), 30);
    }

    #[tokio::test]
    async fn test_hostname_without_credential_still_polls() {
        let config = RuntimeConfig {
            argo_domain: Some("edge.example.com".to_string()),
            ..Default::default()
        };
        let log = ScriptedLog::new(0, "https://quick.trycloudflare.com");

        let domain = DomainResolver::new(&config)
            .with_source(log.clone())
            .resolve()
            .await
            .unwrap();

        assert_eq!(domain.hostname, "quick.trycloudflare.com");
        assert_eq!(log.reads(), 1);
    }

    #[tokio::test]
    async fn test_file_source_tolerates_missing_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("boot.log");
        let source = FileLogSource::new(&path);

        assert_eq!(source.read().await, None);

        std::fs::write(&path, "https://zz.trycloudflare.com\n").unwrap();
        assert_eq!(
            source.read().await.as_deref(),
            Some("https://zz.trycloudflare.com\n")
        );
    }

    #[tokio::test]
    async fn test_resolves_from_boot_log_on_disk() {
        let temp = TempDir::new().unwrap();
        let config = RuntimeConfig {
            file_path: temp.path().to_path_buf(),
            ..Default::default()
        };
        std::fs::write(
            temp.path().join("boot.log"),
            "INF Registered tunnel connection\nINF https://disk.trycloudflare.com\n",
        )
        .unwrap();

        let domain = DomainResolver::new(&config).resolve().await.unwrap();
        assert_eq!(domain.hostname, "disk.trycloudflare.com");
    }
}
