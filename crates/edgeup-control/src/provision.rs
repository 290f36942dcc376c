//! Fetches the platform-specific executables into the working directory

use edgeup_proto::{BinaryRole, MonitoringMode, WorkDir};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info};

#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("Download failed: {0}")]
    Download(#[from] reqwest::Error),

    #[error("Failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to set permissions on {path:?}: {source}")]
    Permissions {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// CPU architecture class the executables are built for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchClass {
    Arm,
    Amd,
}

impl ArchClass {
    pub fn detect() -> Self {
        Self::from_arch(std::env::consts::ARCH)
    }

    pub fn from_arch(arch: &str) -> Self {
        match arch {
            "arm" | "arm64" | "aarch64" => ArchClass::Arm,
            _ => ArchClass::Amd,
        }
    }

    fn download_host(self) -> &'static str {
        match self {
            ArchClass::Arm => "https://arm64.ssss.nyc.mn",
            ArchClass::Amd => "https://amd64.ssss.nyc.mn",
        }
    }
}

/// One executable to fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadItem {
    pub role: BinaryRole,
    pub url: String,
}

impl DownloadItem {
    fn new(arch: ArchClass, role: BinaryRole) -> Self {
        let remote = match role {
            BinaryRole::ProxyEngine => "web",
            BinaryRole::TunnelClient => "2go",
            BinaryRole::PushAgent => "agent",
            BinaryRole::PullAgent => "v1",
        };
        Self {
            role,
            url: format!("{}/{}", arch.download_host(), remote),
        }
    }
}

/// Ordered set of executables needed for this host
///
/// At most one monitoring agent (push or pull variant) precedes the proxy
/// engine and the tunnel client.
pub fn download_plan(arch: ArchClass, monitoring: Option<&MonitoringMode>) -> Vec<DownloadItem> {
    let mut plan = Vec::with_capacity(3);
    match monitoring {
        Some(MonitoringMode::Push { .. }) => {
            plan.push(DownloadItem::new(arch, BinaryRole::PushAgent))
        }
        Some(MonitoringMode::Pull { .. }) => {
            plan.push(DownloadItem::new(arch, BinaryRole::PullAgent))
        }
        None => {}
    }
    plan.push(DownloadItem::new(arch, BinaryRole::ProxyEngine));
    plan.push(DownloadItem::new(arch, BinaryRole::TunnelClient));
    plan
}

pub struct BinaryProvisioner {
    http: reqwest::Client,
    work_dir: WorkDir,
}

impl BinaryProvisioner {
    pub fn new(http: reqwest::Client, work_dir: WorkDir) -> Self {
        Self { http, work_dir }
    }

    /// Fetch every item of the plan, skipping the ones that fail
    ///
    /// Returns the roles that were written to disk.
    pub async fn provision(&self, plan: &[DownloadItem]) -> Vec<BinaryRole> {
        let mut provisioned = Vec::with_capacity(plan.len());

        for item in plan {
            let path = self.work_dir.binary(item.role);
            if let Err(e) = self.download(&item.url, &path).await {
                error!("Failed to download {}: {}", item.role, e);
                continue;
            }
            info!("Successfully downloaded {}", item.role);

            // A failed chmod leaves the file in place; spawning it will fail later
            if let Err(e) = make_executable(&path) {
                error!("{}", e);
            }
            provisioned.push(item.role);
        }

        provisioned
    }

    pub async fn download(&self, url: &str, path: &Path) -> Result<(), ProvisionError> {
        let response = self.http.get(url).send().await?.error_for_status()?;
        let body = response.bytes().await?;

        tokio::fs::write(path, &body)
            .await
            .map_err(|source| ProvisionError::Write {
                path: path.to_path_buf(),
                source,
            })
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<(), ProvisionError> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).map_err(|source| {
        ProvisionError::Permissions {
            path: path.to_path_buf(),
            source,
        }
    })
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<(), ProvisionError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push() -> MonitoringMode {
        MonitoringMode::Push {
            server: "nz.example.com".to_string(),
            port: "443".to_string(),
            key: "k".to_string(),
        }
    }

    fn pull() -> MonitoringMode {
        MonitoringMode::Pull {
            server: "nz.example.com:8008".to_string(),
            key: "k".to_string(),
        }
    }

    fn roles(plan: &[DownloadItem]) -> Vec<BinaryRole> {
        plan.iter().map(|item| item.role).collect()
    }

    #[test]
    fn test_arch_detection() {
        assert_eq!(ArchClass::from_arch("aarch64"), ArchClass::Arm);
        assert_eq!(ArchClass::from_arch("arm"), ArchClass::Arm);
        assert_eq!(ArchClass::from_arch("x86_64"), ArchClass::Amd);
        assert_eq!(ArchClass::from_arch("riscv64"), ArchClass::Amd);
    }

    #[test]
    fn test_plan_is_deterministic_per_monitoring_mode() {
        for arch in [ArchClass::Arm, ArchClass::Amd] {
            assert_eq!(
                roles(&download_plan(arch, None)),
                vec![BinaryRole::ProxyEngine, BinaryRole::TunnelClient]
            );
            assert_eq!(
                roles(&download_plan(arch, Some(&push()))),
                vec![
                    BinaryRole::PushAgent,
                    BinaryRole::ProxyEngine,
                    BinaryRole::TunnelClient
                ]
            );
            assert_eq!(
                roles(&download_plan(arch, Some(&pull()))),
                vec![
                    BinaryRole::PullAgent,
                    BinaryRole::ProxyEngine,
                    BinaryRole::TunnelClient
                ]
            );
            assert_eq!(
                download_plan(arch, Some(&pull())),
                download_plan(arch, Some(&pull()))
            );
        }
    }

    #[test]
    fn test_plan_urls_follow_arch() {
        let arm = download_plan(ArchClass::Arm, Some(&push()));
        assert_eq!(arm[0].url, "https://arm64.ssss.nyc.mn/agent");
        assert_eq!(arm[2].url, "https://arm64.ssss.nyc.mn/2go");

        let amd = download_plan(ArchClass::Amd, Some(&pull()));
        assert_eq!(amd[0].url, "https://amd64.ssss.nyc.mn/v1");
        assert_eq!(amd[1].url, "https://amd64.ssss.nyc.mn/web");
    }
}
