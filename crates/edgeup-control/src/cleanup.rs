//! Working-directory housekeeping
//!
//! Two sweeps: one at startup for leftovers of a previous run, and a delayed
//! one after links are published that removes everything the running
//! processes no longer need on disk.

use edgeup_proto::{BinaryRole, WorkDir};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Delay between publishing links and the transient-file sweep
pub const CLEANUP_DELAY: Duration = Duration::from_secs(15);

fn transient_files(work_dir: &WorkDir) -> Vec<PathBuf> {
    vec![
        work_dir.boot_log(),
        work_dir.proxy_config(),
        work_dir.list(),
        work_dir.binary(BinaryRole::PushAgent),
        work_dir.binary(BinaryRole::ProxyEngine),
        work_dir.binary(BinaryRole::TunnelClient),
        work_dir.binary(BinaryRole::PullAgent),
    ]
}

fn stale_artifacts(work_dir: &WorkDir) -> Vec<PathBuf> {
    vec![
        work_dir.binary(BinaryRole::ProxyEngine),
        work_dir.binary(BinaryRole::TunnelClient),
        work_dir.binary(BinaryRole::PushAgent),
        work_dir.subscription(),
        work_dir.boot_log(),
    ]
}

/// Remove each path, returning the ones that actually existed
fn remove_all(paths: Vec<PathBuf>) -> Vec<PathBuf> {
    paths
        .into_iter()
        .filter(|path| match std::fs::remove_file(path) {
            Ok(()) => {
                debug!("Removed {:?}", path);
                true
            }
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => {
                warn!("Failed to remove {:?}: {}", path, e);
                false
            }
        })
        .collect()
}

/// Delete runtime leftovers; the subscription artifact and any
/// tunnel/agent config are kept
pub fn cleanup_transient_files(work_dir: &WorkDir) -> Vec<PathBuf> {
    remove_all(transient_files(work_dir))
}

/// Delete binaries, boot log and subscription artifact from a previous run
pub fn remove_stale_artifacts(work_dir: &WorkDir) -> Vec<PathBuf> {
    remove_all(stale_artifacts(work_dir))
}

/// Run [`cleanup_transient_files`] once after `delay`
pub fn spawn_cleanup(work_dir: WorkDir, delay: Duration) -> JoinHandle<Vec<PathBuf>> {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let removed = cleanup_transient_files(&work_dir);
        debug!("Cleanup removed {} file(s)", removed.len());
        info!("App is running");
        info!("Thank you for using this script, enjoy!");
        removed
    })
}
