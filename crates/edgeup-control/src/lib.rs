//! Startup orchestration for the edgeup endpoint
//!
//! Stages run strictly in sequence: render configs, provision executables,
//! supervise subprocesses, resolve the tunnel hostname, synthesize links and
//! publish them. Cleanup runs afterwards as a detached, delayed task.

pub mod cleanup;
pub mod generator;
pub mod keepalive;
pub mod links;
pub mod pipeline;
pub mod poll;
pub mod provision;
pub mod publish;
pub mod resolver;
pub mod supervisor;

pub use cleanup::{cleanup_transient_files, remove_stale_artifacts, spawn_cleanup, CLEANUP_DELAY};
pub use generator::{ConfigGenerator, RenderError, RenderReport};
pub use keepalive::register_keepalive;
pub use links::{
    CloudflareMeta, GeneratedLinks, IdentityLookup, LinkError, LinkGenerator, NetworkIdentity,
};
pub use pipeline::{Pipeline, PipelineError};
pub use poll::{poll_until, PollError, PollPolicy};
pub use provision::{download_plan, ArchClass, BinaryProvisioner, DownloadItem, ProvisionError};
pub use publish::{AggregatorClient, PublishError, PublishOutcome};
pub use resolver::{DomainResolver, FileLogSource, LogSource, ResolveError};
pub use supervisor::{ProcessSet, ProcessSupervisor, SuperviseError};
