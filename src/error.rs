// Error types for the provisioning pipeline

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::model::ServerType;

/// Every failure a pipeline component can produce.
#[derive(Debug, Error)]
pub enum ProvisionError {
    // ── Catalog ─────────────────────────────────────────
    #[error("{server_type} upstream unavailable: {cause}")]
    UpstreamUnavailable {
        server_type: ServerType,
        cause: String,
    },

    #[error("{server_type} has no version '{version}'")]
    VersionNotFound {
        server_type: ServerType,
        version: String,
    },

    #[error("{server_type} {version} has no build '{build}'")]
    BuildNotFound {
        server_type: ServerType,
        version: String,
        build: String,
    },

    // ── Transfer ────────────────────────────────────────
    #[error("download of {url} failed: {reason}")]
    DownloadFailed { url: String, reason: String },

    #[error("checksum mismatch for {url}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        url: String,
        expected: String,
        actual: String,
    },

    // ── Java ────────────────────────────────────────────
    #[error("no Java {major} installation found")]
    JavaInstallNotFound { major: u32 },

    #[error("installing Java {major} failed: {cause}")]
    JavaInstallationFailed { major: u32, cause: String },

    // ── External tools ──────────────────────────────────
    #[error("{tool} exited with {}{}", exit_label(.exit_code), tail_label(.output_tail))]
    BuildToolFailed {
        tool: String,
        exit_code: Option<i32>,
        output_tail: Vec<String>,
    },

    #[error("{program} timed out after {}s", .after.as_secs())]
    ProcessTimedOut { program: String, after: Duration },

    // ── Filesystem ──────────────────────────────────────
    #[error("target directory {0:?} is not empty")]
    DirectoryNotEmpty(PathBuf),

    #[error("not enough disk space at {path:?}: {available} bytes free, {required} required")]
    DiskSpaceInsufficient {
        path: PathBuf,
        available: u64,
        required: u64,
    },

    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("could not initialise HTTP client: {0}")]
    HttpClient(String),

    #[error("installation cancelled")]
    Cancelled,
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

fn tail_label(tail: &[String]) -> String {
    if tail.is_empty() {
        String::new()
    } else {
        format!("\n--- last output ---\n{}", tail.join("\n"))
    }
}

impl ProvisionError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ProvisionError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn upstream(server_type: ServerType, cause: impl fmt::Display) -> Self {
        ProvisionError::UpstreamUnavailable {
            server_type,
            cause: cause.to_string(),
        }
    }

    pub fn version_not_found(server_type: ServerType, version: &str) -> Self {
        ProvisionError::VersionNotFound {
            server_type,
            version: version.to_string(),
        }
    }

    pub fn build_not_found(server_type: ServerType, version: &str, build: impl fmt::Display) -> Self {
        ProvisionError::BuildNotFound {
            server_type,
            version: version.to_string(),
            build: build.to_string(),
        }
    }
}

pub type ProvisionResult<T> = Result<T, ProvisionError>;

/// Pipeline step an install failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Preflight,
    ResolveVersion,
    ResolveJava,
    AcquireArtifact,
    RunInstaller,
    Assemble,
    Commit,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Step::Preflight => "pre-flight checks",
            Step::ResolveVersion => "version resolution",
            Step::ResolveJava => "Java resolution",
            Step::AcquireArtifact => "artifact acquisition",
            Step::RunInstaller => "installer run",
            Step::Assemble => "directory assembly",
            Step::Commit => "commit",
        };
        f.write_str(label)
    }
}

/// A pipeline failure with the request context it happened in.
#[derive(Debug, Error)]
#[error("failed to install {server_type} {version}{} during {step}: {source}", build_label(.build))]
pub struct InstallError {
    pub server_type: ServerType,
    pub version: String,
    pub build: Option<String>,
    pub step: Step,
    #[source]
    pub source: ProvisionError,
}

fn build_label(build: &Option<String>) -> String {
    match build {
        Some(build) => format!(" (build {})", build),
        None => String::new(),
    }
}

impl InstallError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self.source, ProvisionError::Cancelled)
    }
}
