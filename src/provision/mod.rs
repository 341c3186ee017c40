// Server provisioners: per-type artifact acquisition into a staging directory

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

pub mod download;
pub mod forge;
pub mod layout;
pub mod spigot;

pub use download::DownloadProvisioner;
pub use forge::ForgeProvisioner;
pub use spigot::SpigotProvisioner;

use crate::builder::SourceBuilder;
use crate::error::{ProvisionError, ProvisionResult};
use crate::fetch::ArtifactFetcher;
use crate::model::{BuildDescriptor, InstallRequest, JavaInstallation, ServerType};
use crate::reporter::Reporter;

/// How `start.sh` starts the server; paths are relative to the server directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchTarget {
    Jar(PathBuf),
    /// A JVM `@argfile`, used by modern Forge installs
    ArgsFile(PathBuf),
}

impl LaunchTarget {
    pub fn relative_path(&self) -> &Path {
        match self {
            LaunchTarget::Jar(path) | LaunchTarget::ArgsFile(path) => path,
        }
    }
}

/// Everything a provisioner needs for one install.
pub struct ProvisionContext<'a> {
    pub request: &'a InstallRequest,
    pub build: &'a BuildDescriptor,
    pub java: &'a JavaInstallation,
    /// Empty directory that becomes the server directory on success
    pub staging: &'a Path,
    pub fetcher: &'a ArtifactFetcher,
    pub builder: &'a SourceBuilder,
    pub reporter: &'a dyn Reporter,
    pub installer_timeout: Duration,
}

/// Turns a resolved build into server files inside the staging directory.
#[async_trait]
pub trait ServerProvisioner: Send + Sync {
    fn server_type(&self) -> ServerType;

    /// Put the build's artifact into the staging directory and return its path.
    async fn acquire(&self, ctx: &ProvisionContext<'_>) -> ProvisionResult<PathBuf>;

    /// Post-process the artifact (e.g. run an installer). Defaults to launching it directly.
    async fn install(
        &self,
        ctx: &ProvisionContext<'_>,
        artifact: PathBuf,
    ) -> ProvisionResult<LaunchTarget> {
        let name = artifact
            .strip_prefix(ctx.staging)
            .map(Path::to_path_buf)
            .unwrap_or(artifact);
        Ok(LaunchTarget::Jar(name))
    }
}

/// Reject a build whose source this provisioner cannot handle.
pub(crate) fn unsupported_source(server_type: ServerType, build: &BuildDescriptor) -> ProvisionError {
    ProvisionError::upstream(
        server_type,
        format!("build {} has an unsupported artifact source", build.name),
    )
}

/// Destination in `staging` for an upstream-supplied file name. Anything other than a
/// bare file name (absolute paths, `..`, nested directories) is rejected.
pub(crate) fn staged_path(
    server_type: ServerType,
    staging: &Path,
    file_name: &str,
) -> ProvisionResult<PathBuf> {
    let mut components = Path::new(file_name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(name)), None) => Ok(staging.join(name)),
        _ => Err(ProvisionError::upstream(
            server_type,
            format!("artifact name '{}' is not a plain file name", file_name),
        )),
    }
}

/// One provisioner per server type.
pub struct ProvisionerRegistry {
    provisioners: HashMap<ServerType, Arc<dyn ServerProvisioner>>,
}

impl Default for ProvisionerRegistry {
    fn default() -> Self {
        let mut registry = Self {
            provisioners: HashMap::new(),
        };
        registry.register(Arc::new(DownloadProvisioner::new(ServerType::Vanilla)));
        registry.register(Arc::new(DownloadProvisioner::new(ServerType::Paper)));
        registry.register(Arc::new(DownloadProvisioner::new(ServerType::Leaf)));
        registry.register(Arc::new(SpigotProvisioner));
        registry.register(Arc::new(ForgeProvisioner));
        registry
    }
}

impl ProvisionerRegistry {
    pub fn register(&mut self, provisioner: Arc<dyn ServerProvisioner>) {
        self.provisioners
            .insert(provisioner.server_type(), provisioner);
    }

    pub fn get(&self, server_type: ServerType) -> Option<Arc<dyn ServerProvisioner>> {
        self.provisioners.get(&server_type).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_covers_every_type() {
        let registry = ProvisionerRegistry::default();
        for server_type in ServerType::ALL {
            assert_eq!(registry.get(server_type).unwrap().server_type(), server_type);
        }
    }

    #[test]
    fn test_staged_path_accepts_bare_names() {
        let staging = Path::new("/srv/.paper.staging-x");
        assert_eq!(
            staged_path(ServerType::Paper, staging, "paper-1.21.8-60.jar").unwrap(),
            staging.join("paper-1.21.8-60.jar")
        );
    }

    #[test]
    fn test_staged_path_rejects_escaping_names() {
        let staging = Path::new("/srv/.paper.staging-x");
        for name in ["/tmp/outside.jar", "../outside.jar", "libs/server.jar", "..", ""] {
            let err = staged_path(ServerType::Paper, staging, name).unwrap_err();
            assert!(
                matches!(err, ProvisionError::UpstreamUnavailable { .. }),
                "{} was accepted",
                name
            );
        }
    }
}
