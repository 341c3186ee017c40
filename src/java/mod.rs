// Java runtime resolution: version mapping, discovery and on-demand installation

pub mod discovery;
pub mod installer;

use log::{debug, info, warn};

use crate::error::{ProvisionError, ProvisionResult};
use crate::mc_version::McVersion;
use crate::model::JavaInstallation;
use crate::reporter::Reporter;
pub use discovery::JavaSearchOptions;
pub use installer::{PackageManager, RuntimeInstaller, SystemPackageManager};

/// Java major a Minecraft release needs: up to 1.16.5 runs on 8, 1.17 through
/// 1.20.4 on 17, 1.20.5 and later on 21. Snapshots and unparseable versions get 21.
pub fn required_major(game_version: &str) -> u32 {
    match McVersion::parse(game_version) {
        Some(v) if !v.at_least(1, 17, 0) => 8,
        Some(v) if !v.at_least(1, 20, 5) => 17,
        _ => 21,
    }
}

pub struct JavaRuntimeResolver {
    search: JavaSearchOptions,
    auto_install: bool,
    installer: Option<Box<dyn RuntimeInstaller>>,
}

impl JavaRuntimeResolver {
    pub fn new(
        search: JavaSearchOptions,
        auto_install: bool,
        installer: Option<Box<dyn RuntimeInstaller>>,
    ) -> Self {
        Self {
            search,
            auto_install,
            installer,
        }
    }

    /// Discovery only; never installs.
    pub fn scan_only(search: JavaSearchOptions) -> Self {
        Self::new(search, false, None)
    }

    pub fn search_options(&self) -> &JavaSearchOptions {
        &self.search
    }

    /// All runtimes currently visible.
    pub async fn installations(&self) -> Vec<JavaInstallation> {
        discovery::discover(&self.search).await
    }

    async fn find(&self, major: u32) -> Option<JavaInstallation> {
        self.installations()
            .await
            .into_iter()
            .find(|j| j.major_version == major)
    }

    /// Find a Java `major` runtime, installing one when allowed and missing.
    pub async fn resolve(&self, major: u32, reporter: &dyn Reporter) -> ProvisionResult<JavaInstallation> {
        if let Some(found) = self.find(major).await {
            debug!("Using Java {} at {:?}", major, found.executable_path);
            return Ok(found);
        }

        let installer = match (&self.installer, self.auto_install) {
            (Some(installer), true) => installer,
            (None, true) => {
                warn!("Java {} missing and no supported package manager found", major);
                return Err(ProvisionError::JavaInstallNotFound { major });
            }
            (_, false) => return Err(ProvisionError::JavaInstallNotFound { major }),
        };

        info!("Java {} not found, installing with {}", major, installer.name());
        installer.install(major, reporter).await?;

        match self.find(major).await {
            Some(mut installed) => {
                installed.is_managed = true;
                Ok(installed)
            }
            None => {
                warn!(
                    "{} reported success but no Java {} runtime is visible",
                    installer.name(),
                    major
                );
                Err(ProvisionError::JavaInstallNotFound { major })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::SilentReporter;

    #[test]
    fn test_required_major() {
        assert_eq!(required_major("1.7.10"), 8);
        assert_eq!(required_major("1.16.5"), 8);
        assert_eq!(required_major("1.17"), 17);
        assert_eq!(required_major("1.20.4"), 17);
        assert_eq!(required_major("1.20.5"), 21);
        assert_eq!(required_major("1.21.8"), 21);
        assert_eq!(required_major("25w31a"), 21);
    }

    fn empty_search(root: &std::path::Path) -> JavaSearchOptions {
        JavaSearchOptions {
            search_roots: vec![root.to_path_buf()],
            managed_dir: None,
            use_path: false,
        }
    }

    #[tokio::test]
    async fn test_missing_runtime_without_auto_install() {
        let root = tempfile::tempdir().unwrap();
        let resolver = JavaRuntimeResolver::scan_only(empty_search(root.path()));
        let err = resolver.resolve(17, &SilentReporter).await.unwrap_err();
        assert!(matches!(err, ProvisionError::JavaInstallNotFound { major: 17 }));
    }

    #[cfg(unix)]
    mod install {
        use super::*;
        use async_trait::async_trait;
        use std::path::PathBuf;
        use std::sync::Arc;
        use std::sync::atomic::{AtomicU32, Ordering};

        /// Drops a fake JDK into the search root when asked to install.
        struct FakeInstaller {
            root: PathBuf,
            calls: Arc<AtomicU32>,
            produce: bool,
        }

        #[async_trait]
        impl RuntimeInstaller for FakeInstaller {
            fn name(&self) -> &str {
                "fake"
            }

            async fn install(&self, major: u32, _reporter: &dyn Reporter) -> ProvisionResult<()> {
                self.calls.fetch_add(1, Ordering::SeqCst);
                if self.produce {
                    discovery::testing::write_fake_jdk(
                        &self.root.join(format!("jdk-{}", major)),
                        &format!("{}.0.1", major),
                    );
                }
                Ok(())
            }
        }

        #[tokio::test]
        async fn test_existing_runtime_is_used_without_install() {
            let root = tempfile::tempdir().unwrap();
            discovery::testing::write_fake_jdk(&root.path().join("jdk-17"), "17.0.9");
            let calls = Arc::new(AtomicU32::new(0));
            let installer = FakeInstaller {
                root: root.path().to_path_buf(),
                calls: calls.clone(),
                produce: true,
            };
            let resolver =
                JavaRuntimeResolver::new(empty_search(root.path()), true, Some(Box::new(installer)));

            let java = resolver.resolve(17, &SilentReporter).await.unwrap();
            assert_eq!(java.major_version, 17);
            assert!(!java.is_managed);
            assert_eq!(calls.load(Ordering::SeqCst), 0);
        }

        #[tokio::test]
        async fn test_missing_runtime_is_installed_then_rescanned() {
            let root = tempfile::tempdir().unwrap();
            discovery::testing::write_fake_jdk(&root.path().join("jdk-8"), "1.8.0_392");
            let resolver = JavaRuntimeResolver::new(
                empty_search(root.path()),
                true,
                Some(Box::new(FakeInstaller {
                    root: root.path().to_path_buf(),
                    calls: Arc::default(),
                    produce: true,
                })),
            );

            let java = resolver.resolve(21, &SilentReporter).await.unwrap();
            assert_eq!(java.major_version, 21);
            assert!(java.is_managed);
            assert!(java.executable_path.starts_with(root.path().join("jdk-21")));
        }

        #[tokio::test]
        async fn test_install_that_produces_nothing_is_not_found() {
            let root = tempfile::tempdir().unwrap();
            let resolver = JavaRuntimeResolver::new(
                empty_search(root.path()),
                true,
                Some(Box::new(FakeInstaller {
                    root: root.path().to_path_buf(),
                    calls: Arc::default(),
                    produce: false,
                })),
            );

            let err = resolver.resolve(21, &SilentReporter).await.unwrap_err();
            assert!(matches!(err, ProvisionError::JavaInstallNotFound { major: 21 }));
        }
    }
}
