// Installation director: pre-flight checks, then the provisioning pipeline for one request

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Utc;
use log::{debug, info, warn};

use crate::builder::{BuildCache, SourceBuilder};
use crate::catalog::{CatalogRegistry, UpstreamUrls, VersionCatalog};
use crate::constants::{
    BUILDTOOLS_TIMEOUT, EULA_FILE, FORGE_INSTALLER_TIMEOUT, PROPERTIES_FILE, START_SCRIPT_FILE,
};
use crate::error::{InstallError, ProvisionError, ProvisionResult, Step};
use crate::fetch::{ArtifactFetcher, RetryPolicy, http};
use crate::java::{JavaRuntimeResolver, JavaSearchOptions, RuntimeInstaller, SystemPackageManager, required_major};
use crate::model::{InstallRequest, InstallationResult, ServerType};
use crate::provision::{ProvisionContext, ProvisionerRegistry, layout};
use crate::record::InstallRecord;
use crate::reporter::Reporter;

/// Everything the director needs; the core never reads config files itself.
#[derive(Debug, Clone)]
pub struct DirectorOptions {
    pub upstreams: UpstreamUrls,
    /// Root of the Spigot build cache
    pub cache_dir: PathBuf,
    pub retry: RetryPolicy,
    pub java_search: JavaSearchOptions,
    pub auto_install_java: bool,
    pub buildtools_timeout: Duration,
    pub installer_timeout: Duration,
    pub check_disk_space: bool,
}

impl DirectorOptions {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            upstreams: UpstreamUrls::default(),
            cache_dir: cache_dir.into(),
            retry: RetryPolicy::default(),
            java_search: JavaSearchOptions::default(),
            auto_install_java: true,
            buildtools_timeout: BUILDTOOLS_TIMEOUT,
            installer_timeout: FORGE_INSTALLER_TIMEOUT,
            check_disk_space: true,
        }
    }
}

/// Where the pipeline currently is, for error context.
#[derive(Debug)]
struct Progress {
    step: Step,
    build: Option<String>,
}

impl Progress {
    fn enter(progress: &Mutex<Progress>, step: Step) {
        debug!("Pipeline step: {}", step);
        progress.lock().unwrap_or_else(|p| p.into_inner()).step = step;
    }
}

pub struct InstallationDirector {
    catalogs: CatalogRegistry,
    provisioners: ProvisionerRegistry,
    fetcher: ArtifactFetcher,
    java: JavaRuntimeResolver,
    builder: SourceBuilder,
    installer_timeout: Duration,
    check_disk_space: bool,
}

impl InstallationDirector {
    pub fn new(options: DirectorOptions) -> ProvisionResult<Self> {
        let client = http::build_client().map_err(|e| ProvisionError::HttpClient(e.to_string()))?;

        let installer: Option<Box<dyn RuntimeInstaller>> = if options.auto_install_java {
            SystemPackageManager::detect().map(|m| Box::new(m) as Box<dyn RuntimeInstaller>)
        } else {
            None
        };

        Ok(Self {
            catalogs: CatalogRegistry::new(client.clone(), &options.upstreams),
            provisioners: ProvisionerRegistry::default(),
            fetcher: ArtifactFetcher::new(client, options.retry),
            java: JavaRuntimeResolver::new(options.java_search, options.auto_install_java, installer),
            builder: SourceBuilder::new(BuildCache::new(options.cache_dir))
                .with_timeout(options.buildtools_timeout),
            installer_timeout: options.installer_timeout,
            check_disk_space: options.check_disk_space,
        })
    }

    pub fn catalog(&self, server_type: ServerType) -> ProvisionResult<Arc<dyn VersionCatalog>> {
        self.catalogs.get_or_error(server_type)
    }

    pub fn java(&self) -> &JavaRuntimeResolver {
        &self.java
    }

    pub fn cache(&self) -> &BuildCache {
        self.builder.cache()
    }

    pub async fn install(
        &self,
        request: &InstallRequest,
        reporter: &dyn Reporter,
    ) -> Result<InstallationResult, InstallError> {
        self.install_until(request, reporter, std::future::pending()).await
    }

    /// Like [`install`](Self::install), but abandons the pipeline when `shutdown` completes.
    ///
    /// Dropping the pipeline kills running child processes and removes staging and partial files.
    pub async fn install_until<F>(
        &self,
        request: &InstallRequest,
        reporter: &dyn Reporter,
        shutdown: F,
    ) -> Result<InstallationResult, InstallError>
    where
        F: Future<Output = ()>,
    {
        let progress = Mutex::new(Progress {
            step: Step::Preflight,
            build: None,
        });

        let outcome = tokio::select! {
            biased;
            _ = shutdown => {
                warn!("Installation of {} {} cancelled", request.server_type, request.game_version);
                Err(ProvisionError::Cancelled)
            }
            result = self.run(request, reporter, &progress) => result,
        };

        outcome.map_err(|source| {
            let progress = progress.into_inner().unwrap_or_else(|p| p.into_inner());
            InstallError {
                server_type: request.server_type,
                version: request.game_version.clone(),
                build: progress.build,
                step: progress.step,
                source,
            }
        })
    }

    async fn run(
        &self,
        request: &InstallRequest,
        reporter: &dyn Reporter,
        progress: &Mutex<Progress>,
    ) -> ProvisionResult<InstallationResult> {
        let started = Instant::now();
        let server_type = request.server_type;
        let target = request.target_directory.as_path();

        Progress::enter(progress, Step::Preflight);
        ensure_empty_target(target)?;
        if self.check_disk_space {
            let probe = nearest_existing_ancestor(target);
            if let Some(available) = available_space(&probe) {
                check_disk_space(&probe, available, server_type.estimated_disk_bytes())?;
            } else {
                debug!("No disk information for {:?}; skipping space check", probe);
            }
        }

        Progress::enter(progress, Step::ResolveVersion);
        reporter.step(&format!("Resolving {} {}", server_type, request.game_version));
        let catalog = self.catalogs.get_or_error(server_type)?;
        let build = catalog
            .resolve_build(&request.game_version, &request.effective_selector())
            .await?;
        if server_type != ServerType::Vanilla {
            progress.lock().unwrap_or_else(|p| p.into_inner()).build = Some(build.name.clone());
        }
        info!("Resolved {} {} to build {}", server_type, request.game_version, build.name);

        Progress::enter(progress, Step::ResolveJava);
        let major = required_major(&request.game_version);
        reporter.step(&format!("Resolving Java {}", major));
        let java = self.java.resolve(major, reporter).await?;
        info!("Using Java {} at {:?}", major, java.executable_path);

        let parent = target
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent).map_err(|e| ProvisionError::io(parent, e))?;
        let dir_name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "server".to_string());
        let staging = tempfile::Builder::new()
            .prefix(&format!(".{}.staging-", dir_name))
            .tempdir_in(parent)
            .map_err(|e| ProvisionError::io(parent, e))?;
        debug!("Staging into {:?}", staging.path());

        let provisioner = self.provisioners.get(server_type).ok_or_else(|| {
            ProvisionError::upstream(server_type, "no provisioner registered")
        })?;
        let ctx = ProvisionContext {
            request,
            build: &build,
            java: &java,
            staging: staging.path(),
            fetcher: &self.fetcher,
            builder: &self.builder,
            reporter,
            installer_timeout: self.installer_timeout,
        };

        Progress::enter(progress, Step::AcquireArtifact);
        let artifact = provisioner.acquire(&ctx).await?;

        Progress::enter(progress, Step::RunInstaller);
        let launch = provisioner.install(&ctx, artifact).await?;

        Progress::enter(progress, Step::Assemble);
        reporter.step("Writing server files");
        let staged = staging.path();
        let script = layout::start_script(&java, request.ram_mb, request.port, &launch);
        let script_path = staged.join(START_SCRIPT_FILE);
        layout::write_executable(&script_path, &script)
            .map_err(|e| ProvisionError::io(&script_path, e))?;
        write_file(&staged.join(EULA_FILE), &layout::eula())?;
        write_file(
            &staged.join(PROPERTIES_FILE),
            &layout::server_properties(server_type, request.port),
        )?;
        let record_build = progress
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .build
            .clone();
        InstallRecord {
            server_type,
            game_version: request.game_version.clone(),
            build: record_build.clone(),
            launch: launch.relative_path().to_string_lossy().into_owned(),
            java_major: java.major_version,
            java_path: java.executable_path.clone(),
            ram_mb: request.ram_mb,
            port: request.port,
            installed_at: Utc::now(),
        }
        .save(staged)?;

        Progress::enter(progress, Step::Commit);
        // The target was verified empty (or absent) during pre-flight
        if target.is_dir() {
            std::fs::remove_dir(target).map_err(|e| ProvisionError::io(target, e))?;
        }
        std::fs::rename(staged, target).map_err(|e| ProvisionError::io(target, e))?;
        let _ = staging.keep();
        info!("Installed {} {} into {:?}", server_type, request.game_version, target);

        Ok(InstallationResult {
            server_type,
            game_version: request.game_version.clone(),
            build: record_build,
            server_directory: target.to_path_buf(),
            jar_path: target.join(launch.relative_path()),
            java_used: java,
            duration_seconds: started.elapsed().as_secs_f64(),
        })
    }
}

fn write_file(path: &Path, contents: &str) -> ProvisionResult<()> {
    std::fs::write(path, contents).map_err(|e| ProvisionError::io(path, e))
}

/// Absent or an empty directory; anything else is a conflict.
fn ensure_empty_target(target: &Path) -> ProvisionResult<()> {
    if !target.exists() {
        return Ok(());
    }
    if !target.is_dir() {
        return Err(ProvisionError::DirectoryNotEmpty(target.to_path_buf()));
    }
    let mut entries = std::fs::read_dir(target).map_err(|e| ProvisionError::io(target, e))?;
    if entries.next().is_some() {
        return Err(ProvisionError::DirectoryNotEmpty(target.to_path_buf()));
    }
    Ok(())
}

fn nearest_existing_ancestor(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    absolute
        .ancestors()
        .find(|p| p.exists())
        .map(Path::to_path_buf)
        .unwrap_or(absolute)
}

/// Free bytes on the disk whose mount point is the longest prefix of `path`.
pub fn available_space(path: &Path) -> Option<u64> {
    let disks = sysinfo::Disks::new_with_refreshed_list();
    disks
        .list()
        .iter()
        .filter(|d| path.starts_with(d.mount_point()))
        .max_by_key(|d| d.mount_point().as_os_str().len())
        .map(|d| d.available_space())
}

pub fn check_disk_space(path: &Path, available: u64, required: u64) -> ProvisionResult<()> {
    if available < required {
        return Err(ProvisionError::DiskSpaceInsufficient {
            path: path.to_path_buf(),
            available,
            required,
        });
    }
    Ok(())
}
