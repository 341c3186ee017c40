// Config module for the YAML settings file and the directories it points at

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use svforge::DirectorOptions;
use svforge::catalog::UpstreamUrls;
use svforge::constants::{
    BUILDTOOLS_TIMEOUT, DEFAULT_BACKOFF_BASE, DEFAULT_DOWNLOAD_ATTEMPTS, FORGE_INSTALLER_TIMEOUT,
};
use svforge::fetch::RetryPolicy;
use svforge::java::JavaSearchOptions;
use svforge::java::discovery::default_search_roots;

pub const CONFIG_FILE: &str = "config.yaml";

/// `SVFORGE_HOME` if set, otherwise the platform directory from `dirs`.
fn home_or(platform: Option<PathBuf>) -> PathBuf {
    match std::env::var_os("SVFORGE_HOME") {
        Some(home) => PathBuf::from(home),
        None => platform
            .map(|dir| dir.join("svforge"))
            .unwrap_or_else(|| PathBuf::from(".svforge")),
    }
}

pub fn config_dir() -> PathBuf {
    home_or(dirs::config_dir())
}

pub fn data_dir() -> PathBuf {
    home_or(dirs::data_local_dir())
}

pub fn config_path() -> PathBuf {
    config_dir().join(CONFIG_FILE)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub directory: PathBuf,
    pub default_ram_mb: u32,
    pub default_port: u16,
    pub check_disk_space: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            directory: data_dir().join("servers"),
            default_ram_mb: 2048,
            default_port: 25565,
            check_disk_space: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JavaSettings {
    /// Install a missing runtime with the system package manager
    pub auto_install: bool,
    /// Searched in addition to the well-known JDK locations
    pub search_paths: Vec<PathBuf>,
    pub use_path: bool,
    pub managed_dir: PathBuf,
}

impl Default for JavaSettings {
    fn default() -> Self {
        Self {
            auto_install: true,
            search_paths: Vec::new(),
            use_path: true,
            managed_dir: data_dir().join("java"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadSettings {
    pub max_attempts: u32,
    pub backoff_seconds: u64,
    pub buildtools_timeout_minutes: u64,
    pub installer_timeout_minutes: u64,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_DOWNLOAD_ATTEMPTS,
            backoff_seconds: DEFAULT_BACKOFF_BASE.as_secs(),
            buildtools_timeout_minutes: BUILDTOOLS_TIMEOUT.as_secs() / 60,
            installer_timeout_minutes: FORGE_INSTALLER_TIMEOUT.as_secs() / 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub directory: PathBuf,
}

impl Default for CacheSettings {
    fn default() -> Self {
        let directory = match std::env::var_os("SVFORGE_HOME") {
            Some(home) => PathBuf::from(home).join("cache"),
            None => home_or(dirs::cache_dir()),
        };
        Self { directory }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// env_logger filter used when neither `--debug` nor `RUST_LOG` is given
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiSettings {
    pub color: bool,
    pub progress: bool,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            color: true,
            progress: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamSettings {
    pub mojang_manifest: String,
    pub paper_api: String,
    pub leaf_api: String,
    pub spigot_versions: String,
    pub buildtools_jenkins: String,
    pub forge_promotions: String,
    pub forge_maven: String,
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        let urls = UpstreamUrls::default();
        Self {
            mojang_manifest: urls.mojang_manifest,
            paper_api: urls.paper_api,
            leaf_api: urls.leaf_api,
            spigot_versions: urls.spigot_versions,
            buildtools_jenkins: urls.buildtools_jenkins,
            forge_promotions: urls.forge_promotions,
            forge_maven: urls.forge_maven,
        }
    }
}

impl From<&UpstreamSettings> for UpstreamUrls {
    fn from(s: &UpstreamSettings) -> Self {
        UpstreamUrls {
            mojang_manifest: s.mojang_manifest.clone(),
            paper_api: s.paper_api.clone(),
            leaf_api: s.leaf_api.clone(),
            spigot_versions: s.spigot_versions.clone(),
            buildtools_jenkins: s.buildtools_jenkins.clone(),
            forge_promotions: s.forge_promotions.clone(),
            forge_maven: s.forge_maven.clone(),
        }
    }
}

/// Contents of `config.yaml`. Missing keys take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub servers: ServerSettings,
    pub java: JavaSettings,
    pub downloads: DownloadSettings,
    pub cache: CacheSettings,
    pub logging: LoggingSettings,
    pub ui: UiSettings,
    pub upstreams: UpstreamSettings,
}

impl Settings {
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&text)
            .map_err(|e| anyhow::anyhow!("Invalid settings file {}: {}", path.display(), e))
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, serde_yaml::to_string(self)?)?;
        Ok(())
    }

    /// Load the settings file, writing the defaults first when it does not exist.
    pub fn load_or_create() -> anyhow::Result<Self> {
        let path = config_path();
        if !path.exists() {
            let defaults = Self::default();
            defaults.save_to(&path)?;
            log::debug!("Created default settings at {}", path.display());
            return Ok(defaults);
        }
        Self::load_from(&path)
    }

    pub fn reset() -> anyhow::Result<Self> {
        let defaults = Self::default();
        defaults.save_to(&config_path())?;
        Ok(defaults)
    }

    pub fn java_search(&self) -> JavaSearchOptions {
        let mut search_roots = default_search_roots();
        search_roots.extend(self.java.search_paths.iter().cloned());
        JavaSearchOptions {
            search_roots,
            managed_dir: Some(self.java.managed_dir.clone()),
            use_path: self.java.use_path,
        }
    }

    pub fn director_options(&self) -> DirectorOptions {
        let mut options = DirectorOptions::new(&self.cache.directory);
        options.upstreams = UpstreamUrls::from(&self.upstreams);
        options.retry = RetryPolicy {
            max_attempts: self.downloads.max_attempts.max(1),
            base_delay: Duration::from_secs(self.downloads.backoff_seconds),
        };
        options.java_search = self.java_search();
        options.auto_install_java = self.java.auto_install;
        options.buildtools_timeout = Duration::from_secs(self.downloads.buildtools_timeout_minutes * 60);
        options.installer_timeout = Duration::from_secs(self.downloads.installer_timeout_minutes * 60);
        options.check_disk_space = self.servers.check_disk_space;
        options
    }
}
