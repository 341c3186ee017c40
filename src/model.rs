// Data model shared by every pipeline stage

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fetch::hash::Checksum;

/// The closed set of server flavors this tool can provision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerType {
    Vanilla,
    Paper,
    Spigot,
    Forge,
    Leaf,
}

impl ServerType {
    pub const ALL: [ServerType; 5] = [
        ServerType::Vanilla,
        ServerType::Paper,
        ServerType::Spigot,
        ServerType::Forge,
        ServerType::Leaf,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ServerType::Vanilla => "vanilla",
            ServerType::Paper => "paper",
            ServerType::Spigot => "spigot",
            ServerType::Forge => "forge",
            ServerType::Leaf => "leaf",
        }
    }

    /// Whether the type exposes numbered builds selectable with `--build`.
    pub fn has_numbered_builds(&self) -> bool {
        matches!(self, ServerType::Paper | ServerType::Leaf | ServerType::Spigot)
    }

    /// Free space the install needs, including transient build/installer files.
    pub fn estimated_disk_bytes(&self) -> u64 {
        const MB: u64 = 1024 * 1024;
        match self {
            ServerType::Vanilla | ServerType::Paper | ServerType::Leaf => 256 * MB,
            ServerType::Forge => 768 * MB,
            // BuildTools checks out and compiles the full source tree
            ServerType::Spigot => 2048 * MB,
        }
    }
}

impl fmt::Display for ServerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ServerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ServerType::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!(
                    "Unsupported server type: '{}'. Supported types: {}",
                    s,
                    ServerType::ALL
                        .iter()
                        .map(|t| t.name())
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            })
    }
}

/// Which build of a version to install.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BuildSelector {
    #[default]
    Latest,
    Number(u32),
    /// A build addressed by name, e.g. a Forge version such as `47.4.0`
    Named(String),
}

impl fmt::Display for BuildSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildSelector::Latest => f.write_str("latest"),
            BuildSelector::Number(n) => write!(f, "{}", n),
            BuildSelector::Named(name) => f.write_str(name),
        }
    }
}

/// A validated install request handed to the director by the CLI layer.
#[derive(Debug, Clone)]
pub struct InstallRequest {
    pub server_type: ServerType,
    pub game_version: String,
    pub build: BuildSelector,
    pub forge_version: Option<String>,
    pub ram_mb: u32,
    pub port: u16,
    pub target_directory: PathBuf,
}

impl InstallRequest {
    /// The selector the catalog should resolve, folding `forge_version` in for Forge.
    pub fn effective_selector(&self) -> BuildSelector {
        match (&self.server_type, &self.forge_version) {
            (ServerType::Forge, Some(forge)) => BuildSelector::Named(forge.clone()),
            _ => self.build.clone(),
        }
    }
}

/// Where the bytes of a build come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactSource {
    Download { url: String, file_name: String },
    /// Compiled locally by BuildTools at the given Jenkins revision
    BuildTools { revision: u32, tool_url: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildDescriptor {
    pub build_number: u32,
    /// Display name: the build number, or the Forge version string
    pub name: String,
    pub source: ArtifactSource,
    pub checksum: Option<Checksum>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionDescriptor {
    pub game_version: String,
    /// Ascending by build number; empty for types without builds
    pub available_builds: Vec<BuildDescriptor>,
    pub required_java_major: u32,
}

impl VersionDescriptor {
    pub fn latest_build(&self) -> Option<&BuildDescriptor> {
        self.available_builds.iter().max_by_key(|b| b.build_number)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JavaInstallation {
    pub major_version: u32,
    pub executable_path: PathBuf,
    /// Installed by this tool rather than discovered
    pub is_managed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedBuildArtifact {
    pub game_version: String,
    pub build_tool_revision: u32,
    pub jar_path: PathBuf,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct InstallationResult {
    pub server_type: ServerType,
    pub game_version: String,
    pub build: Option<String>,
    pub server_directory: PathBuf,
    pub jar_path: PathBuf,
    pub java_used: JavaInstallation,
    pub duration_seconds: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_type_parse() {
        assert_eq!("paper".parse::<ServerType>().unwrap(), ServerType::Paper);
        assert_eq!("Forge".parse::<ServerType>().unwrap(), ServerType::Forge);
        let err = "bukkit".parse::<ServerType>().unwrap_err();
        assert!(err.contains("vanilla, paper, spigot, forge, leaf"));
    }

    #[test]
    fn test_forge_version_becomes_named_selector() {
        let request = InstallRequest {
            server_type: ServerType::Forge,
            game_version: "1.20.1".to_string(),
            build: BuildSelector::Latest,
            forge_version: Some("47.4.0".to_string()),
            ram_mb: 2048,
            port: 25565,
            target_directory: PathBuf::from("/tmp/forge"),
        };
        assert_eq!(
            request.effective_selector(),
            BuildSelector::Named("47.4.0".to_string())
        );
    }
}
