// Constants module for shared string constants

use std::time::Duration;

pub const MOJANG_MANIFEST_URL: &str =
    "https://piston-meta.mojang.com/mc/game/version_manifest_v2.json";
pub const PAPER_API_URL: &str = "https://api.papermc.io/v2";
pub const LEAF_API_URL: &str = "https://api.leafmc.one/v2";
pub const SPIGOT_VERSIONS_URL: &str = "https://hub.spigotmc.org/versions";
pub const BUILDTOOLS_JENKINS_URL: &str = "https://hub.spigotmc.org/jenkins/job/BuildTools";
pub const FORGE_PROMOTIONS_URL: &str =
    "https://files.minecraftforge.net/net/minecraftforge/forge/promotions_slim.json";
pub const FORGE_MAVEN_URL: &str = "https://maven.minecraftforge.net/net/minecraftforge/forge";

pub const START_SCRIPT_FILE: &str = "start.sh";
pub const EULA_FILE: &str = "eula.txt";
pub const PROPERTIES_FILE: &str = "server.properties";
pub const INSTALL_RECORD_FILE: &str = ".svforge.toml";
pub const BUILDTOOLS_JAR: &str = "BuildTools.jar";
pub const CACHE_ARTIFACT_FILE: &str = "artifact.toml";

pub const METADATA_TIMEOUT: Duration = Duration::from_secs(30);
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DOWNLOAD_READ_TIMEOUT: Duration = Duration::from_secs(30);
pub const BUILDTOOLS_TIMEOUT: Duration = Duration::from_secs(60 * 60);
pub const FORGE_INSTALLER_TIMEOUT: Duration = Duration::from_secs(20 * 60);
pub const PACKAGE_INSTALL_TIMEOUT: Duration = Duration::from_secs(20 * 60);
pub const JAVA_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

pub const DEFAULT_DOWNLOAD_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(1);

/// Lines of external process output kept for failure diagnostics
pub const OUTPUT_TAIL_LINES: usize = 40;

/// Initial heap handed to the JVM when the requested maximum allows it
pub const DEFAULT_XMS_MB: u32 = 512;
