// Request validation before anything enters the pipeline

use std::path::{Path, PathBuf};

use anyhow::bail;
use svforge::{BuildSelector, InstallRequest, ServerType};

use crate::cli::InstallArgs;
use crate::config::Settings;

pub const MIN_RAM_MB: u32 = 512;
pub const MAX_RAM_MB: u32 = 32768;
const MAX_VERSION_LEN: usize = 100;
const MAX_FORGE_VERSION_LEN: usize = 50;
const MAX_BUILD: u32 = 9999;

pub fn validate_ram(ram_mb: u32) -> anyhow::Result<u32> {
    if !(MIN_RAM_MB..=MAX_RAM_MB).contains(&ram_mb) {
        bail!(
            "RAM must be between {} and {} MB, got {}",
            MIN_RAM_MB,
            MAX_RAM_MB,
            ram_mb
        );
    }
    Ok(ram_mb)
}

pub fn validate_port(port: u32) -> anyhow::Result<u16> {
    match u16::try_from(port) {
        Ok(port) if port >= 1 => Ok(port),
        _ => bail!("Port must be between 1 and 65535, got {}", port),
    }
}

pub fn validate_version(version: &str) -> anyhow::Result<String> {
    let version = version.trim();
    if version.is_empty() || version.len() > MAX_VERSION_LEN {
        bail!("Version must be 1 to {} characters", MAX_VERSION_LEN);
    }
    if !version
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '+' | '-'))
    {
        bail!(
            "Invalid version '{}': only letters, digits and . _ + - are allowed",
            version
        );
    }
    Ok(version.to_string())
}

/// `--build` is only accepted for types with numbered builds.
pub fn parse_build(server_type: ServerType, build: Option<&str>) -> anyhow::Result<BuildSelector> {
    let Some(build) = build.map(str::trim) else {
        return Ok(BuildSelector::Latest);
    };
    if !server_type.has_numbered_builds() {
        bail!("--build is not supported for {} servers", server_type);
    }
    if build.eq_ignore_ascii_case("latest") {
        return Ok(BuildSelector::Latest);
    }
    match build.parse::<u32>() {
        Ok(n) if (1..=MAX_BUILD).contains(&n) => Ok(BuildSelector::Number(n)),
        _ => bail!(
            "Invalid build '{}': expected \"latest\" or a number from 1 to {}",
            build,
            MAX_BUILD
        ),
    }
}

pub fn validate_forge_version(
    server_type: ServerType,
    forge_version: Option<&str>,
) -> anyhow::Result<Option<String>> {
    let Some(forge) = forge_version.map(str::trim) else {
        return Ok(None);
    };
    if server_type != ServerType::Forge {
        bail!("--forge-version is only supported for forge servers");
    }
    if forge.is_empty() || forge.len() > MAX_FORGE_VERSION_LEN {
        bail!("Forge version must be 1 to {} characters", MAX_FORGE_VERSION_LEN);
    }
    Ok(Some(forge.to_string()))
}

/// `<servers_dir>/<type>-<version>`, or the first free `-2`, `-3`, ... variant.
pub fn default_target(servers_dir: &Path, server_type: ServerType, version: &str) -> PathBuf {
    let base = format!("{}-{}", server_type, version);
    let first = servers_dir.join(&base);
    if !first.exists() {
        return first;
    }
    (2u32..)
        .map(|n| servers_dir.join(format!("{}-{}", base, n)))
        .find(|candidate| !candidate.exists())
        .unwrap_or(first)
}

pub fn build_request(args: &InstallArgs, settings: &Settings) -> anyhow::Result<InstallRequest> {
    let server_type = args.server_type;
    let game_version = validate_version(&args.version)?;
    let build = parse_build(server_type, args.build.as_deref())?;
    let forge_version = validate_forge_version(server_type, args.forge_version.as_deref())?;
    let ram_mb = validate_ram(args.ram.unwrap_or(settings.servers.default_ram_mb))?;
    let port = validate_port(args.port.unwrap_or(u32::from(settings.servers.default_port)))?;
    let target_directory = match &args.dir {
        Some(dir) => dir.clone(),
        None => default_target(&settings.servers.directory, server_type, &game_version),
    };

    Ok(InstallRequest {
        server_type,
        game_version,
        build,
        forge_version,
        ram_mb,
        port,
        target_directory,
    })
}
