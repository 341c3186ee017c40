// Install record module for the `.svforge.toml` file inside each server directory

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{INSTALL_RECORD_FILE, START_SCRIPT_FILE};
use crate::error::{ProvisionError, ProvisionResult};
use crate::model::ServerType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallRecord {
    pub server_type: ServerType,
    pub game_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<String>,
    /// Jar or args file, relative to the server directory
    pub launch: String,
    pub java_major: u32,
    pub java_path: PathBuf,
    pub ram_mb: u32,
    pub port: u16,
    pub installed_at: DateTime<Utc>,
}

impl InstallRecord {
    pub fn path(server_dir: &Path) -> PathBuf {
        server_dir.join(INSTALL_RECORD_FILE)
    }

    pub fn load(server_dir: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(Self::path(server_dir))?;
        Ok(toml::from_str(&text)?)
    }

    pub fn save(&self, server_dir: &Path) -> ProvisionResult<()> {
        let path = Self::path(server_dir);
        let text = toml::to_string_pretty(self).map_err(|e| {
            ProvisionError::io(
                &path,
                std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            )
        })?;
        std::fs::write(&path, text).map_err(|e| ProvisionError::io(&path, e))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallStatus {
    Complete,
    /// Record present but the launch target or start script is gone
    Incomplete,
}

#[derive(Debug, Clone)]
pub struct InstalledServer {
    pub directory: PathBuf,
    pub record: InstallRecord,
    pub status: InstallStatus,
}

fn status_of(server_dir: &Path, record: &InstallRecord) -> InstallStatus {
    if server_dir.join(&record.launch).is_file() && server_dir.join(START_SCRIPT_FILE).is_file() {
        InstallStatus::Complete
    } else {
        InstallStatus::Incomplete
    }
}

/// Every server directory directly under `servers_dir` carrying a readable record, sorted by name.
pub fn scan(servers_dir: &Path) -> anyhow::Result<Vec<InstalledServer>> {
    if !servers_dir.exists() {
        return Ok(Vec::new());
    }

    let mut servers = Vec::new();
    for entry in std::fs::read_dir(servers_dir)? {
        let directory = entry?.path();
        if !directory.is_dir() || !InstallRecord::path(&directory).is_file() {
            continue;
        }
        match InstallRecord::load(&directory) {
            Ok(record) => {
                let status = status_of(&directory, &record);
                servers.push(InstalledServer {
                    directory,
                    record,
                    status,
                });
            }
            Err(e) => log::warn!("Skipping {:?}: unreadable install record: {}", directory, e),
        }
    }
    servers.sort_by(|a, b| a.directory.cmp(&b.directory));
    Ok(servers)
}
