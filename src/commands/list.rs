// List command: servers installed under the configured servers directory

use console::style;
use svforge::record::{self, InstallStatus};

use crate::config::Settings;
use crate::ui;

pub fn list(settings: &Settings) -> anyhow::Result<i32> {
    let servers_dir = &settings.servers.directory;
    let servers = record::scan(servers_dir)?;

    if servers.is_empty() {
        ui::dim(&format!("No servers installed in {}", servers_dir.display()));
        return Ok(0);
    }

    ui::header(&format!("Servers in {}", servers_dir.display()));
    for server in &servers {
        let name = server
            .directory
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let status = match server.status {
            InstallStatus::Complete => style("complete").green(),
            InstallStatus::Incomplete => style("incomplete").yellow(),
        };
        let record = &server.record;
        ui::dim(&format!(
            "  {:<24} {:<8} {:<10} {:<10} {}",
            name,
            record.server_type,
            record.game_version,
            record.build.as_deref().unwrap_or("-"),
            status
        ));
    }
    Ok(0)
}
