// Versions command: newest game versions a server type offers

use svforge::{InstallationDirector, ServerType};

use crate::config::Settings;
use crate::ui;

pub async fn versions(server_type: ServerType, limit: usize, settings: &Settings) -> anyhow::Result<i32> {
    let director = InstallationDirector::new(settings.director_options())?;
    let catalog = director.catalog(server_type)?;

    let pb = ui::spinner(&format!("Fetching {} versions...", server_type));
    let versions = match catalog.list_versions().await {
        Ok(versions) => {
            ui::finish_spinner_success(&pb, &format!("{} versions", server_type));
            versions
        }
        Err(e) => {
            ui::finish_spinner_error(&pb, &e.to_string());
            return Ok(1);
        }
    };

    if versions.is_empty() {
        ui::dim("No versions available");
        return Ok(0);
    }

    let shown = limit.max(1);
    for version in versions.iter().take(shown) {
        ui::status(
            &version.game_version,
            &format!("Java {}", version.required_java_major),
        );
    }
    if versions.len() > shown {
        ui::dim(&format!("  ... and {} older", versions.len() - shown));
    }
    Ok(0)
}
