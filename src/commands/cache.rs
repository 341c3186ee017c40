// Cache command: inspect or clear the Spigot build cache

use svforge::builder::BuildCache;

use crate::cli::CacheAction;
use crate::config::Settings;
use crate::ui;

pub fn cache(action: &CacheAction, settings: &Settings) -> anyhow::Result<i32> {
    let cache = BuildCache::new(&settings.cache.directory);

    match action {
        CacheAction::List => {
            let entries = cache.list()?;
            if entries.is_empty() {
                ui::dim(&format!("No cached builds in {}", cache.root().display()));
                return Ok(0);
            }
            ui::header(&format!("Cached Spigot builds in {}", cache.root().display()));
            for entry in entries {
                ui::status(
                    &entry.game_version,
                    &format!(
                        "BuildTools #{}  {}  {}",
                        entry.build_tool_revision,
                        entry.created_at.format("%Y-%m-%d %H:%M"),
                        entry.jar_path.display()
                    ),
                );
            }
        }
        CacheAction::Clear => {
            let removed = cache.clear()?;
            ui::success(&format!("Removed {} cached build(s)", removed));
        }
    }
    Ok(0)
}
