// Config command: show the settings file or restore its defaults

use crate::config::{Settings, config_path};
use crate::ui;

pub fn config(show: bool, reset: bool, settings: &Settings) -> anyhow::Result<i32> {
    let path = config_path();

    if reset {
        Settings::reset()?;
        ui::success(&format!("Reset settings at {}", path.display()));
        return Ok(0);
    }

    if show {
        ui::header(&format!("# {}", path.display()));
        ui::dim(serde_yaml::to_string(settings)?.trim_end());
    } else {
        ui::status("Settings", &path.display().to_string());
    }
    Ok(0)
}
