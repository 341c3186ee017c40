// System command: host, Java, directory and disk report

#![allow(clippy::print_stdout)]

use std::path::Path;

use serde::Serialize;
use svforge::builder::BuildCache;
use svforge::director::available_space;
use svforge::java::JavaRuntimeResolver;
use svforge::model::JavaInstallation;

use crate::config::{Settings, config_path};
use crate::ui;

/// Version of the `system --json` format. Bump only on breaking changes.
pub const SCHEMA_VERSION: u32 = 1;

/// Below this much free space a Spigot build is likely to fail
const LOW_DISK_BYTES: u64 = 2 * 1024 * 1024 * 1024;

#[derive(Debug, Serialize)]
struct Issue {
    severity: String,
    code: String,
    message: String,
}

#[derive(Debug, Serialize)]
struct HostInfo {
    os: String,
    os_version: Option<String>,
    arch: String,
    total_memory_mb: u64,
    available_memory_mb: u64,
}

#[derive(Debug, Serialize)]
struct DirectoriesInfo {
    config_file: String,
    servers: String,
    cache: String,
}

#[derive(Debug, Serialize)]
struct DiskInfo {
    path: String,
    free_bytes: Option<u64>,
}

#[derive(Debug, Serialize)]
struct SystemReport {
    schema_version: u32,
    status: String,
    host: HostInfo,
    java: Vec<JavaInstallation>,
    directories: DirectoriesInfo,
    cache_entries: usize,
    disk: DiskInfo,
    issues: Vec<Issue>,
}

fn host_info() -> HostInfo {
    let mut system = sysinfo::System::new();
    system.refresh_memory();
    HostInfo {
        os: sysinfo::System::name().unwrap_or_else(|| std::env::consts::OS.to_string()),
        os_version: sysinfo::System::os_version(),
        arch: std::env::consts::ARCH.to_string(),
        total_memory_mb: system.total_memory() / (1024 * 1024),
        available_memory_mb: system.available_memory() / (1024 * 1024),
    }
}

/// Free space for `dir`, measured at its closest existing ancestor.
fn disk_info(dir: &Path) -> DiskInfo {
    let probe = dir
        .ancestors()
        .find(|p| p.exists())
        .unwrap_or(dir);
    let absolute = std::path::absolute(probe).unwrap_or_else(|_| probe.to_path_buf());
    DiskInfo {
        path: dir.display().to_string(),
        free_bytes: available_space(&absolute),
    }
}

pub async fn system(json: bool, settings: &Settings) -> anyhow::Result<i32> {
    let java = JavaRuntimeResolver::scan_only(settings.java_search())
        .installations()
        .await;
    let cache_entries = BuildCache::new(&settings.cache.directory).list()?.len();
    let disk = disk_info(&settings.servers.directory);

    let mut issues = Vec::new();
    if java.is_empty() {
        issues.push(Issue {
            severity: "warning".to_string(),
            code: "JAVA_MISSING".to_string(),
            message: if settings.java.auto_install {
                "No Java runtime found; one will be installed on first use".to_string()
            } else {
                "No Java runtime found and auto-install is disabled".to_string()
            },
        });
    }
    if let Some(free) = disk.free_bytes
        && free < LOW_DISK_BYTES
    {
        issues.push(Issue {
            severity: "warning".to_string(),
            code: "LOW_DISK_SPACE".to_string(),
            message: format!("Only {} MB free for server installs", free / (1024 * 1024)),
        });
    }

    let report = SystemReport {
        schema_version: SCHEMA_VERSION,
        status: if issues.is_empty() { "ok" } else { "warning" }.to_string(),
        host: host_info(),
        java,
        directories: DirectoriesInfo {
            config_file: config_path().display().to_string(),
            servers: settings.servers.directory.display().to_string(),
            cache: settings.cache.directory.display().to_string(),
        },
        cache_entries,
        disk,
        issues,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        output_human_readable(&report);
    }
    Ok(0)
}

fn output_human_readable(report: &SystemReport) {
    ui::header("Host");
    ui::status(
        "OS",
        &format!(
            "{} {} ({})",
            report.host.os,
            report.host.os_version.as_deref().unwrap_or(""),
            report.host.arch
        ),
    );
    ui::status(
        "Memory",
        &format!(
            "{} MB free of {} MB",
            report.host.available_memory_mb, report.host.total_memory_mb
        ),
    );

    ui::header("\nJava");
    if report.java.is_empty() {
        ui::dim("  none found");
    }
    for java in &report.java {
        let managed = if java.is_managed { " (managed)" } else { "" };
        ui::status(
            &format!("Java {}", java.major_version),
            &format!("{}{}", java.executable_path.display(), managed),
        );
    }

    ui::header("\nDirectories");
    ui::status("Settings", &report.directories.config_file);
    ui::status("Servers", &report.directories.servers);
    ui::status(
        "Cache",
        &format!(
            "{} ({} Spigot build(s))",
            report.directories.cache, report.cache_entries
        ),
    );
    match report.disk.free_bytes {
        Some(free) => ui::status("Free", &format!("{} MB", free / (1024 * 1024))),
        None => ui::status("Free", "unknown"),
    }

    if !report.issues.is_empty() {
        println!();
        for issue in &report.issues {
            ui::warning(&issue.message);
        }
    }
}
