// Forge provisioner: download the installer, run it headless, find what it produced

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::{debug, info};

use super::{LaunchTarget, ProvisionContext, ServerProvisioner, staged_path, unsupported_source};
use crate::error::{ProvisionError, ProvisionResult};
use crate::model::{ArtifactSource, ServerType};
use crate::process::ScopedProcess;

pub struct ForgeProvisioner;

/// `libraries/net/minecraftforge/forge/<coordinate>/unix_args.txt`, written by 1.17+ installers.
fn find_args_file(server_dir: &Path) -> Option<PathBuf> {
    let forge_libs = server_dir
        .join("libraries")
        .join("net")
        .join("minecraftforge")
        .join("forge");
    let mut candidates: Vec<PathBuf> = std::fs::read_dir(&forge_libs)
        .ok()?
        .flatten()
        .map(|e| e.path().join("unix_args.txt"))
        .filter(|p| p.is_file())
        .collect();
    candidates.sort();
    candidates.pop()
}

/// The launchable jar older installers leave in the server directory.
fn find_server_jar(server_dir: &Path) -> Option<PathBuf> {
    let mut jars: Vec<PathBuf> = std::fs::read_dir(server_dir)
        .ok()?
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .map(|n| n.to_string_lossy())
                .is_some_and(|n| n.starts_with("forge-") && n.ends_with(".jar") && !n.contains("installer"))
        })
        .collect();
    jars.sort();
    jars.into_iter().next()
}

fn relative_to(path: &Path, base: &Path) -> PathBuf {
    path.strip_prefix(base)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| path.to_path_buf())
}

#[async_trait]
impl ServerProvisioner for ForgeProvisioner {
    fn server_type(&self) -> ServerType {
        ServerType::Forge
    }

    async fn acquire(&self, ctx: &ProvisionContext<'_>) -> ProvisionResult<PathBuf> {
        let ArtifactSource::Download { url, file_name } = &ctx.build.source else {
            return Err(unsupported_source(ServerType::Forge, ctx.build));
        };

        let dest = staged_path(ServerType::Forge, ctx.staging, file_name)?;
        ctx.reporter.step(&format!("Downloading {}", file_name));
        ctx.fetcher
            .fetch(url, &dest, ctx.build.checksum.as_ref(), ctx.reporter)
            .await?;
        Ok(dest)
    }

    async fn install(
        &self,
        ctx: &ProvisionContext<'_>,
        installer: PathBuf,
    ) -> ProvisionResult<LaunchTarget> {
        ctx.reporter.step(&format!(
            "Running Forge {} installer (this can take a few minutes)",
            ctx.build.name
        ));
        info!("Running Forge installer {:?}", installer);

        let tail = ScopedProcess::new(&ctx.java.executable_path, ctx.installer_timeout)
            .arg("-jar")
            .arg(installer.display().to_string())
            .arg("--installServer")
            .current_dir(ctx.staging)
            .label("Forge installer")
            .run(ctx.reporter)
            .await?
            .require_success("Forge installer")?;

        for leftover in [installer.clone(), PathBuf::from(format!("{}.log", installer.display()))] {
            match std::fs::remove_file(&leftover) {
                Ok(()) => debug!("Removed {:?}", leftover),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(ProvisionError::io(&leftover, e)),
            }
        }

        if let Some(args) = find_args_file(ctx.staging) {
            return Ok(LaunchTarget::ArgsFile(relative_to(&args, ctx.staging)));
        }
        if let Some(jar) = find_server_jar(ctx.staging) {
            return Ok(LaunchTarget::Jar(relative_to(&jar, ctx.staging)));
        }

        let mut output_tail = tail;
        output_tail.push("installer finished but produced no server jar or unix_args.txt".to_string());
        Err(ProvisionError::BuildToolFailed {
            tool: "Forge installer".to_string(),
            exit_code: Some(0),
            output_tail,
        })
    }
}
