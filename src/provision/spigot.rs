// Spigot provisioner: jar comes from the BuildTools cache

use std::path::PathBuf;

use async_trait::async_trait;

use super::{ProvisionContext, ServerProvisioner, unsupported_source};
use crate::builder::cache::spigot_jar_name;
use crate::error::{ProvisionError, ProvisionResult};
use crate::model::{ArtifactSource, ServerType};

pub struct SpigotProvisioner;

#[async_trait]
impl ServerProvisioner for SpigotProvisioner {
    fn server_type(&self) -> ServerType {
        ServerType::Spigot
    }

    async fn acquire(&self, ctx: &ProvisionContext<'_>) -> ProvisionResult<PathBuf> {
        let ArtifactSource::BuildTools { revision, tool_url } = &ctx.build.source else {
            return Err(unsupported_source(ServerType::Spigot, ctx.build));
        };
        let game_version = &ctx.request.game_version;

        let outcome = ctx
            .builder
            .build(
                game_version,
                *revision,
                tool_url,
                ctx.java,
                ctx.fetcher,
                ctx.reporter,
            )
            .await?;

        let dest = ctx.staging.join(spigot_jar_name(game_version));
        tokio::fs::copy(&outcome.artifact.jar_path, &dest)
            .await
            .map_err(|e| ProvisionError::io(&dest, e))?;
        Ok(dest)
    }
}
