// Provisioner for types served as a ready-made jar (Vanilla, Paper, Leaf)

use std::path::PathBuf;

use async_trait::async_trait;

use super::{ProvisionContext, ServerProvisioner, staged_path, unsupported_source};
use crate::error::ProvisionResult;
use crate::model::{ArtifactSource, ServerType};

pub struct DownloadProvisioner {
    server_type: ServerType,
}

impl DownloadProvisioner {
    pub fn new(server_type: ServerType) -> Self {
        Self { server_type }
    }
}

#[async_trait]
impl ServerProvisioner for DownloadProvisioner {
    fn server_type(&self) -> ServerType {
        self.server_type
    }

    async fn acquire(&self, ctx: &ProvisionContext<'_>) -> ProvisionResult<PathBuf> {
        let ArtifactSource::Download { url, file_name } = &ctx.build.source else {
            return Err(unsupported_source(self.server_type, ctx.build));
        };

        let dest = staged_path(self.server_type, ctx.staging, file_name)?;
        ctx.reporter.step(&format!("Downloading {}", file_name));
        ctx.fetcher
            .fetch(url, &dest, ctx.build.checksum.as_ref(), ctx.reporter)
            .await?;
        Ok(dest)
    }
}
