// Paper catalog

use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::OnceCell;

use super::paper_api::PaperStyleApi;
use super::{DescribeMemo, VersionCatalog, http_failure};
use crate::error::{ProvisionError, ProvisionResult};
use crate::java::required_major;
use crate::model::{ServerType, VersionDescriptor};

pub struct PaperCatalog {
    api: PaperStyleApi,
    versions: OnceCell<Vec<String>>,
    described: DescribeMemo,
}

impl PaperCatalog {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            api: PaperStyleApi::new(client, base_url, "paper"),
            versions: OnceCell::new(),
            described: DescribeMemo::default(),
        }
    }

    async fn versions(&self) -> ProvisionResult<&[String]> {
        let versions = self
            .versions
            .get_or_try_init(|| async {
                self.api
                    .versions()
                    .await
                    .map_err(|e| http_failure(ServerType::Paper, None, e))
            })
            .await?;
        Ok(versions.as_slice())
    }
}

#[async_trait]
impl VersionCatalog for PaperCatalog {
    fn server_type(&self) -> ServerType {
        ServerType::Paper
    }

    async fn list_versions(&self) -> ProvisionResult<Vec<VersionDescriptor>> {
        Ok(self
            .versions()
            .await?
            .iter()
            .map(|v| VersionDescriptor {
                game_version: v.clone(),
                available_builds: Vec::new(),
                required_java_major: required_major(v),
            })
            .collect())
    }

    async fn describe(&self, game_version: &str) -> ProvisionResult<VersionDescriptor> {
        if let Some(cached) = self.described.get(game_version) {
            return Ok(cached);
        }
        if !self.versions().await?.iter().any(|v| v == game_version) {
            return Err(ProvisionError::version_not_found(ServerType::Paper, game_version));
        }

        let builds = self
            .api
            .builds(game_version)
            .await
            .map_err(|e| http_failure(ServerType::Paper, Some(game_version), e))?;

        let descriptor = VersionDescriptor {
            game_version: game_version.to_string(),
            available_builds: builds,
            required_java_major: required_major(game_version),
        };
        self.described.insert(descriptor.clone());
        Ok(descriptor)
    }
}
