// Leaf catalog: Paper-style API, with direct downloads for versions published without builds

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use tokio::sync::OnceCell;

use super::paper_api::PaperStyleApi;
use super::{DescribeMemo, VersionCatalog, http_failure};
use crate::error::{ProvisionError, ProvisionResult};
use crate::java::required_major;
use crate::model::{ArtifactSource, BuildDescriptor, ServerType, VersionDescriptor};

pub struct LeafCatalog {
    api: PaperStyleApi,
    versions: OnceCell<Vec<String>>,
    described: DescribeMemo,
}

impl LeafCatalog {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            api: PaperStyleApi::new(client, base_url, "leaf"),
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
                    .map_err(|e| http_failure(ServerType::Leaf, None, e))
            })
            .await?;
        Ok(versions.as_slice())
    }

    /// The `builds/latest` direct link older Leaf versions are served from.
    fn legacy_build(&self, game_version: &str) -> BuildDescriptor {
        BuildDescriptor {
            build_number: 0,
            name: "latest".to_string(),
            source: ArtifactSource::Download {
                url: self.api.download_url(
                    game_version,
                    "latest",
                    &format!("leaf-{}.jar", game_version),
                ),
                file_name: format!("leaf-{}-latest.jar", game_version),
            },
            checksum: None,
        }
    }
}

#[async_trait]
impl VersionCatalog for LeafCatalog {
    fn server_type(&self) -> ServerType {
        ServerType::Leaf
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
            return Err(ProvisionError::version_not_found(ServerType::Leaf, game_version));
        }

        let builds = match self.api.builds(game_version).await {
            Ok(builds) if !builds.is_empty() => builds,
            Ok(_) => {
                debug!("Leaf {} has no numbered builds, using direct download", game_version);
                vec![self.legacy_build(game_version)]
            }
            Err(e) if e.is_not_found() => {
                debug!("Leaf {} has no build listing, using direct download", game_version);
                vec![self.legacy_build(game_version)]
            }
            Err(e) => return Err(http_failure(ServerType::Leaf, Some(game_version), e)),
        };

        let descriptor = VersionDescriptor {
            game_version: game_version.to_string(),
            available_builds: builds,
            required_java_major: required_major(game_version),
        };
        self.described.insert(descriptor.clone());
        Ok(descriptor)
    }
}
