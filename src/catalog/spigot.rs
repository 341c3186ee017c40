// Spigot catalog: hub.spigotmc.org version index plus BuildTools Jenkins metadata

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::OnceCell;

use super::{DescribeMemo, VersionCatalog, http_failure};
use crate::error::{ProvisionError, ProvisionResult};
use crate::fetch::http;
use crate::java::required_major;
use crate::mc_version::{McVersion, sort_newest_first};
use crate::model::{ArtifactSource, BuildDescriptor, ServerType, VersionDescriptor};

/// `<versions>/<v>.json`; `name` is the Spigot build number
#[derive(Debug, Deserialize)]
struct SpigotVersionInfo {
    name: String,
}

#[derive(Debug, Deserialize)]
struct JenkinsBuild {
    number: u32,
}

pub struct SpigotCatalog {
    client: Client,
    versions_url: String,
    jenkins_url: String,
    versions: OnceCell<Vec<String>>,
    revision: OnceCell<u32>,
    described: DescribeMemo,
}

/// Release versions linked from the index page (`href="1.21.8.json"`).
///
/// The index also carries numeric build aliases and `latest`; those are skipped.
pub fn parse_version_index(html: &str) -> Vec<String> {
    let mut versions: Vec<String> = html
        .split("href=\"")
        .skip(1)
        .filter_map(|rest| rest.split('"').next())
        .filter_map(|target| target.strip_suffix(".json"))
        .filter(|name| {
            name.contains('.')
                && McVersion::parse(name).is_some_and(|v| v.as_str() == *name)
        })
        .map(str::to_string)
        .collect();

    sort_newest_first(&mut versions);
    versions.dedup();
    versions
}

impl SpigotCatalog {
    pub fn new(client: Client, versions_url: &str, jenkins_url: &str) -> Self {
        Self {
            client,
            versions_url: versions_url.trim_end_matches('/').to_string(),
            jenkins_url: jenkins_url.trim_end_matches('/').to_string(),
            versions: OnceCell::new(),
            revision: OnceCell::new(),
            described: DescribeMemo::default(),
        }
    }

    async fn versions(&self) -> ProvisionResult<&[String]> {
        let versions = self
            .versions
            .get_or_try_init(|| async {
                let index = http::fetch_text(&self.client, &format!("{}/", self.versions_url))
                    .await
                    .map_err(|e| http_failure(ServerType::Spigot, None, e))?;
                let versions = parse_version_index(&index);
                if versions.is_empty() {
                    return Err(ProvisionError::upstream(
                        ServerType::Spigot,
                        "version index lists no releases",
                    ));
                }
                Ok::<_, ProvisionError>(versions)
            })
            .await?;
        Ok(versions.as_slice())
    }

    /// Revision of the last successful BuildTools build; part of the cache key.
    async fn buildtools_revision(&self) -> ProvisionResult<u32> {
        let revision = self
            .revision
            .get_or_try_init(|| async {
                let build: JenkinsBuild =
                    http::fetch_json(
                        &self.client,
                        &format!("{}/lastSuccessfulBuild/api/json", self.jenkins_url),
                    )
                        .await
                        .map_err(|e| http_failure(ServerType::Spigot, None, e))?;
                debug!("BuildTools revision is {}", build.number);
                Ok::<_, ProvisionError>(build.number)
            })
            .await?;
        Ok(*revision)
    }

    /// BuildTools.jar of exactly `revision`, so the cache key matches the tool that ran.
    fn tool_url(&self, revision: u32) -> String {
        format!("{}/{}/artifact/target/BuildTools.jar", self.jenkins_url, revision)
    }
}

#[async_trait]
impl VersionCatalog for SpigotCatalog {
    fn server_type(&self) -> ServerType {
        ServerType::Spigot
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
            return Err(ProvisionError::version_not_found(ServerType::Spigot, game_version));
        }

        let info: SpigotVersionInfo = http::fetch_json(
            &self.client,
            &format!("{}/{}.json", self.versions_url, game_version),
        )
        .await
        .map_err(|e| http_failure(ServerType::Spigot, Some(game_version), e))?;
        let build_number: u32 = info.name.trim().parse().map_err(|_| {
            ProvisionError::upstream(
                ServerType::Spigot,
                format!("build name '{}' for {} is not a number", info.name, game_version),
            )
        })?;
        let revision = self.buildtools_revision().await?;

        let descriptor = VersionDescriptor {
            game_version: game_version.to_string(),
            available_builds: vec![BuildDescriptor {
                build_number,
                name: build_number.to_string(),
                source: ArtifactSource::BuildTools {
                    revision,
                    tool_url: self.tool_url(revision),
                },
                checksum: None,
            }],
            required_java_major: required_major(game_version),
        };
        self.described.insert(descriptor.clone());
        Ok(descriptor)
    }
}
