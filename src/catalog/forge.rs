// Forge catalog: promotions for the version list and defaults, Maven metadata for builds

use std::collections::HashMap;

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::OnceCell;

use super::{DescribeMemo, VersionCatalog, http_failure, select_build};
use crate::error::{ProvisionError, ProvisionResult};
use crate::fetch::hash::Checksum;
use crate::fetch::http;
use crate::java::required_major;
use crate::mc_version::{McVersion, sort_newest_first};
use crate::model::{ArtifactSource, BuildDescriptor, BuildSelector, ServerType, VersionDescriptor};

#[derive(Debug, Deserialize)]
struct Promotions {
    promos: HashMap<String, String>,
}

/// Every `<version>` entry of a Maven metadata document.
pub fn parse_maven_versions(xml: &str) -> Vec<String> {
    xml.split("<version>")
        .skip(1)
        .filter_map(|rest| rest.split("</version>").next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

/// Whether a build matches a user-supplied Forge version.
///
/// Accepts the short form (`10.13.4.1614`), the coordinate suffix
/// (`10.13.4.1614-1.7.10`) or the full coordinate (`1.7.10-10.13.4.1614-1.7.10`).
fn build_matches(build: &BuildDescriptor, game_version: &str, wanted: &str) -> bool {
    let short = build.name.split('-').next().unwrap_or(&build.name);
    build.name == wanted || short == wanted || format!("{}-{}", game_version, build.name) == wanted
}

pub struct ForgeCatalog {
    client: Client,
    promotions_url: String,
    maven_url: String,
    promos: OnceCell<HashMap<String, String>>,
    coordinates: OnceCell<Vec<String>>,
    described: DescribeMemo,
}

impl ForgeCatalog {
    pub fn new(client: Client, promotions_url: &str, maven_url: &str) -> Self {
        Self {
            client,
            promotions_url: promotions_url.to_string(),
            maven_url: maven_url.trim_end_matches('/').to_string(),
            promos: OnceCell::new(),
            coordinates: OnceCell::new(),
            described: DescribeMemo::default(),
        }
    }

    async fn promos(&self) -> ProvisionResult<&HashMap<String, String>> {
        self.promos
            .get_or_try_init(|| async {
                let promotions: Promotions = http::fetch_json(&self.client, &self.promotions_url)
                    .await
                    .map_err(|e| http_failure(ServerType::Forge, None, e))?;
                Ok::<_, ProvisionError>(promotions.promos)
            })
            .await
    }

    async fn coordinates(&self) -> ProvisionResult<&[String]> {
        let coordinates = self
            .coordinates
            .get_or_try_init(|| async {
                let url = format!("{}/maven-metadata.xml", self.maven_url);
                let xml = http::fetch_text(&self.client, &url)
                    .await
                    .map_err(|e| http_failure(ServerType::Forge, None, e))?;
                let coordinates = parse_maven_versions(&xml);
                debug!("Forge maven metadata lists {} builds", coordinates.len());
                Ok::<_, ProvisionError>(coordinates)
            })
            .await?;
        Ok(coordinates.as_slice())
    }

    fn installer_url(&self, coordinate: &str) -> String {
        format!(
            "{}/{}/forge-{}-installer.jar",
            self.maven_url, coordinate, coordinate
        )
    }

    /// Maven publishes `<artifact>.sha1` next to each file; absent for some old builds.
    async fn installer_checksum(&self, url: &str) -> ProvisionResult<Option<Checksum>> {
        match http::fetch_text(&self.client, &format!("{}.sha1", url)).await {
            Ok(body) => Ok(body
                .split_whitespace()
                .next()
                .filter(|h| h.len() == 40)
                .map(Checksum::sha1)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(http_failure(ServerType::Forge, None, e)),
        }
    }
}

#[async_trait]
impl VersionCatalog for ForgeCatalog {
    fn server_type(&self) -> ServerType {
        ServerType::Forge
    }

    async fn list_versions(&self) -> ProvisionResult<Vec<VersionDescriptor>> {
        let mut versions: Vec<String> = self
            .promos()
            .await?
            .keys()
            .filter_map(|key| {
                key.strip_suffix("-latest")
                    .or_else(|| key.strip_suffix("-recommended"))
            })
            .map(str::to_string)
            .collect();
        sort_newest_first(&mut versions);
        versions.dedup();

        Ok(versions
            .into_iter()
            .map(|v| VersionDescriptor {
                required_java_major: required_major(&v),
                game_version: v,
                available_builds: Vec::new(),
            })
            .collect())
    }

    /// Builds are ordered by Forge version; their build number is the 1-based position.
    async fn describe(&self, game_version: &str) -> ProvisionResult<VersionDescriptor> {
        if let Some(cached) = self.described.get(game_version) {
            return Ok(cached);
        }

        let prefix = format!("{}-", game_version);
        let mut builds: Vec<(String, String)> = self
            .coordinates()
            .await?
            .iter()
            .filter_map(|coordinate| {
                coordinate
                    .strip_prefix(&prefix)
                    .map(|forge| (forge.to_string(), coordinate.clone()))
            })
            .collect();
        if builds.is_empty() {
            return Err(ProvisionError::version_not_found(ServerType::Forge, game_version));
        }

        builds.sort_by(|(a, _), (b, _)| {
            let short = |v: &str| McVersion::parse(v.split('-').next().unwrap_or(v));
            short(a).cmp(&short(b))
        });

        let available_builds = builds
            .into_iter()
            .enumerate()
            .map(|(index, (forge, coordinate))| BuildDescriptor {
                build_number: index as u32 + 1,
                name: forge,
                source: ArtifactSource::Download {
                    url: self.installer_url(&coordinate),
                    file_name: format!("forge-{}-installer.jar", coordinate),
                },
                checksum: None,
            })
            .collect();

        let descriptor = VersionDescriptor {
            game_version: game_version.to_string(),
            available_builds,
            required_java_major: required_major(game_version),
        };
        self.described.insert(descriptor.clone());
        Ok(descriptor)
    }

    /// `latest` follows the promotions `-latest` entry, else the highest listed build.
    async fn resolve_build(
        &self,
        game_version: &str,
        selector: &BuildSelector,
    ) -> ProvisionResult<BuildDescriptor> {
        let version = self.describe(game_version).await?;

        let wanted = match selector {
            BuildSelector::Named(name) => Some(name.clone()),
            BuildSelector::Latest => self
                .promos()
                .await?
                .get(&format!("{}-latest", game_version))
                .cloned(),
            BuildSelector::Number(_) => None,
        };

        let mut build = match &wanted {
            Some(wanted) => {
                let found = version
                    .available_builds
                    .iter()
                    .find(|b| build_matches(b, game_version, wanted))
                    .cloned();
                match (found, selector) {
                    (Some(build), _) => build,
                    // Promoted build missing from the Maven listing
                    (None, BuildSelector::Latest) => {
                        select_build(ServerType::Forge, &version, selector)?
                    }
                    (None, _) => {
                        return Err(ProvisionError::build_not_found(
                            ServerType::Forge,
                            game_version,
                            wanted,
                        ));
                    }
                }
            }
            None => select_build(ServerType::Forge, &version, selector)?,
        };

        if let ArtifactSource::Download { url, .. } = &build.source {
            build.checksum = self.installer_checksum(url).await?;
        }
        Ok(build)
    }
}
