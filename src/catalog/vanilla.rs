// Vanilla catalog backed by Mojang's version manifest

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::OnceCell;

use super::{VersionCatalog, http_failure};
use crate::error::{ProvisionError, ProvisionResult};
use crate::fetch::hash::Checksum;
use crate::fetch::http;
use crate::java::required_major;
use crate::model::{ArtifactSource, BuildDescriptor, BuildSelector, ServerType, VersionDescriptor};

#[derive(Debug, Deserialize)]
struct Manifest {
    versions: Vec<ManifestEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct ManifestEntry {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    url: String,
}

#[derive(Debug, Deserialize)]
struct VersionDetail {
    downloads: Downloads,
}

#[derive(Debug, Deserialize)]
struct Downloads {
    server: Option<ServerDownload>,
}

#[derive(Debug, Deserialize)]
struct ServerDownload {
    sha1: String,
    url: String,
}

pub struct VanillaCatalog {
    client: Client,
    manifest_url: String,
    releases: OnceCell<Vec<ManifestEntry>>,
}

impl VanillaCatalog {
    pub fn new(client: Client, manifest_url: &str) -> Self {
        Self {
            client,
            manifest_url: manifest_url.to_string(),
            releases: OnceCell::new(),
        }
    }

    /// Release entries in manifest order (newest first); snapshots are skipped.
    async fn releases(&self) -> ProvisionResult<&[ManifestEntry]> {
        let releases = self
            .releases
            .get_or_try_init(|| async {
                let manifest: Manifest = http::fetch_json(&self.client, &self.manifest_url)
                    .await
                    .map_err(|e| http_failure(ServerType::Vanilla, None, e))?;
                debug!("Mojang manifest lists {} versions", manifest.versions.len());
                Ok::<_, ProvisionError>(
                    manifest
                        .versions
                        .into_iter()
                        .filter(|v| v.kind == "release")
                        .collect(),
                )
            })
            .await?;
        Ok(releases.as_slice())
    }

    async fn entry(&self, game_version: &str) -> ProvisionResult<ManifestEntry> {
        self.releases()
            .await?
            .iter()
            .find(|e| e.id == game_version)
            .cloned()
            .ok_or_else(|| ProvisionError::version_not_found(ServerType::Vanilla, game_version))
    }
}

fn descriptor(game_version: &str) -> VersionDescriptor {
    VersionDescriptor {
        game_version: game_version.to_string(),
        available_builds: Vec::new(),
        required_java_major: required_major(game_version),
    }
}

#[async_trait]
impl VersionCatalog for VanillaCatalog {
    fn server_type(&self) -> ServerType {
        ServerType::Vanilla
    }

    async fn list_versions(&self) -> ProvisionResult<Vec<VersionDescriptor>> {
        Ok(self
            .releases()
            .await?
            .iter()
            .map(|e| descriptor(&e.id))
            .collect())
    }

    async fn describe(&self, game_version: &str) -> ProvisionResult<VersionDescriptor> {
        let entry = self.entry(game_version).await?;
        Ok(descriptor(&entry.id))
    }

    /// Vanilla has exactly one artifact per version, so only `latest` resolves.
    async fn resolve_build(
        &self,
        game_version: &str,
        selector: &BuildSelector,
    ) -> ProvisionResult<BuildDescriptor> {
        let entry = self.entry(game_version).await?;
        if *selector != BuildSelector::Latest {
            return Err(ProvisionError::build_not_found(
                ServerType::Vanilla,
                game_version,
                selector,
            ));
        }

        let detail: VersionDetail = http::fetch_json(&self.client, &entry.url)
            .await
            .map_err(|e| http_failure(ServerType::Vanilla, None, e))?;
        let server = detail.downloads.server.ok_or_else(|| {
            ProvisionError::build_not_found(ServerType::Vanilla, game_version, "server jar")
        })?;

        Ok(BuildDescriptor {
            build_number: 0,
            name: entry.id.clone(),
            source: ArtifactSource::Download {
                url: server.url,
                file_name: format!("minecraft_server.{}.jar", entry.id),
            },
            checksum: Some(Checksum::sha1(server.sha1)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn manifest(server: &MockServer) -> serde_json::Value {
        json!({
            "latest": { "release": "1.21.8", "snapshot": "25w31a" },
            "versions": [
                { "id": "25w31a", "type": "snapshot", "url": server.url("/v/25w31a.json") },
                { "id": "1.21.8", "type": "release", "url": server.url("/v/1.21.8.json") },
                { "id": "1.7.10", "type": "release", "url": server.url("/v/1.7.10.json") },
                { "id": "a1.0.16", "type": "old_alpha", "url": server.url("/v/a1.0.16.json") }
            ]
        })
    }

    #[tokio::test]
    async fn test_lists_releases_newest_first_and_memoizes() {
        let server = MockServer::start_async().await;
        let body = manifest(&server);
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/manifest.json");
                then.status(200).json_body(body);
            })
            .await;

        let catalog = VanillaCatalog::new(Client::new(), &server.url("/manifest.json"));
        let versions = catalog.list_versions().await.unwrap();
        let ids: Vec<&str> = versions.iter().map(|v| v.game_version.as_str()).collect();
        assert_eq!(ids, vec!["1.21.8", "1.7.10"]);
        assert_eq!(versions[1].required_java_major, 8);

        catalog.list_versions().await.unwrap();
        catalog.describe("1.21.8").await.unwrap();
        assert_eq!(mock.hits_async().await, 1);
    }

    #[tokio::test]
    async fn test_resolves_server_download_with_sha1() {
        let server = MockServer::start_async().await;
        let body = manifest(&server);
        server
            .mock_async(|when, then| {
                when.method(GET).path("/manifest.json");
                then.status(200).json_body(body);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v/1.21.8.json");
                then.status(200).json_body(json!({
                    "id": "1.21.8",
                    "downloads": {
                        "server": {
                            "sha1": "6BCE4EF400E4EFAA63A13D5E6F6B500BE969EF81",
                            "size": 57555044,
                            "url": "https://piston-data.mojang.com/v1/objects/6bce/server.jar"
                        }
                    }
                }));
            })
            .await;

        let catalog = VanillaCatalog::new(Client::new(), &server.url("/manifest.json"));
        let build = catalog
            .resolve_build("1.21.8", &BuildSelector::Latest)
            .await
            .unwrap();

        assert_eq!(
            build.source,
            ArtifactSource::Download {
                url: "https://piston-data.mojang.com/v1/objects/6bce/server.jar".to_string(),
                file_name: "minecraft_server.1.21.8.jar".to_string(),
            }
        );
        assert_eq!(
            build.checksum,
            Some(Checksum::sha1("6bce4ef400e4efaa63a13d5e6f6b500be969ef81"))
        );
    }

    #[tokio::test]
    async fn test_unknown_version_and_numbered_build() {
        let server = MockServer::start_async().await;
        let body = manifest(&server);
        server
            .mock_async(|when, then| {
                when.method(GET).path("/manifest.json");
                then.status(200).json_body(body);
            })
            .await;

        let catalog = VanillaCatalog::new(Client::new(), &server.url("/manifest.json"));
        let err = catalog.describe("25w31a").await.unwrap_err();
        assert!(matches!(err, ProvisionError::VersionNotFound { .. }));

        let err = catalog
            .resolve_build("1.21.8", &BuildSelector::Number(3))
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::BuildNotFound { .. }));
    }

    #[tokio::test]
    async fn test_malformed_manifest_is_upstream_unavailable() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/manifest.json");
                then.status(200).body("<html>maintenance</html>");
            })
            .await;

        let catalog = VanillaCatalog::new(Client::new(), &server.url("/manifest.json"));
        let err = catalog.list_versions().await.unwrap_err();
        assert!(matches!(
            err,
            ProvisionError::UpstreamUnavailable {
                server_type: ServerType::Vanilla,
                ..
            }
        ));
    }
}
