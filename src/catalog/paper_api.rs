// Client for PaperMC-style v2 build APIs (Paper itself and Leaf)

use log::debug;
use reqwest::Client;
use serde::Deserialize;

use crate::fetch::hash::Checksum;
use crate::fetch::http::{self, HttpError};
use crate::model::{ArtifactSource, BuildDescriptor};

#[derive(Debug, Deserialize)]
struct ProjectResponse {
    versions: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct BuildsResponse {
    #[serde(default)]
    builds: Vec<BuildEntry>,
}

#[derive(Debug, Deserialize)]
struct BuildEntry {
    build: u32,
    #[serde(default)]
    downloads: Option<Downloads>,
}

#[derive(Debug, Deserialize)]
struct Downloads {
    application: Option<Application>,
}

#[derive(Debug, Deserialize)]
struct Application {
    name: String,
    #[serde(default)]
    sha256: Option<String>,
}

/// `/projects/{project}` and `/projects/{project}/versions/{v}/builds` of one API.
pub struct PaperStyleApi {
    client: Client,
    base_url: String,
    project: &'static str,
}

impl PaperStyleApi {
    pub fn new(client: Client, base_url: &str, project: &'static str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            project,
        }
    }

    pub fn project(&self) -> &'static str {
        self.project
    }

    fn project_url(&self) -> String {
        format!("{}/projects/{}", self.base_url, self.project)
    }

    pub fn version_url(&self, game_version: &str) -> String {
        format!("{}/versions/{}", self.project_url(), game_version)
    }

    /// Game versions, newest first. The API lists them oldest first.
    pub async fn versions(&self) -> Result<Vec<String>, HttpError> {
        let project: ProjectResponse = http::fetch_json(&self.client, &self.project_url()).await?;
        debug!("{} lists {} versions", self.project, project.versions.len());
        Ok(project.versions.into_iter().rev().collect())
    }

    /// Builds of `game_version`, ascending by build number.
    pub async fn builds(&self, game_version: &str) -> Result<Vec<BuildDescriptor>, HttpError> {
        let url = format!("{}/builds", self.version_url(game_version));
        let response: BuildsResponse = http::fetch_json(&self.client, &url).await?;

        let mut builds: Vec<BuildDescriptor> = response
            .builds
            .into_iter()
            .map(|entry| {
                let application = entry.downloads.and_then(|d| d.application);
                let file_name = application
                    .as_ref()
                    .map(|a| a.name.clone())
                    .unwrap_or_else(|| format!("{}-{}-{}.jar", self.project, game_version, entry.build));
                let checksum = application
                    .and_then(|a| a.sha256)
                    .filter(|h| !h.is_empty())
                    .map(Checksum::sha256);

                BuildDescriptor {
                    build_number: entry.build,
                    name: entry.build.to_string(),
                    source: ArtifactSource::Download {
                        url: self.download_url(game_version, &entry.build.to_string(), &file_name),
                        file_name,
                    },
                    checksum,
                }
            })
            .collect();

        builds.sort_by_key(|b| b.build_number);
        Ok(builds)
    }

    pub fn download_url(&self, game_version: &str, build: &str, file_name: &str) -> String {
        format!(
            "{}/builds/{}/downloads/{}",
            self.version_url(game_version),
            build,
            file_name
        )
    }
}
