// Version catalogs: one upstream adapter per server type, looked up through a registry

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::Client;

pub mod forge;
pub mod leaf;
pub mod paper;
pub mod paper_api;
pub mod spigot;
pub mod vanilla;

pub use forge::ForgeCatalog;
pub use leaf::LeafCatalog;
pub use paper::PaperCatalog;
pub use spigot::SpigotCatalog;
pub use vanilla::VanillaCatalog;

use crate::constants::{
    BUILDTOOLS_JENKINS_URL, FORGE_MAVEN_URL, FORGE_PROMOTIONS_URL, LEAF_API_URL,
    MOJANG_MANIFEST_URL, PAPER_API_URL, SPIGOT_VERSIONS_URL,
};
use crate::error::{ProvisionError, ProvisionResult};
use crate::fetch::http::HttpError;
use crate::model::{BuildDescriptor, BuildSelector, ServerType, VersionDescriptor};

/// Base URL of every upstream a catalog talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamUrls {
    pub mojang_manifest: String,
    pub paper_api: String,
    pub leaf_api: String,
    pub spigot_versions: String,
    pub buildtools_jenkins: String,
    pub forge_promotions: String,
    pub forge_maven: String,
}

impl Default for UpstreamUrls {
    fn default() -> Self {
        Self {
            mojang_manifest: MOJANG_MANIFEST_URL.to_string(),
            paper_api: PAPER_API_URL.to_string(),
            leaf_api: LEAF_API_URL.to_string(),
            spigot_versions: SPIGOT_VERSIONS_URL.to_string(),
            buildtools_jenkins: BUILDTOOLS_JENKINS_URL.to_string(),
            forge_promotions: FORGE_PROMOTIONS_URL.to_string(),
            forge_maven: FORGE_MAVEN_URL.to_string(),
        }
    }
}

/// Lists versions and resolves builds for one server type.
///
/// Implementations memoize upstream responses for their own lifetime, which is the
/// lifetime of the director that owns the registry.
#[async_trait]
pub trait VersionCatalog: Send + Sync {
    fn server_type(&self) -> ServerType;

    /// Known versions, newest first. Builds may be left empty and loaded by `describe`.
    async fn list_versions(&self) -> ProvisionResult<Vec<VersionDescriptor>>;

    /// One version with its builds populated.
    async fn describe(&self, game_version: &str) -> ProvisionResult<VersionDescriptor>;

    async fn resolve_build(
        &self,
        game_version: &str,
        selector: &BuildSelector,
    ) -> ProvisionResult<BuildDescriptor> {
        let version = self.describe(game_version).await?;
        select_build(self.server_type(), &version, selector)
    }
}

/// Pick a build out of a described version.
pub fn select_build(
    server_type: ServerType,
    version: &VersionDescriptor,
    selector: &BuildSelector,
) -> ProvisionResult<BuildDescriptor> {
    let found = match selector {
        BuildSelector::Latest => version.latest_build(),
        BuildSelector::Number(n) => version
            .available_builds
            .iter()
            .find(|b| b.build_number == *n),
        BuildSelector::Named(name) => version
            .available_builds
            .iter()
            .find(|b| b.name == *name),
    };

    found.cloned().ok_or_else(|| {
        ProvisionError::build_not_found(server_type, &version.game_version, selector)
    })
}

/// Map a metadata request failure; a 404 on a version-specific URL means the version is unknown.
pub(crate) fn http_failure(
    server_type: ServerType,
    version: Option<&str>,
    err: HttpError,
) -> ProvisionError {
    match version {
        Some(version) if err.is_not_found() => ProvisionError::version_not_found(server_type, version),
        _ => ProvisionError::upstream(server_type, err),
    }
}

/// Per-version memo of described versions.
#[derive(Default)]
pub(crate) struct DescribeMemo {
    entries: Mutex<HashMap<String, VersionDescriptor>>,
}

impl DescribeMemo {
    pub fn get(&self, game_version: &str) -> Option<VersionDescriptor> {
        self.entries
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(game_version)
            .cloned()
    }

    pub fn insert(&self, descriptor: VersionDescriptor) {
        self.entries
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(descriptor.game_version.clone(), descriptor);
    }
}

/// Catalog per server type, owned by one director.
pub struct CatalogRegistry {
    catalogs: HashMap<ServerType, Arc<dyn VersionCatalog>>,
}

impl CatalogRegistry {
    pub fn empty() -> Self {
        Self {
            catalogs: HashMap::new(),
        }
    }

    /// Registry with every built-in server type.
    pub fn new(client: Client, urls: &UpstreamUrls) -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(VanillaCatalog::new(
            client.clone(),
            &urls.mojang_manifest,
        )));
        registry.register(Arc::new(PaperCatalog::new(client.clone(), &urls.paper_api)));
        registry.register(Arc::new(SpigotCatalog::new(
            client.clone(),
            &urls.spigot_versions,
            &urls.buildtools_jenkins,
        )));
        registry.register(Arc::new(ForgeCatalog::new(
            client.clone(),
            &urls.forge_promotions,
            &urls.forge_maven,
        )));
        registry.register(Arc::new(LeafCatalog::new(client, &urls.leaf_api)));
        registry
    }

    pub fn register(&mut self, catalog: Arc<dyn VersionCatalog>) {
        self.catalogs.insert(catalog.server_type(), catalog);
    }

    pub fn get(&self, server_type: ServerType) -> Option<Arc<dyn VersionCatalog>> {
        self.catalogs.get(&server_type).cloned()
    }

    pub fn get_or_error(&self, server_type: ServerType) -> ProvisionResult<Arc<dyn VersionCatalog>> {
        self.get(server_type)
            .ok_or_else(|| ProvisionError::upstream(server_type, "no catalog registered"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ArtifactSource;

    fn build(number: u32) -> BuildDescriptor {
        BuildDescriptor {
            build_number: number,
            name: number.to_string(),
            source: ArtifactSource::Download {
                url: format!("https://example.com/{}.jar", number),
                file_name: format!("{}.jar", number),
            },
            checksum: None,
        }
    }

    fn version(builds: Vec<BuildDescriptor>) -> VersionDescriptor {
        VersionDescriptor {
            game_version: "1.21.8".to_string(),
            available_builds: builds,
            required_java_major: 21,
        }
    }

    #[test]
    fn test_latest_is_max_build_number() {
        // Upstreams are not guaranteed to list builds sorted
        let v = version(vec![build(12), build(60), build(7)]);
        let selected = select_build(ServerType::Paper, &v, &BuildSelector::Latest).unwrap();
        assert_eq!(selected.build_number, 60);
    }

    #[test]
    fn test_explicit_build() {
        let v = version(vec![build(1), build(2)]);
        let selected = select_build(ServerType::Paper, &v, &BuildSelector::Number(1)).unwrap();
        assert_eq!(selected.build_number, 1);

        let err = select_build(ServerType::Paper, &v, &BuildSelector::Number(99)).unwrap_err();
        assert!(matches!(err, ProvisionError::BuildNotFound { ref build, .. } if build == "99"));
    }

    #[test]
    fn test_no_builds_is_build_not_found() {
        let err = select_build(ServerType::Leaf, &version(vec![]), &BuildSelector::Latest)
            .unwrap_err();
        assert!(matches!(err, ProvisionError::BuildNotFound { .. }));
    }

    #[test]
    fn test_registry_has_every_type() {
        let registry = CatalogRegistry::new(Client::new(), &UpstreamUrls::default());
        for server_type in ServerType::ALL {
            assert_eq!(registry.get(server_type).unwrap().server_type(), server_type);
        }
    }
}
