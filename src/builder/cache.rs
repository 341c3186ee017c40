// On-disk cache of BuildTools output keyed by (game version, BuildTools revision)

use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::Utc;
use log::{debug, warn};

use crate::constants::CACHE_ARTIFACT_FILE;
use crate::error::{ProvisionError, ProvisionResult};
use crate::model::CachedBuildArtifact;

/// True when `path` opens as a non-empty zip archive.
pub fn is_valid_jar(path: &Path) -> bool {
    let Ok(file) = File::open(path) else {
        return false;
    };
    match zip::ZipArchive::new(file) {
        Ok(archive) => !archive.is_empty(),
        Err(e) => {
            debug!("{:?} is not a readable jar: {}", path, e);
            false
        }
    }
}

pub fn spigot_jar_name(game_version: &str) -> String {
    format!("spigot-{}.jar", game_version)
}

/// `<root>/spigot/<gameVersion>/bt<revision>/{spigot-<v>.jar, artifact.toml}`
#[derive(Debug, Clone)]
pub struct BuildCache {
    root: PathBuf,
}

impl BuildCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn spigot_dir(&self) -> PathBuf {
        self.root.join("spigot")
    }

    pub fn entry_dir(&self, game_version: &str, revision: u32) -> PathBuf {
        self.spigot_dir()
            .join(game_version)
            .join(format!("bt{}", revision))
    }

    pub fn lock_path(&self, game_version: &str, revision: u32) -> PathBuf {
        self.spigot_dir()
            .join(game_version)
            .join(format!("bt{}.lock", revision))
    }

    fn read_entry(dir: &Path) -> Option<CachedBuildArtifact> {
        let content = std::fs::read_to_string(dir.join(CACHE_ARTIFACT_FILE)).ok()?;
        match toml::from_str::<CachedBuildArtifact>(&content) {
            Ok(artifact) => Some(artifact),
            Err(e) => {
                warn!("Ignoring unreadable cache metadata in {:?}: {}", dir, e);
                None
            }
        }
    }

    /// A usable cached jar, or `None` when missing or failing validation.
    pub fn lookup(&self, game_version: &str, revision: u32) -> Option<CachedBuildArtifact> {
        let dir = self.entry_dir(game_version, revision);
        let artifact = Self::read_entry(&dir)?;
        if !is_valid_jar(&artifact.jar_path) {
            warn!(
                "Cached jar {:?} is missing or corrupt, rebuilding",
                artifact.jar_path
            );
            return None;
        }
        debug!("Cache hit for Spigot {} (BuildTools #{})", game_version, revision);
        Some(artifact)
    }

    /// Copy `built_jar` into the entry for the key and record it.
    pub fn store(
        &self,
        game_version: &str,
        revision: u32,
        built_jar: &Path,
    ) -> ProvisionResult<CachedBuildArtifact> {
        let dir = self.entry_dir(game_version, revision);
        std::fs::create_dir_all(&dir).map_err(|e| ProvisionError::io(&dir, e))?;

        let jar_path = dir.join(spigot_jar_name(game_version));
        let tmp_jar = dir.join(format!(".{}.tmp", spigot_jar_name(game_version)));
        std::fs::copy(built_jar, &tmp_jar).map_err(|e| ProvisionError::io(&tmp_jar, e))?;
        std::fs::rename(&tmp_jar, &jar_path).map_err(|e| ProvisionError::io(&jar_path, e))?;

        let artifact = CachedBuildArtifact {
            game_version: game_version.to_string(),
            build_tool_revision: revision,
            jar_path,
            created_at: Utc::now(),
        };
        let toml = toml::to_string_pretty(&artifact)
            .map_err(|e| ProvisionError::io(&dir, std::io::Error::other(e)))?;
        let meta_path = dir.join(CACHE_ARTIFACT_FILE);
        let tmp_meta = dir.join(format!(".{}.tmp", CACHE_ARTIFACT_FILE));
        std::fs::write(&tmp_meta, toml).map_err(|e| ProvisionError::io(&tmp_meta, e))?;
        std::fs::rename(&tmp_meta, &meta_path).map_err(|e| ProvisionError::io(&meta_path, e))?;

        debug!("Cached Spigot {} at {:?}", game_version, artifact.jar_path);
        Ok(artifact)
    }

    /// Every recorded entry, sorted by version then revision.
    pub fn list(&self) -> ProvisionResult<Vec<CachedBuildArtifact>> {
        let spigot = self.spigot_dir();
        let versions = match std::fs::read_dir(&spigot) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ProvisionError::io(&spigot, e)),
        };

        let mut artifacts = Vec::new();
        for version_dir in versions.flatten().map(|e| e.path()).filter(|p| p.is_dir()) {
            let Ok(revisions) = std::fs::read_dir(&version_dir) else {
                continue;
            };
            artifacts.extend(
                revisions
                    .flatten()
                    .map(|e| e.path())
                    .filter(|p| p.is_dir())
                    .filter_map(|p| Self::read_entry(&p)),
            );
        }

        artifacts.sort_by(|a, b| {
            (&a.game_version, a.build_tool_revision).cmp(&(&b.game_version, b.build_tool_revision))
        });
        Ok(artifacts)
    }

    /// Remove every cached build; returns how many entries were recorded.
    pub fn clear(&self) -> ProvisionResult<usize> {
        let count = self.list()?.len();
        let spigot = self.spigot_dir();
        match std::fs::remove_dir_all(&spigot) {
            Ok(()) => Ok(count),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(ProvisionError::io(&spigot, e)),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jar_validation() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.jar");
        let bad = dir.path().join("bad.jar");
        testing::write_jar(&good, "org.bukkit.craftbukkit.Main");
        std::fs::write(&bad, b"<html>not a jar</html>").unwrap();

        assert!(is_valid_jar(&good));
        assert!(!is_valid_jar(&bad));
        assert!(!is_valid_jar(&dir.path().join("missing.jar")));
    }

    #[test]
    fn test_store_then_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let cache = BuildCache::new(dir.path().join("cache"));
        let built = dir.path().join("spigot-1.21.8.jar");
        testing::write_jar(&built, "org.bukkit.craftbukkit.Main");

        assert!(cache.lookup("1.21.8", 190).is_none());
        let stored = cache.store("1.21.8", 190, &built).unwrap();
        assert_eq!(
            stored.jar_path,
            dir.path().join("cache/spigot/1.21.8/bt190/spigot-1.21.8.jar")
        );

        let hit = cache.lookup("1.21.8", 190).unwrap();
        assert_eq!(hit, stored);
        // A different revision is a different key
        assert!(cache.lookup("1.21.8", 191).is_none());
    }

    #[test]
    fn test_corrupt_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = BuildCache::new(dir.path());
        let built = dir.path().join("built.jar");
        testing::write_jar(&built, "Main");
        let stored = cache.store("1.20.4", 180, &built).unwrap();

        std::fs::write(&stored.jar_path, b"truncated").unwrap();
        assert!(cache.lookup("1.20.4", 180).is_none());
    }

    #[test]
    fn test_list_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let cache = BuildCache::new(dir.path());
        let built = dir.path().join("built.jar");
        testing::write_jar(&built, "Main");
        cache.store("1.21.8", 190, &built).unwrap();
        cache.store("1.20.4", 190, &built).unwrap();

        let listed: Vec<String> = cache
            .list()
            .unwrap()
            .into_iter()
            .map(|a| a.game_version)
            .collect();
        assert_eq!(listed, vec!["1.20.4", "1.21.8"]);

        assert_eq!(cache.clear().unwrap(), 2);
        assert!(cache.list().unwrap().is_empty());
        assert_eq!(cache.clear().unwrap(), 0);
    }
}
