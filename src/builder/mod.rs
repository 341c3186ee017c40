// Spigot source builds: fetch BuildTools, compile, cache the result

pub mod cache;
pub mod lock;

use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info};

pub use cache::BuildCache;
use cache::{is_valid_jar, spigot_jar_name};
use lock::CacheLock;

use crate::constants::{BUILDTOOLS_JAR, BUILDTOOLS_TIMEOUT};
use crate::error::{ProvisionError, ProvisionResult};
use crate::fetch::ArtifactFetcher;
use crate::model::{CachedBuildArtifact, JavaInstallation};
use crate::process::ScopedProcess;
use crate::reporter::Reporter;

/// Lifecycle of one build request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    Idle,
    FetchingBuildTool,
    Building,
    Caching,
    Done,
    Failed,
}

impl BuildState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BuildState::Done | BuildState::Failed)
    }
}

/// States a build went through, starting at `Idle`.
#[derive(Debug, Clone)]
pub struct StateTrail {
    states: Vec<BuildState>,
}

impl StateTrail {
    fn new() -> Self {
        Self {
            states: vec![BuildState::Idle],
        }
    }

    pub fn current(&self) -> BuildState {
        self.states
            .last()
            .copied()
            .unwrap_or(BuildState::Idle)
    }

    fn advance(&mut self, next: BuildState) {
        debug_assert!(!self.current().is_terminal(), "build already finished");
        debug!("Spigot build: {:?} -> {:?}", self.current(), next);
        self.states.push(next);
    }

    pub fn states(&self) -> &[BuildState] {
        &self.states
    }
}

#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub artifact: CachedBuildArtifact,
    pub cache_hit: bool,
    pub trail: StateTrail,
}

/// Runs BuildTools for Spigot and keeps its output in a [`BuildCache`].
pub struct SourceBuilder {
    cache: BuildCache,
    timeout: Duration,
}

impl SourceBuilder {
    pub fn new(cache: BuildCache) -> Self {
        Self {
            cache,
            timeout: BUILDTOOLS_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn cache(&self) -> &BuildCache {
        &self.cache
    }

    /// Produce a cached Spigot jar for (`game_version`, `revision`), building it only
    /// when no valid entry exists. Concurrent callers for one key build once.
    pub async fn build(
        &self,
        game_version: &str,
        revision: u32,
        tool_url: &str,
        java: &JavaInstallation,
        fetcher: &ArtifactFetcher,
        reporter: &dyn Reporter,
    ) -> ProvisionResult<BuildOutcome> {
        let mut trail = StateTrail::new();
        // A holder is stale once it has had twice the build timeout
        let _lock = CacheLock::acquire(
            &self.cache.lock_path(game_version, revision),
            self.timeout.saturating_mul(2),
        )
        .await?;

        if let Some(artifact) = self.cache.lookup(game_version, revision) {
            info!("Using cached Spigot {} build", game_version);
            trail.advance(BuildState::Done);
            return Ok(BuildOutcome {
                artifact,
                cache_hit: true,
                trail,
            });
        }

        match self
            .build_fresh(&mut trail, game_version, revision, tool_url, java, fetcher, reporter)
            .await
        {
            Ok(artifact) => {
                trail.advance(BuildState::Done);
                Ok(BuildOutcome {
                    artifact,
                    cache_hit: false,
                    trail,
                })
            }
            Err(err) => {
                trail.advance(BuildState::Failed);
                Err(err)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn build_fresh(
        &self,
        trail: &mut StateTrail,
        game_version: &str,
        revision: u32,
        tool_url: &str,
        java: &JavaInstallation,
        fetcher: &ArtifactFetcher,
        reporter: &dyn Reporter,
    ) -> ProvisionResult<CachedBuildArtifact> {
        let root = self.cache.root();
        std::fs::create_dir_all(root).map_err(|e| ProvisionError::io(root, e))?;
        let work = tempfile::Builder::new()
            .prefix(".buildtools-")
            .tempdir_in(root)
            .map_err(|e| ProvisionError::io(root, e))?;

        trail.advance(BuildState::FetchingBuildTool);
        reporter.step("Downloading BuildTools");
        let tool = work.path().join(BUILDTOOLS_JAR);
        fetcher.fetch(tool_url, &tool, None, reporter).await?;

        trail.advance(BuildState::Building);
        reporter.step(&format!(
            "Building Spigot {} with BuildTools #{} (this can take several minutes)",
            game_version, revision
        ));
        let output_dir = work.path().join("out");
        std::fs::create_dir_all(&output_dir).map_err(|e| ProvisionError::io(&output_dir, e))?;

        let tail = ScopedProcess::new(&java.executable_path, self.timeout)
            .arg("-jar")
            .arg(tool.display().to_string())
            .args(["--rev", game_version])
            .arg("--output-dir")
            .arg(output_dir.display().to_string())
            .arg("--nogui")
            .current_dir(work.path())
            .label("BuildTools")
            .run(reporter)
            .await?
            .require_success("BuildTools")?;

        let produced = locate_output(&output_dir, work.path(), game_version).ok_or_else(|| {
            failed_without_artifact(&tail, format!("no {} was produced", spigot_jar_name(game_version)))
        })?;
        if !is_valid_jar(&produced) {
            return Err(failed_without_artifact(
                &tail,
                format!("{:?} is not a readable jar", produced),
            ));
        }

        trail.advance(BuildState::Caching);
        self.cache.store(game_version, revision, &produced)
    }
}

/// BuildTools honours `--output-dir`; older revisions drop the jar in the working dir.
fn locate_output(output_dir: &Path, work_dir: &Path, game_version: &str) -> Option<PathBuf> {
    let name = spigot_jar_name(game_version);
    [output_dir.join(&name), work_dir.join(&name)]
        .into_iter()
        .find(|p| p.is_file())
}

fn failed_without_artifact(tail: &[String], reason: String) -> ProvisionError {
    let mut output_tail = tail.to_vec();
    output_tail.push(reason);
    ProvisionError::BuildToolFailed {
        tool: "BuildTools".to_string(),
        exit_code: Some(0),
        output_tail,
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::fetch::{RetryPolicy, http};
    use crate::reporter::SilentReporter;
    use crate::reporter::testing::RecordingReporter;
    use httpmock::prelude::*;
    use std::os::unix::fs::PermissionsExt;

    struct Fixture {
        _dir: tempfile::TempDir,
        root: PathBuf,
        counter: PathBuf,
        java: JavaInstallation,
    }

    /// A `java` that counts invocations and "builds" by copying a prepared jar.
    fn fixture(exit_code: i32) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let counter = root.join("invocations");
        let template = root.join("template.jar");
        cache::testing::write_jar(&template, "org.bukkit.craftbukkit.Main");

        let script = format!(
            r#"#!/bin/sh
n=$(cat "{counter}" 2>/dev/null || echo 0)
echo $((n + 1)) > "{counter}"
out=""
rev=""
while [ $# -gt 0 ]; do
  case "$1" in
    --output-dir) out="$2"; shift ;;
    --rev) rev="$2"; shift ;;
  esac
  shift
done
echo "Building Spigot $rev"
if [ {exit_code} -ne 0 ]; then
  echo "BUILD FAILURE" >&2
  exit {exit_code}
fi
sleep 0.2
cp "{template}" "$out/spigot-$rev.jar"
echo "Success! Everything completed successfully."
"#,
            counter = counter.display(),
            template = template.display(),
            exit_code = exit_code,
        );
        let java_path = root.join("java");
        std::fs::write(&java_path, script).unwrap();
        std::fs::set_permissions(&java_path, std::fs::Permissions::from_mode(0o755)).unwrap();

        Fixture {
            _dir: dir,
            root,
            counter,
            java: JavaInstallation {
                major_version: 21,
                executable_path: java_path,
                is_managed: false,
            },
        }
    }

    fn invocations(fixture: &Fixture) -> u32 {
        std::fs::read_to_string(&fixture.counter)
            .map(|s| s.trim().parse().unwrap())
            .unwrap_or(0)
    }

    fn fetcher() -> ArtifactFetcher {
        ArtifactFetcher::new(
            http::build_client().unwrap(),
            RetryPolicy {
                max_attempts: 1,
                base_delay: Duration::from_millis(1),
            },
        )
    }

    async fn buildtools_server() -> MockServer {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/BuildTools.jar");
                then.status(200).body("buildtools bytes");
            })
            .await;
        server
    }

    #[tokio::test]
    async fn test_second_build_is_cache_hit() {
        let fx = fixture(0);
        let server = buildtools_server().await;
        let builder = SourceBuilder::new(BuildCache::new(fx.root.join("cache")));
        let fetcher = fetcher();
        let reporter = RecordingReporter::default();
        let url = server.url("/BuildTools.jar");

        let first = builder
            .build("1.21.8", 190, &url, &fx.java, &fetcher, &reporter)
            .await
            .unwrap();
        assert!(!first.cache_hit);
        assert_eq!(
            first.trail.states(),
            &[
                BuildState::Idle,
                BuildState::FetchingBuildTool,
                BuildState::Building,
                BuildState::Caching,
                BuildState::Done
            ]
        );
        assert!(
            reporter
                .lines
                .lock()
                .unwrap()
                .contains(&"Building Spigot 1.21.8".to_string())
        );

        let second = builder
            .build("1.21.8", 190, &url, &fx.java, &fetcher, &SilentReporter)
            .await
            .unwrap();
        assert!(second.cache_hit);
        assert_eq!(second.trail.states(), &[BuildState::Idle, BuildState::Done]);
        assert_eq!(second.artifact.jar_path, first.artifact.jar_path);
        assert_eq!(invocations(&fx), 1);
    }

    #[tokio::test]
    async fn test_concurrent_builds_of_one_key_build_once() {
        let fx = fixture(0);
        let server = buildtools_server().await;
        let cache_root = fx.root.join("cache");
        let a = SourceBuilder::new(BuildCache::new(&cache_root));
        let b = SourceBuilder::new(BuildCache::new(&cache_root));
        let fetcher = fetcher();
        let url = server.url("/BuildTools.jar");

        let (left, right) = tokio::join!(
            a.build("1.20.4", 190, &url, &fx.java, &fetcher, &SilentReporter),
            b.build("1.20.4", 190, &url, &fx.java, &fetcher, &SilentReporter),
        );
        let (left, right) = (left.unwrap(), right.unwrap());

        assert_eq!(invocations(&fx), 1);
        assert_ne!(left.cache_hit, right.cache_hit);
        assert_eq!(left.artifact.jar_path, right.artifact.jar_path);
        assert!(is_valid_jar(&left.artifact.jar_path));
        assert!(!a.cache().lock_path("1.20.4", 190).exists());
    }

    #[tokio::test]
    async fn test_failed_build_reports_tail_and_caches_nothing() {
        let fx = fixture(2);
        let server = buildtools_server().await;
        let builder = SourceBuilder::new(BuildCache::new(fx.root.join("cache")));

        let err = builder
            .build(
                "1.21.8",
                190,
                &server.url("/BuildTools.jar"),
                &fx.java,
                &fetcher(),
                &SilentReporter,
            )
            .await
            .unwrap_err();

        match err {
            ProvisionError::BuildToolFailed {
                exit_code,
                output_tail,
                ..
            } => {
                assert_eq!(exit_code, Some(2));
                assert!(output_tail.contains(&"BUILD FAILURE".to_string()));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(builder.cache().lookup("1.21.8", 190).is_none());
        assert!(builder.cache().list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_cache_entry_is_rebuilt() {
        let fx = fixture(0);
        let server = buildtools_server().await;
        let builder = SourceBuilder::new(BuildCache::new(fx.root.join("cache")));
        let url = server.url("/BuildTools.jar");

        let first = builder
            .build("1.21.8", 190, &url, &fx.java, &fetcher(), &SilentReporter)
            .await
            .unwrap();
        std::fs::write(&first.artifact.jar_path, b"garbage").unwrap();

        let second = builder
            .build("1.21.8", 190, &url, &fx.java, &fetcher(), &SilentReporter)
            .await
            .unwrap();
        assert!(!second.cache_hit);
        assert!(is_valid_jar(&second.artifact.jar_path));
        assert_eq!(invocations(&fx), 2);
    }
}
