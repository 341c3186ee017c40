// Java installation discovery: candidate scanning and `java -version` probing

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use log::{Level, debug};

use crate::constants::JAVA_PROBE_TIMEOUT;
use crate::model::JavaInstallation;
use crate::process::ScopedProcess;
use crate::reporter::SilentReporter;

/// Where to look for Java runtimes.
#[derive(Debug, Clone)]
pub struct JavaSearchOptions {
    /// Directories whose children are JDK homes (`<root>/<jdk>/bin/java`)
    pub search_roots: Vec<PathBuf>,
    /// Runtimes installed by this tool live here and are reported as managed
    pub managed_dir: Option<PathBuf>,
    /// Also consider the `java` found on PATH
    pub use_path: bool,
}

impl Default for JavaSearchOptions {
    fn default() -> Self {
        Self {
            search_roots: default_search_roots(),
            managed_dir: None,
            use_path: true,
        }
    }
}

/// Well-known JDK locations for the current platform.
pub fn default_search_roots() -> Vec<PathBuf> {
    let mut roots: Vec<PathBuf> = ["/usr/lib/jvm", "/usr/java", "/opt/java", "/opt/jdk"]
        .iter()
        .map(PathBuf::from)
        .collect();

    if cfg!(target_os = "macos") {
        roots.push(PathBuf::from("/Library/Java/JavaVirtualMachines"));
        // Homebrew keg-only openjdk@N formulae
        roots.push(PathBuf::from("/opt/homebrew/opt"));
        roots.push(PathBuf::from("/usr/local/opt"));
    }

    roots
}

/// Locate the java binary inside a JDK home, covering the macOS bundle layout.
pub fn find_java_executable(home: &Path) -> Option<PathBuf> {
    [
        home.join("bin").join("java"),
        home.join("Contents").join("Home").join("bin").join("java"),
        home.join("libexec")
            .join("openjdk.jdk")
            .join("Contents")
            .join("Home")
            .join("bin")
            .join("java"),
    ]
    .into_iter()
    .find(|p| p.is_file())
}

fn collect_candidates(options: &JavaSearchOptions) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();
    let mut push = |path: PathBuf| {
        let key = std::fs::canonicalize(&path).unwrap_or_else(|_| path.clone());
        if seen.insert(key) {
            candidates.push(path);
        }
    };

    let roots = options.managed_dir.iter().chain(options.search_roots.iter());
    for root in roots {
        if let Some(java) = find_java_executable(root) {
            push(java);
            continue;
        }

        let Ok(entries) = std::fs::read_dir(root) else {
            continue;
        };
        let mut homes: Vec<PathBuf> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        homes.sort();

        for home in homes {
            if let Some(java) = find_java_executable(&home) {
                push(java);
            }
        }
    }

    if options.use_path
        && let Ok(java) = which::which("java")
    {
        push(java);
    }

    candidates
}

/// Extract the major version from `java -version` output.
///
/// Handles both the legacy `1.8.0_392` scheme and modern `17.0.2` / `21-ea` strings.
pub fn parse_java_major(output: &str) -> Option<u32> {
    let line = output.lines().find(|l| l.contains("version"))?;
    let start = line.find('"')? + 1;
    let rest = &line[start..];
    let version = &rest[..rest.find('"')?];

    let mut parts = version
        .split(|c: char| !c.is_ascii_digit())
        .filter(|p| !p.is_empty());
    let first: u32 = parts.next()?.parse().ok()?;
    if first == 1 {
        parts.next()?.parse().ok()
    } else {
        Some(first)
    }
}

/// Run `java -version` and read its major version.
pub async fn probe_java(executable: &Path) -> Option<u32> {
    let output = ScopedProcess::new(executable, JAVA_PROBE_TIMEOUT)
        .arg("-version")
        .label("java -version")
        .log_level(Level::Debug)
        .run(&SilentReporter)
        .await;

    match output {
        Ok(output) if output.success() => {
            let major = parse_java_major(&output.tail.join("\n"));
            if major.is_none() {
                debug!("Could not parse Java version from {:?}", executable);
            }
            major
        }
        Ok(output) => {
            debug!("{:?} -version exited with {:?}", executable, output.exit_code);
            None
        }
        Err(e) => {
            debug!("Failed to probe {:?}: {}", executable, e);
            None
        }
    }
}

/// Every usable Java runtime visible with `options`, in search order.
pub async fn discover(options: &JavaSearchOptions) -> Vec<JavaInstallation> {
    let mut found = Vec::new();

    for executable in collect_candidates(options) {
        let Some(major) = probe_java(&executable).await else {
            continue;
        };
        let is_managed = options
            .managed_dir
            .as_ref()
            .is_some_and(|dir| executable.starts_with(dir));
        debug!("Found Java {} at {:?}", major, executable);
        found.push(JavaInstallation {
            major_version: major,
            executable_path: executable,
            is_managed,
        });
    }

    found
}

#[cfg(test)]
pub(crate) mod testing {
    use std::path::{Path, PathBuf};

    /// Write `<home>/bin/java`, a script answering `-version` with `version`.
    #[cfg(unix)]
    pub fn write_fake_jdk(home: &Path, version: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let bin = home.join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        let java = bin.join("java");
        let script = format!(
            "#!/bin/sh\necho 'openjdk version \"{}\" 2024-01-16' >&2\necho 'OpenJDK 64-Bit Server VM' >&2\n",
            version
        );
        std::fs::write(&java, script).unwrap();
        std::fs::set_permissions(&java, std::fs::Permissions::from_mode(0o755)).unwrap();
        java
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_java_major() {
        assert_eq!(
            parse_java_major("openjdk version \"17.0.2\" 2022-01-18\nOpenJDK Runtime"),
            Some(17)
        );
        assert_eq!(parse_java_major("java version \"1.8.0_392\""), Some(8));
        assert_eq!(parse_java_major("openjdk version \"21-ea\" 2023-09-19"), Some(21));
        assert_eq!(parse_java_major("Picked up _JAVA_OPTIONS\nno version here"), None);
    }

    #[test]
    fn test_find_java_executable_layouts() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_java_executable(dir.path()).is_none());

        let mac = dir.path().join("Contents").join("Home").join("bin");
        std::fs::create_dir_all(&mac).unwrap();
        std::fs::write(mac.join("java"), "").unwrap();
        assert_eq!(find_java_executable(dir.path()), Some(mac.join("java")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_discover_scans_roots_and_marks_managed() {
        let system = tempfile::tempdir().unwrap();
        let managed = tempfile::tempdir().unwrap();
        testing::write_fake_jdk(&system.path().join("java-8-openjdk"), "1.8.0_392");
        testing::write_fake_jdk(&system.path().join("java-17-openjdk"), "17.0.9");
        testing::write_fake_jdk(&managed.path().join("jdk-21"), "21.0.1");

        let found = discover(&JavaSearchOptions {
            search_roots: vec![system.path().to_path_buf()],
            managed_dir: Some(managed.path().to_path_buf()),
            use_path: false,
        })
        .await;

        let majors: Vec<u32> = found.iter().map(|j| j.major_version).collect();
        assert_eq!(majors, vec![21, 17, 8]);
        assert!(found[0].is_managed);
        assert!(!found[1].is_managed);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_broken_candidate_is_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let root = tempfile::tempdir().unwrap();
        let bin = root.path().join("broken").join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        std::fs::write(bin.join("java"), "#!/bin/sh\nexit 1\n").unwrap();
        std::fs::set_permissions(bin.join("java"), std::fs::Permissions::from_mode(0o755))
            .unwrap();

        let found = discover(&JavaSearchOptions {
            search_roots: vec![root.path().to_path_buf()],
            managed_dir: None,
            use_path: false,
        })
        .await;
        assert!(found.is_empty());
    }
}
