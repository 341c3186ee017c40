// Minecraft version parsing and ordering

use std::cmp::Ordering;
use std::fmt;

/// A release version such as `1.20.4`, compared numerically component-wise.
///
/// Missing components compare as zero, so `1.21` == `1.21.0`.
#[derive(Debug, Clone)]
pub struct McVersion {
    raw: String,
    parts: Vec<u32>,
}

/// Strip build metadata Spigot/Bukkit append, e.g. `1.20.1-R0.1-SNAPSHOT` -> `1.20.1`
pub fn normalize_mc_version(version: &str) -> &str {
    version.split('-').next().unwrap_or(version).trim()
}

impl McVersion {
    /// Parse a dotted numeric release version; snapshots and pre-releases yield `None`.
    pub fn parse(version: &str) -> Option<Self> {
        let normalized = normalize_mc_version(version);
        if normalized.is_empty() {
            return None;
        }

        let parts = normalized
            .split('.')
            .map(|p| p.parse::<u32>().ok())
            .collect::<Option<Vec<_>>>()?;

        Some(Self {
            raw: normalized.to_string(),
            parts,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    fn component(&self, index: usize) -> u32 {
        self.parts.get(index).copied().unwrap_or(0)
    }

    /// True when this version is `major.minor.patch` or newer.
    pub fn at_least(&self, major: u32, minor: u32, patch: u32) -> bool {
        (self.component(0), self.component(1), self.component(2)) >= (major, minor, patch)
    }
}

impl PartialEq for McVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for McVersion {}

impl PartialOrd for McVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for McVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.parts.len().max(other.parts.len());
        (0..len)
            .map(|i| self.component(i).cmp(&other.component(i)))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl fmt::Display for McVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Sort version strings newest first; unparseable entries sink to the end in input order.
pub fn sort_newest_first(versions: &mut [String]) {
    versions.sort_by(|a, b| match (McVersion::parse(a), McVersion::parse(b)) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}
