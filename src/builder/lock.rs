// Cross-process lock file guarding one cache entry

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use chrono::Utc;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::{ProvisionError, ProvisionResult};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Lock files that do not parse are only reclaimed once they are this old
const UNREADABLE_GRACE: Duration = Duration::from_secs(10);

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Serialize, Deserialize)]
struct LockOwner {
    pid: u32,
    timestamp: i64,
    /// Unique per acquisition
    #[serde(default)]
    token: String,
}

impl LockOwner {
    fn current() -> Self {
        let now = Utc::now();
        let pid = std::process::id();
        Self {
            pid,
            timestamp: now.timestamp(),
            token: format!(
                "{}-{}-{}",
                pid,
                now.timestamp_nanos_opt().unwrap_or_default(),
                NEXT_TOKEN.fetch_add(1, Ordering::Relaxed)
            ),
        }
    }
}

/// Held while a cache entry is checked and, if missing, built. Removed on drop.
#[derive(Debug)]
pub struct CacheLock {
    path: PathBuf,
    token: String,
}

impl CacheLock {
    /// Wait until the lock at `path` can be taken. Locks whose owner is gone, or which
    /// are older than `stale_after`, are reclaimed.
    pub async fn acquire(path: &Path, stale_after: Duration) -> ProvisionResult<Self> {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| ProvisionError::io(dir, e))?;

        let mut attempts = 0u32;
        loop {
            attempts += 1;
            if let Some(lock) = try_create(path, dir)? {
                return Ok(lock);
            }
            reclaim_if_stale(path, stale_after);
            if attempts % 40 == 1 {
                info!("Waiting for another build holding {:?}", path);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        match read_owner(&self.path) {
            Some(owner) if owner.token == self.token => {
                if let Err(e) = fs::remove_file(&self.path) {
                    warn!("Failed to remove lock {:?}: {}", self.path, e);
                }
            }
            _ => warn!("Lock {:?} was reclaimed by another build; leaving it", self.path),
        }
    }
}

/// Publish a fully written owner file at `path` unless a lock already exists there.
fn try_create(path: &Path, dir: &Path) -> ProvisionResult<Option<CacheLock>> {
    let owner = LockOwner::current();
    let payload = serde_json::to_vec(&owner)
        .map_err(|e| ProvisionError::io(path, std::io::Error::other(e)))?;
    let mut file = NamedTempFile::new_in(dir).map_err(|e| ProvisionError::io(dir, e))?;
    file.write_all(&payload)
        .map_err(|e| ProvisionError::io(dir, e))?;

    match file.persist_noclobber(path) {
        Ok(_) => {
            debug!("Acquired cache lock {:?}", path);
            Ok(Some(CacheLock {
                path: path.to_path_buf(),
                token: owner.token,
            }))
        }
        Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => Ok(None),
        Err(e) => Err(ProvisionError::io(path, e.error)),
    }
}

fn read_owner(path: &Path) -> Option<LockOwner> {
    let content = fs::read(path).ok()?;
    serde_json::from_slice(&content).ok()
}

fn reclaim_if_stale(path: &Path, stale_after: Duration) {
    let Ok(content) = fs::read(path) else {
        return;
    };

    let reason = match serde_json::from_slice::<LockOwner>(&content) {
        Ok(owner) => {
            let age = Utc::now().timestamp().saturating_sub(owner.timestamp);
            if age > stale_after.as_secs() as i64 {
                format!("held by pid {} for {}s", owner.pid, age)
            } else if !process_alive(owner.pid) {
                format!("pid {} has exited", owner.pid)
            } else {
                return;
            }
        }
        Err(_) => {
            let age = fs::metadata(path)
                .and_then(|m| m.modified())
                .ok()
                .and_then(|modified| SystemTime::now().duration_since(modified).ok());
            match age {
                Some(age) if age > UNREADABLE_GRACE => "unreadable owner".to_string(),
                _ => return,
            }
        }
    };

    if take_if_unchanged(path, &content) {
        warn!("Reclaimed stale lock {:?}: {}", path, reason);
    }
}

/// Move the lock aside and delete it only if it still holds `observed`. A lock that
/// another waiter created in the meantime is put back.
fn take_if_unchanged(path: &Path, observed: &[u8]) -> bool {
    let aside = path.with_extension(format!("stale-{}", LockOwner::current().token));
    if fs::rename(path, &aside).is_err() {
        return false;
    }

    let unchanged = fs::read(&aside).is_ok_and(|content| content == observed);
    if !unchanged {
        match fs::hard_link(&aside, path) {
            Ok(()) => debug!("Lock {:?} changed hands; restored it", path),
            Err(e) => warn!("Could not restore lock {:?}: {}", path, e),
        }
    }
    if let Err(e) = fs::remove_file(&aside) {
        debug!("Failed to remove {:?}: {}", aside, e);
    }
    unchanged
}

#[cfg(unix)]
fn process_alive(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    !matches!(kill(Pid::from_raw(raw), None), Err(Errno::ESRCH))
}

#[cfg(not(unix))]
fn process_alive(_pid: u32) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    fn write_owner(path: &Path, pid: u32, timestamp: i64) {
        let owner = LockOwner {
            pid,
            timestamp,
            token: "other".to_string(),
        };
        std::fs::write(path, serde_json::to_vec(&owner).unwrap()).unwrap();
    }

    fn backdate(path: &Path, by: Duration) {
        std::fs::File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(SystemTime::now() - by)
            .unwrap();
    }

    fn leftovers(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_lock_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("bt190.lock");

        let lock = CacheLock::acquire(&path, HOUR).await.unwrap();
        assert!(path.exists());
        let owner = read_owner(&path).unwrap();
        assert_eq!(owner.pid, std::process::id());
        drop(lock);
        assert!(!path.exists());
        assert!(leftovers(&dir.path().join("nested")).is_empty());
    }

    #[tokio::test]
    async fn test_second_acquire_waits_for_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bt190.lock");

        let first = CacheLock::acquire(&path, HOUR).await.unwrap();
        let waiter = {
            let path = path.clone();
            tokio::spawn(async move { CacheLock::acquire(&path, HOUR).await.map(|_| ()) })
        };

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(!waiter.is_finished());

        drop(first);
        tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_expired_lock_is_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bt190.lock");
        write_owner(&path, std::process::id(), 0);

        let lock = tokio::time::timeout(Duration::from_secs(5), CacheLock::acquire(&path, HOUR))
            .await
            .unwrap()
            .unwrap();
        drop(lock);
    }

    #[tokio::test]
    async fn test_expiry_follows_configured_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bt190.lock");
        let ten_minutes_ago = Utc::now().timestamp() - 600;
        write_owner(&path, std::process::id(), ten_minutes_ago);

        let waited = tokio::time::timeout(
            Duration::from_millis(800),
            CacheLock::acquire(&path, HOUR),
        )
        .await;
        assert!(waited.is_err(), "a live lock within the timeout must be kept");

        let lock = tokio::time::timeout(
            Duration::from_secs(5),
            CacheLock::acquire(&path, Duration::from_secs(60)),
        )
        .await
        .unwrap()
        .unwrap();
        drop(lock);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_lock_of_exited_process_is_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bt190.lock");
        write_owner(&path, i32::MAX as u32, Utc::now().timestamp());

        let lock = tokio::time::timeout(Duration::from_secs(5), CacheLock::acquire(&path, HOUR))
            .await
            .unwrap()
            .unwrap();
        drop(lock);
        assert!(leftovers(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_empty_lock_is_reclaimed_after_grace() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bt190.lock");
        std::fs::write(&path, "").unwrap();

        let waited =
            tokio::time::timeout(Duration::from_millis(600), CacheLock::acquire(&path, HOUR)).await;
        assert!(waited.is_err(), "a fresh unreadable lock must be left alone");

        backdate(&path, Duration::from_secs(60));
        let lock = tokio::time::timeout(Duration::from_secs(5), CacheLock::acquire(&path, HOUR))
            .await
            .unwrap()
            .unwrap();
        drop(lock);
    }

    #[test]
    fn test_take_restores_a_lock_that_changed_hands() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bt190.lock");
        std::fs::write(&path, b"fresh owner").unwrap();

        assert!(!take_if_unchanged(&path, b"stale owner"));
        assert_eq!(std::fs::read(&path).unwrap(), b"fresh owner");
        assert_eq!(leftovers(dir.path()), vec!["bt190.lock"]);

        assert!(take_if_unchanged(&path, b"fresh owner"));
        assert!(leftovers(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_drop_keeps_a_lock_owned_by_someone_else() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bt190.lock");

        let lock = CacheLock::acquire(&path, HOUR).await.unwrap();
        write_owner(&path, std::process::id(), Utc::now().timestamp());
        drop(lock);
        assert!(path.exists());
    }
}
