// Artifact download engine: streaming, retries, checksum verification, atomic placement

pub mod hash;
pub mod http;

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::StreamExt;
use log::{debug, info, warn};
use reqwest::Client;
use tokio::io::AsyncWriteExt;

use crate::constants::{DEFAULT_BACKOFF_BASE, DEFAULT_DOWNLOAD_ATTEMPTS};
use crate::error::{ProvisionError, ProvisionResult};
use crate::reporter::Reporter;
use hash::{Checksum, StreamHasher};

/// How many times a transfer is attempted and how long to wait in between.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles for each one after
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_DOWNLOAD_ATTEMPTS,
            base_delay: DEFAULT_BACKOFF_BASE,
        }
    }
}

impl RetryPolicy {
    /// Delay after failed attempt number `attempt` (1-based): base, 2*base, 4*base, ...
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }
}

enum AttemptError {
    /// Worth another attempt: connection trouble, 5xx, truncated body
    Transient(String),
    Fatal(ProvisionError),
}

/// A temp file next to the destination, removed unless committed.
struct PartFile {
    path: PathBuf,
    committed: bool,
}

impl PartFile {
    fn for_destination(dest: &Path) -> Self {
        let name = dest
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "download".to_string());
        Self {
            path: dest.with_file_name(format!(".{}.part", name)),
            committed: false,
        }
    }

    fn discard(&self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed partial file {:?}", self.path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove partial file {:?}: {}", self.path, e),
        }
    }

    async fn commit(mut self, dest: &Path) -> ProvisionResult<()> {
        tokio::fs::rename(&self.path, dest)
            .await
            .map_err(|e| ProvisionError::io(dest, e))?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for PartFile {
    fn drop(&mut self) {
        if !self.committed {
            self.discard();
        }
    }
}

/// Streams artifacts to disk. The destination only ever holds a complete, verified file.
pub struct ArtifactFetcher {
    client: Client,
    retry: RetryPolicy,
}

impl ArtifactFetcher {
    pub fn new(client: Client, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }

    /// Download `url` to `dest`, verifying `expected` when given. Returns bytes written.
    pub async fn fetch(
        &self,
        url: &str,
        dest: &Path,
        expected: Option<&Checksum>,
        reporter: &dyn Reporter,
    ) -> ProvisionResult<u64> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ProvisionError::io(parent, e))?;
        }

        let label = http::file_name_from_url(url);
        let part = PartFile::for_destination(dest);
        let mut high_water = 0u64;
        let attempts = self.retry.max_attempts.max(1);

        info!("Downloading {}", url);
        reporter.download_started(&label, None);

        for attempt in 1..=attempts {
            match self
                .attempt(url, &part.path, expected, reporter, &mut high_water)
                .await
            {
                Ok(written) => {
                    part.commit(dest).await?;
                    reporter.download_finished(&label);
                    debug!("Wrote {} bytes to {:?}", written, dest);
                    return Ok(written);
                }
                Err(AttemptError::Fatal(err)) => {
                    part.discard();
                    return Err(err);
                }
                Err(AttemptError::Transient(reason)) => {
                    part.discard();
                    if attempt == attempts {
                        return Err(ProvisionError::DownloadFailed {
                            url: url.to_string(),
                            reason: format!("{} (gave up after {} attempts)", reason, attempts),
                        });
                    }
                    let delay = self.retry.delay_after(attempt);
                    warn!(
                        "Attempt {}/{} for {} failed: {}; retrying in {:?}",
                        attempt, attempts, url, reason, delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }

        unreachable!("retry loop returns on the last attempt")
    }

    async fn attempt(
        &self,
        url: &str,
        part_path: &Path,
        expected: Option<&Checksum>,
        reporter: &dyn Reporter,
        high_water: &mut u64,
    ) -> Result<u64, AttemptError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AttemptError::Transient(e.to_string()))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(AttemptError::Transient(format!("HTTP {}", status)));
        }
        if !status.is_success() {
            return Err(AttemptError::Fatal(ProvisionError::DownloadFailed {
                url: url.to_string(),
                reason: format!("HTTP {}", status),
            }));
        }

        let total = response.content_length();
        let mut file = tokio::fs::File::create(part_path)
            .await
            .map_err(|e| AttemptError::Fatal(ProvisionError::io(part_path, e)))?;
        let mut hasher = expected.map(|c| StreamHasher::new(c.algorithm));
        let mut written = 0u64;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| AttemptError::Transient(e.to_string()))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| AttemptError::Fatal(ProvisionError::io(part_path, e)))?;
            if let Some(hasher) = hasher.as_mut() {
                hasher.update(&chunk);
            }
            written += chunk.len() as u64;
            if written > *high_water {
                *high_water = written;
                reporter.download_progress(written);
            }
        }

        file.flush()
            .await
            .map_err(|e| AttemptError::Fatal(ProvisionError::io(part_path, e)))?;
        drop(file);

        if let Some(total) = total
            && written != total
        {
            return Err(AttemptError::Transient(format!(
                "truncated transfer: received {} of {} bytes",
                written, total
            )));
        }

        if let (Some(expected), Some(hasher)) = (expected, hasher) {
            let actual = hasher.finalize_hex();
            if !expected.matches(&actual) {
                return Err(AttemptError::Fatal(ProvisionError::ChecksumMismatch {
                    url: url.to_string(),
                    expected: expected.to_string(),
                    actual: format!("{}:{}", expected.algorithm.prefix(), actual),
                }));
            }
        }

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::SilentReporter;
    use crate::reporter::testing::RecordingReporter;
    use hash::{HashAlgorithm, compute_hash};
    use httpmock::prelude::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    fn fast_fetcher() -> ArtifactFetcher {
        ArtifactFetcher::new(
            http::build_client().unwrap(),
            RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(1),
            },
        )
    }

    fn sha256_of(data: &[u8]) -> Checksum {
        Checksum::sha256(compute_hash(data, HashAlgorithm::Sha256))
    }

    /// Serves one canned raw HTTP response per connection, in order.
    async fn serve_sequence(responses: Vec<Vec<u8>>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            for response in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = socket.read(&mut chunk).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                }
                socket.write_all(&response).await.unwrap();
                socket.shutdown().await.ok();
            }
        });
        format!("http://{}/server.jar", addr)
    }

    fn raw_response(status: &str, declared_len: usize, body: &[u8]) -> Vec<u8> {
        let mut out = format!(
            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            status, declared_len
        )
        .into_bytes();
        out.extend_from_slice(body);
        out
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_secs(1));
        assert_eq!(policy.delay_after(2), Duration::from_secs(2));
        assert_eq!(policy.delay_after(3), Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_fetch_verifies_checksum_and_reports_progress() {
        let server = MockServer::start_async().await;
        let body = vec![7u8; 200_000];
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/paper.jar");
                then.status(200).body(body.clone());
            })
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("paper.jar");
        let reporter = RecordingReporter::default();
        let written = fast_fetcher()
            .fetch(
                &server.url("/paper.jar"),
                &dest,
                Some(&sha256_of(&body)),
                &reporter,
            )
            .await
            .unwrap();

        assert_eq!(written, body.len() as u64);
        assert_eq!(std::fs::read(&dest).unwrap(), body);
        mock.assert_async().await;

        let progress = reporter.progress.lock().unwrap().clone();
        assert!(!progress.is_empty());
        assert!(progress.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(*progress.last().unwrap(), body.len() as u64);
    }

    #[tokio::test]
    async fn test_checksum_mismatch_leaves_no_file_and_is_not_retried() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/server.jar");
                then.status(200).body("corrupted");
            })
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("server.jar");
        let err = fast_fetcher()
            .fetch(
                &server.url("/server.jar"),
                &dest,
                Some(&sha256_of(b"expected")),
                &SilentReporter,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ProvisionError::ChecksumMismatch { .. }));
        assert!(!dest.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        assert_eq!(mock.hits_async().await, 1);
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/missing.jar");
                then.status(404);
            })
            .await;

        let dir = tempfile::tempdir().unwrap();
        let err = fast_fetcher()
            .fetch(
                &server.url("/missing.jar"),
                &dir.path().join("missing.jar"),
                None,
                &SilentReporter,
            )
            .await
            .unwrap_err();

        match err {
            ProvisionError::DownloadFailed { reason, .. } => assert!(reason.contains("404")),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(mock.hits_async().await, 1);
    }

    #[tokio::test]
    async fn test_server_error_is_retried_until_exhausted() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/flaky.jar");
                then.status(503);
            })
            .await;

        let dir = tempfile::tempdir().unwrap();
        let err = fast_fetcher()
            .fetch(
                &server.url("/flaky.jar"),
                &dir.path().join("flaky.jar"),
                None,
                &SilentReporter,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ProvisionError::DownloadFailed { .. }));
        assert_eq!(mock.hits_async().await, 3);
    }

    #[tokio::test]
    async fn test_transient_failure_then_success() {
        let body = b"complete artifact".to_vec();
        let url = serve_sequence(vec![
            raw_response("503 Service Unavailable", 0, b""),
            raw_response("200 OK", body.len(), &body),
        ])
        .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("server.jar");
        let written = fast_fetcher()
            .fetch(&url, &dest, Some(&sha256_of(&body)), &SilentReporter)
            .await
            .unwrap();

        assert_eq!(written, body.len() as u64);
        assert_eq!(std::fs::read(&dest).unwrap(), body);
    }

    #[tokio::test]
    async fn test_interrupted_transfer_leaves_nothing_behind() {
        // Every attempt promises 4096 bytes and hangs up after 100
        let partial = vec![1u8; 100];
        let url = serve_sequence(vec![
            raw_response("200 OK", 4096, &partial),
            raw_response("200 OK", 4096, &partial),
            raw_response("200 OK", 4096, &partial),
        ])
        .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("server.jar");
        let err = fast_fetcher()
            .fetch(&url, &dest, None, &SilentReporter)
            .await
            .unwrap_err();

        assert!(matches!(err, ProvisionError::DownloadFailed { .. }));
        assert!(!dest.exists());
        assert!(!dir.path().join(".server.jar.part").exists());
    }
}
