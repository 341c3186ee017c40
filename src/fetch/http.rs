// Shared HTTP client utilities

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;

use crate::constants::{CONNECT_TIMEOUT, DOWNLOAD_READ_TIMEOUT, METADATA_TIMEOUT};

/// User-Agent string for all HTTP requests
const USER_AGENT: &str = concat!("svforge/", env!("CARGO_PKG_VERSION"));

/// Build the client shared by catalogs and the fetcher for one director.
pub fn build_client() -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(CONNECT_TIMEOUT)
        .read_timeout(DOWNLOAD_READ_TIMEOUT)
        .build()
}

/// Why a metadata request failed, before the caller attaches a server type.
#[derive(Debug)]
pub enum HttpError {
    NotFound(String),
    Status { url: String, status: StatusCode },
    Transport { url: String, source: reqwest::Error },
    Decode { url: String, message: String },
}

impl std::fmt::Display for HttpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HttpError::NotFound(url) => write!(f, "resource not found: {}", url),
            HttpError::Status { url, status } => {
                write!(f, "HTTP request failed: {} ({})", url, status)
            }
            HttpError::Transport { url, source } => write!(f, "request to {} failed: {}", url, source),
            HttpError::Decode { url, message } => {
                write!(f, "malformed response from {}: {}", url, message)
            }
        }
    }
}

impl HttpError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, HttpError::NotFound(_))
    }
}

async fn get_text(client: &Client, url: &str) -> Result<String, HttpError> {
    log::debug!("GET {}", url);
    let response = client
        .get(url)
        .timeout(METADATA_TIMEOUT)
        .send()
        .await
        .map_err(|source| HttpError::Transport {
            url: url.to_string(),
            source,
        })?;

    if response.status() == StatusCode::NOT_FOUND {
        return Err(HttpError::NotFound(url.to_string()));
    }

    if !response.status().is_success() {
        return Err(HttpError::Status {
            url: url.to_string(),
            status: response.status(),
        });
    }

    response.text().await.map_err(|source| HttpError::Transport {
        url: url.to_string(),
        source,
    })
}

/// Fetch JSON from a URL and deserialize it
pub async fn fetch_json<T: DeserializeOwned>(client: &Client, url: &str) -> Result<T, HttpError> {
    let body = get_text(client, url).await?;
    serde_json::from_str(&body).map_err(|e| HttpError::Decode {
        url: url.to_string(),
        message: e.to_string(),
    })
}

/// Fetch a text document (HTML index, XML metadata)
pub async fn fetch_text(client: &Client, url: &str) -> Result<String, HttpError> {
    get_text(client, url).await
}

/// Last path segment of a URL, without query string
pub fn file_name_from_url(url: &str) -> String {
    url.split('?')
        .next()
        .unwrap_or(url)
        .rsplit('/')
        .find(|s| !s.is_empty())
        .unwrap_or("download.jar")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_from_url() {
        assert_eq!(
            file_name_from_url("https://example.com/a/b/paper-1.21.8-60.jar"),
            "paper-1.21.8-60.jar"
        );
        assert_eq!(
            file_name_from_url("https://example.com/server.jar?token=abc"),
            "server.jar"
        );
        assert_eq!(file_name_from_url("https://example.com/dir/"), "dir");
    }
}
