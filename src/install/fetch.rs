//! HTTPS downloads of vendor binaries.

use crate::ProvisionError;
use async_trait::async_trait;
use reqwest::Client;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Downloads a URL to a file.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch `url` and write the body to `dest`, replacing any existing file.
    async fn fetch(&self, url: &str, dest: &Path) -> Result<(), ProvisionError>;
}

/// [`Fetcher`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a fetcher whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, ProvisionError> {
        let client = Client::builder()
            .user_agent(concat!("hubble-install/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| ProvisionError::Download {
                url: String::new(),
                message: format!("failed to create HTTP client: {e}"),
                fix: "Check your system's TLS configuration".to_string(),
            })?;
        Ok(Self { client })
    }
}

fn download_error(url: &str, message: String) -> ProvisionError {
    ProvisionError::Download {
        url: url.to_string(),
        message,
        fix: format!("Check your internet connection, or download {url} manually"),
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<(), ProvisionError> {
        debug!(%url, dest = %dest.display(), "Downloading");

        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| download_error(url, e.to_string()))?;

        if !response.status().is_success() {
            return Err(download_error(url, format!("bad status: {}", response.status())));
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| ProvisionError::io("failed to create file", e))?;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| download_error(url, e.to_string()))?
        {
            file.write_all(&chunk)
                .await
                .map_err(|e| ProvisionError::io("failed to save file", e))?;
        }
        file.flush()
            .await
            .map_err(|e| ProvisionError::io("failed to save file", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_fetcher_builds() {
        assert!(HttpFetcher::new(Duration::from_secs(30)).is_ok());
    }

    #[test]
    fn test_download_error_names_url_in_fix() {
        let err = download_error("https://example.com/tool.exe", "bad status: 404".to_string());
        assert!(err.to_string().contains("404"));
        assert!(err.fix_suggestion().contains("https://example.com/tool.exe"));
    }
}
