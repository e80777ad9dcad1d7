// HTTP transport: client construction and the fetch seam used by the session and the pool.

use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::Client;
use reqwest::header::{CONTENT_TYPE, HeaderValue, REFERER};
use tokio::io::AsyncWriteExt;
use tracing::{debug, trace};
use url::Url;

use crate::{DownloadError, DownloaderConfig};

/// Which content types a response may carry to be accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentCheck {
    /// `text/html` pages.
    Html,
    /// Any `application/*` body (playlists, keys).
    Application,
    /// No restriction.
    Any,
}

impl ContentCheck {
    pub fn accepts(&self, content_type: &str) -> bool {
        match self {
            ContentCheck::Html => content_type.contains("text/html"),
            ContentCheck::Application => content_type.contains("application/"),
            ContentCheck::Any => true,
        }
    }
}

/// Network access as seen by the extraction pipeline.
#[async_trait]
pub trait HttpFetch: Send + Sync {
    /// GET `url` into memory, rejecting responses whose content type fails `check`.
    async fn get_bytes(
        &self,
        url: &Url,
        check: ContentCheck,
        operation: &'static str,
    ) -> Result<Bytes, DownloadError>;

    /// Stream `url` into `dest` (created or truncated), reporting each chunk as a
    /// fraction of `content-length` when the server provides one.
    async fn download_to_file(
        &self,
        url: &Url,
        dest: &Path,
        progress: &(dyn Fn(f64) + Send + Sync),
    ) -> Result<u64, DownloadError>;
}

pub fn create_client(config: &DownloaderConfig) -> Result<Client, DownloadError> {
    // reqwest is built without a bundled crypto provider; the first caller installs it.
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let mut client_builder = Client::builder()
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .user_agent(&config.user_agent)
        .default_headers(config.headers.clone())
        .redirect(if config.follow_redirects {
            reqwest::redirect::Policy::limited(10)
        } else {
            reqwest::redirect::Policy::none()
        });

    if !config.timeout.is_zero() {
        client_builder = client_builder.timeout(config.timeout);
    }

    if !config.connect_timeout.is_zero() {
        client_builder = client_builder.connect_timeout(config.connect_timeout);
    }

    client_builder.build().map_err(DownloadError::from)
}

/// reqwest-backed [`HttpFetch`] that stamps every request with the configured referer.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    referer: HeaderValue,
}

impl HttpClient {
    pub fn new(config: &DownloaderConfig) -> Result<Self, DownloadError> {
        let referer = HeaderValue::from_str(&config.referer).map_err(|e| {
            DownloadError::Configuration {
                reason: format!("invalid referer `{}`: {e}", config.referer),
            }
        })?;
        Ok(Self {
            client: create_client(config)?,
            referer,
        })
    }

    async fn send(
        &self,
        url: &Url,
        operation: &'static str,
    ) -> Result<reqwest::Response, DownloadError> {
        let response = self
            .client
            .get(url.clone())
            .header(REFERER, self.referer.clone())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DownloadError::http_status(
                response.status(),
                url.as_str(),
                operation,
            ));
        }
        Ok(response)
    }
}

#[async_trait]
impl HttpFetch for HttpClient {
    async fn get_bytes(
        &self,
        url: &Url,
        check: ContentCheck,
        operation: &'static str,
    ) -> Result<Bytes, DownloadError> {
        let response = self.send(url, operation).await?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_owned();
        if !check.accepts(&content_type) {
            return Err(DownloadError::content_type(
                content_type,
                url.as_str(),
                operation,
            ));
        }

        let bytes = response.bytes().await?;
        debug!(url = %url, operation, size = bytes.len(), "Fetched resource");
        Ok(bytes)
    }

    async fn download_to_file(
        &self,
        url: &Url,
        dest: &Path,
        progress: &(dyn Fn(f64) + Send + Sync),
    ) -> Result<u64, DownloadError> {
        let response = self.send(url, "segment").await?;
        let total = response.content_length().filter(|len| *len > 0);

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
            if let Some(total) = total {
                progress(chunk.len() as f64 / total as f64);
            }
        }
        file.flush().await?;

        trace!(url = %url, bytes = written, "Segment written");
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_checks() {
        assert!(ContentCheck::Html.accepts("text/html; charset=UTF-8"));
        assert!(!ContentCheck::Html.accepts("application/json"));
        assert!(ContentCheck::Application.accepts("application/vnd.apple.mpegurl"));
        assert!(ContentCheck::Application.accepts("application/octet-stream"));
        assert!(!ContentCheck::Application.accepts("text/plain"));
        assert!(ContentCheck::Any.accepts(""));
    }

    #[test]
    fn rejects_invalid_referer() {
        let config = DownloaderConfig::default().with_referer("bad\nreferer");
        assert!(matches!(
            HttpClient::new(&config),
            Err(DownloadError::Configuration { .. })
        ));
    }
}
