use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use source_adapter_trait::{FeedSource, RawPayload};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::trace;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko)";

/// Live feed polled over HTTP(S).
pub struct HttpFeed {
    client: reqwest::Client,
    url: String,
}

impl HttpFeed {
    /// Builds a client whose every request is bounded by `timeout`.
    pub fn new(url: impl Into<String>, timeout: Duration, headers: &HashMap<String, String>) -> Result<Self> {
        let mut header_map = HeaderMap::new();
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .with_context(|| format!("Invalid header name: {}", name))?;
            let value = HeaderValue::from_str(value)
                .with_context(|| format!("Invalid value for header {}", name))?;
            header_map.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(DEFAULT_USER_AGENT)
            .default_headers(header_map)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl FeedSource for HttpFeed {
    async fn fetch(&self) -> Result<RawPayload> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("GET {} failed", self.url))?;

        let status = response.status();
        if !status.is_success() {
            bail!("GET {} returned HTTP {}", self.url, status);
        }

        let body = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read body from {}", self.url))?;
        trace!(url = %self.url, bytes = body.len(), "Fetched payload");
        Ok(RawPayload::new(body))
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// File-based feed for replaying a recorded payload. The file is re-read on
/// every fetch, so it can be swapped on disk while the poller runs.
pub struct FileFeed {
    path: PathBuf,
}

impl FileFeed {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl FeedSource for FileFeed {
    async fn fetch(&self) -> Result<RawPayload> {
        let data = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        Ok(RawPayload::new(data))
    }

    fn describe(&self) -> String {
        format!("file://{}", self.path.display())
    }
}

/// In-memory feed that always returns the same body.
#[derive(Clone)]
pub struct StaticFeed {
    body: Bytes,
}

impl StaticFeed {
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self { body: body.into() }
    }
}

#[async_trait]
impl FeedSource for StaticFeed {
    async fn fetch(&self) -> Result<RawPayload> {
        Ok(RawPayload::new(self.body.clone()))
    }

    fn describe(&self) -> String {
        format!("static ({} bytes)", self.body.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_file_feed_rereads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"first").unwrap();
        let feed = FileFeed::new(file.path());

        assert_eq!(&feed.fetch().await.unwrap().body[..], b"first");

        std::fs::write(file.path(), b"second").unwrap();
        assert_eq!(&feed.fetch().await.unwrap().body[..], b"second");
        assert!(feed.describe().starts_with("file://"));
    }

    #[tokio::test]
    async fn test_file_feed_missing_file_fails() {
        let feed = FileFeed::new("/definitely/not/here.json");
        let err = feed.fetch().await.unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }

    #[tokio::test]
    async fn test_static_feed() {
        let feed = StaticFeed::new(&b"{}"[..]);
        let payload = feed.fetch().await.unwrap();
        assert_eq!(payload.len(), 2);
    }

    #[test]
    fn test_http_feed_rejects_bad_header() {
        let mut headers = HashMap::new();
        headers.insert("bad header".to_string(), "x".to_string());
        assert!(HttpFeed::new("http://localhost", DEFAULT_TIMEOUT, &headers).is_err());
    }

    #[tokio::test]
    async fn test_http_feed_unreachable_host_fails() {
        // Nothing listens on the discard port.
        let feed = HttpFeed::new(
            "http://127.0.0.1:9/events",
            Duration::from_millis(500),
            &HashMap::new(),
        )
        .unwrap();
        assert!(feed.fetch().await.is_err());
        assert_eq!(feed.describe(), "http://127.0.0.1:9/events");
    }
}
