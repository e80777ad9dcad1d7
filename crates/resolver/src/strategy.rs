use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;
use vod_engine::{ContentCheck, DownloadError, HttpFetch};

use crate::error::ResolveError;
use crate::js_engine::{JsSandbox, SandboxLimits};

/// The packed routine is the argument of an `eval(...)` call that closes its `<script>` tag.
static PACKED_SCRIPT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)eval(\(f.*?)\n</script>").unwrap());
static STREAM_URL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https.*?m3u8").unwrap());

/// Turns an episode page reference into the URL of its segmented playlist.
#[async_trait]
pub trait StreamResolver: Send + Sync {
    async fn resolve(&self, page_url: &str) -> Result<String, ResolveError>;
}

/// Locate the packed script body (without its `eval` call) in an episode page.
pub fn extract_packed_script(html: &str) -> Result<&str, ResolveError> {
    PACKED_SCRIPT_REGEX
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| ResolveError::PageShape("no packed script found".to_owned()))
}

/// First `https…m3u8` occurrence in unpacked script text.
pub fn find_stream_url(unpacked: &str) -> Result<String, ResolveError> {
    STREAM_URL_REGEX
        .find(unpacked)
        .map(|m| m.as_str().to_owned())
        .ok_or(ResolveError::NoStreamUrl)
}

/// Unpack `script` in the sandbox and pull the playlist URL out of the result.
pub async fn unpack_stream_url(script: &str, sandbox: JsSandbox) -> Result<String, ResolveError> {
    let script = script.to_owned();
    let unpacked = tokio::task::spawn_blocking(move || sandbox.eval_string(&script))
        .await
        .map_err(|e| ResolveError::Worker(e.to_string()))??;
    find_stream_url(&unpacked)
}

/// Fetches the episode page and evaluates its packed script.
pub struct PackedScriptResolver {
    fetch: Arc<dyn HttpFetch>,
    sandbox: JsSandbox,
}

impl PackedScriptResolver {
    pub fn new(fetch: Arc<dyn HttpFetch>, limits: SandboxLimits) -> Self {
        Self {
            fetch,
            sandbox: JsSandbox::new(limits),
        }
    }
}

#[async_trait]
impl StreamResolver for PackedScriptResolver {
    async fn resolve(&self, page_url: &str) -> Result<String, ResolveError> {
        let url = Url::parse(page_url)
            .map_err(|e| DownloadError::invalid_url(page_url, e.to_string()))?;
        let body = self
            .fetch
            .get_bytes(&url, ContentCheck::Html, "episode page")
            .await?;
        let html = String::from_utf8_lossy(&body);

        let script = extract_packed_script(&html)?;
        let stream_url = unpack_stream_url(script, self.sandbox).await?;
        debug!(page_url, stream_url = %stream_url, "Resolved stream URL");
        Ok(stream_url)
    }
}

/// Strategy names as they appear in configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolverKind {
    #[default]
    PackedScript,
    Direct,
}

/// Tagged choice of how page references become stream URLs.
pub enum ResolverStrategy {
    /// Page embeds a packed script that yields the playlist URL.
    PackedScript(PackedScriptResolver),
    /// The reference already is the playlist URL.
    Direct,
}

impl ResolverStrategy {
    pub fn from_kind(kind: ResolverKind, fetch: Arc<dyn HttpFetch>, limits: SandboxLimits) -> Self {
        match kind {
            ResolverKind::PackedScript => {
                ResolverStrategy::PackedScript(PackedScriptResolver::new(fetch, limits))
            }
            ResolverKind::Direct => ResolverStrategy::Direct,
        }
    }
}

#[async_trait]
impl StreamResolver for ResolverStrategy {
    async fn resolve(&self, page_url: &str) -> Result<String, ResolveError> {
        match self {
            ResolverStrategy::PackedScript(resolver) => resolver.resolve(page_url).await,
            ResolverStrategy::Direct => Ok(page_url.to_owned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use bytes::Bytes;

    use super::*;

    const PAGE: &str = "<html><head></head><body>
<script>eval(function(p,a,c,k,e,d){return p.replace('{host}','cdn.example')}('const source=\\'https://{host}/stream/01/uwu.m3u8\\';',0,0,'',0,{}))
</script>
</body></html>";

    struct OnePage(&'static str);

    #[async_trait]
    impl HttpFetch for OnePage {
        async fn get_bytes(
            &self,
            url: &Url,
            check: ContentCheck,
            _operation: &'static str,
        ) -> Result<Bytes, DownloadError> {
            assert_eq!(check, ContentCheck::Html);
            assert_eq!(url.as_str(), "https://kwik.example/e/abc");
            Ok(Bytes::from_static(self.0.as_bytes()))
        }

        async fn download_to_file(
            &self,
            _url: &Url,
            _dest: &Path,
            _progress: &(dyn Fn(f64) + Send + Sync),
        ) -> Result<u64, DownloadError> {
            unreachable!("pages are never streamed to disk")
        }
    }

    #[test]
    fn extracts_packed_body() {
        let script = extract_packed_script(PAGE).unwrap();
        assert!(script.starts_with("(function(p,a,c,k,e,d)"));
        assert!(script.ends_with("{}))"));
    }

    #[test]
    fn page_without_script_has_wrong_shape() {
        assert!(matches!(
            extract_packed_script("<html>nothing here</html>"),
            Err(ResolveError::PageShape(_))
        ));
    }

    #[test]
    fn stream_url_match_is_lazy() {
        assert_eq!(
            find_stream_url("a='https://x/1.m3u8';b='https://y/2.m3u8'").unwrap(),
            "https://x/1.m3u8"
        );
        assert!(matches!(find_stream_url("nothing"), Err(ResolveError::NoStreamUrl)));
    }

    #[tokio::test]
    async fn packed_script_strategy_resolves_page() {
        let strategy = ResolverStrategy::from_kind(
            ResolverKind::PackedScript,
            Arc::new(OnePage(PAGE)),
            SandboxLimits::default(),
        );
        let url = strategy.resolve("https://kwik.example/e/abc").await.unwrap();
        assert_eq!(url, "https://cdn.example/stream/01/uwu.m3u8");
    }

    #[tokio::test]
    async fn broken_script_is_a_resolution_failure() {
        let page = "<script>eval(function(p){throw new Error('boom')}('x'))\n</script>";
        let strategy = ResolverStrategy::PackedScript(PackedScriptResolver::new(
            Arc::new(OnePage(page)),
            SandboxLimits::default(),
        ));
        assert!(matches!(
            strategy.resolve("https://kwik.example/e/abc").await,
            Err(ResolveError::Script(_))
        ));
    }

    #[tokio::test]
    async fn direct_strategy_passes_through() {
        let strategy = ResolverStrategy::Direct;
        assert_eq!(
            strategy.resolve("https://cdn.example/a.m3u8").await.unwrap(),
            "https://cdn.example/a.m3u8"
        );
    }
}
