//! Resolving resource locators to bytes.

use std::path::{Path, PathBuf};
#[cfg(feature = "http")]
use std::sync::mpsc::{self, RecvTimeoutError};
#[cfg(feature = "http")]
use std::time::Duration;

use thiserror::Error;

use crate::execute::CallContext;

/// How often an in-flight HTTP fetch checks its context.
#[cfg(feature = "http")]
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Errors from fetching a resource.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("unsupported locator scheme: {0}")]
    UnsupportedScheme(String),

    #[error("fetch deadline exceeded")]
    DeadlineExceeded,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("request failed: {0}")]
    Request(String),
}

/// Resolves an opaque locator to raw bytes.
///
/// Implementations must give up once `ctx` is done; the context carries the
/// earlier of the fetch timeout and the calling script's deadline.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, locator: &str, ctx: &CallContext) -> Result<Vec<u8>, FetchError>;
}

/// Fetcher for filesystem paths, `file://` URIs and, with the `http`
/// feature, `http://`/`https://` URLs.
#[derive(Debug, Clone, Default)]
pub struct DefaultFetcher {
    base_dir: Option<PathBuf>,
    #[cfg(feature = "http")]
    client: reqwest::blocking::Client,
}

impl DefaultFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative paths against `dir` instead of the working directory.
    pub fn with_base_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(dir.into()),
            ..Self::default()
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>, FetchError> {
        let path = self.resolve(path);
        std::fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => FetchError::NotFound(path.display().to_string()),
            _ => FetchError::Io(e),
        })
    }

    /// GET `url` on a worker thread while watching `ctx`.
    ///
    /// A blocking request cannot be interrupted, so once `ctx` is done the
    /// worker is abandoned and finishes when its own request timeout fires.
    #[cfg(feature = "http")]
    fn get_url(&self, url: &str, ctx: &CallContext) -> Result<Vec<u8>, FetchError> {
        let mut request = self.client.get(url);
        if let Some(remaining) = ctx.remaining() {
            request = request.timeout(remaining);
        }

        let (tx, rx) = mpsc::channel();
        std::thread::Builder::new()
            .name("relay-fetch".to_string())
            .spawn(move || {
                // The receiver is gone if the caller gave up.
                let _ = tx.send(send_request(request));
            })?;

        loop {
            if ctx.is_done() {
                tracing::debug!(url, "abandoning in-flight fetch");
                return Err(FetchError::DeadlineExceeded);
            }
            match rx.recv_timeout(POLL_INTERVAL) {
                Ok(result) => return result,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(FetchError::Request("fetch worker exited".to_string()));
                }
            }
        }
    }
}

#[cfg(feature = "http")]
fn send_request(request: reqwest::blocking::RequestBuilder) -> Result<Vec<u8>, FetchError> {
    let response = request
        .send()
        .and_then(|r| r.error_for_status())
        .map_err(|e| {
            if e.is_timeout() {
                FetchError::DeadlineExceeded
            } else {
                FetchError::Request(e.to_string())
            }
        })?;
    let bytes = response
        .bytes()
        .map_err(|e| FetchError::Request(e.to_string()))?;
    Ok(bytes.to_vec())
}

impl Fetcher for DefaultFetcher {
    fn fetch(&self, locator: &str, ctx: &CallContext) -> Result<Vec<u8>, FetchError> {
        if ctx.is_done() {
            return Err(FetchError::DeadlineExceeded);
        }

        if let Some(path) = locator.strip_prefix("file://") {
            return self.read_file(path);
        }

        match locator.split_once("://") {
            #[cfg(feature = "http")]
            Some(("http" | "https", _)) => self.get_url(locator, ctx),
            Some((scheme, _)) => Err(FetchError::UnsupportedScheme(scheme.to_string())),
            None => self.read_file(locator),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_paths_and_file_uris() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("model.xml");
        std::fs::write(&path, b"<Node/>").unwrap();

        let fetcher = DefaultFetcher::new();
        let ctx = CallContext::background();

        let plain = fetcher.fetch(path.to_str().unwrap(), &ctx).unwrap();
        assert_eq!(plain, b"<Node/>");

        let uri = format!("file://{}", path.display());
        assert_eq!(fetcher.fetch(&uri, &ctx).unwrap(), b"<Node/>");
    }

    #[test]
    fn test_base_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("m.xml"), b"x").unwrap();

        let fetcher = DefaultFetcher::with_base_dir(dir.path());
        assert_eq!(fetcher.fetch("m.xml", &CallContext::background()).unwrap(), b"x");
    }

    #[test]
    fn test_missing_file() {
        let err = DefaultFetcher::new()
            .fetch("/definitely/not/here.xml", &CallContext::background())
            .unwrap_err();
        assert!(matches!(err, FetchError::NotFound(_)));
    }

    #[test]
    fn test_unknown_scheme() {
        let err = DefaultFetcher::new()
            .fetch("model://stub", &CallContext::background())
            .unwrap_err();
        assert!(matches!(err, FetchError::UnsupportedScheme(s) if s == "model"));
    }

    #[test]
    fn test_done_context() {
        let ctx = CallContext::background();
        ctx.cancel();
        let err = DefaultFetcher::new().fetch("anything", &ctx).unwrap_err();
        assert!(matches!(err, FetchError::DeadlineExceeded));
    }

    /// Accepts connections on a local port and never answers them.
    #[cfg(feature = "http")]
    fn silent_server() -> std::net::SocketAddr {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            let mut held = Vec::new();
            for stream in listener.incoming().flatten() {
                held.push(stream);
            }
        });
        addr
    }

    #[cfg(feature = "http")]
    #[test]
    fn test_abort_interrupts_http_fetch() {
        use std::time::Instant;

        use crate::execute::AbortHandle;

        let addr = silent_server();
        let handle = AbortHandle::new();
        let ctx = CallContext::with_timeout(Duration::from_secs(30)).abort_handle(handle.clone());
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            handle.abort();
        });

        let start = Instant::now();
        let err = DefaultFetcher::new()
            .fetch(&format!("http://{addr}/model.xml"), &ctx)
            .unwrap_err();
        assert!(matches!(err, FetchError::DeadlineExceeded));
        assert!(start.elapsed() < Duration::from_secs(2), "took {:?}", start.elapsed());
    }

    #[cfg(feature = "http")]
    #[test]
    fn test_http_fetch_honours_deadline() {
        let addr = silent_server();
        let ctx = CallContext::with_timeout(Duration::from_millis(150));

        let err = DefaultFetcher::new()
            .fetch(&format!("http://{addr}/model.xml"), &ctx)
            .unwrap_err();
        assert!(matches!(err, FetchError::DeadlineExceeded));
    }
}
