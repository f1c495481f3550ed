//! Fetching referenced documents.
//!
//! Fetching is the only I/O a build performs and it happens strictly before
//! the resolver starts draining the queue.
use std::time::Duration;

use once_cell::sync::OnceCell;
use tracing::debug;

use crate::error::ErrorKind;

pub trait DocumentFetcher: Send + Sync {
    /// Return the JSON text of the document description at `url`.
    fn fetch(&self, url: &str) -> Result<String, ErrorKind>;
}

/// Reads `http(s)` URLs with a blocking client, `file://` URLs and bare paths from disk.
#[derive(Debug)]
pub struct DefaultFetcher {
    timeout: Duration,
    client: OnceCell<reqwest::blocking::Client>,
}

impl DefaultFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout, client: OnceCell::new() }
    }

    fn client(&self, url: &str) -> Result<&reqwest::blocking::Client, ErrorKind> {
        self.client.get_or_try_init(|| {
            reqwest::blocking::Client::builder()
                .timeout(self.timeout)
                .build()
                .map_err(|error| fetch_error(url, error))
        })
    }

    fn fetch_http(&self, url: &str) -> Result<String, ErrorKind> {
        let response = self
            .client(url)?
            .get(url)
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(|error| fetch_error(url, error))?;
        response.text().map_err(|error| fetch_error(url, error))
    }
}

impl DocumentFetcher for DefaultFetcher {
    fn fetch(&self, url: &str) -> Result<String, ErrorKind> {
        debug!(%url, "fetching referenced document");
        if url.starts_with("http://") || url.starts_with("https://") {
            return self.fetch_http(url);
        }
        let path = url.strip_prefix("file://").unwrap_or(url);
        std::fs::read_to_string(path).map_err(|error| fetch_error(url, error))
    }
}

fn fetch_error(url: &str, error: impl std::fmt::Display) -> ErrorKind {
    ErrorKind::Fetch { url: url.to_string(), reason: error.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_file_urls_and_plain_paths() {
        let dir = std::env::temp_dir().join(format!("api-typegraph-fetch-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("doc.json");
        std::fs::write(&path, r#"{ "types": {} }"#).unwrap();

        let fetcher = DefaultFetcher::new(Duration::from_secs(1));
        let plain = fetcher.fetch(path.to_str().unwrap()).unwrap();
        let file_url = fetcher.fetch(&format!("file://{}", path.display())).unwrap();
        assert_eq!(plain, file_url);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_file_is_a_fetch_error() {
        let fetcher = DefaultFetcher::new(Duration::from_secs(1));
        let error = fetcher.fetch("file:///no/such/document.json").unwrap_err();
        assert!(matches!(error, ErrorKind::Fetch { ref url, .. } if url == "file:///no/such/document.json"));
    }
}
