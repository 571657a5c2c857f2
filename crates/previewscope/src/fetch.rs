//! Preview fetching
//!
//! `AudioSource` abstracts where preview bytes come from so the session can be
//! exercised without a network. `HttpAudioSource` is the production
//! implementation, downloading the whole preview over HTTP before decode.

use std::time::Duration;

use crate::config::network::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS, USER_AGENT};
use crate::error::{PlayerError, Result};

/// Raw preview bytes plus a probe hint derived from the source
#[derive(Debug, Clone)]
pub struct FetchedAudio {
    pub bytes: Vec<u8>,
    /// File extension (e.g. "m4a") when the source exposes one
    pub extension_hint: Option<String>,
}

/// Where preview audio comes from
pub trait AudioSource: Send + Sync {
    /// Fetch the complete preview at `url`
    fn fetch(&self, url: &str) -> Result<FetchedAudio>;
}

/// Extract a probe-worthy file extension from a URL path
pub fn extension_from_url(url: &str) -> Option<String> {
    // Strip query/fragment before looking at the last path segment
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let segment = path.rsplit('/').next()?;
    let (_, ext) = segment.rsplit_once('.')?;
    if ext.is_empty() || ext.len() > 5 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// HTTP preview source backed by a blocking reqwest client
pub struct HttpAudioSource {
    client: reqwest::blocking::Client,
}

impl HttpAudioSource {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(READ_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client })
    }
}

impl AudioSource for HttpAudioSource {
    fn fetch(&self, url: &str) -> Result<FetchedAudio> {
        let response = self.client.get(url).send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(PlayerError::Download(format!(
                "HTTP {} from {}",
                status, url
            )));
        }

        let bytes = response.bytes()?.to_vec();
        if bytes.is_empty() {
            return Err(PlayerError::Download(format!("empty response from {}", url)));
        }

        Ok(FetchedAudio {
            bytes,
            extension_hint: extension_from_url(url),
        })
    }
}

/// Local-file source, mainly for the CLI's file mode and tests
pub struct FileAudioSource;

impl AudioSource for FileAudioSource {
    fn fetch(&self, path: &str) -> Result<FetchedAudio> {
        let bytes = std::fs::read(path)
            .map_err(|e| PlayerError::FileLoad(format!("{}: {}", path, e)))?;
        Ok(FetchedAudio {
            bytes,
            extension_hint: extension_from_url(path),
        })
    }
}
