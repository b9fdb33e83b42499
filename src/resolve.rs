//! Turning an image reference into a readable local file.
//!
//! A reference is whatever the template author wrote as the image source:
//! a path relative to the source root (`posts/hero.jpg`, `/posts/hero.jpg`)
//! or an absolute `http(s)` URL. Remote images are downloaded once into the
//! staging directory and reused by every later build; the staged file name
//! is derived from host and path, so the query string does not matter.

use reqwest::Url;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("file not found: {0}")]
    NotFound(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("download failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server answered {status} for {url}")]
    Status { url: String, status: u16 },
}

/// Where an image's bytes live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageReference {
    Local(PathBuf),
    Remote(Url),
}

impl ImageReference {
    /// Classify a raw reference. Only `http` and `https` URLs are remote;
    /// everything else is a path under `source_root`.
    pub fn parse(raw: &str, source_root: &Path) -> Self {
        if let Ok(url) = Url::parse(raw)
            && matches!(url.scheme(), "http" | "https")
        {
            return Self::Remote(url);
        }
        Self::Local(source_root.join(raw.trim_start_matches('/')))
    }
}

/// Download settings.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::blocking::Client,
    staging_dir: PathBuf,
}

impl Fetcher {
    pub fn new(
        staging_dir: PathBuf,
        timeout: Option<Duration>,
        user_agent: &str,
    ) -> Result<Self, ResolveError> {
        let mut builder = reqwest::blocking::Client::builder().user_agent(user_agent);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            staging_dir,
        })
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    /// Local path of a reference, downloading remote images on first use.
    ///
    /// Returns the path and whether a download happened.
    pub fn resolve(&self, reference: &ImageReference) -> Result<(PathBuf, bool), ResolveError> {
        match reference {
            ImageReference::Local(path) => {
                if path.is_file() {
                    Ok((path.clone(), false))
                } else {
                    Err(ResolveError::NotFound(path.clone()))
                }
            }
            ImageReference::Remote(url) => self.fetch(url),
        }
    }

    fn fetch(&self, url: &Url) -> Result<(PathBuf, bool), ResolveError> {
        let target = self.staging_dir.join(remote_filename(url));
        if target.is_file() {
            tracing::debug!(url = %url, path = %target.display(), "remote image already staged");
            return Ok((target, false));
        }

        tracing::info!(url = %url, "downloading remote image");
        let response = self.client.get(url.clone()).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let bytes = response.bytes()?;

        fs::create_dir_all(&self.staging_dir)?;
        let mut tmp = NamedTempFile::new_in(&self.staging_dir)?;
        tmp.write_all(&bytes)?;
        tmp.persist(&target).map_err(|e| e.error)?;
        Ok((target, true))
    }
}

/// File name a remote image is staged under: host and path with every
/// character outside `[A-Za-z0-9._-]` replaced by `_`. The query and
/// fragment are ignored.
pub fn remote_filename(url: &Url) -> String {
    let raw = format!(
        "{}{}",
        url.host_str().unwrap_or("remote"),
        url.path().trim_end_matches('/')
    );
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
