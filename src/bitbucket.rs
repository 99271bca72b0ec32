//! Bitbucket REST access
//!
//! [`BitbucketApi`] is the single seam through which the sync pipeline talks
//! to the remote. [`BitbucketClient`] implements it over `reqwest` and is
//! built once per sync, then shared by every component.

use anyhow::{Context, Result as AnyResult};
use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error};

use crate::config::BitbucketConfig;
use crate::error::{ApiError, Result, SyncError};
use crate::repository::RepositoryRef;


/// A file at a specific revision that has not been downloaded yet
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RemoteFile {
    pub path: String,
    /// Content hash reported by the listing (may be empty)
    pub sha: String,
}

impl RemoteFile {
    pub fn new(path: impl Into<String>, sha: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            sha: sha.into(),
        }
    }
}

/// Raw contents of a [`RemoteFile`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    pub path: String,
    pub contents: Vec<u8>,
}

/// Contents of one directory at a revision
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryListing {
    pub files: Vec<RemoteFile>,
    /// Names of immediate subdirectories
    pub directories: Vec<String>,
}

#[derive(Deserialize)]
struct RawListing {
    files: Vec<RawFile>,
    #[serde(default)]
    directories: Vec<String>,
}

#[derive(Deserialize)]
struct RawFile {
    path: String,
    #[serde(default)]
    sha: Option<String>,
    #[serde(default)]
    revision: Option<String>,
}

impl DirectoryListing {
    /// Decode a listing body. Bodies without a `files` array are not a
    /// listing and yield `None`.
    pub fn from_json(value: Value) -> Option<Self> {
        let raw: RawListing = serde_json::from_value(value).ok()?;
        Some(Self {
            files: raw
                .files
                .into_iter()
                .map(|f| RemoteFile {
                    path: f.path,
                    sha: f.sha.or(f.revision).unwrap_or_default(),
                })
                .collect(),
            directories: raw.directories,
        })
    }
}

/// Remote operations needed by the sync pipeline
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BitbucketApi: Send + Sync {
    /// Lightweight existence check for the repository
    async fn get_repository(&self, repo: &RepositoryRef) -> std::result::Result<(), ApiError>;

    /// List one directory. `Ok(None)` means the remote answered with
    /// something that is not a directory listing.
    async fn list_directory(
        &self,
        repo: &RepositoryRef,
        revision: &str,
        path: &str,
    ) -> std::result::Result<Option<DirectoryListing>, ApiError>;

    /// Raw contents of one file
    async fn get_raw(
        &self,
        repo: &RepositoryRef,
        revision: &str,
        path: &str,
    ) -> std::result::Result<Vec<u8>, ApiError>;
}

/// Download a single file, logging the path on failure.
pub async fn download_file<A>(
    api: &A,
    repo: &RepositoryRef,
    revision: &str,
    file: &RemoteFile,
) -> Result<DownloadedFile>
where
    A: BitbucketApi + ?Sized,
{
    match api.get_raw(repo, revision, &file.path).await {
        Ok(contents) => Ok(DownloadedFile {
            path: file.path.clone(),
            contents,
        }),
        Err(err) => {
            error!("Error downloading '{}'", file.path);
            error!("{:?}", err);
            Err(SyncError::Download {
                path: file.path.clone(),
                source: err,
            })
        }
    }
}

/// `reqwest` backed Bitbucket client
#[derive(Debug, Clone)]
pub struct BitbucketClient {
    http: reqwest::Client,
    api_root: Url,
    credentials: Option<(String, String)>,
}

impl BitbucketClient {
    pub fn new(config: &BitbucketConfig) -> AnyResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .user_agent(concat!("bitsync/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create Bitbucket HTTP client")?;
        let api_root = Url::parse(&config.api_root())
            .with_context(|| format!("Invalid Bitbucket API root: {}", config.api_root()))?;

        Ok(Self {
            http,
            api_root,
            credentials: config.credentials(),
        })
    }

    /// `repositories/<owner>/<slug>` followed by `resource`, each part
    /// percent-encoded as a single path segment
    fn url<'s>(
        &self,
        repo: &RepositoryRef,
        resource: impl IntoIterator<Item = &'s str>,
    ) -> std::result::Result<Url, ApiError> {
        let mut url = self.api_root.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::new(format!("{} cannot be a base URL", self.api_root)))?
            .pop_if_empty()
            .extend(["repositories", repo.owner.as_str(), repo.name.as_str()])
            .extend(resource);
        Ok(url)
    }

    async fn get(&self, url: Url) -> std::result::Result<reqwest::Response, ApiError> {
        debug!("GET {}", url);

        let mut request = self.http.get(url.clone());
        if let Some((username, password)) = &self.credentials {
            request = request.basic_auth(username, Some(password));
        }

        let response = request
            .send()
            .await
            .map_err(|e| ApiError::new(format!("Request to {} failed: {}", url, e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let mut err = ApiError::with_status(
            status.as_u16(),
            format!("{} returned {}", url, status),
        );
        if let Ok(report) = serde_json::from_str::<Value>(&body) {
            err = err.with_report(report);
        }
        Err(err)
    }
}

#[async_trait]
impl BitbucketApi for BitbucketClient {
    async fn get_repository(&self, repo: &RepositoryRef) -> std::result::Result<(), ApiError> {
        let url = self.url(repo, std::iter::empty())?;
        self.get(url).await.map(|_| ())
    }

    async fn list_directory(
        &self,
        repo: &RepositoryRef,
        revision: &str,
        path: &str,
    ) -> std::result::Result<Option<DirectoryListing>, ApiError> {
        let url = self.url(repo, resource_segments("src", revision, path))?;
        let response = self.get(url.clone()).await?;
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::new(format!("Failed to read listing {}: {}", url, e)))?;

        Ok(serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(DirectoryListing::from_json))
    }

    async fn get_raw(
        &self,
        repo: &RepositoryRef,
        revision: &str,
        path: &str,
    ) -> std::result::Result<Vec<u8>, ApiError> {
        let url = self.url(repo, resource_segments("raw", revision, path))?;
        let response = self.get(url.clone()).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::new(format!("Failed to read {}: {}", url, e)))?;
        Ok(bytes.to_vec())
    }
}

/// `<kind>/<revision>/<path...>`, splitting the repository path on `/`
fn resource_segments<'a>(
    kind: &'a str,
    revision: &'a str,
    path: &'a str,
) -> impl Iterator<Item = &'a str> {
    [kind, revision]
        .into_iter()
        .chain(path.split('/').filter(|segment| !segment.is_empty()))
}
