//! Common test utilities and helpers for bitsync tests
#![allow(dead_code)]

use async_trait::async_trait;
use bitsync::reconcile::{Reconciler, ScriptAsset};
use bitsync::{ApiError, BitbucketApi, DatabaseEntity, DirectoryListing, RemoteFile, RepositoryRef};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// In-memory Bitbucket with call accounting
#[derive(Default)]
pub struct FakeBitbucket {
    pub missing_repository: bool,
    listings: HashMap<String, std::result::Result<Option<DirectoryListing>, ApiError>>,
    files: HashMap<String, std::result::Result<Vec<u8>, ApiError>>,
    raw_delay: Duration,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    raw_calls: AtomicUsize,
    revisions: Mutex<Vec<String>>,
}

impl FakeBitbucket {
    pub fn new() -> Self {
        Self {
            raw_delay: Duration::from_millis(20),
            ..Default::default()
        }
    }

    /// Register a directory listing; every listed file is served with
    /// contents equal to `contents of <path>`.
    pub fn with_directory(mut self, path: &str, files: &[&str], directories: &[&str]) -> Self {
        let listing = DirectoryListing {
            files: files
                .iter()
                .map(|p| RemoteFile::new(*p, format!("sha-{}", p)))
                .collect(),
            directories: directories.iter().map(|d| d.to_string()).collect(),
        };
        for file in files {
            self.files
                .entry(file.to_string())
                .or_insert_with(|| Ok(format!("contents of {}", file).into_bytes()));
        }
        self.listings.insert(path.to_string(), Ok(Some(listing)));
        self
    }

    pub fn with_listing_error(mut self, path: &str, error: ApiError) -> Self {
        self.listings.insert(path.to_string(), Err(error));
        self
    }

    pub fn with_failing_file(mut self, path: &str) -> Self {
        self.files.insert(
            path.to_string(),
            Err(ApiError::with_status(500, "Internal Server Error")),
        );
        self
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn raw_calls(&self) -> usize {
        self.raw_calls.load(Ordering::SeqCst)
    }

    /// Revisions used by every listing and download, in call order
    pub fn revisions(&self) -> Vec<String> {
        self.revisions.lock().unwrap().clone()
    }
}

#[async_trait]
impl BitbucketApi for FakeBitbucket {
    async fn get_repository(&self, _repo: &RepositoryRef) -> std::result::Result<(), ApiError> {
        if self.missing_repository {
            Err(ApiError::with_status(404, "Not Found"))
        } else {
            Ok(())
        }
    }

    async fn list_directory(
        &self,
        _repo: &RepositoryRef,
        revision: &str,
        path: &str,
    ) -> std::result::Result<Option<DirectoryListing>, ApiError> {
        self.revisions.lock().unwrap().push(revision.to_string());
        self.listings
            .get(path)
            .cloned()
            .unwrap_or_else(|| Err(ApiError::with_status(404, "Not Found")))
    }

    async fn get_raw(
        &self,
        _repo: &RepositoryRef,
        revision: &str,
        path: &str,
    ) -> std::result::Result<Vec<u8>, ApiError> {
        self.revisions.lock().unwrap().push(revision.to_string());
        self.raw_calls.fetch_add(1, Ordering::SeqCst);

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);
        tokio::time::sleep(self.raw_delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.files
            .get(path)
            .cloned()
            .unwrap_or_else(|| Err(ApiError::with_status(404, "Not Found")))
    }
}

/// (name, body, metadata) as handed to the reconciler
pub type ScriptTuple = (String, Option<Vec<u8>>, Option<Vec<u8>>);

/// Reconciler that returns exactly what it was given
pub struct RecordingReconciler;

impl Reconciler for RecordingReconciler {
    type Scripts = Vec<ScriptTuple>;
    type Databases = Vec<DatabaseEntity>;

    fn unify_scripts<S: ScriptAsset>(&self, entities: Vec<S>) -> Self::Scripts {
        entities
            .iter()
            .map(|e| {
                (
                    e.name().to_string(),
                    e.body().map(|b| b.to_vec()),
                    e.metadata().map(|m| m.to_vec()),
                )
            })
            .collect()
    }

    fn unify_databases(&self, entities: Vec<DatabaseEntity>) -> Self::Databases {
        entities
    }
}

pub fn contents(path: &str) -> Option<Vec<u8>> {
    Some(format!("contents of {}", path).into_bytes())
}

/// A repository exercising every category
pub fn full_fixture() -> FakeBitbucket {
    FakeBitbucket::new()
        .with_directory("rules", &["rules/a.js", "rules/a.json", "rules/b.js", "rules/README.md"], &[])
        .with_directory(
            "pages",
            &["pages/login.html", "pages/login.json", "pages/unknown.html"],
            &[],
        )
        .with_directory("database-connections", &[], &["db1", "db2"])
        .with_directory(
            "database-connections/db1",
            &["database-connections/db1/login.js"],
            &[],
        )
        .with_directory(
            "database-connections/db2",
            &["database-connections/db2/helper.js"],
            &[],
        )
}
