//! Tree walk over the three synced directories
//!
//! Listing contract for the top-level directories:
//! - 404: the directory does not exist at this revision, contributes nothing
//! - a body that is not a directory listing: contributes nothing
//! - any other error: aborts the walk
//!
//! Database connection subdirectories are listed all at once. Their count is
//! bounded by the number of configured connections, so no ceiling is applied.
//! A 404 on a subdirectory is not recovered.

use futures::future::try_join_all;
use std::collections::HashSet;
use tracing::debug;

use crate::bitbucket::{BitbucketApi, DirectoryListing, RemoteFile};
use crate::error::Result;
use crate::paths::PathClassifier;
use crate::repository::RepositoryRef;

pub struct TreeWalker<'a, A: ?Sized> {
    api: &'a A,
    classifier: &'a PathClassifier,
}

impl<'a, A> TreeWalker<'a, A>
where
    A: BitbucketApi + ?Sized,
{
    pub fn new(api: &'a A, classifier: &'a PathClassifier) -> Self {
        Self { api, classifier }
    }

    /// List every relevant file at `revision`: rules, then database scripts, then pages.
    pub async fn walk(&self, repo: &RepositoryRef, revision: &str) -> Result<Vec<RemoteFile>> {
        let layout = self.classifier.layout();

        let (rules, connections, pages) = tokio::try_join!(
            self.category_files(repo, revision, &layout.rules_directory),
            self.connection_files(repo, revision),
            self.category_files(repo, revision, &layout.pages_directory),
        )?;

        debug!(
            "Tree at {}: {} rule files, {} database files, {} page files",
            revision,
            rules.len(),
            connections.len(),
            pages.len()
        );

        let mut seen = HashSet::new();
        Ok(rules
            .into_iter()
            .chain(connections)
            .chain(pages)
            .filter(|file| seen.insert(file.path.clone()))
            .collect())
    }

    async fn category_files(
        &self,
        repo: &RepositoryRef,
        revision: &str,
        directory: &str,
    ) -> Result<Vec<RemoteFile>> {
        let listing = self.list_top_level(repo, revision, directory).await?;
        Ok(self.valid_files(listing))
    }

    async fn connection_files(&self, repo: &RepositoryRef, revision: &str) -> Result<Vec<RemoteFile>> {
        let root = &self.classifier.layout().database_connections_directory;
        let Some(listing) = self.list_top_level(repo, revision, root).await? else {
            return Ok(Vec::new());
        };

        let subdirectories = listing.directories.iter().map(|dir| async move {
            let path = format!("{}/{}", root, dir);
            let listing = self.api.list_directory(repo, revision, &path).await?;
            Ok::<_, crate::error::SyncError>(self.valid_files(listing))
        });

        Ok(try_join_all(subdirectories).await?.into_iter().flatten().collect())
    }

    async fn list_top_level(
        &self,
        repo: &RepositoryRef,
        revision: &str,
        directory: &str,
    ) -> Result<Option<DirectoryListing>> {
        match self.api.list_directory(repo, revision, directory).await {
            Ok(listing) => Ok(listing),
            Err(err) if err.is_not_found() => {
                debug!("Directory '{}' not found at {}, treating as empty", directory, revision);
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    fn valid_files(&self, listing: Option<DirectoryListing>) -> Vec<RemoteFile> {
        listing
            .map(|listing| {
                listing
                    .files
                    .into_iter()
                    .filter(|file| self.classifier.is_valid_file(&file.path))
                    .collect()
            })
            .unwrap_or_default()
    }
}
