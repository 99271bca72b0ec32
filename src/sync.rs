//! Sync orchestration
//!
//! A sync validates the repository, walks the tree at the requested revision,
//! downloads rules, databases and pages in parallel and hands the three entity
//! lists to a [`Reconciler`]. The result is all or nothing: any failure fails
//! the whole sync.

use anyhow::{Context, Result as AnyResult};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::bitbucket::{BitbucketApi, BitbucketClient, RemoteFile};
use crate::config::{Config, LayoutConfig};
use crate::download::EntityDownloader;
use crate::entities::{group_databases, group_pages, group_rules};
use crate::error::{Result, SyncError};
use crate::paths::PathClassifier;
use crate::reconcile::Reconciler;
use crate::repository::RepositoryRef;
use crate::tree::TreeWalker;

/// Receives structured diagnostics while a sync runs
pub trait ProgressSink: Send + Sync {
    fn log(&self, entry: &Value);
}

impl<F> ProgressSink for F
where
    F: Fn(&Value) + Send + Sync,
{
    fn log(&self, entry: &Value) {
        self(entry)
    }
}

/// Reconciled output of one sync
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncOutput<S, D> {
    pub rules: S,
    pub databases: D,
    pub pages: S,
}

/// Fetches the synced content of a repository revision
pub struct SourceSync<A: ?Sized, R> {
    api: Arc<A>,
    classifier: PathClassifier,
    reconciler: R,
    entity_concurrency: usize,
}

impl<R: Reconciler> SourceSync<BitbucketClient, R> {
    /// Build a sync with one shared Bitbucket client from configuration
    pub fn from_config(config: &Config, reconciler: R) -> AnyResult<Self> {
        let client = BitbucketClient::new(&config.bitbucket)
            .context("Failed to create Bitbucket client")?;
        Ok(Self::new(Arc::new(client), config.layout.clone(), reconciler)
            .with_entity_concurrency(config.sync.effective_concurrency()))
    }
}

impl<A, R> SourceSync<A, R>
where
    A: BitbucketApi + ?Sized,
    R: Reconciler,
{
    pub fn new(api: Arc<A>, layout: LayoutConfig, reconciler: R) -> Self {
        Self {
            api,
            classifier: PathClassifier::new(layout),
            reconciler,
            entity_concurrency: 2,
        }
    }

    pub fn with_entity_concurrency(mut self, concurrency: usize) -> Self {
        self.entity_concurrency = concurrency.max(1);
        self
    }

    pub fn classifier(&self) -> &PathClassifier {
        &self.classifier
    }

    /// Parse the specifier and confirm the repository is reachable.
    pub async fn check_repository(&self, specifier: &str) -> Result<RepositoryRef> {
        let repo = RepositoryRef::parse(specifier)?;

        match self.api.get_repository(&repo).await {
            Ok(()) => Ok(repo),
            Err(err) if err.is_not_found() => Err(SyncError::RepositoryNotFound {
                owner: repo.owner,
                name: repo.name,
            }),
            Err(err) => Err(err.into()),
        }
    }

    /// Walk the tree. A failure carrying a report is forwarded to `progress`
    /// before being returned.
    pub async fn fetch_tree(
        &self,
        repo: &RepositoryRef,
        revision: &str,
        progress: Option<&dyn ProgressSink>,
    ) -> Result<Vec<RemoteFile>> {
        let walker = TreeWalker::new(self.api.as_ref(), &self.classifier);
        match walker.walk(repo, revision).await {
            Ok(files) => Ok(files),
            Err(err) => {
                if let (Some(progress), Some(report)) = (progress, err.report()) {
                    progress.log(report);
                }
                Err(err)
            }
        }
    }

    /// Fetch and reconcile everything synced from `repository` at `revision`.
    ///
    /// `branch` is accepted for callers that track it but every read is
    /// pinned to `revision`.
    pub async fn sync(
        &self,
        repository: &str,
        branch: &str,
        revision: &str,
        progress: Option<&dyn ProgressSink>,
    ) -> Result<SyncOutput<R::Scripts, R::Databases>> {
        let start_time = Instant::now();

        let repo = self.check_repository(repository).await?;
        info!("Syncing {} at {} (branch {})", repo, revision, branch);

        let files = self.fetch_tree(&repo, revision, progress).await?;
        if tracing::enabled!(tracing::Level::DEBUG) {
            debug!(
                "Files in tree: {}",
                serde_json::to_string_pretty(&files).unwrap_or_default()
            );
        }

        let downloader = EntityDownloader::new(
            self.api.as_ref(),
            &repo,
            revision,
            self.entity_concurrency,
        );

        let (rules, pages, databases) = tokio::try_join!(
            downloader.download_rules(group_rules(&self.classifier, &files)),
            downloader.download_pages(group_pages(&self.classifier, &files)),
            downloader.download_databases(group_databases(&self.classifier, &files)),
        )?;

        info!(
            "Fetched {} rules, {} pages, {} databases from {} in {:.2}s",
            rules.len(),
            pages.len(),
            databases.len(),
            repo,
            start_time.elapsed().as_secs_f64()
        );

        Ok(SyncOutput {
            rules: self.reconciler.unify_scripts(rules),
            databases: self.reconciler.unify_databases(databases),
            pages: self.reconciler.unify_scripts(pages),
        })
    }
}
