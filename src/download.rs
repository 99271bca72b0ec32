//! Concurrent download of grouped entities
//!
//! All slots of one entity are fetched together and the entity fails as soon
//! as one of them does. Across entities at most `concurrency` assemblies run
//! at a time per category, which keeps the request rate against Bitbucket
//! low. The first failing entity fails the whole category.

use futures::future::try_join_all;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::BTreeMap;
use tracing::debug;

use crate::bitbucket::{download_file, BitbucketApi, RemoteFile};
use crate::entities::{
    DatabaseEntity, DatabaseScript, DatabaseScriptFile, PageEntity, PageFiles, RuleEntity,
    RuleFiles,
};
use crate::error::Result;
use crate::repository::RepositoryRef;

pub struct EntityDownloader<'a, A: ?Sized> {
    api: &'a A,
    repo: &'a RepositoryRef,
    revision: &'a str,
    concurrency: usize,
}

impl<'a, A> EntityDownloader<'a, A>
where
    A: BitbucketApi + ?Sized,
{
    pub fn new(api: &'a A, repo: &'a RepositoryRef, revision: &'a str, concurrency: usize) -> Self {
        Self {
            api,
            repo,
            revision,
            concurrency: concurrency.max(1),
        }
    }

    pub async fn download_rules(&self, rules: BTreeMap<String, RuleFiles>) -> Result<Vec<RuleEntity>> {
        stream::iter(rules)
            .map(|(name, files)| self.download_rule(name, files))
            .buffered(self.concurrency)
            .try_collect()
            .await
    }

    pub async fn download_pages(&self, pages: BTreeMap<String, PageFiles>) -> Result<Vec<PageEntity>> {
        stream::iter(pages)
            .map(|(name, files)| self.download_page(name, files))
            .buffered(self.concurrency)
            .try_collect()
            .await
    }

    pub async fn download_databases(
        &self,
        databases: BTreeMap<String, Vec<DatabaseScriptFile>>,
    ) -> Result<Vec<DatabaseEntity>> {
        stream::iter(databases)
            .map(|(name, scripts)| self.download_database(name, scripts))
            .buffered(self.concurrency)
            .try_collect()
            .await
    }

    pub async fn download_rule(&self, name: String, files: RuleFiles) -> Result<RuleEntity> {
        debug!("Downloading rule '{}'", name);
        let (script, metadata) = futures::try_join!(
            self.fetch_slot(files.script.as_ref()),
            self.fetch_slot(files.metadata.as_ref()),
        )?;
        Ok(RuleEntity {
            name,
            script,
            metadata,
        })
    }

    pub async fn download_page(&self, name: String, files: PageFiles) -> Result<PageEntity> {
        debug!("Downloading page '{}'", name);
        let (html, metadata) = futures::try_join!(
            self.fetch_slot(files.html.as_ref()),
            self.fetch_slot(files.metadata.as_ref()),
        )?;
        Ok(PageEntity {
            name,
            html,
            metadata,
        })
    }

    pub async fn download_database(
        &self,
        name: String,
        scripts: Vec<DatabaseScriptFile>,
    ) -> Result<DatabaseEntity> {
        debug!("Downloading {} scripts for database '{}'", scripts.len(), name);
        let scripts = try_join_all(scripts.into_iter().map(|script| async move {
            let file = download_file(self.api, self.repo, self.revision, &script.file).await?;
            Ok::<_, crate::error::SyncError>(DatabaseScript {
                name: script.name,
                contents: file.contents,
            })
        }))
        .await?;
        Ok(DatabaseEntity { name, scripts })
    }

    async fn fetch_slot(&self, file: Option<&RemoteFile>) -> Result<Option<Vec<u8>>> {
        match file {
            Some(file) => {
                let downloaded = download_file(self.api, self.repo, self.revision, file).await?;
                Ok(Some(downloaded.contents))
            }
            None => Ok(None),
        }
    }
}
