//! bitsync - Fetch deployable content from a Bitbucket repository
//!
//! bitsync reads one revision of a Bitbucket repository and assembles the
//! rules, database connection scripts and hosted pages it contains into
//! in-memory entities, ready to be reconciled with a deployment.
//!
//! ## Modules
//!
//! - [`config`]: Configuration management and parsing
//! - [`repository`]: Repository specifier parsing
//! - [`paths`]: Path classification into rules, databases and pages
//! - [`bitbucket`]: Bitbucket REST client and file fetching
//! - [`tree`]: Tree walk over the synced directories
//! - [`entities`]: Entity records and grouping
//! - [`download`]: Bounded concurrent entity downloads
//! - [`reconcile`]: Hand-off to the reconciliation step
//! - [`sync`]: Top-level sync orchestration

pub mod bitbucket;
pub mod config;
pub mod download;
pub mod entities;
pub mod error;
pub mod paths;
pub mod reconcile;
pub mod repository;
pub mod sync;
pub mod tree;

pub use bitbucket::{BitbucketApi, BitbucketClient, DirectoryListing, DownloadedFile, RemoteFile};
pub use config::Config;
pub use entities::{DatabaseEntity, DatabaseScript, PageEntity, RuleEntity};
pub use error::{ApiError, SyncError};
pub use reconcile::{RawReconciler, Reconciler, ScriptAsset};
pub use repository::RepositoryRef;
pub use sync::{ProgressSink, SourceSync, SyncOutput};
