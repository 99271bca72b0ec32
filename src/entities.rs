//! Entity records and grouping of flat file lists into entities
//!
//! Groupers only look at files their category predicate accepts. Maps are
//! keyed by entity name in a `BTreeMap`, so the grouped result does not depend
//! on listing order.

use std::collections::BTreeMap;
use tracing::warn;

use crate::bitbucket::RemoteFile;
use crate::paths::{file_stem, has_extension, PathClassifier};

/// A rule: script and/or metadata sharing one filename stem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleEntity {
    pub name: String,
    pub script: Option<Vec<u8>>,
    pub metadata: Option<Vec<u8>>,
}

impl RuleEntity {
    pub fn has_script(&self) -> bool {
        self.script.is_some()
    }

    pub fn has_metadata(&self) -> bool {
        self.metadata.is_some()
    }
}

/// A hosted page: html and/or metadata sharing one filename stem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageEntity {
    pub name: String,
    pub html: Option<Vec<u8>>,
    pub metadata: Option<Vec<u8>>,
}

impl PageEntity {
    pub fn has_metadata(&self) -> bool {
        self.metadata.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseScript {
    /// Script role, e.g. `login`
    pub name: String,
    pub contents: Vec<u8>,
}

/// A database connection and its scripts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseEntity {
    pub name: String,
    pub scripts: Vec<DatabaseScript>,
}

/// Files making up one rule, not yet downloaded
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleFiles {
    pub script: Option<RemoteFile>,
    pub metadata: Option<RemoteFile>,
}

/// Files making up one page, not yet downloaded
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageFiles {
    pub html: Option<RemoteFile>,
    pub metadata: Option<RemoteFile>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseScriptFile {
    pub name: String,
    pub file: RemoteFile,
}

/// Group rule files by stem: `.js` is the script, `.json` the metadata.
pub fn group_rules(classifier: &PathClassifier, files: &[RemoteFile]) -> BTreeMap<String, RuleFiles> {
    let mut rules: BTreeMap<String, RuleFiles> = BTreeMap::new();

    for file in files.iter().filter(|f| classifier.is_rule(&f.path)) {
        let name = file_stem(&file.path).to_string();
        if has_extension(&file.path, "js") {
            let entry = rules.entry(name.clone()).or_default();
            fill_slot(&mut entry.script, file, &name);
        } else if has_extension(&file.path, "json") {
            let entry = rules.entry(name.clone()).or_default();
            fill_slot(&mut entry.metadata, file, &name);
        }
    }

    rules
}

/// Group page files by stem: `.json` is the metadata, anything else the html.
pub fn group_pages(classifier: &PathClassifier, files: &[RemoteFile]) -> BTreeMap<String, PageFiles> {
    let mut pages: BTreeMap<String, PageFiles> = BTreeMap::new();

    for file in files.iter().filter(|f| classifier.is_page(&f.path)) {
        let name = file_stem(&file.path).to_string();
        let entry = pages.entry(name.clone()).or_default();
        if file.path.ends_with(".json") {
            fill_slot(&mut entry.metadata, file, &name);
        } else {
            fill_slot(&mut entry.html, file, &name);
        }
    }

    pages
}

/// Group database scripts by connection directory, scripts ordered by role.
pub fn group_databases(
    classifier: &PathClassifier,
    files: &[RemoteFile],
) -> BTreeMap<String, Vec<DatabaseScriptFile>> {
    let mut databases: BTreeMap<String, BTreeMap<String, Option<RemoteFile>>> = BTreeMap::new();

    for file in files.iter().filter(|f| classifier.is_database_connection(&f.path)) {
        if let Some(details) = classifier.database_script_details(&file.path) {
            let slot = databases
                .entry(details.database.clone())
                .or_default()
                .entry(details.name)
                .or_default();
            fill_slot(slot, file, &details.database);
        }
    }

    databases
        .into_iter()
        .map(|(database, scripts)| {
            let scripts = scripts
                .into_iter()
                .filter_map(|(name, file)| file.map(|file| DatabaseScriptFile { name, file }))
                .collect();
            (database, scripts)
        })
        .collect()
}

/// Put `file` into an entity slot. A slot holds one file; on collision the
/// lexicographically smallest path wins.
fn fill_slot(slot: &mut Option<RemoteFile>, file: &RemoteFile, entity: &str) {
    match slot {
        Some(existing) => {
            warn!(
                "Entity '{}' has both '{}' and '{}' for the same slot",
                entity, existing.path, file.path
            );
            if file.path < existing.path {
                *existing = file.clone();
            }
        }
        None => *slot = Some(file.clone()),
    }
}
