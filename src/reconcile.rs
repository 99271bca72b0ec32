//! Hand-off of downloaded entities to the reconciliation step
//!
//! The real merge against deployment state lives outside this crate. A
//! [`Reconciler`] receives the raw entity lists and its output is returned
//! from a sync untouched.

use serde::Serialize;

use crate::entities::{DatabaseEntity, PageEntity, RuleEntity};

/// Common view over rules and pages
pub trait ScriptAsset {
    fn name(&self) -> &str;
    /// Script source for rules, html for pages
    fn body(&self) -> Option<&[u8]>;
    fn metadata(&self) -> Option<&[u8]>;
}

impl ScriptAsset for RuleEntity {
    fn name(&self) -> &str {
        &self.name
    }

    fn body(&self) -> Option<&[u8]> {
        self.script.as_deref()
    }

    fn metadata(&self) -> Option<&[u8]> {
        self.metadata.as_deref()
    }
}

impl ScriptAsset for PageEntity {
    fn name(&self) -> &str {
        &self.name
    }

    fn body(&self) -> Option<&[u8]> {
        self.html.as_deref()
    }

    fn metadata(&self) -> Option<&[u8]> {
        self.metadata.as_deref()
    }
}

/// Turns downloaded entities into their deployable shape
pub trait Reconciler: Send + Sync {
    type Scripts;
    type Databases;

    /// Used for both rules and pages
    fn unify_scripts<S: ScriptAsset>(&self, entities: Vec<S>) -> Self::Scripts;

    fn unify_databases(&self, entities: Vec<DatabaseEntity>) -> Self::Databases;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptRecord {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseScriptRecord {
    pub name: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseRecord {
    pub name: String,
    pub scripts: Vec<DatabaseScriptRecord>,
}

/// Pass-through reconciler producing text records, used by the CLI
#[derive(Debug, Clone, Copy, Default)]
pub struct RawReconciler;

impl Reconciler for RawReconciler {
    type Scripts = Vec<ScriptRecord>;
    type Databases = Vec<DatabaseRecord>;

    fn unify_scripts<S: ScriptAsset>(&self, entities: Vec<S>) -> Self::Scripts {
        entities
            .iter()
            .map(|entity| ScriptRecord {
                name: entity.name().to_string(),
                body: entity.body().map(text),
                metadata: entity.metadata().map(text),
            })
            .collect()
    }

    fn unify_databases(&self, entities: Vec<DatabaseEntity>) -> Self::Databases {
        entities
            .into_iter()
            .map(|db| DatabaseRecord {
                name: db.name,
                scripts: db
                    .scripts
                    .into_iter()
                    .map(|script| DatabaseScriptRecord {
                        name: script.name,
                        body: text(&script.contents),
                    })
                    .collect(),
            })
            .collect()
    }
}

fn text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
