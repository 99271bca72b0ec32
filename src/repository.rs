//! Repository specifier parsing

use crate::error::{Result, SyncError};
use serde::Serialize;
use std::fmt;

/// Owner and slug of a Bitbucket repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryRef {
    pub owner: String,
    pub name: String,
}

impl RepositoryRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Parse `owner/name` or a five segment URL such as
    /// `https://bitbucket.org/owner/name`.
    pub fn parse(specifier: &str) -> Result<Self> {
        let parts: Vec<&str> = specifier.split('/').collect();
        match parts.as_slice() {
            [owner, name] => Ok(Self::new(*owner, *name)),
            [_, _, _, owner, name] => Ok(Self::new(*owner, *name)),
            _ => Err(SyncError::InvalidRepository(specifier.to_string())),
        }
    }
}

impl fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}
