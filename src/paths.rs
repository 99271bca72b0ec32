//! Path classification for repository files
//!
//! Categories are decided purely by path prefix. Each category directory is
//! matched together with its trailing slash, so `rules-archive/a.js` is never
//! mistaken for a rule even though it shares the `rules` prefix.

use crate::config::LayoutConfig;
use std::path::Path;

/// Location of a database script inside the database-connections directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseScriptDetails {
    /// Connection name (the subdirectory)
    pub database: String,
    /// Script role, e.g. `login` or `get_user`
    pub name: String,
}

/// Stateless predicates over repository paths
#[derive(Debug, Clone)]
pub struct PathClassifier {
    layout: LayoutConfig,
    rules_prefix: String,
    databases_prefix: String,
    pages_prefix: String,
}

impl PathClassifier {
    pub fn new(layout: LayoutConfig) -> Self {
        let rules_prefix = format!("{}/", layout.rules_directory);
        let databases_prefix = format!("{}/", layout.database_connections_directory);
        let pages_prefix = format!("{}/", layout.pages_directory);
        Self {
            layout,
            rules_prefix,
            databases_prefix,
            pages_prefix,
        }
    }

    pub fn layout(&self) -> &LayoutConfig {
        &self.layout
    }

    pub fn is_rule(&self, path: &str) -> bool {
        path.starts_with(&self.rules_prefix)
    }

    pub fn is_database_connection(&self, path: &str) -> bool {
        path.starts_with(&self.databases_prefix)
    }

    /// Page paths must also name one of the recognized page files.
    pub fn is_page(&self, path: &str) -> bool {
        path.starts_with(&self.pages_prefix)
            && path
                .rsplit('/')
                .next()
                .map(|file| self.layout.page_names.iter().any(|name| name == file))
                .unwrap_or(false)
    }

    /// Split `<databases directory>/<db>/<role>.js` into its parts.
    pub fn database_script_details(&self, path: &str) -> Option<DatabaseScriptDetails> {
        let relative = path.strip_prefix(&self.databases_prefix)?;
        let (database, file) = relative.split_once('/')?;
        if database.is_empty() || file.contains('/') || !has_extension(file, "js") {
            return None;
        }

        let role = file_stem(file);
        if !self.layout.database_scripts.iter().any(|s| s == role) {
            return None;
        }

        Some(DatabaseScriptDetails {
            database: database.to_string(),
            name: role.to_string(),
        })
    }

    /// Whether a listed file belongs to any category and should be fetched
    pub fn is_valid_file(&self, path: &str) -> bool {
        if self.is_rule(path) {
            has_extension(path, "js") || has_extension(path, "json")
        } else if self.is_database_connection(path) {
            self.database_script_details(path).is_some()
        } else {
            self.is_page(path)
        }
    }
}

/// Case-insensitive extension check
pub(crate) fn has_extension(path: &str, ext: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(ext))
        .unwrap_or(false)
}

/// Final path segment without its extension
pub(crate) fn file_stem(path: &str) -> &str {
    Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("")
}
