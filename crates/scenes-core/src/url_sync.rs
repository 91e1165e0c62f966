//! URL state synchronization
//!
//! Nodes exposing [`UrlSyncHandler`] contribute query keys. The
//! [`UrlSyncManager`] gathers them from a tree and pushes incoming query
//! values back, touching only the keys each handler declares.

use crate::graph;
use crate::object::SceneObject;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::form_urlencoded;

/// Query value: one string or a repeated key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UrlValue {
    /// Single occurrence
    Single(String),
    /// Repeated key
    Multi(Vec<String>),
}

impl UrlValue {
    /// First value
    #[must_use]
    pub fn first(&self) -> Option<&str> {
        match self {
            Self::Single(v) => Some(v),
            Self::Multi(values) => values.first().map(String::as_str),
        }
    }

    /// All values
    #[must_use]
    pub fn values(&self) -> Vec<String> {
        match self {
            Self::Single(v) => vec![v.clone()],
            Self::Multi(values) => values.clone(),
        }
    }
}

impl From<&str> for UrlValue {
    fn from(v: &str) -> Self {
        Self::Single(v.to_string())
    }
}

impl From<Vec<&str>> for UrlValue {
    fn from(values: Vec<&str>) -> Self {
        Self::Multi(values.into_iter().map(str::to_string).collect())
    }
}

/// Ordered query key/value map
pub type SceneObjectUrlValues = IndexMap<String, UrlValue>;

/// URL synchronization capability
pub trait UrlSyncHandler: Send + Sync {
    /// Keys owned by this handler
    fn url_keys(&self) -> Vec<String>;

    /// Current values for the owned keys
    fn get_url_state(&self) -> SceneObjectUrlValues;

    /// Apply incoming values; keys absent from `values` are left untouched
    fn update_from_url(&self, values: &SceneObjectUrlValues);
}

/// Path plus parsed query
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Location {
    /// Path component, always starting with `/`
    pub path: String,
    /// Query parameters
    pub query: SceneObjectUrlValues,
}

impl Location {
    /// Parse `path?query`
    #[must_use]
    pub fn parse(url: &str) -> Self {
        let (path, query) = url.split_once('?').unwrap_or((url, ""));
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
        Self {
            path,
            query: parse_query(query),
        }
    }

    /// Query string without the leading `?`
    #[must_use]
    pub fn search(&self) -> String {
        to_query_string(&self.query)
    }

    /// Path followed by `?query` when non-empty
    #[must_use]
    pub fn to_url_string(&self) -> String {
        let search = self.search();
        if search.is_empty() {
            self.path.clone()
        } else {
            format!("{}?{search}", self.path)
        }
    }
}

/// Parse a query string; repeated keys become [`UrlValue::Multi`]
#[must_use]
pub fn parse_query(query: &str) -> SceneObjectUrlValues {
    let mut values = SceneObjectUrlValues::new();
    for (key, value) in form_urlencoded::parse(query.trim_start_matches('?').as_bytes()) {
        let key = key.into_owned();
        let value = value.into_owned();
        match values.get_mut(&key) {
            None => {
                values.insert(key, UrlValue::Single(value));
            }
            Some(existing) => {
                let mut all = existing.values();
                all.push(value);
                *existing = UrlValue::Multi(all);
            }
        }
    }
    values
}

/// Serialize values as a query string
#[must_use]
pub fn to_query_string(values: &SceneObjectUrlValues) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in values {
        for v in value.values() {
            serializer.append_pair(key, &v);
        }
    }
    serializer.finish()
}

/// URL synchronization behaviour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlSyncOptions {
    /// Write the tree's state into the URL when a scene is first synced
    pub update_url_on_init: bool,
    /// Each state change produces a history entry instead of replacing one
    pub create_browser_history_steps: bool,
}

impl Default for UrlSyncOptions {
    fn default() -> Self {
        Self {
            update_url_on_init: true,
            create_browser_history_steps: false,
        }
    }
}

impl UrlSyncOptions {
    /// Set `update_url_on_init`
    #[must_use]
    pub fn with_update_url_on_init(mut self, value: bool) -> Self {
        self.update_url_on_init = value;
        self
    }

    /// Set `create_browser_history_steps`
    #[must_use]
    pub fn with_history_steps(mut self, value: bool) -> Self {
        self.create_browser_history_steps = value;
        self
    }
}

/// Moves state between a scene tree and query strings
#[derive(Debug, Clone, Default)]
pub struct UrlSyncManager {
    options: UrlSyncOptions,
}

impl UrlSyncManager {
    /// Manager with options
    #[inline]
    #[must_use]
    pub fn new(options: UrlSyncOptions) -> Self {
        Self { options }
    }

    /// Options in use
    #[inline]
    #[must_use]
    pub fn options(&self) -> &UrlSyncOptions {
        &self.options
    }

    /// Merged URL state of every handler under `root`
    ///
    /// The first handler claiming a key wins.
    #[must_use]
    pub fn get_url_state(&self, root: &dyn SceneObject) -> SceneObjectUrlValues {
        let mut merged = SceneObjectUrlValues::new();
        graph::for_each_descendant(root, &mut |obj| {
            if let Some(handler) = obj.as_url_sync() {
                for (key, value) in handler.get_url_state() {
                    merged.entry(key).or_insert(value);
                }
            }
        });
        merged
    }

    /// Apply query values to every handler under `root`
    ///
    /// Handlers only see their own keys and are skipped when none of those
    /// keys differ from their current state. Returns the number of handlers
    /// updated.
    pub fn sync_from_url(&self, root: &dyn SceneObject, query: &SceneObjectUrlValues) -> usize {
        let mut updated = 0;
        graph::for_each_descendant(root, &mut |obj| {
            let Some(handler) = obj.as_url_sync() else {
                return;
            };
            let current = handler.get_url_state();
            let mut incoming = SceneObjectUrlValues::new();
            for key in handler.url_keys() {
                if let Some(value) = query.get(&key) {
                    if current.get(&key) != Some(value) {
                        incoming.insert(key, value.clone());
                    }
                }
            }
            if !incoming.is_empty() {
                debug!(kind = obj.kind(), keys = ?incoming.keys().collect::<Vec<_>>(), "url sync update");
                handler.update_from_url(&incoming);
                updated += 1;
            }
        });
        updated
    }

    /// `location` with the tree's URL state merged into its query
    ///
    /// Keys not owned by any handler are preserved.
    #[must_use]
    pub fn location_with_state(&self, root: &dyn SceneObject, location: &Location) -> Location {
        let mut query = location.query.clone();
        for (key, value) in self.get_url_state(root) {
            query.insert(key, value);
        }
        Location {
            path: location.path.clone(),
            query,
        }
    }
}

/// Build `path` with the URL state of `root`, keeping only `preserve_keys`
/// from `current` in addition
#[must_use]
pub fn get_url_with_app_state(
    root: &dyn SceneObject,
    path: &str,
    current: &SceneObjectUrlValues,
    preserve_keys: &[String],
) -> String {
    let mut query = SceneObjectUrlValues::new();
    for key in preserve_keys {
        if let Some(value) = current.get(key) {
            query.insert(key.clone(), value.clone());
        }
    }
    for (key, value) in UrlSyncManager::default().get_url_state(root) {
        query.insert(key, value);
    }
    Location {
        path: path.to_string(),
        query,
    }
    .to_url_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_repeated_keys() {
        let values = parse_query("?var-a=1&var-a=2&from=now-1h&q=a%20b");
        assert_eq!(values.get("var-a"), Some(&UrlValue::from(vec!["1", "2"])));
        assert_eq!(values.get("from"), Some(&UrlValue::from("now-1h")));
        assert_eq!(values.get("q"), Some(&UrlValue::from("a b")));
    }

    #[test]
    fn location_round_trip() {
        let location = Location::parse("/dash?var-a=1&var-a=2");
        assert_eq!(location.path, "/dash");
        assert_eq!(location.to_url_string(), "/dash?var-a=1&var-a=2");
        assert_eq!(Location::parse("dash").path, "/dash");
    }

    #[test]
    fn default_options() {
        let options = UrlSyncOptions::default();
        assert!(options.update_url_on_init);
        assert!(!options.create_browser_history_steps);
        assert!(!options.with_history_steps(false).create_browser_history_steps);
    }
}
