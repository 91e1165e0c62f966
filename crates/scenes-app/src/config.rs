//! App configuration

use scenes_core::UrlSyncOptions;
use serde::{Deserialize, Serialize};

/// Scene app configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneAppConfig {
    /// URL synchronization of the routed page's state
    pub url_sync: UrlSyncOptions,
    /// Text shown when no page matches the location
    pub fallback_title: String,
    /// Maximum number of breadcrumb entries collected for a page
    pub max_breadcrumb_depth: usize,
}

impl Default for SceneAppConfig {
    fn default() -> Self {
        Self {
            url_sync: UrlSyncOptions::default(),
            fallback_title: "Page not found".to_string(),
            max_breadcrumb_depth: 16,
        }
    }
}

impl SceneAppConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With URL sync options
    #[inline]
    #[must_use]
    pub fn with_url_sync(mut self, options: UrlSyncOptions) -> Self {
        self.url_sync = options;
        self
    }

    /// With fallback text
    #[inline]
    #[must_use]
    pub fn with_fallback_title(mut self, title: impl Into<String>) -> Self {
        self.fallback_title = title.into();
        self
    }

    /// With breadcrumb depth limit
    #[inline]
    #[must_use]
    pub fn with_max_breadcrumb_depth(mut self, depth: usize) -> Self {
        self.max_breadcrumb_depth = depth;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_fills_defaults() {
        let config: SceneAppConfig =
            serde_json::from_str(r#"{"fallback_title":"Nothing here"}"#).unwrap();
        assert_eq!(config.fallback_title, "Nothing here");
        assert_eq!(config.max_breadcrumb_depth, 16);
        assert_eq!(config.url_sync, UrlSyncOptions::default());
    }

    #[test]
    fn url_sync_options_serialize_only_behaviour_flags() {
        let json = serde_json::to_value(UrlSyncOptions::default()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "update_url_on_init": true,
                "create_browser_history_steps": false
            })
        );
    }
}
