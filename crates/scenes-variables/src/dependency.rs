//! Declared variable references of a scene object

use parking_lot::RwLock;
use scenes_core::template;
use scenes_core::{SceneVariable, VariableDependency};
use std::fmt;
use std::sync::Arc;

type ChangeCallback = Arc<dyn Fn(&dyn SceneVariable) + Send + Sync>;

/// Variable dependencies of one scene object
///
/// Names come either from an explicit list or from scanning templates. The
/// owning object rescans with [`set_templates`](Self::set_templates) whenever
/// the templates in its state change.
pub struct VariableDependencyConfig {
    explicit: Option<Vec<String>>,
    scanned: RwLock<Vec<String>>,
    on_changed: Option<ChangeCallback>,
}

impl VariableDependencyConfig {
    /// Dependencies on a fixed list of names
    #[must_use]
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            explicit: Some(names.into_iter().map(Into::into).collect()),
            scanned: RwLock::new(Vec::new()),
            on_changed: None,
        }
    }

    /// Dependencies on every name referenced in `templates`
    #[must_use]
    pub fn from_templates(templates: &[&str]) -> Self {
        let config = Self {
            explicit: None,
            scanned: RwLock::new(Vec::new()),
            on_changed: None,
        };
        config.set_templates(templates);
        config
    }

    /// Callback run when a referenced variable finished with a changed value
    #[must_use]
    pub fn with_on_referenced_variable_value_changed<F>(mut self, callback: F) -> Self
    where
        F: Fn(&dyn SceneVariable) + Send + Sync + 'static,
    {
        self.on_changed = Some(Arc::new(callback));
        self
    }

    /// Rescan templates; ignored when names were given explicitly
    pub fn set_templates(&self, templates: &[&str]) {
        if self.explicit.is_some() {
            return;
        }
        let mut names: Vec<String> = Vec::new();
        for text in templates {
            for name in template::referenced_names(text) {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        *self.scanned.write() = names;
    }

    /// Referenced names
    #[must_use]
    pub fn get_names(&self) -> Vec<String> {
        match &self.explicit {
            Some(names) => names.clone(),
            None => self.scanned.read().clone(),
        }
    }
}

impl VariableDependency for VariableDependencyConfig {
    fn names(&self) -> Vec<String> {
        self.get_names()
    }

    fn has_dependency_on(&self, name: &str) -> bool {
        match &self.explicit {
            Some(names) => names.iter().any(|n| n == name),
            None => self.scanned.read().iter().any(|n| n == name),
        }
    }

    fn variable_update_completed(&self, variable: &dyn SceneVariable, has_changed: bool) {
        if !has_changed || !self.has_dependency_on(&variable.name()) {
            return;
        }
        if let Some(callback) = &self.on_changed {
            callback(variable);
        }
    }
}

impl fmt::Debug for VariableDependencyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VariableDependencyConfig")
            .field("names", &self.get_names())
            .field("on_changed", &self.on_changed.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scans_templates_in_order() {
        let config = VariableDependencyConfig::from_templates(&["$a and ${b}", "[[a]] $c"]);
        assert_eq!(config.get_names(), vec!["a", "b", "c"]);
        assert!(config.has_dependency_on("b"));
        assert!(!config.has_dependency_on("d"));

        config.set_templates(&["$d"]);
        assert_eq!(config.get_names(), vec!["d"]);
    }

    #[test]
    fn explicit_names_ignore_rescans() {
        let config = VariableDependencyConfig::from_names(["x"]);
        config.set_templates(&["$y"]);
        assert_eq!(config.get_names(), vec!["x"]);
    }
}
