//! Route templates and prefix-indexed route lookup
//!
//! A [`RouteTemplate`] splits `/orders/:id/items` into static and named
//! segments. A [`RouteIndex`] keys every template by its static prefix in a
//! radix trie, so resolving a path only tests the templates whose prefix the
//! path actually shares.

use crate::error::{AppError, AppResult};
use indexmap::IndexMap;
use radix_trie::Trie;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Segment {
    Static(String),
    Param(String),
}

/// Parsed route template
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteTemplate {
    source: String,
    segments: Vec<Segment>,
}

/// Ordering of templates when several match one path
///
/// Longer templates win, then templates with more static segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RouteSpecificity {
    segments: usize,
    statics: usize,
}

impl RouteTemplate {
    /// Parse a template with `:name` parameters
    ///
    /// # Errors
    /// Returns [`AppError::InvalidRoute`] if the template is not absolute,
    /// declares an empty parameter name or repeats a parameter
    pub fn parse(template: &str) -> AppResult<Self> {
        if !template.starts_with('/') {
            return Err(AppError::invalid_route(template, "must start with '/'"));
        }

        let mut segments = Vec::new();
        for part in split_path(template) {
            match part.strip_prefix(':') {
                Some("") => {
                    return Err(AppError::invalid_route(template, "empty parameter name"));
                }
                Some(name) => {
                    let duplicate = segments
                        .iter()
                        .any(|s| matches!(s, Segment::Param(existing) if existing == name));
                    if duplicate {
                        return Err(AppError::invalid_route(
                            template,
                            format!("duplicate parameter ':{name}'"),
                        ));
                    }
                    segments.push(Segment::Param(name.to_string()));
                }
                None => segments.push(Segment::Static(part.to_string())),
            }
        }

        Ok(Self {
            source: template.to_string(),
            segments,
        })
    }

    /// Template whose segments are all static
    #[must_use]
    pub fn literal(path: &str) -> Self {
        Self {
            source: normalize(path),
            segments: split_path(path)
                .map(|s| Segment::Static(s.to_string()))
                .collect(),
        }
    }

    /// Template as declared
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Names of the template parameters in order
    #[must_use]
    pub fn param_names(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Param(name) => Some(name.as_str()),
                Segment::Static(_) => None,
            })
            .collect()
    }

    /// Check if the template has no parameters
    #[inline]
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.segments.iter().all(|s| matches!(s, Segment::Static(_)))
    }

    /// Static segments before the first parameter, as a path
    #[must_use]
    pub fn static_prefix(&self) -> String {
        let statics: Vec<&str> = self
            .segments
            .iter()
            .map_while(|s| match s {
                Segment::Static(value) => Some(value.as_str()),
                Segment::Param(_) => None,
            })
            .collect();
        format!("/{}", statics.join("/"))
    }

    /// Rank used to pick among several matching templates
    #[must_use]
    pub fn specificity(&self) -> RouteSpecificity {
        RouteSpecificity {
            segments: self.segments.len(),
            statics: self
                .segments
                .iter()
                .filter(|s| matches!(s, Segment::Static(_)))
                .count(),
        }
    }

    /// Match the template against the start of `path`
    ///
    /// Matching is segment-wise, so `/test` matches `/test/tab` but not
    /// `/test1`.
    #[must_use]
    pub fn match_path(&self, path: &str) -> Option<RouteMatch> {
        let parts: Vec<&str> = split_path(path).collect();
        if parts.len() < self.segments.len() {
            return None;
        }

        let mut params = IndexMap::new();
        for (segment, part) in self.segments.iter().zip(&parts) {
            match segment {
                Segment::Static(value) if value == part => {}
                Segment::Static(_) => return None,
                Segment::Param(name) => {
                    params.insert(name.clone(), (*part).to_string());
                }
            }
        }

        let matched = &parts[..self.segments.len()];
        Some(RouteMatch {
            url: format!("/{}", matched.join("/")),
            path: self.source.clone(),
            params,
            is_exact: parts.len() == self.segments.len(),
        })
    }
}

impl fmt::Display for RouteTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Result of matching a template against a path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteMatch {
    /// Concrete part of the path the template consumed
    pub url: String,
    /// Template that matched
    pub path: String,
    /// Named parameters in template order
    pub params: IndexMap<String, String>,
    /// The template consumed the whole path
    pub is_exact: bool,
}

impl RouteMatch {
    /// Match of a static page url
    #[must_use]
    pub fn exact(url: &str) -> Self {
        let url = normalize(url);
        Self {
            path: url.clone(),
            url,
            params: IndexMap::new(),
            is_exact: true,
        }
    }

    /// Value of a named parameter
    #[inline]
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

/// Templates indexed by static prefix
pub struct RouteIndex<T> {
    trie: Trie<String, Vec<usize>>,
    routes: Vec<(RouteTemplate, T)>,
}

impl<T> RouteIndex<T> {
    /// Create an empty index
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            trie: Trie::new(),
            routes: Vec::new(),
        }
    }

    /// Add a route; declaration order breaks specificity ties
    pub fn insert(&mut self, template: RouteTemplate, value: T) {
        let key = template.static_prefix();
        let id = self.routes.len();
        self.routes.push((template, value));
        match self.trie.get_mut(&key) {
            Some(ids) => ids.push(id),
            None => {
                self.trie.insert(key, vec![id]);
            }
        }
    }

    /// Number of routes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Check if no routes are indexed
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Routes in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&RouteTemplate, &T)> {
        self.routes.iter().map(|(t, v)| (t, v))
    }

    /// Every route matching the start of `path`, in declaration order
    #[must_use]
    pub fn candidates(&self, path: &str) -> Vec<(RouteMatch, &T)> {
        self.matching(path)
            .into_iter()
            .map(|(id, m)| (m, &self.routes[id].1))
            .collect()
    }

    /// Most specific route matching `path`
    #[must_use]
    pub fn best_match(&self, path: &str) -> Option<(RouteMatch, &T)> {
        let mut best: Option<(RouteSpecificity, usize, RouteMatch)> = None;
        for (id, matched) in self.matching(path) {
            let rank = self.routes[id].0.specificity();
            if best.as_ref().map_or(true, |(current, _, _)| rank > *current) {
                best = Some((rank, id, matched));
            }
        }
        best.map(|(_, id, matched)| (matched, &self.routes[id].1))
    }

    fn matching(&self, path: &str) -> Vec<(usize, RouteMatch)> {
        let mut ids: Vec<usize> = Vec::new();
        for prefix in path_prefixes(path) {
            if let Some(found) = self.trie.get(&prefix) {
                ids.extend(found);
            }
        }
        ids.sort_unstable();

        ids.into_iter()
            .filter_map(|id| self.routes[id].0.match_path(path).map(|m| (id, m)))
            .collect()
    }
}

impl<T> Default for RouteIndex<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for RouteIndex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.routes.iter().map(|(t, _)| t.as_str()))
            .finish()
    }
}

/// Path with a single leading slash and no empty segments
#[must_use]
pub fn normalize(path: &str) -> String {
    let parts: Vec<&str> = split_path(path).collect();
    format!("/{}", parts.join("/"))
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

fn path_prefixes(path: &str) -> Vec<String> {
    let mut prefixes = vec!["/".to_string()];
    let mut current = String::new();
    for part in split_path(path) {
        current.push('/');
        current.push_str(part);
        prefixes.push(current.clone());
    }
    prefixes
}
