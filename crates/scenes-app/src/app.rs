//! Scene app: the routing root
//!
//! [`SceneApp`] owns the top-level pages. Navigating resolves the page for a
//! path, deactivates the previously routed page and activates the new one.
//! Rendering requires a router location in the [`RenderContext`].

use crate::config::SceneAppConfig;
use crate::error::AppResult;
use crate::history::MemoryHistory;
use crate::page::SceneAppPage;
use crate::route::{RouteIndex, RouteTemplate};
use parking_lot::{Mutex, RwLock};
use scenes_core::graph;
use scenes_core::prelude::*;
use scenes_core::url_sync::get_url_with_app_state;
use scenes_core::{Location, RenderContext, UrlSyncManager, ViewNode};
use scenes_variables::{SceneInterpolator, SceneVariableSet, UpdateReport};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, debug_span, warn};

/// Test id of the view shown when nothing matches
pub const FALLBACK_TEST_ID: &str = "default-fallback-content";

/// State of a [`SceneApp`]
#[derive(Clone, Default)]
pub struct SceneAppState {
    /// Top-level pages
    pub pages: Vec<Arc<SceneAppPage>>,
}

impl SceneState for SceneAppState {}

/// Root of a routed scene application
pub struct SceneApp {
    base: SceneObjectBase<SceneAppState>,
    config: SceneAppConfig,
    routes: RouteIndex<usize>,
    url_sync: UrlSyncManager,
    navigation: Mutex<()>,
    current: RwLock<Option<Arc<SceneAppPage>>>,
    location: RwLock<Option<Location>>,
}

impl SceneApp {
    /// App with default configuration
    #[must_use]
    pub fn new(pages: Vec<Arc<SceneAppPage>>) -> Arc<Self> {
        Self::with_config(pages, SceneAppConfig::default())
    }

    /// App with explicit configuration
    #[must_use]
    pub fn with_config(pages: Vec<Arc<SceneAppPage>>, config: SceneAppConfig) -> Arc<Self> {
        let mut routes = RouteIndex::new();
        for (i, page) in pages.iter().enumerate() {
            routes.insert(RouteTemplate::literal(&page.url()), i);
        }

        let url_sync = UrlSyncManager::new(config.url_sync.clone());
        let app = attach(Self {
            base: SceneObjectBase::new(SceneAppState {
                pages: pages.clone(),
            }),
            config,
            routes,
            url_sync,
            navigation: Mutex::new(()),
            current: RwLock::new(None),
            location: RwLock::new(None),
        });
        for page in pages {
            app.node().adopt(&page.into_object());
        }
        app
    }

    /// Configuration in use
    #[inline]
    #[must_use]
    pub fn config(&self) -> &SceneAppConfig {
        &self.config
    }

    /// Top-level pages
    #[must_use]
    pub fn pages(&self) -> Vec<Arc<SceneAppPage>> {
        self.base.state().pages.clone()
    }

    /// Page routed by the last navigation
    #[must_use]
    pub fn current_page(&self) -> Option<Arc<SceneAppPage>> {
        self.current.read().clone()
    }

    /// Breadcrumb titles of the routed page, nearest first
    #[must_use]
    pub fn breadcrumbs(&self) -> Vec<String> {
        self.current_page()
            .map(|page| page.breadcrumbs(self.config.max_breadcrumb_depth))
            .unwrap_or_default()
    }

    /// Page to show for `path` without navigating
    #[must_use]
    pub fn resolve(&self, path: &str) -> Option<Arc<SceneAppPage>> {
        let (_, &index) = self.routes.best_match(path)?;
        self.base.state().pages.get(index)?.resolve(path)
    }

    /// Route to `location`
    ///
    /// Navigations are serialized. The routed page's scene receives the
    /// query values it declares through URL sync. Returns `None` when the
    /// fallback view applies.
    pub fn navigate(&self, location: &Location) -> Option<Arc<SceneAppPage>> {
        let span = debug_span!("navigate", path = %location.path);
        let _enter = span.enter();
        let _serial = self.navigation.lock();

        *self.location.write() = Some(location.clone());
        let resolved = self.resolve(&location.path);
        let previous = self.current_page();

        let unchanged = match (&previous, &resolved) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        if !unchanged {
            if let Some(previous) = &previous {
                debug!(url = %previous.url(), "leaving page");
                previous.deactivate();
            }
            *self.current.write() = resolved.clone();
            if let Some(page) = &resolved {
                debug!(url = %page.url(), title = %page.title(), "entering page");
                // Build before activation so the scene mounts with the page.
                match page.scene() {
                    Some(scene) => debug!(scene = scene.kind(), "page scene ready"),
                    None => debug!("page has no scene of its own"),
                }
                page.activate();
            }
        }

        match &resolved {
            Some(page) => {
                let updated = self.url_sync.sync_from_url(&**page, &location.query);
                debug!(updated, "applied url state");
            }
            None => debug!("no page matched"),
        }
        resolved
    }

    /// Navigate to the history's location and write the page's URL state back
    ///
    /// Entering a page writes its state only when `update_url_on_init` is
    /// set, replacing the current entry.
    pub fn navigate_history(&self, history: &MemoryHistory) -> Option<Arc<SceneAppPage>> {
        let previous = self.current_page();
        let page = self.navigate(&history.location())?;
        let entered = previous.map_or(true, |p| !Arc::ptr_eq(&p, &page));
        if entered && self.config.url_sync.update_url_on_init {
            let location = history.location();
            let next = self.url_sync.location_with_state(&*page, &location);
            if next != location {
                history.replace_location(next);
            }
        }
        Some(page)
    }

    /// Write the routed page's URL state into `history`
    ///
    /// Pushes a new entry when `create_browser_history_steps` is set,
    /// replaces the current one otherwise. Returns the new location if it
    /// differs from the current one.
    pub fn sync_url(&self, history: &MemoryHistory) -> Option<Location> {
        let page = self.current_page()?;
        let location = history.location();
        let next = self.url_sync.location_with_state(&*page, &location);
        if next == location {
            return None;
        }
        if self.config.url_sync.create_browser_history_steps {
            history.push_location(next.clone());
        } else {
            history.replace_location(next.clone());
        }
        Some(next)
    }

    /// Resolve every variable set under the routed page
    ///
    /// # Errors
    /// Returns the first declaration error raised by a set; option failures
    /// are collected in the report instead
    pub async fn settle(&self) -> AppResult<UpdateReport> {
        let mut report = UpdateReport::default();
        let Some(page) = self.current_page() else {
            return Ok(report);
        };

        let mut sets: Vec<Arc<SceneVariableSet>> = Vec::new();
        graph::for_each_descendant(&*page, &mut |obj| {
            if let Some(set) = obj.node().this_as::<SceneVariableSet>() {
                sets.push(set);
            }
        });

        for set in sets {
            let partial = set.process_updates().await?;
            report.completed.extend(partial.completed);
            report.failed.extend(partial.failed);
        }
        if !report.failed.is_empty() {
            warn!(failed = report.failed.len(), "variables failed to settle");
        }
        Ok(report)
    }

    /// Render for `location` with the default interpolator
    ///
    /// # Errors
    /// Propagates render errors of the routed scene
    pub fn render_location(&self, location: &Location) -> AppResult<ViewNode> {
        let ctx = RenderContext::new()
            .with_router(location.clone())
            .with_interpolator(Arc::new(SceneInterpolator::with_defaults()));
        Ok(self.render(&ctx)?)
    }

    /// Render with the host's context
    ///
    /// # Errors
    /// Returns [`crate::AppError::OutsideRouter`] if `ctx` carries no router
    pub fn render_app(&self, ctx: &RenderContext) -> AppResult<ViewNode> {
        Ok(self.render(ctx)?)
    }

    fn page_view(
        &self,
        page: &Arc<SceneAppPage>,
        location: &Location,
        ctx: &RenderContext,
    ) -> SceneResult<ViewNode> {
        let chrome = page.container().unwrap_or_else(|| Arc::clone(page));

        let mut crumbs = ViewNode::element("breadcrumbs");
        for title in page.breadcrumbs(self.config.max_breadcrumb_depth) {
            crumbs = crumbs.with_child(ViewNode::element("crumb").with_attribute("title", title));
        }

        let mut view = ViewNode::element("page")
            .with_attribute("title", chrome.title())
            .with_child(crumbs);

        let tabs = chrome.tabs();
        if !tabs.is_empty() {
            let chrome_state = chrome.state();
            let mut bar = ViewNode::element("tabs");
            for tab in tabs {
                let href = get_url_with_app_state(
                    &**page,
                    &tab.url(),
                    &location.query,
                    &chrome_state.preserve_url_keys,
                );
                let active = tab.key() == page.key();
                bar = bar.with_child(
                    ViewNode::element("tab")
                        .with_attribute("title", tab.title())
                        .with_attribute("href", href)
                        .with_attribute("active", active.to_string()),
                );
            }
            view = view.with_child(bar);
        }

        Ok(view.with_child(page.render(ctx)?))
    }

    fn fallback_view(&self) -> ViewNode {
        ViewNode::element("fallback")
            .with_test_id(FALLBACK_TEST_ID)
            .with_text(self.config.fallback_title.clone())
    }
}

impl SceneObject for SceneApp {
    fn node(&self) -> &SceneNode {
        self.base.node()
    }

    fn kind(&self) -> &'static str {
        "SceneApp"
    }

    scene_object_casts!();

    fn for_each_child(&self, visit: &mut dyn FnMut(&SceneObjectRef)) {
        if let Some(page) = self.current_page() {
            visit(&page.into_object());
        }
    }

    fn current_location(&self) -> Option<Location> {
        self.location.read().clone()
    }

    fn render(&self, ctx: &RenderContext) -> SceneResult<ViewNode> {
        let location = ctx.require_router()?.location.clone();
        match self.navigate(&location) {
            Some(page) => self.page_view(&page, &location, ctx),
            None => Ok(self.fallback_view()),
        }
    }
}

impl fmt::Debug for SceneApp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneApp")
            .field("pages", &self.routes)
            .field("current", &self.current_page().map(|p| p.url()))
            .finish()
    }
}
