//! App pages
//!
//! A [`SceneAppPage`] matches a url. It may hold ordered tab pages sharing
//! its url prefix and drilldown routes whose pages are built on first
//! navigation and cached by the concrete url they matched.
//!
//! Tabs and drilldown pages are adopted by the page that declares them, so
//! their structural parent is that page. They are not part of its child
//! list: only the page the app routes to is activated.

use crate::error::AppResult;
use crate::route::{normalize, RouteIndex, RouteMatch, RouteTemplate};
use moka::sync::Cache;
use parking_lot::Mutex;
use scenes_core::prelude::*;
use scenes_core::{downcast_arc, RenderContext, ViewNode};
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::debug;

/// Builds the scene shown by a page
pub type SceneFactory = Arc<dyn Fn() -> SceneObjectRef + Send + Sync>;

/// Builds a drilldown page from the route match and the declaring page
pub type DrilldownPageFactory =
    Arc<dyn Fn(&RouteMatch, &Arc<SceneAppPage>) -> Arc<SceneAppPage> + Send + Sync>;

/// Picks the logical parent of a drilldown page from the declaring page
pub type ParentPageFactory =
    Arc<dyn Fn(&Arc<SceneAppPage>) -> Option<Arc<SceneAppPage>> + Send + Sync>;

/// Drilldown route declared on a page or tab
#[derive(Clone)]
pub struct SceneAppDrilldownView {
    route: RouteTemplate,
    get_page: DrilldownPageFactory,
    get_parent_page: Option<ParentPageFactory>,
}

impl SceneAppDrilldownView {
    /// Drilldown for `route` built by `get_page`
    ///
    /// # Errors
    /// Returns [`crate::AppError::InvalidRoute`] if `route` does not parse
    pub fn new<F>(route: &str, get_page: F) -> AppResult<Self>
    where
        F: Fn(&RouteMatch, &Arc<SceneAppPage>) -> Arc<SceneAppPage> + Send + Sync + 'static,
    {
        Ok(Self {
            route: RouteTemplate::parse(route)?,
            get_page: Arc::new(get_page),
            get_parent_page: None,
        })
    }

    /// Logical parent for pages that do not name one themselves
    #[must_use]
    pub fn with_parent_page<F>(mut self, get_parent_page: F) -> Self
    where
        F: Fn(&Arc<SceneAppPage>) -> Option<Arc<SceneAppPage>> + Send + Sync + 'static,
    {
        self.get_parent_page = Some(Arc::new(get_parent_page));
        self
    }

    /// Route template
    #[inline]
    #[must_use]
    pub fn route(&self) -> &RouteTemplate {
        &self.route
    }
}

impl fmt::Debug for SceneAppDrilldownView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneAppDrilldownView")
            .field("route", &self.route.as_str())
            .field("get_parent_page", &self.get_parent_page.is_some())
            .finish()
    }
}

/// State of a [`SceneAppPage`]
#[derive(Clone)]
pub struct SceneAppPageState {
    /// Title shown in breadcrumbs and tab bars
    pub title: String,
    /// Secondary title
    pub subtitle: Option<String>,
    /// Concrete url of the page
    pub url: String,
    /// Tab pages; the first one is shown for the page's own url
    pub tabs: Vec<Arc<SceneAppPage>>,
    /// Drilldown routes
    pub drilldowns: Vec<SceneAppDrilldownView>,
    /// Scene factory, called once per page
    pub get_scene: Option<SceneFactory>,
    /// Logical parent for breadcrumbs; the structural parent otherwise
    pub parent_page: Option<Weak<SceneAppPage>>,
    /// Query keys kept when linking to sibling tabs
    pub preserve_url_keys: Vec<String>,
}

impl SceneAppPageState {
    /// Page titled `title` at `url`
    #[must_use]
    pub fn new(title: impl Into<String>, url: &str) -> Self {
        Self {
            title: title.into(),
            subtitle: None,
            url: normalize(url),
            tabs: Vec::new(),
            drilldowns: Vec::new(),
            get_scene: None,
            parent_page: None,
            preserve_url_keys: Vec::new(),
        }
    }

    /// With subtitle
    #[must_use]
    pub fn with_subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.subtitle = Some(subtitle.into());
        self
    }

    /// With a tab appended
    #[must_use]
    pub fn with_tab(mut self, tab: Arc<SceneAppPage>) -> Self {
        self.tabs.push(tab);
        self
    }

    /// With a drilldown route appended
    #[must_use]
    pub fn with_drilldown(mut self, drilldown: SceneAppDrilldownView) -> Self {
        self.drilldowns.push(drilldown);
        self
    }

    /// With a scene factory
    #[must_use]
    pub fn with_scene<F>(mut self, get_scene: F) -> Self
    where
        F: Fn() -> SceneObjectRef + Send + Sync + 'static,
    {
        self.get_scene = Some(Arc::new(get_scene));
        self
    }

    /// With a logical parent held weakly
    #[must_use]
    pub fn with_parent_page(mut self, parent: &Arc<SceneAppPage>) -> Self {
        self.parent_page = Some(Arc::downgrade(parent));
        self
    }

    /// With query keys preserved across tab links
    #[must_use]
    pub fn with_preserve_url_keys(mut self, keys: Vec<String>) -> Self {
        self.preserve_url_keys = keys;
        self
    }
}

impl SceneState for SceneAppPageState {}

#[derive(Debug, Clone, Copy)]
enum PageRoute {
    Tab(usize),
    Drilldown(usize),
}

/// Routable page of a scene app
pub struct SceneAppPage {
    base: SceneObjectBase<SceneAppPageState>,
    routes: RouteIndex<PageRoute>,
    scene: Mutex<Option<SceneObjectRef>>,
    drilldowns: Cache<String, Arc<SceneAppPage>>,
}

impl SceneAppPage {
    /// Page from state; tabs are adopted by the new page
    #[must_use]
    pub fn new(mut state: SceneAppPageState) -> Arc<Self> {
        state.url = normalize(&state.url);

        let mut routes = RouteIndex::new();
        for (i, tab) in state.tabs.iter().enumerate() {
            routes.insert(RouteTemplate::literal(&tab.url()), PageRoute::Tab(i));
        }
        for (i, drilldown) in state.drilldowns.iter().enumerate() {
            routes.insert(drilldown.route.clone(), PageRoute::Drilldown(i));
        }

        let tabs = state.tabs.clone();
        let page = attach(Self {
            base: SceneObjectBase::new(state),
            routes,
            scene: Mutex::new(None),
            drilldowns: Cache::builder().build(),
        });
        for tab in tabs {
            page.node().adopt(&tab.into_object());
        }
        page
    }

    /// Current state
    #[inline]
    #[must_use]
    pub fn state(&self) -> Arc<SceneAppPageState> {
        self.base.state()
    }

    /// Page title
    #[must_use]
    pub fn title(&self) -> String {
        self.state().title.clone()
    }

    /// Page url
    #[must_use]
    pub fn url(&self) -> String {
        self.state().url.clone()
    }

    /// Tab pages in order
    #[must_use]
    pub fn tabs(&self) -> Vec<Arc<SceneAppPage>> {
        self.state().tabs.clone()
    }

    /// Scene of this page, built on first use
    #[must_use]
    pub fn scene(&self) -> Option<SceneObjectRef> {
        let mut slot = self.scene.lock();
        if let Some(scene) = slot.as_ref() {
            return Some(Arc::clone(scene));
        }
        let get_scene = self.state().get_scene.clone()?;
        let scene = get_scene();
        self.node().adopt(&scene);
        *slot = Some(Arc::clone(&scene));
        Some(scene)
    }

    /// Page listing this one among its tabs
    #[must_use]
    pub fn container(&self) -> Option<Arc<SceneAppPage>> {
        let parent = self.structural_parent()?;
        let is_tab = parent.state().tabs.iter().any(|t| t.key() == self.key());
        is_tab.then_some(parent)
    }

    /// Parent used for breadcrumbs
    ///
    /// The explicit parent page while it is alive, else the page that
    /// declared this one.
    #[must_use]
    pub fn logical_parent(&self) -> Option<Arc<SceneAppPage>> {
        self.state()
            .parent_page
            .as_ref()
            .and_then(Weak::upgrade)
            .or_else(|| self.structural_parent())
    }

    /// Titles from this page up its logical parent chain, nearest first
    ///
    /// Tab pages contribute their container's title instead of their own.
    #[must_use]
    pub fn breadcrumbs(self: &Arc<Self>, max_depth: usize) -> Vec<String> {
        let mut titles = Vec::new();
        let mut current = Some(Arc::clone(self));
        while let Some(page) = current {
            if titles.len() >= max_depth {
                break;
            }
            let page = page.container().unwrap_or(page);
            titles.push(page.title());
            current = page.logical_parent();
        }
        titles
    }

    /// Page to show for `path`, if this page or anything below it matches
    ///
    /// Drilldown pages are looked up in the cache by the concrete url their
    /// route matched and built at most once per url.
    #[must_use]
    pub fn resolve(self: &Arc<Self>, path: &str) -> Option<Arc<SceneAppPage>> {
        let path = normalize(path);
        let state = self.state();

        if path == state.url {
            return match state.tabs.first() {
                Some(first) => first.resolve(&first.url()),
                None => Some(Arc::clone(self)),
            };
        }

        let (matched, route) = self.routes.best_match(&path)?;
        match *route {
            PageRoute::Tab(i) => state.tabs.get(i)?.resolve(&path),
            PageRoute::Drilldown(i) => {
                let drilldown = state.drilldowns.get(i)?;
                self.drilldown_page(drilldown, &matched).resolve(&path)
            }
        }
    }

    /// Cached drilldown page for a concrete url
    #[must_use]
    pub fn cached_drilldown(&self, url: &str) -> Option<Arc<SceneAppPage>> {
        self.drilldowns.get(&normalize(url))
    }

    fn drilldown_page(
        self: &Arc<Self>,
        drilldown: &SceneAppDrilldownView,
        matched: &RouteMatch,
    ) -> Arc<SceneAppPage> {
        if let Some(page) = self.drilldowns.get(&matched.url) {
            debug!(url = %matched.url, "drilldown cache hit");
            return page;
        }

        self.drilldowns.get_with(matched.url.clone(), || {
            debug!(url = %matched.url, route = %drilldown.route, "building drilldown page");
            let page = (drilldown.get_page)(matched, self);
            if page.state().parent_page.is_none() {
                let parent = drilldown
                    .get_parent_page
                    .as_ref()
                    .and_then(|get_parent| get_parent(self));
                if let Some(parent) = parent {
                    page.base
                        .set_state(|s| s.parent_page = Some(Arc::downgrade(&parent)));
                }
            }
            self.node().adopt(&Arc::clone(&page).into_object());
            page
        })
    }

    fn structural_parent(&self) -> Option<Arc<SceneAppPage>> {
        self.node().parent().and_then(downcast_arc::<SceneAppPage>)
    }
}

impl SceneObject for SceneAppPage {
    fn node(&self) -> &SceneNode {
        self.base.node()
    }

    fn kind(&self) -> &'static str {
        "SceneAppPage"
    }

    scene_object_casts!();

    fn for_each_child(&self, visit: &mut dyn FnMut(&SceneObjectRef)) {
        let scene = self.scene.lock().clone();
        if let Some(scene) = scene {
            visit(&scene);
        }
    }

    fn render(&self, ctx: &RenderContext) -> SceneResult<ViewNode> {
        let state = self.state();
        let mut view =
            ViewNode::new(self.kind(), self.key().clone()).with_attribute("url", &state.url);
        if let Some(subtitle) = &state.subtitle {
            view = view.with_attribute("subtitle", subtitle);
        }
        if let Some(scene) = self.scene() {
            view = view.with_child(scene.render(ctx)?);
        }
        Ok(view)
    }
}

impl fmt::Debug for SceneAppPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("SceneAppPage")
            .field("title", &state.title)
            .field("url", &state.url)
            .field("tabs", &state.tabs.len())
            .field("drilldowns", &state.drilldowns)
            .finish()
    }
}
