//! Scenes App
//!
//! Routing over scene pages:
//! - Pages match urls; tabs share their page's prefix and the first tab
//!   stands in for the page's own url
//! - Drilldown routes build pages from url parameters on demand and cache
//!   them by the concrete url they matched
//! - Breadcrumbs follow each page's logical parent chain
//!
//! # Example
//!
//! ```rust
//! use scenes_app::{SceneApp, SceneAppPage, SceneAppPageState};
//! use scenes_core::{EmbeddedScene, Location, SceneCanvasText};
//!
//! let app = SceneApp::new(vec![SceneAppPage::new(
//!     SceneAppPageState::new("Overview", "/overview")
//!         .with_scene(|| EmbeddedScene::new(SceneCanvasText::new("Hello"))),
//! )]);
//!
//! let view = app.render_location(&Location::parse("/overview")).unwrap();
//! assert!(view.contains_text("Hello"));
//! assert_eq!(app.breadcrumbs(), vec!["Overview"]);
//! ```

#![warn(missing_docs)]

pub mod app;
pub mod config;
pub mod error;
pub mod history;
pub mod page;
pub mod route;

// Re-exports
pub use app::{SceneApp, SceneAppState, FALLBACK_TEST_ID};
pub use config::SceneAppConfig;
pub use error::{AppError, AppResult};
pub use history::MemoryHistory;
pub use page::{
    DrilldownPageFactory, ParentPageFactory, SceneAppDrilldownView, SceneAppPage,
    SceneAppPageState, SceneFactory,
};
pub use route::{RouteIndex, RouteMatch, RouteSpecificity, RouteTemplate};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for assembling apps
    pub use crate::{
        AppError, AppResult, MemoryHistory, RouteMatch, SceneApp, SceneAppConfig,
        SceneAppDrilldownView, SceneAppPage, SceneAppPageState,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
