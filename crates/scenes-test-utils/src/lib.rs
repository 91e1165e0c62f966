//! Testing utilities for the scenes workspace
//!
//! Shared fixtures: tracing setup, a variable with scripted option
//! emissions, scene builders and an in-memory router.

#![allow(missing_docs)]

use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use scenes_app::{MemoryHistory, SceneApp, SceneAppPage, SceneAppPageState};
use scenes_core::{
    EmbeddedScene, RenderContext, SceneCanvasText, SceneFlexItem, SceneFlexLayout,
    SceneFlexLayoutState, SceneKey, SceneObject, SceneObjectExt, SceneObjectRef, SceneSlots,
    SceneVariable, ViewNode,
};
use scenes_variables::{
    MultiValueVariable, MultiValueVariableState, OptionsRequest, OptionsStream, SceneInterpolator,
    SceneVariableSet, UpdateReport, ValueOptionsSource, VariableError, VariableValueOption,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Install a test-friendly subscriber once; later calls are no-ops
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("scenes_core=debug,scenes_variables=debug,scenes_app=debug")
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

// ---------------------------------------------------------------------------
// Scripted option source
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum ScriptStep {
    Options(Vec<VariableValueOption>),
    Fail(String),
}

/// Option source replaying a fixed script on every request
#[derive(Debug, Clone, Default)]
pub struct ScriptedOptions {
    script: Vec<ScriptStep>,
    delay: Option<Duration>,
    requests: Arc<AtomicUsize>,
    queries: Arc<Mutex<Vec<String>>>,
}

impl ScriptedOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit options whose label equals their value
    pub fn emit(mut self, values: &[&str]) -> Self {
        self.script.push(ScriptStep::Options(
            values.iter().map(|v| VariableValueOption::same(*v)).collect(),
        ));
        self
    }

    /// Emit `(label, value)` options
    pub fn emit_labeled(mut self, pairs: &[(&str, &str)]) -> Self {
        self.script.push(ScriptStep::Options(
            pairs
                .iter()
                .map(|(label, value)| VariableValueOption::new(*label, *value))
                .collect(),
        ));
        self
    }

    pub fn fail(mut self, reason: &str) -> Self {
        self.script.push(ScriptStep::Fail(reason.to_string()));
        self
    }

    /// Wait this long before each step
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Interpolated queries in request order
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().clone()
    }
}

impl ValueOptionsSource for ScriptedOptions {
    const KIND: &'static str = "example";

    fn get_value_options(&self, request: OptionsRequest) -> OptionsStream {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().push(request.query.clone());
        let delay = self.delay;
        let name = request.name;

        stream::iter(self.script.clone())
            .then(move |step| {
                let name = name.clone();
                async move {
                    if let Some(delay) = delay {
                        tokio::time::sleep(delay).await;
                    }
                    match step {
                        ScriptStep::Options(options) => Ok(options),
                        ScriptStep::Fail(reason) => {
                            Err(VariableError::OptionsFetch { name, reason })
                        }
                    }
                }
            })
            .boxed()
    }
}

pub type ExampleVariable = MultiValueVariable<ScriptedOptions>;

/// Single-value variable offering `values`
pub fn example_variable(name: &str, values: &[&str]) -> Arc<ExampleVariable> {
    MultiValueVariable::new(
        MultiValueVariableState::named(name),
        ScriptedOptions::new().emit(values),
    )
}

/// Variable with explicit state and script
pub fn example_variable_with(
    state: MultiValueVariableState,
    script: ScriptedOptions,
) -> Arc<ExampleVariable> {
    MultiValueVariable::new(state, script)
}

// ---------------------------------------------------------------------------
// Scene builders
// ---------------------------------------------------------------------------

/// Layout holding a variable set and one text leaf
pub struct TestScene {
    pub root: Arc<SceneFlexLayout>,
    pub set: Arc<SceneVariableSet>,
    pub leaf: Arc<SceneCanvasText>,
}

impl TestScene {
    pub fn new(variables: Vec<Arc<dyn SceneVariable>>, text: &str) -> Self {
        let set = SceneVariableSet::new(variables);
        let leaf = SceneCanvasText::new(text);
        let root = SceneFlexLayout::new(SceneFlexLayoutState {
            children: vec![leaf.clone()],
            slots: SceneSlots {
                variables: Some(set.clone()),
                ..SceneSlots::default()
            },
            ..SceneFlexLayoutState::default()
        });
        Self { root, set, leaf }
    }

    /// Activate the scene and run the variable queue to completion
    pub async fn settle(&self) -> UpdateReport {
        self.root.activate();
        self.set
            .process_updates()
            .await
            .expect("variable set settles")
    }

    /// Leaf text after interpolation
    pub fn text(&self) -> String {
        let view = self.render();
        view.find(&|v| v.key.as_ref() == Some(self.leaf.key()))
            .and_then(|v| v.text.clone())
            .unwrap_or_default()
    }

    pub fn render(&self) -> ViewNode {
        let ctx = RenderContext::new()
            .with_interpolator(Arc::new(SceneInterpolator::with_defaults()));
        self.root.render(&ctx).expect("scene renders")
    }
}

/// Scene shaped like a dashboard: scene root, flex layout, one item
pub fn wrap_in_scene(object: SceneObjectRef) -> SceneObjectRef {
    EmbeddedScene::new(SceneFlexLayout::row(vec![SceneFlexItem::new(object)]))
}

/// Page whose scene shows `text`
pub fn text_page(title: &str, url: &str, text: &str) -> Arc<SceneAppPage> {
    let text = text.to_string();
    SceneAppPage::new(
        SceneAppPageState::new(title, url)
            .with_scene(move || wrap_in_scene(SceneCanvasText::new(text.clone()))),
    )
}

/// Check if a view produced by the object with `key` is present
pub fn renders_key(view: &ViewNode, key: &SceneKey) -> bool {
    view.find(&|v| v.key.as_ref() == Some(key)).is_some()
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// App mounted on a memory history
pub struct TestRouter {
    pub app: Arc<SceneApp>,
    pub history: MemoryHistory,
}

impl TestRouter {
    /// Mount `app` at `url`
    pub fn start(app: Arc<SceneApp>, url: &str) -> Self {
        Self {
            app,
            history: MemoryHistory::new(url),
        }
    }

    /// Push `url` and render the app there
    pub fn push(&self, url: &str) -> ViewNode {
        self.history.push(url);
        self.view()
    }

    /// Render the app at the current history location
    pub fn view(&self) -> ViewNode {
        self.app
            .render_location(&self.history.location())
            .expect("app renders inside a router")
    }

    pub fn breadcrumbs(&self) -> Vec<String> {
        self.app.breadcrumbs()
    }
}
