//! Multi-value variables
//!
//! A [`MultiValueVariable`] picks one or more values out of options produced
//! by a [`ValueOptionsSource`]. Every completed emission of the source is
//! validated against the current selection (see
//! [`update_value_given_new_options`](MultiValueVariable::update_value_given_new_options)),
//! so a stale selection always converges to something the options allow.
//!
//! # Cancellation
//!
//! Each resolution owns a [`CancellationToken`]. Starting a new resolution
//! or deactivating the variable cancels the previous token, and a cancelled
//! resolution returns [`VariableError::Cancelled`] without touching state.

use crate::dependency::VariableDependencyConfig;
use crate::error::{VariableError, VariableResult};
use crate::interpolation;
use crate::selection::{VariableSelection, VariableValueOption};
use futures::stream::{BoxStream, StreamExt};
use parking_lot::Mutex;
use scenes_core::prelude::*;
use scenes_core::url_sync::{SceneObjectUrlValues, UrlSyncHandler, UrlValue};
use scenes_core::{
    CustomVariableValue, SceneVariable, SceneVariableValueChangedEvent, VariableDependency,
    VariableHide, VariableUpdate, VariableValue, ALL_VARIABLE_TEXT, ALL_VARIABLE_VALUE,
};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, debug_span, error, Instrument};

/// Prefix of variable keys in the URL query
pub const VARIABLE_URL_PREFIX: &str = "var-";

/// Stream of option snapshots; the stream ending concludes the resolution
pub type OptionsStream = BoxStream<'static, VariableResult<Vec<VariableValueOption>>>;

/// Input handed to an option source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionsRequest {
    /// Variable name
    pub name: String,
    /// Variable query after interpolation
    pub query: String,
}

/// Producer of selectable options
pub trait ValueOptionsSource: Send + Sync + 'static {
    /// Kind reported by variables using this source
    const KIND: &'static str;

    /// Start producing options for `request`
    fn get_value_options(&self, request: OptionsRequest) -> OptionsStream;
}

/// State shared by every multi-value variable
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MultiValueVariableState {
    /// Variable name
    pub name: String,
    /// Picker label
    pub label: Option<String>,
    /// Picker visibility
    pub hide: VariableHide,
    /// Query handed to the option source, interpolated first
    pub query: String,
    /// Selected value(s)
    pub value: VariableSelection,
    /// Display text of the selection
    pub text: VariableSelection,
    /// Options from the last completed resolution
    pub options: Vec<VariableValueOption>,
    /// Allow several values
    pub is_multi: bool,
    /// Offer the synthetic "All" option
    pub include_all: bool,
    /// Fall back to "All" instead of the first option
    pub default_to_all: bool,
    /// Literal substituted for "All" instead of expanding every option
    pub all_value: Option<String>,
    /// Keep the variable out of the URL
    pub skip_url_sync: bool,
    /// Resolution in flight
    pub loading: bool,
    /// Last resolution error
    pub error: Option<String>,
}

impl MultiValueVariableState {
    /// State with a name and empty selection
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

impl SceneState for MultiValueVariableState {}

/// Stand-in value for "All" when the variable declares a custom all value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomAllValue {
    all_value: String,
    variable_name: String,
}

impl CustomAllValue {
    /// Custom all value of `variable_name`
    #[must_use]
    pub fn new(all_value: impl Into<String>, variable_name: impl Into<String>) -> Self {
        Self {
            all_value: all_value.into(),
            variable_name: variable_name.into(),
        }
    }
}

impl CustomVariableValue for CustomAllValue {
    fn formatter(&self, format: Option<&str>) -> String {
        match format {
            Some("text") => ALL_VARIABLE_TEXT.to_string(),
            Some("percentencode") => urlencoding::encode(&self.all_value).into_owned(),
            Some("queryparam") => format!(
                "{VARIABLE_URL_PREFIX}{}={}",
                urlencoding::encode(&self.variable_name),
                urlencoding::encode(ALL_VARIABLE_TEXT)
            ),
            _ => self.all_value.clone(),
        }
    }
}

/// Variable selecting among options produced by `Src`
pub struct MultiValueVariable<Src: ValueOptionsSource> {
    base: SceneObjectBase<MultiValueVariableState>,
    source: Src,
    dependencies: VariableDependencyConfig,
    resolution: Mutex<Resolution>,
}

#[derive(Default)]
struct Resolution {
    generation: u64,
    token: Option<CancellationToken>,
}

impl<Src: ValueOptionsSource> MultiValueVariable<Src> {
    /// Variable from state and option source
    #[must_use]
    pub fn new(state: MultiValueVariableState, source: Src) -> Arc<Self> {
        let dependencies = VariableDependencyConfig::from_templates(&[state.query.as_str()]);
        attach(Self {
            base: SceneObjectBase::new(state),
            source,
            dependencies,
            resolution: Mutex::new(Resolution::default()),
        })
    }

    /// Current state snapshot
    #[inline]
    #[must_use]
    pub fn state(&self) -> Arc<MultiValueVariableState> {
        self.base.state()
    }

    /// Update state; query changes rescan dependencies
    pub fn set_state(&self, update: impl FnOnce(&mut MultiValueVariableState)) {
        self.base.set_state(update);
        self.dependencies.set_templates(&[self.base.state().query.as_str()]);
    }

    /// Object base
    #[inline]
    #[must_use]
    pub fn base(&self) -> &SceneObjectBase<MultiValueVariableState> {
        &self.base
    }

    /// Option source
    #[inline]
    #[must_use]
    pub fn source(&self) -> &Src {
        &self.source
    }

    /// Fetch options and reconcile the selection with every emission
    ///
    /// Cancels any resolution still in flight. Source failures are stored
    /// in the `error` state and returned; the selection stays untouched.
    pub async fn validate_and_update(self: Arc<Self>) -> VariableResult<()> {
        let span = debug_span!("validate_and_update", variable = %self.base.state().name);
        self.run_resolution().instrument(span).await
    }

    async fn run_resolution(self: Arc<Self>) -> VariableResult<()> {
        let (generation, token) = self.begin_resolution();
        let state = self.base.state();
        let request = OptionsRequest {
            name: state.name.clone(),
            query: interpolation::interpolate(&*self, &state.query, None, None),
        };
        debug!(query = %request.query, "resolving options");
        self.base.set_state(|s| s.loading = true);

        let mut options = self.source.get_value_options(request);
        let mut emitted = false;
        loop {
            let next = tokio::select! {
                biased;
                () = token.cancelled() => {
                    debug!("resolution cancelled");
                    return Err(VariableError::Cancelled);
                }
                next = options.next() => next,
            };
            match next {
                Some(Ok(batch)) => {
                    self.update_value_given_new_options(batch);
                    emitted = true;
                }
                Some(Err(err)) => {
                    error!(error = %err, "option source failed");
                    let message = err.to_string();
                    self.base.set_state(|s| {
                        s.loading = false;
                        s.error = Some(message);
                    });
                    self.finish_resolution(generation);
                    return Err(err);
                }
                None => break,
            }
        }

        if !emitted {
            self.update_value_given_new_options(Vec::new());
        }
        self.finish_resolution(generation);
        debug!(value = ?self.base.state().value, "resolution finished");
        Ok(())
    }

    fn begin_resolution(&self) -> (u64, CancellationToken) {
        let token = CancellationToken::new();
        let mut current = self.resolution.lock();
        if let Some(previous) = current.token.replace(token.clone()) {
            previous.cancel();
        }
        current.generation += 1;
        (current.generation, token)
    }

    fn finish_resolution(&self, generation: u64) {
        let mut current = self.resolution.lock();
        if current.generation == generation {
            current.token = None;
        }
    }

    /// Cancel the resolution in flight, if any
    pub fn cancel_resolution(&self) {
        if let Some(token) = self.resolution.lock().token.take() {
            token.cancel();
        }
    }

    /// Reconcile the selection with `options`, store them and publish a
    /// value-changed event
    pub fn update_value_given_new_options(&self, options: Vec<VariableValueOption>) {
        self.base.set_state(|s| {
            s.loading = false;
            s.error = None;
            reconcile_selection(s, options);
        });
        self.publish_value_changed();
    }

    /// Select `value`, resolving display text from the options
    ///
    /// Lists are normalized around the all-sentinel: a leading sentinel
    /// followed by concrete values is dropped, otherwise a sentinel anywhere
    /// collapses the list to the sentinel alone. An empty list takes the
    /// default multi state.
    pub fn change_value_to(&self, value: impl Into<VariableSelection>) {
        let state = self.base.state();
        let mut value = value.into();
        if state.is_multi {
            if let VariableSelection::Single(v) = value {
                value = VariableSelection::Multi(vec![v]);
            }
        }

        let (value, text) = match value {
            VariableSelection::Single(v) => {
                let text = find_label_for_value(&state.options, &v);
                (VariableSelection::Single(v), VariableSelection::Single(text))
            }
            VariableSelection::Multi(values) => {
                let values = normalize_all_sentinel(values);
                if values.is_empty() {
                    default_multi_state(&state)
                } else {
                    let text = values
                        .iter()
                        .map(|v| find_label_for_value(&state.options, v))
                        .collect();
                    (
                        VariableSelection::Multi(values),
                        VariableSelection::Multi(text),
                    )
                }
            }
        };

        self.base.set_state(|s| {
            s.value = value;
            s.text = text;
            s.loading = false;
        });
        self.publish_value_changed();
    }

    /// Options offered to a picker
    ///
    /// The "All" option comes first when enabled. A scalar selection missing
    /// from the options is appended so the picker can show it.
    #[must_use]
    pub fn get_options_for_select(&self) -> Vec<VariableValueOption> {
        let state = self.base.state();
        let mut options = state.options.clone();
        if state.include_all {
            options.insert(0, VariableValueOption::all());
        }
        if let (VariableSelection::Single(value), text) = (&state.value, &state.text) {
            if !options.iter().any(|o| &o.value == value) {
                let label = text.first().unwrap_or(value.as_str()).to_string();
                options.push(VariableValueOption::new(label, value.clone()));
            }
        }
        options
    }

    fn url_key(&self) -> String {
        format!("{VARIABLE_URL_PREFIX}{}", self.base.state().name)
    }

    fn publish_value_changed(&self) {
        let event = SceneVariableValueChangedEvent {
            name: self.base.state().name.clone(),
            key: self.key().clone(),
        };
        self.publish_to_ancestors(&event);
    }
}

/// Reconcile `state` with freshly resolved options
fn reconcile_selection(state: &mut MultiValueVariableState, options: Vec<VariableValueOption>) {
    if options.is_empty() {
        if state.default_to_all {
            let (value, text) = all_selection(state.is_multi);
            state.value = value;
            state.text = text;
        }
        state.options = options;
        return;
    }

    if state.value.has_all() {
        let (value, text) = all_selection(state.value.is_multi());
        state.value = value;
        state.text = text;
        state.options = options;
        return;
    }

    let (value, text) = match &state.value {
        VariableSelection::Multi(current) => {
            let valid: Vec<&VariableValueOption> = current
                .iter()
                .filter_map(|v| options.iter().find(|o| &o.value == v))
                .collect();
            if valid.is_empty() {
                if state.default_to_all {
                    all_selection(true)
                } else {
                    (
                        VariableSelection::Multi(vec![options[0].value.clone()]),
                        VariableSelection::Multi(vec![options[0].label.clone()]),
                    )
                }
            } else {
                (
                    VariableSelection::Multi(valid.iter().map(|o| o.value.clone()).collect()),
                    VariableSelection::Multi(valid.iter().map(|o| o.label.clone()).collect()),
                )
            }
        }
        VariableSelection::Single(current) => {
            let current_text = state.text.first().unwrap_or_default();
            let matching = options
                .iter()
                .find(|o| &o.value == current)
                .or_else(|| options.iter().find(|o| o.label == current_text));
            match matching {
                Some(option) => (
                    VariableSelection::Single(option.value.clone()),
                    VariableSelection::Single(option.label.clone()),
                ),
                None if state.default_to_all => all_selection(state.is_multi),
                None => (
                    VariableSelection::Single(options[0].value.clone()),
                    VariableSelection::Single(options[0].label.clone()),
                ),
            }
        }
    };

    let (value, text) = match (state.is_multi, value, text) {
        (true, VariableSelection::Single(v), VariableSelection::Single(t)) => {
            (VariableSelection::Multi(vec![v]), VariableSelection::Multi(vec![t]))
        }
        (_, value, text) => (value, text),
    };
    state.value = value;
    state.text = text;
    state.options = options;
}

fn all_selection(is_multi: bool) -> (VariableSelection, VariableSelection) {
    if is_multi {
        (
            VariableSelection::Multi(vec![ALL_VARIABLE_VALUE.into()]),
            VariableSelection::Multi(vec![ALL_VARIABLE_TEXT.into()]),
        )
    } else {
        (
            VariableSelection::Single(ALL_VARIABLE_VALUE.into()),
            VariableSelection::Single(ALL_VARIABLE_TEXT.into()),
        )
    }
}

fn default_multi_state(state: &MultiValueVariableState) -> (VariableSelection, VariableSelection) {
    if state.default_to_all {
        return all_selection(true);
    }
    match state.options.first() {
        Some(first) => (
            VariableSelection::Multi(vec![first.value.clone()]),
            VariableSelection::Multi(vec![first.label.clone()]),
        ),
        None => (
            VariableSelection::Multi(Vec::new()),
            VariableSelection::Multi(Vec::new()),
        ),
    }
}

fn normalize_all_sentinel(mut values: Vec<String>) -> Vec<String> {
    if values.len() > 1 && values[0] == ALL_VARIABLE_VALUE {
        values.retain(|v| v != ALL_VARIABLE_VALUE);
        values
    } else if values.iter().any(|v| v == ALL_VARIABLE_VALUE) {
        vec![ALL_VARIABLE_VALUE.to_string()]
    } else {
        values
    }
}

fn find_label_for_value(options: &[VariableValueOption], value: &str) -> String {
    if value == ALL_VARIABLE_VALUE {
        return ALL_VARIABLE_TEXT.to_string();
    }
    options
        .iter()
        .find(|o| o.value == value)
        .or_else(|| options.iter().find(|o| o.label == value))
        .map_or_else(|| value.to_string(), |o| o.label.clone())
}

impl<Src: ValueOptionsSource> SceneObject for MultiValueVariable<Src> {
    fn node(&self) -> &SceneNode {
        self.base.node()
    }

    fn kind(&self) -> &'static str {
        Src::KIND
    }

    scene_object_casts!();

    fn on_activate(&self) -> Option<Subscription> {
        let this = self.node().this_as::<Self>()?;
        let weak = Arc::downgrade(&this);
        Some(Subscription::from_fn(move || {
            if let Some(variable) = weak.upgrade() {
                variable.cancel_resolution();
            }
        }))
    }

    fn as_variable(&self) -> Option<&dyn SceneVariable> {
        Some(self)
    }

    fn as_url_sync(&self) -> Option<&dyn UrlSyncHandler> {
        Some(self)
    }

    fn variable_dependency(&self) -> Option<&dyn VariableDependency> {
        Some(&self.dependencies)
    }
}

impl<Src: ValueOptionsSource> SceneVariable for MultiValueVariable<Src> {
    fn name(&self) -> String {
        self.base.state().name.clone()
    }

    fn label(&self) -> Option<String> {
        self.base.state().label.clone()
    }

    fn hide(&self) -> VariableHide {
        self.base.state().hide
    }

    fn get_value(&self, field_path: Option<&str>) -> Option<VariableValue> {
        let state = self.base.state();
        if state.value.has_all() {
            return Some(match &state.all_value {
                Some(all_value) => {
                    VariableValue::Custom(Arc::new(CustomAllValue::new(all_value, &state.name)))
                }
                None => VariableValue::List(state.options.iter().map(|o| o.value.clone()).collect()),
            });
        }
        if let (Some(path), VariableSelection::Multi(values)) = (field_path, &state.value) {
            if let Some(value) = path.parse::<usize>().ok().and_then(|i| values.get(i)) {
                return Some(VariableValue::Text(value.clone()));
            }
        }
        Some(state.value.clone().into())
    }

    fn get_value_text(&self, _field_path: Option<&str>) -> String {
        let state = self.base.state();
        if state.value.has_all() {
            return ALL_VARIABLE_TEXT.to_string();
        }
        match &state.text {
            VariableSelection::Single(text) => text.clone(),
            VariableSelection::Multi(texts) => texts.join(" + "),
        }
    }

    fn has_all_value(&self) -> bool {
        let state = self.base.state();
        state.value.has_all() && state.all_value.is_none()
    }

    fn is_loading(&self) -> bool {
        self.base.state().loading
    }

    fn error(&self) -> Option<String> {
        self.base.state().error.clone()
    }

    fn validate_and_update(self: Arc<Self>) -> Option<VariableUpdate> {
        Some(Box::pin(async move {
            MultiValueVariable::validate_and_update(self)
                .await
                .map_err(SceneError::from)
        }))
    }

    fn into_variable(self: Arc<Self>) -> Arc<dyn SceneVariable> {
        self
    }
}

impl<Src: ValueOptionsSource> UrlSyncHandler for MultiValueVariable<Src> {
    fn url_keys(&self) -> Vec<String> {
        vec![self.url_key()]
    }

    fn get_url_state(&self) -> SceneObjectUrlValues {
        let state = self.base.state();
        let mut values = SceneObjectUrlValues::new();
        if state.skip_url_sync {
            return values;
        }
        let value = match &state.value {
            VariableSelection::Single(v) => UrlValue::Single(v.clone()),
            VariableSelection::Multi(vs) => UrlValue::Multi(vs.clone()),
        };
        values.insert(self.url_key(), value);
        values
    }

    fn update_from_url(&self, values: &SceneObjectUrlValues) {
        let Some(url_value) = values.get(&self.url_key()) else {
            return;
        };
        let include_all = self.base.state().include_all;
        let legacy_all = |v: String| {
            if include_all && v == ALL_VARIABLE_TEXT {
                ALL_VARIABLE_VALUE.to_string()
            } else {
                v
            }
        };
        let selection = match url_value {
            UrlValue::Single(v) => VariableSelection::Single(legacy_all(v.clone())),
            UrlValue::Multi(vs) => {
                VariableSelection::Multi(vs.iter().cloned().map(legacy_all).collect())
            }
        };
        self.change_value_to(selection);
    }
}

impl<Src: ValueOptionsSource> fmt::Debug for MultiValueVariable<Src> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiValueVariable")
            .field("kind", &Src::KIND)
            .field("node", self.base.node())
            .field("state", &self.base.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed(Vec<VariableValueOption>);

    impl ValueOptionsSource for Fixed {
        const KIND: &'static str = "fixed";

        fn get_value_options(&self, _request: OptionsRequest) -> OptionsStream {
            stream::iter(vec![Ok(self.0.clone())]).boxed()
        }
    }

    fn opts(pairs: &[(&str, &str)]) -> Vec<VariableValueOption> {
        pairs
            .iter()
            .map(|(label, value)| VariableValueOption::new(*label, *value))
            .collect()
    }

    fn variable(
        state: MultiValueVariableState,
        returns: &[(&str, &str)],
    ) -> Arc<MultiValueVariable<Fixed>> {
        MultiValueVariable::new(state, Fixed(opts(returns)))
    }

    fn named() -> MultiValueVariableState {
        MultiValueVariableState::named("test")
    }

    #[tokio::test]
    async fn picks_first_option_when_value_is_invalid() {
        let v = variable(
            MultiValueVariableState {
                value: "A".into(),
                text: "A".into(),
                ..named()
            },
            &[("B", "B"), ("C", "C")],
        );
        v.clone().validate_and_update().await.unwrap();
        assert_eq!(v.state().value, VariableSelection::from("B"));
        assert_eq!(v.state().text, VariableSelection::from("B"));
    }

    #[tokio::test]
    async fn picks_all_when_default_to_all() {
        let v = variable(
            MultiValueVariableState {
                default_to_all: true,
                ..named()
            },
            &[("B", "B"), ("C", "C")],
        );
        v.clone().validate_and_update().await.unwrap();
        assert_eq!(v.state().value, VariableSelection::all());
    }

    #[tokio::test]
    async fn keeps_valid_value() {
        let v = variable(
            MultiValueVariableState {
                value: "A".into(),
                text: "A".into(),
                ..named()
            },
            &[("A", "A")],
        );
        v.clone().validate_and_update().await.unwrap();
        assert_eq!(v.state().value, VariableSelection::from("A"));
        assert_eq!(v.state().text, VariableSelection::from("A"));
    }

    #[tokio::test]
    async fn multi_keeps_valid_entries_in_order() {
        let v = variable(
            MultiValueVariableState {
                is_multi: true,
                value: vec!["A", "B", "C"].into(),
                text: vec!["A", "B", "C"].into(),
                ..named()
            },
            &[("A", "A"), ("C", "C")],
        );
        v.clone().validate_and_update().await.unwrap();
        assert_eq!(v.state().value, VariableSelection::from(vec!["A", "C"]));
        assert_eq!(v.state().text, VariableSelection::from(vec!["A", "C"]));
    }

    #[tokio::test]
    async fn multi_with_no_valid_entries_takes_first_option() {
        let v = variable(
            MultiValueVariableState {
                is_multi: true,
                value: vec!["D", "E"].into(),
                text: vec!["E", "E"].into(),
                ..named()
            },
            &[("A", "A"), ("C", "C")],
        );
        v.clone().validate_and_update().await.unwrap();
        assert_eq!(v.state().value, VariableSelection::from(vec!["A"]));
        assert_eq!(v.state().text, VariableSelection::from(vec!["A"]));
    }

    #[tokio::test]
    async fn multi_with_no_valid_entries_takes_all_when_default_to_all() {
        let v = variable(
            MultiValueVariableState {
                is_multi: true,
                default_to_all: true,
                value: vec!["D", "E"].into(),
                text: vec!["E", "E"].into(),
                ..named()
            },
            &[("A", "A"), ("C", "C")],
        );
        v.clone().validate_and_update().await.unwrap();
        assert_eq!(v.state().value, VariableSelection::from(vec![ALL_VARIABLE_VALUE]));
        assert_eq!(v.state().text, VariableSelection::from(vec![ALL_VARIABLE_TEXT]));
    }

    #[tokio::test]
    async fn all_value_survives_and_event_is_published() {
        let v = variable(
            MultiValueVariableState {
                value: ALL_VARIABLE_VALUE.into(),
                text: ALL_VARIABLE_TEXT.into(),
                ..named()
            },
            &[("A", "1"), ("B", "2")],
        );
        let events = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&events);
        let _sub = v.subscribe_to_event(move |_: &SceneVariableValueChangedEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        v.clone().validate_and_update().await.unwrap();

        assert_eq!(v.state().value, VariableSelection::all());
        assert_eq!(v.state().text, VariableSelection::from(ALL_VARIABLE_TEXT));
        assert_eq!(v.state().options, opts(&[("A", "1"), ("B", "2")]));
        assert_eq!(events.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_options_leave_value_alone() {
        let v = variable(
            MultiValueVariableState {
                value: "x".into(),
                text: "x".into(),
                ..named()
            },
            &[],
        );
        v.clone().validate_and_update().await.unwrap();
        assert_eq!(v.state().value, VariableSelection::from("x"));
        assert!(!v.state().loading);
    }

    #[tokio::test]
    async fn mixed_all_value_collapses_with_its_text() {
        let v = variable(
            MultiValueVariableState {
                is_multi: true,
                value: vec!["1", ALL_VARIABLE_VALUE].into(),
                text: vec!["A", ALL_VARIABLE_TEXT].into(),
                ..named()
            },
            &[("A", "1")],
        );
        v.clone().validate_and_update().await.unwrap();

        let state = v.state();
        assert_eq!(state.value, VariableSelection::from(vec![ALL_VARIABLE_VALUE]));
        assert_eq!(state.text, VariableSelection::from(vec![ALL_VARIABLE_TEXT]));
        assert_eq!(state.value.values().len(), state.text.values().len());
    }

    struct Silent;

    impl ValueOptionsSource for Silent {
        const KIND: &'static str = "silent";

        fn get_value_options(&self, _request: OptionsRequest) -> OptionsStream {
            stream::empty().boxed()
        }
    }

    #[tokio::test]
    async fn resolution_without_emission_still_publishes() {
        let v = MultiValueVariable::new(
            MultiValueVariableState {
                value: "x".into(),
                text: "x".into(),
                ..named()
            },
            Silent,
        );
        let events = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&events);
        let _sub = v.subscribe_to_event(move |_: &SceneVariableValueChangedEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        v.clone().validate_and_update().await.unwrap();

        assert_eq!(events.load(Ordering::SeqCst), 1);
        assert_eq!(v.state().value, VariableSelection::from("x"));
        assert!(!v.state().loading);
    }

    #[tokio::test]
    async fn resolution_without_emission_defaults_to_all() {
        let v = MultiValueVariable::new(
            MultiValueVariableState {
                default_to_all: true,
                ..named()
            },
            Silent,
        );
        v.clone().validate_and_update().await.unwrap();
        assert_eq!(v.state().value, VariableSelection::all());
        assert_eq!(v.state().text, VariableSelection::from(ALL_VARIABLE_TEXT));
    }

    #[test]
    fn empty_multi_change_becomes_all() {
        let v = variable(
            MultiValueVariableState {
                is_multi: true,
                default_to_all: true,
                value: vec!["1"].into(),
                text: vec!["A"].into(),
                ..named()
            },
            &[],
        );
        v.change_value_to(Vec::<String>::new());
        assert_eq!(v.state().value, VariableSelection::from(vec![ALL_VARIABLE_VALUE]));
    }

    #[test]
    fn changing_to_all_collapses() {
        let v = variable(
            MultiValueVariableState {
                is_multi: true,
                default_to_all: true,
                options: opts(&[("A", "1"), ("B", "2")]),
                value: vec!["1"].into(),
                text: vec!["A"].into(),
                ..named()
            },
            &[],
        );
        v.change_value_to(vec!["1", ALL_VARIABLE_VALUE]);
        assert_eq!(v.state().value, VariableSelection::from(vec![ALL_VARIABLE_VALUE]));
        assert_eq!(v.state().text, VariableSelection::from(vec![ALL_VARIABLE_TEXT]));
    }

    #[test]
    fn changing_from_all_drops_sentinel() {
        let v = variable(
            MultiValueVariableState {
                is_multi: true,
                default_to_all: true,
                options: opts(&[("A", "1"), ("B", "2")]),
                ..named()
            },
            &[],
        );
        v.change_value_to(vec![ALL_VARIABLE_VALUE, "1"]);
        assert_eq!(v.state().value, VariableSelection::from(vec!["1"]));
        assert_eq!(v.state().text, VariableSelection::from(vec!["A"]));
    }

    #[test]
    fn change_publishes_even_without_change() {
        let v = variable(
            MultiValueVariableState {
                value: "1".into(),
                text: "1".into(),
                ..named()
            },
            &[],
        );
        let events = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&events);
        let _sub = v.subscribe_to_event(move |_: &SceneVariableValueChangedEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        v.change_value_to("1");
        v.change_value_to("1");
        assert_eq!(events.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn value_and_text() {
        let v = variable(
            MultiValueVariableState {
                value: "1".into(),
                text: "A".into(),
                ..named()
            },
            &[],
        );
        assert_eq!(v.get_value(None), Some(VariableValue::from("1")));
        assert_eq!(v.get_value_text(None), "A");

        v.set_state(|s| s.value = VariableSelection::all());
        assert_eq!(v.get_value_text(None), ALL_VARIABLE_TEXT);

        v.set_state(|s| {
            s.value = vec!["1", "2"].into();
            s.text = vec!["A", "B"].into();
        });
        assert_eq!(v.get_value_text(None), "A + B");
        assert_eq!(v.get_value(Some("1")), Some(VariableValue::from("2")));
    }

    #[test]
    fn all_value_expands_options() {
        let v = variable(
            MultiValueVariableState {
                options: opts(&[("A", "1"), ("B", "2")]),
                value: ALL_VARIABLE_VALUE.into(),
                text: "A".into(),
                ..named()
            },
            &[],
        );
        assert_eq!(v.get_value(None), Some(VariableValue::from(vec!["1", "2"])));
    }

    #[test]
    fn custom_all_value_formats() {
        let v = variable(
            MultiValueVariableState {
                value: ALL_VARIABLE_VALUE.into(),
                all_value: Some(".*".to_string()),
                text: "A".into(),
                ..named()
            },
            &[],
        );
        let Some(VariableValue::Custom(value)) = v.get_value(None) else {
            panic!("expected a custom all value");
        };
        assert_eq!(value.formatter(None), ".*");
        assert_eq!(value.formatter(Some("text")), ALL_VARIABLE_TEXT);
        assert_eq!(value.formatter(Some("regex")), ".*");
        assert_eq!(value.formatter(Some("percentencode")), ".%2A");
        assert_eq!(value.formatter(Some("queryparam")), "var-test=All");
    }

    #[test]
    fn options_for_select() {
        let v = variable(
            MultiValueVariableState {
                options: opts(&[("A", "1")]),
                value: "1".into(),
                text: "A".into(),
                ..named()
            },
            &[],
        );
        assert_eq!(v.get_options_for_select(), opts(&[("A", "1")]));

        v.set_state(|s| s.include_all = true);
        assert_eq!(
            v.get_options_for_select(),
            vec![VariableValueOption::all(), VariableValueOption::new("A", "1")]
        );

        let missing = variable(
            MultiValueVariableState {
                value: "1".into(),
                text: "A".into(),
                ..named()
            },
            &[],
        );
        assert_eq!(missing.get_options_for_select(), opts(&[("A", "1")]));
    }

    #[test]
    fn url_state_single_and_multi() {
        let v = variable(
            MultiValueVariableState {
                value: "1".into(),
                text: "A".into(),
                ..named()
            },
            &[],
        );
        assert_eq!(v.get_url_state().get("var-test"), Some(&UrlValue::from("1")));
        assert_eq!(v.url_keys(), vec![format!("{VARIABLE_URL_PREFIX}test")]);

        v.set_state(|s| {
            s.value = vec!["1", "2"].into();
            s.text = vec!["A", "B"].into();
        });
        assert_eq!(
            v.get_url_state().get("var-test"),
            Some(&UrlValue::from(vec!["1", "2"]))
        );
    }

    #[test]
    fn update_from_url_resolves_text() {
        let v = variable(
            MultiValueVariableState {
                options: opts(&[("A", "1"), ("B", "2")]),
                value: "1".into(),
                text: "A".into(),
                ..named()
            },
            &[],
        );
        let mut values = SceneObjectUrlValues::new();
        values.insert("var-test".into(), UrlValue::from("2"));
        v.update_from_url(&values);
        assert_eq!(v.state().value, VariableSelection::from("2"));
        assert_eq!(v.state().text, VariableSelection::from("B"));

        values.insert("var-test".into(), UrlValue::from(vec!["2", "1"]));
        v.update_from_url(&values);
        assert_eq!(v.state().value, VariableSelection::from(vec!["2", "1"]));
        assert_eq!(v.state().text, VariableSelection::from(vec!["B", "A"]));
    }

    #[test]
    fn legacy_all_in_url() {
        let v = variable(
            MultiValueVariableState {
                include_all: true,
                ..named()
            },
            &[],
        );
        let mut values = SceneObjectUrlValues::new();
        values.insert("var-test".into(), UrlValue::from("All"));
        v.update_from_url(&values);
        assert_eq!(v.state().value, VariableSelection::all());
    }
}
