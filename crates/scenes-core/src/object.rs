//! Scene objects: identity, parent links and state containers
//!
//! A scene object is any `Arc`-held value implementing [`SceneObject`]. It
//! owns a [`SceneNode`] carrying its key, a weak back-reference to its parent
//! and its event bus. Objects with typed state embed a [`SceneObjectBase`],
//! which replaces the state snapshot wholesale on every update.
//!
//! Parent links are weak and children are strong, so dropping the root
//! releases the whole tree.

use crate::data::SceneDataProvider;
use crate::error::SceneResult;
use crate::events::{EventBus, ListenerTable, SceneEvent, Subscription};
use crate::layout::SceneLayout;
use crate::lifecycle;
use crate::time_range::SceneTimeRangeLike;
use crate::url_sync::{Location, UrlSyncHandler};
use crate::variables::{SceneVariable, SceneVariables, VariableDependency};
use crate::view::{RenderContext, ViewNode};
use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::warn;
use uuid::Uuid;

/// Shared handle to any scene object
pub type SceneObjectRef = Arc<dyn SceneObject>;

/// Stable node identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SceneKey(String);

impl SceneKey {
    /// Fresh random key
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Key as string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SceneKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SceneKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SceneKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Type-erased handle used to drop state listeners on deactivation
pub(crate) trait ListenerSet: Send + Sync {
    fn clear(&self);
}

impl<A: ?Sized + 'static> ListenerSet for ListenerTable<A> {
    fn clear(&self) {
        ListenerTable::clear(self);
    }
}

/// Per-object bookkeeping shared by every scene object
pub struct SceneNode {
    key: SceneKey,
    this: OnceCell<Weak<dyn SceneObject>>,
    parent: RwLock<Option<Weak<dyn SceneObject>>>,
    active: AtomicBool,
    events: EventBus,
    state_listeners: Option<Arc<dyn ListenerSet>>,
    activation: Mutex<Vec<Subscription>>,
}

impl SceneNode {
    /// Node with a generated key and no state listeners
    #[must_use]
    pub fn new() -> Self {
        Self::with_key(SceneKey::generate())
    }

    /// Node with an explicit key
    #[must_use]
    pub fn with_key(key: SceneKey) -> Self {
        Self {
            key,
            this: OnceCell::new(),
            parent: RwLock::new(None),
            active: AtomicBool::new(false),
            events: EventBus::new(),
            state_listeners: None,
            activation: Mutex::new(Vec::new()),
        }
    }

    fn with_listeners(key: SceneKey, listeners: Arc<dyn ListenerSet>) -> Self {
        Self {
            state_listeners: Some(listeners),
            ..Self::with_key(key)
        }
    }

    /// Node identity
    #[inline]
    #[must_use]
    pub fn key(&self) -> &SceneKey {
        &self.key
    }

    /// Strong handle to the object owning this node
    #[inline]
    #[must_use]
    pub fn this(&self) -> Option<SceneObjectRef> {
        self.this.get().and_then(Weak::upgrade)
    }

    /// Owning object downcast to its concrete type
    #[must_use]
    pub fn this_as<T: SceneObject>(&self) -> Option<Arc<T>> {
        self.this()
            .and_then(|obj| obj.into_any().downcast::<T>().ok())
    }

    /// Structural parent, `None` for the root
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<SceneObjectRef> {
        self.parent.read().as_ref().and_then(Weak::upgrade)
    }

    /// Check if the node is currently mounted
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Event bus of this node
    #[inline]
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Make this node the parent of `child`
    ///
    /// A child already owned by a different live parent is moved with a warning.
    pub fn adopt(&self, child: &SceneObjectRef) {
        let Some(this) = self.this.get() else {
            return;
        };
        let child_node = child.node();
        let mut parent = child_node.parent.write();
        if let Some(existing) = parent.as_ref().and_then(Weak::upgrade) {
            if existing.node().key() == &self.key {
                return;
            }
            warn!(
                child = %child_node.key,
                previous = %existing.node().key(),
                next = %self.key,
                "scene object already has a different parent; re-parenting"
            );
        }
        *parent = Some(Weak::clone(this));
    }

    /// Track a subscription released on the next deactivation
    pub fn add_activation_handle(&self, subscription: Subscription) {
        self.activation.lock().push(subscription);
    }

    pub(crate) fn bind(&self, this: Weak<dyn SceneObject>) {
        if self.this.set(this).is_err() {
            warn!(key = %self.key, "scene node bound twice");
        }
    }

    pub(crate) fn mark_active(&self) -> bool {
        !self.active.swap(true, Ordering::SeqCst)
    }

    pub(crate) fn mark_inactive(&self) -> bool {
        self.active.swap(false, Ordering::SeqCst)
    }

    pub(crate) fn release_activation(&self) {
        let handles = std::mem::take(&mut *self.activation.lock());
        drop(handles);
        self.events.clear();
        if let Some(listeners) = &self.state_listeners {
            listeners.clear();
        }
    }
}

impl Default for SceneNode {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SceneNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneNode")
            .field("key", &self.key)
            .field("active", &self.is_active())
            .field("parent", &self.parent().map(|p| p.node().key().clone()))
            .finish()
    }
}

/// Shared-facility providers attached to a node
#[derive(Clone, Default)]
pub struct SceneSlots {
    /// Time range provider
    pub time_range: Option<Arc<dyn SceneTimeRangeLike>>,
    /// Data provider
    pub data: Option<Arc<dyn SceneDataProvider>>,
    /// Variable set
    pub variables: Option<Arc<dyn SceneVariables>>,
}

impl SceneSlots {
    /// Visit every populated slot as a scene object
    pub fn for_each(&self, visit: &mut dyn FnMut(&SceneObjectRef)) {
        if let Some(time_range) = &self.time_range {
            visit(&Arc::clone(time_range).into_object());
        }
        if let Some(data) = &self.data {
            visit(&Arc::clone(data).into_object());
        }
        if let Some(variables) = &self.variables {
            visit(&Arc::clone(variables).into_object());
        }
    }

    /// Check if no slot is populated
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.time_range.is_none() && self.data.is_none() && self.variables.is_none()
    }
}

impl fmt::Debug for SceneSlots {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneSlots")
            .field("time_range", &self.time_range.is_some())
            .field("data", &self.data.is_some())
            .field("variables", &self.variables.is_some())
            .finish()
    }
}

/// A node in the scene tree
///
/// Capability accessors (`as_layout`, `as_variable_set`, ...) default to
/// `None`; graph resolution checks them while walking ancestors.
pub trait SceneObject: Any + Send + Sync {
    /// Node bookkeeping
    fn node(&self) -> &SceneNode;

    /// Short type name for logs and rendering
    fn kind(&self) -> &'static str;

    /// Borrow as `Any`
    fn as_any(&self) -> &dyn Any;

    /// Convert into `Arc<dyn Any>` for downcasting
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;

    /// Upcast into a plain scene object handle
    fn into_object(self: Arc<Self>) -> SceneObjectRef;

    /// Providers attached to this node
    fn slots(&self) -> SceneSlots {
        SceneSlots::default()
    }

    /// Visit slot providers then owned children, in render order
    fn for_each_child(&self, _visit: &mut dyn FnMut(&SceneObjectRef)) {}

    /// Setup run on activation; the returned handle is released on deactivation
    fn on_activate(&self) -> Option<Subscription> {
        None
    }

    /// Layout capability
    fn as_layout(&self) -> Option<&dyn SceneLayout> {
        None
    }

    /// Variable set capability
    fn as_variable_set(&self) -> Option<&dyn SceneVariables> {
        None
    }

    /// Variable capability
    fn as_variable(&self) -> Option<&dyn SceneVariable> {
        None
    }

    /// URL synchronization capability
    fn as_url_sync(&self) -> Option<&dyn UrlSyncHandler> {
        None
    }

    /// Variable references this node depends on
    fn variable_dependency(&self) -> Option<&dyn VariableDependency> {
        None
    }

    /// Location known to this node, for router-aware hosts
    fn current_location(&self) -> Option<Location> {
        None
    }

    /// Stateless view of this node
    fn render(&self, _ctx: &RenderContext) -> SceneResult<ViewNode> {
        Ok(ViewNode::new(self.kind(), self.node().key().clone()))
    }
}

impl dyn SceneObject {
    /// Downcast a borrowed object
    #[inline]
    #[must_use]
    pub fn downcast_ref<T: SceneObject>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Check the concrete type
    #[inline]
    #[must_use]
    pub fn is<T: SceneObject>(&self) -> bool {
        self.as_any().is::<T>()
    }
}

impl fmt::Debug for dyn SceneObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind(), self.node().key())
    }
}

/// Downcast a shared object handle
#[must_use]
pub fn downcast_arc<T: SceneObject>(object: SceneObjectRef) -> Option<Arc<T>> {
    object.into_any().downcast::<T>().ok()
}

/// Implements the casting methods of [`SceneObject`]
#[macro_export]
macro_rules! scene_object_casts {
    () => {
        fn as_any(&self) -> &dyn ::std::any::Any {
            self
        }

        fn into_any(
            self: ::std::sync::Arc<Self>,
        ) -> ::std::sync::Arc<dyn ::std::any::Any + Send + Sync> {
            self
        }

        fn into_object(self: ::std::sync::Arc<Self>) -> $crate::SceneObjectRef {
            self
        }
    };
}

/// Convenience operations available on every scene object
pub trait SceneObjectExt: SceneObject {
    /// Node identity
    #[inline]
    fn key(&self) -> &SceneKey {
        self.node().key()
    }

    /// Structural parent
    #[inline]
    fn parent(&self) -> Option<SceneObjectRef> {
        self.node().parent()
    }

    /// Check if mounted
    #[inline]
    fn is_active(&self) -> bool {
        self.node().is_active()
    }

    /// Mount this node and its subtree
    fn activate(&self) {
        lifecycle::activate(self);
    }

    /// Unmount this node and its subtree
    fn deactivate(&self) {
        lifecycle::deactivate(self);
    }

    /// Deliver an event to this node's subscribers only
    fn publish_event<E: SceneEvent>(&self, event: &E) {
        self.node().events().publish(event);
    }

    /// Deliver an event to this node, then to every ancestor, nearest first
    fn publish_to_ancestors<E: SceneEvent>(&self, event: &E) {
        self.node().events().publish(event);
        let mut current = self.node().parent();
        while let Some(node) = current {
            node.node().events().publish(event);
            current = node.node().parent();
        }
    }

    /// Listen for events delivered to this node
    fn subscribe_to_event<E, F>(&self, handler: F) -> Subscription
    where
        E: SceneEvent,
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.node().events().subscribe(handler)
    }

    /// Direct children in render order, slots first
    fn children(&self) -> Vec<SceneObjectRef> {
        let mut children = Vec::new();
        self.for_each_child(&mut |child| children.push(Arc::clone(child)));
        children
    }
}

impl<T: SceneObject + ?Sized> SceneObjectExt for T {}

/// State carried by a [`SceneObjectBase`]
pub trait SceneState: Clone + Send + Sync + 'static {
    /// Providers held in this state
    fn slots(&self) -> SceneSlots {
        SceneSlots::default()
    }

    /// Owned children held in this state
    fn for_each_child(&self, _visit: &mut dyn FnMut(&SceneObjectRef)) {}
}

/// Previous and current state handed to state listeners
#[derive(Debug)]
pub struct StateChange<S> {
    /// State after the update
    pub current: Arc<S>,
    /// State before the update
    pub previous: Arc<S>,
}

/// Typed state container embedded in concrete scene objects
pub struct SceneObjectBase<S: SceneState> {
    node: SceneNode,
    state: RwLock<Arc<S>>,
    listeners: Arc<ListenerTable<StateChange<S>>>,
}

impl<S: SceneState> SceneObjectBase<S> {
    /// Base with a generated key
    #[must_use]
    pub fn new(state: S) -> Self {
        Self::with_key(SceneKey::generate(), state)
    }

    /// Base with an explicit key
    #[must_use]
    pub fn with_key(key: SceneKey, state: S) -> Self {
        let listeners = ListenerTable::new();
        let erased: Arc<dyn ListenerSet> = Arc::clone(&listeners) as Arc<dyn ListenerSet>;
        Self {
            node: SceneNode::with_listeners(key, erased),
            state: RwLock::new(Arc::new(state)),
            listeners,
        }
    }

    /// Node bookkeeping
    #[inline]
    #[must_use]
    pub fn node(&self) -> &SceneNode {
        &self.node
    }

    /// Current state snapshot
    #[inline]
    #[must_use]
    pub fn state(&self) -> Arc<S> {
        Arc::clone(&self.state.read())
    }

    /// Replace the state with an updated copy and notify listeners
    ///
    /// New children are adopted and, when this node is active, activated.
    /// Children no longer present are deactivated.
    pub fn set_state(&self, update: impl FnOnce(&mut S)) {
        let (current, previous) = {
            let mut guard = self.state.write();
            let previous = Arc::clone(&guard);
            let mut next = (*previous).clone();
            update(&mut next);
            let current = Arc::new(next);
            *guard = Arc::clone(&current);
            (current, previous)
        };

        self.reconcile_children(&previous, &current);
        self.listeners.notify(&StateChange { current, previous });
    }

    /// Listen for state replacements; the callback receives `(current, previous)`
    pub fn subscribe_to_state<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&S, &S) + Send + Sync + 'static,
    {
        self.listeners
            .add(Arc::new(move |change: &StateChange<S>| {
                listener(&change.current, &change.previous);
            }))
    }

    /// Number of state listeners
    #[inline]
    #[must_use]
    pub fn state_listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Providers of the current state
    #[inline]
    #[must_use]
    pub fn slots(&self) -> SceneSlots {
        self.state().slots()
    }

    /// Visit slot providers then children of the current state
    pub fn for_each_child(&self, visit: &mut dyn FnMut(&SceneObjectRef)) {
        let state = self.state();
        state.slots().for_each(visit);
        state.for_each_child(visit);
    }

    fn reconcile_children(&self, previous: &S, current: &S) {
        let mut next_keys = HashSet::new();
        let mut present = Vec::new();
        let mut visit = |child: &SceneObjectRef| {
            self.node.adopt(child);
            next_keys.insert(child.node().key().clone());
            present.push(Arc::clone(child));
        };
        current.slots().for_each(&mut visit);
        current.for_each_child(&mut visit);

        if !self.node.is_active() {
            return;
        }

        let mut removed = Vec::new();
        let mut collect = |child: &SceneObjectRef| {
            if !next_keys.contains(child.node().key()) {
                removed.push(Arc::clone(child));
            }
        };
        previous.slots().for_each(&mut collect);
        previous.for_each_child(&mut collect);

        for child in removed {
            lifecycle::deactivate(&*child);
        }
        for child in present {
            lifecycle::activate(&*child);
        }
    }
}

impl<S: SceneState + fmt::Debug> fmt::Debug for SceneObjectBase<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneObjectBase")
            .field("node", &self.node)
            .field("state", &self.state())
            .finish()
    }
}

/// Wrap a freshly built object in an `Arc`, bind its self-reference and
/// adopt the children present in its initial state
pub fn attach<T: SceneObject>(object: T) -> Arc<T> {
    let object = Arc::new(object);
    let erased: SceneObjectRef = Arc::clone(&object) as SceneObjectRef;
    object.node().bind(Arc::downgrade(&erased));
    object.for_each_child(&mut |child| object.node().adopt(child));
    object
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Clone, Debug, Default)]
    struct BoxState {
        label: String,
        children: Vec<SceneObjectRef>,
    }

    impl SceneState for BoxState {
        fn for_each_child(&self, visit: &mut dyn FnMut(&SceneObjectRef)) {
            self.children.iter().for_each(|c| visit(c));
        }
    }

    struct TestBox {
        base: SceneObjectBase<BoxState>,
    }

    impl TestBox {
        fn new(label: &str, children: Vec<SceneObjectRef>) -> Arc<Self> {
            attach(Self {
                base: SceneObjectBase::new(BoxState {
                    label: label.to_string(),
                    children,
                }),
            })
        }
    }

    impl SceneObject for TestBox {
        fn node(&self) -> &SceneNode {
            self.base.node()
        }

        fn kind(&self) -> &'static str {
            "TestBox"
        }

        scene_object_casts!();

        fn for_each_child(&self, visit: &mut dyn FnMut(&SceneObjectRef)) {
            self.base.for_each_child(visit);
        }
    }

    #[test]
    fn attach_sets_parent_of_initial_children() {
        let child = TestBox::new("child", vec![]);
        let parent = TestBox::new("parent", vec![child.clone()]);

        let resolved = child.parent().map(|p| p.node().key().clone());
        assert_eq!(resolved.as_ref(), Some(parent.key()));
        assert!(parent.parent().is_none());
    }

    #[test]
    fn set_state_replaces_snapshot_and_notifies() {
        let node = TestBox::new("a", vec![]);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let _sub = node.base.subscribe_to_state(move |current, previous| {
            seen_clone
                .lock()
                .push((current.label.clone(), previous.label.clone()));
        });

        let before = node.base.state();
        node.base.set_state(|s| s.label = "b".to_string());

        assert_eq!(before.label, "a");
        assert_eq!(node.base.state().label, "b");
        assert_eq!(*seen.lock(), vec![("b".to_string(), "a".to_string())]);
    }

    #[test]
    fn set_state_adopts_new_children() {
        let parent = TestBox::new("parent", vec![]);
        let child = TestBox::new("child", vec![]);
        parent.base.set_state(|s| s.children.push(child.clone()));

        assert_eq!(
            child.parent().map(|p| p.node().key().clone()).as_ref(),
            Some(parent.key())
        );
    }

    #[test]
    fn children_added_while_active_are_activated() {
        let parent = TestBox::new("parent", vec![]);
        parent.activate();
        let child = TestBox::new("child", vec![]);
        parent.base.set_state(|s| s.children.push(child.clone()));
        assert!(child.is_active());

        parent.base.set_state(|s| s.children.clear());
        assert!(!child.is_active());
    }

    #[test]
    fn downcast_through_object_handle() {
        let node: SceneObjectRef = TestBox::new("a", vec![]);
        assert!(node.is::<TestBox>());
        assert_eq!(
            node.downcast_ref::<TestBox>().map(|b| b.base.state().label.clone()),
            Some("a".to_string())
        );
        assert!(downcast_arc::<TestBox>(node).is_some());
    }

    #[test]
    fn events_reach_ancestors_only_when_asked() {
        #[derive(Debug)]
        struct Hello;
        impl SceneEvent for Hello {
            fn event_type(&self) -> &'static str {
                "hello"
            }
        }

        let child = TestBox::new("child", vec![]);
        let parent = TestBox::new("parent", vec![child.clone()]);
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);
        let _sub = parent.subscribe_to_event(move |_: &Hello| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        child.publish_event(&Hello);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        child.publish_to_ancestors(&Hello);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
