//! Graph resolution
//!
//! Pure functions over the parent chain and child lists. Nothing is cached:
//! every call walks the tree as it is now, so results follow re-parenting
//! and state replacement immediately.

use crate::data::{SceneDataNode, SceneDataProvider};
use crate::error::{SceneError, SceneResult};
use crate::object::{SceneKey, SceneObject, SceneObjectRef};
use crate::time_range::{SceneTimeRange, SceneTimeRangeLike, DEFAULT_FROM, DEFAULT_TO};
use crate::variables::{EmptyVariableSet, SceneVariable, SceneVariables};
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::sync::Arc;

static DEFAULT_TIME_RANGE: Lazy<Arc<SceneTimeRange>> =
    Lazy::new(|| SceneTimeRange::new(DEFAULT_FROM, DEFAULT_TO));

static EMPTY_DATA: Lazy<Arc<SceneDataNode>> = Lazy::new(SceneDataNode::empty);

static EMPTY_VARIABLES: Lazy<Arc<EmptyVariableSet>> = Lazy::new(EmptyVariableSet::new);

/// First non-`None` result of `extract` on `object` or its ancestors,
/// nearest first
pub fn get_closest<T>(
    object: &dyn SceneObject,
    mut extract: impl FnMut(&dyn SceneObject) -> Option<T>,
) -> Option<T> {
    if let Some(found) = extract(object) {
        return Some(found);
    }
    let mut current = object.node().parent();
    while let Some(node) = current {
        if let Some(found) = extract(&*node) {
            return Some(found);
        }
        current = node.node().parent();
    }
    None
}

/// Closest time range, or a shared default range
#[must_use]
pub fn get_time_range(object: &dyn SceneObject) -> Arc<dyn SceneTimeRangeLike> {
    get_closest(object, |o| o.slots().time_range).unwrap_or_else(|| {
        let default: Arc<dyn SceneTimeRangeLike> = DEFAULT_TIME_RANGE.clone();
        default
    })
}

/// Closest data provider, or a shared empty provider
#[must_use]
pub fn get_data(object: &dyn SceneObject) -> Arc<dyn SceneDataProvider> {
    get_closest(object, |o| o.slots().data).unwrap_or_else(|| {
        let empty: Arc<dyn SceneDataProvider> = EMPTY_DATA.clone();
        empty
    })
}

/// Closest variable set, or a shared empty set
#[must_use]
pub fn get_variables(object: &dyn SceneObject) -> Arc<dyn SceneVariables> {
    get_closest(object, |o| o.slots().variables).unwrap_or_else(|| {
        let empty: Arc<dyn SceneVariables> = EMPTY_VARIABLES.clone();
        empty
    })
}

/// Closest ancestor with the layout capability
pub fn get_layout(object: &dyn SceneObject) -> SceneResult<SceneObjectRef> {
    get_closest(object, |o| {
        o.as_layout()?;
        o.node().this()
    })
    .ok_or_else(|| SceneError::NoLayout {
        key: object.node().key().clone(),
    })
}

/// Closest ancestor (or `object` itself) of concrete type `T`
#[must_use]
pub fn get_ancestor<T: SceneObject>(object: &dyn SceneObject) -> Option<Arc<T>> {
    get_closest(object, |o| {
        if o.as_any().is::<T>() {
            o.node().this_as::<T>()
        } else {
            None
        }
    })
}

/// Resolve a variable by name, nearest set first
///
/// A set that does not declare `name` does not stop the search.
#[must_use]
pub fn lookup_variable(name: &str, object: &dyn SceneObject) -> Option<Arc<dyn SceneVariable>> {
    get_closest(object, |o| o.slots().variables?.get_by_name(name))
}

/// Every variable visible from `object`; nearer declarations shadow outer ones
#[must_use]
pub fn collect_all_variables(object: &dyn SceneObject) -> Vec<Arc<dyn SceneVariable>> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    let mut collect = |o: &dyn SceneObject| {
        if let Some(set) = o.slots().variables {
            for variable in set.variables() {
                if seen.insert(variable.name()) {
                    out.push(variable);
                }
            }
        }
    };
    collect(object);
    let mut current = object.node().parent();
    while let Some(node) = current {
        collect(&*node);
        current = node.node().parent();
    }
    out
}

/// Depth-first, pre-order walk of `object` and its subtree
pub fn for_each_descendant(object: &dyn SceneObject, visit: &mut dyn FnMut(&dyn SceneObject)) {
    visit(object);
    let mut children = Vec::new();
    object.for_each_child(&mut |c| children.push(Arc::clone(c)));
    for child in children {
        for_each_descendant(&*child, visit);
    }
}

/// Search the graph around `object`
///
/// Tests `object`, then its subtree, then moves to the parent and searches
/// the parent's subtree while skipping the branch already searched, until
/// the root has been covered.
#[must_use]
pub fn find_object(
    object: &dyn SceneObject,
    check: &dyn Fn(&dyn SceneObject) -> bool,
) -> Option<SceneObjectRef> {
    if let Some(found) = find_in_subtree(object, check, None) {
        return Some(found);
    }
    let mut searched = object.node().key().clone();
    let mut current = object.node().parent();
    while let Some(parent) = current {
        if let Some(found) = find_in_subtree(&*parent, check, Some(&searched)) {
            return Some(found);
        }
        searched = parent.node().key().clone();
        current = parent.node().parent();
    }
    None
}

/// Find a node by key anywhere in the graph around `object`
#[must_use]
pub fn find_by_key(object: &dyn SceneObject, key: &SceneKey) -> Option<SceneObjectRef> {
    find_object(object, &|o| o.node().key() == key)
}

fn find_in_subtree(
    object: &dyn SceneObject,
    check: &dyn Fn(&dyn SceneObject) -> bool,
    skip: Option<&SceneKey>,
) -> Option<SceneObjectRef> {
    if check(object) {
        return object.node().this();
    }
    let mut children = Vec::new();
    object.for_each_child(&mut |c| children.push(Arc::clone(c)));
    children
        .iter()
        .filter(|c| Some(c.node().key()) != skip)
        .find_map(|c| find_in_subtree(&**c, check, None))
}

/// Check if any variable referenced by `object` is resolving or queued
#[must_use]
pub fn has_variable_dependency_in_loading_state(object: &dyn SceneObject) -> bool {
    let Some(dependency) = object.variable_dependency() else {
        return false;
    };
    dependency.names().iter().any(|name| {
        lookup_variable(name, object).is_some_and(|variable| {
            variable
                .node()
                .parent()
                .and_then(|set_owner| {
                    set_owner
                        .as_variable_set()
                        .map(|set| set.is_variable_loading_or_waiting_to_update(&*variable))
                })
                .unwrap_or_else(|| variable.is_loading())
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Subscription;
    use crate::layout::SceneLayout;
    use crate::object::{attach, SceneObjectBase, SceneSlots, SceneState};
    use crate::scene_object_casts;
    use crate::object::{SceneNode, SceneObjectExt};
    use crate::time_range::DEFAULT_TIME_ZONE;

    #[derive(Clone, Default)]
    struct PanelState {
        layout: bool,
        slots: SceneSlots,
        children: Vec<SceneObjectRef>,
    }

    impl SceneState for PanelState {
        fn slots(&self) -> SceneSlots {
            self.slots.clone()
        }

        fn for_each_child(&self, visit: &mut dyn FnMut(&SceneObjectRef)) {
            self.children.iter().for_each(|c| visit(c));
        }
    }

    struct Panel {
        base: SceneObjectBase<PanelState>,
    }

    impl SceneLayout for Panel {
        fn layout_kind(&self) -> &'static str {
            "test"
        }
    }

    impl Panel {
        fn new(key: &str, state: PanelState) -> Arc<Self> {
            attach(Self {
                base: SceneObjectBase::with_key(SceneKey::from(key), state),
            })
        }

        fn leaf(key: &str) -> Arc<Self> {
            Self::new(key, PanelState::default())
        }
    }

    impl SceneObject for Panel {
        fn node(&self) -> &SceneNode {
            self.base.node()
        }

        fn kind(&self) -> &'static str {
            "Panel"
        }

        scene_object_casts!();

        fn slots(&self) -> SceneSlots {
            self.base.slots()
        }

        fn for_each_child(&self, visit: &mut dyn FnMut(&SceneObjectRef)) {
            self.base.for_each_child(visit);
        }

        fn on_activate(&self) -> Option<Subscription> {
            None
        }

        fn as_layout(&self) -> Option<&dyn SceneLayout> {
            self.base.state().layout.then_some(self as &dyn SceneLayout)
        }
    }

    #[test]
    fn closest_time_range_prefers_nearest() {
        let inner_range = SceneTimeRange::new("now-1h", "now");
        let outer_range = SceneTimeRange::new("now-7d", "now");
        let leaf = Panel::leaf("leaf");
        let inner = Panel::new(
            "inner",
            PanelState {
                slots: SceneSlots {
                    time_range: Some(inner_range.clone()),
                    ..SceneSlots::default()
                },
                children: vec![leaf.clone()],
                ..PanelState::default()
            },
        );
        let _root = Panel::new(
            "root",
            PanelState {
                slots: SceneSlots {
                    time_range: Some(outer_range.clone()),
                    ..SceneSlots::default()
                },
                children: vec![inner.clone()],
                ..PanelState::default()
            },
        );

        assert_eq!(get_time_range(&*leaf).raw().from, "now-1h");
        assert_eq!(get_time_range(&*inner).raw().from, "now-1h");
    }

    #[test]
    fn default_providers_when_none_declared() {
        let leaf = Panel::leaf("leaf");
        assert_eq!(get_time_range(&*leaf).time_zone(), DEFAULT_TIME_ZONE);
        assert!(get_data(&*leaf).data().series.is_empty());
        assert!(get_variables(&*leaf).variables().is_empty());
    }

    #[test]
    fn nested_time_range_inherits_zone_from_outer_range() {
        let inner_range = SceneTimeRange::new("now-1h", "now");
        let outer_range = SceneTimeRange::with_time_zone("now-7d", "now", "Europe/Berlin");
        let inner = Panel::new(
            "inner",
            PanelState {
                slots: SceneSlots {
                    time_range: Some(inner_range.clone()),
                    ..SceneSlots::default()
                },
                ..PanelState::default()
            },
        );
        let _root = Panel::new(
            "root",
            PanelState {
                slots: SceneSlots {
                    time_range: Some(outer_range),
                    ..SceneSlots::default()
                },
                children: vec![inner],
                ..PanelState::default()
            },
        );

        assert_eq!(inner_range.time_zone(), "Europe/Berlin");
    }

    #[test]
    fn nested_time_range_keeps_its_own_zone() {
        let inner_range = SceneTimeRange::with_time_zone("now-1h", "now", "America/New_York");
        let outer_range = SceneTimeRange::with_time_zone("now-7d", "now", "utc");
        let leaf = Panel::leaf("leaf");
        let inner = Panel::new(
            "inner",
            PanelState {
                slots: SceneSlots {
                    time_range: Some(inner_range.clone()),
                    ..SceneSlots::default()
                },
                children: vec![leaf.clone()],
                ..PanelState::default()
            },
        );
        let root = Panel::new(
            "root",
            PanelState {
                slots: SceneSlots {
                    time_range: Some(outer_range),
                    ..SceneSlots::default()
                },
                children: vec![inner.clone()],
                ..PanelState::default()
            },
        );

        assert_eq!(inner_range.time_zone(), "America/New_York");
        assert_eq!(get_time_range(&*leaf).time_zone(), "America/New_York");
        assert_eq!(get_time_range(&*inner).time_zone(), "America/New_York");
        assert_eq!(get_time_range(&*root).time_zone(), "utc");
    }

    #[test]
    fn layout_lookup() {
        let leaf = Panel::leaf("leaf");
        let layout = Panel::new(
            "layout",
            PanelState {
                layout: true,
                children: vec![leaf.clone()],
                ..PanelState::default()
            },
        );
        let found = get_layout(&*leaf).expect("layout above leaf");
        assert_eq!(found.node().key(), layout.key());

        let orphan = Panel::leaf("orphan");
        let err = get_layout(&*orphan).unwrap_err();
        assert!(matches!(err, SceneError::NoLayout { .. }));
    }

    #[test]
    fn find_object_searches_siblings_and_ancestors() {
        let a = Panel::leaf("a");
        let b = Panel::leaf("b");
        let deep = Panel::leaf("deep");
        let c = Panel::new(
            "c",
            PanelState {
                children: vec![deep.clone()],
                ..PanelState::default()
            },
        );
        let root = Panel::new(
            "root",
            PanelState {
                children: vec![a.clone(), b.clone(), c.clone()],
                ..PanelState::default()
            },
        );

        let found = find_by_key(&*a, &SceneKey::from("deep")).expect("deep found");
        assert_eq!(found.node().key().as_str(), "deep");
        let found = find_by_key(&*deep, &SceneKey::from("root")).expect("root found");
        assert_eq!(found.node().key(), root.key());
        assert!(find_by_key(&*a, &SceneKey::from("missing")).is_none());
    }

    #[test]
    fn ancestor_by_type() {
        let leaf = Panel::leaf("leaf");
        let _root = Panel::new(
            "root",
            PanelState {
                children: vec![leaf.clone()],
                ..PanelState::default()
            },
        );
        let found = get_ancestor::<Panel>(&*leaf).expect("self matches");
        assert_eq!(found.key().as_str(), "leaf");
        assert!(get_ancestor::<SceneTimeRange>(&*leaf).is_none());
    }
}
