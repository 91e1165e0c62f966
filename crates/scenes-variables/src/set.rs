//! Variable sets and dependency-ordered resolution
//!
//! A [`SceneVariableSet`] owns an ordered list of variables and an update
//! queue. Activation queues every variable; [`process_updates`] starts each
//! queued variable once none of the variables it references (in this set or
//! an outer one) is still queued or resolving, and keeps going until the
//! queue drains.
//!
//! When a variable finishes with a changed value, the variables referencing
//! it are queued again and every active scene object below the set's owner
//! that references it is told through
//! [`VariableDependency::variable_update_completed`]. Subtrees whose own set
//! redeclares the name are skipped.
//!
//! [`process_updates`]: SceneVariableSet::process_updates

use crate::error::{VariableError, VariableResult};
use crate::interpolation::is_reserved_name;
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{FuturesUnordered, StreamExt};
use indexmap::IndexSet;
use parking_lot::Mutex;
use petgraph::algo::{is_cyclic_directed, tarjan_scc};
use petgraph::graphmap::DiGraphMap;
use scenes_core::prelude::*;
use scenes_core::{
    graph, SceneVariable, SceneVariableValueChangedEvent, SceneVariables, VariableDependency,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Declaration checks and scheduling behaviour of a variable set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableSetConfig {
    /// Refuse variables named after a built-in macro
    pub reject_reserved_names: bool,
    /// Treat dependency cycles as errors instead of updating in declaration order
    pub strict_dependency_order: bool,
}

impl Default for VariableSetConfig {
    fn default() -> Self {
        Self {
            reject_reserved_names: true,
            strict_dependency_order: false,
        }
    }
}

impl VariableSetConfig {
    /// Set reserved-name checking
    #[must_use]
    pub fn with_reject_reserved_names(mut self, value: bool) -> Self {
        self.reject_reserved_names = value;
        self
    }

    /// Set strict dependency ordering
    #[must_use]
    pub fn with_strict_dependency_order(mut self, value: bool) -> Self {
        self.strict_dependency_order = value;
        self
    }
}

/// Outcome of one [`SceneVariableSet::process_updates`] run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateReport {
    /// Variables that finished, in completion order
    pub completed: Vec<String>,
    /// Variables whose update failed
    pub failed: Vec<(String, SceneError)>,
}

impl UpdateReport {
    /// Check if nothing failed
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// State of a [`SceneVariableSet`]
#[derive(Clone, Default)]
pub struct SceneVariableSetState {
    /// Variables in declaration order
    pub variables: Vec<Arc<dyn SceneVariable>>,
}

impl SceneState for SceneVariableSetState {
    fn for_each_child(&self, visit: &mut dyn FnMut(&SceneObjectRef)) {
        for variable in &self.variables {
            visit(&Arc::clone(variable).into_object());
        }
    }
}

impl fmt::Debug for SceneVariableSetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.variables.iter().map(|v| v.name()).collect();
        f.debug_struct("SceneVariableSetState")
            .field("variables", &names)
            .finish()
    }
}

struct Running {
    run: u64,
    token: CancellationToken,
    before: Option<String>,
}

#[derive(Default)]
struct UpdateQueue {
    to_update: IndexSet<String>,
    updating: HashMap<String, Running>,
    next_run: u64,
    /// Values at the last deactivation; `None` until first deactivated
    recorded: Option<HashMap<String, Option<String>>>,
}

struct Started {
    variable: Arc<dyn SceneVariable>,
    run: u64,
    token: CancellationToken,
}

type Finished = (Arc<dyn SceneVariable>, u64, SceneResult<()>);

/// Ordered collection of variables resolved in dependency order
pub struct SceneVariableSet {
    base: SceneObjectBase<SceneVariableSetState>,
    config: VariableSetConfig,
    queue: Mutex<UpdateQueue>,
    wake: Notify,
}

impl SceneVariableSet {
    /// Set without declaration checks
    #[must_use]
    pub fn new(variables: Vec<Arc<dyn SceneVariable>>) -> Arc<Self> {
        Self::build(variables, VariableSetConfig::default())
    }

    /// Set whose declarations are checked against `config`
    ///
    /// # Errors
    ///
    /// [`VariableError::ReservedName`] or [`VariableError::DuplicateName`]
    /// for bad names, and [`VariableError::DependencyCycle`] for cyclic
    /// references under strict ordering.
    pub fn try_new(
        variables: Vec<Arc<dyn SceneVariable>>,
        config: VariableSetConfig,
    ) -> VariableResult<Arc<Self>> {
        validate_declarations(&variables, &config)?;
        Ok(Self::build(variables, config))
    }

    fn build(variables: Vec<Arc<dyn SceneVariable>>, config: VariableSetConfig) -> Arc<Self> {
        attach(Self {
            base: SceneObjectBase::new(SceneVariableSetState { variables }),
            config,
            queue: Mutex::new(UpdateQueue::default()),
            wake: Notify::new(),
        })
    }

    /// Current state snapshot
    #[inline]
    #[must_use]
    pub fn state(&self) -> Arc<SceneVariableSetState> {
        self.base.state()
    }

    /// Object base
    #[inline]
    #[must_use]
    pub fn base(&self) -> &SceneObjectBase<SceneVariableSetState> {
        &self.base
    }

    /// Configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &VariableSetConfig {
        &self.config
    }

    /// Names waiting for or undergoing an update, in queue order
    #[must_use]
    pub fn queued(&self) -> Vec<String> {
        self.queue.lock().to_update.iter().cloned().collect()
    }

    /// Run queued updates until the queue drains
    ///
    /// Variables blocked only by an outer set stay queued; run again once
    /// the outer set has progressed. Cancelled updates are dropped silently.
    ///
    /// # Errors
    ///
    /// [`VariableError::DependencyCycle`] when queued variables wait on each
    /// other and the set uses strict ordering.
    pub async fn process_updates(&self) -> VariableResult<UpdateReport> {
        let mut report = UpdateReport::default();
        if !self.node().is_active() {
            return Ok(report);
        }

        let mut running: FuturesUnordered<BoxFuture<'static, Finished>> = FuturesUnordered::new();
        loop {
            self.start_ready(&mut running, &mut report)?;
            let Some((variable, run, result)) = running.next().await else {
                break;
            };
            match result {
                Ok(()) => {
                    if self.complete(&variable, run, &report.completed) {
                        report.completed.push(variable.name());
                    }
                }
                Err(SceneError::Cancelled) => self.drop_cancelled(&variable, run),
                Err(err) => {
                    if self.fail(&variable, run, &err) {
                        report.failed.push((variable.name(), err));
                    }
                }
            }
        }
        Ok(report)
    }

    /// Process updates whenever something is queued, until `shutdown` fires
    ///
    /// # Errors
    ///
    /// Propagates errors from [`process_updates`](Self::process_updates).
    pub async fn drive(self: Arc<Self>, shutdown: CancellationToken) -> VariableResult<()> {
        loop {
            self.process_updates().await?;
            tokio::select! {
                biased;
                () = shutdown.cancelled() => return Ok(()),
                () = self.wake.notified() => {}
            }
        }
    }

    fn start_ready(
        &self,
        running: &mut FuturesUnordered<BoxFuture<'static, Finished>>,
        report: &mut UpdateReport,
    ) -> VariableResult<()> {
        loop {
            let batch = self.next_batch()?;
            let mut completed_inline = false;
            for Started {
                variable,
                run,
                token,
            } in batch
            {
                debug!(variable = %variable.name(), "starting variable update");
                match Arc::clone(&variable).validate_and_update() {
                    None => {
                        if self.complete(&variable, run, &report.completed) {
                            report.completed.push(variable.name());
                        }
                        completed_inline = true;
                    }
                    Some(update) => running.push(
                        async move {
                            let result = tokio::select! {
                                biased;
                                () = token.cancelled() => Err(SceneError::Cancelled),
                                result = update => result,
                            };
                            (variable, run, result)
                        }
                        .boxed(),
                    ),
                }
            }
            if !completed_inline {
                return Ok(());
            }
        }
    }

    /// Pick queued variables whose references have settled and mark them updating
    fn next_batch(&self) -> VariableResult<Vec<Started>> {
        let variables = self.base.state().variables.clone();
        let local: HashSet<String> = variables.iter().map(|v| v.name()).collect();
        let (queued, updating): (IndexSet<String>, HashSet<String>) = {
            let mut queue = self.queue.lock();
            queue.to_update.retain(|name| local.contains(name));
            (
                queue.to_update.clone(),
                queue.updating.keys().cloned().collect(),
            )
        };

        let mut ready = Vec::new();
        let mut blocked_locally = Vec::new();
        let mut blocked_outside = false;
        for name in &queued {
            if updating.contains(name) {
                continue;
            }
            let Some(variable) = variables.iter().find(|v| &v.name() == name) else {
                continue;
            };
            let references = variable
                .variable_dependency()
                .map(|d| d.names())
                .unwrap_or_default();
            let waits_locally = references.iter().any(|r| {
                r != name && local.contains(r) && (queued.contains(r) || updating.contains(r))
            });
            if waits_locally {
                blocked_locally.push(Arc::clone(variable));
                continue;
            }
            let waits_outside = references
                .iter()
                .filter(|r| !local.contains(*r))
                .any(|r| outer_variable_pending(r, &**variable));
            if waits_outside {
                blocked_outside = true;
                continue;
            }
            ready.push(Arc::clone(variable));
        }

        if ready.is_empty() && updating.is_empty() && !blocked_outside {
            if let Some(first) = blocked_locally.first() {
                let names: Vec<String> = blocked_locally.iter().map(|v| v.name()).collect();
                if self.config.strict_dependency_order {
                    return Err(VariableError::DependencyCycle { names });
                }
                warn!(variables = ?names, "variables wait on each other; updating in declaration order");
                ready.push(Arc::clone(first));
            }
        }

        let mut queue = self.queue.lock();
        Ok(ready
            .into_iter()
            .map(|variable| {
                queue.next_run += 1;
                let run = queue.next_run;
                let token = CancellationToken::new();
                queue.updating.insert(
                    variable.name(),
                    Running {
                        run,
                        token: token.clone(),
                        before: plain_value(&*variable),
                    },
                );
                Started {
                    variable,
                    run,
                    token,
                }
            })
            .collect())
    }

    /// Finish run `run` of `variable`; `false` when that run was superseded
    ///
    /// Dependents already in `settled` are part of a cycle and stay settled.
    fn complete(&self, variable: &Arc<dyn SceneVariable>, run: u64, settled: &[String]) -> bool {
        let name = variable.name();
        let Some(finished) = self.take_run(&name, run) else {
            return false;
        };
        let has_changed = finished.before != plain_value(&**variable);
        if has_changed {
            let dependents: Vec<String> = self
                .dependents_of(&name)
                .into_iter()
                .filter(|d| !settled.contains(d))
                .collect();
            let mut queue = self.queue.lock();
            enqueue(&mut queue, dependents);
        }
        debug!(variable = %name, has_changed, "variable update completed");
        self.notify_dependent_scene_objects(&**variable, has_changed);
        true
    }

    fn drop_cancelled(&self, variable: &Arc<dyn SceneVariable>, run: u64) {
        let name = variable.name();
        if self.take_run(&name, run).is_some() {
            debug!(variable = %name, "variable update cancelled");
        }
    }

    fn fail(&self, variable: &Arc<dyn SceneVariable>, run: u64, err: &SceneError) -> bool {
        let name = variable.name();
        if self.take_run(&name, run).is_none() {
            return false;
        }
        error!(variable = %name, error = %err, "variable update failed");
        true
    }

    fn take_run(&self, name: &str, run: u64) -> Option<Running> {
        let mut queue = self.queue.lock();
        if queue.updating.get(name).map(|r| r.run) != Some(run) {
            return None;
        }
        queue.to_update.shift_remove(name);
        queue.updating.remove(name)
    }

    /// Local variables referencing `name`
    fn dependents_of(&self, name: &str) -> Vec<String> {
        self.base
            .state()
            .variables
            .iter()
            .filter(|v| {
                v.name() != name
                    && v
                        .variable_dependency()
                        .is_some_and(|d| d.has_dependency_on(name))
            })
            .map(|v| v.name())
            .collect()
    }

    fn handle_value_changed(&self, event: &SceneVariableValueChangedEvent) {
        let Some(variable) = self.get_by_name(&event.name) else {
            return;
        };
        if variable.node().key() != &event.key {
            return;
        }
        let dependents = self.dependents_of(&event.name);
        let updating = {
            let mut queue = self.queue.lock();
            let updating = queue.updating.contains_key(&event.name);
            if !updating {
                enqueue(&mut queue, dependents);
            }
            updating
        };
        // Runs in progress report through `complete` instead.
        if updating {
            return;
        }
        debug!(variable = %event.name, "variable value changed");
        self.wake.notify_one();
        self.notify_dependent_scene_objects(&*variable, true);
    }

    fn notify_dependent_scene_objects(&self, variable: &dyn SceneVariable, has_changed: bool) {
        let Some(owner) = self.node().parent() else {
            return;
        };
        let name = variable.name();
        self.traverse_and_notify(&*owner, variable, &name, has_changed);
    }

    fn traverse_and_notify(
        &self,
        object: &dyn SceneObject,
        variable: &dyn SceneVariable,
        name: &str,
        has_changed: bool,
    ) {
        if object.node().key() == self.node().key() || !object.node().is_active() {
            return;
        }
        if let Some(set) = object.slots().variables {
            let shadowed = set.node().key() != self.node().key()
                && set
                    .get_by_name(name)
                    .is_some_and(|local| local.node().is_active());
            if shadowed {
                return;
            }
        }
        if let Some(dependency) = object.variable_dependency() {
            dependency.variable_update_completed(variable, has_changed);
        }
        let mut children = Vec::new();
        object.for_each_child(&mut |child| children.push(Arc::clone(child)));
        for child in children {
            self.traverse_and_notify(&*child, variable, name, has_changed);
        }
    }

    fn queue_on_activation(&self) {
        let variables = self.base.state().variables.clone();
        let mut queue = self.queue.lock();
        let Some(recorded) = queue.recorded.take() else {
            queue.to_update.extend(variables.iter().map(|v| v.name()));
            return;
        };
        for variable in &variables {
            let name = variable.name();
            let changed = recorded
                .get(&name)
                .map_or(true, |before| *before != plain_value(&**variable));
            if changed {
                debug!(variable = %name, "variable changed while inactive");
                queue.to_update.insert(name.clone());
                let dependents = self.dependents_of(&name);
                enqueue(&mut queue, dependents);
            } else if variable.is_loading() {
                queue.to_update.insert(name);
            }
        }
    }

    fn on_deactivate(&self) {
        let recorded = self
            .base
            .state()
            .variables
            .iter()
            .map(|v| (v.name(), plain_value(&**v)))
            .collect();
        let mut queue = self.queue.lock();
        for (_, running) in queue.updating.drain() {
            running.token.cancel();
        }
        queue.to_update.clear();
        queue.recorded = Some(recorded);
    }
}

/// Queue `names`, restarting any that are mid-update
fn enqueue(queue: &mut UpdateQueue, names: Vec<String>) {
    for name in names {
        if let Some(running) = queue.updating.remove(&name) {
            running.token.cancel();
        }
        queue.to_update.insert(name);
    }
}

fn plain_value(variable: &dyn SceneVariable) -> Option<String> {
    variable.get_value(None).map(|v| v.to_plain_string())
}

/// Check if a variable named `name` above `from` is resolving or queued
fn outer_variable_pending(name: &str, from: &dyn SceneVariable) -> bool {
    graph::lookup_variable(name, from).is_some_and(|outer| {
        outer
            .node()
            .parent()
            .and_then(|owner| {
                owner
                    .as_variable_set()
                    .map(|set| set.is_variable_loading_or_waiting_to_update(&*outer))
            })
            .unwrap_or_else(|| outer.is_loading())
    })
}

fn validate_declarations(
    variables: &[Arc<dyn SceneVariable>],
    config: &VariableSetConfig,
) -> VariableResult<()> {
    let mut seen = HashSet::new();
    for variable in variables {
        let name = variable.name();
        if config.reject_reserved_names && is_reserved_name(&name) {
            return Err(VariableError::ReservedName(name));
        }
        if !seen.insert(name.clone()) {
            return Err(VariableError::DuplicateName(name));
        }
    }
    if let Some(names) = find_dependency_cycle(variables) {
        if config.strict_dependency_order {
            return Err(VariableError::DependencyCycle { names });
        }
        warn!(variables = ?names, "dependency cycle between variables");
    }
    Ok(())
}

/// Names along one dependency cycle, first name repeated at the end
fn find_dependency_cycle(variables: &[Arc<dyn SceneVariable>]) -> Option<Vec<String>> {
    let index: HashMap<String, usize> = variables
        .iter()
        .enumerate()
        .map(|(i, v)| (v.name(), i))
        .collect();
    let mut graph = DiGraphMap::<usize, ()>::new();
    for (i, variable) in variables.iter().enumerate() {
        graph.add_node(i);
        let Some(dependency) = variable.variable_dependency() else {
            continue;
        };
        for name in dependency.names() {
            match index.get(&name) {
                Some(&j) if j != i => {
                    graph.add_edge(j, i, ());
                }
                _ => {}
            }
        }
    }
    if !is_cyclic_directed(&graph) {
        return None;
    }
    let mut component = tarjan_scc(&graph).into_iter().find(|c| c.len() > 1)?;
    component.sort_unstable();
    let mut names: Vec<String> = component.iter().map(|&i| variables[i].name()).collect();
    names.push(names[0].clone());
    Some(names)
}

impl SceneObject for SceneVariableSet {
    fn node(&self) -> &SceneNode {
        self.base.node()
    }

    fn kind(&self) -> &'static str {
        "SceneVariableSet"
    }

    scene_object_casts!();

    fn for_each_child(&self, visit: &mut dyn FnMut(&SceneObjectRef)) {
        self.base.for_each_child(visit);
    }

    fn on_activate(&self) -> Option<Subscription> {
        let this = self.node().this_as::<Self>()?;
        let weak = Arc::downgrade(&this);
        let events =
            self.subscribe_to_event(move |event: &SceneVariableValueChangedEvent| {
                if let Some(set) = weak.upgrade() {
                    set.handle_value_changed(event);
                }
            });
        self.queue_on_activation();
        self.wake.notify_one();
        let weak = Arc::downgrade(&this);
        let teardown = Subscription::from_fn(move || {
            if let Some(set) = weak.upgrade() {
                set.on_deactivate();
            }
        });
        Some(Subscription::group(vec![events, teardown]))
    }

    fn as_variable_set(&self) -> Option<&dyn SceneVariables> {
        Some(self)
    }

    fn variable_dependency(&self) -> Option<&dyn VariableDependency> {
        Some(self)
    }
}

impl SceneVariables for SceneVariableSet {
    fn get_by_name(&self, name: &str) -> Option<Arc<dyn SceneVariable>> {
        self.base
            .state()
            .variables
            .iter()
            .find(|v| v.name() == name)
            .cloned()
    }

    fn variables(&self) -> Vec<Arc<dyn SceneVariable>> {
        self.base.state().variables.clone()
    }

    fn is_variable_loading_or_waiting_to_update(&self, variable: &dyn SceneVariable) -> bool {
        if variable.is_loading() {
            return true;
        }
        let name = variable.name();
        let queue = self.queue.lock();
        queue.to_update.contains(&name) || queue.updating.contains_key(&name)
    }
}

/// Variables of this set referencing variables of outer sets
impl VariableDependency for SceneVariableSet {
    fn names(&self) -> Vec<String> {
        let state = self.base.state();
        let mut names: Vec<String> = Vec::new();
        for variable in &state.variables {
            let Some(dependency) = variable.variable_dependency() else {
                continue;
            };
            for name in dependency.names() {
                let local = state.variables.iter().any(|v| v.name() == name);
                if !local && !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }

    fn variable_update_completed(&self, variable: &dyn SceneVariable, has_changed: bool) {
        let dependents = self.dependents_of(&variable.name());
        if dependents.is_empty() {
            return;
        }
        if has_changed {
            let mut queue = self.queue.lock();
            enqueue(&mut queue, dependents);
        }
        self.wake.notify_one();
    }
}

impl fmt::Debug for SceneVariableSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneVariableSet")
            .field("key", self.node().key())
            .field("variables", &self.state())
            .field("queued", &self.queued())
            .finish()
    }
}
