//! Activation and deactivation of scene subtrees
//!
//! Activation order: mark active, slot providers, the node's own setup,
//! then the remaining children. Deactivation releases the node's
//! activation-scoped handles and listeners first, then walks children.

use crate::object::{SceneObject, SceneObjectRef};
use tracing::debug;

/// Mount `object` and everything it currently owns
///
/// Calling this on an already active node is a no-op.
pub fn activate<T: SceneObject + ?Sized>(object: &T) {
    let node = object.node();
    if !node.mark_active() {
        return;
    }
    debug!(kind = object.kind(), key = %node.key(), "activating scene object");

    let mut providers: Vec<SceneObjectRef> = Vec::new();
    object.slots().for_each(&mut |p| providers.push(p.clone()));
    for provider in &providers {
        activate(&**provider);
    }

    if let Some(handle) = object.on_activate() {
        node.add_activation_handle(handle);
    }

    let mut children: Vec<SceneObjectRef> = Vec::new();
    object.for_each_child(&mut |c| children.push(c.clone()));
    for child in &children {
        activate(&**child);
    }
}

/// Unmount `object` and its subtree
///
/// Calling this on an inactive node is a no-op.
pub fn deactivate<T: SceneObject + ?Sized>(object: &T) {
    let node = object.node();
    if !node.mark_inactive() {
        return;
    }
    debug!(kind = object.kind(), key = %node.key(), "deactivating scene object");

    node.release_activation();

    let mut children: Vec<SceneObjectRef> = Vec::new();
    object.for_each_child(&mut |c| children.push(c.clone()));
    for child in &children {
        deactivate(&**child);
    }
}
