//! Layering policy: z-order adjustments over the element store.
//!
//! Both operations may leave the target sharing a `z_index` with another
//! element; paint order then falls back to insertion order.

#[cfg(test)]
#[path = "layer_test.rs"]
mod layer_test;

use crate::doc::{DocStore, ElementId};

/// Raise `target` above every element. Returns the new `z_index`, or `None`
/// if the target is not in the store.
pub fn bring_to_front(doc: &mut DocStore, target: &ElementId) -> Option<i64> {
    let z = front_z_index(doc);
    let element = doc.get_mut(target)?;
    element.z_index = z;
    Some(z)
}

/// Lower `target` beneath every element, never below 1. Returns the new
/// `z_index`, or `None` if the target is not in the store.
pub fn send_to_back(doc: &mut DocStore, target: &ElementId) -> Option<i64> {
    let z = back_z_index(doc);
    let element = doc.get_mut(target)?;
    element.z_index = z;
    Some(z)
}

/// `z_index` that `bring_to_front` would assign, without mutating.
#[must_use]
pub fn front_z_index(doc: &DocStore) -> i64 {
    doc.max_z_index().map_or(1, |max| max.saturating_add(1))
}

/// `z_index` that `send_to_back` would assign, without mutating.
#[must_use]
pub fn back_z_index(doc: &DocStore) -> i64 {
    doc.min_z_index().map_or(1, |min| min.saturating_sub(1).max(1))
}
