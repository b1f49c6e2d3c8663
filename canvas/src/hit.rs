#[cfg(test)]
#[path = "hit_test.rs"]
mod hit_test;

use crate::doc::{DocStore, ElementId};
use crate::geom::Point;

/// Return the topmost element whose scaled footprint contains `local_pt`
/// (canvas-local coordinates).
///
/// Elements are checked in reverse paint order, so the one drawn last wins.
/// Rotation is ignored; the hit box is the unrotated square.
#[must_use]
pub fn hit_test(local_pt: Point, doc: &DocStore) -> Option<ElementId> {
    doc.sorted_elements()
        .into_iter()
        .rev()
        .find(|e| {
            let size = e.extent();
            local_pt.x >= e.x && local_pt.x <= e.x + size && local_pt.y >= e.y && local_pt.y <= e.y + size
        })
        .map(|e| e.id)
}
