//! Input model: mouse buttons, global pointer listeners, the drag gesture
//! scope, and the two interaction state machines (drag and context menu).
//!
//! `InputState` is the active gesture tracked between pointer-down and
//! pointer-up. While a drag is in progress it owns a [`DragGesture`], which
//! holds the global listeners the host attached for the duration of the
//! drag. Replacing or dropping the state detaches them, so every exit path
//! (release, leaving the window, a forced reset, engine teardown) releases
//! the same set it acquired.

#[cfg(test)]
#[path = "input_test.rs"]
mod input_test;

use std::fmt;
use std::rc::Rc;

use tracing::debug;

use crate::doc::ElementId;
use crate::geom::Point;

/// Mouse button identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    /// Left mouse button (or single-finger tap).
    Primary,
    /// Middle mouse button (scroll wheel click).
    Middle,
    /// Right mouse button (or two-finger tap / long press).
    Secondary,
}

/// A global (document or window level) pointer listener needed while a
/// drag is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlobalListener {
    /// Document-level pointer move.
    PointerMove,
    /// Document-level pointer release.
    PointerUp,
    /// Window-level pointer leave; ends a drag that wandered off-screen.
    PointerLeaveWindow,
}

impl GlobalListener {
    /// Every listener a drag subscribes to, in attach order.
    pub const DRAG_SET: [GlobalListener; 3] = [Self::PointerMove, Self::PointerUp, Self::PointerLeaveWindow];
}

/// Host-side registry of global pointer listeners.
///
/// The browser host maps these onto `addEventListener` /
/// `removeEventListener`; headless hosts can ignore them.
pub trait PointerListeners {
    /// Subscribe the engine to a global pointer event.
    fn attach(&self, listener: GlobalListener);
    /// Unsubscribe a listener previously attached.
    fn detach(&self, listener: GlobalListener);
}

/// Registry that ignores subscriptions; for hosts that route every pointer
/// event to the engine anyway.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListeners;

impl PointerListeners for NoopListeners {
    fn attach(&self, _listener: GlobalListener) {}
    fn detach(&self, _listener: GlobalListener) {}
}

/// Scope guard bracketing exactly one drag.
///
/// Attaches [`GlobalListener::DRAG_SET`] on creation and detaches it on drop.
pub struct DragGesture {
    listeners: Rc<dyn PointerListeners>,
}

impl DragGesture {
    /// Acquire the global listeners for a new drag.
    #[must_use]
    pub fn begin(listeners: Rc<dyn PointerListeners>) -> Self {
        for l in GlobalListener::DRAG_SET {
            listeners.attach(l);
        }
        Self { listeners }
    }
}

impl Drop for DragGesture {
    fn drop(&mut self) {
        for l in GlobalListener::DRAG_SET.iter().rev() {
            self.listeners.detach(*l);
        }
        debug!("drag gesture released global listeners");
    }
}

impl fmt::Debug for DragGesture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DragGesture").finish_non_exhaustive()
    }
}

/// Drag-to-move state machine.
#[derive(Debug, Default)]
pub enum InputState {
    /// No gesture in progress; waiting for the next pointer-down.
    #[default]
    Idle,
    /// The user is moving an existing element.
    DraggingElement {
        /// Id of the element being dragged.
        id: ElementId,
        /// Pointer position minus element position at press time.
        offset: Point,
        /// Global listeners held for the duration of the drag.
        gesture: DragGesture,
    },
}

impl InputState {
    /// Id of the element being dragged, if any.
    #[must_use]
    pub fn dragging_id(&self) -> Option<ElementId> {
        match self {
            Self::Idle => None,
            Self::DraggingElement { id, .. } => Some(*id),
        }
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

/// Context-menu state machine.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ContextMenuState {
    /// No menu shown.
    #[default]
    Hidden,
    /// Menu shown at viewport coordinates for a target element.
    Visible {
        /// Element the menu acts on.
        target: ElementId,
        /// Viewport x where the menu opened.
        x: f64,
        /// Viewport y where the menu opened.
        y: f64,
    },
}

impl ContextMenuState {
    #[must_use]
    pub fn is_visible(&self) -> bool {
        matches!(self, Self::Visible { .. })
    }

    /// The element the menu acts on, if visible.
    #[must_use]
    pub fn target(&self) -> Option<ElementId> {
        match self {
            Self::Hidden => None,
            Self::Visible { target, .. } => Some(*target),
        }
    }

    /// Menu anchor in viewport coordinates, if visible.
    #[must_use]
    pub fn anchor(&self) -> Option<Point> {
        match self {
            Self::Hidden => None,
            Self::Visible { x, y, .. } => Some(Point::new(*x, *y)),
        }
    }
}

/// Actions exposed by the context menu.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MenuAction {
    /// Select the target for editing.
    Edit,
    /// Remove the target.
    Delete,
    /// Clone the target.
    Duplicate,
    /// Rotate the target by the given degrees.
    Rotate(f64),
    /// Raise the target above everything.
    BringToFront,
    /// Lower the target beneath everything.
    SendToBack,
}

/// Ephemeral selection and hover state visible to the renderer.
#[derive(Debug, Clone, Default)]
pub struct UiState {
    /// The element currently selected for editing, if any.
    pub selected_id: Option<ElementId>,
    /// The element under the pointer while idle, if any.
    pub hovered_id: Option<ElementId>,
}
