use std::rc::Rc;

use time::Date;
use tracing::{debug, info};

use crate::consts::{DRAG_FOOTPRINT_PX, PLACEMENT_FOOTPRINT_PX};
use crate::doc::{DocStore, ElementId, PlacedElement, normalize_degrees};
use crate::export::{DownloadSink, ExportArtifact, ExportError, Exporter, RenderTarget, local_today};
use crate::geom::{Point, Rect};
use crate::hit::hit_test;
use crate::input::{Button, ContextMenuState, DragGesture, InputState, MenuAction, NoopListeners, PointerListeners, UiState};
use crate::layer;
use crate::palette::{DropEffect, ElementDescriptor, PaletteError};
use crate::persist::{self, KeyValueStore, PersistError, SceneSnapshot};
use crate::scene::{RenderNode, build_tree};

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

/// Prompt shown by the confirmation gate before clearing the desktop.
pub const CLEAR_PROMPT: &str = "确定要清空桌面吗？此操作不可撤销！";

/// Actions returned from input handlers for the host to process.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    ElementCreated(PlacedElement),
    ElementUpdated { id: ElementId },
    ElementDeleted { id: ElementId },
    SelectionChanged(Option<ElementId>),
    ContextMenuChanged(ContextMenuState),
    DesktopCleared { removed: usize },
    RenderNeeded,
}

/// Synchronous yes/no prompt gating destructive operations.
pub trait Confirm {
    /// Ask the user; `true` means proceed.
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F: Fn(&str) -> bool> Confirm for F {
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// Core engine state: all interaction logic that does not depend on a
/// rasterizer or a download target.
///
/// Separated from `Engine` so it can be tested without export collaborators.
pub struct EngineCore {
    pub doc: DocStore,
    pub ui: UiState,
    pub input: InputState,
    pub menu: ContextMenuState,
    /// Bounding rectangle of the canvas surface; `None` until the host
    /// reports it.
    pub canvas_rect: Option<Rect>,
    pub background: String,
    /// Dorm identifier for the export filename and watermark.
    pub identifier: String,
    listeners: Rc<dyn PointerListeners>,
}

impl Default for EngineCore {
    fn default() -> Self {
        Self::with_listeners(Rc::new(NoopListeners))
    }
}

impl EngineCore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine whose drag gestures subscribe through `listeners`.
    #[must_use]
    pub fn with_listeners(listeners: Rc<dyn PointerListeners>) -> Self {
        Self {
            doc: DocStore::new(),
            ui: UiState::default(),
            input: InputState::default(),
            menu: ContextMenuState::default(),
            canvas_rect: None,
            background: String::new(),
            identifier: String::new(),
            listeners,
        }
    }

    // --- Surface ---

    /// Update the canvas bounding rectangle (viewport coordinates).
    pub fn set_canvas_rect(&mut self, rect: Rect) {
        self.canvas_rect = Some(rect);
    }

    pub fn set_background(&mut self, background: impl Into<String>) {
        self.background = background.into();
    }

    pub fn set_identifier(&mut self, identifier: impl Into<String>) {
        self.identifier = identifier.into();
    }

    // --- Palette ---

    /// Add a palette item at the center of the canvas. Does nothing while
    /// the canvas rectangle is unknown.
    pub fn palette_click(&mut self, descriptor: &ElementDescriptor) -> Vec<Action> {
        let Some(rect) = self.canvas_rect else {
            debug!(name = %descriptor.name, "palette click ignored; canvas not ready");
            return Vec::new();
        };
        let half = PLACEMENT_FOOTPRINT_PX / 2.0;
        let center = rect.local_center();
        let at = Point::new(center.x - half, center.y - half);
        let element = self.doc.add(descriptor, at, &rect);
        info!(id = %element.id, name = %element.name, "element added from palette");
        vec![Action::ElementCreated(element), Action::RenderNeeded]
    }

    /// Drop effect to advertise while a palette item hovers the canvas.
    #[must_use]
    pub fn drag_over(&self) -> DropEffect {
        DropEffect::Copy
    }

    /// Decode a palette payload dropped at `viewport_pt` and place it
    /// centered under the pointer.
    ///
    /// # Errors
    ///
    /// Returns [`PaletteError`] if the payload does not decode or validate;
    /// the store is untouched in that case.
    pub fn drop_payload(&mut self, payload: &str, viewport_pt: Point) -> Result<Vec<Action>, PaletteError> {
        let descriptor = ElementDescriptor::from_payload(payload)?;
        let Some(rect) = self.canvas_rect else {
            debug!(name = %descriptor.name, "drop ignored; canvas not ready");
            return Ok(Vec::new());
        };
        let local = rect.to_local(viewport_pt);
        let half = PLACEMENT_FOOTPRINT_PX / 2.0;
        let element = self.doc.add(&descriptor, Point::new(local.x - half, local.y - half), &rect);
        info!(id = %element.id, name = %element.name, x = element.x, y = element.y, "element dropped");
        Ok(vec![Action::ElementCreated(element), Action::RenderNeeded])
    }

    // --- Pointer input ---

    /// Primary press on an element starts a drag; secondary press opens the
    /// context menu for it. Presses on empty canvas do nothing.
    pub fn on_pointer_down(&mut self, viewport_pt: Point, button: Button) -> Vec<Action> {
        let Some(rect) = self.canvas_rect else {
            return Vec::new();
        };
        let local = rect.to_local(viewport_pt);
        let Some(id) = hit_test(local, &self.doc) else {
            return Vec::new();
        };
        match button {
            Button::Primary => self.begin_drag(id, local),
            Button::Secondary => self.open_context_menu(id, viewport_pt),
            Button::Middle => Vec::new(),
        }
    }

    fn begin_drag(&mut self, id: ElementId, local: Point) -> Vec<Action> {
        let Some(element) = self.doc.get(&id) else {
            return Vec::new();
        };
        let offset = local - element.position();
        // Release any gesture still held before acquiring a new one.
        self.input = InputState::Idle;
        self.input = InputState::DraggingElement { id, offset, gesture: DragGesture::begin(Rc::clone(&self.listeners)) };
        debug!(%id, "drag started");
        Vec::new()
    }

    /// Move the dragged element with the pointer, or update hover when idle.
    pub fn on_pointer_move(&mut self, viewport_pt: Point) -> Vec<Action> {
        let Some(rect) = self.canvas_rect else {
            return Vec::new();
        };
        let local = rect.to_local(viewport_pt);
        match &self.input {
            InputState::Idle => {
                let hovered = hit_test(local, &self.doc);
                if hovered == self.ui.hovered_id {
                    return Vec::new();
                }
                self.ui.hovered_id = hovered;
                vec![Action::RenderNeeded]
            }
            InputState::DraggingElement { id, offset, .. } => {
                let id = *id;
                let pos = rect.clamp(local - *offset, DRAG_FOOTPRINT_PX);
                let Some(element) = self.doc.get_mut(&id) else {
                    // Target vanished mid-drag.
                    self.input = InputState::Idle;
                    return Vec::new();
                };
                element.x = pos.x;
                element.y = pos.y;
                vec![Action::ElementUpdated { id }, Action::RenderNeeded]
            }
        }
    }

    /// Pointer released anywhere: end the drag.
    pub fn on_pointer_up(&mut self, _viewport_pt: Point) -> Vec<Action> {
        self.end_drag()
    }

    /// Pointer left the window: end the drag so it cannot get stuck.
    pub fn on_pointer_leave_window(&mut self) -> Vec<Action> {
        self.end_drag()
    }

    /// Return to `Idle`, releasing the drag gesture's listeners.
    pub fn end_drag(&mut self) -> Vec<Action> {
        if let Some(id) = self.input.dragging_id() {
            debug!(%id, "drag ended");
        }
        self.input = InputState::Idle;
        Vec::new()
    }

    /// A click anywhere in the document closes the context menu.
    pub fn on_document_click(&mut self) -> Vec<Action> {
        self.hide_menu()
    }

    // --- Context menu ---

    /// Show the context menu for `target` at viewport coordinates.
    pub fn open_context_menu(&mut self, target: ElementId, viewport_pt: Point) -> Vec<Action> {
        if !self.doc.contains(&target) {
            return Vec::new();
        }
        self.menu = ContextMenuState::Visible { target, x: viewport_pt.x, y: viewport_pt.y };
        vec![Action::ContextMenuChanged(self.menu), Action::RenderNeeded]
    }

    fn hide_menu(&mut self) -> Vec<Action> {
        if !self.menu.is_visible() {
            return Vec::new();
        }
        self.menu = ContextMenuState::Hidden;
        vec![Action::ContextMenuChanged(self.menu)]
    }

    /// Apply a context-menu action to the menu's target and hide the menu.
    /// Does nothing when the menu is hidden or its target no longer exists.
    pub fn menu_action(&mut self, action: MenuAction) -> Vec<Action> {
        let Some(target) = self.menu.target() else {
            return Vec::new();
        };
        let mut actions = self.hide_menu();
        if !self.doc.contains(&target) {
            return actions;
        }
        match action {
            MenuAction::Edit => {
                self.ui.selected_id = Some(target);
                actions.push(Action::SelectionChanged(Some(target)));
            }
            MenuAction::Delete => {
                self.doc.remove(&target);
                if self.input.dragging_id() == Some(target) {
                    self.input = InputState::Idle;
                }
                if self.ui.hovered_id == Some(target) {
                    self.ui.hovered_id = None;
                }
                if self.ui.selected_id == Some(target) {
                    self.ui.selected_id = None;
                    actions.push(Action::SelectionChanged(None));
                }
                info!(id = %target, "element deleted");
                actions.push(Action::ElementDeleted { id: target });
            }
            MenuAction::Duplicate => {
                let bounds = self.placement_bounds();
                if let Some(copy) = self.doc.duplicate(&target, &bounds) {
                    info!(source = %target, id = %copy.id, "element duplicated");
                    actions.push(Action::ElementCreated(copy));
                }
            }
            MenuAction::Rotate(angle) => {
                if let Some(element) = self.doc.get_mut(&target) {
                    element.rotation = normalize_degrees(element.rotation + angle);
                    actions.push(Action::ElementUpdated { id: target });
                }
            }
            MenuAction::BringToFront => {
                if layer::bring_to_front(&mut self.doc, &target).is_some() {
                    actions.push(Action::ElementUpdated { id: target });
                }
            }
            MenuAction::SendToBack => {
                if layer::send_to_back(&mut self.doc, &target).is_some() {
                    actions.push(Action::ElementUpdated { id: target });
                }
            }
        }
        actions.push(Action::RenderNeeded);
        actions
    }

    /// Bounds used for placement clamping; an unknown canvas imposes none
    /// beyond non-negative coordinates.
    fn placement_bounds(&self) -> Rect {
        self.canvas_rect.unwrap_or(Rect::new(0.0, 0.0, f64::MAX, f64::MAX))
    }

    // --- Selection / desktop ---

    /// Clear the selection and hide the context menu.
    pub fn deselect(&mut self) -> Vec<Action> {
        let mut actions = self.hide_menu();
        if self.ui.selected_id.take().is_some() {
            actions.push(Action::SelectionChanged(None));
        }
        actions
    }

    /// Empty the desktop if `confirm` agrees. Returns no actions when the
    /// user declines.
    pub fn clear_desktop(&mut self, confirm: &dyn Confirm) -> Vec<Action> {
        if !confirm.confirm(CLEAR_PROMPT) {
            debug!("clear desktop declined");
            return Vec::new();
        }
        self.input = InputState::Idle;
        self.menu = ContextMenuState::Hidden;
        self.ui = UiState::default();
        let removed = self.doc.clear();
        info!(removed, "desktop cleared");
        vec![Action::DesktopCleared { removed }, Action::RenderNeeded]
    }

    // --- Persistence ---

    /// Capture the current scene with a fresh timestamp.
    #[must_use]
    pub fn snapshot(&self) -> SceneSnapshot {
        SceneSnapshot {
            background: self.background.clone(),
            elements: self.doc.elements().to_vec(),
            identifier: self.identifier.clone(),
            timestamp: persist::now_timestamp(),
        }
    }

    /// Save the scene to `store` and return what was written.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError`] if serialization or the write fails.
    pub fn save_desktop(&self, store: &mut dyn KeyValueStore) -> Result<SceneSnapshot, PersistError> {
        let snapshot = self.snapshot();
        persist::save(store, &snapshot)?;
        Ok(snapshot)
    }

    /// Replace the scene with a restored snapshot. Ephemeral state starts
    /// fresh.
    pub fn restore(&mut self, snapshot: SceneSnapshot) {
        self.input = InputState::Idle;
        self.menu = ContextMenuState::Hidden;
        self.ui = UiState::default();
        self.background = snapshot.background;
        self.identifier = snapshot.identifier;
        self.doc.load_snapshot(snapshot.elements);
    }

    /// Restore the saved scene from `store`, if one loads. Returns whether a
    /// scene was restored.
    pub fn load_desktop(&mut self, store: &dyn KeyValueStore) -> bool {
        match persist::load(store) {
            Some(snapshot) => {
                self.restore(snapshot);
                true
            }
            None => false,
        }
    }

    // --- Queries ---

    /// The currently selected element, if any.
    #[must_use]
    pub fn selection(&self) -> Option<ElementId> {
        self.ui.selected_id
    }

    /// Look up an element by ID.
    #[must_use]
    pub fn element(&self, id: &ElementId) -> Option<&PlacedElement> {
        self.doc.get(id)
    }

    #[must_use]
    pub fn context_menu(&self) -> ContextMenuState {
        self.menu
    }

    #[must_use]
    pub fn is_dragging(&self) -> bool {
        !self.input.is_idle()
    }

    /// Render tree of the current scene, or `None` while the canvas
    /// rectangle is unknown.
    #[must_use]
    pub fn render_tree(&self) -> Option<RenderNode> {
        self.canvas_rect.map(|rect| build_tree(&self.doc, &self.background, &rect))
    }
}

/// The full engine. Wraps `EngineCore` and owns the export pipeline.
pub struct Engine<R, D> {
    pub core: EngineCore,
    exporter: Exporter<R, D>,
}

impl<R: RenderTarget, D: DownloadSink> Engine<R, D> {
    #[must_use]
    pub fn new(core: EngineCore, target: R, sink: D) -> Self {
        Self { core, exporter: Exporter::new(target, sink) }
    }

    /// Export the current scene dated today.
    ///
    /// # Errors
    ///
    /// See [`Exporter::export`].
    pub async fn export(&self) -> Result<ExportArtifact, ExportError> {
        self.export_on(local_today()).await
    }

    /// Export the current scene with an explicit date.
    ///
    /// # Errors
    ///
    /// See [`Exporter::export`].
    pub async fn export_on(&self, date: Date) -> Result<ExportArtifact, ExportError> {
        let mut surface = self.core.render_tree();
        self.exporter.export(surface.as_mut(), &self.core.identifier, date).await
    }

    #[must_use]
    pub fn exporter(&self) -> &Exporter<R, D> {
        &self.exporter
    }

    #[must_use]
    pub fn is_exporting(&self) -> bool {
        self.exporter.is_busy()
    }
}
