//! Render tree: a host-neutral description of the visual surface.
//!
//! The tree carries only what export needs: geometry, paint order, image
//! references, text and the three color channels the rasterizer reads. The
//! browser host mirrors it from the DOM; headless hosts build it from the
//! store with [`build_tree`].

#[cfg(test)]
#[path = "scene_test.rs"]
mod scene_test;

use crate::doc::{DocStore, ElementId, PlacedElement};
use crate::geom::Rect;

/// Role of a node in the render tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Root of the canvas surface.
    Surface,
    /// A placed element.
    Element(ElementId),
    /// Transient export watermark.
    Watermark,
    /// Any other decoration the host renders (labels, frames).
    Decoration,
}

/// Resolved color channels of a node. `None` means "not painted".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Style {
    pub background: Option<String>,
    pub color: Option<String>,
    pub border_color: Option<String>,
}

/// One node of the render tree.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderNode {
    pub kind: NodeKind,
    /// Box in surface-local pixels.
    pub rect: Rect,
    /// Clockwise rotation in degrees around the box center.
    pub rotation: f64,
    /// Paint order among siblings.
    pub z_index: i64,
    /// Whether the node receives pointer events.
    pub interactive: bool,
    /// Image reference painted into the box.
    pub image: Option<String>,
    /// Text content.
    pub text: Option<String>,
    pub style: Style,
    pub children: Vec<RenderNode>,
}

impl RenderNode {
    /// A bare node of the given kind and box.
    #[must_use]
    pub fn new(kind: NodeKind, rect: Rect) -> Self {
        Self {
            kind,
            rect,
            rotation: 0.0,
            z_index: 0,
            interactive: true,
            image: None,
            text: None,
            style: Style::default(),
            children: Vec::new(),
        }
    }

    /// Visit this node and every descendant, depth first.
    pub fn walk_mut(&mut self, f: &mut impl FnMut(&mut RenderNode)) {
        f(self);
        for child in &mut self.children {
            child.walk_mut(f);
        }
    }

    /// Visit this node and every descendant, depth first.
    pub fn walk(&self, f: &mut impl FnMut(&RenderNode)) {
        f(self);
        for child in &self.children {
            child.walk(f);
        }
    }

    /// Children sorted for painting: ascending `z_index`, ties in tree order.
    #[must_use]
    pub fn paint_order(&self) -> Vec<&RenderNode> {
        let mut nodes: Vec<&RenderNode> = self.children.iter().collect();
        nodes.sort_by_key(|n| n.z_index);
        nodes
    }

    /// Count of nodes of a kind in this subtree.
    #[must_use]
    pub fn count_kind(&self, kind: NodeKind) -> usize {
        let mut n = 0;
        self.walk(&mut |node| {
            if node.kind == kind {
                n += 1;
            }
        });
        n
    }
}

/// Fill used for an element box, keyed by material.
fn material_fill(material: &str) -> &'static str {
    match material {
        "wood" => "#8b5a2b",
        "plastic" => "#d0d4dc",
        "metal" => "#9aa0a6",
        "glass" => "rgba(200, 230, 255, 0.6)",
        _ => "#b0b0b0",
    }
}

fn element_node(e: &PlacedElement) -> RenderNode {
    let size = e.extent();
    let mut node = RenderNode::new(NodeKind::Element(e.id), Rect::new(e.x, e.y, size, size));
    node.rotation = e.rotation;
    node.z_index = e.z_index;
    node.image = Some(e.icon_ref.clone());
    node.text = Some(e.name.clone());
    node.style = Style {
        background: Some(material_fill(&e.material).to_owned()),
        color: Some("#222222".to_owned()),
        border_color: Some("#555555".to_owned()),
    };
    node
}

/// Build the render tree for the current store: one surface node sized to
/// `bounds`, carrying the background image, with one child per element in
/// paint order.
#[must_use]
pub fn build_tree(doc: &DocStore, background: &str, bounds: &Rect) -> RenderNode {
    let mut root = RenderNode::new(NodeKind::Surface, Rect::new(0.0, 0.0, bounds.width, bounds.height));
    if !background.is_empty() {
        root.image = Some(background.to_owned());
    }
    root.children = doc.sorted_elements().into_iter().map(element_node).collect();
    root
}
