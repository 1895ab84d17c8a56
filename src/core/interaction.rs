use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dpid::Dpid;
use crate::inspector::InspectRequest;
use crate::layout::ForceLayout;
use crate::topology::{Node, Topology, Vec2};

/// Node glyph size; also the hit box for pointer input.
pub const NODE_ICON_WIDTH: f32 = 50.0;
pub const NODE_ICON_HEIGHT: f32 = 40.0;

/// User input already resolved to a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Gesture {
    DragStart { dpid: Dpid },
    DragMove { dpid: Dpid, x: f32, y: f32 },
    DragEnd { dpid: Dpid },
    DoubleClick { dpid: Dpid },
}

/// Apply a gesture to the store.
///
/// Dragging pins the node (`fixed = true`) and moves it straight to the
/// pointer; double-click is the only way to unpin. Drag start also reheats
/// the layout and asks for the node's flow table.
pub fn apply_gesture(
    gesture: &Gesture,
    topo: &mut Topology,
    layout: &mut ForceLayout,
) -> Option<InspectRequest> {
    match gesture {
        Gesture::DragStart { dpid } => {
            let node = pinned(topo, dpid)?;
            let req = InspectRequest::new(&node.dpid);
            layout.resume();
            Some(req)
        }
        Gesture::DragMove { dpid, x, y } => {
            let node = pinned(topo, dpid)?;
            node.set_position(Vec2::new(*x, *y));
            layout.resume();
            None
        }
        Gesture::DragEnd { dpid } => {
            pinned(topo, dpid)?;
            None
        }
        Gesture::DoubleClick { dpid } => {
            let Some(node) = topo.node_mut(dpid) else {
                debug!(%dpid, "double-click on unknown node");
                return None;
            };
            node.fixed = false;
            layout.resume();
            None
        }
    }
}

fn pinned<'a>(topo: &'a mut Topology, dpid: &Dpid) -> Option<&'a mut Node> {
    let Some(node) = topo.node_mut(dpid) else {
        debug!(%dpid, "gesture on unknown node");
        return None;
    };
    node.fixed = true;
    Some(node)
}

/// Top-most node whose icon box contains `(x, y)`.
///
/// Node glyphs draw in [`SceneId`] order, i.e. by dpid, so among overlapping
/// nodes the highest dpid is the visible one.
///
/// [`SceneId`]: crate::scene::SceneId
pub fn node_at(topo: &Topology, x: f32, y: f32) -> Option<&Node> {
    let (hw, hh) = (NODE_ICON_WIDTH * 0.5, NODE_ICON_HEIGHT * 0.5);
    topo.nodes()
        .iter()
        .filter(|n| (x - n.pos.x).abs() <= hw && (y - n.pos.y).abs() <= hh)
        .max_by(|a, b| a.dpid.cmp(&b.dpid))
}

/// Turns raw pointer events into [`Gesture`]s.
///
/// A press on a node starts a drag that follows the pointer until release;
/// presses on empty canvas are ignored.
#[derive(Debug, Clone, Default)]
pub struct PointerTracker {
    dragging: Option<Dpid>,
}

impl PointerTracker {
    pub fn dragging(&self) -> Option<&Dpid> {
        self.dragging.as_ref()
    }

    pub fn down(&mut self, topo: &Topology, x: f32, y: f32) -> Vec<Gesture> {
        let Some(node) = node_at(topo, x, y) else {
            return Vec::new();
        };
        let dpid = node.dpid.clone();
        self.dragging = Some(dpid.clone());
        vec![Gesture::DragStart { dpid }]
    }

    pub fn moved(&mut self, x: f32, y: f32) -> Vec<Gesture> {
        match &self.dragging {
            Some(dpid) => vec![Gesture::DragMove {
                dpid: dpid.clone(),
                x,
                y,
            }],
            None => Vec::new(),
        }
    }

    pub fn up(&mut self) -> Vec<Gesture> {
        match self.dragging.take() {
            Some(dpid) => vec![Gesture::DragEnd { dpid }],
            None => Vec::new(),
        }
    }

    pub fn double_click(&mut self, topo: &Topology, x: f32, y: f32) -> Vec<Gesture> {
        match node_at(topo, x, y) {
            Some(node) => vec![Gesture::DoubleClick {
                dpid: node.dpid.clone(),
            }],
            None => Vec::new(),
        }
    }
}
