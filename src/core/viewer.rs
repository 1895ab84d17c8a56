//! One live topology view: store, layout, scene and detail panel owned
//! together and driven by the daemon's event sources.

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::inspector::{DetailPanel, InspectError, InspectRequest};
use crate::interaction::{apply_gesture, Gesture, PointerTracker};
use crate::layout::{ForceConfig, ForceLayout, TickReport};
use crate::rpc::{decode_frame, RpcCall, RpcError, RpcReply};
use crate::scene::{RenderBackend, Scene};
use crate::topology::{Change, Link, Node, PortView, Topology};

/// Serializable copy of the store, for clients that draw on their own.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub nodes: Vec<Node>,
    pub links: Vec<Link>,
    pub pending: Vec<Link>,
    pub ports: Vec<PortView>,
    pub alpha: f32,
}

pub struct Viewer<B> {
    topology: Topology,
    layout: ForceLayout,
    scene: Scene<B>,
    pointer: PointerTracker,
    detail: DetailPanel,
}

impl<B: RenderBackend> Viewer<B> {
    pub fn new(cfg: ForceConfig, backend: B) -> Self {
        Self {
            topology: Topology::new(),
            layout: ForceLayout::new(cfg),
            scene: Scene::new(backend),
            pointer: PointerTracker::default(),
            detail: DetailPanel::new(),
        }
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn layout(&self) -> &ForceLayout {
        &self.layout
    }

    pub fn scene(&self) -> &Scene<B> {
        &self.scene
    }

    pub fn backend(&self) -> &B {
        self.scene.backend()
    }

    pub fn detail(&self) -> &DetailPanel {
        &self.detail
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            nodes: self.topology.nodes().to_vec(),
            links: self.topology.links().to_vec(),
            pending: self.topology.pending_links().to_vec(),
            ports: self.topology.ports(),
            alpha: self.layout.alpha(),
        }
    }

    /// Decode one transport frame, run its handler and build the reply.
    ///
    /// A frame that fails to decode leaves the view untouched; the caller
    /// logs the error and sends nothing back.
    pub fn handle_frame(&mut self, text: &str) -> Result<RpcReply, RpcError> {
        let req = decode_frame(text)?;
        self.apply_call(req.call);
        Ok(RpcReply::new(req.id, Value::String(String::new())))
    }

    pub fn apply_call(&mut self, call: RpcCall) -> Change {
        let method = call.method();
        let change = call.apply(&mut self.topology);
        debug!(method, ?change, "rpc applied");

        if change.is_structural() {
            self.layout.reseed(&mut self.topology);
        }
        self.scene.sync(&self.topology);
        change
    }

    /// One layout step. The scene is only redrawn while the simulation is hot.
    pub fn tick(&mut self) -> TickReport {
        let report = self.layout.tick(&mut self.topology);
        if report.alpha > 0.0 {
            self.scene.sync(&self.topology);
        }
        report
    }

    pub fn gesture(&mut self, gesture: &Gesture) -> Option<InspectRequest> {
        let req = apply_gesture(gesture, &mut self.topology, &mut self.layout);
        self.scene.sync(&self.topology);
        req
    }

    pub fn pointer_down(&mut self, x: f32, y: f32) -> Option<InspectRequest> {
        let gestures = self.pointer.down(&self.topology, x, y);
        self.run(gestures)
    }

    pub fn pointer_move(&mut self, x: f32, y: f32) {
        let gestures = self.pointer.moved(x, y);
        self.run(gestures);
    }

    pub fn pointer_up(&mut self) {
        let gestures = self.pointer.up();
        self.run(gestures);
    }

    pub fn double_click_at(&mut self, x: f32, y: f32) {
        let gestures = self.pointer.double_click(&self.topology, x, y);
        self.run(gestures);
    }

    /// Feed a flow endpoint response into the detail panel.
    pub fn apply_flows(&mut self, device_id: u64, body: &Value) -> Result<usize, InspectError> {
        self.detail.apply(device_id, body)
    }

    fn run(&mut self, gestures: Vec<Gesture>) -> Option<InspectRequest> {
        let mut req = None;
        for g in &gestures {
            if let Some(r) = self.gesture(g) {
                req = Some(r);
            }
        }
        req
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dpid::Dpid;
    use crate::scene::SceneId;
    use crate::svg::SvgBackend;
    use crate::topology::Vec2;
    use serde_json::json;

    fn viewer() -> Viewer<SvgBackend> {
        let cfg = ForceConfig {
            seed: Some(7),
            ..ForceConfig::default()
        };
        Viewer::new(cfg, SvgBackend::new(960.0, 500.0, "./router.svg"))
    }

    fn frame(id: u64, method: &str, params: Value) -> String {
        json!({"id": id, "method": method, "params": params}).to_string()
    }

    fn two_linked_nodes(v: &mut Viewer<SvgBackend>) {
        for n in ["0000000000000001", "0000000000000002"] {
            v.handle_frame(&frame(1, "add_node", json!({"dpid": n})))
                .unwrap();
        }
        let reply = v
            .handle_frame(&frame(
                2,
                "add_link",
                json!({
                    "src": {"dpid": "0000000000000002", "port_no": "00000001"},
                    "dst": {"dpid": "0000000000000001", "port_no": "00000002"}
                }),
            ))
            .unwrap();
        assert_eq!(reply.result, json!(""));
    }

    #[test]
    fn reversed_link_renders_once_in_canonical_direction() {
        let mut v = viewer();
        two_linked_nodes(&mut v);

        let links = v.topology().links();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].src.dpid.value(), 1);
        assert_eq!(links[0].dst.dpid.value(), 2);

        let key = links[0].key();
        assert!(v.scene().is_rendered(&SceneId::Link(key)));
        assert_eq!(v.backend().render().matches("class=\"link\"").count(), 1);
        assert!(!v.layout().is_settled());
    }

    #[test]
    fn portless_link_is_canonical_too() {
        let mut v = viewer();
        v.handle_frame(r#"{"id":1,"method":"add_node","params":{"dpid":"0000000000000001"}}"#)
            .unwrap();
        v.handle_frame(r#"{"id":2,"method":"add_node","params":{"dpid":"0000000000000002"}}"#)
            .unwrap();
        v.handle_frame(
            r#"{"id":3,"method":"add_link","params":{"src":{"dpid":"0000000000000002"},"dst":{"dpid":"0000000000000001"}}}"#,
        )
        .unwrap();

        let links = v.topology().links();
        assert_eq!(links.len(), 1);
        assert_eq!((links[0].src.dpid.value(), links[0].dst.dpid.value()), (1, 2));
        // link + two nodes, no ports
        assert_eq!(v.scene().rendered_len(), 3);
    }

    #[test]
    fn bad_frames_leave_view_untouched() {
        let mut v = viewer();
        assert!(v.handle_frame("not json").is_err());
        assert!(v
            .handle_frame(&frame(1, "format_disk", json!({})))
            .is_err());
        assert!(v.topology().is_empty());
        assert_eq!(v.scene().rendered_len(), 0);

        // the session keeps going
        v.handle_frame(&frame(2, "add_node", json!({"dpid": "0000000000000001"})))
            .unwrap();
        assert_eq!(v.topology().nodes().len(), 1);
    }

    #[test]
    fn drag_pins_until_double_click() {
        let mut v = viewer();
        two_linked_nodes(&mut v);
        let a = Dpid::from_int(1);
        let b = Dpid::from_int(2);

        // park both nodes far apart so hit testing is unambiguous
        for (dpid, x, y) in [(&a, 300.0, 300.0), (&b, 800.0, 400.0)] {
            v.gesture(&Gesture::DragMove {
                dpid: dpid.clone(),
                x,
                y,
            });
        }

        let req = v.pointer_down(300.0, 300.0).unwrap();
        assert_eq!(req.path(), "/stats/flow/1");
        v.pointer_move(100.0, 100.0);
        v.pointer_up();

        for _ in 0..50 {
            v.tick();
        }
        let node = v.topology().node(&a).unwrap();
        assert!(node.fixed);
        assert_eq!(node.pos, Vec2::new(100.0, 100.0));

        v.double_click_at(100.0, 100.0);
        assert!(!v.topology().node(&a).unwrap().fixed);
        for _ in 0..50 {
            v.tick();
        }
        assert_ne!(v.topology().node(&a).unwrap().pos, Vec2::new(100.0, 100.0));
    }

    #[test]
    fn remove_node_clears_scene() {
        let mut v = viewer();
        two_linked_nodes(&mut v);
        v.handle_frame(&frame(
            3,
            "event_switch_leave",
            json!([{"dpid": "0000000000000002"}]),
        ))
        .unwrap();
        assert!(v.topology().links().is_empty());
        // node 1 and the port the link created on it remain
        assert_eq!(v.scene().rendered_len(), 2);
    }

    #[test]
    fn flows_land_in_detail_panel() {
        let mut v = viewer();
        assert_eq!(v.apply_flows(1, &json!({"1": [{"priority": 1}]})).unwrap(), 1);
        assert_eq!(v.detail().device_id(), Some(1));
        assert!(v.apply_flows(1, &json!({})).is_err());
        assert_eq!(v.detail().entries().len(), 1);
    }

    #[test]
    fn snapshot_serializes() {
        let mut v = viewer();
        two_linked_nodes(&mut v);
        let text = serde_json::to_string(&v.snapshot()).unwrap();
        assert!(text.contains("\"dpid\":\"0000000000000001\""));
    }
}
