use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dpid::{trim_zero, Dpid};

/// Ports attached to a link sit this far along the segment from the peer
/// toward their own node (so they hug their node and point at the peer).
pub const PORT_LINK_WEIGHT: f32 = 0.88;

/// Unlinked ports are spread on a ring of this radius around their node.
pub const PORT_RING_RADIUS: f32 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn lerp(self, to: Vec2, t: f32) -> Vec2 {
        Vec2 {
            x: self.x + (to.x - self.x) * t,
            y: self.y + (to.y - self.y) * t,
        }
    }
}

/// Canonical comparison key for a port number: `"00000001"` and `"1"` are the
/// same port.
pub fn port_key(port_no: &str) -> String {
    let t = trim_zero(port_no.trim());
    if t.is_empty() {
        "0".to_string()
    } else {
        t.to_ascii_lowercase()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Port {
    pub port_no: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hw_addr: Option<String>,
}

impl Port {
    pub fn new(port_no: impl Into<String>) -> Self {
        Self {
            port_no: port_no.into(),
            name: None,
            hw_addr: None,
        }
    }

    pub fn label(&self) -> &str {
        trim_zero(&self.port_no)
    }

    fn same_port(&self, port_no: &str) -> bool {
        port_key(&self.port_no) == port_key(port_no)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Node {
    pub dpid: Dpid,
    pub pos: Vec2,
    /// Velocity carried between layout ticks.
    pub vel: Vec2,
    /// Pinned by the user; the layout engine never moves a fixed node.
    pub fixed: bool,
    pub ports: Vec<Port>,
    #[serde(skip)]
    pub(crate) placed: bool,
}

impl Node {
    fn new(dpid: Dpid, ports: Vec<Port>) -> Self {
        let mut node = Self {
            dpid,
            pos: Vec2::ZERO,
            vel: Vec2::ZERO,
            fixed: false,
            ports: Vec::with_capacity(ports.len()),
            placed: false,
        };
        node.replace_ports(ports);
        node
    }

    pub fn is_placed(&self) -> bool {
        self.placed
    }

    /// Move the node directly (drag). Marks it placed so a re-seed keeps it.
    pub fn set_position(&mut self, pos: Vec2) {
        self.pos = pos;
        self.vel = Vec2::ZERO;
        self.placed = true;
    }

    fn upsert_port(&mut self, port: Port) -> bool {
        match self.ports.iter_mut().find(|p| p.same_port(&port.port_no)) {
            Some(existing) if *existing == port => false,
            Some(existing) => {
                *existing = port;
                true
            }
            None => {
                self.ports.push(port);
                true
            }
        }
    }

    /// Swap in a new port list; entries naming the same port collapse into
    /// the last one.
    fn replace_ports(&mut self, ports: Vec<Port>) {
        self.ports.clear();
        for port in ports {
            self.upsert_port(port);
        }
    }

    fn ensure_port(&mut self, port_no: &str) -> bool {
        if self.ports.iter().any(|p| p.same_port(port_no)) {
            return false;
        }
        self.ports.push(Port::new(port_no));
        true
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkEnd {
    pub dpid: Dpid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_no: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hw_addr: Option<String>,
}

impl LinkEnd {
    pub fn new(dpid: Dpid, port_no: Option<&str>) -> Self {
        Self {
            dpid,
            port_no: port_no.map(str::to_string),
            name: None,
            hw_addr: None,
        }
    }

    /// Take the port attributes `from` carries. Attributes it leaves out keep
    /// their current value.
    fn merge_attributes(&mut self, from: &LinkEnd) -> bool {
        let mut changed = false;
        for (mine, theirs) in [(&mut self.name, &from.name), (&mut self.hw_addr, &from.hw_addr)] {
            if theirs.is_some() && *mine != *theirs {
                mine.clone_from(theirs);
                changed = true;
            }
        }
        changed
    }

    /// `self` is a removal pattern: a missing port matches any port.
    fn matches(&self, other: &LinkEnd) -> bool {
        if self.dpid != other.dpid {
            return false;
        }
        match (&self.port_no, &other.port_no) {
            (None, _) => true,
            (Some(a), Some(b)) => port_key(a) == port_key(b),
            (Some(_), None) => false,
        }
    }

    fn port_key(&self) -> Option<String> {
        self.port_no.as_deref().map(port_key)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub src: LinkEnd,
    pub dst: LinkEnd,
}

/// Identity of a link independent of port-number padding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct LinkKey {
    pub src: u64,
    pub src_port: Option<String>,
    pub dst: u64,
    pub dst_port: Option<String>,
}

/// A link is canonical only when its source dpid sorts below its destination.
/// The reverse-direction twin the backend reports for every port pair fails
/// this check.
pub fn is_valid_link(link: &Link) -> bool {
    link.src.dpid < link.dst.dpid
}

impl Link {
    pub fn new(src: LinkEnd, dst: LinkEnd) -> Self {
        Self { src, dst }
    }

    /// Orient the link canonically. Self links have no canonical form.
    pub fn canonical(self) -> Option<Link> {
        if is_valid_link(&self) {
            Some(self)
        } else if self.src.dpid == self.dst.dpid {
            None
        } else {
            Some(Link {
                src: self.dst,
                dst: self.src,
            })
        }
    }

    pub fn key(&self) -> LinkKey {
        LinkKey {
            src: self.src.dpid.value(),
            src_port: self.src.port_key(),
            dst: self.dst.dpid.value(),
            dst_port: self.dst.port_key(),
        }
    }

    pub fn touches(&self, dpid: &Dpid) -> bool {
        self.src.dpid == *dpid || self.dst.dpid == *dpid
    }

    fn matches(&self, pattern: &Link) -> bool {
        pattern.src.matches(&self.src) && pattern.dst.matches(&self.dst)
    }

    /// `from` must share this link's key.
    fn merge_attributes(&mut self, from: &Link) -> bool {
        let src = self.src.merge_attributes(&from.src);
        let dst = self.dst.merge_attributes(&from.dst);
        src || dst
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Change {
    #[default]
    None,
    /// Attributes of an existing entity changed; the node/link set did not.
    Attributes,
    /// Nodes or links were added or removed.
    Structure,
}

impl Change {
    pub fn merge(self, other: Change) -> Change {
        self.max(other)
    }

    pub fn is_structural(self) -> bool {
        self == Change::Structure
    }
}

/// A port flattened out of its node with a screen position derived from the
/// node's current layout position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortView {
    pub dpid: Dpid,
    pub port_no: String,
    pub label: String,
    pub pos: Vec2,
}

/// The authoritative in-memory graph.
///
/// Nodes keep insertion order; a side index maps dpid to slot and is rebuilt
/// after removals. Links whose endpoints are not both known yet wait in
/// `pending` and are promoted, in arrival order, as nodes arrive.
#[derive(Debug, Default)]
pub struct Topology {
    nodes: Vec<Node>,
    node_index: HashMap<Dpid, usize>,
    links: Vec<Link>,
    pending: Vec<Link>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub(crate) fn nodes_mut(&mut self) -> &mut [Node] {
        &mut self.nodes
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn pending_links(&self) -> &[Link] {
        &self.pending
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn index_of(&self, dpid: &Dpid) -> Option<usize> {
        self.node_index.get(dpid).copied()
    }

    pub fn node(&self, dpid: &Dpid) -> Option<&Node> {
        self.index_of(dpid).map(|i| &self.nodes[i])
    }

    pub fn node_mut(&mut self, dpid: &Dpid) -> Option<&mut Node> {
        self.index_of(dpid).map(move |i| &mut self.nodes[i])
    }

    /// Both endpoint nodes of a link, if known.
    pub fn endpoints(&self, link: &Link) -> Option<(&Node, &Node)> {
        Some((self.node(&link.src.dpid)?, self.node(&link.dst.dpid)?))
    }

    /// Insert a node, or merge `ports` into the existing one.
    pub fn add_node(&mut self, dpid: Dpid, ports: Vec<Port>) -> Change {
        if let Some(node) = self.node_mut(&dpid) {
            let mut changed = false;
            for port in ports {
                changed |= node.upsert_port(port);
            }
            return if changed {
                Change::Attributes
            } else {
                Change::None
            };
        }

        let idx = self.nodes.len();
        self.node_index.insert(dpid.clone(), idx);
        self.nodes.push(Node::new(dpid, ports));
        self.promote_pending();
        Change::Structure
    }

    /// Upsert a node, replacing its port list. Ports named by existing links
    /// are kept.
    pub fn update_node(&mut self, dpid: Dpid, ports: Vec<Port>) -> Change {
        let Some(idx) = self.index_of(&dpid) else {
            return self.add_node(dpid, ports);
        };

        let before = self.nodes[idx].ports.clone();
        self.nodes[idx].replace_ports(ports);
        let linked: Vec<String> = self
            .links
            .iter()
            .flat_map(|l| [&l.src, &l.dst])
            .filter(|end| end.dpid == dpid)
            .filter_map(|end| end.port_no.clone())
            .collect();
        for port_no in linked {
            self.nodes[idx].ensure_port(&port_no);
        }

        if self.nodes[idx].ports == before {
            Change::None
        } else {
            Change::Attributes
        }
    }

    /// Remove a node together with every link (canonical or pending) that
    /// touches it.
    pub fn remove_node(&mut self, dpid: &Dpid) -> Change {
        let Some(idx) = self.index_of(dpid) else {
            return Change::None;
        };
        self.nodes.remove(idx);
        self.refresh_node_index();
        self.links.retain(|l| !l.touches(dpid));
        self.pending.retain(|l| !l.touches(dpid));
        Change::Structure
    }

    /// Insert a link in canonical direction. Announcing a known link again
    /// only refreshes its port attributes.
    pub fn add_link(&mut self, link: Link) -> Change {
        if link.src.dpid == link.dst.dpid {
            debug!(dpid = %link.src.dpid, "ignoring self link");
            return Change::None;
        }
        let Some(link) = link.canonical() else {
            return Change::None;
        };
        let key = link.key();
        if let Some(existing) = self.links.iter_mut().find(|l| l.key() == key) {
            return if existing.merge_attributes(&link) {
                Change::Attributes
            } else {
                Change::None
            };
        }
        if let Some(waiting) = self.pending.iter_mut().find(|l| l.key() == key) {
            waiting.merge_attributes(&link);
            return Change::None;
        }

        if self.node(&link.src.dpid).is_some() && self.node(&link.dst.dpid).is_some() {
            self.attach(link);
            Change::Structure
        } else {
            debug!(
                src = %link.src.dpid,
                dst = %link.dst.dpid,
                "link endpoint unknown; holding link pending"
            );
            self.pending.push(link);
            Change::None
        }
    }

    pub fn remove_link(&mut self, link: Link) -> Change {
        let Some(pattern) = link.canonical() else {
            return Change::None;
        };
        let before = self.links.len();
        self.links.retain(|l| !l.matches(&pattern));
        if self.links.len() != before {
            return Change::Structure;
        }
        self.pending.retain(|l| !l.matches(&pattern));
        Change::None
    }

    /// Every port of every node, positioned from the current layout. Not
    /// cached: positions move every tick.
    pub fn ports(&self) -> Vec<PortView> {
        let mut peer_of: HashMap<(u64, String), Vec2> = HashMap::new();
        for link in &self.links {
            let Some((src, dst)) = self.endpoints(link) else {
                continue;
            };
            if let Some(p) = link.src.port_key() {
                peer_of.entry((src.dpid.value(), p)).or_insert(dst.pos);
            }
            if let Some(p) = link.dst.port_key() {
                peer_of.entry((dst.dpid.value(), p)).or_insert(src.pos);
            }
        }

        let mut out = Vec::new();
        for node in &self.nodes {
            let n = node.ports.len();
            for (i, port) in node.ports.iter().enumerate() {
                let pos = match peer_of.get(&(node.dpid.value(), port_key(&port.port_no))) {
                    Some(peer) => peer.lerp(node.pos, PORT_LINK_WEIGHT),
                    None => {
                        let a = (i as f32 / n as f32) * std::f32::consts::TAU;
                        Vec2::new(
                            node.pos.x + PORT_RING_RADIUS * a.cos(),
                            node.pos.y + PORT_RING_RADIUS * a.sin(),
                        )
                    }
                };
                out.push(PortView {
                    dpid: node.dpid.clone(),
                    port_no: port.port_no.clone(),
                    label: port.label().to_string(),
                    pos,
                });
            }
        }
        out
    }

    /// Number of canonical links touching each node, by node slot.
    pub fn degrees(&self) -> Vec<usize> {
        let mut deg = vec![0usize; self.nodes.len()];
        for link in &self.links {
            if let (Some(a), Some(b)) = (self.index_of(&link.src.dpid), self.index_of(&link.dst.dpid))
            {
                deg[a] += 1;
                deg[b] += 1;
            }
        }
        deg
    }

    fn attach(&mut self, link: Link) {
        for end in [&link.src, &link.dst] {
            if let (Some(port_no), Some(idx)) = (&end.port_no, self.node_index.get(&end.dpid)) {
                self.nodes[*idx].ensure_port(port_no);
            }
        }
        self.links.push(link);
    }

    fn promote_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let pending = std::mem::take(&mut self.pending);
        for link in pending {
            let known =
                self.node(&link.src.dpid).is_some() && self.node(&link.dst.dpid).is_some();
            if known {
                debug!(src = %link.src.dpid, dst = %link.dst.dpid, "promoting pending link");
                self.attach(link);
            } else {
                self.pending.push(link);
            }
        }
    }

    fn refresh_node_index(&mut self) {
        self.node_index.clear();
        for (i, node) in self.nodes.iter().enumerate() {
            self.node_index.insert(node.dpid.clone(), i);
        }
    }
}
