//! Scene reconciliation.
//!
//! The visual layer is an external collaborator reached through
//! [`RenderBackend`]. Every sync diffs the ids currently rendered against the
//! ids derived from the store and issues three disjoint batches: destroy,
//! create, update.

use hashbrown::HashSet;
use serde::Serialize;

use crate::dpid::Dpid;
use crate::topology::{port_key, LinkKey, Topology, Vec2};

/// Variant order is draw order: links under nodes under ports.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind")]
pub enum SceneId {
    Link(LinkKey),
    Node { dpid: Dpid },
    Port { dpid: Dpid, port: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeGlyph {
    pub dpid: Dpid,
    pub label: String,
    pub pos: Vec2,
    pub fixed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkGlyph {
    pub key: LinkKey,
    pub from: Vec2,
    pub to: Vec2,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortGlyph {
    pub dpid: Dpid,
    pub port_no: String,
    pub label: String,
    pub pos: Vec2,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum SceneEntity {
    Link(LinkGlyph),
    Node(NodeGlyph),
    Port(PortGlyph),
}

impl SceneEntity {
    pub fn id(&self) -> SceneId {
        match self {
            SceneEntity::Link(l) => SceneId::Link(l.key.clone()),
            SceneEntity::Node(n) => SceneId::Node {
                dpid: n.dpid.clone(),
            },
            SceneEntity::Port(p) => SceneId::Port {
                dpid: p.dpid.clone(),
                port: port_key(&p.port_no),
            },
        }
    }
}

/// Capability the scene needs from whatever draws it.
pub trait RenderBackend {
    fn create(&mut self, entity: &SceneEntity);
    fn update(&mut self, entity: &SceneEntity);
    fn destroy(&mut self, id: &SceneId);
}

#[derive(Debug, Default)]
pub struct ReconcilePlan {
    pub create: Vec<SceneEntity>,
    pub update: Vec<SceneEntity>,
    pub destroy: Vec<SceneId>,
}

/// Diff the previously rendered id set against the current entities.
/// Duplicate ids in `entities` keep their first occurrence.
pub fn reconcile(previous: &HashSet<SceneId>, entities: Vec<SceneEntity>) -> ReconcilePlan {
    let mut plan = ReconcilePlan::default();
    let mut seen: HashSet<SceneId> = HashSet::with_capacity(entities.len());

    for entity in entities {
        let id = entity.id();
        if seen.contains(&id) {
            continue;
        }
        if previous.contains(&id) {
            plan.update.push(entity);
        } else {
            plan.create.push(entity);
        }
        seen.insert(id);
    }

    plan.destroy = previous
        .iter()
        .filter(|id| !seen.contains(*id))
        .cloned()
        .collect();
    plan.destroy.sort();
    plan
}

/// Label shown under a node glyph.
pub fn node_label(dpid: &Dpid) -> String {
    format!("dpid: {}", dpid.trimmed())
}

/// Everything the store currently holds, as glyphs, in draw order.
pub fn entities(topo: &Topology) -> Vec<SceneEntity> {
    let mut out = Vec::with_capacity(topo.nodes().len() + topo.links().len());

    for link in topo.links() {
        let Some((src, dst)) = topo.endpoints(link) else {
            continue;
        };
        out.push(SceneEntity::Link(LinkGlyph {
            key: link.key(),
            from: src.pos,
            to: dst.pos,
        }));
    }

    for node in topo.nodes() {
        out.push(SceneEntity::Node(NodeGlyph {
            dpid: node.dpid.clone(),
            label: node_label(&node.dpid),
            pos: node.pos,
            fixed: node.fixed,
        }));
    }

    for port in topo.ports() {
        out.push(SceneEntity::Port(PortGlyph {
            dpid: port.dpid,
            port_no: port.port_no,
            label: port.label,
            pos: port.pos,
        }));
    }

    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SyncStats {
    pub created: usize,
    pub updated: usize,
    pub destroyed: usize,
}

/// The rendered side of the view: a backend plus the set of ids it holds.
pub struct Scene<B> {
    backend: B,
    rendered: HashSet<SceneId>,
}

impl<B: RenderBackend> Scene<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            rendered: HashSet::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn is_rendered(&self, id: &SceneId) -> bool {
        self.rendered.contains(id)
    }

    pub fn rendered_len(&self) -> usize {
        self.rendered.len()
    }

    pub fn sync(&mut self, topo: &Topology) -> SyncStats {
        let plan = reconcile(&self.rendered, entities(topo));
        let stats = SyncStats {
            created: plan.create.len(),
            updated: plan.update.len(),
            destroyed: plan.destroy.len(),
        };

        for id in &plan.destroy {
            self.backend.destroy(id);
            self.rendered.remove(id);
        }
        for entity in &plan.create {
            self.backend.create(entity);
            self.rendered.insert(entity.id());
        }
        for entity in &plan.update {
            self.backend.update(entity);
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{Link, LinkEnd};

    #[derive(Default)]
    struct Recorder {
        created: Vec<SceneId>,
        updated: Vec<SceneId>,
        destroyed: Vec<SceneId>,
    }

    impl RenderBackend for Recorder {
        fn create(&mut self, entity: &SceneEntity) {
            self.created.push(entity.id());
        }
        fn update(&mut self, entity: &SceneEntity) {
            self.updated.push(entity.id());
        }
        fn destroy(&mut self, id: &SceneId) {
            self.destroyed.push(id.clone());
        }
    }

    fn node_id(v: u64) -> SceneId {
        SceneId::Node {
            dpid: Dpid::from_int(v),
        }
    }

    fn glyph(v: u64) -> SceneEntity {
        SceneEntity::Node(NodeGlyph {
            dpid: Dpid::from_int(v),
            label: String::new(),
            pos: Vec2::ZERO,
            fixed: false,
        })
    }

    #[test]
    fn reconcile_splits_into_disjoint_sets() {
        let previous: HashSet<SceneId> = [node_id(1), node_id(2)].into_iter().collect();
        let plan = reconcile(&previous, vec![glyph(2), glyph(3), glyph(3)]);

        let created: Vec<_> = plan.create.iter().map(|e| e.id()).collect();
        let updated: Vec<_> = plan.update.iter().map(|e| e.id()).collect();
        assert_eq!(created, vec![node_id(3)]);
        assert_eq!(updated, vec![node_id(2)]);
        assert_eq!(plan.destroy, vec![node_id(1)]);
    }

    #[test]
    fn labels_strip_padding() {
        assert_eq!(node_label(&Dpid::parse("0000000000000001").unwrap()), "dpid: 1");
    }

    #[test]
    fn sync_tracks_store_mutations() {
        let mut topo = Topology::new();
        topo.add_node(Dpid::from_int(1), vec![]);
        topo.add_node(Dpid::from_int(2), vec![]);
        topo.add_link(Link::new(
            LinkEnd::new(Dpid::from_int(2), Some("00000001")),
            LinkEnd::new(Dpid::from_int(1), Some("00000002")),
        ));

        let mut scene = Scene::new(Recorder::default());
        let first = scene.sync(&topo);
        // 1 link + 2 nodes + 2 ports
        assert_eq!(first.created, 5);
        assert_eq!(first.updated, 0);

        let second = scene.sync(&topo);
        assert_eq!(second.created, 0);
        assert_eq!(second.updated, 5);

        topo.remove_node(&Dpid::from_int(2));
        let third = scene.sync(&topo);
        // link, node 2 and its port go away
        assert_eq!(third.destroyed, 3);
        assert_eq!(scene.rendered_len(), 2);
        assert!(scene.is_rendered(&node_id(1)));
        assert!(!scene.is_rendered(&node_id(2)));
    }
}
