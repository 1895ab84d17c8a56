use serde::{Deserialize, Serialize};

use crate::prng::Prng;
use crate::topology::{Topology, Vec2};

/// Force simulation parameters. Fixed for the lifetime of a [`ForceLayout`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForceConfig {
    pub width: f32,
    pub height: f32,

    /// Target length every link relaxes toward.
    pub link_distance: f32,
    pub link_strength: f32,

    // Global node charge; negative repels.
    pub charge: f32,

    // Pull toward the canvas centre, keeps disconnected parts on screen.
    pub gravity: f32,

    // Velocity retained per tick (1.0 = frictionless).
    pub friction: f32,

    // Cooling schedule: alpha starts at `alpha_start`, is multiplied by
    // `alpha_decay` every tick and the simulation settles below `alpha_min`.
    pub alpha_start: f32,
    pub alpha_decay: f32,
    pub alpha_min: f32,

    // If set, initial placement is reproducible.
    pub seed: Option<u64>,
}

impl Default for ForceConfig {
    fn default() -> Self {
        Self {
            width: 960.0,
            height: 500.0,
            link_distance: 200.0,
            link_strength: 1.0,
            charge: -600.0,
            gravity: 0.1,
            friction: 0.9,
            alpha_start: 0.1,
            alpha_decay: 0.99,
            alpha_min: 0.005,
            seed: None,
        }
    }
}

fn finite_or(v: f32, fallback: f32) -> f32 {
    if v.is_finite() {
        v
    } else {
        fallback
    }
}

impl ForceConfig {
    /// Pull every parameter into the range where the simulation stays finite
    /// and eventually settles. Non-finite values fall back to the default.
    pub fn normalize(&mut self) {
        let d = ForceConfig::default();

        self.width = finite_or(self.width, d.width);
        if self.width <= 0.0 {
            self.width = d.width;
        }
        self.height = finite_or(self.height, d.height);
        if self.height <= 0.0 {
            self.height = d.height;
        }

        self.link_distance = finite_or(self.link_distance, d.link_distance).max(0.0);
        self.link_strength = finite_or(self.link_strength, d.link_strength).clamp(0.0, 1.0);
        self.charge = finite_or(self.charge, d.charge);
        self.gravity = finite_or(self.gravity, d.gravity).max(0.0);
        self.friction = finite_or(self.friction, d.friction).clamp(0.0, 1.0);

        self.alpha_start = finite_or(self.alpha_start, d.alpha_start).max(0.0);
        self.alpha_decay = finite_or(self.alpha_decay, d.alpha_decay).clamp(0.0, MAX_ALPHA_DECAY);
        self.alpha_min = finite_or(self.alpha_min, d.alpha_min);
        if self.alpha_min <= 0.0 {
            self.alpha_min = d.alpha_min;
        }
    }

    pub fn normalized(mut self) -> Self {
        self.normalize();
        self
    }
}

/// Largest cooling factor accepted; 1.0 would never settle.
pub const MAX_ALPHA_DECAY: f32 = 0.999;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct TickReport {
    /// Alpha the tick ran with (0 when the simulation was settled).
    pub alpha: f32,
    /// Number of nodes whose position changed.
    pub moved: usize,
    pub max_displacement: f32,
}

/// Force-directed layout over the nodes and canonical links of a [`Topology`].
///
/// Positions live on the nodes themselves; the engine only owns the cooling
/// state. Each tick applies, in order:
/// - spring attraction along links toward `link_distance`, split between the
///   two ends by degree,
/// - gravity toward the centre,
/// - pairwise repulsion (O(n^2), fine for controller-sized topologies),
/// - friction-damped velocity integration.
///
/// Fixed nodes still push and pull on others but never move. The steady state
/// is not unique: starting positions are random unless `seed` is set.
#[derive(Debug, Clone)]
pub struct ForceLayout {
    cfg: ForceConfig,
    alpha: f32,
    rng: Prng,
}

impl ForceLayout {
    /// The config is normalized first; see [`ForceConfig::normalize`].
    pub fn new(cfg: ForceConfig) -> Self {
        let cfg = cfg.normalized();
        let rng = match cfg.seed {
            Some(seed) => Prng::new(seed),
            None => Prng::from_clock(),
        };
        Self {
            cfg,
            alpha: 0.0,
            rng,
        }
    }

    pub fn config(&self) -> &ForceConfig {
        &self.cfg
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn is_settled(&self) -> bool {
        self.alpha < self.cfg.alpha_min
    }

    /// Pick up a new node/link set: scatter nodes that have never been placed
    /// and reheat. Placed (and fixed) nodes keep their positions.
    pub fn reseed(&mut self, topo: &mut Topology) {
        let (w, h) = (self.cfg.width, self.cfg.height);
        for node in topo.nodes_mut().iter_mut().filter(|n| !n.placed) {
            node.pos = Vec2::new(
                self.rng.gen_range_f32(0.0, w),
                self.rng.gen_range_f32(0.0, h),
            );
            node.vel = Vec2::ZERO;
            node.placed = true;
        }
        if topo.is_empty() {
            self.alpha = 0.0;
        } else {
            self.alpha = self.cfg.alpha_start;
        }
    }

    /// Reheat without touching positions (drag input).
    pub fn resume(&mut self) {
        self.alpha = self.alpha.max(self.cfg.alpha_start);
    }

    pub fn tick(&mut self, topo: &mut Topology) -> TickReport {
        if topo.is_empty() || self.is_settled() {
            return TickReport::default();
        }

        let alpha = self.alpha;
        let degrees = topo.degrees();
        let springs: Vec<(usize, usize)> = topo
            .links()
            .iter()
            .filter_map(|l| Some((topo.index_of(&l.src.dpid)?, topo.index_of(&l.dst.dpid)?)))
            .collect();

        let cfg = self.cfg;
        let nodes = topo.nodes_mut();
        let n = nodes.len();
        let mut disp = vec![Vec2::ZERO; n];

        // Springs
        for &(s, t) in &springs {
            let dx = nodes[t].pos.x - nodes[s].pos.x;
            let dy = nodes[t].pos.y - nodes[s].pos.y;
            let l2 = dx * dx + dy * dy;
            if l2 <= 1e-9 {
                continue;
            }
            let l = l2.sqrt();
            let f = alpha * cfg.link_strength * (l - cfg.link_distance) / l;
            let (fx, fy) = (dx * f, dy * f);

            let ws = degrees[s].max(1) as f32;
            let wt = degrees[t].max(1) as f32;
            let k = ws / (ws + wt);
            disp[t].x -= fx * k;
            disp[t].y -= fy * k;
            disp[s].x += fx * (1.0 - k);
            disp[s].y += fy * (1.0 - k);
        }

        // Gravity
        let (cx, cy) = (cfg.width * 0.5, cfg.height * 0.5);
        let g = alpha * cfg.gravity;
        for (i, node) in nodes.iter().enumerate() {
            disp[i].x += (cx - node.pos.x) * g;
            disp[i].y += (cy - node.pos.y) * g;
        }

        // Charge
        for i in 0..n {
            for j in (i + 1)..n {
                let mut dx = nodes[i].pos.x - nodes[j].pos.x;
                let mut dy = nodes[i].pos.y - nodes[j].pos.y;
                if dx == 0.0 && dy == 0.0 {
                    // Coincident nodes: pick a random direction.
                    dx = self.rng.gen_range_f32(-0.5, 0.5);
                    dy = self.rng.gen_range_f32(-0.5, 0.5);
                }
                let d2 = (dx * dx + dy * dy).max(1.0);
                let f = -cfg.charge * alpha / d2;
                disp[i].x += dx * f;
                disp[i].y += dy * f;
                disp[j].x -= dx * f;
                disp[j].y -= dy * f;
            }
        }

        // Integrate
        let mut report = TickReport {
            alpha,
            ..TickReport::default()
        };
        for (node, d) in nodes.iter_mut().zip(disp) {
            if node.fixed {
                node.vel = Vec2::ZERO;
                continue;
            }
            node.vel.x = (node.vel.x + d.x) * cfg.friction;
            node.vel.y = (node.vel.y + d.y) * cfg.friction;
            node.pos.x += node.vel.x;
            node.pos.y += node.vel.y;

            let step = (node.vel.x * node.vel.x + node.vel.y * node.vel.y).sqrt();
            if step > 0.0 {
                report.moved += 1;
            }
            report.max_displacement = report.max_displacement.max(step);
        }

        self.alpha *= cfg.alpha_decay;
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dpid::Dpid;
    use crate::topology::{Link, LinkEnd};

    fn seeded() -> ForceLayout {
        ForceLayout::new(ForceConfig {
            seed: Some(42),
            ..ForceConfig::default()
        })
    }

    fn ring(n: u64) -> Topology {
        let mut t = Topology::new();
        for v in 1..=n {
            t.add_node(Dpid::from_int(v), vec![]);
        }
        for v in 1..=n {
            let next = v % n + 1;
            t.add_link(Link::new(
                LinkEnd::new(Dpid::from_int(v), Some("1")),
                LinkEnd::new(Dpid::from_int(next), Some("2")),
            ));
        }
        t
    }

    #[test]
    fn reseed_places_nodes_inside_canvas() {
        let mut t = ring(6);
        let mut layout = seeded();
        layout.reseed(&mut t);
        assert!(!layout.is_settled());
        for node in t.nodes() {
            assert!(node.is_placed());
            assert!((0.0..960.0).contains(&node.pos.x));
            assert!((0.0..500.0).contains(&node.pos.y));
        }
    }

    #[test]
    fn reseed_keeps_placed_nodes() {
        let mut t = ring(3);
        let mut layout = seeded();
        t.node_mut(&Dpid::from_int(2))
            .unwrap()
            .set_position(Vec2::new(10.0, 20.0));
        layout.reseed(&mut t);
        assert_eq!(t.node(&Dpid::from_int(2)).unwrap().pos, Vec2::new(10.0, 20.0));
    }

    #[test]
    fn fixed_node_never_moves() {
        let mut t = ring(5);
        let mut layout = seeded();
        layout.reseed(&mut t);

        let pinned = Dpid::from_int(3);
        {
            let node = t.node_mut(&pinned).unwrap();
            node.set_position(Vec2::new(100.0, 100.0));
            node.fixed = true;
        }

        for _ in 0..200 {
            layout.tick(&mut t);
            assert_eq!(t.node(&pinned).unwrap().pos, Vec2::new(100.0, 100.0));
        }
    }

    #[test]
    fn displacement_becomes_bounded() {
        let mut t = ring(8);
        let mut layout = seeded();
        layout.reseed(&mut t);

        let mut reports = Vec::new();
        for _ in 0..1000 {
            if layout.is_settled() {
                break;
            }
            reports.push(layout.tick(&mut t));
        }
        assert!(layout.is_settled(), "simulation should cool down");

        let early: f32 = reports.iter().take(20).map(|r| r.max_displacement).sum();
        let late: f32 = reports.iter().rev().take(20).map(|r| r.max_displacement).sum();
        assert!(late < early, "late={} early={}", late, early);

        // Settled ticks are no-ops.
        let before: Vec<Vec2> = t.nodes().iter().map(|n| n.pos).collect();
        let r = layout.tick(&mut t);
        assert_eq!(r.moved, 0);
        let after: Vec<Vec2> = t.nodes().iter().map(|n| n.pos).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn coincident_nodes_separate() {
        let mut t = Topology::new();
        t.add_node(Dpid::from_int(1), vec![]);
        t.add_node(Dpid::from_int(2), vec![]);
        for node in t.nodes_mut() {
            node.set_position(Vec2::new(50.0, 50.0));
        }
        let mut layout = seeded();
        layout.resume();
        layout.tick(&mut t);
        assert_ne!(t.nodes()[0].pos, t.nodes()[1].pos);
    }

    #[test]
    fn unstable_config_is_pulled_into_range() {
        let cfg = ForceConfig {
            friction: 1.5,
            alpha_decay: 1.0,
            alpha_min: 0.0,
            width: -10.0,
            height: f32::NAN,
            link_distance: -5.0,
            seed: Some(9),
            ..ForceConfig::default()
        };
        let mut layout = ForceLayout::new(cfg);
        assert_eq!(layout.config().friction, 1.0);
        assert_eq!(layout.config().alpha_decay, MAX_ALPHA_DECAY);
        assert_eq!(layout.config().alpha_min, 0.005);
        assert_eq!(layout.config().width, 960.0);
        assert_eq!(layout.config().height, 500.0);
        assert_eq!(layout.config().link_distance, 0.0);

        let mut t = ring(6);
        layout.reseed(&mut t);
        for _ in 0..20_000 {
            if layout.is_settled() {
                break;
            }
            layout.tick(&mut t);
        }
        assert!(layout.is_settled());
        for node in t.nodes() {
            assert!(node.pos.x.is_finite() && node.pos.y.is_finite());
        }
    }

    #[test]
    fn empty_topology_does_not_tick() {
        let mut t = Topology::new();
        let mut layout = seeded();
        layout.reseed(&mut t);
        assert!(layout.is_settled());
        assert_eq!(layout.tick(&mut t), TickReport::default());
    }
}
