//! Standalone SVG rendering of the scene.

use std::collections::BTreeMap;
use std::fmt;

use crate::interaction::{NODE_ICON_HEIGHT, NODE_ICON_WIDTH};
use crate::scene::{RenderBackend, SceneEntity, SceneId};

pub const PORT_RADIUS: f32 = 8.0;

/// Keeps the current element set and serializes it on demand.
///
/// Elements are kept ordered by [`SceneId`], which puts links under nodes and
/// nodes under ports.
#[derive(Debug, Clone)]
pub struct SvgBackend {
    width: f32,
    height: f32,
    icon: String,
    elements: BTreeMap<SceneId, SceneEntity>,
}

impl SvgBackend {
    pub fn new(width: f32, height: f32, icon: impl Into<String>) -> Self {
        Self {
            width,
            height,
            icon: icon.into(),
            elements: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl RenderBackend for SvgBackend {
    fn create(&mut self, entity: &SceneEntity) {
        self.elements.insert(entity.id(), entity.clone());
    }

    fn update(&mut self, entity: &SceneEntity) {
        self.elements.insert(entity.id(), entity.clone());
    }

    fn destroy(&mut self, id: &SceneId) {
        self.elements.remove(id);
    }
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

impl fmt::Display for SvgBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            r#"<svg xmlns="http://www.w3.org/2000/svg" id="topology" width="{}" height="{}">"#,
            self.width, self.height
        )?;

        let (hw, hh) = (NODE_ICON_WIDTH * 0.5, NODE_ICON_HEIGHT * 0.5);
        for entity in self.elements.values() {
            match entity {
                SceneEntity::Link(l) => writeln!(
                    f,
                    r#"  <line class="link" x1="{:.1}" y1="{:.1}" x2="{:.1}" y2="{:.1}"/>"#,
                    l.from.x, l.from.y, l.to.x, l.to.y
                )?,
                SceneEntity::Node(n) => {
                    let class = if n.fixed { "node fixed" } else { "node" };
                    writeln!(
                        f,
                        r#"  <g class="{}" data-dpid="{}" transform="translate({:.1},{:.1})">"#,
                        class,
                        escape(n.dpid.as_str()),
                        n.pos.x,
                        n.pos.y
                    )?;
                    writeln!(
                        f,
                        r#"    <image href="{}" x="{}" y="{}" width="{}" height="{}"/>"#,
                        escape(&self.icon),
                        -hw,
                        -hh,
                        NODE_ICON_WIDTH,
                        NODE_ICON_HEIGHT
                    )?;
                    writeln!(
                        f,
                        r#"    <text dx="{}" dy="{}">{}</text>"#,
                        -hw,
                        hh + 10.0,
                        escape(&n.label)
                    )?;
                    writeln!(f, "  </g>")?;
                }
                SceneEntity::Port(p) => {
                    writeln!(
                        f,
                        r#"  <g class="port" transform="translate({:.1},{:.1})">"#,
                        p.pos.x, p.pos.y
                    )?;
                    writeln!(f, r#"    <circle r="{}"/>"#, PORT_RADIUS)?;
                    writeln!(
                        f,
                        r#"    <text dx="-3" dy="3">{}</text>"#,
                        escape(&p.label)
                    )?;
                    writeln!(f, "  </g>")?;
                }
            }
        }
        write!(f, "</svg>")
    }
}
