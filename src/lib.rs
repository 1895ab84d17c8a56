#[path = "core/dpid.rs"]
pub mod dpid;

#[path = "core/prng.rs"]
pub mod prng;

#[path = "core/topology.rs"]
pub mod topology;

#[path = "core/layout.rs"]
pub mod layout;

#[path = "core/scene.rs"]
pub mod scene;

#[path = "core/interaction.rs"]
pub mod interaction;

#[path = "core/inspector.rs"]
pub mod inspector;

#[path = "core/rpc.rs"]
pub mod rpc;

#[path = "core/svg.rs"]
pub mod svg;

#[path = "core/viewer.rs"]
pub mod viewer;

pub use viewer::Viewer;
