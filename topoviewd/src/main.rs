//! Topoview Daemon - live topology view of an SDN controller
//!
//! This daemon runs in the background, managing:
//! - The WebSocket feed of topology changes from the controller
//! - The force layout, ticked on a timer
//! - Flow-table fetches for the detail panel
//! - IPC server for UI clients
//!
//! Configuration is read from `<config dir>/topoview/config.json`:
//! - Linux: ~/.config/topoview/
//! - Windows: %APPDATA%\topoview\
//! - MacOS: ~/Library/Application Support/topoview/

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::codec::{FramedRead, LinesCodec};
use topoview::inspector::{DetailPanel, InspectRequest};
use topoview::interaction::Gesture;
use topoview::svg::SvgBackend;
use topoview::viewer::Snapshot;
use topoview::Viewer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod error;
mod flows;
mod paths;
mod transport;

use config::ViewerConfig;
use error::DaemonError;
use flows::FlowClient;
use paths::AppPaths;

/// Longest request line a UI client may send.
const MAX_REQUEST_LINE: usize = 64 * 1024;

// ═══════════════════════════════════════════════════════════════════════════
// Protocol Messages
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
enum Request {
    GetScene,
    GetTopology,
    GetDetail,
    Gesture { gesture: Gesture },
    PointerDown { x: f32, y: f32 },
    PointerMove { x: f32, y: f32 },
    PointerUp,
    DoubleClickAt { x: f32, y: f32 },
    Shutdown,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
enum Response {
    Scene { svg: String },
    Topology(Snapshot),
    Detail(DetailPanel),
    Success { message: String },
    Error { message: String },
}

fn ok(message: &str) -> Response {
    Response::Success {
        message: message.to_string(),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Daemon State
// ═══════════════════════════════════════════════════════════════════════════

pub(crate) struct DaemonState {
    pub(crate) viewer: Viewer<SvgBackend>,
    flows: FlowClient,
}

impl DaemonState {
    fn new(cfg: &ViewerConfig, flows: FlowClient) -> Self {
        let backend = SvgBackend::new(cfg.force.width, cfg.force.height, cfg.node_icon.clone());
        Self {
            viewer: Viewer::new(cfg.force, backend),
            flows,
        }
    }

    /// Apply one UI request. A drag start also hands back the flow request
    /// the caller should fire.
    fn respond(&mut self, request: Request) -> (Response, Option<InspectRequest>) {
        match request {
            Request::GetScene => (
                Response::Scene {
                    svg: self.viewer.backend().render(),
                },
                None,
            ),
            Request::GetTopology => (Response::Topology(self.viewer.snapshot()), None),
            Request::GetDetail => (Response::Detail(self.viewer.detail().clone()), None),
            Request::Gesture { gesture } => {
                let inspect = self.viewer.gesture(&gesture);
                (ok("Gesture applied"), inspect)
            }
            Request::PointerDown { x, y } => {
                let inspect = self.viewer.pointer_down(x, y);
                let message = match &inspect {
                    Some(req) => format!("Dragging {}", req.dpid),
                    None => "No node under pointer".to_string(),
                };
                (Response::Success { message }, inspect)
            }
            Request::PointerMove { x, y } => {
                self.viewer.pointer_move(x, y);
                (ok("Moved"), None)
            }
            Request::PointerUp => {
                self.viewer.pointer_up();
                (ok("Released"), None)
            }
            Request::DoubleClickAt { x, y } => {
                self.viewer.double_click_at(x, y);
                (ok("Double-click applied"), None)
            }
            Request::Shutdown => {
                info!("Shutdown requested");
                tokio::spawn(async {
                    // Give the response a moment to flush before exiting.
                    time::sleep(Duration::from_millis(50)).await;
                    std::process::exit(0);
                });
                (ok("Shutting down"), None)
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Detail Fetch
// ═══════════════════════════════════════════════════════════════════════════

/// Fetch a flow table in the background. Nothing cancels an older fetch, so
/// the last one to finish is what the panel shows.
fn spawn_detail_fetch(state: Arc<RwLock<DaemonState>>, req: InspectRequest) {
    tokio::spawn(async move {
        let flows = state.read().await.flows.clone();
        let body = match flows.flows(&req).await {
            Ok(body) => body,
            Err(e) => {
                warn!("Flow fetch for {} failed: {}", req.path(), e);
                return;
            }
        };

        let mut s = state.write().await;
        match s.viewer.apply_flows(req.device_id, &body) {
            Ok(n) => info!("Detail panel: {} flows for device {}", n, req.device_id),
            Err(e) => warn!("Flow response for {} rejected: {}", req.path(), e),
        }
    });
}

async fn load_snapshot(state: &Arc<RwLock<DaemonState>>) -> Result<(), DaemonError> {
    let flows = state.read().await.flows.clone();
    let calls = flows.snapshot().await?;

    let mut s = state.write().await;
    for call in calls {
        s.viewer.apply_call(call);
    }
    info!(
        "Initial snapshot: {} switches, {} links",
        s.viewer.topology().nodes().len(),
        s.viewer.topology().links().len()
    );
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════
// Client Handler
// ═══════════════════════════════════════════════════════════════════════════

async fn handle_client(
    stream: TcpStream,
    state: Arc<RwLock<DaemonState>>,
) -> Result<(), DaemonError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_REQUEST_LINE));

    while let Some(line) = lines.next().await {
        let line = line?;
        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => {
                let (response, inspect) = state.write().await.respond(request);
                if let Some(req) = inspect {
                    spawn_detail_fetch(Arc::clone(&state), req);
                }
                response
            }
            Err(e) => Response::Error {
                message: format!("Invalid request: {}", e),
            },
        };

        writer
            .write_all(serde_json::to_string(&response)?.as_bytes())
            .await?;
        writer.write_all(b"\n").await?;
    }

    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════
// Main
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let paths = AppPaths::new()?;
    info!("Config directory: {:?}", paths.config_dir());
    let cfg = ViewerConfig::load(&paths)?;
    let ws_url = cfg.ws_url()?;
    let flows = FlowClient::new(cfg.http_base()?)?;

    let state = Arc::new(RwLock::new(DaemonState::new(&cfg, flows)));

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C: exiting");
            std::process::exit(0);
        }
    });

    if cfg.initial_snapshot {
        if let Err(e) = load_snapshot(&state).await {
            warn!("Could not load initial topology: {}", e);
            info!("Starting with an empty topology");
        }
    }

    // Topology feed task
    let state_clone = Arc::clone(&state);
    tokio::spawn(async move {
        match transport::run(ws_url, state_clone).await {
            Ok(()) => warn!("Topology feed ended; no further updates will arrive"),
            Err(e) => error!("Topology feed failed: {}", e),
        }
    });

    // Layout tick task
    let state_clone = Arc::clone(&state);
    let period = cfg.tick_interval();
    tokio::spawn(async move {
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            let mut s = state_clone.write().await;
            s.viewer.tick();
        }
    });

    // Start IPC server
    let listener = TcpListener::bind(&cfg.ui_listen).await?;
    info!("Topoview daemon listening on {}", cfg.ui_listen);

    // Accept client connections
    loop {
        let (stream, addr) = listener.accept().await?;
        info!("Client connected: {}", addr);
        let state_clone = Arc::clone(&state);

        tokio::spawn(async move {
            if let Err(e) = handle_client(stream, state_clone).await {
                error!("Client handler error: {}", e);
            }
        });
    }
}
