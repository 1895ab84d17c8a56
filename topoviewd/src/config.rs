use std::time::Duration;

use serde::{Deserialize, Serialize};
use topoview::layout::ForceConfig;
use url::Url;

use crate::error::DaemonError;
use crate::paths::AppPaths;

/// Daemon settings. Every field has a default, so a partial (or missing)
/// config file is fine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerConfig {
    /// `host:port` of the controller serving the feed and the REST API.
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default = "default_ws_path")]
    pub ws_path: String,
    /// Local address of the UI IPC listener.
    #[serde(default = "default_ui_listen")]
    pub ui_listen: String,
    /// Layout tick period in milliseconds, clamped to 1..=1000.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// Pull the current switches and links over HTTP before subscribing.
    #[serde(default = "default_initial_snapshot")]
    pub initial_snapshot: bool,
    #[serde(default = "default_node_icon")]
    pub node_icon: String,
    #[serde(default)]
    pub force: ForceConfig,
}

fn default_backend() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_ws_path() -> String {
    "/v1.0/topology/ws".to_string()
}

fn default_ui_listen() -> String {
    "127.0.0.1:9877".to_string()
}

fn default_tick_ms() -> u64 {
    16
}

fn default_initial_snapshot() -> bool {
    true
}

fn default_node_icon() -> String {
    "./router.svg".to_string()
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            ws_path: default_ws_path(),
            ui_listen: default_ui_listen(),
            tick_ms: default_tick_ms(),
            initial_snapshot: default_initial_snapshot(),
            node_icon: default_node_icon(),
            force: ForceConfig::default(),
        }
    }
}

impl ViewerConfig {
    /// Defaults, then the config file if present, then the environment.
    pub fn load(paths: &AppPaths) -> Result<Self, DaemonError> {
        Self::load_with(paths, |key| std::env::var(key).ok())
    }

    pub fn load_with(
        paths: &AppPaths,
        var: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, DaemonError> {
        let file = paths.config_file();
        let mut cfg = if file.is_file() {
            let text = std::fs::read_to_string(&file)?;
            Self::from_json(&text)?
        } else {
            Self::default()
        };
        cfg.apply_env(var);
        cfg.normalize();
        Ok(cfg)
    }

    pub fn from_json(text: &str) -> Result<Self, DaemonError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        // TOPOVIEW_BACKEND=10.0.0.5:8080
        if let Some(v) = var("TOPOVIEW_BACKEND") {
            if !v.trim().is_empty() {
                self.backend = v.trim().to_string();
            }
        }

        // TOPOVIEW_UI_LISTEN=127.0.0.1:9877
        if let Some(v) = var("TOPOVIEW_UI_LISTEN") {
            if !v.trim().is_empty() {
                self.ui_listen = v.trim().to_string();
            }
        }

        // TOPOVIEW_TICK_MS=16
        if let Some(v) = var("TOPOVIEW_TICK_MS") {
            if let Ok(n) = v.trim().parse::<u64>() {
                self.tick_ms = n;
            }
        }
    }

    pub fn normalize(&mut self) {
        self.tick_ms = self.tick_ms.clamp(1, 1000);

        for scheme in ["http://", "https://", "ws://", "wss://"] {
            if let Some(rest) = self.backend.strip_prefix(scheme) {
                self.backend = rest.to_string();
                break;
            }
        }
        self.backend = self.backend.trim_end_matches('/').to_string();

        if !self.ws_path.starts_with('/') {
            self.ws_path.insert(0, '/');
        }

        self.force.normalize();
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn ws_url(&self) -> Result<Url, DaemonError> {
        parse_url(&format!("ws://{}{}", self.backend, self.ws_path))
    }

    pub fn http_base(&self) -> Result<Url, DaemonError> {
        parse_url(&format!("http://{}/", self.backend))
    }
}

fn parse_url(text: &str) -> Result<Url, DaemonError> {
    Url::parse(text).map_err(|e| DaemonError::Config(format!("invalid url {:?}: {}", text, e)))
}
