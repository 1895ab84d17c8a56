//! HTTP side of the controller: flow tables for the detail panel and the
//! topology snapshot taken at startup.

use std::time::Duration;

use serde_json::Value;
use topoview::inspector::InspectRequest;
use topoview::rpc::{RpcCall, RpcError};
use url::Url;

use crate::error::DaemonError;

pub const SWITCHES_PATH: &str = "/v1.0/topology/switches";
pub const LINKS_PATH: &str = "/v1.0/topology/links";

#[derive(Debug, Clone)]
pub struct FlowClient {
    http: reqwest::Client,
    base: Url,
}

impl FlowClient {
    pub fn new(base: Url) -> Result<Self, DaemonError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self { http, base })
    }

    pub fn url(&self, path: &str) -> Result<Url, DaemonError> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|e| DaemonError::Config(format!("invalid path {:?}: {}", path, e)))
    }

    async fn get_json(&self, path: &str) -> Result<Value, DaemonError> {
        let url = self.url(path)?;
        let resp = self.http.get(url).send().await?.error_for_status()?;
        Ok(resp.json::<Value>().await?)
    }

    /// `GET /stats/flow/<device_id>`.
    pub async fn flows(&self, req: &InspectRequest) -> Result<Value, DaemonError> {
        self.get_json(&req.path()).await
    }

    /// Current switches and links, as the calls the feed would have pushed.
    pub async fn snapshot(&self) -> Result<Vec<RpcCall>, DaemonError> {
        let switches = self.get_json(SWITCHES_PATH).await?;
        let links = self.get_json(LINKS_PATH).await?;
        snapshot_calls(switches, links)
            .map_err(|e| DaemonError::Config(format!("unexpected snapshot body: {}", e)))
    }
}

pub fn snapshot_calls(switches: Value, links: Value) -> Result<Vec<RpcCall>, RpcError> {
    Ok(vec![
        RpcCall::decode("event_switch_enter", switches)?,
        RpcCall::decode("event_link_add", links)?,
    ])
}
