use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::dpid::Dpid;

#[derive(Debug, Error)]
pub enum InspectError {
    #[error("flow response has no entry for device {0}")]
    MissingDevice(u64),
    #[error("flow entry for device {0} is not a list")]
    NotAList(u64),
}

/// Out-of-band request for one device's flow table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspectRequest {
    pub dpid: Dpid,
    /// The dpid as an integer; the flow endpoint is keyed by it.
    pub device_id: u64,
}

impl InspectRequest {
    pub fn new(dpid: &Dpid) -> Self {
        Self {
            dpid: dpid.clone(),
            device_id: dpid.value(),
        }
    }

    pub fn path(&self) -> String {
        format!("/stats/flow/{}", self.device_id)
    }
}

/// Render one flow record as indented JSON text (one space per level).
pub fn format_flow(flow: &Value) -> String {
    let mut buf = Vec::new();
    let fmt = serde_json::ser::PrettyFormatter::with_indent(b" ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, fmt);
    if flow.serialize(&mut ser).is_err() {
        return flow.to_string();
    }
    String::from_utf8(buf).unwrap_or_else(|_| flow.to_string())
}

/// The detail list shown next to the topology.
///
/// Fetches are never cancelled, so whichever response is applied last wins;
/// `generation` counts applied responses so a client can tell the list
/// changed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DetailPanel {
    device_id: Option<u64>,
    entries: Vec<String>,
    generation: u64,
}

impl DetailPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn device_id(&self) -> Option<u64> {
        self.device_id
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Replace the list from a flow endpoint body of the shape
    /// `{"<device_id>": [flow, ...]}`. On error the panel is left as it was.
    pub fn apply(&mut self, device_id: u64, body: &Value) -> Result<usize, InspectError> {
        let flows = body
            .get(device_id.to_string())
            .ok_or(InspectError::MissingDevice(device_id))?
            .as_array()
            .ok_or(InspectError::NotAList(device_id))?;

        self.entries = flows.iter().map(format_flow).collect();
        self.device_id = Some(device_id);
        self.generation = self.generation.wrapping_add(1);
        Ok(self.entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_path_uses_integer_id() {
        let req = InspectRequest::new(&Dpid::parse("00000000000000a1").unwrap());
        assert_eq!(req.device_id, 161);
        assert_eq!(req.path(), "/stats/flow/161");
    }

    #[test]
    fn apply_replaces_entries() {
        let mut panel = DetailPanel::new();
        let body = json!({"1": [{"priority": 1}, {"priority": 2, "actions": ["OUTPUT:2"]}]});
        assert_eq!(panel.apply(1, &body).unwrap(), 2);
        assert_eq!(panel.entries()[0], "{\n \"priority\": 1\n}");
        assert_eq!(panel.device_id(), Some(1));

        // a later response for another device overwrites
        let body = json!({"2": []});
        assert_eq!(panel.apply(2, &body).unwrap(), 0);
        assert!(panel.entries().is_empty());
        assert_eq!(panel.generation(), 2);
    }

    #[test]
    fn bad_body_leaves_panel_unchanged() {
        let mut panel = DetailPanel::new();
        panel.apply(1, &json!({"1": [{"a": 1}]})).unwrap();

        assert!(matches!(
            panel.apply(1, &json!({"7": []})),
            Err(InspectError::MissingDevice(1))
        ));
        assert!(matches!(
            panel.apply(1, &json!({"1": {"a": 1}})),
            Err(InspectError::NotAList(1))
        ));
        assert_eq!(panel.entries().len(), 1);
        assert_eq!(panel.generation(), 1);
    }
}
