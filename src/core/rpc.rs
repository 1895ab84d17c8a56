//! JSON-RPC style envelope spoken on the topology feed.
//!
//! Inbound: `{"id": 1, "method": "event_link_add", "params": [...]}`.
//! Outbound: `{"id": 1, "jsonrpc": "2.0", "result": ""}`.
//!
//! The method table is the [`RpcCall`] enum: each known method name decodes
//! its params into one variant, anything else is rejected.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::dpid::Dpid;
use crate::topology::{Change, Link, Port, Topology};

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unknown method {0:?}")]
    UnknownMethod(String),
    #[error("invalid params for {method}: {source}")]
    InvalidParams {
        method: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RpcId {
    Number(serde_json::Number),
    Text(String),
}

/// A switch record as the backend sends it. Extra fields are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchParams {
    pub dpid: Dpid,
    #[serde(default)]
    pub ports: Vec<Port>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RpcCall {
    AddNode(SwitchParams),
    UpdateNode(SwitchParams),
    RemoveNode(SwitchParams),
    AddLink(Link),
    RemoveLink(Link),
    SwitchEnter(Vec<SwitchParams>),
    SwitchLeave(Vec<SwitchParams>),
    LinkAdd(Vec<Link>),
    LinkDelete(Vec<Link>),
}

fn params<T: DeserializeOwned>(method: &str, params: Value) -> Result<T, RpcError> {
    serde_json::from_value(params).map_err(|source| RpcError::InvalidParams {
        method: method.to_string(),
        source,
    })
}

impl RpcCall {
    pub fn decode(method: &str, p: Value) -> Result<Self, RpcError> {
        let call = match method {
            "add_node" => RpcCall::AddNode(params(method, p)?),
            "update_node" => RpcCall::UpdateNode(params(method, p)?),
            "remove_node" => RpcCall::RemoveNode(params(method, p)?),
            "add_link" => RpcCall::AddLink(params(method, p)?),
            "remove_link" => RpcCall::RemoveLink(params(method, p)?),
            "event_switch_enter" => RpcCall::SwitchEnter(params(method, p)?),
            "event_switch_leave" => RpcCall::SwitchLeave(params(method, p)?),
            "event_link_add" => RpcCall::LinkAdd(params(method, p)?),
            "event_link_delete" => RpcCall::LinkDelete(params(method, p)?),
            other => return Err(RpcError::UnknownMethod(other.to_string())),
        };
        Ok(call)
    }

    pub fn method(&self) -> &'static str {
        match self {
            RpcCall::AddNode(_) => "add_node",
            RpcCall::UpdateNode(_) => "update_node",
            RpcCall::RemoveNode(_) => "remove_node",
            RpcCall::AddLink(_) => "add_link",
            RpcCall::RemoveLink(_) => "remove_link",
            RpcCall::SwitchEnter(_) => "event_switch_enter",
            RpcCall::SwitchLeave(_) => "event_switch_leave",
            RpcCall::LinkAdd(_) => "event_link_add",
            RpcCall::LinkDelete(_) => "event_link_delete",
        }
    }

    /// Run the handler against the store.
    pub fn apply(self, topo: &mut Topology) -> Change {
        match self {
            RpcCall::AddNode(s) => topo.add_node(s.dpid, s.ports),
            RpcCall::UpdateNode(s) => topo.update_node(s.dpid, s.ports),
            RpcCall::RemoveNode(s) => topo.remove_node(&s.dpid),
            RpcCall::AddLink(l) => topo.add_link(l),
            RpcCall::RemoveLink(l) => topo.remove_link(l),
            RpcCall::SwitchEnter(switches) => switches
                .into_iter()
                .fold(Change::None, |c, s| c.merge(topo.add_node(s.dpid, s.ports))),
            RpcCall::SwitchLeave(switches) => switches
                .into_iter()
                .fold(Change::None, |c, s| c.merge(topo.remove_node(&s.dpid))),
            RpcCall::LinkAdd(links) => links
                .into_iter()
                .fold(Change::None, |c, l| c.merge(topo.add_link(l))),
            RpcCall::LinkDelete(links) => links
                .into_iter()
                .fold(Change::None, |c, l| c.merge(topo.remove_link(l))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    id: RpcId,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RpcRequest {
    pub id: RpcId,
    pub call: RpcCall,
}

/// Decode one inbound text frame.
pub fn decode_frame(text: &str) -> Result<RpcRequest, RpcError> {
    let raw: RawEnvelope = serde_json::from_str(text)?;
    let call = RpcCall::decode(&raw.method, raw.params)?;
    Ok(RpcRequest { id: raw.id, call })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpcReply {
    pub id: RpcId,
    pub jsonrpc: &'static str,
    pub result: Value,
}

impl RpcReply {
    pub fn new(id: RpcId, result: Value) -> Self {
        Self {
            id,
            jsonrpc: "2.0",
            result,
        }
    }

    pub fn to_json(&self) -> Result<String, RpcError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_singular_methods() {
        let req = decode_frame(r#"{"id":1,"method":"add_node","params":{"dpid":"0000000000000001"}}"#)
            .unwrap();
        assert_eq!(req.id, RpcId::Number(serde_json::Number::from(1u64)));
        match req.call {
            RpcCall::AddNode(s) => {
                assert_eq!(s.dpid.value(), 1);
                assert!(s.ports.is_empty());
            }
            other => panic!("unexpected call {:?}", other),
        }
    }

    #[test]
    fn decodes_backend_events() {
        let frame = r#"{"id":"7","method":"event_link_add","params":[
            {"src":{"dpid":"0000000000000002","port_no":"00000001","hw_addr":"aa","name":"s2-eth1"},
             "dst":{"dpid":"0000000000000001","port_no":"00000002","hw_addr":"bb","name":"s1-eth2"}}
        ]}"#;
        let req = decode_frame(frame).unwrap();
        assert_eq!(req.id, RpcId::Text("7".to_string()));
        assert_eq!(req.call.method(), "event_link_add");

        let mut topo = Topology::new();
        topo.add_node(Dpid::from_int(1), vec![]);
        topo.add_node(Dpid::from_int(2), vec![]);
        assert_eq!(req.call.apply(&mut topo), Change::Structure);
        assert_eq!(topo.links()[0].src.dpid.value(), 1);
    }

    #[test]
    fn switch_enter_carries_ports() {
        let frame = r#"{"id":3,"method":"event_switch_enter","params":[
            {"dpid":"0000000000000001","ports":[{"dpid":"0000000000000001","port_no":"00000001","hw_addr":"x","name":"s1-eth1"}]}
        ]}"#;
        let mut topo = Topology::new();
        decode_frame(frame).unwrap().call.apply(&mut topo);
        let node = topo.node(&Dpid::from_int(1)).unwrap();
        assert_eq!(node.ports[0].name.as_deref(), Some("s1-eth1"));
    }

    #[test]
    fn rejects_unknown_and_malformed() {
        assert!(matches!(
            decode_frame(r#"{"id":1,"method":"reboot","params":{}}"#),
            Err(RpcError::UnknownMethod(m)) if m == "reboot"
        ));
        assert!(matches!(
            decode_frame(r#"{"id":1,"method":"add_node","params":{"dpid":"xyz"}}"#),
            Err(RpcError::InvalidParams { .. })
        ));
        assert!(matches!(decode_frame("{not json"), Err(RpcError::Malformed(_))));
        assert!(matches!(
            decode_frame(r#"{"method":"add_node"}"#),
            Err(RpcError::Malformed(_))
        ));
    }

    #[test]
    fn reply_echoes_id() {
        let reply = RpcReply::new(RpcId::Text("abc".into()), Value::String(String::new()));
        assert_eq!(
            reply.to_json().unwrap(),
            r#"{"id":"abc","jsonrpc":"2.0","result":""}"#
        );
    }
}
