//! Node replay file format
//!
//! `nodes.json` holds a versioned list of node records, each with its
//! element, classification and sampled rows:
//!
//! ```json
//! {"version": 1, "nodes": [
//!   {"element": {...}, "kind": "setpoint", "type_name": "Quad",
//!    "fields": [".BDL"], "samples": [{"date": "...", "values": {...}}]}
//! ]}
//! ```
//!
//! Channel names are not stored; they are rebuilt from the fields with the
//! current naming settings. Master records store their channel list.

use super::channel::ChannelNaming;
use super::links::NodeList;
use super::node::{GraphNode, NodeKind};
use crate::error::{GraphError, Result, ResultExt};
use crate::types::{Element, SampleRow};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Current `nodes.json` schema version
pub const NODE_FILE_VERSION: u32 = 1;

/// Serialized form of one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub element: Element,
    pub kind: NodeKind,
    pub type_name: String,
    #[serde(default)]
    pub fields: Vec<String>,
    /// Only present for master nodes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub channels: Vec<String>,
    #[serde(default)]
    pub samples: Vec<SampleRow>,
}

/// Top level of `nodes.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeFile {
    pub version: u32,
    pub nodes: Vec<NodeRecord>,
}

/// Record for one node, including its cached samples
pub fn encode_node(node: &GraphNode) -> NodeRecord {
    NodeRecord {
        element: node.element().clone(),
        kind: node.kind(),
        type_name: node.type_name().to_string(),
        fields: node.fields().to_vec(),
        channels: if node.is_master() {
            node.channels().to_vec()
        } else {
            Vec::new()
        },
        samples: node.samples().map(<[SampleRow]>::to_vec).unwrap_or_default(),
    }
}

/// Rebuild a node with its samples pre-loaded
pub fn decode_node(record: NodeRecord, naming: &ChannelNaming) -> GraphNode {
    let mut node = match record.kind {
        NodeKind::Master => GraphNode::master(record.element.name, record.channels),
        kind => GraphNode::new(record.element, kind, record.type_name, record.fields, naming),
    };
    node.set_samples(record.samples);
    node
}

pub fn encode_nodes(nodes: &NodeList) -> NodeFile {
    NodeFile {
        version: NODE_FILE_VERSION,
        nodes: nodes.iter().map(encode_node).collect(),
    }
}

/// Decode a node file, rejecting unknown versions. Ids follow file order.
pub fn decode_nodes(file: NodeFile, naming: &ChannelNaming) -> Result<NodeList> {
    if file.version != NODE_FILE_VERSION {
        return Err(GraphError::Serialization(format!(
            "Unsupported node file version {} (expected {})",
            file.version, NODE_FILE_VERSION
        )));
    }
    Ok(NodeList::new(
        file.nodes
            .into_iter()
            .map(|record| decode_node(record, naming))
            .collect(),
    ))
}

pub fn write_nodes(path: &Path, nodes: &NodeList) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &encode_nodes(nodes))
        .map_err(|e| GraphError::Serialization(e.to_string()))?;
    writer.flush()?;
    Ok(())
}

pub fn read_nodes(path: &Path, naming: &ChannelNaming) -> Result<NodeList> {
    let file = File::open(path)
        .map_err(GraphError::from)
        .with_context(|| format!("Opening {:?}", path))?;
    let node_file: NodeFile = serde_json::from_reader(BufReader::new(file))
        .map_err(GraphError::from)
        .with_context(|| format!("Reading {:?}", path))?;
    decode_nodes(node_file, naming)
}
