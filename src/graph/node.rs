//! Graph nodes

use super::channel::ChannelNaming;
use crate::expr::Modifiers;
use crate::sampler::SampleBatch;
use crate::types::{Element, SampleRow, EPICS_NAME_PROPERTY, UNDEFINED};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a node within its [`NodeList`](super::NodeList).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Id of the node at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` does not fit in a `u32`. A [`NodeList`](super::NodeList)
    /// holds at most `u32::MAX + 1` nodes.
    #[inline]
    pub fn from_index(index: usize) -> Self {
        match u32::try_from(index) {
            Ok(id) => NodeId(id),
            Err(_) => panic!("node index {} exceeds the u32 id range", index),
        }
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role of a node in the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Control input
    Setpoint,
    /// Measured value
    Readback,
    /// Synthetic node linking to every setpoint
    Master,
}

/// One element of the graph with its sampled channels
#[derive(Debug, Clone)]
pub struct GraphNode {
    element: Element,
    kind: NodeKind,
    /// Configured type name the element matched
    type_name: String,
    /// Sorted field suffixes
    fields: Vec<String>,
    /// Channel per attribute column, in field order
    field_channels: Vec<String>,
    /// Attribute label per column, in field order
    field_labels: Vec<String>,
    /// Sorted, deduplicated channel names
    channels: Vec<String>,
    samples: Option<Vec<SampleRow>>,
    node_id: Option<NodeId>,
    downstream: Vec<NodeId>,
}

impl GraphNode {
    /// Create a setpoint or readback node sampling `fields`
    pub fn new(
        element: Element,
        kind: NodeKind,
        type_name: impl Into<String>,
        mut fields: Vec<String>,
        naming: &ChannelNaming,
    ) -> Self {
        fields.sort();
        let field_channels: Vec<String> = fields
            .iter()
            .map(|field| naming.channel_name(&element, field))
            .collect();
        let field_labels = fields
            .iter()
            .map(|field| naming.label(field).to_string())
            .collect();
        Self::assemble(element, kind, type_name.into(), fields, field_channels, field_labels)
    }

    /// Create the master node; its attributes are the given channels
    pub fn master(name: impl Into<String>, channels: Vec<String>) -> Self {
        let name = name.into();
        let mut channels = channels;
        channels.sort();
        channels.dedup();
        Self::assemble(
            Element::new(name.clone(), "Master"),
            NodeKind::Master,
            name,
            Vec::new(),
            channels.clone(),
            channels,
        )
    }

    fn assemble(
        element: Element,
        kind: NodeKind,
        type_name: String,
        fields: Vec<String>,
        field_channels: Vec<String>,
        field_labels: Vec<String>,
    ) -> Self {
        let mut channels = field_channels.clone();
        channels.sort();
        channels.dedup();
        Self {
            element,
            kind,
            type_name,
            fields,
            field_channels,
            field_labels,
            channels,
            samples: None,
            node_id: None,
            downstream: Vec::new(),
        }
    }

    pub fn element(&self) -> &Element {
        &self.element
    }

    pub fn name(&self) -> &str {
        &self.element.name
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn is_setpoint(&self) -> bool {
        self.kind == NodeKind::Setpoint
    }

    pub fn is_master(&self) -> bool {
        self.kind == NodeKind::Master
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    pub fn node_id(&self) -> Option<NodeId> {
        self.node_id
    }

    pub(crate) fn set_node_id(&mut self, id: NodeId) {
        self.node_id = Some(id);
    }

    pub fn downstream(&self) -> &[NodeId] {
        &self.downstream
    }

    pub(crate) fn set_downstream(&mut self, downstream: Vec<NodeId>) {
        self.downstream = downstream;
    }

    // ==================== Samples ====================

    pub fn samples(&self) -> Option<&[SampleRow]> {
        self.samples.as_deref()
    }

    /// Replace the cached samples, e.g. with rows loaded from a replay file
    pub fn set_samples(&mut self, rows: Vec<SampleRow>) {
        self.samples = Some(rows);
    }

    /// Take this node's channels from `batch` unless samples are already cached
    pub fn attach_samples(&mut self, batch: &SampleBatch) -> bool {
        if self.samples.is_some() {
            return false;
        }
        self.samples = Some(batch.project(&self.channels));
        true
    }

    /// First sample row at `timestamp`
    pub fn value_at(&self, timestamp: NaiveDateTime) -> Option<&SampleRow> {
        self.samples()?.iter().find(|row| row.timestamp == timestamp)
    }

    // ==================== Attributes ====================

    /// Property names used as attributes: all but `EPICSName`, sorted
    fn property_names(&self) -> impl Iterator<Item = &String> {
        self.element
            .properties
            .keys()
            .filter(|name| name.as_str() != EPICS_NAME_PROPERTY)
    }

    /// Attribute labels: properties followed by field labels
    pub fn attribute_names(&self) -> Vec<String> {
        self.property_names()
            .cloned()
            .chain(self.field_labels.iter().cloned())
            .collect()
    }

    /// Attribute values for sample row `index`.
    ///
    /// Channels without a value at `index` read as [`UNDEFINED`]; modifiers
    /// apply to channel values only.
    pub fn attribute_values(&self, index: usize, modifiers: &Modifiers) -> Vec<String> {
        let row = self.samples().and_then(|rows| rows.get(index));
        let properties = self
            .property_names()
            .map(|name| self.element.properties[name].clone());
        let channel_values = self.field_channels.iter().map(|channel| {
            let raw = row.map(|r| r.value(channel)).unwrap_or(UNDEFINED);
            modifiers.apply(channel, raw)
        });
        properties.chain(channel_values).collect()
    }
}

impl fmt::Display for GraphNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.node_id {
            Some(id) => write!(f, "{}\t{}\t{}", id, self.name(), self.type_name),
            None => write!(f, "-\t{}\t{}", self.name(), self.type_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::parse_timestamp;
    use std::collections::BTreeMap;

    fn quad() -> GraphNode {
        let element = Element::new("MQB0L09", "QB")
            .with_property("S", "12.5")
            .with_property("EPICSName", "MQB0L09")
            .with_property("Housed_by", "0L09");
        GraphNode::new(
            element,
            NodeKind::Setpoint,
            "Quad",
            vec![".S".to_string(), ".BDL".to_string()],
            &ChannelNaming::default(),
        )
    }

    fn row(ts: &str, values: &[(&str, &str)]) -> SampleRow {
        let mut row = SampleRow::new(parse_timestamp(ts).unwrap());
        for (k, v) in values {
            row.values.insert(k.to_string(), v.to_string());
        }
        row
    }

    #[test]
    fn test_node_id_from_index() {
        assert_eq!(NodeId::from_index(7), NodeId(7));
        assert_eq!(NodeId::from_index(u32::MAX as usize).index(), u32::MAX as usize);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    #[should_panic(expected = "exceeds the u32 id range")]
    fn test_node_id_out_of_range() {
        NodeId::from_index(u32::MAX as usize + 1);
    }

    #[test]
    fn test_fields_and_channels_sorted() {
        let node = quad();
        assert_eq!(node.fields(), &[".BDL", ".S"]);
        assert_eq!(node.channels(), &["MQB0L09.BDL", "MQB0L09.S"]);
    }

    #[test]
    fn test_attribute_names_skip_epics_name() {
        let node = quad();
        assert_eq!(node.attribute_names(), vec!["Housed_by", "S", ".BDL", ".S"]);
    }

    #[test]
    fn test_attribute_values_at_index() {
        let mut node = quad();
        node.set_samples(vec![
            row("2021-11-10 00:00", &[("MQB0L09.BDL", "405.9"), ("MQB0L09.S", "1")]),
            row("2021-11-10 01:00", &[("MQB0L09.BDL", "406.1")]),
        ]);
        let modifiers = Modifiers::default();
        assert_eq!(
            node.attribute_values(0, &modifiers),
            vec!["0L09", "12.5", "405.9", "1"]
        );
        assert_eq!(
            node.attribute_values(1, &modifiers),
            vec!["0L09", "12.5", "406.1", UNDEFINED]
        );
        assert_eq!(node.attribute_values(7, &modifiers)[2], UNDEFINED);
    }

    #[test]
    fn test_modifier_applies_to_channel() {
        let mut node = quad();
        node.set_samples(vec![row("2021-11-10", &[("MQB0L09.BDL", "2"), ("MQB0L09.S", "3")])]);
        let mut formulas = BTreeMap::new();
        formulas.insert("MQB0L09.BDL".to_string(), "$(MQB0L09.BDL) * 10".to_string());
        let modifiers = Modifiers::new(formulas);
        assert_eq!(node.attribute_values(0, &modifiers), vec!["0L09", "12.5", "20", "3"]);
    }

    #[test]
    fn test_value_at() {
        let mut node = quad();
        assert!(node.value_at(parse_timestamp("2021-11-10").unwrap()).is_none());
        node.set_samples(vec![
            row("2021-11-10 00:00", &[("MQB0L09.BDL", "1")]),
            row("2021-11-10 01:00", &[("MQB0L09.BDL", "2")]),
        ]);
        let found = node.value_at(parse_timestamp("2021-11-10 01:00").unwrap()).unwrap();
        assert_eq!(found.value("MQB0L09.BDL"), "2");
    }

    #[test]
    fn test_attach_samples_once() {
        let mut node = quad();
        let mut batch = SampleBatch::new();
        batch.merge(
            vec![row("2021-11-10", &[("MQB0L09.BDL", "1"), ("OTHER", "x")])],
            &["MQB0L09.BDL".to_string(), "OTHER".to_string()],
        );
        assert!(node.attach_samples(&batch));
        let rows = node.samples().unwrap();
        assert_eq!(rows[0].values.len(), 2);
        assert_eq!(rows[0].value("MQB0L09.S"), UNDEFINED);
        assert!(!rows[0].values.contains_key("OTHER"));

        let mut other = SampleBatch::new();
        other.merge(vec![row("2021-11-11", &[])], &[]);
        assert!(!node.attach_samples(&other));
        assert_eq!(node.samples().unwrap()[0].value("MQB0L09.BDL"), "1");
    }

    #[test]
    fn test_display() {
        let mut node = quad();
        assert_eq!(node.to_string(), "-\tMQB0L09\tQuad");
        node.set_node_id(NodeId(4));
        assert_eq!(node.to_string(), "4\tMQB0L09\tQuad");
    }

    #[test]
    fn test_master_node() {
        let node = GraphNode::master("MASTER", vec!["B".to_string(), "A".to_string()]);
        assert!(node.is_master());
        assert!(node.fields().is_empty());
        assert_eq!(node.channels(), &["A", "B"]);
        assert_eq!(node.attribute_names(), vec!["A", "B"]);
    }
}
