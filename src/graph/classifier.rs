//! Element classification
//!
//! Elements become nodes by matching an ordered rule table against the
//! type hierarchy. Setpoint rules are tried before readback rules, each in
//! config order; the first rule whose type is an ancestor of (or equal to)
//! the element's type decides the node kind, type name and fields.

use super::channel::ChannelNaming;
use super::node::{GraphNode, NodeKind};
use crate::config::{MasterConfig, NodesConfig, TypeFieldTable};
use crate::error::Result;
use crate::hierarchy::TypeHierarchy;
use crate::types::Element;

/// One classification rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassRule {
    pub kind: NodeKind,
    pub type_name: String,
    pub fields: Vec<String>,
}

/// Ordered rules plus channel naming settings
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: Vec<ClassRule>,
    naming: ChannelNaming,
}

impl Classifier {
    pub fn new(rules: Vec<ClassRule>, naming: ChannelNaming) -> Self {
        Self { rules, naming }
    }

    pub fn from_config(config: &NodesConfig) -> Self {
        let mut rules = Vec::new();
        Self::push_rules(&mut rules, NodeKind::Setpoint, &config.setpoints);
        Self::push_rules(&mut rules, NodeKind::Readback, &config.readbacks);
        Self::new(rules, ChannelNaming::from_config(config))
    }

    fn push_rules(rules: &mut Vec<ClassRule>, kind: NodeKind, table: &TypeFieldTable) {
        rules.extend(table.iter().map(|entry| ClassRule {
            kind,
            type_name: entry.type_name.clone(),
            fields: entry.fields.clone(),
        }));
    }

    pub fn rules(&self) -> &[ClassRule] {
        &self.rules
    }

    pub fn naming(&self) -> &ChannelNaming {
        &self.naming
    }

    /// Build a node for `element`, or `None` when no rule matches.
    ///
    /// Fails if the element's type is missing from the hierarchy.
    pub fn classify(
        &self,
        element: &Element,
        hierarchy: &TypeHierarchy,
    ) -> Result<Option<GraphNode>> {
        for rule in &self.rules {
            if hierarchy.is_descendant(&rule.type_name, &element.type_name)? {
                return Ok(Some(GraphNode::new(
                    element.clone(),
                    rule.kind,
                    rule.type_name.clone(),
                    rule.fields.clone(),
                    &self.naming,
                )));
            }
        }
        Ok(None)
    }

    /// The master node described by `config`
    pub fn master_node(&self, config: &MasterConfig) -> GraphNode {
        GraphNode::master(config.name.clone(), config.channels.clone())
    }
}
