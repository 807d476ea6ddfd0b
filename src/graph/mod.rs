//! Graph construction
//!
//! - [`Classifier`] turns inventory elements into [`GraphNode`]s
//! - [`NodeList`] owns the nodes of a run, assigns their ids and computes
//!   links with [`LinkBuilder`]
//! - [`ChannelNaming`] maps node fields to archiver channel names
//! - the codec functions read and write the `nodes.json` replay file

mod channel;
mod classifier;
mod codec;
mod links;
mod node;

pub use channel::{ChannelNaming, ExceptionRule, ExceptionTable, NameMatcher, XPSET8_FIELD};
pub use classifier::{ClassRule, Classifier};
pub use codec::{
    decode_node, decode_nodes, encode_node, encode_nodes, read_nodes, write_nodes, NodeFile,
    NodeRecord, NODE_FILE_VERSION,
};
pub use links::{LinkBuilder, NodeList};
pub use node::{GraphNode, NodeId, NodeKind};
