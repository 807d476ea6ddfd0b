//! Inventory type hierarchy
//!
//! The inventory catalog organizes element types in a tree, e.g.
//!
//! ```text
//! BeamElem
//! +-- Magnet
//! |   +-- Quad
//! |   |   +-- QB
//! |   +-- Dipole
//! +-- IOC
//!     +-- PC104
//! ```
//!
//! Config files name generic types (`Magnet`) while elements carry specific
//! ones (`QB`); [`TypeHierarchy::is_descendant`] bridges the two. The tree is
//! fetched on first use and kept for the lifetime of the resolver. The cache
//! belongs to one [`TypeHierarchy`], not the process; a run builds a single
//! resolver, so the CLI fetches the tree at most once.

use crate::error::{GraphError, Result};
use crate::service::TypeTreeSource;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// One entry of the type tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeNode {
    pub name: String,
    /// `None` for terminal types
    pub children: Option<Vec<TypeNode>>,
}

impl TypeNode {
    pub fn leaf(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: None,
        }
    }

    pub fn branch(name: impl Into<String>, children: Vec<TypeNode>) -> Self {
        Self {
            name: name.into(),
            children: Some(children),
        }
    }
}

/// The full type tree, stored in the catalog's key order.
///
/// Serialized as nested JSON objects: a branch maps to an object of its
/// children, a terminal type maps to `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "serde_json::Value", into = "serde_json::Value")]
pub struct TypeTree {
    roots: Vec<TypeNode>,
}

impl TypeTree {
    pub fn new(roots: Vec<TypeNode>) -> Self {
        Self { roots }
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Root-to-node path of type names for the first node named `type_name`.
    ///
    /// Names compare case-insensitively. When the tree holds the same name on
    /// several branches, the first one in depth-first order wins.
    pub fn lineage(&self, type_name: &str) -> Option<Vec<String>> {
        let mut path = Vec::new();
        if Self::search(&self.roots, type_name, &mut path) {
            Some(path)
        } else {
            None
        }
    }

    fn search(nodes: &[TypeNode], type_name: &str, path: &mut Vec<String>) -> bool {
        for node in nodes {
            path.push(node.name.clone());
            if node.name.eq_ignore_ascii_case(type_name) {
                return true;
            }
            if let Some(ref children) = node.children {
                if Self::search(children, type_name, path) {
                    return true;
                }
            }
            path.pop();
        }
        false
    }

    fn nodes_from_json(map: serde_json::Map<String, serde_json::Value>) -> Vec<TypeNode> {
        map.into_iter()
            .map(|(name, value)| match value {
                serde_json::Value::Object(children) => {
                    TypeNode::branch(name, Self::nodes_from_json(children))
                }
                _ => TypeNode::leaf(name),
            })
            .collect()
    }

    fn nodes_to_json(nodes: Vec<TypeNode>) -> serde_json::Value {
        let map = nodes
            .into_iter()
            .map(|node| {
                let value = match node.children {
                    Some(children) => Self::nodes_to_json(children),
                    None => serde_json::Value::Null,
                };
                (node.name, value)
            })
            .collect();
        serde_json::Value::Object(map)
    }
}

impl TryFrom<serde_json::Value> for TypeTree {
    type Error = GraphError;

    fn try_from(value: serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::Object(map) => Ok(Self::new(Self::nodes_from_json(map))),
            other => Err(GraphError::Parse(format!(
                "Type tree must be a JSON object, got {}",
                other
            ))),
        }
    }
}

impl From<TypeTree> for serde_json::Value {
    fn from(tree: TypeTree) -> Self {
        TypeTree::nodes_to_json(tree.roots)
    }
}

/// Answers "is type A a descendant of type B" against a lazily fetched tree
pub struct TypeHierarchy {
    source: Option<Box<dyn TypeTreeSource>>,
    tree: OnceLock<TypeTree>,
}

impl TypeHierarchy {
    /// Create a resolver that fetches the tree from `source` on first use
    pub fn new(source: Box<dyn TypeTreeSource>) -> Self {
        Self {
            source: Some(source),
            tree: OnceLock::new(),
        }
    }

    /// Create a resolver over an already loaded tree
    pub fn with_tree(tree: TypeTree) -> Self {
        Self {
            source: None,
            tree: OnceLock::from(tree),
        }
    }

    /// The tree, fetching it if this is the first access
    pub fn tree(&self) -> Result<&TypeTree> {
        if let Some(tree) = self.tree.get() {
            return Ok(tree);
        }
        let source = self.source.as_ref().ok_or_else(|| {
            GraphError::Config("Type hierarchy has neither a tree nor a source".to_string())
        })?;
        tracing::info!("Fetching type hierarchy");
        let fetched = source.fetch_type_tree()?;
        Ok(self.tree.get_or_init(|| fetched))
    }

    /// The tree if it has been loaded, without fetching
    pub fn cached(&self) -> Option<&TypeTree> {
        self.tree.get()
    }

    /// Lineage of `type_name`, failing if it is not in the tree
    pub fn lineage(&self, type_name: &str) -> Result<Vec<String>> {
        self.tree()?
            .lineage(type_name)
            .ok_or_else(|| GraphError::TypeNotFound(type_name.to_string()))
    }

    /// Whether `candidate` is `ancestor` or one of its descendants
    pub fn is_descendant(&self, ancestor: &str, candidate: &str) -> Result<bool> {
        Ok(self
            .lineage(candidate)?
            .iter()
            .any(|name| name.eq_ignore_ascii_case(ancestor)))
    }
}

impl std::fmt::Debug for TypeHierarchy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeHierarchy")
            .field("loaded", &self.tree.get().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn sample_tree() -> TypeTree {
        serde_json::from_str(
            r#"{
                "BeamElem": {
                    "Magnet": {"Quad": {"QB": null, "QD": null}, "Dipole": null},
                    "BPM": null
                },
                "IOC": {"PC104": null}
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_is_descendant() {
        let hierarchy = TypeHierarchy::with_tree(sample_tree());
        assert!(hierarchy.is_descendant("Magnet", "Quad").unwrap());
        assert!(hierarchy.is_descendant("magnet", "qb").unwrap());
        assert!(!hierarchy.is_descendant("IOC", "Dipole").unwrap());
        assert!(hierarchy.is_descendant("IOC", "IOC").unwrap());
        assert!(hierarchy.is_descendant("IOC", "PC104").unwrap());
    }

    #[test]
    fn test_lineage_path() {
        let tree = sample_tree();
        assert_eq!(
            tree.lineage("QD").unwrap(),
            vec!["BeamElem", "Magnet", "Quad", "QD"]
        );
        assert_eq!(tree.lineage("IOC").unwrap(), vec!["IOC"]);
        assert!(tree.lineage("Klystron").is_none());
    }

    #[test]
    fn test_missing_type_is_error() {
        let hierarchy = TypeHierarchy::with_tree(sample_tree());
        let err = hierarchy.is_descendant("Magnet", "Klystron").unwrap_err();
        assert!(matches!(err, GraphError::TypeNotFound(ref t) if t == "Klystron"));
    }

    #[test]
    fn test_duplicate_names_first_branch_wins() {
        let tree: TypeTree =
            serde_json::from_str(r#"{"A": {"Shared": null}, "B": {"Shared": null}}"#).unwrap();
        assert_eq!(tree.lineage("Shared").unwrap(), vec!["A", "Shared"]);
    }

    #[test]
    fn test_json_round_trip() {
        let tree = sample_tree();
        let json = serde_json::to_string(&tree).unwrap();
        let back: TypeTree = serde_json::from_str(&json).unwrap();
        assert_eq!(tree, back);
    }

    struct CountingSource {
        calls: Arc<AtomicUsize>,
    }

    impl TypeTreeSource for CountingSource {
        fn fetch_type_tree(&self) -> Result<TypeTree> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(sample_tree())
        }
    }

    #[test]
    fn test_tree_fetched_lazily_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let hierarchy = TypeHierarchy::new(Box::new(CountingSource {
            calls: calls.clone(),
        }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        hierarchy.is_descendant("Magnet", "QB").unwrap();
        hierarchy.is_descendant("IOC", "PC104").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
