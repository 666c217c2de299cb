//! The node tree: discovered models paired with their in-progress output
//! fragments.
//!
//! Nodes live in an arena owned by the run's shared storage; the tree refers
//! to them by [`NodeId`]. [`NodePath`] is an immutable cons list from the
//! document root down to a node, cheap to extend during traversal and
//! walkable upward in O(depth) for context-sensitive checks.

use std::rc::Rc;

use crate::document::{Operation, Schema, Tag};
use crate::model::Model;

/// Index of a node within the run's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

/// The mutable output fragment a node carries.
///
/// Plugins fill these in during enter/exit; the document assembler collects
/// the finished pieces.
#[derive(Debug, Clone)]
pub enum Fragment {
    /// The synthetic document root.
    Root,
    /// An endpoint tag entry.
    Tag(Tag),
    /// An operation under construction, keyed by its path string.
    Operation { path: String, operation: Operation },
    /// An entity schema under construction, keyed by its canonical name.
    Schema { name: String, schema: Schema },
    /// A single property entry, attached to the parent schema on exit.
    Property { name: String, schema: Schema, required: bool },
    /// A bare reference to an already-expanded identity; never re-expanded.
    Reference { target: String },
}

/// A discovered model paired with its fragment and structural children.
#[derive(Debug)]
pub struct Node {
    pub model: Model,
    pub fragment: Fragment,
    pub children: Vec<NodeId>,
    /// True when this node is a reference to an identity expanded elsewhere.
    pub is_reference: bool,
}

impl Node {
    pub fn new(model: Model, fragment: Fragment) -> Self {
        Self { model, fragment, children: Vec::new(), is_reference: false }
    }

    pub fn reference(model: Model, target: String) -> Self {
        Self {
            model,
            fragment: Fragment::Reference { target },
            children: Vec::new(),
            is_reference: true,
        }
    }
}

/// Arena owning every node created during one run.
///
/// Nodes are never removed before the run ends, so ids stay valid for the
/// whole traversal.
#[derive(Default)]
pub struct NodeArena {
    nodes: Vec<Node>,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub fn add_child(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[parent.0].children.push(child);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

struct PathLink {
    id: NodeId,
    label: String,
    parent: NodePath,
}

/// Immutable path from the document root to a node.
#[derive(Clone)]
pub struct NodePath {
    head: Option<Rc<PathLink>>,
}

impl NodePath {
    /// The path consisting of just the root node.
    pub fn root(id: NodeId, label: impl Into<String>) -> Self {
        NodePath { head: None }.child(id, label)
    }

    /// Extends the path downward by one node.
    pub fn child(&self, id: NodeId, label: impl Into<String>) -> Self {
        NodePath {
            head: Some(Rc::new(PathLink {
                id,
                label: label.into(),
                parent: self.clone(),
            })),
        }
    }

    /// The node this path ends at.
    pub fn node_id(&self) -> NodeId {
        self.head.as_ref().expect("empty node path").id
    }

    pub fn label(&self) -> &str {
        &self.head.as_ref().expect("empty node path").label
    }

    pub fn parent(&self) -> Option<&NodePath> {
        let link = self.head.as_ref()?;
        if link.parent.head.is_some() {
            Some(&link.parent)
        } else {
            None
        }
    }

    /// Labels from the root down to this node, for error chains.
    pub fn chain(&self) -> Vec<String> {
        let mut labels = Vec::new();
        let mut current = Some(self);
        while let Some(path) = current {
            labels.push(path.label().to_string());
            current = path.parent();
        }
        labels.reverse();
        labels
    }

    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut current = Some(self);
        while let Some(path) = current {
            depth += 1;
            current = path.parent();
        }
        depth
    }
}

/// Result of scanning a node: its structural children plus extra required
/// models that are not directly nested (signature references, exposed
/// supertypes).
#[derive(Debug, Default)]
pub struct NodeDependencies {
    pub children: Vec<Model>,
    pub extras: Vec<Model>,
}
