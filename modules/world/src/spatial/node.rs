use smallvec::SmallVec;

use dynacoe::math::prelude::*;

use super::transform::Transform;
use crate::NodeId;

pub type NodeList = SmallVec<[NodeId; 4]>;

/// `Node` keeps the local transform of an object together with its links in
/// the hierarchy and the cached matrices.
///
/// A node has up to two parents. `parent` is the regular hierarchy link, while
/// `manual_parent` overrides it for nodes owned by something outside the
/// hierarchy. Every access goes through the `Nodes` arena.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) transform: Transform,

    pub(crate) parent: Option<NodeId>,
    pub(crate) children: NodeList,
    pub(crate) manual_parent: Option<NodeId>,
    pub(crate) manual_children: NodeList,

    pub(crate) local: Matrix4<f32>,
    pub(crate) global: Matrix4<f32>,
    pub(crate) local_valid: bool,
    pub(crate) parent_valid: bool,
}

impl Default for Node {
    fn default() -> Self {
        Node {
            transform: Transform::default(),
            parent: None,
            children: NodeList::new(),
            manual_parent: None,
            manual_children: NodeList::new(),
            local: Matrix4::identity(),
            global: Matrix4::identity(),
            local_valid: false,
            parent_valid: false,
        }
    }
}

impl Node {
    /// The parent whose global transform this node is relative to.
    #[inline]
    pub fn effective_parent(&self) -> Option<NodeId> {
        self.manual_parent.or(self.parent)
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.local_valid && self.parent_valid
    }

    #[inline]
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// Hierarchy children followed by manual children.
    pub(crate) fn dependents(&self) -> NodeList {
        self.children
            .iter()
            .chain(self.manual_children.iter())
            .cloned()
            .collect()
    }
}
