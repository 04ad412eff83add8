use dynacoe::math;
use dynacoe::math::prelude::*;
use dynacoe::utils::Table;
use dynacoe::video::prelude::{RenderBufferId, Renderer, MODEL_FLOATS};

use super::node::{Node, NodeList};
use super::transform::Transform;
use crate::{NodeId, Result};

/// An arena of transform nodes.
///
/// Mutating a node only flags it and its descendants. Matrices are computed on
/// the first query afterwards: the queried node resolves its ancestors first,
/// and once a node is recomputed every node below it is recomputed as well.
#[derive(Default)]
pub struct Nodes {
    nodes: Table<NodeId, Node>,
}

impl Nodes {
    pub fn new() -> Self {
        Nodes { nodes: Table::new() }
    }

    /// Creates a root node with identity transform.
    pub fn create(&mut self) -> NodeId {
        self.nodes.insert(Node::default())
    }

    /// Removes a node. Its children become roots.
    pub fn remove(&mut self, id: NodeId) -> bool {
        let node = match self.nodes.remove(id) {
            Some(node) => node,
            None => return false,
        };

        if let Some(parent) = node.parent {
            if let Some(v) = self.nodes.get_mut(parent) {
                v.children.retain(|c| *c != id);
            }
        }

        if let Some(parent) = node.manual_parent {
            if let Some(v) = self.nodes.get_mut(parent) {
                v.manual_children.retain(|c| *c != id);
            }
        }

        for child in node.children {
            if let Some(v) = self.nodes.get_mut(child) {
                v.parent = None;
            }

            self.invalidate_subtree(child);
        }

        for child in node.manual_children {
            if let Some(v) = self.nodes.get_mut(child) {
                v.manual_parent = None;
            }

            self.invalidate_subtree(child);
        }

        true
    }

    #[inline]
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.is_alive(id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[inline]
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }
}

impl Nodes {
    #[inline]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id).and_then(|v| v.parent)
    }

    #[inline]
    pub fn manual_parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id).and_then(|v| v.manual_parent)
    }

    #[inline]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(id).map(|v| &v.children[..]).unwrap_or(&[])
    }

    #[inline]
    pub fn manual_children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id)
            .map(|v| &v.manual_children[..])
            .unwrap_or(&[])
    }

    /// Returns true if `ancestor` is reachable from `id` through parent or
    /// manual parent links.
    pub fn is_ancestor(&self, id: NodeId, ancestor: NodeId) -> bool {
        let mut stack: NodeList = NodeList::new();
        if let Some(v) = self.nodes.get(id) {
            stack.extend(v.parent);
            stack.extend(v.manual_parent);
        }

        while let Some(v) = stack.pop() {
            if v == ancestor {
                return true;
            }

            if let Some(node) = self.nodes.get(v) {
                stack.extend(node.parent);
                stack.extend(node.manual_parent);
            }
        }

        false
    }

    /// Attaches `child` to `parent` in the hierarchy, or detaches it with `None`.
    pub fn set_parent<T>(&mut self, child: NodeId, parent: T) -> Result<()>
    where
        T: Into<Option<NodeId>>,
    {
        let parent = parent.into();
        self.check_link(child, parent)?;

        if let Some(old) = self.nodes.get(child).and_then(|v| v.parent) {
            if let Some(v) = self.nodes.get_mut(old) {
                v.children.retain(|c| *c != child);
            }
        }

        if let Some(parent) = parent {
            if let Some(v) = self.nodes.get_mut(parent) {
                v.children.push(child);
            }
        }

        if let Some(v) = self.nodes.get_mut(child) {
            v.parent = parent;
        }

        self.invalidate_subtree(child);
        Ok(())
    }

    /// Overrides the parent of `child` with `parent`, or removes the override
    /// with `None`.
    pub fn set_manual_parent<T>(&mut self, child: NodeId, parent: T) -> Result<()>
    where
        T: Into<Option<NodeId>>,
    {
        let parent = parent.into();
        self.check_link(child, parent)?;

        if let Some(old) = self.nodes.get(child).and_then(|v| v.manual_parent) {
            if let Some(v) = self.nodes.get_mut(old) {
                v.manual_children.retain(|c| *c != child);
            }
        }

        if let Some(parent) = parent {
            if let Some(v) = self.nodes.get_mut(parent) {
                v.manual_children.push(child);
            }
        }

        if let Some(v) = self.nodes.get_mut(child) {
            v.manual_parent = parent;
        }

        self.invalidate_subtree(child);
        Ok(())
    }

    fn check_link(&self, child: NodeId, parent: Option<NodeId>) -> Result<()> {
        if !self.contains(child) {
            bail!("{} is not a live node.", child);
        }

        if let Some(parent) = parent {
            if !self.contains(parent) {
                bail!("{} is not a live node.", parent);
            }

            if parent == child {
                bail!("Node can not set self as parent.");
            }

            if self.is_ancestor(parent, child) {
                bail!("{} is a descendant of {}, which would form a cycle.", parent, child);
            }
        }

        Ok(())
    }
}

impl Nodes {
    #[inline]
    pub fn transform(&self, id: NodeId) -> Option<Transform> {
        self.nodes.get(id).map(|v| v.transform)
    }

    pub fn set_transform(&mut self, id: NodeId, transform: Transform) {
        self.modify(id, |v| *v = transform);
    }

    #[inline]
    pub fn position(&self, id: NodeId) -> Option<Vector3<f32>> {
        self.nodes.get(id).map(|v| v.transform.position)
    }

    pub fn set_position<T>(&mut self, id: NodeId, position: T)
    where
        T: Into<Vector3<f32>>,
    {
        let position = position.into();
        self.modify(id, |v| v.position = position);
    }

    /// Euler angles in degrees.
    #[inline]
    pub fn rotation(&self, id: NodeId) -> Option<Vector3<f32>> {
        self.nodes.get(id).map(|v| v.transform.rotation)
    }

    pub fn set_rotation<T>(&mut self, id: NodeId, rotation: T)
    where
        T: Into<Vector3<f32>>,
    {
        let rotation = rotation.into();
        self.modify(id, |v| v.rotation = rotation);
    }

    #[inline]
    pub fn scale(&self, id: NodeId) -> Option<Vector3<f32>> {
        self.nodes.get(id).map(|v| v.transform.scale)
    }

    pub fn set_scale<T>(&mut self, id: NodeId, scale: T)
    where
        T: Into<Vector3<f32>>,
    {
        let scale = scale.into();
        self.modify(id, |v| v.scale = scale);
    }

    pub fn set_reverse_translation(&mut self, id: NodeId, reverse: bool) {
        self.modify(id, |v| v.reverse_translation = reverse);
    }

    fn modify<F>(&mut self, id: NodeId, func: F)
    where
        F: FnOnce(&mut Transform),
    {
        let dependents = match self.nodes.get_mut(id) {
            Some(node) => {
                func(&mut node.transform);
                node.local_valid = false;
                node.dependents()
            }
            None => return,
        };

        for child in dependents {
            self.invalidate_subtree(child);
        }
    }

    /// Flags `id` and everything below it as relative to a stale parent.
    fn invalidate_subtree(&mut self, id: NodeId) {
        let mut stack: NodeList = NodeList::new();
        stack.push(id);

        while let Some(v) = stack.pop() {
            if let Some(node) = self.nodes.get_mut(v) {
                node.parent_valid = false;
                stack.extend(node.children.iter().cloned());
                stack.extend(node.manual_children.iter().cloned());
            }
        }
    }
}

impl Nodes {
    /// Brings the matrices of `id` up to date. Does nothing if they already are.
    ///
    /// Stale ancestors are resolved first. Every node recomputed on the way
    /// recomputes its dependents as well.
    pub fn update_transform(&mut self, id: NodeId) {
        let mut stack: Vec<NodeId> = vec![id];

        while let Some(v) = stack.pop() {
            let parent = match self.nodes.get(v) {
                Some(node) if !node.is_valid() => node.effective_parent(),
                _ => continue,
            };

            if let Some(top) = parent.and_then(|p| self.stale_root(p)) {
                stack.push(v);
                stack.push(top);
                continue;
            }

            for child in self.recompute(v) {
                if let Some(node) = self.nodes.get_mut(child) {
                    node.parent_valid = false;
                }

                stack.push(child);
            }
        }
    }

    /// The topmost stale node on the way up from `id`. Staleness is pushed down
    /// on invalidation, so the walk stops at the first valid node.
    fn stale_root(&self, id: NodeId) -> Option<NodeId> {
        let mut top = None;
        let mut cursor = Some(id);

        while let Some(v) = cursor {
            match self.nodes.get(v) {
                Some(node) if !node.is_valid() => {
                    top = Some(v);
                    cursor = node.effective_parent();
                }
                _ => break,
            }
        }

        top
    }

    /// Recomputes `id` against its parent and returns its dependents.
    fn recompute(&mut self, id: NodeId) -> NodeList {
        let parent = self
            .nodes
            .get(id)
            .and_then(|v| v.effective_parent())
            .and_then(|v| self.nodes.get(v))
            .map(|v| v.global);

        match self.nodes.get_mut(id) {
            Some(node) => {
                if !node.local_valid {
                    node.local = node.transform.matrix();
                    node.local_valid = true;
                }

                node.global = match parent {
                    Some(parent) => parent * node.local,
                    None => node.local,
                };

                node.parent_valid = true;
                node.dependents()
            }
            None => NodeList::new(),
        }
    }

    /// Gets the transform matrix in world space.
    pub fn global_matrix(&mut self, id: NodeId) -> Option<Matrix4<f32>> {
        self.update_transform(id);
        self.nodes.get(id).map(|v| v.global)
    }

    /// Gets the transform matrix relative to the parent.
    pub fn local_matrix(&mut self, id: NodeId) -> Option<Matrix4<f32>> {
        self.update_transform(id);
        self.nodes.get(id).map(|v| v.local)
    }

    /// Transforms a point from the local space of `id` into world space.
    pub fn transform_point<T>(&mut self, id: NodeId, point: T) -> Option<Vector3<f32>>
    where
        T: Into<Vector3<f32>>,
    {
        let m = self.global_matrix(id)?;
        Some((m * point.into().extend(1.0)).truncate())
    }

    /// The model matrix followed by its normal matrix, both column-major.
    pub fn model_data(&mut self, id: NodeId) -> Option<[f32; MODEL_FLOATS]> {
        let m = self.global_matrix(id)?;
        let normal = m.invert().unwrap_or_else(Matrix4::identity).transpose();

        let mut data = [0.0; MODEL_FLOATS];
        data[..16].copy_from_slice(&math::columns(&m));
        data[16..].copy_from_slice(&math::columns(&normal));
        Some(data)
    }

    /// Writes `model_data` into `buffer`, which then serves as the model data
    /// of a static draw.
    pub fn write_model_data<R>(
        &mut self,
        id: NodeId,
        renderer: &mut R,
        buffer: RenderBufferId,
    ) -> Result<()>
    where
        R: Renderer + ?Sized,
    {
        let data = match self.model_data(id) {
            Some(v) => v,
            None => bail!("{} is not a live node.", id),
        };

        renderer.update_buffer(buffer, 0, &data)?;
        Ok(())
    }
}
