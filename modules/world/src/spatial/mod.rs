pub mod node;
pub mod nodes;
pub mod transform;

pub mod prelude {
    pub use super::node::Node;
    pub use super::nodes::Nodes;
    pub use super::transform::Transform;
}
