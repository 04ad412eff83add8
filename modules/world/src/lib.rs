//! Transform hierarchy of dynacoe entities.
//!
//! Nodes live in a `Nodes` arena and refer to each other by `NodeId`. A node's
//! global matrix is resolved lazily from its ancestors and, once resolved,
//! pushed down eagerly to everything below it. `Nodes::write_model_data` hands
//! the result to a renderer as the model data of a static draw.

#[macro_use]
extern crate dynacoe;
#[macro_use]
extern crate failure;

pub mod spatial;

pub mod prelude {
    pub use super::spatial::prelude::*;
    pub use super::NodeId;
}

pub type Result<T> = ::std::result::Result<T, failure::Error>;

impl_handle!(NodeId);
