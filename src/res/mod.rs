//! Persistent state of entities.

pub mod data_table;

pub mod prelude {
    pub use super::data_table::{DataTable, DataTableError, DataValue, FromData};
}
