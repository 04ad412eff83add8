//! Commonly used utilities like handles, pools and tables.

#[macro_use]
pub mod handle;
pub mod handle_pool;
pub mod table;

pub mod prelude {
    pub use super::handle::{Handle, HandleIndex, HandleLike};
    pub use super::handle_pool::HandlePool;
    pub use super::table::{Table, TableError};
}

pub use self::handle::{Handle, HandleIndex, HandleLike};
pub use self::handle_pool::HandlePool;
pub use self::table::{Table, TableError};
