use std::cmp::Ordering;
use std::fmt;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

/// `HandleIndex` type is arbitrary. Keeping it 32-bits allows for a compact
/// three-word `Handle`.
pub type HandleIndex = u32;

static NEXT_TABLE_ID: AtomicUsize = AtomicUsize::new(1);

/// Mints an identifier for a new table. Identifiers start at 1 and are never
/// reused during the lifetime of the process, so zero always means "nil".
pub fn next_table_id() -> HandleIndex {
    NEXT_TABLE_ID.fetch_add(1, AtomicOrdering::Relaxed) as HandleIndex
}

/// `Handle` is made up of three fields, `table`, `index` and `version`.
///
/// `table` names the table instance that minted the handle, `index` addresses
/// a slot inside that table. Slots are recycled when a `Handle` is freed, so
/// two different `Handle`s could share an index. `version` tells them apart:
/// it is bumped every time the slot is taken or released.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    table: HandleIndex,
    index: HandleIndex,
    version: HandleIndex,
}

impl Handle {
    /// Constructs a new `Handle`.
    #[inline]
    pub fn new(table: HandleIndex, index: HandleIndex, version: HandleIndex) -> Self {
        Handle {
            table,
            index,
            version,
        }
    }

    /// Constructs a nil/uninitialized `Handle`.
    #[inline]
    pub fn nil() -> Self {
        Handle {
            table: 0,
            index: 0,
            version: 0,
        }
    }

    /// Returns true if this `Handle` was minted by some table. It does NOT tell
    /// whether the handle is still alive; ask the owning table for that.
    #[inline]
    pub fn is_valid(self) -> bool {
        self.table > 0
    }

    /// Invalidate this `Handle` to default value.
    #[inline]
    pub fn invalidate(&mut self) {
        *self = Handle::nil();
    }

    /// Returns the identifier of the table which minted this handle.
    #[inline]
    pub fn table(self) -> HandleIndex {
        self.table
    }

    /// Returns index value.
    #[inline]
    pub fn index(self) -> HandleIndex {
        self.index
    }

    /// Returns version value.
    #[inline]
    pub fn version(self) -> HandleIndex {
        self.version
    }
}

/// Handles are only ordered relative to handles of the same table.
impl PartialOrd for Handle {
    fn partial_cmp(&self, other: &Handle) -> Option<Ordering> {
        if self.table != other.table {
            None
        } else {
            Some((self.index, self.version).cmp(&(other.index, other.version)))
        }
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Handle ({}, {}, {})", self.table, self.index, self.version)
    }
}

pub trait HandleLike: Debug + Copy + Hash + PartialEq + Eq {
    fn new(table: HandleIndex, index: HandleIndex, version: HandleIndex) -> Self;
    fn table(&self) -> HandleIndex;
    fn index(&self) -> HandleIndex;
    fn version(&self) -> HandleIndex;
}

impl HandleLike for Handle {
    #[inline]
    fn new(table: HandleIndex, index: HandleIndex, version: HandleIndex) -> Self {
        Handle::new(table, index, version)
    }

    #[inline]
    fn table(&self) -> HandleIndex {
        self.table
    }

    #[inline]
    fn index(&self) -> HandleIndex {
        self.index
    }

    #[inline]
    fn version(&self) -> HandleIndex {
        self.version
    }
}

#[macro_export]
macro_rules! impl_handle {
    ($name:ident) => {
        #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Hash)]
        pub struct $name($crate::utils::handle::Handle);

        impl From<$name> for $crate::utils::handle::Handle {
            fn from(handle: $name) -> Self {
                handle.0
            }
        }

        impl From<$crate::utils::handle::Handle> for $name {
            fn from(handle: $crate::utils::handle::Handle) -> Self {
                $name(handle)
            }
        }

        impl ::std::ops::Deref for $name {
            type Target = $crate::utils::handle::Handle;
            fn deref(&self) -> &$crate::utils::handle::Handle {
                &self.0
            }
        }

        impl ::std::borrow::Borrow<$crate::utils::handle::Handle> for $name {
            fn borrow(&self) -> &$crate::utils::handle::Handle {
                &self.0
            }
        }

        impl $crate::utils::handle::HandleLike for $name {
            #[inline]
            fn new(
                table: $crate::utils::handle::HandleIndex,
                index: $crate::utils::handle::HandleIndex,
                version: $crate::utils::handle::HandleIndex,
            ) -> Self {
                $name($crate::utils::handle::Handle::new(table, index, version))
            }

            #[inline]
            fn table(&self) -> $crate::utils::handle::HandleIndex {
                self.0.table()
            }

            #[inline]
            fn index(&self) -> $crate::utils::handle::HandleIndex {
                self.0.index()
            }

            #[inline]
            fn version(&self) -> $crate::utils::handle::HandleIndex {
                self.0.version()
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
                write!(
                    f,
                    "{} ({}, {}, {})",
                    stringify!($name),
                    self.0.table(),
                    self.0.index(),
                    self.0.version()
                )
            }
        }
    };
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn basic() {
        let mut h2 = Handle::new(1, 2, 4);
        assert_eq!(h2.table, 1);
        assert_eq!(h2.index, 2);
        assert_eq!(h2.version, 4);
        assert!(h2.is_valid());

        h2.invalidate();
        assert_eq!(h2, Handle::nil());
        assert!(!h2.is_valid());
    }

    #[test]
    fn cross_table_order() {
        let h1 = Handle::new(1, 1, 1);
        let h2 = Handle::new(2, 1, 1);
        let h3 = Handle::new(1, 2, 1);

        assert_ne!(h1, h2);
        assert_eq!(h1.partial_cmp(&h2), None);
        assert!(h1 < h3);
    }

    #[test]
    fn table_ids() {
        let a = next_table_id();
        let b = next_table_id();
        assert!(a > 0);
        assert!(b > a);
    }

    impl_handle!(TypeSafeHandle);

    #[test]
    fn type_safe_handle() {
        let h1 = TypeSafeHandle::default();
        assert_eq!(h1, TypeSafeHandle::from(Handle::default()));
        assert!(!h1.is_valid());

        let h2 = TypeSafeHandle(Handle::new(3, 0, 1));
        assert_eq!(*h2, Handle::new(3, 0, 1));
        assert_eq!(format!("{}", h2), "TypeSafeHandle (3, 0, 1)");
    }
}
