use std::borrow::Borrow;
use std::marker::PhantomData;

use super::handle::{next_table_id, Handle, HandleIndex, HandleLike};

/// `HandlePool` manages the manipulations of a `Handle` collection, which are
/// created with a continuous `index` field. It also have the ability to find
/// out the current status of a specified `Handle`.
///
/// Every pool owns a process-unique table id, and freed indices are recycled
/// last-in first-out.
pub struct HandlePool<H: HandleLike = Handle> {
    table: HandleIndex,
    versions: Vec<HandleIndex>,
    frees: Vec<HandleIndex>,
    _phantom: PhantomData<H>,
}

impl<H: HandleLike> Default for HandlePool<H> {
    fn default() -> Self {
        HandlePool::new()
    }
}

impl<H: HandleLike> HandlePool<H> {
    /// Constructs a new, empty `HandlePool`.
    pub fn new() -> Self {
        HandlePool {
            table: next_table_id(),
            versions: Vec::new(),
            frees: Vec::new(),
            _phantom: PhantomData,
        }
    }

    /// Constructs a new `HandlePool` with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        HandlePool {
            table: next_table_id(),
            versions: Vec::with_capacity(capacity),
            frees: Vec::with_capacity(capacity),
            _phantom: PhantomData,
        }
    }

    /// Returns the table id stamped into every handle of this pool.
    #[inline]
    pub fn table(&self) -> HandleIndex {
        self.table
    }

    /// Creates a unused `Handle`.
    pub fn create(&mut self) -> H {
        if let Some(index) = self.frees.pop() {
            let version = &mut self.versions[index as usize];
            *version += 1;
            H::new(self.table, index, *version)
        } else {
            // Or we just spawn a new index and corresponding version.
            self.versions.push(1);
            H::new(self.table, self.versions.len() as HandleIndex - 1, 1)
        }
    }

    /// Returns true if this `Handle` was created by this `HandlePool`, and has
    /// not been freed yet.
    pub fn is_alive<T>(&self, handle: T) -> bool
    where
        T: Borrow<H>,
    {
        let handle = handle.borrow();
        if handle.table() != self.table {
            return false;
        }

        let index = handle.index() as usize;
        self.is_alive_at(index) && (self.versions[index] == handle.version())
    }

    #[inline]
    pub(crate) fn is_alive_at(&self, index: usize) -> bool {
        (index < self.versions.len()) && ((self.versions[index] & 0x1) == 1)
    }

    /// Recycles the `Handle` index, and mark its version as dead.
    pub fn free<T>(&mut self, handle: T) -> bool
    where
        T: Borrow<H>,
    {
        let handle = handle.borrow();
        if !self.is_alive(handle) {
            false
        } else {
            self.versions[handle.index() as usize] += 1;
            self.frees.push(handle.index());
            true
        }
    }

    /// Recycles the `Handle` at `index`, and mark its version as dead.
    pub fn free_at(&mut self, index: usize) -> Option<H> {
        if !self.is_alive_at(index) {
            None
        } else {
            self.versions[index] += 1;
            self.frees.push(index as HandleIndex);
            Some(H::new(
                self.table,
                index as HandleIndex,
                self.versions[index] - 1,
            ))
        }
    }

    /// Returns the alive handle at `index` if any.
    #[inline]
    pub fn handle_at(&self, index: usize) -> Option<H> {
        if self.is_alive_at(index) {
            Some(H::new(
                self.table,
                index as HandleIndex,
                self.versions[index],
            ))
        } else {
            None
        }
    }

    /// Returns the total number of alive handle in this `HandlePool`.
    #[inline]
    pub fn len(&self) -> usize {
        self.versions.len() - self.frees.len()
    }

    /// Checks if the pool is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of slots ever handed out, alive or not.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.versions.len()
    }

    /// Frees every alive handle. Versions are bumped so that old handles stay
    /// dead even after their slots are reused.
    pub fn clear(&mut self) {
        for index in (0..self.versions.len()).rev() {
            if self.is_alive_at(index) {
                self.versions[index] += 1;
                self.frees.push(index as HandleIndex);
            }
        }
    }

    /// Returns an iterator over the alive handles, in slot order.
    #[inline]
    pub fn iter(&self) -> Iter<H> {
        Iter {
            index: 0,
            pool: self,
        }
    }
}

impl<'a, H: HandleLike> IntoIterator for &'a HandlePool<H> {
    type Item = H;
    type IntoIter = Iter<'a, H>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Immutable `HandlePool` iterator, this struct is created by `iter` method
/// on `HandlePool`.
pub struct Iter<'a, H: HandleLike + 'a> {
    index: usize,
    pool: &'a HandlePool<H>,
}

impl<'a, H: HandleLike + 'a> Iterator for Iter<'a, H> {
    type Item = H;

    fn next(&mut self) -> Option<H> {
        while self.index < self.pool.versions.len() {
            let index = self.index;
            self.index += 1;

            if let Some(handle) = self.pool.handle_at(index) {
                return Some(handle);
            }
        }

        None
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn lifo_reuse() {
        let mut pool: HandlePool = HandlePool::new();
        let h1 = pool.create();
        let h2 = pool.create();
        let h3 = pool.create();

        assert!(pool.free(h1));
        assert!(pool.free(h3));

        let h4 = pool.create();
        assert_eq!(h4.index(), h3.index());
        assert_eq!(h4.version(), h3.version() + 2);
        assert!(!pool.is_alive(h3));
        assert!(pool.is_alive(h2));
        assert!(pool.is_alive(h4));
    }

    #[test]
    fn foreign_handles() {
        let mut p1: HandlePool = HandlePool::new();
        let mut p2: HandlePool = HandlePool::new();

        let h1 = p1.create();
        let h2 = p2.create();

        assert_eq!(h1.index(), h2.index());
        assert_eq!(h1.version(), h2.version());
        assert_ne!(h1, h2);
        assert!(!p1.is_alive(h2));
        assert!(!p2.free(h1));
    }

    #[test]
    fn clear() {
        let mut pool: HandlePool = HandlePool::new();
        let handles: Vec<Handle> = (0..4).map(|_| pool.create()).collect();
        pool.clear();

        assert!(pool.is_empty());
        for v in handles {
            assert!(!pool.is_alive(v));
        }

        assert_eq!(pool.create().index(), 0);
    }
}
