use super::handle::{Handle, HandleIndex, HandleLike};
use super::handle_pool::HandlePool;

#[derive(Debug, Fail, PartialEq, Eq)]
pub enum TableError {
    #[fail(display = "{} is nil.", _0)]
    Invalid(Handle),
    #[fail(display = "{} is not alive in table {}.", _0, _1)]
    NotFound(Handle, HandleIndex),
}

/// A named object collection. Every time you insert or remove an item, a
/// handle is minted or retired with it.
///
/// The handles of a `Table` can never be confused with the handles of another
/// `Table`, even when their slot indices coincide.
pub struct Table<H: HandleLike, T: Sized> {
    handles: HandlePool<H>,
    entries: Vec<Option<T>>,
}

impl<H: HandleLike, T: Sized> Default for Table<H, T> {
    fn default() -> Self {
        Table::new()
    }
}

impl<H: HandleLike, T: Sized> Table<H, T> {
    /// Constructs a new, empty `Table`.
    pub fn new() -> Self {
        Table {
            handles: HandlePool::new(),
            entries: Vec::new(),
        }
    }

    /// Constructs a new `Table` with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Table {
            handles: HandlePool::with_capacity(capacity),
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Returns the identifier stamped into every handle of this table.
    #[inline]
    pub fn id(&self) -> HandleIndex {
        self.handles.table()
    }

    /// Inserts `value`, reusing the most recently freed slot if any.
    pub fn insert(&mut self, value: T) -> H {
        let handle = self.handles.create();

        if handle.index() as usize >= self.entries.len() {
            self.entries.push(Some(value));
        } else {
            self.entries[handle.index() as usize] = Some(value);
        }

        handle
    }

    /// Returns true if `handle` was minted by this table and is still alive.
    #[inline]
    pub fn query(&self, handle: H) -> bool {
        self.handles.is_alive(handle)
    }

    #[inline]
    pub fn is_alive(&self, handle: H) -> bool {
        self.handles.is_alive(handle)
    }

    /// Returns immutable reference to internal value with name `Handle`.
    #[inline]
    pub fn get(&self, handle: H) -> Option<&T> {
        if self.handles.is_alive(handle) {
            self.entries[handle.index() as usize].as_ref()
        } else {
            None
        }
    }

    /// Returns mutable reference to internal value with name `Handle`.
    #[inline]
    pub fn get_mut(&mut self, handle: H) -> Option<&mut T> {
        if self.handles.is_alive(handle) {
            self.entries[handle.index() as usize].as_mut()
        } else {
            None
        }
    }

    /// Checked lookup.
    pub fn find(&self, handle: H) -> Result<&T, TableError> {
        let id = self.id();
        self.get(handle).ok_or_else(|| Self::error(handle, id))
    }

    /// Checked mutable lookup.
    pub fn find_mut(&mut self, handle: H) -> Result<&mut T, TableError> {
        let id = self.id();
        self.get_mut(handle).ok_or_else(|| Self::error(handle, id))
    }

    /// Unchecked lookup for hot paths.
    ///
    /// # Safety
    ///
    /// `handle` must be alive in this table. Stale or foreign handles either
    /// panic or yield the item that currently occupies the slot.
    #[inline]
    pub unsafe fn find_unchecked(&self, handle: H) -> &T {
        match self.entries.get_unchecked(handle.index() as usize) {
            Some(ref v) => v,
            None => panic!("{:?} does not address an occupied slot.", handle),
        }
    }

    /// Removes the item named by `handle`. Invalid handles are ignored.
    #[inline]
    pub fn remove(&mut self, handle: H) -> Option<T> {
        if self.handles.free(handle) {
            self.entries[handle.index() as usize].take()
        } else {
            None
        }
    }

    /// Removes every item.
    pub fn clear(&mut self) {
        self.handles.clear();
        for v in &mut self.entries {
            *v = None;
        }
    }

    /// Returns the total number of alive items in this `Table`.
    #[inline]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Checks if the table is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns an iterator over alive handles and items, in physical slot
    /// order. Slots freed earlier are refilled by later inserts, so this is
    /// not insertion order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (H, &T)> {
        let handles = &self.handles;
        self.entries
            .iter()
            .enumerate()
            .filter_map(move |(i, v)| match (handles.handle_at(i), v.as_ref()) {
                (Some(h), Some(v)) => Some((h, v)),
                _ => None,
            })
    }

    /// Returns an iterator over alive handles, in physical slot order.
    #[inline]
    pub fn keys(&self) -> impl Iterator<Item = H> + '_ {
        self.handles.iter()
    }

    /// Returns an iterator over alive items, in physical slot order.
    #[inline]
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().filter_map(|v| v.as_ref())
    }

    /// Returns a mutable iterator over alive items, in physical slot order.
    #[inline]
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.entries.iter_mut().filter_map(|v| v.as_mut())
    }

    fn error(handle: H, table: HandleIndex) -> TableError {
        let raw = Handle::new(handle.table(), handle.index(), handle.version());
        if raw.is_valid() {
            TableError::NotFound(raw, table)
        } else {
            TableError::Invalid(raw)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn checked_find() {
        let mut table = Table::<Handle, &'static str>::new();
        let h = table.insert("a");
        assert_eq!(table.find(h), Ok(&"a"));

        table.remove(h);
        assert_eq!(table.find(h), Err(TableError::NotFound(h, table.id())));
        assert_eq!(
            table.find(Handle::nil()),
            Err(TableError::Invalid(Handle::nil()))
        );
    }

    #[test]
    fn unchecked_find() {
        let mut table = Table::<Handle, u32>::new();
        let h = table.insert(7);
        assert_eq!(unsafe { *table.find_unchecked(h) }, 7);
    }

    #[test]
    fn clear() {
        let mut table = Table::<Handle, u32>::new();
        let h = table.insert(1);
        table.insert(2);
        table.clear();

        assert!(table.is_empty());
        assert!(!table.query(h));
        assert_eq!(table.values().count(), 0);
    }
}
