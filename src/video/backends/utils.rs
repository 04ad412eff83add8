use std::borrow::Borrow;

use crate::utils::handle::Handle;

/// Per-device storage of backend objects, addressed by the handles minted on
/// the renderer side.
#[derive(Debug)]
pub struct DataVec<T>
where
    T: Sized,
{
    pub buf: Vec<Option<T>>,
    pub versions: Vec<u32>,
}

impl<T> DataVec<T>
where
    T: Sized,
{
    pub fn new() -> Self {
        DataVec {
            buf: Vec::new(),
            versions: Vec::new(),
        }
    }

    pub fn get<H>(&self, handle: H) -> Option<&T>
    where
        H: Borrow<Handle>,
    {
        let index = handle.borrow().index() as usize;
        match self.versions.get(index) {
            Some(&v) if v == handle.borrow().version() => self.buf[index].as_ref(),
            _ => None,
        }
    }

    pub fn get_mut<H>(&mut self, handle: H) -> Option<&mut T>
    where
        H: Borrow<Handle>,
    {
        let index = handle.borrow().index() as usize;
        match self.versions.get(index) {
            Some(&v) if v == handle.borrow().version() => self.buf[index].as_mut(),
            _ => None,
        }
    }

    /// Stores `value`, returning what the same handle held before.
    pub fn create<H>(&mut self, handle: H, value: T) -> Option<T>
    where
        H: Borrow<Handle>,
    {
        let handle = handle.borrow();
        let index = handle.index() as usize;

        while self.buf.len() <= index {
            self.buf.push(None);
            self.versions.push(0);
        }

        let prev = if self.versions[index] == handle.version() {
            self.buf[index].take()
        } else {
            None
        };

        self.buf[index] = Some(value);
        self.versions[index] = handle.version();
        prev
    }

    pub fn free<H>(&mut self, handle: H) -> Option<T>
    where
        H: Borrow<Handle>,
    {
        let handle = handle.borrow();
        let index = handle.index() as usize;
        match self.versions.get(index) {
            Some(&v) if v == handle.version() => self.buf[index].take(),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.buf.iter().filter_map(|v| v.as_ref())
    }
}
