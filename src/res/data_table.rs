//! A named collection of typed values with a corruption-checked binary form.
//!
//! Values live in one contiguous blob; every name maps to a `(begin, count)`
//! block inside it. Rewriting a name with a value of a different size leaves
//! the old block behind as garbage until `consolidate` is called.
//!
//! # State Layout
//!
//! ```text
//! MAGIC                   [u8; 8]      "\x01COEBEEF"
//! entry count             u64
//! data size               u64
//! names                   nul-terminated, one per entry
//! blocks                  (begin: u64, count: u64), one per entry
//! data                    [u8; data size]
//! checksum                [u8; 8]
//! ```
//!
//! Integers are little-endian. The checksum adds every preceding byte into one
//! of eight wrapping lanes (`lane[i % 8]`), so any single-byte change is caught.

use std::collections::BTreeMap;
use std::io::{BufRead, Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

pub const MAGIC: [u8; 8] = [1, b'C', b'O', b'E', b'B', b'E', b'E', b'F'];

const HEADER_LEN: usize = 8 + 8 + 8;
const CHECKSUM_LEN: usize = 8;

#[derive(Debug, Fail, PartialEq, Eq)]
pub enum DataTableError {
    #[fail(display = "[DataTable] MAGIC number not match.")]
    Magic,
    #[fail(display = "[DataTable] Checksum not match.")]
    Checksum,
    #[fail(display = "[DataTable] State is truncated.")]
    Truncated,
    #[fail(display = "[DataTable] State is malformed, {}.", _0)]
    Malformed(String),
    #[fail(display = "[DataTable] Name {:?} can not contain nul.", _0)]
    InvalidName(String),
}

/// Values that can be written into a `DataTable`.
pub trait DataValue {
    fn encode(&self, out: &mut Vec<u8>);
}

/// Values that can be read back out of a `DataTable`.
pub trait FromData: Sized {
    fn decode(bytes: &[u8]) -> Option<Self>;
}

macro_rules! impl_number {
    ($ty:ty, $size:expr, $write:ident, $read:ident) => {
        impl DataValue for $ty {
            fn encode(&self, out: &mut Vec<u8>) {
                // Writing into a `Vec` never fails.
                let _ = out.$write::<LittleEndian>(*self);
            }
        }

        impl FromData for $ty {
            fn decode(mut bytes: &[u8]) -> Option<Self> {
                if bytes.len() != $size {
                    return None;
                }

                bytes.$read::<LittleEndian>().ok()
            }
        }
    };
}

impl_number!(i32, 4, write_i32, read_i32);
impl_number!(u32, 4, write_u32, read_u32);
impl_number!(u64, 8, write_u64, read_u64);
impl_number!(f32, 4, write_f32, read_f32);
impl_number!(f64, 8, write_f64, read_f64);

impl DataValue for str {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.as_bytes());
    }
}

impl DataValue for String {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.as_bytes());
    }
}

impl FromData for String {
    fn decode(bytes: &[u8]) -> Option<Self> {
        String::from_utf8(bytes.to_vec()).ok()
    }
}

impl DataValue for [u8] {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self);
    }
}

impl DataValue for Vec<u8> {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self);
    }
}

impl FromData for Vec<u8> {
    fn decode(bytes: &[u8]) -> Option<Self> {
        Some(bytes.to_vec())
    }
}

impl DataValue for DataTable {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.write_state());
    }
}

impl FromData for DataTable {
    fn decode(bytes: &[u8]) -> Option<Self> {
        let mut table = DataTable::new();
        table.read_state(bytes).ok().map(|_| table)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Block {
    begin: u64,
    count: u64,
}

#[derive(Debug, Clone, Default)]
pub struct DataTable {
    blocks: BTreeMap<String, Block>,
    data: Vec<u8>,
}

impl PartialEq for DataTable {
    /// Two tables are equal when the same names hold the same bytes, no
    /// matter how their blobs are laid out.
    fn eq(&self, other: &DataTable) -> bool {
        self.blocks.len() == other.blocks.len()
            && self
                .blocks
                .keys()
                .all(|name| self.bytes(name) == other.bytes(name))
    }
}

impl DataTable {
    pub fn new() -> Self {
        DataTable::default()
    }

    /// Stores `value` under `name`, replacing whatever was there.
    pub fn write<T>(&mut self, name: &str, value: &T) -> Result<(), DataTableError>
    where
        T: DataValue + ?Sized,
    {
        if name.as_bytes().contains(&0) {
            return Err(DataTableError::InvalidName(name.to_owned()));
        }

        let mut bytes = Vec::new();
        value.encode(&mut bytes);

        let block = self.allocate(name, bytes.len());
        let begin = block.begin as usize;
        self.data[begin..begin + bytes.len()].copy_from_slice(&bytes);
        Ok(())
    }

    /// Reads the value under `name`. Returns `None` if the name is missing or
    /// its bytes do not decode as `T`.
    pub fn read<T: FromData>(&self, name: &str) -> Option<T> {
        self.bytes(name).and_then(T::decode)
    }

    /// Returns the raw bytes stored under `name`.
    pub fn bytes(&self, name: &str) -> Option<&[u8]> {
        self.blocks.get(name).map(|b| {
            let begin = b.begin as usize;
            &self.data[begin..begin + b.count as usize]
        })
    }

    /// Forgets `name`. Its bytes stay in the blob until `consolidate`.
    pub fn remove(&mut self, name: &str) -> bool {
        self.blocks.remove(name).is_some()
    }

    #[inline]
    pub fn query(&self, name: &str) -> bool {
        self.blocks.contains_key(name)
    }

    /// Iterates over the stored names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.blocks.keys().map(|v| v.as_str())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn clear(&mut self) {
        self.blocks.clear();
        self.data.clear();
    }

    /// Returns the size of the blob, garbage included.
    #[inline]
    pub fn data_len(&self) -> usize {
        self.data.len()
    }

    /// Drops unreferenced bytes from the blob.
    pub fn consolidate(&mut self) {
        let mut data = Vec::with_capacity(self.data.len());
        for block in self.blocks.values_mut() {
            let begin = block.begin as usize;
            let end = begin + block.count as usize;

            block.begin = data.len() as u64;
            data.extend_from_slice(&self.data[begin..end]);
        }

        self.data = data;
    }

    /// Serializes the table, compacted, into a self-checking buffer.
    pub fn write_state(&self) -> Vec<u8> {
        let mut compact = self.clone();
        compact.consolidate();

        let mut out = Vec::with_capacity(
            HEADER_LEN + compact.data.len() + compact.blocks.len() * 24 + CHECKSUM_LEN,
        );

        out.extend_from_slice(&MAGIC);
        let _ = out.write_u64::<LittleEndian>(compact.blocks.len() as u64);
        let _ = out.write_u64::<LittleEndian>(compact.data.len() as u64);

        for name in compact.blocks.keys() {
            out.extend_from_slice(name.as_bytes());
            out.push(0);
        }

        for block in compact.blocks.values() {
            let _ = out.write_u64::<LittleEndian>(block.begin);
            let _ = out.write_u64::<LittleEndian>(block.count);
        }

        out.extend_from_slice(&compact.data);

        let sum = checksum(&out);
        out.extend_from_slice(&sum);
        out
    }

    /// Replaces the contents of this table with a state produced by
    /// `write_state`. On error the table is left untouched.
    pub fn read_state(&mut self, bytes: &[u8]) -> Result<(), DataTableError> {
        if bytes.len() < HEADER_LEN + CHECKSUM_LEN {
            return Err(DataTableError::Truncated);
        }

        if bytes[0..8] != MAGIC[..] {
            return Err(DataTableError::Magic);
        }

        let (body, sum) = bytes.split_at(bytes.len() - CHECKSUM_LEN);
        if checksum(body)[..] != sum[..] {
            return Err(DataTableError::Checksum);
        }

        let mut table = Self::parse(&body[8..])?;
        ::std::mem::swap(self, &mut table);
        Ok(())
    }

    fn parse(body: &[u8]) -> Result<DataTable, DataTableError> {
        let mut cursor = Cursor::new(body);
        let num = cursor
            .read_u64::<LittleEndian>()
            .map_err(|_| DataTableError::Truncated)?;
        let size = cursor
            .read_u64::<LittleEndian>()
            .map_err(|_| DataTableError::Truncated)?;

        // Every entry needs at least a nul and a block pair.
        if num.saturating_mul(17) > body.len() as u64 || size > body.len() as u64 {
            return Err(DataTableError::Malformed("counts exceed state".into()));
        }

        let mut names = Vec::with_capacity(num as usize);
        for _ in 0..num {
            let mut buf = Vec::new();
            cursor
                .read_until(0, &mut buf)
                .map_err(|_| DataTableError::Truncated)?;

            if buf.pop() != Some(0) {
                return Err(DataTableError::Truncated);
            }

            let name = String::from_utf8(buf)
                .map_err(|_| DataTableError::Malformed("name is not utf-8".into()))?;
            names.push(name);
        }

        let mut blocks = BTreeMap::new();
        for name in names {
            let begin = cursor
                .read_u64::<LittleEndian>()
                .map_err(|_| DataTableError::Truncated)?;
            let count = cursor
                .read_u64::<LittleEndian>()
                .map_err(|_| DataTableError::Truncated)?;

            if begin.checked_add(count).map_or(true, |end| end > size) {
                return Err(DataTableError::Malformed(format!(
                    "block of {:?} is out of bounds",
                    name
                )));
            }

            if blocks.insert(name, Block { begin, count }).is_some() {
                return Err(DataTableError::Malformed("duplicated name".into()));
            }
        }

        let mut data = vec![0; size as usize];
        cursor
            .read_exact(&mut data)
            .map_err(|_| DataTableError::Truncated)?;

        if cursor.position() != body.len() as u64 {
            return Err(DataTableError::Malformed("trailing bytes".into()));
        }

        Ok(DataTable { blocks, data })
    }

    fn allocate(&mut self, name: &str, len: usize) -> Block {
        if let Some(block) = self.blocks.get(name) {
            if block.count as usize == len {
                return *block;
            }
        }

        let block = Block {
            begin: self.data.len() as u64,
            count: len as u64,
        };

        self.data.resize(self.data.len() + len, 0);
        self.blocks.insert(name.to_owned(), block);
        block
    }
}

/// Eight-lane additive checksum.
pub fn checksum(bytes: &[u8]) -> [u8; 8] {
    let mut lanes = [0u8; 8];
    for (i, v) in bytes.iter().enumerate() {
        lanes[i % 8] = lanes[i % 8].wrapping_add(*v);
    }

    lanes
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rewrite_same_size() {
        let mut table = DataTable::new();
        table.write("hp", &10i32).unwrap();
        table.write("hp", &12i32).unwrap();
        assert_eq!(table.data_len(), 4);
        assert_eq!(table.read::<i32>("hp"), Some(12));
    }

    #[test]
    fn rewrite_resized() {
        let mut table = DataTable::new();
        table.write("name", "abc").unwrap();
        table.write("name", "abcdef").unwrap();
        assert_eq!(table.data_len(), 9);

        table.consolidate();
        assert_eq!(table.data_len(), 6);
        assert_eq!(table.read::<String>("name"), Some("abcdef".to_owned()));
    }

    #[test]
    fn checksum_lanes() {
        let bytes = [1u8, 2, 3, 4, 5, 6, 7, 8, 255, 1];
        let sum = checksum(&bytes);
        assert_eq!(sum, [0, 3, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn nul_names() {
        let mut table = DataTable::new();
        assert_eq!(
            table.write("a\0b", &1u32),
            Err(DataTableError::InvalidName("a\0b".to_owned()))
        );
        assert!(table.is_empty());
    }
}
