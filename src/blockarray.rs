//! Packed array of fixed-width integers.
//!
//! Holds the per-leaf and per-sibling-group document ids of the index in
//! `⌈log₂ E⌉` bits per entry instead of a full word each.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::bits::{get_bits, set_bits, words_for};
use crate::error::{Result, read_error};

/// A `len`-element array of `width`-bit unsigned integers.
///
/// # Example
/// ```
/// use tree_path_index::blockarray::BlockArray;
/// let mut arr = BlockArray::new(100, 7);
/// arr.set(42, 99);
/// assert_eq!(arr.get(42), 99);
/// assert_eq!(arr.get(41), 0);
/// ```
pub struct BlockArray {
    data: Vec<u64>,
    len: u64,
    width: u32,
}

impl BlockArray {
    /// Allocates a zeroed array of `len` entries of `width` bits each.
    pub fn new(len: u64, width: u32) -> Self {
        assert!(width >= 1 && width <= 64, "field width out of range");
        BlockArray { data: vec![0u64; words_for(len * width as u64)], len, width }
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn get(&self, i: u64) -> u64 {
        debug_assert!(i < self.len);
        get_bits(&self.data, self.width, i * self.width as u64)
    }

    #[inline]
    pub fn set(&mut self, i: u64, value: u64) {
        debug_assert!(i < self.len);
        set_bits(&mut self.data, self.width, i * self.width as u64, value);
    }

    /// Writes length, width and the raw words.
    pub fn save<W: Write>(&self, out: &mut W) -> Result<()> {
        out.write_u64::<LittleEndian>(self.len)?;
        out.write_u32::<LittleEndian>(self.width)?;
        for &w in &self.data {
            out.write_u64::<LittleEndian>(w)?;
        }
        Ok(())
    }

    pub fn load<R: Read>(input: &mut R) -> Result<Self> {
        let len = input.read_u64::<LittleEndian>().map_err(read_error)?;
        let width = input.read_u32::<LittleEndian>().map_err(read_error)?;
        let mut data = vec![0u64; words_for(len * width as u64)];
        for w in data.iter_mut() {
            *w = input.read_u64::<LittleEndian>().map_err(read_error)?;
        }
        Ok(BlockArray { data, len, width })
    }
}
