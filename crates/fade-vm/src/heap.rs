//! Arena heap with an allocation table and an exact-size free list.
//!
//! Pointers are byte offsets into one backing buffer. A pointer is live
//! iff the allocation table has an entry for it. Freed blocks are only
//! reused for a later allocation of exactly the same size; there is no
//! splitting or coalescing.

use fade_types::codec::{decode_string, encode_string};
use fade_types::{VmError, VmResult};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct Heap {
    memory: Vec<u8>,
    cursor: usize,
    /// ptr → length
    allocations: BTreeMap<usize, usize>,
    /// length → freed pointers of that length
    free_list: BTreeMap<usize, Vec<usize>>,
}

fn out_of_bounds(ptr: usize, len: usize) -> VmError {
    VmError::HeapOutOfBounds {
        ptr: i64::try_from(ptr).unwrap_or(i64::MAX),
        len,
    }
}

fn untracked(ptr: usize) -> VmError {
    VmError::UntrackedPointer(i64::try_from(ptr).unwrap_or(i64::MAX))
}

impl Heap {
    /// Creates a heap whose backing buffer starts at `initial_size` bytes.
    pub fn new(initial_size: usize) -> Self {
        Self {
            memory: vec![0; initial_size.max(1)],
            cursor: 0,
            allocations: BTreeMap::new(),
            free_list: BTreeMap::new(),
        }
    }

    /// Size of the backing buffer.
    pub fn capacity(&self) -> usize {
        self.memory.len()
    }

    /// Next bump-allocation offset.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Live allocations as `(ptr, length)`, ordered by pointer.
    pub fn allocations(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.allocations.iter().map(|(p, l)| (*p, *l))
    }

    /// Reserves `size` bytes and returns the pointer.
    ///
    /// A zero-sized allocation still advances the cursor by one byte so its
    /// pointer stays unique in the allocation table.
    pub fn allocate(&mut self, size: usize) -> usize {
        if let Some(ptr) = self.free_list.get_mut(&size).and_then(Vec::pop) {
            self.allocations.insert(ptr, size);
            return ptr;
        }

        let ptr = self.cursor;
        let end = ptr + size.max(1);
        if end > self.memory.len() {
            let mut grown = self.memory.len();
            while end > grown {
                grown *= 2;
            }
            debug!(from = self.memory.len(), to = grown, "heap grown");
            self.memory.resize(grown, 0);
        }
        self.cursor = end;
        self.allocations.insert(ptr, size);
        ptr
    }

    /// Releases a live allocation onto the free list for its size.
    pub fn free(&mut self, ptr: usize) -> VmResult<()> {
        let size = self.allocations.remove(&ptr).ok_or_else(|| untracked(ptr))?;
        self.free_list.entry(size).or_default().push(ptr);
        Ok(())
    }

    pub fn allocation_size(&self, ptr: usize) -> VmResult<usize> {
        self.try_allocation_size(ptr).ok_or_else(|| untracked(ptr))
    }

    pub fn try_allocation_size(&self, ptr: usize) -> Option<usize> {
        self.allocations.get(&ptr).copied()
    }

    fn range(&self, ptr: usize, len: usize) -> VmResult<std::ops::Range<usize>> {
        let end = ptr.checked_add(len).ok_or_else(|| out_of_bounds(ptr, len))?;
        if end > self.memory.len() {
            return Err(out_of_bounds(ptr, len));
        }
        Ok(ptr..end)
    }

    /// Reads `len` raw bytes at `ptr`.
    pub fn read(&self, ptr: usize, len: usize) -> VmResult<&[u8]> {
        let range = self.range(ptr, len)?;
        Ok(&self.memory[range])
    }

    /// Writes `bytes` at `ptr`.
    pub fn write(&mut self, ptr: usize, bytes: &[u8]) -> VmResult<()> {
        let range = self.range(ptr, bytes.len())?;
        self.memory[range].copy_from_slice(bytes);
        Ok(())
    }

    /// Copies `len` bytes from `src` to `dst`; the ranges may overlap.
    pub fn copy(&mut self, src: usize, dst: usize, len: usize) -> VmResult<()> {
        let from = self.range(src, len)?;
        self.range(dst, len)?;
        self.memory.copy_within(from, dst);
        Ok(())
    }

    // ── Strings ──────────────────────────────────────────────────────────

    /// Allocates a block holding `text` and returns its pointer.
    pub fn allocate_string(&mut self, text: &str) -> VmResult<usize> {
        let bytes = encode_string(text);
        let ptr = self.allocate(bytes.len());
        self.write(ptr, &bytes)?;
        Ok(ptr)
    }

    /// Decodes the whole allocation at `ptr` as a string.
    pub fn read_string(&self, ptr: usize) -> VmResult<String> {
        let len = self.allocation_size(ptr)?;
        decode_string(self.read(ptr, len)?)
            .ok_or_else(|| VmError::InvalidString(i64::try_from(ptr).unwrap_or(i64::MAX)))
    }
}
