//! Bookkeeping for engine memory.
//!
//! Engine memory is split into two regions:
//!
//! ```text
//! [ reserved | heap ............ | stack ............ ]
//! 0          HEAP_START          stack_base          end
//! ```
//!
//! The stack region serves every per-operation marshaling sequence: a
//! [`Mark`] is taken, operand buffers are bump-allocated, and one
//! [`Arena::restore`] releases them all. The heap region serves the few
//! allocations that outlive an operation (precomputed tables) through a
//! first-fit free list that coalesces neighbours on free.
//!
//! Offset `0` is never handed out, so a zero pointer is always a bug.

use std::collections::{BTreeMap, HashMap};

use tracing::trace;

use crate::engine::Ptr;
use crate::errors::Error;

const ALIGN: usize = 8;
const HEAP_START: usize = ALIGN;

fn align_up(n: usize) -> Option<usize> {
    n.checked_add(ALIGN - 1).map(|v| v & !(ALIGN - 1))
}

/// Saved stack position. Restoring it releases everything allocated after it.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a mark must be restored"]
pub struct Mark {
    depth: usize,
    top: usize,
}

/// A heap allocation in engine memory. Not `Clone`, so it can be freed once.
#[derive(Debug, PartialEq, Eq)]
pub struct HeapBlock {
    ptr: Ptr,
    len: usize,
}

impl HeapBlock {
    pub fn ptr(&self) -> Ptr {
        self.ptr
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[derive(Debug)]
pub struct Arena {
    stack_base: usize,
    stack_end: usize,
    top: usize,
    marks: Vec<usize>,
    free: BTreeMap<Ptr, usize>,
    used: HashMap<Ptr, usize>,
}

impl Arena {
    /// Lays out an arena over `memory_len` bytes with the last `stack_size`
    /// bytes as the stack region.
    pub fn new(memory_len: usize, stack_size: usize) -> Result<Self, Error> {
        let stack_base = memory_len
            .checked_sub(stack_size)
            .map(|base| base & !(ALIGN - 1))
            .filter(|&base| base > HEAP_START)
            .ok_or_else(|| {
                Error::InvalidConfig(format!(
                    "stack region of {stack_size} bytes does not fit in {memory_len} bytes of engine memory"
                ))
            })?;
        let mut free = BTreeMap::new();
        free.insert(HEAP_START, stack_base - HEAP_START);
        Ok(Self {
            stack_base,
            stack_end: memory_len,
            top: stack_base,
            marks: Vec::new(),
            free,
            used: HashMap::new(),
        })
    }

    pub fn mark(&mut self) -> Mark {
        self.marks.push(self.top);
        Mark {
            depth: self.marks.len(),
            top: self.top,
        }
    }

    /// Bump-allocates `len` bytes on the stack region.
    pub fn allocate(&mut self, len: usize) -> Result<Ptr, Error> {
        let ptr = align_up(self.top).ok_or_else(|| exhausted("stack", len))?;
        let end = ptr
            .checked_add(len)
            .filter(|&end| end <= self.stack_end)
            .ok_or_else(|| exhausted("stack", len))?;
        self.top = end;
        Ok(ptr)
    }

    /// Releases every stack allocation made since `mark`.
    ///
    /// # Panics
    ///
    /// If `mark` is not the most recent unrestored mark.
    pub fn restore(&mut self, mark: Mark) {
        let innermost = self.marks.len() == mark.depth && self.marks.last() == Some(&mark.top);
        assert!(
            innermost,
            "arena marks restored out of LIFO order (depth {} while {} are open)",
            mark.depth,
            self.marks.len()
        );
        self.marks.pop();
        self.top = mark.top;
    }

    /// Current stack top; equals the stack base when no scope is open.
    pub fn stack_top(&self) -> usize {
        self.top
    }

    pub fn stack_base(&self) -> usize {
        self.stack_base
    }

    pub fn open_marks(&self) -> usize {
        self.marks.len()
    }

    /// First-fit heap allocation.
    pub fn heap_alloc(&mut self, len: usize) -> Result<HeapBlock, Error> {
        let size = align_up(len.max(1)).ok_or_else(|| exhausted("heap", len))?;
        let (ptr, avail) = self
            .free
            .iter()
            .find(|&(_, &avail)| avail >= size)
            .map(|(&ptr, &avail)| (ptr, avail))
            .ok_or_else(|| exhausted("heap", len))?;
        self.free.remove(&ptr);
        if avail > size {
            self.free.insert(ptr + size, avail - size);
        }
        self.used.insert(ptr, size);
        trace!(ptr, size, "heap alloc");
        Ok(HeapBlock { ptr, len })
    }

    /// Returns `block` to the free list, merging it with adjacent free blocks.
    ///
    /// # Panics
    ///
    /// If `block` was not handed out by this arena.
    pub fn heap_free(&mut self, block: HeapBlock) {
        let Some(mut size) = self.used.remove(&block.ptr) else {
            panic!("heap block at {} was not allocated by this arena", block.ptr);
        };
        let mut ptr = block.ptr;
        if let Some((&prev, &prev_len)) = self.free.range(..ptr).next_back() {
            if prev + prev_len == ptr {
                self.free.remove(&prev);
                ptr = prev;
                size += prev_len;
            }
        }
        if let Some(next_len) = self.free.remove(&(ptr + size)) {
            size += next_len;
        }
        self.free.insert(ptr, size);
        trace!(ptr = block.ptr, "heap free");
    }

    /// Bytes currently handed out from the heap region.
    pub fn heap_in_use(&self) -> usize {
        self.used.values().sum()
    }

    /// Number of disjoint free heap runs.
    pub fn heap_fragments(&self) -> usize {
        self.free.len()
    }
}

fn exhausted(region: &str, len: usize) -> Error {
    Error::Marshal(format!("{region} region exhausted allocating {len} bytes"))
}
