// src/tokenizer/arena.rs

//! Block arena for per-call records.
//!
//! Records are appended to fixed-capacity blocks. A full block is never
//! grown, a new one is started instead, so no record is ever moved once
//! allocated. Nothing is freed individually; every record lives until the
//! arena itself is dropped.

use std::ops::Index;

/// Default number of records per block.
pub const DEFAULT_BLOCK_SIZE: usize = 256;

/// Handle to a record allocated from an [`Arena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArenaId(usize);

#[derive(Debug)]
pub struct Arena<T> {
    blocks: Vec<Vec<T>>,
    block_size: usize,
    len: usize,
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self::with_block_size(DEFAULT_BLOCK_SIZE)
    }

    /// Creates an arena whose first block is allocated eagerly.
    /// A `block_size` of zero is treated as one.
    pub fn with_block_size(block_size: usize) -> Self {
        let block_size = block_size.max(1);
        Self {
            blocks: vec![Vec::with_capacity(block_size)],
            block_size,
            len: 0,
        }
    }

    /// Moves `value` into the arena and returns its handle.
    pub fn alloc(&mut self, value: T) -> ArenaId {
        match self.blocks.last_mut() {
            Some(block) if block.len() < self.block_size => block.push(value),
            _ => {
                let mut block = Vec::with_capacity(self.block_size);
                block.push(value);
                self.blocks.push(block);
            }
        }
        let id = ArenaId(self.len);
        self.len += 1;
        id
    }

    #[cfg(test)]
    fn get(&self, id: ArenaId) -> Option<&T> {
        self.blocks
            .get(id.0 / self.block_size)
            .and_then(|block| block.get(id.0 % self.block_size))
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    #[cfg(test)]
    fn block_size(&self) -> usize {
        self.block_size
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Index<ArenaId> for Arena<T> {
    type Output = T;

    fn index(&self, id: ArenaId) -> &T {
        &self.blocks[id.0 / self.block_size][id.0 % self.block_size]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_and_index() {
        let mut arena = Arena::with_block_size(4);
        let a = arena.alloc("a");
        let b = arena.alloc("b");

        assert_eq!(arena[a], "a");
        assert_eq!(arena[b], "b");
        assert_eq!(arena.len(), 2);
        assert!(!arena.is_empty());
    }

    #[test]
    fn test_grows_by_whole_blocks() {
        let mut arena = Arena::<usize>::with_block_size(2);
        assert_eq!(arena.block_count(), 1);

        let ids: Vec<ArenaId> = (0..5).map(|i| arena.alloc(i)).collect();

        assert_eq!(arena.block_count(), 3);
        for (expected, id) in ids.into_iter().enumerate() {
            assert_eq!(arena[id], expected);
        }
    }

    #[test]
    fn test_records_do_not_move() {
        let mut arena = Arena::with_block_size(3);
        let first = arena.alloc(10u64);
        let addr = &arena[first] as *const u64;

        for i in 0..100 {
            arena.alloc(i);
        }

        assert_eq!(&arena[first] as *const u64, addr);
        assert_eq!(arena[first], 10);
    }

    #[test]
    fn test_zero_block_size_is_clamped() {
        let mut arena = Arena::with_block_size(0);
        let id = arena.alloc('x');
        assert_eq!(arena.block_size(), 1);
        assert_eq!(arena.get(id), Some(&'x'));
    }

    #[test]
    fn test_get_out_of_range() {
        let mut arena: Arena<u8> = Arena::new();
        assert!(arena.is_empty());
        let id = arena.alloc(1);
        assert_eq!(arena.get(id), Some(&1));
        assert_eq!(arena.get(ArenaId(7)), None);
    }
}
