//! C4 backing store: a chunked arena of [`ImmixBlock`]s. Adapted from the
//! teacher's `ImmixSpace`, with `ChunkMap` dropped in favor of walking the
//! chunk list directly — this crate's Immix arena is sized in the tens of
//! megabytes, not the teacher's multi-gigabyte one, so a full scan per
//! collection is cheap enough to not need a bitmap of "which chunks are
//! actually touched". Unlike the teacher, the list can grow at runtime
//! (§4.4's chunk extension).

use super::block::{ImmixBlock, IMMIX_BLOCK_SIZE};
use super::chunk::{Chunk, CHUNK_BLOCKS, CHUNK_SIZE};
use crate::header::HeapObjectHeader;
use crate::mmap::Mmap;
use crate::util::align_up;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Each chunk is its own `mmap` reservation rather than a slice of one big
/// one, so the arena can grow by reserving another chunk instead of needing
/// to pre-reserve its eventual maximum size up front (§4.4's "request a
/// chunk extension").
pub struct ImmixSpace {
    chunks: Mutex<Vec<Mmap>>,
    free_blocks: super::block::BlockList,
    reusable_blocks: super::block::BlockList,
    pub num_bytes_allocated: AtomicUsize,
}

impl ImmixSpace {
    pub fn new(size: usize) -> Self {
        let size = align_up(size, CHUNK_SIZE);
        let n_chunks = size / CHUNK_SIZE;
        let free_blocks = super::block::BlockList::new();
        let mut chunks = Vec::with_capacity(n_chunks.max(1));
        for _ in 0..n_chunks.max(1) {
            chunks.push(Self::reserve_chunk(&free_blocks));
        }
        Self {
            chunks: Mutex::new(chunks),
            free_blocks,
            reusable_blocks: super::block::BlockList::new(),
            num_bytes_allocated: AtomicUsize::new(0),
        }
    }

    /// Reserve one fresh chunk and seed its blocks (all but block 0, which
    /// holds the line-mark table) onto `free_blocks`.
    fn reserve_chunk(free_blocks: &super::block::BlockList) -> Mmap {
        let map = Mmap::new(CHUNK_SIZE, CHUNK_SIZE);
        let start = map.aligned_start(CHUNK_SIZE);
        unsafe {
            let chunk = &*Chunk::at(start);
            for b in 1..CHUNK_BLOCKS {
                let block = chunk.block(b);
                (*block).deinit();
                free_blocks.push(block);
            }
        }
        map
    }

    /// Reserve and bring online one more chunk (§4.4's sweep-phase chunk
    /// extension, requested once the post-sweep live fraction exceeds 90%).
    /// Unlike the startup chunks, its blocks land on `free_blocks` only —
    /// there is no in-progress mark epoch for a block that didn't exist
    /// when `prepare` ran this cycle.
    pub fn extend(&self) {
        let map = Self::reserve_chunk(&self.free_blocks);
        self.chunks.lock().push(map);
    }

    pub fn capacity_bytes(&self) -> usize {
        self.chunks.lock().len() * CHUNK_SIZE
    }

    pub fn has_address(&self, ptr: *const u8) -> bool {
        self.chunks.lock().iter().any(|map| {
            let start = map.aligned_start(CHUNK_SIZE);
            (ptr as usize) >= start as usize && (ptr as usize) < map.end() as usize
        })
    }

    pub fn release_block(&self, block: *mut ImmixBlock) {
        unsafe {
            (*block).deinit();
            let chunk_start = super::chunk::Chunk::align(block as *const u8);
            if let Some(map) = self
                .chunks
                .lock()
                .iter()
                .find(|map| map.aligned_start(CHUNK_SIZE) == chunk_start)
            {
                map.dontneed(block.cast(), IMMIX_BLOCK_SIZE);
            }
        }
        self.free_blocks.push(block);
    }

    pub fn push_reusable(&self, block: *mut ImmixBlock) {
        self.reusable_blocks.push(block);
    }

    pub fn get_clean_block(&self) -> Option<*mut ImmixBlock> {
        let block = self.free_blocks.pop();
        if block.is_null() {
            return None;
        }
        unsafe { (*block).init() };
        Some(block)
    }

    pub fn get_reusable_block(&self) -> Option<*mut ImmixBlock> {
        let block = self.reusable_blocks.pop();
        if block.is_null() {
            None
        } else {
            Some(block)
        }
    }

    /// Set the line marks spanned by `header`'s object.
    pub fn mark_object_lines(&self, header: *const HeapObjectHeader) {
        unsafe {
            let block = ImmixBlock::from_object(header as *const u8);
            let chunk = &*(*block).chunk();
            let size = (*header).size();
            let start = header as *const u8;
            let end = start.add(size);
            let mut line =
                crate::util::align_down(start as usize, super::block::IMMIX_LINE_SIZE) as *mut u8;
            while (line as *const u8) < end {
                chunk.mark_line(line);
                line = line.add(super::block::IMMIX_LINE_SIZE);
            }
        }
    }

    /// Reset line marks in every chunk ahead of a mark phase.
    pub fn prepare(&self) {
        for map in self.chunks.lock().iter() {
            unsafe {
                let chunk = &*Chunk::at(map.aligned_start(CHUNK_SIZE));
                chunk.prepare();
            }
        }
    }

    /// Sweep every chunk against the marks this cycle left behind.
    pub fn release(&self) {
        self.reusable_blocks.reset();
        self.free_blocks.reset();
        for map in self.chunks.lock().iter() {
            unsafe {
                let chunk = &*Chunk::at(map.aligned_start(CHUNK_SIZE));
                chunk.sweep(self);
            }
        }
    }

    pub fn live_bytes(&self) -> usize {
        self.num_bytes_allocated.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::block::BlockState;

    #[test]
    fn fresh_space_yields_clean_blocks() {
        let space = ImmixSpace::new(CHUNK_SIZE);
        let block = space.get_clean_block().expect("space has free blocks");
        assert_eq!(unsafe { (*block).state() }, BlockState::Unmarked);
    }

    #[test]
    fn has_address_bounds_check() {
        let space = ImmixSpace::new(CHUNK_SIZE);
        let block = space.get_clean_block().unwrap();
        assert!(space.has_address(block.cast()));
        assert!(!space.has_address(std::ptr::null()));
    }
}
