//! Small-object pool used for per-step solver scratch.
//!
//! Requests up to [`MAX_BLOCK_SIZE`] bytes are rounded up to one of a fixed
//! set of size classes and served from 16 KiB chunks. Every chunk is carved
//! into equal blocks that are threaded into a per-class free list; the link
//! of a free block lives in the block's own first two words. Freed blocks are
//! pushed on the front of their list, so the next allocation of the same
//! class reuses them (LIFO). Larger requests bypass the pool and get their
//! own heap buffer.
//!
//! Blocks are addressed through copyable [`Block`] handles instead of raw
//! pointers. A handle is only meaningful for the allocator that issued it and
//! only until the next [`BlockAllocator::clear`].

use bytemuck::Pod;
use tracing::{trace, warn};

use crate::error::{PhysicsError, Result};
use crate::settings::AllocatorConfig;

/// Block size of every size class, ascending.
pub const BLOCK_SIZES: [usize; 14] = [
    16, 32, 64, 96, 128, 160, 192, 224, 256, 320, 384, 448, 512, 640,
];

/// Largest request served from the pool.
pub const MAX_BLOCK_SIZE: usize = BLOCK_SIZES[BLOCK_SIZES.len() - 1];

/// Bytes per chunk.
pub const CHUNK_SIZE: usize = 16 * 1024;

/// Chunk table growth step.
const CHUNK_ARRAY_INCREMENT: usize = 128;

const WORD: usize = std::mem::size_of::<u32>();
const CHUNK_WORDS: usize = CHUNK_SIZE / WORD;

const ALLOC_PATTERN: u32 = 0xcdcd_cdcd;
const FREE_PATTERN: u32 = 0xfdfd_fdfd;

/// Size in bytes -> size class, for every size in `1..=MAX_BLOCK_SIZE`.
static SIZE_CLASS_LOOKUP: [u8; MAX_BLOCK_SIZE + 1] = build_size_class_lookup();

const fn build_size_class_lookup() -> [u8; MAX_BLOCK_SIZE + 1] {
    assert!(BLOCK_SIZES.len() < u8::MAX as usize);

    let mut table = [0u8; MAX_BLOCK_SIZE + 1];
    let mut class = 0;
    let mut size = 1;
    while size <= MAX_BLOCK_SIZE {
        if size > BLOCK_SIZES[class] {
            class += 1;
        }
        table[size] = class as u8;
        size += 1;
    }
    table
}

/// Size class index serving a request of `size` bytes, or `None` when the
/// request is empty or too large for the pool.
#[inline]
pub fn size_class(size: usize) -> Option<usize> {
    if size == 0 || size > MAX_BLOCK_SIZE {
        None
    } else {
        Some(SIZE_CLASS_LOOKUP[size] as usize)
    }
}

/// Block size actually handed out for a request of `size` bytes.
#[inline]
pub fn class_block_size(size: usize) -> Option<usize> {
    size_class(size).map(|class| BLOCK_SIZES[class])
}

/// Handle to an allocated region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Block(BlockRepr);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum BlockRepr {
    Pooled { class: u8, chunk: u32, slot: u32 },
    Large { slot: u32 },
}

impl Block {
    /// Whether this block was served from a pooled size class.
    pub fn is_pooled(&self) -> bool {
        matches!(self.0, BlockRepr::Pooled { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FreeLink {
    chunk: u32,
    slot: u32,
}

struct Chunk {
    class: u8,
    words: Box<[u32]>,
}

impl Chunk {
    #[inline]
    fn block_words(&self) -> usize {
        BLOCK_SIZES[self.class as usize] / WORD
    }

    #[inline]
    fn block_count(&self) -> u32 {
        (CHUNK_SIZE / BLOCK_SIZES[self.class as usize]) as u32
    }

    fn block(&self, slot: u32) -> &[u32] {
        let n = self.block_words();
        let start = slot as usize * n;
        &self.words[start..start + n]
    }

    fn block_mut(&mut self, slot: u32) -> &mut [u32] {
        let n = self.block_words();
        let start = slot as usize * n;
        &mut self.words[start..start + n]
    }

    fn next_link(&self, slot: u32) -> Option<FreeLink> {
        let words = self.block(slot);
        match words[0] {
            0 => None,
            chunk_plus_one => Some(FreeLink {
                chunk: chunk_plus_one - 1,
                slot: words[1],
            }),
        }
    }

    fn set_next_link(&mut self, slot: u32, next: Option<FreeLink>) {
        let words = self.block_mut(slot);
        match next {
            Some(link) => {
                words[0] = link.chunk + 1;
                words[1] = link.slot;
            }
            None => {
                words[0] = 0;
                words[1] = 0;
            }
        }
    }
}

/// Size-class pool allocator. Not synchronized; one instance per stepping
/// context.
pub struct BlockAllocator {
    config: AllocatorConfig,
    chunks: Vec<Chunk>,
    free_lists: [Option<FreeLink>; BLOCK_SIZES.len()],
    large: Vec<Option<Box<[u32]>>>,
    large_free: Vec<u32>,
}

impl Default for BlockAllocator {
    fn default() -> Self {
        Self::new(AllocatorConfig::default())
    }
}

impl BlockAllocator {
    pub fn new(config: AllocatorConfig) -> Self {
        Self {
            config,
            chunks: Vec::with_capacity(CHUNK_ARRAY_INCREMENT),
            free_lists: [None; BLOCK_SIZES.len()],
            large: Vec::new(),
            large_free: Vec::new(),
        }
    }

    pub fn config(&self) -> AllocatorConfig {
        self.config
    }

    /// Number of pool chunks currently owned.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Number of live oversized allocations.
    pub fn large_count(&self) -> usize {
        self.large.iter().filter(|b| b.is_some()).count()
    }

    /// Allocate at least `size` bytes. Returns `None` for `size == 0`.
    pub fn allocate(&mut self, size: usize) -> Option<Block> {
        if size == 0 {
            return None;
        }

        let Some(class) = size_class(size) else {
            return Some(self.allocate_large(size));
        };

        if let Some(head) = self.free_lists[class] {
            let next = self.chunks[head.chunk as usize].next_link(head.slot);
            self.free_lists[class] = next;
            return Some(Block(BlockRepr::Pooled {
                class: class as u8,
                chunk: head.chunk,
                slot: head.slot,
            }));
        }

        Some(self.grow(class))
    }

    fn grow(&mut self, class: usize) -> Block {
        if self.chunks.len() == self.chunks.capacity() {
            self.chunks.reserve_exact(CHUNK_ARRAY_INCREMENT);
        }

        let fill = if self.config.validate { ALLOC_PATTERN } else { 0 };
        let mut chunk = Chunk {
            class: class as u8,
            words: vec![fill; CHUNK_WORDS].into_boxed_slice(),
        };
        let chunk_index = self.chunks.len() as u32;
        let block_count = chunk.block_count();
        debug_assert!(block_count as usize * BLOCK_SIZES[class] <= CHUNK_SIZE);

        for slot in 0..block_count - 1 {
            chunk.set_next_link(
                slot,
                Some(FreeLink {
                    chunk: chunk_index,
                    slot: slot + 1,
                }),
            );
        }
        chunk.set_next_link(block_count - 1, None);

        self.free_lists[class] = chunk.next_link(0);
        self.chunks.push(chunk);

        trace!(
            class,
            block_size = BLOCK_SIZES[class],
            chunks = self.chunks.len(),
            "block allocator grew"
        );

        Block(BlockRepr::Pooled {
            class: class as u8,
            chunk: chunk_index,
            slot: 0,
        })
    }

    fn allocate_large(&mut self, size: usize) -> Block {
        let buffer = vec![0u32; size.div_ceil(WORD)].into_boxed_slice();
        let slot = match self.large_free.pop() {
            Some(slot) => {
                self.large[slot as usize] = Some(buffer);
                slot
            }
            None => {
                self.large.push(Some(buffer));
                (self.large.len() - 1) as u32
            }
        };
        Block(BlockRepr::Large { slot })
    }

    /// Return a block obtained from [`allocate`](Self::allocate) with the
    /// same `size`. A zero `size` is a no-op.
    ///
    /// Unknown handles are always rejected. Size mismatches and double frees
    /// are only detected when validation is enabled.
    pub fn free(&mut self, block: Block, size: usize) -> Result<()> {
        if size == 0 {
            return Ok(());
        }

        match block.0 {
            BlockRepr::Large { slot } => self.free_large(slot, size),
            BlockRepr::Pooled { class, chunk, slot } => self.free_pooled(class, chunk, slot, size),
        }
    }

    fn free_large(&mut self, slot: u32, size: usize) -> Result<()> {
        let validate = self.config.validate;
        if validate && size <= MAX_BLOCK_SIZE {
            return Err(reject("pooled size used to free an oversized block"));
        }
        let Some(entry) = self.large.get_mut(slot as usize) else {
            return Err(PhysicsError::UnknownBlock);
        };
        if entry.take().is_some() {
            self.large_free.push(slot);
            Ok(())
        } else if validate {
            Err(reject("oversized block freed twice"))
        } else {
            Ok(())
        }
    }

    fn free_pooled(&mut self, class: u8, chunk: u32, slot: u32, size: usize) -> Result<()> {
        let Some(owner) = self.chunks.get(chunk as usize) else {
            return Err(PhysicsError::UnknownBlock);
        };
        if owner.class != class || slot >= owner.block_count() {
            return Err(PhysicsError::UnknownBlock);
        }

        if self.config.validate {
            if size_class(size) != Some(class as usize) {
                return Err(reject("size does not match the block's size class"));
            }
            if self.is_free(class as usize, FreeLink { chunk, slot }) {
                return Err(reject("block freed twice"));
            }
        }

        let head = self.free_lists[class as usize];
        let owner = &mut self.chunks[chunk as usize];
        if self.config.validate {
            owner.block_mut(slot).fill(FREE_PATTERN);
        }
        owner.set_next_link(slot, head);
        self.free_lists[class as usize] = Some(FreeLink { chunk, slot });
        Ok(())
    }

    fn is_free(&self, class: usize, target: FreeLink) -> bool {
        let mut cursor = self.free_lists[class];
        while let Some(link) = cursor {
            if link == target {
                return true;
            }
            cursor = self.chunks[link.chunk as usize].next_link(link.slot);
        }
        false
    }

    /// Release every chunk and oversized buffer. Outstanding handles become
    /// invalid; the allocator stays usable.
    pub fn clear(&mut self) {
        self.chunks.clear();
        self.free_lists = [None; BLOCK_SIZES.len()];
        self.large.clear();
        self.large_free.clear();
    }

    /// Contents of an allocated block. Pooled blocks expose their whole size
    /// class, which may exceed the requested size.
    pub fn bytes(&self, block: &Block) -> Result<&[u8]> {
        let words = match block.0 {
            BlockRepr::Pooled { class, chunk, slot } => {
                let owner = self
                    .chunks
                    .get(chunk as usize)
                    .filter(|c| c.class == class && slot < c.block_count())
                    .ok_or(PhysicsError::UnknownBlock)?;
                owner.block(slot)
            }
            BlockRepr::Large { slot } => self
                .large
                .get(slot as usize)
                .and_then(|b| b.as_deref())
                .ok_or(PhysicsError::UnknownBlock)?,
        };
        Ok(bytemuck::cast_slice(words))
    }

    /// Mutable contents of an allocated block.
    pub fn bytes_mut(&mut self, block: &Block) -> Result<&mut [u8]> {
        let words = match block.0 {
            BlockRepr::Pooled { class, chunk, slot } => {
                let owner = self
                    .chunks
                    .get_mut(chunk as usize)
                    .filter(|c| c.class == class && slot < c.block_count())
                    .ok_or(PhysicsError::UnknownBlock)?;
                owner.block_mut(slot)
            }
            BlockRepr::Large { slot } => self
                .large
                .get_mut(slot as usize)
                .and_then(|b| b.as_deref_mut())
                .ok_or(PhysicsError::UnknownBlock)?,
        };
        Ok(bytemuck::cast_slice_mut(words))
    }

    /// Allocate a block sized for `T` and move `value` into it.
    pub fn alloc_pod<T: Pod>(&mut self, value: T) -> Result<Block> {
        let size = std::mem::size_of::<T>();
        let block = self
            .allocate(size)
            .ok_or(PhysicsError::ZeroSizedAllocation)?;
        *self.pod_mut::<T>(&block)? = value;
        Ok(block)
    }

    /// View a block as a `T`.
    pub fn pod<T: Pod>(&self, block: &Block) -> Result<&T> {
        let size = std::mem::size_of::<T>();
        let bytes = self.bytes(block)?;
        if bytes.len() < size {
            return Err(PhysicsError::BlockTooSmall {
                needed: size,
                available: bytes.len(),
            });
        }
        Ok(bytemuck::try_from_bytes(&bytes[..size])?)
    }

    /// Mutably view a block as a `T`.
    pub fn pod_mut<T: Pod>(&mut self, block: &Block) -> Result<&mut T> {
        let size = std::mem::size_of::<T>();
        let bytes = self.bytes_mut(block)?;
        let available = bytes.len();
        if available < size {
            return Err(PhysicsError::BlockTooSmall {
                needed: size,
                available,
            });
        }
        Ok(bytemuck::try_from_bytes_mut(&mut bytes[..size])?)
    }

    /// Free a block allocated with [`alloc_pod`](Self::alloc_pod).
    pub fn free_pod<T: Pod>(&mut self, block: Block) -> Result<()> {
        self.free(block, std::mem::size_of::<T>())
    }
}

fn reject(reason: &'static str) -> PhysicsError {
    warn!(reason, "block allocator rejected free");
    PhysicsError::InvalidFree { reason }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validating() -> BlockAllocator {
        BlockAllocator::new(AllocatorConfig { validate: true })
    }

    #[test]
    fn test_size_class_monotonic_and_sufficient() {
        let mut previous = 0;
        for size in 1..=MAX_BLOCK_SIZE {
            let block_size = class_block_size(size).unwrap();
            assert!(block_size >= size, "class {block_size} too small for {size}");
            assert!(block_size >= previous, "class shrank at size {size}");
            previous = block_size;
        }
        assert_eq!(class_block_size(1), Some(16));
        assert_eq!(class_block_size(16), Some(16));
        assert_eq!(class_block_size(17), Some(32));
        assert_eq!(class_block_size(641), None);
        assert_eq!(size_class(0), None);
    }

    #[test]
    fn test_roundtrip_reuses_freed_block() {
        let mut allocator = validating();
        for size in 1..=MAX_BLOCK_SIZE {
            let block = allocator.allocate(size).unwrap();
            let bytes = allocator.bytes_mut(&block).unwrap();
            assert!(bytes.len() >= size);
            bytes[..size].fill(0xab);
            allocator.free(block, size).unwrap();

            let again = allocator.allocate(size).unwrap();
            assert_eq!(again, block, "freed block not reused for size {size}");
            allocator.free(again, size).unwrap();
        }
        assert_eq!(allocator.chunk_count(), BLOCK_SIZES.len());
    }

    #[test]
    fn test_lifo_reuse_order() {
        let mut allocator = validating();
        let a = allocator.allocate(40).unwrap();
        let b = allocator.allocate(40).unwrap();
        assert_ne!(a, b);
        allocator.free(a, 40).unwrap();
        allocator.free(b, 40).unwrap();
        assert_eq!(allocator.allocate(40), Some(b));
        assert_eq!(allocator.allocate(40), Some(a));
    }

    #[test]
    fn test_zero_size_is_noop() {
        let mut allocator = validating();
        assert!(allocator.allocate(0).is_none());
        let block = allocator.allocate(8).unwrap();
        assert!(allocator.free(block, 0).is_ok());
        assert!(allocator.free(block, 8).is_ok());
    }

    #[test]
    fn test_chunk_grows_when_exhausted() {
        let mut allocator = validating();
        let per_chunk = CHUNK_SIZE / 16;
        let blocks: Vec<Block> = (0..=per_chunk)
            .map(|_| allocator.allocate(16).unwrap())
            .collect();
        assert_eq!(allocator.chunk_count(), 2);
        for block in blocks {
            allocator.free(block, 16).unwrap();
        }
        // Everything fits in the existing chunks again.
        for _ in 0..=per_chunk {
            allocator.allocate(16).unwrap();
        }
        assert_eq!(allocator.chunk_count(), 2);
    }

    #[test]
    fn test_large_allocation_bypasses_pool() {
        let mut allocator = validating();
        let block = allocator.allocate(4096).unwrap();
        assert!(!block.is_pooled());
        assert!(allocator.bytes(&block).unwrap().len() >= 4096);
        assert_eq!(allocator.chunk_count(), 0);
        assert_eq!(allocator.large_count(), 1);
        allocator.free(block, 4096).unwrap();
        assert_eq!(allocator.large_count(), 0);
        assert_eq!(allocator.bytes(&block), Err(PhysicsError::UnknownBlock));
    }

    #[test]
    fn test_validation_catches_double_free() {
        let mut allocator = validating();
        let block = allocator.allocate(100).unwrap();
        allocator.free(block, 100).unwrap();
        assert!(matches!(
            allocator.free(block, 100),
            Err(PhysicsError::InvalidFree { .. })
        ));
    }

    #[test]
    fn test_validation_catches_size_mismatch() {
        let mut allocator = validating();
        let block = allocator.allocate(100).unwrap();
        assert!(matches!(
            allocator.free(block, 10),
            Err(PhysicsError::InvalidFree { .. })
        ));

        let mut trusting = BlockAllocator::new(AllocatorConfig { validate: false });
        let block = trusting.allocate(100).unwrap();
        assert!(trusting.free(block, 100).is_ok());
    }

    #[test]
    fn test_validation_fills_freed_memory() {
        let mut allocator = validating();
        let block = allocator.allocate(64).unwrap();
        allocator.bytes_mut(&block).unwrap().fill(0);
        allocator.free(block, 64).unwrap();
        let bytes = allocator.bytes(&block).unwrap();
        // The first eight bytes hold the free-list link.
        assert!(bytes[8..].iter().all(|&b| b == 0xfd));
    }

    #[test]
    fn test_clear_releases_chunks() {
        let mut allocator = validating();
        let block = allocator.allocate(32).unwrap();
        allocator.allocate(2000).unwrap();
        allocator.clear();
        assert_eq!(allocator.chunk_count(), 0);
        assert_eq!(allocator.large_count(), 0);
        assert_eq!(allocator.free(block, 32), Err(PhysicsError::UnknownBlock));
        assert!(allocator.allocate(32).is_some());
    }

    #[test]
    fn test_pod_roundtrip() {
        #[repr(C)]
        #[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
        struct Scratch {
            impulse: [f32; 3],
            index: u32,
        }

        let mut allocator = validating();
        let value = Scratch {
            impulse: [1.0, -2.0, 0.5],
            index: 7,
        };
        let block = allocator.alloc_pod(value).unwrap();
        assert_eq!(*allocator.pod::<Scratch>(&block).unwrap(), value);
        allocator.pod_mut::<Scratch>(&block).unwrap().index = 9;
        assert_eq!(allocator.pod::<Scratch>(&block).unwrap().index, 9);
        allocator.free_pod::<Scratch>(block).unwrap();
    }
}
