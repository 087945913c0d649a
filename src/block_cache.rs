// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use tracing::debug;

/// Produces the blocks a [BlockCache] memoizes. Production must be
/// deterministic: the same index always yields the same block.
pub trait BlockFactory {
    type Block;

    /// Bytes one block occupies, used for the memory budget.
    fn block_size_bytes(&self) -> usize;

    /// Builds block `index` from scratch.
    fn produce_block(&mut self, index: usize) -> Self::Block;
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BlockCacheError {
    #[error("Block {index} out of range, cache has {num_blocks} blocks")]
    OutOfRange { index: usize, num_blocks: usize },
}

struct Entry<B> {
    block: B,
    last_access: u64,
}

/// A fixed grid of lazily produced blocks with least-recently-used eviction.
pub struct BlockCache<F: BlockFactory> {
    factory: F,
    entries: Vec<Option<Entry<F::Block>>>,
    resident: usize,
    clock: u64,
    produced: u64,
}

impl<F: BlockFactory> BlockCache<F> {
    pub fn new(factory: F, num_blocks: usize) -> BlockCache<F> {
        let mut entries = Vec::with_capacity(num_blocks);
        entries.resize_with(num_blocks, || None);
        BlockCache {
            factory,
            entries,
            resident: 0,
            clock: 0,
            produced: 0,
        }
    }

    pub fn num_blocks(&self) -> usize {
        self.entries.len()
    }

    /// Changes the number of blocks. Every resident block is dropped.
    pub fn resize(&mut self, num_blocks: usize) {
        self.clear();
        self.entries.resize_with(num_blocks, || None);
    }

    /// Returns block `index`, producing it on a miss.
    pub fn get(&mut self, index: usize) -> Result<&F::Block, BlockCacheError> {
        let num_blocks = self.entries.len();
        let Some(slot) = self.entries.get_mut(index) else {
            return Err(BlockCacheError::OutOfRange { index, num_blocks });
        };

        self.clock += 1;
        let clock = self.clock;
        let mut produced = false;
        // The block is only inserted once fully built.
        let entry = slot.get_or_insert_with(|| {
            produced = true;
            Entry {
                block: self.factory.produce_block(index),
                last_access: clock,
            }
        });
        entry.last_access = clock;

        if produced {
            self.resident += self.factory.block_size_bytes();
            self.produced += 1;
        }
        Ok(&entry.block)
    }

    /// True if block `index` is resident.
    pub fn contains(&self, index: usize) -> bool {
        matches!(self.entries.get(index), Some(Some(_)))
    }

    /// Evicts least recently used blocks until at most `max_bytes` are
    /// resident. `age(0)` empties the cache.
    pub fn age(&mut self, max_bytes: usize) {
        if self.resident <= max_bytes {
            return;
        }
        if max_bytes == 0 {
            self.clear();
            return;
        }

        let mut resident: Vec<(u64, usize)> = self
            .entries
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.as_ref().map(|e| (e.last_access, i)))
            .collect();
        resident.sort_unstable();

        let block_bytes = self.factory.block_size_bytes();
        let before = self.resident;
        let mut evicted = 0;
        for (_, index) in resident {
            if self.resident <= max_bytes {
                break;
            }
            self.entries[index] = None;
            self.resident -= block_bytes;
            evicted += 1;
        }
        debug!(
            evicted,
            before,
            after = self.resident,
            max_bytes,
            "Aged block cache."
        );
    }

    /// Drops every resident block.
    pub fn clear(&mut self) {
        for entry in self.entries.iter_mut() {
            *entry = None;
        }
        self.resident = 0;
    }

    pub fn resident_bytes(&self) -> usize {
        self.resident
    }

    pub fn resident_blocks(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }

    /// Number of blocks the factory has produced over the cache's lifetime.
    pub fn produced_count(&self) -> u64 {
        self.produced
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Mutable access to the factory. Callers that change what the factory
    /// produces must clear the cache.
    pub fn factory_mut(&mut self) -> &mut F {
        &mut self.factory
    }
}
