mod block;

pub use block::Block;

use crate::{PostingWord, to_index};

use rayon::prelude::*;

use std::collections::BTreeMap;

// the root block lives in the first slab slot and is never freed
const ROOT: usize = 0;

/// Block-linked layout used for long posting lists.
///
/// Ids are distributed over a singly-linked list of blocks of at most
/// `max_block_elements` ids each, globally sorted across blocks. Blocks are
/// stored in a slab and linked by slab index; a map from each block's last id
/// to its slot serves random lookup without walking the list.
///
/// An upsert that overflows a block splits it, keeping the first half in
/// place. An erase that leaves a block under half occupancy refills it from
/// its successor, either by merging the two blocks or by pulling ids over
/// until the block is full again. The final block is exempt and may hold any
/// number of ids; the root block stays allocated even when the list is empty.
#[cfg_attr(feature = "mem_dbg", derive(mem_dbg::MemDbg, mem_dbg::MemSize))]
#[derive(Debug)]
pub struct BlockedPosting<W: PostingWord> {
    max_block_elements: usize,
    blocks: Vec<Block<W>>,
    free_slots: Vec<usize>,
    id_to_block: BTreeMap<W, usize>,
    num_ids: usize,
}

impl<W: PostingWord> BlockedPosting<W> {
    /// Creates an empty list with the given per-block id capacity.
    pub fn new(max_block_elements: usize) -> Self {
        assert!(max_block_elements >= 2);

        Self {
            max_block_elements,
            blocks: vec![Block::new()],
            free_slots: Vec::new(),
            id_to_block: BTreeMap::new(),
            num_ids: 0,
        }
    }

    // bulk construction from validated parallel arrays, one task per block
    pub(crate) fn from_sorted_parts(
        max_block_elements: usize,
        ids: &[W],
        offset_index: &[W],
        offsets: &[W],
    ) -> Self {
        assert!(max_block_elements >= 2);

        if ids.is_empty() {
            return Self::new(max_block_elements);
        }

        let num_blocks = ids.len().div_ceil(max_block_elements);

        let blocks: Vec<Block<W>> = (0..num_blocks)
            .into_par_iter()
            .map(|block_index| {
                let id_start = block_index * max_block_elements;
                let id_end = usize::min(id_start + max_block_elements, ids.len());

                let offsets_start = to_index(offset_index[id_start]);
                let offsets_end = if id_end < ids.len() {
                    to_index(offset_index[id_end])
                } else {
                    offsets.len()
                };

                let base = offset_index[id_start];

                Block {
                    ids: ids[id_start..id_end].to_vec(),
                    offsets: offsets[offsets_start..offsets_end].to_vec(),
                    offset_index: offset_index[id_start..id_end]
                        .iter()
                        .map(|&entry| entry - base)
                        .collect(),
                    next: (block_index + 1 < num_blocks).then_some(block_index + 1),
                }
            })
            .collect();

        let id_to_block = blocks
            .iter()
            .enumerate()
            .map(|(index, block)| (block.last_id().unwrap(), index))
            .collect();

        Self {
            max_block_elements,
            blocks,
            free_slots: Vec::new(),
            id_to_block,
            num_ids: ids.len(),
        }
    }

    pub fn max_block_elements(&self) -> usize {
        self.max_block_elements
    }

    /// The total number of ids across all blocks.
    pub fn num_ids(&self) -> usize {
        self.num_ids
    }

    /// The number of blocks holding ids, zero for an empty list (the root
    /// block stays allocated and is still reachable via [`root`](Self::root)).
    pub fn num_blocks(&self) -> usize {
        self.id_to_block.len()
    }

    /// The first block of the list.
    pub fn root(&self) -> &Block<W> {
        &self.blocks[ROOT]
    }

    /// Iterates over the blocks in ascending id order.
    pub fn blocks(&self) -> Blocks<'_, W> {
        Blocks {
            list: self,
            current: Some(ROOT),
        }
    }

    pub(crate) fn block_at(&self, index: usize) -> &Block<W> {
        &self.blocks[index]
    }

    /// The block containing the id, or `None` if the id is absent.
    ///
    /// Running time is in O(log b + log m) for b blocks of at most m ids.
    pub fn block_of(&self, id: W) -> Option<&Block<W>> {
        let (_, &index) = self.id_to_block.range(id..).next()?;
        let block = &self.blocks[index];

        block.ids.binary_search(&id).ok().map(|_| block)
    }

    pub fn contains(&self, id: W) -> bool {
        self.block_of(id).is_some()
    }

    pub fn offsets_of(&self, id: W) -> Option<&[W]> {
        let (_, &index) = self.id_to_block.range(id..).next()?;

        self.blocks[index].offsets_of(id)
    }

    /// Inserts the id with the given offsets, or replaces the stored offsets
    /// if the id is present. Ids may arrive in any order.
    pub fn upsert(&mut self, id: W, offsets: &[W]) {
        let target = self.target_block(id);
        let last_before = self.blocks[target].last_id();

        if self.blocks[target].len() < self.max_block_elements {
            if self.blocks[target].upsert(id, offsets) {
                self.num_ids += 1;
            }
            self.refresh_last_id(target, last_before);
            return;
        }

        // a full block holds at least two ids
        let target_last = last_before.unwrap();

        if self.blocks[target].next.is_none() && target_last < id {
            // appending past a full final block starts a fresh block instead
            // of splitting
            let fresh = self.allocate_block();
            self.blocks[fresh].upsert(id, offsets);
            self.blocks[target].next = Some(fresh);
            self.id_to_block.insert(id, fresh);
            self.num_ids += 1;
            return;
        }

        if self.blocks[target].upsert(id, offsets) {
            self.num_ids += 1;
        }

        if self.blocks[target].len() > self.max_block_elements {
            self.split(target);
        } else {
            self.refresh_last_id(target, last_before);
        }
    }

    /// Removes the id and its offsets. Erasing an absent id is a no-op.
    pub fn erase(&mut self, id: W) {
        let Some((&map_key, &index)) = self.id_to_block.range(id..).next() else {
            return;
        };

        if !self.blocks[index].erase(id) {
            return;
        }
        self.num_ids -= 1;

        let len = self.blocks[index].len();

        if len < self.max_block_elements / 2 {
            if let Some(next_index) = self.blocks[index].next {
                if len + self.blocks[next_index].len() <= self.max_block_elements {
                    self.merge_with_next(index, next_index, map_key);
                } else {
                    self.refill_from_next(index, next_index, map_key);
                }
                return;
            }
        }

        if len == 0 {
            // an emptied block never has a successor here, it would have been
            // refilled above
            self.id_to_block.remove(&map_key);
            if index != ROOT {
                self.unlink_tail_block(index, map_key);
            }
            return;
        }

        self.refresh_last_id(index, Some(map_key));
    }

    // the block whose last id is the smallest one >= id, or the final block
    fn target_block(&self, id: W) -> usize {
        if let Some((_, &index)) = self.id_to_block.range(id..).next() {
            index
        } else if let Some((_, &index)) = self.id_to_block.last_key_value() {
            index
        } else {
            ROOT
        }
    }

    fn allocate_block(&mut self) -> usize {
        if let Some(index) = self.free_slots.pop() {
            self.blocks[index] = Block::new();
            index
        } else {
            self.blocks.push(Block::new());
            self.blocks.len() - 1
        }
    }

    fn split(&mut self, index: usize) {
        let keep = self.max_block_elements.div_ceil(2);
        let mut tail = self.blocks[index].split_tail(keep);
        tail.next = self.blocks[index].next;

        let tail_last = tail.last_id().unwrap();
        let fresh = self.allocate_block();
        self.blocks[fresh] = tail;
        self.blocks[index].next = Some(fresh);

        // the map entry of the old last id now belongs to the tail block
        self.id_to_block.insert(tail_last, fresh);
        let head_last = self.blocks[index].last_id().unwrap();
        self.id_to_block.insert(head_last, index);
    }

    fn merge_with_next(&mut self, index: usize, next_index: usize, map_key: W) {
        let next_last = self.blocks[next_index].last_id().unwrap();
        let next_count = self.blocks[next_index].len();

        let (block, next_block) = two_blocks_mut(&mut self.blocks, index, next_index);
        block.take_from_front(next_block, next_count);

        self.blocks[index].next = self.blocks[next_index].next;
        self.free_slots.push(next_index);

        self.id_to_block.remove(&map_key);
        self.id_to_block.insert(next_last, index);
    }

    // only part of the successor fits, pull ids over until this block is full
    fn refill_from_next(&mut self, index: usize, next_index: usize, map_key: W) {
        let take = self.max_block_elements - self.blocks[index].len();

        let (block, next_block) = two_blocks_mut(&mut self.blocks, index, next_index);
        block.take_from_front(next_block, take);

        // the successor keeps its last id, only this block's map entry moves
        let last_after = self.blocks[index].last_id().unwrap();
        self.id_to_block.remove(&map_key);
        self.id_to_block.insert(last_after, index);
    }

    fn unlink_tail_block(&mut self, index: usize, map_key: W) {
        // the predecessor owns the next smaller last id
        let (_, &previous) = self.id_to_block.range(..map_key).next_back().unwrap();

        self.blocks[previous].next = None;
        self.free_slots.push(index);
    }

    fn refresh_last_id(&mut self, index: usize, last_before: Option<W>) {
        let last_after = self.blocks[index].last_id();

        if last_before == last_after {
            return;
        }

        if let Some(last_before) = last_before {
            self.id_to_block.remove(&last_before);
        }

        if let Some(last_after) = last_after {
            self.id_to_block.insert(last_after, index);
        }
    }
}

/// Iterator over the blocks of a [`BlockedPosting`] in ascending id order.
pub struct Blocks<'a, W: PostingWord> {
    list: &'a BlockedPosting<W>,
    current: Option<usize>,
}

impl<'a, W: PostingWord> Iterator for Blocks<'a, W> {
    type Item = &'a Block<W>;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.current?;
        let block = &self.list.blocks[index];
        self.current = block.next;

        Some(block)
    }
}

fn two_blocks_mut<W: PostingWord>(
    blocks: &mut [Block<W>],
    first: usize,
    second: usize,
) -> (&mut Block<W>, &mut Block<W>) {
    debug_assert_ne!(first, second);

    if first < second {
        let (left, right) = blocks.split_at_mut(second);
        (&mut left[first], &mut right[0])
    } else {
        let (left, right) = blocks.split_at_mut(first);
        (&mut right[0], &mut left[second])
    }
}
