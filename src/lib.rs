/*! This library contains the posting-list core of an inverted-index search engine.
 *
 * For every indexable term, a [`Posting`] stores the sorted set of document ids
 * containing the term, together with the positional offsets of the occurrences
 * inside each document. The list supports insertion, update, deletion, random
 * lookup and multi-way sorted [intersection](intersect) across several lists.
 *
 * Two layouts are used internally. Short lists live in a single flat buffer of
 * interleaved records ([`CompactPosting`]). Once a list grows past a configured
 * word threshold, it is promoted in place to a linked list of bounded blocks
 * ([`BlockedPosting`]), which keeps random mutations cheap and lets the
 * intersection skip whole blocks by their largest id.
 *
 * ## Usage
 *
 * The following is a basic example of how to use this library:
 *
 * ```
 * use postdex::{PostingConfig, intersect};
 *
 * let rock = PostingConfig::new().new_posting(&[2u32, 5, 9], &[0, 2, 4], &[14, 27, 3, 8, 51, 60]);
 *
 * let mut jazz = PostingConfig::new().new_posting::<u32>(&[], &[], &[]);
 * jazz.upsert(5, &[11, 19]);
 * jazz.upsert(9, &[4]);
 * jazz.upsert(12, &[0, 1]);
 *
 * assert!(rock.contains(5));
 * assert_eq!(rock.offsets_of(9), Some(&[51, 60][..]));
 * assert_eq!(intersect(&[&rock, &jazz]), vec![5, 9]);
 * ```
 *
 * More information about the block layout and its rebalancing guarantees can be
 * found in the struct-level documentation of [`BlockedPosting`], and about the
 * promotion threshold in [`PostingConfig`].
 *
 * ## Threading model
 *
 * A single posting list is a single-writer structure and requires external
 * synchronization. Distinct lists may be mutated in parallel without
 * coordination. [`intersect`] requires that none of its inputs is mutated for
 * the duration of the call.
 */

mod blocked;
mod compact;
mod config;
mod intersect;

use num_traits::{NumCast, PrimInt, Unsigned};

#[doc(inline)]
pub use blocked::{Block, BlockedPosting, Blocks};
#[doc(inline)]
pub use compact::{CompactPosting, Records};
#[doc(inline)]
pub use config::PostingConfig;
#[doc(inline)]
pub use intersect::intersect;

/// A posting list that hides which of the two internal layouts is in use.
///
/// Created via [`PostingConfig::new_posting`]. Freshly created lists start in
/// the compact layout unless the initial records already exceed the configured
/// word threshold. An upsert that would push a compact list past the threshold
/// first converts the list to the blocked layout; the conversion is one-way.
#[cfg_attr(feature = "mem_dbg", derive(mem_dbg::MemDbg, mem_dbg::MemSize))]
pub struct Posting<W: PostingWord = u32> {
    config: PostingConfig,
    repr: Repr<W>,
}

#[cfg_attr(feature = "mem_dbg", derive(mem_dbg::MemDbg, mem_dbg::MemSize))]
pub(crate) enum Repr<W: PostingWord> {
    Compact(CompactPosting<W>),
    Blocked(BlockedPosting<W>),
}

impl<W: PostingWord> Posting<W> {
    pub(crate) fn from_compact(config: PostingConfig, compact: CompactPosting<W>) -> Self {
        Self {
            config,
            repr: Repr::Compact(compact),
        }
    }

    pub(crate) fn from_blocked(config: PostingConfig, blocked: BlockedPosting<W>) -> Self {
        Self {
            config,
            repr: Repr::Blocked(blocked),
        }
    }

    pub(crate) fn repr(&self) -> &Repr<W> {
        &self.repr
    }

    /// Inserts the id with the given occurrence offsets, or replaces the
    /// stored offsets if the id is already present.
    ///
    /// Offsets are stored exactly as provided, including duplicates and empty
    /// sequences. Ids may arrive in any order.
    pub fn upsert(&mut self, id: W, offsets: &[W]) {
        if let Repr::Compact(compact) = &mut self.repr {
            let required = compact.upsert_required_words(id, offsets.len());

            if required <= self.config.compact_threshold_words {
                if required > compact.capacity() {
                    // grow by a quarter over the required word count
                    compact.reallocate(required + required.div_ceil(4));
                }

                let applied = compact.upsert(id, offsets);
                debug_assert!(applied);
                return;
            }

            // crossing the threshold converts the list before the upsert lands
            self.promote();
        }

        if let Repr::Blocked(blocked) = &mut self.repr {
            blocked.upsert(id, offsets);
        }
    }

    /// Removes the id and its offsets. Erasing an absent id is a no-op.
    pub fn erase(&mut self, id: W) {
        match &mut self.repr {
            Repr::Compact(compact) => {
                compact.erase(id);

                if compact.len() + compact.len() / 2 < compact.capacity() {
                    compact.reallocate(compact.len() + 2);
                }
            }
            Repr::Blocked(blocked) => blocked.erase(id),
        }
    }

    pub fn contains(&self, id: W) -> bool {
        match &self.repr {
            Repr::Compact(compact) => compact.contains(id),
            Repr::Blocked(blocked) => blocked.contains(id),
        }
    }

    /// Returns the stored offsets of the id, or `None` if the id is absent.
    pub fn offsets_of(&self, id: W) -> Option<&[W]> {
        match &self.repr {
            Repr::Compact(compact) => compact.offsets_of(id),
            Repr::Blocked(blocked) => blocked.offsets_of(id),
        }
    }

    pub fn num_ids(&self) -> usize {
        match &self.repr {
            Repr::Compact(compact) => compact.num_ids(),
            Repr::Blocked(blocked) => blocked.num_ids(),
        }
    }

    /// Whether the list is still in the compact layout.
    pub fn is_compact(&self) -> bool {
        matches!(self.repr, Repr::Compact(_))
    }

    pub fn as_compact(&self) -> Option<&CompactPosting<W>> {
        match &self.repr {
            Repr::Compact(compact) => Some(compact),
            Repr::Blocked(_) => None,
        }
    }

    pub fn as_blocked(&self) -> Option<&BlockedPosting<W>> {
        match &self.repr {
            Repr::Compact(_) => None,
            Repr::Blocked(blocked) => Some(blocked),
        }
    }

    // replays the compact records in ascending id order, so the blocked list
    // is built by pure appends
    fn promote(&mut self) {
        let Repr::Compact(compact) = &self.repr else {
            return;
        };

        let mut blocked = BlockedPosting::new(self.config.max_block_elements);

        for (id, offsets) in compact.records() {
            blocked.upsert(id, offsets);
        }

        self.repr = Repr::Blocked(blocked);
    }
}

/// Types that can be used as the id and offset words of a posting list.
///
/// All three logical sequences of a posting list (ids, offsets and the
/// per-block offset index) share this word type, which is what allows the
/// compact layout to interleave them in a single buffer. `u32` is the
/// intended production instantiation; `u64` exists for larger id spaces.
pub trait PostingWord: PrimInt + Unsigned + Send + Sync + sealed::Sealed + 'static {}

impl sealed::Sealed for u32 {}
impl PostingWord for u32 {}

impl sealed::Sealed for u64 {}
impl PostingWord for u64 {}

mod sealed {
    pub trait Sealed {}
}

pub(crate) fn to_word<W: PostingWord>(value: usize) -> W {
    <W as NumCast>::from(value).unwrap()
}

pub(crate) fn to_index<W: PostingWord>(word: W) -> usize {
    <usize as NumCast>::from(word).unwrap()
}
