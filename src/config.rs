use crate::{BlockedPosting, CompactPosting, Posting, PostingWord, to_index};

const DEFAULT_MAX_BLOCK_ELEMENTS: usize = 1024;
const DEFAULT_COMPACT_THRESHOLD_WORDS: usize = 65;

/// A builder-like API to configure and create posting lists.
#[cfg_attr(feature = "mem_dbg", derive(mem_dbg::MemDbg, mem_dbg::MemSize))]
#[derive(Debug, Clone, Copy)]
pub struct PostingConfig {
    pub(crate) max_block_elements: usize,
    pub(crate) compact_threshold_words: usize,
}

impl PostingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// The maximum number of ids a single block of the blocked layout may
    /// hold. A block that overflows this bound is split, and blocks that fall
    /// below half of it are refilled from their successor.
    ///
    /// Smaller values give the intersection finer skipping granularity at the
    /// cost of more link hops. The default is `1024`.
    pub fn max_block_elements(self, max_block_elements: usize) -> Self {
        assert!(max_block_elements >= 2);

        Self {
            max_block_elements,
            ..self
        }
    }

    /// The buffer size limit of the compact layout, in words.
    ///
    /// An upsert that would grow a compact list beyond this many words
    /// promotes the list to the blocked layout before the upsert is applied.
    /// Promotion is one-way, erases never convert a list back. The default
    /// is `65`.
    pub fn compact_threshold_words(self, compact_threshold_words: usize) -> Self {
        Self {
            compact_threshold_words,
            ..self
        }
    }

    /// Creates a posting list from three parallel arrays: the ascending ids,
    /// the start position of each id's offsets within `offsets`, and the
    /// concatenated offset sequences themselves.
    ///
    /// The list starts in the compact layout, unless the records already
    /// exceed [`compact_threshold_words`](Self::compact_threshold_words), in
    /// which case the blocked layout is built directly (in parallel, with the
    /// number of threads controlled by [`rayon`]).
    pub fn new_posting<W: PostingWord>(
        self,
        ids: &[W],
        offset_index: &[W],
        offsets: &[W],
    ) -> Posting<W> {
        validate_parts(ids, offset_index, offsets);

        // one count word and one id word per record, plus the offsets
        let compact_words = ids.len() * 2 + offsets.len();

        if compact_words > self.compact_threshold_words {
            let blocked =
                BlockedPosting::from_sorted_parts(self.max_block_elements, ids, offset_index, offsets);

            Posting::from_blocked(self, blocked)
        } else {
            Posting::from_compact(self, CompactPosting::from_parts(ids, offset_index, offsets))
        }
    }
}

impl Default for PostingConfig {
    fn default() -> Self {
        Self {
            max_block_elements: DEFAULT_MAX_BLOCK_ELEMENTS,
            compact_threshold_words: DEFAULT_COMPACT_THRESHOLD_WORDS,
        }
    }
}

fn validate_parts<W: PostingWord>(ids: &[W], offset_index: &[W], offsets: &[W]) {
    assert_eq!(ids.len(), offset_index.len());
    assert!(ids.is_sorted_by(|left, right| left < right));
    assert!(offset_index.is_sorted());

    if let Some(&first) = offset_index.first() {
        assert!(first.is_zero());
    }

    if let Some(&last) = offset_index.last() {
        assert!(to_index(last) <= offsets.len());
    }
}
