use crate::{PostingWord, to_index, to_word};

/// Flat single-buffer layout used for short posting lists.
///
/// For every id, in ascending id order, the buffer stores one record of the
/// form `[offset_count, offsets…, id]`. The allocation never grows on its
/// own: mutations report failure when the capacity is too small, and the
/// facade ([`Posting`](crate::Posting)) reallocates. This keeps all
/// mutations simple word shifts within one buffer.
#[cfg_attr(feature = "mem_dbg", derive(mem_dbg::MemDbg, mem_dbg::MemSize))]
pub struct CompactPosting<W: PostingWord> {
    buf: Box<[W]>,
    len: usize,
    num_ids: usize,
}

impl<W: PostingWord> CompactPosting<W> {
    // callers must have validated the parallel arrays
    pub(crate) fn from_parts(ids: &[W], offset_index: &[W], offsets: &[W]) -> Self {
        let len = ids.len() * 2 + offsets.len();
        let mut buf = vec![W::zero(); len].into_boxed_slice();

        let mut at = 0;
        for (i, &id) in ids.iter().enumerate() {
            let start = to_index(offset_index[i]);
            let end = if i + 1 < ids.len() {
                to_index(offset_index[i + 1])
            } else {
                offsets.len()
            };
            let count = end - start;

            buf[at] = to_word(count);
            buf[at + 1..at + 1 + count].copy_from_slice(&offsets[start..end]);
            buf[at + 1 + count] = id;
            at += count + 2;
        }

        Self {
            buf,
            len,
            num_ids: ids.len(),
        }
    }

    /// The number of words currently in use.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.num_ids == 0
    }

    /// The number of words the buffer can hold before the facade has to
    /// reallocate.
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn num_ids(&self) -> usize {
        self.num_ids
    }

    /// The words in use, i.e. the concatenation of all records.
    pub fn words(&self) -> &[W] {
        &self.buf[..self.len]
    }

    /// The id of the final record, or zero for an empty list.
    pub fn last_id(&self) -> W {
        if self.len == 0 {
            W::zero()
        } else {
            self.buf[self.len - 1]
        }
    }

    pub fn contains(&self, id: W) -> bool {
        self.record_start(id).is_some()
    }

    pub fn offsets_of(&self, id: W) -> Option<&[W]> {
        let start = self.record_start(id)?;
        let count = to_index(self.buf[start]);

        Some(&self.buf[start + 1..start + 1 + count])
    }

    /// Iterates over `(id, offsets)` records in ascending id order.
    pub fn records(&self) -> Records<'_, W> {
        Records {
            words: self.words(),
        }
    }

    // the word count the buffer must be able to hold for this upsert
    pub(crate) fn upsert_required_words(&self, id: W, num_offsets: usize) -> usize {
        let new_width = num_offsets + 2;

        match self.record_start(id) {
            Some(start) => self.len - self.record_width(start) + new_width,
            None => self.len + new_width,
        }
    }

    // Inserts or updates the record of the id, keeping records sorted.
    //
    // Returns false without touching the list when the capacity is too small
    // for the result; the caller is expected to reallocate and retry. Updates
    // that shrink or keep the record width always succeed.
    pub(crate) fn upsert(&mut self, id: W, offsets: &[W]) -> bool {
        let new_width = offsets.len() + 2;

        if let Some(start) = self.record_start(id) {
            let old_width = self.record_width(start);
            let new_len = self.len - old_width + new_width;

            if new_len > self.buf.len() {
                return false;
            }

            self.buf.copy_within(start + old_width..self.len, start + new_width);
            self.write_record(start, id, offsets);
            self.len = new_len;
        } else {
            if self.len + new_width > self.buf.len() {
                return false;
            }

            let start = self.insertion_point(id);
            self.buf.copy_within(start..self.len, start + new_width);
            self.write_record(start, id, offsets);
            self.len += new_width;
            self.num_ids += 1;
        }

        true
    }

    // Removes the record of the id by shifting the suffix left. The capacity
    // is left untouched. Returns whether the id was present.
    pub(crate) fn erase(&mut self, id: W) -> bool {
        let Some(start) = self.record_start(id) else {
            return false;
        };

        let width = self.record_width(start);
        self.buf.copy_within(start + width..self.len, start);
        self.len -= width;
        self.num_ids -= 1;

        true
    }

    // moves the words in use into a fresh allocation of the given capacity
    pub(crate) fn reallocate(&mut self, new_capacity: usize) {
        debug_assert!(new_capacity >= self.len);

        let mut buf = vec![W::zero(); new_capacity].into_boxed_slice();
        buf[..self.len].copy_from_slice(&self.buf[..self.len]);
        self.buf = buf;
    }

    // word index of the record holding the id, exploiting that records are
    // sorted by id
    fn record_start(&self, id: W) -> Option<usize> {
        let mut at = 0;

        while at < self.len {
            let count = to_index(self.buf[at]);
            let record_id = self.buf[at + 1 + count];

            if record_id == id {
                return Some(at);
            }

            if record_id > id {
                return None;
            }

            at += count + 2;
        }

        None
    }

    // word index of the first record with an id greater than the given one,
    // or the end of the used words
    fn insertion_point(&self, id: W) -> usize {
        let mut at = 0;

        while at < self.len {
            let count = to_index(self.buf[at]);

            if self.buf[at + 1 + count] > id {
                return at;
            }

            at += count + 2;
        }

        self.len
    }

    fn record_width(&self, start: usize) -> usize {
        to_index::<W>(self.buf[start]) + 2
    }

    fn write_record(&mut self, start: usize, id: W, offsets: &[W]) {
        self.buf[start] = to_word(offsets.len());
        self.buf[start + 1..start + 1 + offsets.len()].copy_from_slice(offsets);
        self.buf[start + 1 + offsets.len()] = id;
    }
}

/// Iterator over the `(id, offsets)` records of a [`CompactPosting`].
pub struct Records<'a, W: PostingWord> {
    words: &'a [W],
}

impl<'a, W: PostingWord> Iterator for Records<'a, W> {
    type Item = (W, &'a [W]);

    fn next(&mut self) -> Option<Self::Item> {
        if self.words.is_empty() {
            return None;
        }

        let count = to_index::<W>(self.words[0]);
        let (record, rest) = self.words.split_at(count + 2);
        self.words = rest;

        Some((record[count + 1], &record[1..count + 1]))
    }
}
