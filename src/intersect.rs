use crate::{Block, BlockedPosting, Posting, PostingWord, Repr};

/// Computes the ascending sequence of ids present in every given list.
///
/// The first list drives a pivot id, and every other list is advanced to the
/// first id that is at least the pivot. Blocked lists are advanced block by
/// block: a block whose largest id is below the pivot is skipped without
/// looking at its ids. Compact lists participate as a single synthetic block.
///
/// An empty input slice yields an empty result. The inputs must not be
/// mutated for the duration of the call.
pub fn intersect<W: PostingWord>(lists: &[&Posting<W>]) -> Vec<W> {
    if lists.is_empty() {
        return Vec::new();
    }

    let mut cursors: Vec<Cursor<'_, W>> = lists.iter().map(|list| Cursor::new(list)).collect();
    let mut result_ids = Vec::new();

    'search: loop {
        let Some(pivot) = cursors[0].current() else {
            break;
        };

        let mut unanimous = true;

        for follower in 1..cursors.len() {
            let Some(id) = cursors[follower].advance_to_at_least(pivot) else {
                break 'search;
            };

            if id > pivot {
                // overshoot, the id becomes the new pivot candidate
                if cursors[0].advance_to_at_least(id).is_none() {
                    break 'search;
                }
                unanimous = false;
                break;
            }
        }

        if unanimous {
            result_ids.push(pivot);
            for cursor in &mut cursors {
                cursor.advance();
            }
        }
    }

    result_ids
}

// a read position inside a posting list, addressed as (block, index in block)
enum Cursor<'a, W: PostingWord> {
    Blocked {
        list: &'a BlockedPosting<W>,
        block: Option<&'a Block<W>>,
        position: usize,
    },
    Compact {
        ids: Vec<W>,
        position: usize,
    },
}

impl<'a, W: PostingWord> Cursor<'a, W> {
    fn new(posting: &'a Posting<W>) -> Self {
        match posting.repr() {
            Repr::Blocked(list) => {
                // the root block is only empty while the whole list is empty
                let root = list.root();

                Cursor::Blocked {
                    list,
                    block: (!root.is_empty()).then_some(root),
                    position: 0,
                }
            }
            Repr::Compact(list) => Cursor::Compact {
                ids: list.records().map(|(id, _)| id).collect(),
                position: 0,
            },
        }
    }

    fn current(&self) -> Option<W> {
        match self {
            Cursor::Blocked { block, position, .. } => block.map(|block| block.ids()[*position]),
            Cursor::Compact { ids, position } => ids.get(*position).copied(),
        }
    }

    fn advance(&mut self) {
        match self {
            Cursor::Blocked {
                list,
                block,
                position,
            } => {
                let Some(current) = *block else {
                    return;
                };

                *position += 1;
                if *position == current.len() {
                    *block = current.next.map(|index| list.block_at(index));
                    *position = 0;
                }
            }
            Cursor::Compact { ids, position } => {
                if *position < ids.len() {
                    *position += 1;
                }
            }
        }
    }

    // moves to the first id >= bound and returns it, skipping whole blocks by
    // their largest id
    fn advance_to_at_least(&mut self, bound: W) -> Option<W> {
        match self {
            Cursor::Blocked {
                list,
                block,
                position,
            } => loop {
                let current = (*block)?;

                if current.last_id().unwrap() < bound {
                    *block = current.next.map(|index| list.block_at(index));
                    *position = 0;
                    continue;
                }

                *position += current.ids()[*position..].partition_point(|&id| id < bound);
                return Some(current.ids()[*position]);
            },
            Cursor::Compact { ids, position } => {
                *position += ids[*position..].partition_point(|&id| id < bound);
                ids.get(*position).copied()
            }
        }
    }
}
