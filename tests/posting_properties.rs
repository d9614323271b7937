use postdex::{BlockedPosting, PostingConfig, intersect};

use proptest::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use std::collections::BTreeMap;

#[derive(Debug, Clone)]
enum Operation {
    Upsert { id: u32, offsets: Vec<u32> },
    Erase { id: u32 },
}

fn operation_strategy(max_id: u32) -> impl Strategy<Value = Operation> {
    prop_oneof![
        3 => (0..max_id, prop::collection::vec(0u32..64, 0..6))
            .prop_map(|(id, offsets)| Operation::Upsert { id, offsets }),
        1 => (0..max_id).prop_map(|id| Operation::Erase { id }),
    ]
}

// checks the structural guarantees of the blocked layout against a reference
// model of its expected content
fn assert_blocked_invariants(list: &BlockedPosting<u32>, model: &BTreeMap<u32, Vec<u32>>) {
    let max_block_elements = list.max_block_elements();
    let min_fill = max_block_elements / 2;

    let blocks: Vec<_> = list.blocks().collect();
    let mut traversed_ids: Vec<u32> = Vec::new();

    for (block_index, block) in blocks.iter().enumerate() {
        assert!(block.len() <= max_block_elements);

        let is_last = block_index + 1 == blocks.len();
        if !is_last {
            assert!(block.len() >= min_fill);
        }

        if block.is_empty() {
            // only the root block of an empty list may be empty
            assert!(model.is_empty() && blocks.len() == 1);
        }

        assert_eq!(block.offset_index().len(), block.len());

        let mut expected_start = 0;
        for i in 0..block.len() {
            assert_eq!(block.offset_index()[i] as usize, expected_start);
            expected_start += block.offsets_at(i).len();
        }
        assert_eq!(expected_start, block.offsets().len());

        traversed_ids.extend_from_slice(block.ids());
    }

    assert!(traversed_ids.is_sorted_by(|left, right| left < right));

    let expected_ids: Vec<u32> = model.keys().copied().collect();
    assert_eq!(traversed_ids, expected_ids);
    assert_eq!(list.num_ids(), model.len());

    for (&id, offsets) in model {
        let block = list.block_of(id).expect("extant id must resolve to a block");
        assert!(block.ids().contains(&id));
        assert_eq!(list.offsets_of(id), Some(offsets.as_slice()));
    }
}

fn naive_intersection(id_sets: &[Vec<u32>]) -> Vec<u32> {
    let Some((first, rest)) = id_sets.split_first() else {
        return Vec::new();
    };

    first
        .iter()
        .copied()
        .filter(|id| rest.iter().all(|ids| ids.binary_search(id).is_ok()))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_failure_persistence(prop::test_runner::FileFailurePersistence::WithSource("proptest-regressions")))]

    #[test]
    fn blocked_invariants_hold_under_random_operations(
        max_block_elements in 2usize..9,
        operations in prop::collection::vec(operation_strategy(150), 1..120)
    ) {
        let mut list = BlockedPosting::new(max_block_elements);
        let mut model: BTreeMap<u32, Vec<u32>> = BTreeMap::new();

        for operation in operations {
            match operation {
                Operation::Upsert { id, offsets } => {
                    list.upsert(id, &offsets);
                    model.insert(id, offsets);
                }
                Operation::Erase { id } => {
                    list.erase(id);
                    model.remove(&id);
                }
            }

            assert_blocked_invariants(&list, &model);
        }
    }

    #[test]
    fn facade_behaves_like_the_model_across_promotion(
        max_block_elements in 2usize..9,
        compact_threshold_words in 0usize..48,
        operations in prop::collection::vec(operation_strategy(100), 1..80)
    ) {
        let mut posting = PostingConfig::new()
            .max_block_elements(max_block_elements)
            .compact_threshold_words(compact_threshold_words)
            .new_posting::<u32>(&[], &[], &[]);
        let mut model: BTreeMap<u32, Vec<u32>> = BTreeMap::new();

        let mut was_promoted = false;

        for operation in operations {
            match operation {
                Operation::Upsert { id, offsets } => {
                    posting.upsert(id, &offsets);
                    model.insert(id, offsets);
                }
                Operation::Erase { id } => {
                    posting.erase(id);
                    model.remove(&id);
                }
            }

            // promotion is one-way
            if was_promoted {
                assert!(!posting.is_compact());
            }
            was_promoted = !posting.is_compact();

            assert_eq!(posting.num_ids(), model.len());
        }

        for (&id, offsets) in &model {
            assert!(posting.contains(id));
            assert_eq!(posting.offsets_of(id), Some(offsets.as_slice()));
        }
        assert!(!posting.contains(1_000_000));

        if let Some(blocked) = posting.as_blocked() {
            assert_blocked_invariants(blocked, &model);
        }
    }

    #[test]
    fn intersection_equals_the_naive_set_intersection(
        id_sets in prop::collection::vec(
            prop::collection::btree_set(0u32..300, 0..60),
            1..5
        ),
        max_block_elements in 2usize..9,
        compact_threshold_words in prop::sample::select(vec![0usize, 65, 1 << 20])
    ) {
        let id_sets: Vec<Vec<u32>> = id_sets
            .into_iter()
            .map(|ids| ids.into_iter().collect())
            .collect();

        let postings: Vec<_> = id_sets
            .iter()
            .map(|ids| {
                let mut posting = PostingConfig::new()
                    .max_block_elements(max_block_elements)
                    .compact_threshold_words(compact_threshold_words)
                    .new_posting::<u32>(&[], &[], &[]);

                for &id in ids {
                    posting.upsert(id, &[0, 1, 3]);
                }

                posting
            })
            .collect();

        let borrowed: Vec<_> = postings.iter().collect();

        assert_eq!(intersect(&borrowed), naive_intersection(&id_sets));
    }
}

#[test]
fn randomized_bulk_inserts_and_erases() {
    let mut rng = ChaCha8Rng::seed_from_u64(0x5EED);

    let mut list = BlockedPosting::new(100);
    let mut model: BTreeMap<u32, Vec<u32>> = BTreeMap::new();

    let first_offsets = vec![0u32, 1, 3];
    let second_offsets = vec![10u32, 12];

    for i in 0..100_000 {
        let id = rng.random_range(0..100_000);
        let offsets = if i % 2 == 0 {
            &first_offsets
        } else {
            &second_offsets
        };

        list.upsert(id, offsets);
        model.insert(id, offsets.clone());
    }

    for _ in 0..10_000 {
        let id = rng.random_range(0..100_000);
        list.erase(id);
        model.remove(&id);
    }

    assert_eq!(list.num_ids(), model.len());
    assert_blocked_invariants(&list, &model);
}
