//! Property tests for task minting and adaptive sizing.

use proptest::prelude::*;

use primecount_rs::scheduler::{PerfClass, TaskManager, MAX_CHUNK, MIN_CHUNK};

fn class_strategy() -> impl Strategy<Value = PerfClass> {
    prop::sample::select(vec![PerfClass::Slow, PerfClass::Average, PerfClass::Fast])
}

proptest! {
    #[test]
    fn initial_partition_tiles_the_file_with_unique_ids(
        file_size in 0u64..2_000_000_000,
        workers in 1usize..64,
    ) {
        let mut tm = TaskManager::new();
        let tasks = tm.initial_partition(file_size, workers);

        // Contiguous, gap-free, overlap-free coverage of [0, file_size).
        let mut expect = 0u64;
        for t in &tasks {
            prop_assert_eq!(t.start, expect);
            prop_assert!(t.end > t.start);
            expect = t.end;
        }
        prop_assert_eq!(expect, file_size);

        // Pairwise distinct ids.
        let mut ids: Vec<_> = tasks.iter().map(|t| t.id).collect();
        let count = ids.len();
        ids.sort();
        ids.dedup();
        prop_assert_eq!(ids.len(), count);
    }

    #[test]
    fn adjusted_sizes_stay_within_chunk_bounds(
        durations in proptest::collection::vec(0u64..5_000, 0..100),
        class in class_strategy(),
    ) {
        let mut tm = TaskManager::new();
        // Bounds must hold at every point of the run, not just at the end.
        let size = tm.adjusted_size(class);
        prop_assert!((MIN_CHUNK..=MAX_CHUNK).contains(&size));
        for d in durations {
            tm.record(d);
            let size = tm.adjusted_size(class);
            prop_assert!(
                (MIN_CHUNK..=MAX_CHUNK).contains(&size),
                "size {} out of bounds after recording {}",
                size,
                d
            );
        }
    }

    #[test]
    fn adaptive_minting_tiles_a_remaining_range(
        range_len in 1u64..200_000_000,
        durations in proptest::collection::vec(0u64..3_000, 0..30),
        classes in proptest::collection::vec(class_strategy(), 1..200),
    ) {
        let mut tm = TaskManager::new();
        for d in durations {
            tm.record(d);
        }

        // Drain the range the way the orchestrator does: mint from the head
        // until nothing remains. Every chunk in bounds except a smaller tail.
        let mut rem = (0u64, range_len);
        let mut ids = Vec::new();
        let mut classes = classes.into_iter().cycle();
        while rem.0 < rem.1 {
            let class = classes.next().unwrap();
            let task = tm.create_adaptive_task(rem.0, rem.1, class);
            prop_assert_eq!(task.start, rem.0);
            prop_assert!(task.end <= rem.1);
            if task.end < rem.1 {
                prop_assert!((MIN_CHUNK..=MAX_CHUNK).contains(&task.len()));
            }
            ids.push(task.id);
            rem.0 = task.end;
        }
        prop_assert_eq!(rem.0, rem.1);

        let count = ids.len();
        ids.sort();
        ids.dedup();
        prop_assert_eq!(ids.len(), count);
    }
}
