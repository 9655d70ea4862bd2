//! Property tests for range-reader line-boundary correctness.
//!
//! The load-bearing guarantee of the whole system: for ANY contiguous
//! partition of the file into byte ranges, concatenating the per-range yields
//! equals reading the file line by line. Cuts land mid-line almost always, so
//! both sides of every cut must agree on who owns the straddling line.

use std::io::Write;

use proptest::prelude::*;
use tempfile::NamedTempFile;

use primecount_rs::range_reader::IntegerLines;

fn fixture(contents: &[u8]) -> NamedTempFile {
    let mut tmp = NamedTempFile::new().unwrap();
    tmp.write_all(contents).unwrap();
    tmp.flush().unwrap();
    tmp
}

fn read_range(tmp: &NamedTempFile, start: u64, end: u64) -> Vec<u64> {
    IntegerLines::open(tmp.path(), start, end)
        .unwrap()
        .map(|r| r.unwrap())
        .collect()
}

/// Normalize arbitrary cut points into a sorted partition of `[0, len]`.
fn partition_offsets(cuts: &[usize], len: u64) -> Vec<u64> {
    let mut offsets: Vec<u64> = cuts.iter().map(|&c| c as u64 % (len + 1)).collect();
    offsets.push(0);
    offsets.push(len);
    offsets.sort_unstable();
    offsets.dedup();
    offsets
}

proptest! {
    #[test]
    fn concatenation_matches_whole_file_read(
        values in proptest::collection::vec(0u64..100_000, 0..40),
        cuts in proptest::collection::vec(0usize..4096, 0..8),
        trailing_newline in any::<bool>(),
    ) {
        let mut contents = Vec::new();
        for (i, v) in values.iter().enumerate() {
            contents.extend_from_slice(v.to_string().as_bytes());
            if i + 1 < values.len() || trailing_newline {
                contents.push(b'\n');
            }
        }
        let tmp = fixture(&contents);
        let len = contents.len() as u64;

        let expected = read_range(&tmp, 0, len);
        let mut got = Vec::new();
        for pair in partition_offsets(&cuts, len).windows(2) {
            got.extend(read_range(&tmp, pair[0], pair[1]));
        }
        prop_assert_eq!(got, expected);
    }

    #[test]
    fn garbage_lines_do_not_disturb_the_partition_property(
        lines in proptest::collection::vec(
            prop_oneof![
                (0u64..1_000_000).prop_map(|v| v.to_string()),
                "[a-z ]{0,10}",
                Just(String::new()),
                (0u64..1000).prop_map(|v| format!("  {}\r", v)), // padded, CR-terminated
            ],
            0..30,
        ),
        cuts in proptest::collection::vec(0usize..2048, 0..6),
    ) {
        let mut contents = Vec::new();
        for line in &lines {
            contents.extend_from_slice(line.as_bytes());
            contents.push(b'\n');
        }
        let tmp = fixture(&contents);
        let len = contents.len() as u64;

        let expected = read_range(&tmp, 0, len);
        let mut got = Vec::new();
        for pair in partition_offsets(&cuts, len).windows(2) {
            got.extend(read_range(&tmp, pair[0], pair[1]));
        }
        prop_assert_eq!(got, expected);
    }

    #[test]
    fn every_two_way_split_is_exact(
        values in proptest::collection::vec(0u64..10_000, 1..12),
    ) {
        // Exhaustive over all cut positions for small files: stronger than
        // sampling when the file is small enough to afford it.
        let mut contents = Vec::new();
        for v in &values {
            contents.extend_from_slice(v.to_string().as_bytes());
            contents.push(b'\n');
        }
        let tmp = fixture(&contents);
        let len = contents.len() as u64;
        let expected = read_range(&tmp, 0, len);

        for cut in 0..=len {
            let mut got = read_range(&tmp, 0, cut);
            got.extend(read_range(&tmp, cut, len));
            prop_assert_eq!(&got, &expected, "split at {}", cut);
        }
    }
}
