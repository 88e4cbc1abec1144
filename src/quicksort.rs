//! In-memory sort used during run generation.

use crate::record::Record;

/// Sorts a batch of records in place by ascending key.
///
/// Lomuto-partition quicksort with the last element as pivot, driven by an
/// explicit range stack instead of recursion so adversarial (already
/// sorted) batches cannot overflow the call stack. Not stable: records
/// with equal keys end up in unspecified order.
pub fn sort_records(records: &mut [Record]) {
    if records.len() < 2 {
        return;
    }

    // inclusive index ranges still to be partitioned
    let mut ranges = vec![(0, records.len() - 1)];

    while let Some((low, high)) = ranges.pop() {
        let p = partition(records, low, high);
        // sub-ranges of fewer than two elements are already sorted
        if p > low + 1 {
            ranges.push((low, p - 1));
        }
        if p + 1 < high {
            ranges.push((p + 1, high));
        }
    }
}

/// Partitions `records[low..=high]` around the key of the last element.
/// Elements with keys `<=` the pivot key end up left of the returned
/// index, the pivot lands exactly on it.
fn partition(records: &mut [Record], low: usize, high: usize) -> usize {
    let pivot = records[high].key;
    let mut i = low;

    for j in low..high {
        if records[j].key <= pivot {
            records.swap(i, j);
            i += 1;
        }
    }
    records.swap(i, high);

    i
}

#[cfg(test)]
mod test {
    use rand::seq::SliceRandom;
    use rstest::*;

    use super::sort_records;
    use crate::record::Record;

    fn records_with_keys(keys: &[u64]) -> Vec<Record> {
        keys.iter().map(|&key| Record::new(key, &key.to_ne_bytes())).collect()
    }

    fn keys_of(records: &[Record]) -> Vec<u64> {
        records.iter().map(|record| record.key).collect()
    }

    #[rstest]
    #[case(vec![], vec![])]
    #[case(vec![42], vec![42])]
    #[case(vec![1, 2, 3, 4, 5], vec![1, 2, 3, 4, 5])]
    #[case(vec![5, 4, 3, 2, 1], vec![1, 2, 3, 4, 5])]
    #[case(vec![5, 3, 5, 1, 2], vec![1, 2, 3, 5, 5])]
    #[case(vec![7, 7, 7, 7], vec![7, 7, 7, 7])]
    fn test_sort_records(#[case] keys: Vec<u64>, #[case] expected: Vec<u64>) {
        let mut records = records_with_keys(&keys);
        sort_records(&mut records);
        assert_eq!(keys_of(&records), expected);
    }

    #[test]
    fn test_sort_shuffled_batch() {
        let mut keys = Vec::from_iter(0..1000u64);
        keys.shuffle(&mut rand::thread_rng());

        let mut records = records_with_keys(&keys);
        sort_records(&mut records);

        assert_eq!(keys_of(&records), Vec::from_iter(0..1000u64));
        // payloads travel with their keys
        for record in &records {
            assert_eq!(record.valid_payload(), &record.key.to_ne_bytes());
        }
    }

    #[test]
    fn test_sort_presorted_batch_stays_within_stack() {
        // last-element pivots degrade to quadratic time on sorted input,
        // the explicit work stack keeps recursion depth out of the picture
        let mut records = records_with_keys(&Vec::from_iter(0..5_000u64));
        sort_records(&mut records);
        assert_eq!(keys_of(&records), Vec::from_iter(0..5_000u64));
    }
}
