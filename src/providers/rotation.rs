//! Round-robin selection of query partitions across runs.

/// Partition indices to query this run, starting at `rotation_index`.
///
/// Never yields the same partition twice, even when `per_run` exceeds the
/// partition count.
pub fn select_partitions(partition_count: usize, rotation_index: usize, per_run: usize) -> Vec<usize> {
    if partition_count == 0 {
        return Vec::new();
    }
    let start = rotation_index % partition_count;
    (0..per_run.min(partition_count))
        .map(|step| (start + step) % partition_count)
        .collect()
}

/// Rotation index for the next run.
pub fn advance(rotation_index: usize, per_run: usize, partition_count: usize) -> usize {
    if partition_count == 0 {
        return 0;
    }
    (rotation_index % partition_count + per_run) % partition_count
}
