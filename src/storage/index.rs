//! # In-Memory Bucket Index
//!
//! A sorted map from bucket id (the smallest record id in a bucket file) to
//! that bucket's current record count. The engine consults it to route any
//! record id to its owning bucket with a predecessor lookup: the owner of
//! `id` is the bucket with the largest id ≤ `id`.
//!
//! The index is rebuilt from the data directory on open and mutated only
//! under the engine's lock, so it always mirrors the set of bucket files on
//! disk and their header counts.

use std::collections::BTreeMap;

/// Sorted bucket-id → record-count map owned by the engine.
#[derive(Debug, Default)]
pub struct BucketIndex {
    buckets: BTreeMap<i64, usize>,
}

impl BucketIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// The bucket that owns `id`: the largest bucket id ≤ `id`.
    pub fn owning_bucket(&self, id: i64) -> Option<i64> {
        self.buckets
            .range(..=id)
            .next_back()
            .map(|(bucket_id, _)| *bucket_id)
    }

    pub fn count(&self, bucket_id: i64) -> Option<usize> {
        self.buckets.get(&bucket_id).copied()
    }

    pub fn insert(&mut self, bucket_id: i64, count: usize) {
        self.buckets.insert(bucket_id, count);
    }

    pub fn set_count(&mut self, bucket_id: i64, count: usize) {
        self.buckets.insert(bucket_id, count);
    }

    pub fn remove(&mut self, bucket_id: i64) {
        self.buckets.remove(&bucket_id);
    }

    /// Rekeys a bucket whose smallest id changed, preserving its count.
    pub fn rename(&mut self, old_id: i64, new_id: i64) {
        if let Some(count) = self.buckets.remove(&old_id) {
            self.buckets.insert(new_id, count);
        }
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn bucket_ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.buckets.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owning_bucket_is_the_predecessor() {
        let mut index = BucketIndex::new();
        index.insert(10, 3);
        index.insert(50, 1);

        assert_eq!(index.owning_bucket(5), None);
        assert_eq!(index.owning_bucket(10), Some(10));
        assert_eq!(index.owning_bucket(49), Some(10));
        assert_eq!(index.owning_bucket(50), Some(50));
        assert_eq!(index.owning_bucket(i64::MAX), Some(50));
    }

    #[test]
    fn owning_bucket_on_empty_index() {
        assert_eq!(BucketIndex::new().owning_bucket(0), None);
    }

    #[test]
    fn negative_ids_order_correctly() {
        let mut index = BucketIndex::new();
        index.insert(-100, 1);
        index.insert(0, 1);

        assert_eq!(index.owning_bucket(-50), Some(-100));
        assert_eq!(index.owning_bucket(-101), None);
        assert_eq!(index.owning_bucket(7), Some(0));
    }

    #[test]
    fn rename_preserves_count() {
        let mut index = BucketIndex::new();
        index.insert(10, 4);

        index.rename(10, 20);

        assert_eq!(index.count(10), None);
        assert_eq!(index.count(20), Some(4));
        assert_eq!(index.owning_bucket(15), None);
    }

    #[test]
    fn remove_erases_the_bucket() {
        let mut index = BucketIndex::new();
        index.insert(10, 1);

        index.remove(10);

        assert!(index.is_empty());
        assert_eq!(index.owning_bucket(10), None);
    }

    #[test]
    fn set_count_overwrites() {
        let mut index = BucketIndex::new();
        index.insert(10, 1);
        index.set_count(10, 9);

        assert_eq!(index.count(10), Some(9));
        assert_eq!(index.len(), 1);
    }
}
