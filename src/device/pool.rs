use crate::foundation::ids::BackingId;
use crate::resource::desc::ResourceKind;
use std::collections::HashMap;

/// Cache limits for released backings.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BackingPoolOpts {
    /// Maximum bytes retained across all buckets.
    pub(crate) max_pool_bytes: usize,
    /// Maximum number of retained backings per descriptor bucket.
    pub(crate) max_backings_per_bucket: usize,
}

/// Counters for the released-backing cache.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BackingCacheStats {
    /// Backings currently cached.
    pub retained_backings: usize,
    /// Bytes currently cached.
    pub retained_bytes: usize,
    /// Creations served from the cache.
    pub reused: u64,
    /// Releases that did not fit in the cache.
    pub dropped_on_release: u64,
    /// Cached backings evicted to make room.
    pub purged: u64,
}

#[derive(Debug)]
struct Bucket {
    bytes: usize,
    backings: Vec<BackingId>,
}

/// Bounded cache of released backings, keyed by the exact memory shape.
///
/// A released backing is either retained for reuse or reported back as dropped so the caller
/// can free it.
#[derive(Debug)]
pub(crate) struct BackingPool {
    opts: BackingPoolOpts,
    stats: BackingCacheStats,
    bucket_idx_by_key: HashMap<ResourceKind, usize>,
    buckets: Vec<Bucket>,
}

impl BackingPool {
    pub(crate) fn new(opts: BackingPoolOpts) -> Self {
        Self {
            opts,
            stats: BackingCacheStats::default(),
            bucket_idx_by_key: HashMap::new(),
            buckets: Vec::new(),
        }
    }

    pub(crate) fn stats(&self) -> BackingCacheStats {
        self.stats.clone()
    }

    pub(crate) fn take(&mut self, key: &ResourceKind) -> Option<BackingId> {
        let &bi = self.bucket_idx_by_key.get(key)?;
        let bucket = &mut self.buckets[bi];
        let b = bucket.backings.pop()?;
        self.stats.retained_backings = self.stats.retained_backings.saturating_sub(1);
        self.stats.retained_bytes = self.stats.retained_bytes.saturating_sub(bucket.bytes);
        self.stats.reused = self.stats.reused.saturating_add(1);
        Some(b)
    }

    /// Retain `backing` for reuse. Returns `false` when it was dropped instead.
    pub(crate) fn release(&mut self, key: ResourceKind, bytes: usize, backing: BackingId) -> bool {
        if self.opts.max_pool_bytes == 0 || self.opts.max_backings_per_bucket == 0 {
            self.stats.dropped_on_release = self.stats.dropped_on_release.saturating_add(1);
            return false;
        }
        if self.stats.retained_bytes.saturating_add(bytes) > self.opts.max_pool_bytes {
            self.stats.dropped_on_release = self.stats.dropped_on_release.saturating_add(1);
            return false;
        }

        let bi = match self.bucket_idx_by_key.get(&key).copied() {
            Some(i) => i,
            None => {
                let i = self.buckets.len();
                self.buckets.push(Bucket {
                    bytes,
                    backings: Vec::new(),
                });
                self.bucket_idx_by_key.insert(key, i);
                i
            }
        };

        let bucket = &mut self.buckets[bi];
        if bucket.backings.len() >= self.opts.max_backings_per_bucket {
            self.stats.dropped_on_release = self.stats.dropped_on_release.saturating_add(1);
            return false;
        }

        bucket.backings.push(backing);
        self.stats.retained_backings = self.stats.retained_backings.saturating_add(1);
        self.stats.retained_bytes = self.stats.retained_bytes.saturating_add(bytes);
        true
    }

    /// Evict cached backings, largest buckets first, until at most `keep_bytes` remain.
    /// Returns the evicted backings.
    pub(crate) fn purge_to(&mut self, keep_bytes: usize) -> Vec<BackingId> {
        let mut order: Vec<usize> = (0..self.buckets.len()).collect();
        order.sort_by_key(|&i| std::cmp::Reverse(self.buckets[i].bytes));

        let mut evicted = Vec::new();
        for bi in order {
            while self.stats.retained_bytes > keep_bytes {
                let bucket = &mut self.buckets[bi];
                let Some(b) = bucket.backings.pop() else {
                    break;
                };
                self.stats.retained_backings = self.stats.retained_backings.saturating_sub(1);
                self.stats.retained_bytes = self.stats.retained_bytes.saturating_sub(bucket.bytes);
                self.stats.purged = self.stats.purged.saturating_add(1);
                evicted.push(b);
            }
        }
        evicted
    }
}
