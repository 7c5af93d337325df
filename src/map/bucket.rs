//! 桶实现 - 管理一组槽位和并发访问
//!
//! 所有槽位修改都是单字CAS，查找不持有任何桶级锁。
//! 桶上的 `VersionLock` 只被踢出路径使用，读者用它检测搬迁。

use crate::{
    error::CuckooError,
    map::MAX_BUCKET_SIZE,
    types::{AtomicSlotEntry, SlotEntry},
    version::VersionLock,
};
use std::{fmt, sync::atomic::Ordering};

#[repr(align(64))]
pub struct Bucket {
    version: VersionLock,
    slots: [AtomicSlotEntry; MAX_BUCKET_SIZE],
    len: usize,
}

impl Bucket {
    pub fn new(len: usize) -> Self {
        debug_assert!((1..=MAX_BUCKET_SIZE).contains(&len));
        Self {
            version: VersionLock::new(),
            slots: Default::default(),
            len: len.clamp(1, MAX_BUCKET_SIZE),
        }
    }

    /// 返回桶中所有槽位
    #[inline]
    pub fn slots(&self) -> &[AtomicSlotEntry] {
        &self.slots[..self.len]
    }

    #[inline]
    pub fn slot(&self, slot: usize) -> &AtomicSlotEntry {
        &self.slots()[slot]
    }

    #[inline]
    pub fn version(&self) -> &VersionLock {
        &self.version
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.occupied() == 0
    }

    /// 第一个空槽位
    pub fn find_empty_slot(&self) -> Option<usize> {
        self.slots()
            .iter()
            .position(|slot| slot.load(Ordering::Acquire).is_empty())
    }

    /// 已提交（含搬迁中）的条目数
    pub fn occupied(&self) -> usize {
        self.slots()
            .iter()
            .filter(|slot| slot.load(Ordering::Acquire).is_visible())
            .count()
    }
}

impl fmt::Debug for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bucket")
            .field("version", &self.version)
            .field(
                "slots",
                &self
                    .slots()
                    .iter()
                    .map(|s| s.load(Ordering::Relaxed))
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// 桶数组（2^hashpower 个桶）
pub struct BucketContainer {
    buckets: Box<[Bucket]>,
    hashpower: u32,
    slots_per_bucket: usize,
}

impl BucketContainer {
    pub fn new(hashpower: u32, slots_per_bucket: usize) -> Result<Self, CuckooError> {
        let count = crate::hash::hashsize(hashpower);
        let mut buckets = Vec::new();
        buckets
            .try_reserve_exact(count)
            .map_err(|_| CuckooError::AllocationFailed {
                size: count * std::mem::size_of::<Bucket>(),
            })?;
        buckets.extend((0..count).map(|_| Bucket::new(slots_per_bucket)));

        Ok(Self {
            buckets: buckets.into_boxed_slice(),
            hashpower,
            slots_per_bucket,
        })
    }

    #[inline]
    pub fn hashpower(&self) -> u32 {
        self.hashpower
    }

    #[inline]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    #[inline]
    pub fn slots_per_bucket(&self) -> usize {
        self.slots_per_bucket
    }

    /// 总槽位数
    pub fn capacity(&self) -> usize {
        self.bucket_count() * self.slots_per_bucket
    }

    #[inline]
    pub fn bucket(&self, index: usize) -> &Bucket {
        &self.buckets[index]
    }

    #[inline]
    pub fn slot(&self, bucket: usize, slot: usize) -> &AtomicSlotEntry {
        self.bucket(bucket).slot(slot)
    }

    /// 单次原子读取；解引用其中的记录前必须先经回收层保护
    #[inline]
    pub fn read(&self, bucket: usize, slot: usize) -> SlotEntry {
        self.slot(bucket, slot).load(Ordering::Acquire)
    }

    /// 仅当槽位为空时写入
    #[inline]
    pub fn try_insert(&self, bucket: usize, slot: usize, entry: SlotEntry) -> bool {
        self.slot(bucket, slot)
            .compare_exchange(SlotEntry::EMPTY, entry)
            .is_ok()
    }

    /// 仅当槽位仍为 `expected` 时替换
    #[inline]
    pub fn try_update(&self, bucket: usize, slot: usize, expected: SlotEntry, entry: SlotEntry) -> bool {
        self.slot(bucket, slot)
            .compare_exchange(expected, entry)
            .is_ok()
    }

    /// 仅当槽位仍为 `expected` 时清空
    #[inline]
    pub fn try_erase(&self, bucket: usize, slot: usize, expected: SlotEntry) -> bool {
        self.try_update(bucket, slot, expected, SlotEntry::EMPTY)
    }

    /// 给仍为 `expected` 的条目加上 MOVING 标记，返回标记后的条目
    #[inline]
    pub fn try_mark(&self, bucket: usize, slot: usize, expected: SlotEntry) -> Option<SlotEntry> {
        let marked = expected.with_moving();
        self.try_update(bucket, slot, expected, marked)
            .then_some(marked)
    }

    /// 清除占位或搬迁标记，使条目成为普通已提交条目
    #[inline]
    pub fn try_publish(&self, bucket: usize, slot: usize, marked: SlotEntry) -> bool {
        self.try_update(bucket, slot, marked, marked.committed())
    }

    /// 已提交条目总数（非原子快照）
    pub fn occupied(&self) -> usize {
        self.buckets.iter().map(Bucket::occupied).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bucket> {
        self.buckets.iter()
    }
}

impl fmt::Debug for BucketContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BucketContainer")
            .field("hashpower", &self.hashpower)
            .field("slots_per_bucket", &self.slots_per_bucket)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Fingerprint, RecordId};

    fn entry(id: usize) -> SlotEntry {
        SlotEntry::new(Fingerprint::new(id as u8), RecordId(id))
    }

    #[test]
    fn test_bucket_layout() {
        let bucket = Bucket::new(4);
        assert_eq!(bucket.len(), 4);
        assert_eq!(bucket.slots().len(), 4);
        assert_eq!(std::mem::align_of::<Bucket>(), 64);
        assert_eq!(bucket.find_empty_slot(), Some(0));
        assert!(bucket.is_empty());
    }

    #[test]
    fn test_try_insert_only_on_empty() {
        let container = BucketContainer::new(2, 4).unwrap();
        assert_eq!(container.bucket_count(), 4);
        assert_eq!(container.capacity(), 16);

        assert!(container.try_insert(1, 2, entry(7)));
        assert!(!container.try_insert(1, 2, entry(8)));
        assert_eq!(container.read(1, 2), entry(7));
        assert_eq!(container.bucket(1).find_empty_slot(), Some(0));
    }

    #[test]
    fn test_update_and_erase_conditioned_on_expected() {
        let container = BucketContainer::new(1, 2).unwrap();
        assert!(container.try_insert(0, 0, entry(1)));

        // 期望值不符时不修改
        assert!(!container.try_update(0, 0, entry(2), entry(3)));
        assert!(!container.try_erase(0, 0, entry(2)));
        assert_eq!(container.read(0, 0), entry(1));

        assert!(container.try_update(0, 0, entry(1), entry(3)));
        assert_eq!(container.read(0, 0), entry(3));
        assert!(container.try_erase(0, 0, entry(3)));
        assert!(container.read(0, 0).is_empty());
    }

    #[test]
    fn test_occupied_ignores_tentative() {
        let container = BucketContainer::new(1, 4).unwrap();
        assert!(container.try_insert(0, 0, entry(1)));
        assert!(container.try_insert(0, 1, entry(2).with_tentative()));
        assert!(container.try_insert(1, 3, entry(3).with_moving()));

        assert_eq!(container.bucket(0).occupied(), 1);
        assert_eq!(container.occupied(), 2);
        assert_eq!(container.bucket(0).find_empty_slot(), Some(2));
    }

    #[test]
    fn test_mark_and_publish() {
        let container = BucketContainer::new(1, 2).unwrap();
        assert!(container.try_insert(0, 0, entry(5).with_tentative()));
        assert!(container.try_publish(0, 0, entry(5).with_tentative()));
        assert_eq!(container.read(0, 0), entry(5));

        // 期望值过期时不加标记
        assert_eq!(container.try_mark(0, 0, entry(6)), None);
        let marked = container.try_mark(0, 0, entry(5)).unwrap();
        assert!(marked.is_moving());
        assert!(container.read(0, 0).is_visible());
        assert!(container.try_publish(0, 0, marked));
        assert_eq!(container.read(0, 0), entry(5));
    }

    #[test]
    fn test_full_bucket() {
        let container = BucketContainer::new(1, 2).unwrap();
        assert!(container.try_insert(0, 0, entry(1)));
        assert!(container.try_insert(0, 1, entry(2)));
        assert_eq!(container.bucket(0).find_empty_slot(), None);
    }
}
