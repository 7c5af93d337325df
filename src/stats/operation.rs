//! 操作统计 - 跟踪哈希表操作与冲突

use crate::types::OperationType;
use std::sync::atomic::{AtomicU64, Ordering};

/// 操作统计快照
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OperationStatsSnapshot {
    pub find_count: u64,
    pub find_hits: u64,
    pub insert_count: u64,
    pub insert_duplicates: u64,
    pub assign_count: u64,
    /// insert_or_assign 中覆盖已有值的次数
    pub assign_overwrites: u64,
    pub update_count: u64,
    pub update_misses: u64,
    pub erase_count: u64,
    pub erase_misses: u64,
    /// 成功搬迁的条目数
    pub kick_count: u64,
    /// 执行过的踢出路径数
    pub kick_paths: u64,
    /// 复核失败而放弃的踢出路径数
    pub kick_aborts: u64,
    pub table_full_count: u64,
    pub cas_retries: u64,
    pub scan_retries: u64,
}

impl OperationStatsSnapshot {
    /// 查找命中率
    pub fn hit_ratio(&self) -> f64 {
        if self.find_count == 0 {
            0.0
        } else {
            self.find_hits as f64 / self.find_count as f64
        }
    }
}

/// 原子操作统计
#[derive(Debug, Default)]
pub struct OperationStats {
    find_count: AtomicU64,
    find_hits: AtomicU64,
    insert_count: AtomicU64,
    insert_duplicates: AtomicU64,
    assign_count: AtomicU64,
    assign_overwrites: AtomicU64,
    update_count: AtomicU64,
    update_misses: AtomicU64,
    erase_count: AtomicU64,
    erase_misses: AtomicU64,
    kick_count: AtomicU64,
    kick_paths: AtomicU64,
    kick_aborts: AtomicU64,
    table_full_count: AtomicU64,
    cas_retries: AtomicU64,
    scan_retries: AtomicU64,
}

impl OperationStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一次操作
    ///
    /// `hit` 的含义随操作而定：查找命中、插入成功（非重复）、
    /// 覆盖写发生覆盖、更新命中、删除命中。
    pub fn record(&self, op_type: OperationType, hit: bool) {
        let (count, outcome, outcome_on_hit) = match op_type {
            OperationType::Find => (&self.find_count, &self.find_hits, true),
            OperationType::Insert => (&self.insert_count, &self.insert_duplicates, false),
            OperationType::InsertOrAssign => (&self.assign_count, &self.assign_overwrites, true),
            OperationType::Update => (&self.update_count, &self.update_misses, false),
            OperationType::Erase => (&self.erase_count, &self.erase_misses, false),
        };
        count.fetch_add(1, Ordering::Relaxed);
        if hit == outcome_on_hit {
            outcome.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_kick_path(&self, hops: usize) {
        self.kick_paths.fetch_add(1, Ordering::Relaxed);
        self.kick_count.fetch_add(hops as u64, Ordering::Relaxed);
    }

    pub fn record_kick_abort(&self) {
        self.kick_aborts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_table_full(&self) {
        self.table_full_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cas_retry(&self) {
        self.cas_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_scan_retry(&self) {
        self.scan_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> OperationStatsSnapshot {
        OperationStatsSnapshot {
            find_count: self.find_count.load(Ordering::Relaxed),
            find_hits: self.find_hits.load(Ordering::Relaxed),
            insert_count: self.insert_count.load(Ordering::Relaxed),
            insert_duplicates: self.insert_duplicates.load(Ordering::Relaxed),
            assign_count: self.assign_count.load(Ordering::Relaxed),
            assign_overwrites: self.assign_overwrites.load(Ordering::Relaxed),
            update_count: self.update_count.load(Ordering::Relaxed),
            update_misses: self.update_misses.load(Ordering::Relaxed),
            erase_count: self.erase_count.load(Ordering::Relaxed),
            erase_misses: self.erase_misses.load(Ordering::Relaxed),
            kick_count: self.kick_count.load(Ordering::Relaxed),
            kick_paths: self.kick_paths.load(Ordering::Relaxed),
            kick_aborts: self.kick_aborts.load(Ordering::Relaxed),
            table_full_count: self.table_full_count.load(Ordering::Relaxed),
            cas_retries: self.cas_retries.load(Ordering::Relaxed),
            scan_retries: self.scan_retries.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.find_count,
            &self.find_hits,
            &self.insert_count,
            &self.insert_duplicates,
            &self.assign_count,
            &self.assign_overwrites,
            &self.update_count,
            &self.update_misses,
            &self.erase_count,
            &self.erase_misses,
            &self.kick_count,
            &self.kick_paths,
            &self.kick_aborts,
            &self.table_full_count,
            &self.cas_retries,
            &self.scan_retries,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_outcomes() {
        let stats = OperationStats::new();
        stats.record(OperationType::Find, true);
        stats.record(OperationType::Find, false);
        stats.record(OperationType::Insert, true);
        stats.record(OperationType::Insert, false);
        stats.record(OperationType::InsertOrAssign, true);
        stats.record(OperationType::Erase, false);

        let snap = stats.snapshot();
        assert_eq!(snap.find_count, 2);
        assert_eq!(snap.find_hits, 1);
        assert_eq!(snap.insert_count, 2);
        assert_eq!(snap.insert_duplicates, 1);
        assert_eq!(snap.assign_overwrites, 1);
        assert_eq!(snap.erase_misses, 1);
        assert!((snap.hit_ratio() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_kick_counters_and_reset() {
        let stats = OperationStats::new();
        stats.record_kick_path(3);
        stats.record_kick_abort();
        stats.record_table_full();

        let snap = stats.snapshot();
        assert_eq!(snap.kick_paths, 1);
        assert_eq!(snap.kick_count, 3);
        assert_eq!(snap.kick_aborts, 1);
        assert_eq!(snap.table_full_count, 1);

        stats.reset();
        assert_eq!(stats.snapshot(), OperationStatsSnapshot::default());
    }
}
