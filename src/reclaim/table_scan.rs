//! 全局表扫描回收
//!
//! 每个线程只有一个公告单元。释放前扫描所有线程的公告，
//! 仍被持有的记录进入全局待定队列，之后分批重试。

use super::{
    announced_set, protect_with, ReclaimCounters, ReclaimStats, Reclaimer, ThreadHandle,
    ThreadRegistry,
};
use crate::{
    error::CuckooError,
    memory::RecordArena,
    types::{RecordId, ReclaimStrategy},
};
use crossbeam::{queue::SegQueue, utils::CachePadded};
use std::sync::{
    atomic::{fence, AtomicU64, AtomicUsize, Ordering},
    Arc,
};

pub struct TableScanReclaimer {
    arena: Arc<RecordArena>,
    registry: ThreadRegistry,
    holders: Box<[CachePadded<AtomicU64>]>,
    pending: SegQueue<RecordId>,
    pending_len: AtomicUsize,
    batch_threshold: usize,
    counters: ReclaimCounters,
}

impl TableScanReclaimer {
    pub fn new(arena: Arc<RecordArena>, max_threads: usize, batch_threshold: usize) -> Self {
        Self {
            arena,
            registry: ThreadRegistry::new(max_threads),
            holders: (0..max_threads)
                .map(|_| CachePadded::new(AtomicU64::new(0)))
                .collect(),
            pending: SegQueue::new(),
            pending_len: AtomicUsize::new(0),
            batch_threshold: batch_threshold.max(1),
            counters: ReclaimCounters::default(),
        }
    }

    fn held(&self) -> ahash::AHashSet<u64> {
        fence(Ordering::SeqCst);
        announced_set(self.holders.iter().map(|cell| &**cell))
    }

    /// 先计数再入队，计数不会小于队列长度
    fn defer(&self, id: RecordId) {
        self.pending_len.fetch_add(1, Ordering::AcqRel);
        self.pending.push(id);
    }

    /// 重试一批待定记录
    ///
    /// 先出队再读取公告：批内每条记录的退役都先于这次公告快照。
    fn retry_pending(&self) {
        let batch = self.pending_len.load(Ordering::Acquire);
        if batch == 0 {
            return;
        }

        let mut ids = Vec::new();
        while ids.len() < batch {
            let Some(id) = self.pending.pop() else {
                break;
            };
            self.pending_len.fetch_sub(1, Ordering::AcqRel);
            ids.push(id);
        }
        if ids.is_empty() {
            return;
        }
        let held = self.held();

        let mut freed = 0u64;
        for id in ids {
            if held.contains(&id.encode()) {
                self.defer(id);
            } else {
                unsafe { self.arena.free(id) };
                freed += 1;
            }
        }

        self.counters.on_scan();
        self.counters.on_free(freed);
        crate::log_debug!(
            "Table scan freed {} pending records ({} still held)",
            freed,
            self.pending_len.load(Ordering::Relaxed)
        );
    }
}

impl Reclaimer for TableScanReclaimer {
    fn strategy(&self) -> ReclaimStrategy {
        ReclaimStrategy::TableScan
    }

    fn register_thread(&self) -> Result<usize, CuckooError> {
        let tid = self.registry.acquire()?;
        self.holders[tid].store(0, Ordering::Release);
        Ok(tid)
    }

    fn unregister_thread(&self, tid: usize) {
        if !self.registry.is_active(tid) {
            return;
        }
        self.holders[tid].store(0, Ordering::Release);
        self.registry.release(tid);
    }

    fn begin_op(&self, _handle: &ThreadHandle) {}

    fn end_op(&self, handle: &ThreadHandle) {
        self.holders[handle.tid()].store(0, Ordering::Release);
    }

    fn protect_load(&self, handle: &ThreadHandle, hazard: usize, slot: &AtomicU64) -> u64 {
        debug_assert_eq!(hazard, 0, "table scan keeps a single holder per thread");
        protect_with(&self.holders[handle.tid()], slot)
    }

    fn unprotect(&self, handle: &ThreadHandle, _hazard: usize) {
        self.holders[handle.tid()].store(0, Ordering::Release);
    }

    fn retire(&self, _handle: &ThreadHandle, id: RecordId) {
        self.counters.on_retire();
        self.defer(id);
        if self.pending_len.load(Ordering::Acquire) >= self.batch_threshold {
            self.retry_pending();
        }
    }

    fn try_free(&self, _handle: &ThreadHandle, id: RecordId) -> bool {
        self.counters.on_retire();
        if self.held().contains(&id.encode()) {
            self.defer(id);
            return false;
        }
        unsafe { self.arena.free(id) };
        self.counters.on_free(1);
        true
    }

    fn collect(&self, _handle: &ThreadHandle) {
        self.retry_pending();
    }

    fn stats(&self) -> ReclaimStats {
        self.counters
            .snapshot(self.strategy(), self.registry.registered(), None)
    }
}
