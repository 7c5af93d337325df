//! 危险指针回收
//!
//! 每个线程持有 `HAZARDS_PER_THREAD` 个公告单元和一份私有退役列表。
//! 退役列表达到阈值后收集全部公告，释放未被公告的记录，其余留待下一轮。

use super::{
    announced_set, protect_with, OrphanPool, ReclaimCounters, ReclaimStats, Reclaimer,
    ThreadHandle, ThreadRegistry,
};
use crate::{
    error::CuckooError,
    memory::RecordArena,
    types::{RecordId, ReclaimStrategy},
};
use crossbeam::utils::CachePadded;
use parking_lot::Mutex;
use std::sync::{
    atomic::{fence, AtomicU64, Ordering},
    Arc,
};

/// 每线程危险指针数
pub const HAZARDS_PER_THREAD: usize = 1;

type HazardCells = [AtomicU64; HAZARDS_PER_THREAD];

pub struct HazardPointerReclaimer {
    arena: Arc<RecordArena>,
    registry: ThreadRegistry,
    hazards: Box<[CachePadded<HazardCells>]>,
    retired: Box<[CachePadded<Mutex<Vec<RecordId>>>]>,
    orphans: OrphanPool,
    retire_threshold: usize,
    counters: ReclaimCounters,
}

impl HazardPointerReclaimer {
    pub fn new(arena: Arc<RecordArena>, max_threads: usize, retire_threshold: usize) -> Self {
        Self {
            arena,
            registry: ThreadRegistry::new(max_threads),
            hazards: (0..max_threads)
                .map(|_| CachePadded::new(std::array::from_fn(|_| AtomicU64::new(0))))
                .collect(),
            retired: (0..max_threads)
                .map(|_| CachePadded::new(Mutex::new(Vec::new())))
                .collect(),
            orphans: OrphanPool::default(),
            retire_threshold: retire_threshold.max(1),
            counters: ReclaimCounters::default(),
        }
    }

    fn cell(&self, handle: &ThreadHandle, hazard: usize) -> &AtomicU64 {
        debug_assert!(hazard < HAZARDS_PER_THREAD, "hazard index {} out of range", hazard);
        &self.hazards[handle.tid()][hazard % HAZARDS_PER_THREAD]
    }

    fn clear_hazards(&self, tid: usize) {
        for cell in self.hazards[tid].iter() {
            cell.store(0, Ordering::Release);
        }
    }

    /// 扫描全部公告，释放本线程退役列表中未受保护的记录
    fn scan(&self, tid: usize) {
        let mut list = self.retired[tid].lock();
        list.extend(self.orphans.adopt());
        if list.is_empty() {
            return;
        }

        // 退役前的摘除CAS必须先于公告读取
        fence(Ordering::SeqCst);
        let protected = announced_set(self.hazards.iter().flat_map(|cells| cells.iter()));

        let before = list.len();
        list.retain(|&id| {
            if protected.contains(&id.encode()) {
                true
            } else {
                // 摘除后不再有新的公告能通过复核，未被公告即无人持有
                unsafe { self.arena.free(id) };
                false
            }
        });
        let freed = before - list.len();

        self.counters.on_scan();
        self.counters.on_free(freed as u64);
        crate::log_debug!(
            "Hazard scan by thread {}: freed {}, still protected {}",
            tid,
            freed,
            list.len()
        );
    }
}

impl Reclaimer for HazardPointerReclaimer {
    fn strategy(&self) -> ReclaimStrategy {
        ReclaimStrategy::HazardPointer
    }

    fn register_thread(&self) -> Result<usize, CuckooError> {
        let tid = self.registry.acquire()?;
        self.clear_hazards(tid);
        Ok(tid)
    }

    fn unregister_thread(&self, tid: usize) {
        if !self.registry.is_active(tid) {
            return;
        }
        self.clear_hazards(tid);
        self.scan(tid);
        let leftover = std::mem::take(&mut *self.retired[tid].lock());
        self.orphans.deposit(leftover);
        self.registry.release(tid);
    }

    fn begin_op(&self, _handle: &ThreadHandle) {}

    fn end_op(&self, handle: &ThreadHandle) {
        self.clear_hazards(handle.tid());
    }

    fn protect_load(&self, handle: &ThreadHandle, hazard: usize, slot: &AtomicU64) -> u64 {
        protect_with(self.cell(handle, hazard), slot)
    }

    fn unprotect(&self, handle: &ThreadHandle, hazard: usize) {
        self.cell(handle, hazard).store(0, Ordering::Release);
    }

    fn retire(&self, handle: &ThreadHandle, id: RecordId) {
        self.counters.on_retire();
        let len = {
            let mut list = self.retired[handle.tid()].lock();
            list.push(id);
            list.len()
        };
        if len >= self.retire_threshold {
            self.scan(handle.tid());
        }
    }

    fn try_free(&self, handle: &ThreadHandle, id: RecordId) -> bool {
        fence(Ordering::SeqCst);
        let protected = announced_set(self.hazards.iter().flat_map(|cells| cells.iter()));
        if protected.contains(&id.encode()) {
            self.retire(handle, id);
            return false;
        }

        self.counters.on_retire();
        unsafe { self.arena.free(id) };
        self.counters.on_free(1);
        true
    }

    fn collect(&self, handle: &ThreadHandle) {
        self.scan(handle.tid());
    }

    fn stats(&self) -> ReclaimStats {
        self.counters
            .snapshot(self.strategy(), self.registry.registered(), None)
    }
}
