//! DEBRA风格纪元回收
//!
//! 全局纪元每次前进 `EPOCH_INCREMENT`，公告值的最低位表示静默（不在操作中）。
//! 每个线程维护三个limbo包，观察到新纪元时轮转：被轮转为当前包的那个包
//! 装的是三次轮转之前退役的记录，此时全局纪元至少又前进了两次，可以安全释放。
//! 线程每执行 `EPOCH_CHECK_INTERVAL` 次操作检查一个其他线程，
//! 所有线程都处于当前纪元或静默后尝试推进纪元。

use super::{
    OrphanPool, ReclaimCounters, ReclaimStats, Reclaimer, ThreadHandle, ThreadRegistry,
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

pub const EPOCH_INCREMENT: u64 = 2;
pub const EPOCH_CHECK_INTERVAL: usize = 10;
pub const LIMBO_BAGS: usize = 3;

const QUIESCENT: u64 = 1;
const INITIAL_EPOCH: u64 = EPOCH_INCREMENT;

#[derive(Debug, Default)]
struct LocalEpoch {
    bags: [Vec<RecordId>; LIMBO_BAGS],
    current: usize,
    last_seen: u64,
    ops: usize,
    check_next: usize,
}

pub struct EpochReclaimer {
    arena: Arc<RecordArena>,
    registry: ThreadRegistry,
    epoch: CachePadded<AtomicU64>,
    announcements: Box<[CachePadded<AtomicU64>]>,
    locals: Box<[CachePadded<Mutex<LocalEpoch>>]>,
    orphans: OrphanPool,
    counters: ReclaimCounters,
    advances: AtomicU64,
}

impl EpochReclaimer {
    pub fn new(arena: Arc<RecordArena>, max_threads: usize) -> Self {
        Self {
            arena,
            registry: ThreadRegistry::new(max_threads),
            epoch: CachePadded::new(AtomicU64::new(INITIAL_EPOCH)),
            announcements: (0..max_threads)
                .map(|_| CachePadded::new(AtomicU64::new(INITIAL_EPOCH | QUIESCENT)))
                .collect(),
            locals: (0..max_threads)
                .map(|_| CachePadded::new(Mutex::new(LocalEpoch::default())))
                .collect(),
            orphans: OrphanPool::default(),
            counters: ReclaimCounters::default(),
            advances: AtomicU64::new(0),
        }
    }

    /// 当前全局纪元
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// 纪元推进次数
    pub fn advances(&self) -> u64 {
        self.advances.load(Ordering::Relaxed)
    }

    /// 线程 `other` 是否不会阻碍纪元 `epoch` 的推进
    fn caught_up(&self, other: usize, epoch: u64) -> bool {
        let announced = self.announcements[other].load(Ordering::SeqCst);
        announced & QUIESCENT != 0 || announced == epoch
    }

    fn try_advance(&self, epoch: u64) -> bool {
        let advanced = self
            .epoch
            .compare_exchange(
                epoch,
                epoch + EPOCH_INCREMENT,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok();
        if advanced {
            self.advances.fetch_add(1, Ordering::Relaxed);
            crate::log_debug!("Epoch advanced {} -> {}", epoch, epoch + EPOCH_INCREMENT);
        }
        advanced
    }

    /// 观察到新纪元：轮转limbo包并释放最旧的包
    fn rotate(&self, local: &mut LocalEpoch, epoch: u64) {
        local.last_seen = epoch;
        local.check_next = 0;
        local.current = (local.current + 1) % LIMBO_BAGS;

        let bag = std::mem::take(&mut local.bags[local.current]);
        if !bag.is_empty() {
            let count = bag.len() as u64;
            for id in bag {
                unsafe { self.arena.free(id) };
            }
            self.counters.on_free(count);
        }

        let orphans = self.orphans.adopt();
        local.bags[local.current].extend(orphans);
    }

    /// 增量检查一个其他线程，全部通过后推进纪元
    fn check_one(&self, tid: usize, local: &mut LocalEpoch, epoch: u64) {
        let n = self.announcements.len();
        if local.check_next == tid {
            local.check_next += 1;
        }
        if local.check_next < n {
            if !self.caught_up(local.check_next, epoch) {
                return;
            }
            local.check_next += 1;
            if local.check_next == tid {
                local.check_next += 1;
            }
        }
        if local.check_next >= n {
            self.try_advance(epoch);
        }
    }

    fn others_quiescent(&self, tid: usize) -> bool {
        self.announcements
            .iter()
            .enumerate()
            .filter(|&(other, _)| other != tid)
            .all(|(_, announced)| announced.load(Ordering::SeqCst) & QUIESCENT != 0)
    }
}

impl Reclaimer for EpochReclaimer {
    fn strategy(&self) -> ReclaimStrategy {
        ReclaimStrategy::Epoch
    }

    fn register_thread(&self) -> Result<usize, CuckooError> {
        let tid = self.registry.acquire()?;
        let epoch = self.epoch();
        *self.locals[tid].lock() = LocalEpoch {
            last_seen: epoch,
            ..LocalEpoch::default()
        };
        self.announcements[tid].store(epoch | QUIESCENT, Ordering::SeqCst);
        Ok(tid)
    }

    fn unregister_thread(&self, tid: usize) {
        if !self.registry.is_active(tid) {
            return;
        }
        let epoch = self.epoch();
        self.announcements[tid].store(epoch | QUIESCENT, Ordering::SeqCst);
        let bags = std::mem::take(&mut self.locals[tid].lock().bags);
        self.orphans.deposit(bags.into_iter().flatten());
        self.registry.release(tid);
    }

    fn begin_op(&self, handle: &ThreadHandle) {
        let tid = handle.tid();
        let mut local = self.locals[tid].lock();

        let epoch = self.epoch();
        if epoch != local.last_seen {
            self.rotate(&mut local, epoch);
        }
        self.announcements[tid].store(epoch, Ordering::SeqCst);

        local.ops += 1;
        if local.ops % EPOCH_CHECK_INTERVAL == 0 {
            self.check_one(tid, &mut local, epoch);
        }
    }

    fn end_op(&self, handle: &ThreadHandle) {
        let cell = &self.announcements[handle.tid()];
        let announced = cell.load(Ordering::Relaxed);
        cell.store(announced | QUIESCENT, Ordering::Release);
    }

    fn protect_load(&self, _handle: &ThreadHandle, _hazard: usize, slot: &AtomicU64) -> u64 {
        // 纪元公告已在 begin_op 中完成
        slot.load(Ordering::Acquire)
    }

    fn unprotect(&self, _handle: &ThreadHandle, _hazard: usize) {}

    fn retire(&self, handle: &ThreadHandle, id: RecordId) {
        self.counters.on_retire();
        let mut local = self.locals[handle.tid()].lock();
        let current = local.current;
        local.bags[current].push(id);
    }

    fn try_free(&self, handle: &ThreadHandle, id: RecordId) -> bool {
        fence(Ordering::SeqCst);
        if !self.others_quiescent(handle.tid()) {
            self.retire(handle, id);
            return false;
        }
        self.counters.on_retire();
        unsafe { self.arena.free(id) };
        self.counters.on_free(1);
        true
    }

    fn collect(&self, handle: &ThreadHandle) {
        let tid = handle.tid();
        self.counters.on_scan();
        for _ in 0..LIMBO_BAGS {
            let epoch = self.epoch();
            let mut local = self.locals[tid].lock();
            let all_caught_up = (0..self.announcements.len())
                .filter(|&other| other != tid)
                .all(|other| self.caught_up(other, epoch));
            if all_caught_up {
                self.try_advance(epoch);
            }

            let now = self.epoch();
            if now == local.last_seen {
                break;
            }
            self.rotate(&mut local, now);
        }
    }

    fn stats(&self) -> ReclaimStats {
        self.counters.snapshot(
            self.strategy(),
            self.registry.registered(),
            Some(self.epoch()),
        )
    }
}
