//! 安全内存回收层 - 可插拔的保护/退役/释放策略
//!
//! 读者在解引用记录索引前通过 `protect_load` 公告，写者把移出表的记录交给
//! `retire`，由具体策略证明没有线程仍持有保护后才真正释放。
//! 每个线程通过 `ThreadHandle` 显式携带自己的回收上下文。

pub mod epoch;
pub mod hazard;
pub mod table_scan;

pub use epoch::EpochReclaimer;
pub use hazard::HazardPointerReclaimer;
pub use table_scan::TableScanReclaimer;
pub use crate::stats::ReclaimStats;

use crate::{
    error::CuckooError,
    memory::RecordArena,
    types::{RecordId, ReclaimStrategy, SlotEntry},
};
use ahash::AHashSet;
use crossbeam::utils::CachePadded;
use parking_lot::Mutex;
use std::{
    cell::Cell,
    fmt,
    marker::PhantomData,
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
};

/// 回收策略接口
///
/// 除 `register_thread`/`unregister_thread` 外，所有方法只能由持有对应
/// `ThreadHandle` 的线程调用。
pub trait Reclaimer: Send + Sync {
    fn strategy(&self) -> ReclaimStrategy;

    /// 分配线程槽位，返回线程ID
    fn register_thread(&self) -> Result<usize, CuckooError>;

    /// 归还线程槽位，未回收的记录移交全局孤儿池
    fn unregister_thread(&self, tid: usize);

    /// 表操作开始
    fn begin_op(&self, handle: &ThreadHandle);

    /// 表操作结束，清除本线程的全部保护
    fn end_op(&self, handle: &ThreadHandle);

    /// 原子读取槽位字并公告其中的记录索引，返回已受保护的槽位字
    fn protect_load(&self, handle: &ThreadHandle, hazard: usize, slot: &AtomicU64) -> u64;

    fn unprotect(&self, handle: &ThreadHandle, hazard: usize);

    /// 接管一条已从表中移除的记录，延迟到安全时释放
    fn retire(&self, handle: &ThreadHandle, id: RecordId);

    /// 尝试立即释放；仍受保护时转入退役队列并返回 false
    fn try_free(&self, handle: &ThreadHandle, id: RecordId) -> bool;

    /// 强制执行一轮回收
    fn collect(&self, handle: &ThreadHandle);

    fn stats(&self) -> ReclaimStats;
}

/// 按策略构造回收器
pub fn build_reclaimer(
    strategy: ReclaimStrategy,
    arena: Arc<RecordArena>,
    max_threads: usize,
    retire_threshold: usize,
) -> Arc<dyn Reclaimer> {
    match strategy {
        ReclaimStrategy::HazardPointer => Arc::new(HazardPointerReclaimer::new(
            arena,
            max_threads,
            retire_threshold,
        )),
        ReclaimStrategy::Epoch => Arc::new(EpochReclaimer::new(arena, max_threads)),
        ReclaimStrategy::TableScan => {
            Arc::new(TableScanReclaimer::new(arena, max_threads, retire_threshold))
        }
    }
}

/// 每线程回收上下文
///
/// 可以移交给其他线程（`Send`），但不能被共享（`!Sync`）。析构时注销线程槽位。
pub struct ThreadHandle {
    tid: usize,
    reclaimer: Arc<dyn Reclaimer>,
    _not_sync: PhantomData<Cell<()>>,
}

impl ThreadHandle {
    /// 在回收器上注册当前线程
    pub fn register(reclaimer: Arc<dyn Reclaimer>) -> Result<Self, CuckooError> {
        let tid = reclaimer.register_thread()?;
        Ok(Self {
            tid,
            reclaimer,
            _not_sync: PhantomData,
        })
    }

    #[inline]
    pub fn tid(&self) -> usize {
        self.tid
    }

    pub fn reclaimer(&self) -> &Arc<dyn Reclaimer> {
        &self.reclaimer
    }

    /// 句柄是否属于给定回收器
    pub fn is_registered_with(&self, reclaimer: &Arc<dyn Reclaimer>) -> bool {
        Arc::as_ptr(&self.reclaimer) as *const () == Arc::as_ptr(reclaimer) as *const ()
    }

    /// 进入一次表操作，guard 析构时结束
    #[inline]
    pub fn pin(&self) -> OpGuard<'_> {
        self.reclaimer.begin_op(self);
        OpGuard { handle: self }
    }

    #[inline]
    pub fn protect_load(&self, hazard: usize, slot: &AtomicU64) -> u64 {
        self.reclaimer.protect_load(self, hazard, slot)
    }

    #[inline]
    pub fn unprotect(&self, hazard: usize) {
        self.reclaimer.unprotect(self, hazard)
    }

    #[inline]
    pub fn retire(&self, id: RecordId) {
        self.reclaimer.retire(self, id)
    }

    #[inline]
    pub fn try_free(&self, id: RecordId) -> bool {
        self.reclaimer.try_free(self, id)
    }

    pub fn collect(&self) {
        self.reclaimer.collect(self)
    }
}

impl Drop for ThreadHandle {
    fn drop(&mut self) {
        self.reclaimer.unregister_thread(self.tid);
    }
}

impl fmt::Debug for ThreadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadHandle")
            .field("tid", &self.tid)
            .field("strategy", &self.reclaimer.strategy())
            .finish()
    }
}

/// 操作期间的RAII保护
pub struct OpGuard<'h> {
    handle: &'h ThreadHandle,
}

impl Drop for OpGuard<'_> {
    fn drop(&mut self) {
        self.handle.reclaimer.end_op(self.handle);
    }
}

/// 线程槽位注册表
pub(crate) struct ThreadRegistry {
    active: Box<[CachePadded<AtomicBool>]>,
    registered: AtomicUsize,
}

impl ThreadRegistry {
    pub(crate) fn new(max_threads: usize) -> Self {
        Self {
            active: (0..max_threads)
                .map(|_| CachePadded::new(AtomicBool::new(false)))
                .collect(),
            registered: AtomicUsize::new(0),
        }
    }

    pub(crate) fn acquire(&self) -> Result<usize, CuckooError> {
        for (tid, slot) in self.active.iter().enumerate() {
            if !slot.load(Ordering::Relaxed)
                && slot
                    .compare_exchange(false, true, Ordering::AcqRel, Ordering::Relaxed)
                    .is_ok()
            {
                self.registered.fetch_add(1, Ordering::Relaxed);
                return Ok(tid);
            }
        }
        crate::log_warn!("Thread limit reached ({} slots)", self.active.len());
        Err(CuckooError::ThreadLimitReached {
            max_threads: self.active.len(),
        })
    }

    pub(crate) fn release(&self, tid: usize) {
        if let Some(slot) = self.active.get(tid) {
            if slot.swap(false, Ordering::AcqRel) {
                self.registered.fetch_sub(1, Ordering::Relaxed);
            }
        }
    }

    pub(crate) fn is_active(&self, tid: usize) -> bool {
        self.active
            .get(tid)
            .is_some_and(|slot| slot.load(Ordering::Acquire))
    }

    pub(crate) fn registered(&self) -> usize {
        self.registered.load(Ordering::Relaxed)
    }
}

/// 注销线程留下的待回收记录
#[derive(Default)]
pub(crate) struct OrphanPool {
    ids: Mutex<Vec<RecordId>>,
}

impl OrphanPool {
    pub(crate) fn deposit(&self, ids: impl IntoIterator<Item = RecordId>) {
        let mut pool = self.ids.lock();
        let before = pool.len();
        pool.extend(ids);
        if pool.len() > before {
            crate::log_debug!("Orphaned {} retired records", pool.len() - before);
        }
    }

    pub(crate) fn adopt(&self) -> Vec<RecordId> {
        let mut pool = self.ids.lock();
        if pool.is_empty() {
            Vec::new()
        } else {
            std::mem::take(&mut *pool)
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.ids.lock().len()
    }
}

/// 回收计数器
#[derive(Debug, Default)]
pub(crate) struct ReclaimCounters {
    pub(crate) retired: AtomicU64,
    pub(crate) freed: AtomicU64,
    pub(crate) scans: AtomicU64,
}

impl ReclaimCounters {
    pub(crate) fn on_retire(&self) {
        self.retired.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn on_free(&self, count: u64) {
        self.freed.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn on_scan(&self) {
        self.scans.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(
        &self,
        strategy: ReclaimStrategy,
        registered_threads: usize,
        epoch: Option<u64>,
    ) -> ReclaimStats {
        let retired = self.retired.load(Ordering::Relaxed);
        let freed = self.freed.load(Ordering::Relaxed);
        ReclaimStats {
            strategy,
            retired,
            freed,
            pending: retired.saturating_sub(freed),
            scans: self.scans.load(Ordering::Relaxed),
            registered_threads,
            epoch,
        }
    }
}

/// 危险指针式保护：读取、公告、复核，直到公告的索引与槽位一致
///
/// 返回的槽位字中的记录索引在公告被清除前不会被释放。
#[inline]
pub(crate) fn protect_with(cell: &AtomicU64, slot: &AtomicU64) -> u64 {
    let mut word = slot.load(Ordering::Acquire);
    loop {
        let announced = word & SlotEntry::INDEX_MASK;
        cell.store(announced, Ordering::SeqCst);
        if announced == 0 {
            return word;
        }
        let current = slot.load(Ordering::SeqCst);
        if current & SlotEntry::INDEX_MASK == announced {
            return current;
        }
        word = current;
    }
}

/// 收集所有非空公告
pub(crate) fn announced_set<'a>(cells: impl Iterator<Item = &'a AtomicU64>) -> AHashSet<u64> {
    cells
        .map(|cell| cell.load(Ordering::SeqCst))
        .filter(|&announced| announced != 0)
        .collect()
}
