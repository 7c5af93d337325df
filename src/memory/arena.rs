//! 记录分配器 - 分段slab + 无锁空闲索引队列
//!
//! 记录通过 `RecordId` 引用。段目录中的段按需安装，段大小逐级翻倍，
//! 已安装的单元永不移动，因此读者持有索引即可定位记录。
//! 释放后的索引进入空闲队列复用，释放时先毒化记录载荷。

use crate::{error::CuckooError, memory::record::Record, types::RecordId};
use crossbeam::queue::SegQueue;
use std::{
    mem,
    ptr::{self, NonNull},
    sync::atomic::{AtomicPtr, AtomicU64, AtomicUsize, Ordering},
};

/// 第0段的单元数
pub const SEGMENT_BASE: usize = 64;

/// 段目录长度，总容量约 64 * 2^40 条记录
const MAX_SEGMENTS: usize = 40;

type RecordCell = AtomicPtr<Record>;

/// 分配器统计快照
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ArenaStats {
    pub allocations: u64,
    pub frees: u64,
    pub failed_allocations: u64,
    /// 尚未释放的记录数（含已退役待回收的）
    pub live_records: usize,
    pub live_bytes: usize,
    pub segments: usize,
    /// 曾经分配过的最大索引 + 1
    pub high_water: usize,
}

#[derive(Debug, Default)]
struct ArenaCounters {
    allocations: AtomicU64,
    frees: AtomicU64,
    failed_allocations: AtomicU64,
    live_bytes: AtomicUsize,
    segments: AtomicUsize,
}

/// 分段记录分配器
pub struct RecordArena {
    directory: Box<[AtomicPtr<RecordCell>]>,
    next: AtomicUsize,
    live: AtomicUsize,
    free_list: SegQueue<RecordId>,
    max_records: Option<usize>,
    counters: ArenaCounters,
}

// 单元中的裸指针只在回收协议保证无人引用时才被替换或释放
unsafe impl Send for RecordArena {}
unsafe impl Sync for RecordArena {}

impl RecordArena {
    pub fn new() -> Self {
        Self::with_limit(None)
    }

    /// 带记录数上限，超过上限的分配返回 `AllocationFailed`
    pub fn with_limit(max_records: Option<usize>) -> Self {
        let directory = (0..MAX_SEGMENTS)
            .map(|_| AtomicPtr::new(ptr::null_mut()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            directory,
            next: AtomicUsize::new(0),
            live: AtomicUsize::new(0),
            free_list: SegQueue::new(),
            max_records,
            counters: ArenaCounters::default(),
        }
    }

    pub fn max_records(&self) -> Option<usize> {
        self.max_records
    }

    /// 分配一条记录并返回其索引
    ///
    /// 失败时分配器状态不变（预留的计数和索引都会归还）。
    pub fn allocate(&self, key: &[u8], value: &[u8]) -> Result<RecordId, CuckooError> {
        let size = key.len() + value.len();
        self.reserve(size)?;

        match self.allocate_reserved(key, value) {
            Ok(id) => {
                self.counters.allocations.fetch_add(1, Ordering::Relaxed);
                self.counters.live_bytes.fetch_add(size, Ordering::Relaxed);
                Ok(id)
            }
            Err(e) => {
                self.live.fetch_sub(1, Ordering::AcqRel);
                self.counters.failed_allocations.fetch_add(1, Ordering::Relaxed);
                crate::log_warn!("Record allocation failed: {}", e);
                Err(e)
            }
        }
    }

    fn reserve(&self, size: usize) -> Result<(), CuckooError> {
        match self.max_records {
            Some(limit) => self
                .live
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                    (n < limit).then_some(n + 1)
                })
                .map(|_| ())
                .map_err(|_| {
                    self.counters.failed_allocations.fetch_add(1, Ordering::Relaxed);
                    CuckooError::AllocationFailed { size }
                }),
            None => {
                self.live.fetch_add(1, Ordering::AcqRel);
                Ok(())
            }
        }
    }

    fn allocate_reserved(&self, key: &[u8], value: &[u8]) -> Result<RecordId, CuckooError> {
        let record = Record::new(key, value)?;

        let id = match self.free_list.pop() {
            Some(id) => id,
            None => {
                let index = self.next.fetch_add(1, Ordering::AcqRel);
                if index > RecordId::MAX {
                    self.next.fetch_sub(1, Ordering::AcqRel);
                    return Err(CuckooError::AllocationFailed {
                        size: record.footprint(),
                    });
                }
                RecordId(index)
            }
        };

        let cell = match self.cell_or_install(id) {
            Ok(cell) => cell,
            Err(e) => {
                self.free_list.push(id);
                return Err(e);
            }
        };

        let fresh = Box::into_raw(Box::new(record));
        let old = cell.swap(fresh, Ordering::AcqRel);
        if !old.is_null() {
            // 被复用的索引上残留的是已毒化的旧记录，此时已无人引用
            unsafe { drop(Box::from_raw(old)) };
        }
        Ok(id)
    }

    /// 按索引读取记录
    ///
    /// # Safety
    /// 调用者必须保证在返回引用的使用期间该索引不会被释放并复用，
    /// 即记录处于回收层的保护之下，或者尚未发布给其他线程。
    #[inline]
    pub unsafe fn get(&self, id: RecordId) -> Option<&Record> {
        let cell = self.cell(id)?;
        let record = cell.load(Ordering::Acquire);
        NonNull::new(record).map(|p| &*p.as_ptr())
    }

    /// 释放记录：毒化载荷并把索引放回空闲队列
    ///
    /// # Safety
    /// 调用者必须保证记录已不在任何槽位中，且没有线程仍可能读取它。
    pub unsafe fn free(&self, id: RecordId) {
        let Some(cell) = self.cell(id) else {
            debug_assert!(false, "free of unallocated record {}", id);
            return;
        };
        let record = cell.load(Ordering::Acquire);
        let Some(mut record) = NonNull::new(record) else {
            debug_assert!(false, "free of empty cell {}", id);
            return;
        };
        let record = record.as_mut();
        let size = record.footprint();
        record.poison();

        self.counters.frees.fetch_add(1, Ordering::Relaxed);
        self.counters.live_bytes.fetch_sub(size, Ordering::Relaxed);
        self.live.fetch_sub(1, Ordering::AcqRel);
        self.free_list.push(id);
    }

    /// 当前未释放的记录数
    pub fn live_records(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> ArenaStats {
        ArenaStats {
            allocations: self.counters.allocations.load(Ordering::Relaxed),
            frees: self.counters.frees.load(Ordering::Relaxed),
            failed_allocations: self.counters.failed_allocations.load(Ordering::Relaxed),
            live_records: self.live_records(),
            live_bytes: self.counters.live_bytes.load(Ordering::Relaxed),
            segments: self.counters.segments.load(Ordering::Relaxed),
            high_water: self.next.load(Ordering::Acquire).min(RecordId::MAX + 1),
        }
    }

    /// 索引 -> (段号, 段内偏移)
    #[inline]
    fn locate(index: usize) -> (usize, usize) {
        let n = index / SEGMENT_BASE + 1;
        let segment = (usize::BITS - 1 - n.leading_zeros()) as usize;
        let offset = index - SEGMENT_BASE * ((1 << segment) - 1);
        (segment, offset)
    }

    #[inline]
    fn segment_len(segment: usize) -> usize {
        SEGMENT_BASE << segment
    }

    #[inline]
    fn cell(&self, id: RecordId) -> Option<&RecordCell> {
        let (segment, offset) = Self::locate(id.index());
        let base = self.directory.get(segment)?.load(Ordering::Acquire);
        if base.is_null() {
            return None;
        }
        // 偏移小于段长度，段一经安装直到分配器析构都不会移动
        Some(unsafe { &*base.add(offset) })
    }

    fn cell_or_install(&self, id: RecordId) -> Result<&RecordCell, CuckooError> {
        let (segment, offset) = Self::locate(id.index());
        let slot = self
            .directory
            .get(segment)
            .ok_or(CuckooError::AllocationFailed {
                size: mem::size_of::<Record>(),
            })?;

        let mut base = slot.load(Ordering::Acquire);
        if base.is_null() {
            base = self.install_segment(slot, segment)?;
        }
        Ok(unsafe { &*base.add(offset) })
    }

    fn install_segment(
        &self,
        slot: &AtomicPtr<RecordCell>,
        segment: usize,
    ) -> Result<*mut RecordCell, CuckooError> {
        let len = Self::segment_len(segment);
        let mut cells: Vec<RecordCell> = Vec::new();
        cells
            .try_reserve_exact(len)
            .map_err(|_| CuckooError::AllocationFailed {
                size: len * mem::size_of::<RecordCell>(),
            })?;
        cells.resize_with(len, || AtomicPtr::new(ptr::null_mut()));
        let fresh = Box::into_raw(cells.into_boxed_slice()) as *mut RecordCell;

        match slot.compare_exchange(ptr::null_mut(), fresh, Ordering::AcqRel, Ordering::Acquire) {
            Ok(_) => {
                self.counters.segments.fetch_add(1, Ordering::Relaxed);
                crate::log_debug!("Installed record segment {} ({} cells)", segment, len);
                Ok(fresh)
            }
            Err(existing) => {
                unsafe { drop(Box::from_raw(ptr::slice_from_raw_parts_mut(fresh, len))) };
                Ok(existing)
            }
        }
    }
}

impl Default for RecordArena {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RecordArena {
    fn drop(&mut self) {
        for (segment, slot) in self.directory.iter().enumerate() {
            let base = slot.load(Ordering::Acquire);
            if base.is_null() {
                continue;
            }
            let len = Self::segment_len(segment);
            unsafe {
                let cells = Box::from_raw(ptr::slice_from_raw_parts_mut(base, len));
                for cell in cells.iter() {
                    let record = cell.load(Ordering::Acquire);
                    if !record.is_null() {
                        drop(Box::from_raw(record));
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for RecordArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordArena")
            .field("max_records", &self.max_records)
            .field("stats", &self.stats())
            .finish()
    }
}
