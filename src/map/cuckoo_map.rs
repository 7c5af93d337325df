//! Cuckoo哈希表核心实现
//!
//! 每个键有两个候选桶。查找无锁：读取槽位字，指纹匹配后经回收层保护记录
//! 再比较完整键。插入先以 TENTATIVE 标记占位，发布占位后重新扫描同一个键，
//! 确认没有其他已提交或更早的占位副本后才提交，因此同一个键的两个并发插入
//! 不可能都成功。所有CAS竞争失败都会从头重试整个操作。

use crate::{
    error::CuckooError,
    hash::{HashAlgorithm, HashedKey, KeyHasher},
    map::{bucket::BucketContainer, MAX_BUCKET_SIZE},
    memory::{ArenaStats, RecordArena},
    reclaim::{build_reclaimer, ReclaimStats, Reclaimer, ThreadHandle},
    stats::{OperationStats, OperationStatsSnapshot},
    types::{OperationType, RecordId, ReclaimStrategy, SlotEntry},
};
use crossbeam::utils::{Backoff, CachePadded};
use std::{
    fmt,
    sync::{
        atomic::{fence, AtomicUsize, Ordering},
        Arc,
    },
};

/// 扫描使用的危险指针下标
pub(crate) const SCAN_HAZARD: usize = 0;

const MAX_HASHPOWER: u32 = 40;

/// 哈希表配置
#[derive(Clone, Debug)]
pub struct CuckooMapConfig {
    /// 预期容纳的条目数，向上取整为 slots_per_bucket * 2^hashpower
    pub initial_capacity: usize,
    pub slots_per_bucket: usize,
    /// 单条踢出路径的最大搬迁次数
    pub max_kick_depth: usize,
    pub hash_algorithm: HashAlgorithm,
    pub reclaim_strategy: ReclaimStrategy,
    pub max_threads: usize,
    /// 危险指针退役列表扫描阈值 / 表扫描待定批量
    pub retire_threshold: usize,
    /// 同时存在（含待回收）的记录上限
    pub max_records: Option<usize>,
}

impl Default for CuckooMapConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 1024,
            slots_per_bucket: super::DEFAULT_BUCKET_SIZE,
            max_kick_depth: 5,
            hash_algorithm: HashAlgorithm::default(),
            reclaim_strategy: ReclaimStrategy::default(),
            max_threads: 64,
            retire_threshold: 64,
            max_records: None,
        }
    }
}

impl CuckooMapConfig {
    pub fn with_capacity(initial_capacity: usize) -> Self {
        Self {
            initial_capacity,
            ..Self::default()
        }
    }

    pub fn reclaim_strategy(mut self, strategy: ReclaimStrategy) -> Self {
        self.reclaim_strategy = strategy;
        self
    }

    pub fn validate(&self) -> Result<(), CuckooError> {
        let invalid = |reason: String| Err(CuckooError::InvalidConfig { reason });

        if self.initial_capacity == 0 {
            return invalid("initial_capacity 必须大于0".into());
        }
        if !self.slots_per_bucket.is_power_of_two() || self.slots_per_bucket > MAX_BUCKET_SIZE {
            return invalid(format!(
                "slots_per_bucket 必须是不超过 {} 的2的幂，当前为 {}",
                MAX_BUCKET_SIZE, self.slots_per_bucket
            ));
        }
        if !(1..=16).contains(&self.max_kick_depth) {
            return invalid(format!(
                "max_kick_depth 必须在 1..=16 之间，当前为 {}",
                self.max_kick_depth
            ));
        }
        if self.max_threads == 0 {
            return invalid("max_threads 必须大于0".into());
        }
        if self.retire_threshold == 0 {
            return invalid("retire_threshold 必须大于0".into());
        }
        if self.max_records == Some(0) {
            return invalid("max_records 不能为0".into());
        }
        let limit = (1usize << MAX_HASHPOWER).saturating_mul(self.slots_per_bucket);
        if self.initial_capacity > limit {
            return invalid(format!("initial_capacity 超过上限 {}", limit));
        }
        Ok(())
    }
}

/// 哈希表统计信息
#[derive(Debug, Default, Clone)]
pub struct CuckooMapStats {
    pub size: usize,
    pub capacity: usize,
    pub load_factor: f32,
    pub hashpower: u32,
    pub bucket_count: usize,
    pub slots_per_bucket: usize,
    pub operations: OperationStatsSnapshot,
    pub reclaim: ReclaimStats,
    pub memory: ArenaStats,
}

/// 按容量提示计算 hashpower，至少两个桶
pub(crate) fn reserve_calc(capacity: usize, slots_per_bucket: usize) -> u32 {
    let buckets = capacity.div_ceil(slots_per_bucket).max(2);
    buckets.next_power_of_two().trailing_zeros()
}

/// 扫描命中的条目，记录仍在 `SCAN_HAZARD` 保护下
#[derive(Debug, Clone, Copy)]
pub(crate) struct Located {
    pub(crate) bucket: usize,
    pub(crate) slot: usize,
    pub(crate) entry: SlotEntry,
    pub(crate) id: RecordId,
}

enum Probe {
    Duplicate(Located),
    Empty { bucket: usize, slot: usize },
    Full,
}

enum Conflict {
    None,
    Committed(Located),
    /// 其他插入者对同一个键的占位中索引最小的一个
    Tentative(RecordId),
}

enum Claim {
    Committed,
    Duplicate(Located),
    Retry { published: bool },
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    InsertOnly,
    Assign,
}

enum WriteOutcome {
    Inserted,
    Duplicate { bucket: usize, slot: usize },
    Overwritten,
}

/// 尚未进入表的新记录
struct PendingRecord {
    id: Option<RecordId>,
    /// 曾以占位形式对其他线程可见
    published: bool,
}

impl PendingRecord {
    fn get_or_allocate(
        &mut self,
        arena: &RecordArena,
        key: &[u8],
        value: &[u8],
    ) -> Result<RecordId, CuckooError> {
        match self.id {
            Some(id) => Ok(id),
            None => {
                let id = arena.allocate(key, value)?;
                self.id = Some(id);
                Ok(id)
            }
        }
    }
}

/// 并发Cuckoo哈希表
pub struct CuckooMap {
    config: CuckooMapConfig,
    hasher: KeyHasher,
    pub(crate) buckets: BucketContainer,
    arena: Arc<RecordArena>,
    reclaimer: Arc<dyn Reclaimer>,
    size: CachePadded<AtomicUsize>,
    pub(crate) stats: OperationStats,
}

impl CuckooMap {
    /// 创建新哈希表
    pub fn new(config: CuckooMapConfig) -> Result<Self, CuckooError> {
        let hasher = KeyHasher::new(config.hash_algorithm);
        Self::with_hasher(config, hasher)
    }

    pub fn with_capacity(initial_capacity: usize) -> Result<Self, CuckooError> {
        Self::new(CuckooMapConfig::with_capacity(initial_capacity))
    }

    /// 使用指定哈希器创建
    pub fn with_hasher(config: CuckooMapConfig, hasher: KeyHasher) -> Result<Self, CuckooError> {
        config.validate()?;

        let hashpower = reserve_calc(config.initial_capacity, config.slots_per_bucket);
        let buckets = BucketContainer::new(hashpower, config.slots_per_bucket)?;
        let arena = Arc::new(RecordArena::with_limit(config.max_records));
        let reclaimer = build_reclaimer(
            config.reclaim_strategy,
            Arc::clone(&arena),
            config.max_threads,
            config.retire_threshold,
        );

        crate::log_info!(
            "Created cuckoo map: hashpower={}, buckets={}, slots_per_bucket={}, hash={}, reclaim={}",
            hashpower,
            buckets.bucket_count(),
            config.slots_per_bucket,
            hasher.algorithm().as_str(),
            config.reclaim_strategy
        );

        Ok(Self {
            config,
            hasher,
            buckets,
            arena,
            reclaimer,
            size: CachePadded::new(AtomicUsize::new(0)),
            stats: OperationStats::new(),
        })
    }

    /// 注册调用线程，之后所有操作都要带上返回的句柄
    pub fn register_thread(&self) -> Result<ThreadHandle, CuckooError> {
        let handle = ThreadHandle::register(Arc::clone(&self.reclaimer))?;
        crate::log_info!("Registered thread slot {}", handle.tid());
        Ok(handle)
    }

    pub fn config(&self) -> &CuckooMapConfig {
        &self.config
    }

    pub fn reclaim_strategy(&self) -> ReclaimStrategy {
        self.reclaimer.strategy()
    }

    #[inline]
    fn hash_key(&self, key: &[u8]) -> HashedKey {
        HashedKey::new(self.hasher.hash(key), self.buckets.hashpower())
    }

    #[inline]
    fn check_handle(&self, handle: &ThreadHandle) {
        debug_assert!(
            handle.is_registered_with(&self.reclaimer),
            "thread handle belongs to another map"
        );
    }

    // ---------------------------------------------------------------
    // 扫描
    // ---------------------------------------------------------------

    /// 在单个槽位上比较完整键；命中时记录保持受保护
    fn match_slot(
        &self,
        handle: &ThreadHandle,
        hk: &HashedKey,
        key: &[u8],
        bucket: usize,
        slot: usize,
        accept: impl Fn(SlotEntry) -> bool,
    ) -> Option<Located> {
        let wanted = |entry: SlotEntry| !entry.is_empty() && entry.tag() == hk.partial && accept(entry);

        if !wanted(self.buckets.read(bucket, slot)) {
            return None;
        }
        let word = handle.protect_load(SCAN_HAZARD, self.buckets.slot(bucket, slot).as_atomic());
        let entry = SlotEntry::from_raw(word);
        if !wanted(entry) {
            return None;
        }
        let id = entry.record_id()?;
        // SAFETY: 索引已由 SCAN_HAZARD 保护（纪元策略下由当前操作保护）
        let record = unsafe { self.arena.get(id) }?;
        debug_assert!(record.is_live(), "protected record {} was freed", id);

        record.matches(key).then_some(Located {
            bucket,
            slot,
            entry,
            id,
        })
    }

    fn snapshot_versions(&self, buckets: &[usize; 2]) -> [u64; 2] {
        [
            self.buckets.bucket(buckets[0]).version().read_snapshot(),
            self.buckets.bucket(buckets[1]).version().read_snapshot(),
        ]
    }

    fn validate_versions(&self, buckets: &[usize; 2], snapshots: &[u64; 2]) -> bool {
        self.buckets.bucket(buckets[0]).version().validate(snapshots[0])
            && self.buckets.bucket(buckets[1]).version().validate(snapshots[1])
    }

    /// 经版本校验的查找：未命中时确认期间没有搬迁，否则重扫
    pub(crate) fn locate(&self, handle: &ThreadHandle, hk: &HashedKey, key: &[u8]) -> Option<Located> {
        let (buckets, n) = hk.buckets();
        let slots = self.buckets.slots_per_bucket();
        let backoff = Backoff::new();

        loop {
            let snapshots = self.snapshot_versions(&buckets);
            for &bucket in &buckets[..n] {
                for slot in 0..slots {
                    if let Some(found) =
                        self.match_slot(handle, hk, key, bucket, slot, SlotEntry::is_visible)
                    {
                        return Some(found);
                    }
                }
            }
            handle.unprotect(SCAN_HAZARD);

            if self.validate_versions(&buckets, &snapshots) {
                return None;
            }
            self.stats.record_scan_retry();
            backoff.snooze();
        }
    }

    /// 插入前的重复/空位扫描，不做版本校验（提交前的复查会校验）
    fn probe(&self, handle: &ThreadHandle, hk: &HashedKey, key: &[u8]) -> Probe {
        let (buckets, n) = hk.buckets();
        let mut empty = None;

        for &bucket in &buckets[..n] {
            for slot in 0..self.buckets.slots_per_bucket() {
                if self.buckets.read(bucket, slot).is_empty() {
                    empty.get_or_insert((bucket, slot));
                    continue;
                }
                if let Some(found) =
                    self.match_slot(handle, hk, key, bucket, slot, SlotEntry::is_visible)
                {
                    return Probe::Duplicate(found);
                }
            }
        }
        handle.unprotect(SCAN_HAZARD);

        match empty {
            Some((bucket, slot)) => Probe::Empty { bucket, slot },
            None => Probe::Full,
        }
    }

    /// 占位发布后的复查：寻找同一个键的其他副本（含占位）
    fn scan_conflict(
        &self,
        handle: &ThreadHandle,
        hk: &HashedKey,
        key: &[u8],
        own: (usize, usize),
    ) -> Conflict {
        let (buckets, n) = hk.buckets();
        let backoff = Backoff::new();

        loop {
            let snapshots = self.snapshot_versions(&buckets);
            let mut tentative: Option<RecordId> = None;

            for &bucket in &buckets[..n] {
                for slot in 0..self.buckets.slots_per_bucket() {
                    if (bucket, slot) == own {
                        continue;
                    }
                    let Some(found) = self.match_slot(handle, hk, key, bucket, slot, |_| true)
                    else {
                        continue;
                    };
                    if !found.entry.is_tentative() {
                        handle.unprotect(SCAN_HAZARD);
                        return Conflict::Committed(found);
                    }
                    tentative = Some(tentative.map_or(found.id, |t| t.min(found.id)));
                }
            }
            handle.unprotect(SCAN_HAZARD);

            if let Some(other) = tentative {
                return Conflict::Tentative(other);
            }
            if self.validate_versions(&buckets, &snapshots) {
                return Conflict::None;
            }
            self.stats.record_scan_retry();
            backoff.snooze();
        }
    }

    // ---------------------------------------------------------------
    // 插入协议
    // ---------------------------------------------------------------

    /// 占位、复查、提交
    ///
    /// 多个插入者同时占位同一个键时，记录索引最小者等待，其余撤回重试。
    fn claim(
        &self,
        handle: &ThreadHandle,
        hk: &HashedKey,
        key: &[u8],
        bucket: usize,
        slot: usize,
        id: RecordId,
    ) -> Claim {
        let tentative = SlotEntry::new(hk.partial, id).with_tentative();
        if !self.buckets.try_insert(bucket, slot, tentative) {
            self.stats.record_cas_retry();
            return Claim::Retry { published: false };
        }
        // 占位写入必须先于复查中的任何读取
        fence(Ordering::SeqCst);

        let backoff = Backoff::new();
        loop {
            match self.scan_conflict(handle, hk, key, (bucket, slot)) {
                Conflict::None => {
                    let committed = self.buckets.try_publish(bucket, slot, tentative);
                    debug_assert!(committed, "tentative slot modified by another thread");
                    return if committed {
                        Claim::Committed
                    } else {
                        Claim::Retry { published: true }
                    };
                }
                Conflict::Committed(found) => {
                    self.withdraw(bucket, slot, tentative);
                    return Claim::Duplicate(found);
                }
                Conflict::Tentative(other) if other < id => {
                    self.withdraw(bucket, slot, tentative);
                    self.stats.record_cas_retry();
                    return Claim::Retry { published: true };
                }
                Conflict::Tentative(_) => backoff.snooze(),
            }
        }
    }

    fn withdraw(&self, bucket: usize, slot: usize, tentative: SlotEntry) {
        let withdrawn = self.buckets.try_erase(bucket, slot, tentative);
        debug_assert!(withdrawn, "tentative slot modified by another thread");
    }

    fn upsert(
        &self,
        handle: &ThreadHandle,
        key: &[u8],
        value: &[u8],
        mode: WriteMode,
    ) -> Result<WriteOutcome, CuckooError> {
        self.check_handle(handle);
        let _op = handle.pin();
        let hk = self.hash_key(key);
        let mut pending = PendingRecord {
            id: None,
            published: false,
        };
        let backoff = Backoff::new();

        let outcome = loop {
            match self.probe(handle, &hk, key) {
                Probe::Duplicate(found) if mode == WriteMode::InsertOnly => {
                    handle.unprotect(SCAN_HAZARD);
                    break Ok(WriteOutcome::Duplicate {
                        bucket: found.bucket,
                        slot: found.slot,
                    });
                }
                Probe::Duplicate(found) => {
                    if found.entry.is_moving() {
                        handle.unprotect(SCAN_HAZARD);
                        backoff.snooze();
                        continue;
                    }
                    let id = match pending.get_or_allocate(&self.arena, key, value) {
                        Ok(id) => id,
                        Err(e) => break Err(e),
                    };
                    let replacement = SlotEntry::new(hk.partial, id);
                    if self
                        .buckets
                        .try_update(found.bucket, found.slot, found.entry, replacement)
                    {
                        pending.id = None;
                        handle.unprotect(SCAN_HAZARD);
                        handle.retire(found.id);
                        break Ok(WriteOutcome::Overwritten);
                    }
                    handle.unprotect(SCAN_HAZARD);
                    self.stats.record_cas_retry();
                }
                Probe::Empty { bucket, slot } => {
                    let id = match pending.get_or_allocate(&self.arena, key, value) {
                        Ok(id) => id,
                        Err(e) => break Err(e),
                    };
                    match self.claim(handle, &hk, key, bucket, slot, id) {
                        Claim::Committed => {
                            pending.id = None;
                            self.size.fetch_add(1, Ordering::AcqRel);
                            break Ok(WriteOutcome::Inserted);
                        }
                        Claim::Duplicate(found) => {
                            pending.published = true;
                            if mode == WriteMode::InsertOnly {
                                break Ok(WriteOutcome::Duplicate {
                                    bucket: found.bucket,
                                    slot: found.slot,
                                });
                            }
                        }
                        Claim::Retry { published } => {
                            pending.published |= published;
                            backoff.snooze();
                        }
                    }
                }
                Probe::Full => match self.cuckoo_kick(&hk) {
                    Ok(()) => {}
                    Err(e) => {
                        // 搬迁中的副本可能被未校验的扫描漏掉
                        if self.locate(handle, &hk, key).is_some() {
                            handle.unprotect(SCAN_HAZARD);
                            continue;
                        }
                        break Err(e);
                    }
                },
            }
        };

        if let Some(id) = pending.id {
            if pending.published {
                handle.try_free(id);
            } else {
                // SAFETY: 记录从未对其他线程可见
                unsafe { self.arena.free(id) };
            }
        }
        outcome
    }

    // ---------------------------------------------------------------
    // 公共操作
    // ---------------------------------------------------------------

    /// 插入键值对，键已存在时返回 `Ok(false)` 且不修改原值
    pub fn insert(&self, handle: &ThreadHandle, key: &[u8], value: &[u8]) -> Result<bool, CuckooError> {
        let inserted = matches!(
            self.upsert(handle, key, value, WriteMode::InsertOnly)?,
            WriteOutcome::Inserted
        );
        self.stats.record(OperationType::Insert, inserted);
        Ok(inserted)
    }

    /// 插入键值对，键已存在时返回 `KeyDuplicated`
    pub fn try_insert(&self, handle: &ThreadHandle, key: &[u8], value: &[u8]) -> Result<(), CuckooError> {
        match self.upsert(handle, key, value, WriteMode::InsertOnly)? {
            WriteOutcome::Duplicate { bucket, slot } => {
                self.stats.record(OperationType::Insert, false);
                Err(CuckooError::KeyDuplicated { bucket, slot })
            }
            _ => {
                self.stats.record(OperationType::Insert, true);
                Ok(())
            }
        }
    }

    /// 插入或覆盖
    ///
    /// 返回 `Ok(true)` 表示新插入，`Ok(false)` 表示覆盖了已有值。
    pub fn insert_or_assign(
        &self,
        handle: &ThreadHandle,
        key: &[u8],
        value: &[u8],
    ) -> Result<bool, CuckooError> {
        let fresh = matches!(
            self.upsert(handle, key, value, WriteMode::Assign)?,
            WriteOutcome::Inserted
        );
        self.stats.record(OperationType::InsertOrAssign, !fresh);
        Ok(fresh)
    }

    /// 仅当键存在时覆盖，返回是否发生了覆盖
    pub fn update(&self, handle: &ThreadHandle, key: &[u8], value: &[u8]) -> Result<bool, CuckooError> {
        self.check_handle(handle);
        let _op = handle.pin();
        let hk = self.hash_key(key);
        let mut pending: Option<RecordId> = None;
        let backoff = Backoff::new();

        let outcome = loop {
            let Some(found) = self.locate(handle, &hk, key) else {
                break Ok(false);
            };
            if found.entry.is_moving() {
                handle.unprotect(SCAN_HAZARD);
                backoff.snooze();
                continue;
            }
            let id = match pending {
                Some(id) => id,
                None => match self.arena.allocate(key, value) {
                    Ok(id) => *pending.insert(id),
                    Err(e) => {
                        handle.unprotect(SCAN_HAZARD);
                        break Err(e);
                    }
                },
            };
            let replacement = SlotEntry::new(hk.partial, id);
            let replaced = self
                .buckets
                .try_update(found.bucket, found.slot, found.entry, replacement);
            handle.unprotect(SCAN_HAZARD);
            if replaced {
                pending = None;
                handle.retire(found.id);
                break Ok(true);
            }
            self.stats.record_cas_retry();
        };

        if let Some(id) = pending {
            // SAFETY: 未发布的记录
            unsafe { self.arena.free(id) };
        }
        if let Ok(updated) = outcome {
            self.stats.record(OperationType::Update, updated);
        }
        outcome
    }

    /// 删除键，返回键是否存在
    pub fn erase(&self, handle: &ThreadHandle, key: &[u8]) -> bool {
        self.check_handle(handle);
        let _op = handle.pin();
        let hk = self.hash_key(key);
        let backoff = Backoff::new();

        let erased = loop {
            let Some(found) = self.locate(handle, &hk, key) else {
                break false;
            };
            if found.entry.is_moving() {
                handle.unprotect(SCAN_HAZARD);
                backoff.snooze();
                continue;
            }
            let removed = self.buckets.try_erase(found.bucket, found.slot, found.entry);
            handle.unprotect(SCAN_HAZARD);
            if removed {
                self.size.fetch_sub(1, Ordering::AcqRel);
                handle.retire(found.id);
                break true;
            }
            self.stats.record_cas_retry();
        };

        self.stats.record(OperationType::Erase, erased);
        erased
    }

    /// 查找并在受保护期间对值调用 `f`
    pub fn find_with<R>(
        &self,
        handle: &ThreadHandle,
        key: &[u8],
        f: impl FnOnce(&[u8]) -> R,
    ) -> Option<R> {
        self.check_handle(handle);
        let _op = handle.pin();
        let hk = self.hash_key(key);

        let result = self.locate(handle, &hk, key).and_then(|found| {
            // SAFETY: locate 返回时记录仍受保护，直到下面的 unprotect
            let record = unsafe { self.arena.get(found.id) }?;
            debug_assert!(record.is_live(), "protected record {} was freed", found.id);
            Some(f(record.value()))
        });
        handle.unprotect(SCAN_HAZARD);

        self.stats.record(OperationType::Find, result.is_some());
        result
    }

    /// 查找并复制值
    pub fn find(&self, handle: &ThreadHandle, key: &[u8]) -> Option<Vec<u8>> {
        self.find_with(handle, key, <[u8]>::to_vec)
    }

    pub fn contains(&self, handle: &ThreadHandle, key: &[u8]) -> bool {
        self.find_with(handle, key, |_| ()).is_some()
    }

    /// 键当前所在的 (桶, 槽位)
    pub fn position(&self, handle: &ThreadHandle, key: &[u8]) -> Option<(usize, usize)> {
        self.check_handle(handle);
        let _op = handle.pin();
        let hk = self.hash_key(key);
        let located = self.locate(handle, &hk, key);
        handle.unprotect(SCAN_HAZARD);
        located.map(|found| (found.bucket, found.slot))
    }

    /// 强制执行一轮内存回收
    pub fn collect(&self, handle: &ThreadHandle) {
        self.check_handle(handle);
        handle.collect();
    }

    // ---------------------------------------------------------------
    // 容量与统计
    // ---------------------------------------------------------------

    /// 当前条目数
    pub fn size(&self) -> usize {
        self.size.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn hashpower(&self) -> u32 {
        self.buckets.hashpower()
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.bucket_count()
    }

    pub fn slots_per_bucket(&self) -> usize {
        self.buckets.slots_per_bucket()
    }

    /// 总槽位数
    pub fn capacity(&self) -> usize {
        self.buckets.capacity()
    }

    pub fn load_factor(&self) -> f32 {
        self.size() as f32 / self.capacity() as f32
    }

    pub fn stats(&self) -> CuckooMapStats {
        CuckooMapStats {
            size: self.size(),
            capacity: self.capacity(),
            load_factor: self.load_factor(),
            hashpower: self.hashpower(),
            bucket_count: self.bucket_count(),
            slots_per_bucket: self.slots_per_bucket(),
            operations: self.stats.snapshot(),
            reclaim: self.reclaimer.stats(),
            memory: self.arena.stats(),
        }
    }

    pub(crate) fn table_full_error(&self) -> CuckooError {
        CuckooError::TableFull {
            capacity: self.capacity(),
            size: self.size(),
            load_factor: self.load_factor(),
        }
    }
}

impl fmt::Debug for CuckooMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CuckooMap")
            .field("size", &self.size())
            .field("hashpower", &self.hashpower())
            .field("slots_per_bucket", &self.slots_per_bucket())
            .field("hash", &self.hasher.algorithm())
            .field("reclaim", &self.reclaimer.strategy())
            .finish()
    }
}
