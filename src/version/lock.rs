//! 搬迁版本锁 - 每桶一个序列锁
//!
//! 版本号为奇数表示有踢出操作正在搬迁该桶中的条目。
//! 读者在扫描前记录快照，扫描未命中时校验快照，失败则重新扫描，
//! 从而不会把正在搬迁的条目误报为不存在。

use crossbeam::utils::Backoff;
use std::{
    fmt,
    sync::atomic::{fence, AtomicU64, Ordering},
};

#[derive(Default)]
pub struct VersionLock {
    version: AtomicU64,
}

impl VersionLock {
    pub const fn new() -> Self {
        Self {
            version: AtomicU64::new(0),
        }
    }

    /// 读取版本快照（可能为奇数，此时随后的校验必然失败）
    #[inline]
    pub fn read_snapshot(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// 自快照以来没有搬迁发生或正在发生
    #[inline]
    pub fn validate(&self, snapshot: u64) -> bool {
        fence(Ordering::Acquire);
        snapshot & 1 == 0 && self.version.load(Ordering::Acquire) == snapshot
    }

    #[inline]
    pub fn is_locked(&self) -> bool {
        self.read_snapshot() & 1 == 1
    }

    pub fn version(&self) -> u64 {
        self.read_snapshot()
    }

    pub fn try_lock(&self) -> Option<VersionGuard<'_>> {
        let current = self.version.load(Ordering::Relaxed);
        if current & 1 == 1 {
            return None;
        }
        self.version
            .compare_exchange(current, current + 1, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| VersionGuard { lock: self })
    }

    /// 自旋直到获得锁
    pub fn lock(&self) -> VersionGuard<'_> {
        let backoff = Backoff::new();
        loop {
            if let Some(guard) = self.try_lock() {
                return guard;
            }
            backoff.snooze();
        }
    }
}

impl fmt::Debug for VersionLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VersionLock({})", self.read_snapshot())
    }
}

/// 持有期间版本号为奇数，析构时递增为新的偶数
pub struct VersionGuard<'a> {
    lock: &'a VersionLock,
}

impl VersionGuard<'_> {
    /// 加锁后的版本号
    pub fn version(&self) -> u64 {
        self.lock.read_snapshot()
    }
}

impl Drop for VersionGuard<'_> {
    fn drop(&mut self) {
        self.lock.version.fetch_add(1, Ordering::Release);
    }
}
