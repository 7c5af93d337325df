//! Rust并发Cuckoo哈希表库
//!
//! 双桶候选（two-choice）Cuckoo哈希表，读操作无锁，写操作仅依赖单槽位CAS，
//! 配合可插拔的安全内存回收（SMR）层：危险指针、DEBRA风格纪元回收、全局表扫描。
//!
//! ## 主要特性
//! - 槽位为单个64位原子字：8位部分哈希 + 记录索引
//! - 键值记录存放在分段slab中，通过索引引用
//! - 桶满时执行有界BFS踢出路径搜索
//! - 每个线程通过显式 `ThreadHandle` 参与回收协议
//!
//! ## 快速开始
//!
//! ```rust
//! use cuckoo_hashtable::{CuckooMap, CuckooMapConfig};
//!
//! let map = CuckooMap::new(CuckooMapConfig::default()).expect("配置无效");
//! let handle = map.register_thread().expect("线程槽位耗尽");
//!
//! // 插入键值对
//! assert!(map.insert(&handle, b"key1", b"value1").unwrap());
//!
//! // 获取值
//! assert_eq!(map.find(&handle, b"key1"), Some(b"value1".to_vec()));
//!
//! // 覆盖写：返回 false 表示覆盖了已有值
//! assert!(!map.insert_or_assign(&handle, b"key1", b"value2").unwrap());
//!
//! // 删除键
//! assert!(map.erase(&handle, b"key1"));
//! assert_eq!(map.size(), 0);
//! ```

#![warn(clippy::all)]

#[cfg(feature = "logging")]
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        log::debug!($($arg)*)
    };
}

#[cfg(feature = "logging")]
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        log::info!($($arg)*)
    };
}

#[cfg(feature = "logging")]
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        log::warn!($($arg)*)
    };
}

#[cfg(feature = "logging")]
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        log::error!($($arg)*)
    };
}

#[cfg(not(feature = "logging"))]
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "logging"))]
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "logging"))]
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "logging"))]
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {};
}

// 核心模块导出
pub mod error;
pub mod types;
pub mod hash;
pub mod map;
pub mod memory;
pub mod reclaim;
pub mod stats;
pub mod version;

// 公共接口导出
pub use crate::{
    error::CuckooError,
    hash::{HashAlgorithm, HashedKey, KeyHasher},
    map::{
        Bucket, BucketContainer, CuckooMap, CuckooMapConfig, CuckooMapStats, DEFAULT_BUCKET_SIZE,
        DEFAULT_CONFIG, MAX_BUCKET_SIZE,
    },
    memory::{ArenaStats, Record, RecordArena, POISON_BYTE},
    reclaim::{
        EpochReclaimer, HazardPointerReclaimer, ReclaimStats, Reclaimer, TableScanReclaimer,
        ThreadHandle,
    },
    stats::{OperationStats, OperationStatsSnapshot},
    types::{Fingerprint, OperationType, ReclaimStrategy, RecordId, SlotEntry},
    version::{VersionGuard, VersionLock},
};

/// 批量插入，返回成功插入（非重复）的条目数
///
/// 遇到表满或分配失败时立即返回错误。
pub fn batch_insert<'a>(
    map: &CuckooMap,
    handle: &ThreadHandle,
    items: impl IntoIterator<Item = (&'a [u8], &'a [u8])>,
) -> Result<usize, CuckooError> {
    let mut count = 0;
    for (key, value) in items {
        if map.insert(handle, key, value)? {
            count += 1;
        }
    }
    Ok(count)
}

/// 批量查询
pub fn batch_find<'a>(
    map: &CuckooMap,
    handle: &ThreadHandle,
    keys: impl IntoIterator<Item = &'a [u8]>,
) -> Vec<Option<Vec<u8>>> {
    keys.into_iter().map(|k| map.find(handle, k)).collect()
}
