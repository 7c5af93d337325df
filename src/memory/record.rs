//! 键值记录 - 发布后不可变的连续载荷

use crate::error::CuckooError;
use std::{
    fmt,
    sync::atomic::{AtomicBool, Ordering},
};

/// 记录释放后填充的毒化字节
pub const POISON_BYTE: u8 = 0xDE;

/// 键值记录
///
/// 头部保存键、值长度，键字节与值字节连续存放在同一块分配中。
/// 记录发布后不再原地修改，更新总是发布新记录并退役旧记录。
pub struct Record {
    key_len: usize,
    value_len: usize,
    live: AtomicBool,
    bytes: Box<[u8]>,
}

impl Record {
    /// 创建记录，缓冲区分配失败时返回 `AllocationFailed`
    pub fn new(key: &[u8], value: &[u8]) -> Result<Self, CuckooError> {
        let size = key.len() + value.len();
        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(size)
            .map_err(|_| CuckooError::AllocationFailed { size })?;
        bytes.extend_from_slice(key);
        bytes.extend_from_slice(value);

        Ok(Self {
            key_len: key.len(),
            value_len: value.len(),
            live: AtomicBool::new(true),
            bytes: bytes.into_boxed_slice(),
        })
    }

    #[inline]
    pub fn key(&self) -> &[u8] {
        &self.bytes[..self.key_len]
    }

    #[inline]
    pub fn value(&self) -> &[u8] {
        &self.bytes[self.key_len..]
    }

    pub fn key_len(&self) -> usize {
        self.key_len
    }

    pub fn value_len(&self) -> usize {
        self.value_len
    }

    /// 完整键比较
    #[inline]
    pub fn matches(&self, key: &[u8]) -> bool {
        self.key() == key
    }

    /// 记录是否仍未被释放
    #[inline]
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    /// 载荷字节数
    pub fn footprint(&self) -> usize {
        self.bytes.len()
    }

    /// 已释放且载荷全部为毒化字节
    pub fn is_poisoned(&self) -> bool {
        !self.is_live() && self.bytes.iter().all(|&b| b == POISON_BYTE)
    }

    /// 释放时调用：毒化载荷，使任何越过回收协议的读取都能被检测到
    pub(crate) fn poison(&mut self) {
        let was_live = self.live.swap(false, Ordering::AcqRel);
        debug_assert!(was_live, "record freed twice");
        self.bytes.fill(POISON_BYTE);
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("key_len", &self.key_len)
            .field("value_len", &self.value_len)
            .field("live", &self.is_live())
            .finish()
    }
}
