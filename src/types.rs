//! 核心类型定义 - 共享类型和接口

use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

/// 指纹类型 - 8位部分哈希
///
/// 与记录索引一起打包在槽位字的最高字节中，扫描时先比较指纹再比较完整键。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct Fingerprint(u8);

impl Fingerprint {
    /// 创建新指纹
    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    /// 从64位哈希折叠出8位指纹
    pub const fn from_hash(hash: u64) -> Self {
        let h = (hash as u32) ^ ((hash >> 32) as u32);
        let h = (h as u16) ^ ((h >> 16) as u16);
        Self((h as u8) ^ ((h >> 8) as u8))
    }

    /// 获取指纹值
    pub const fn as_u8(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}", self.0)
    }
}

/// 记录在 `RecordArena` 中的索引
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(pub usize);

impl RecordId {
    /// 可编码进槽位字的最大索引
    pub const MAX: usize = (SlotEntry::INDEX_MASK - 1) as usize;

    pub const fn index(self) -> usize {
        self.0
    }

    /// 槽位字与公告单元中使用的编码（索引 + 1，0 保留为空）
    pub const fn encode(self) -> u64 {
        self.0 as u64 + 1
    }

    /// 从编码值还原，0 表示无记录
    pub const fn decode(raw: u64) -> Option<Self> {
        if raw == 0 {
            None
        } else {
            Some(Self((raw - 1) as usize))
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 解码后的槽位字
///
/// 布局：
/// - 位 0..=47：记录索引 + 1（0 为空槽位）
/// - 位 48：TENTATIVE，插入已占位但尚未提交，查找/删除/更新均不可见
/// - 位 49：MOVING，条目正被踢出路径搬迁，可读但写者必须重试
/// - 位 56..=63：8位指纹
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct SlotEntry(u64);

impl SlotEntry {
    pub const INDEX_MASK: u64 = (1 << 48) - 1;
    pub const TENTATIVE: u64 = 1 << 48;
    pub const MOVING: u64 = 1 << 49;
    const FLAG_MASK: u64 = Self::TENTATIVE | Self::MOVING;
    const TAG_SHIFT: u32 = 56;

    /// 空槽位哨兵
    pub const EMPTY: Self = Self(0);

    /// 创建已提交条目
    pub const fn new(tag: Fingerprint, id: RecordId) -> Self {
        Self(((tag.0 as u64) << Self::TAG_SHIFT) | (id.encode() & Self::INDEX_MASK))
    }

    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 & Self::INDEX_MASK == 0
    }

    pub const fn tag(self) -> Fingerprint {
        Fingerprint((self.0 >> Self::TAG_SHIFT) as u8)
    }

    pub const fn record_id(self) -> Option<RecordId> {
        RecordId::decode(self.0 & Self::INDEX_MASK)
    }

    pub const fn is_tentative(self) -> bool {
        self.0 & Self::TENTATIVE != 0
    }

    pub const fn is_moving(self) -> bool {
        self.0 & Self::MOVING != 0
    }

    /// 非空且已提交（可能正在搬迁）
    pub const fn is_visible(self) -> bool {
        !self.is_empty() && !self.is_tentative()
    }

    pub const fn with_tentative(self) -> Self {
        Self(self.0 | Self::TENTATIVE)
    }

    pub const fn with_moving(self) -> Self {
        Self(self.0 | Self::MOVING)
    }

    /// 去除全部状态位
    pub const fn committed(self) -> Self {
        Self(self.0 & !Self::FLAG_MASK)
    }
}

impl fmt::Debug for SlotEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.record_id() {
            None => write!(f, "SlotEntry(empty)"),
            Some(id) => {
                write!(f, "SlotEntry({} tag={}", id, self.tag())?;
                if self.is_tentative() {
                    write!(f, " tentative")?;
                }
                if self.is_moving() {
                    write!(f, " moving")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// 原子槽位字
#[repr(transparent)]
#[derive(Debug, Default)]
pub struct AtomicSlotEntry(AtomicU64);

impl AtomicSlotEntry {
    pub const fn empty() -> Self {
        Self(AtomicU64::new(0))
    }

    #[inline]
    pub fn load(&self, order: Ordering) -> SlotEntry {
        SlotEntry(self.0.load(order))
    }

    #[inline]
    pub fn store(&self, entry: SlotEntry, order: Ordering) {
        self.0.store(entry.0, order)
    }

    /// 比较并交换，失败时返回当前值
    #[inline]
    pub fn compare_exchange(&self, current: SlotEntry, new: SlotEntry) -> Result<(), SlotEntry> {
        self.0
            .compare_exchange(current.0, new.0, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(SlotEntry)
    }

    /// 底层原子字，供回收层的 `protect_load` 使用
    #[inline]
    pub fn as_atomic(&self) -> &AtomicU64 {
        &self.0
    }
}

/// 操作类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationType {
    Find,
    Insert,
    InsertOrAssign,
    Update,
    Erase,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Find => "find",
            OperationType::Insert => "insert",
            OperationType::InsertOrAssign => "insert_or_assign",
            OperationType::Update => "update",
            OperationType::Erase => "erase",
        }
    }

    /// 是否为只读操作
    pub fn is_read(&self) -> bool {
        matches!(self, OperationType::Find)
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 安全内存回收策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReclaimStrategy {
    /// 每线程危险指针公告 + 退役列表扫描
    #[default]
    HazardPointer,
    /// DEBRA风格纪元回收（三个limbo包轮转）
    Epoch,
    /// 每线程单一公告单元，释放前扫描全表
    TableScan,
}

impl ReclaimStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReclaimStrategy::HazardPointer => "hazard_pointer",
            ReclaimStrategy::Epoch => "epoch",
            ReclaimStrategy::TableScan => "table_scan",
        }
    }
}

impl fmt::Display for ReclaimStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
