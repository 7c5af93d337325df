//! 统一错误处理 - 所有可能错误类型和恢复逻辑

/// Cuckoo哈希表可能发生的错误
///
/// CAS竞争失败不属于错误，由引擎内部透明重试。
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CuckooError {
    #[error("键已存在 (桶: {bucket}, 槽位: {slot})")]
    KeyDuplicated {
        bucket: usize,
        slot: usize,
    },

    #[error("键不存在")]
    KeyNotFound,

    #[error("表已满，无法插入新条目 (容量: {capacity}, 当前大小: {size}, 负载因子: {load_factor:.2})")]
    TableFull {
        capacity: usize,
        size: usize,
        load_factor: f32,
    },

    #[error("内存分配失败 (大小: {size})")]
    AllocationFailed {
        size: usize,
    },

    #[error("无效配置: {reason}")]
    InvalidConfig {
        reason: String,
    },

    #[error("注册线程数已达上限 ({max_threads})")]
    ThreadLimitReached {
        max_threads: usize,
    },
}

impl CuckooError {
    /// 获取错误恢复建议
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            Self::KeyDuplicated { .. } => Some("检查是否需要覆盖写 (insert_or_assign)"),
            Self::KeyNotFound => Some("确认键值是否存在"),
            Self::TableFull { .. } => Some("以更大的初始容量重建表或增加最大踢出深度"),
            Self::AllocationFailed { .. } => Some("检查系统内存或记录数上限"),
            Self::InvalidConfig { .. } => Some("检查配置参数"),
            Self::ThreadLimitReached { .. } => Some("释放空闲线程句柄或增大 max_threads"),
        }
    }

    /// 判断错误是否可恢复
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::AllocationFailed { .. } | Self::InvalidConfig { .. })
    }

    /// 是否为预期内的查找结果而非故障
    pub fn is_expected_outcome(&self) -> bool {
        matches!(self, Self::KeyDuplicated { .. } | Self::KeyNotFound)
    }

    /// 是否需要扩容才能继续写入
    pub fn needs_resize(&self) -> bool {
        matches!(self, Self::TableFull { .. })
    }
}
