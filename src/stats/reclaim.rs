//! 回收统计

use crate::types::ReclaimStrategy;

/// 回收器统计快照
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReclaimStats {
    pub strategy: ReclaimStrategy,
    /// 交给回收器的记录总数
    pub retired: u64,
    /// 已物理释放的记录总数
    pub freed: u64,
    /// 已退役但尚未释放
    pub pending: u64,
    /// 扫描/回收轮次
    pub scans: u64,
    pub registered_threads: usize,
    /// 全局纪元（仅纪元策略）
    pub epoch: Option<u64>,
}

impl ReclaimStats {
    /// 已退役记录中被释放的比例
    pub fn reclaim_ratio(&self) -> f64 {
        if self.retired == 0 {
            1.0
        } else {
            self.freed as f64 / self.retired as f64
        }
    }
}
