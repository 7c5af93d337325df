//! 统计模块 - 哈希表操作与内存回收指标

pub mod operation;
pub mod reclaim;

pub use operation::{OperationStats, OperationStatsSnapshot};
pub use reclaim::ReclaimStats;
