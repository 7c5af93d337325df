//! 哈希表核心模块 - 实现Cuckoo哈希表及其组件

pub mod bucket;
pub mod cuckoo_map;
mod kick;

pub use bucket::{Bucket, BucketContainer};
pub use cuckoo_map::{CuckooMap, CuckooMapConfig, CuckooMapStats};
pub use kick::MAX_BFS_NODES;

use once_cell::sync::Lazy;

/// 全局默认配置
pub static DEFAULT_CONFIG: Lazy<CuckooMapConfig> = Lazy::new(CuckooMapConfig::default);

// 预定义的桶大小常量
pub const DEFAULT_BUCKET_SIZE: usize = 4;
pub const MAX_BUCKET_SIZE: usize = 8;
