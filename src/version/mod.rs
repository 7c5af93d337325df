//! 版本控制模块 - 桶级搬迁版本号

pub mod lock;

pub use lock::{VersionGuard, VersionLock};
