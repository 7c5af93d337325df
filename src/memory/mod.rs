//! 内存管理模块 - 键值记录的分配与复用

pub mod arena;
pub mod record;

pub use arena::{ArenaStats, RecordArena, SEGMENT_BASE};
pub use record::{Record, POISON_BYTE};
