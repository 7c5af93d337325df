//! 哈希模块 - 统一管理哈希相关功能

pub mod double_hash;
pub mod murmur;
pub mod strategy;

pub use double_hash::{
    alt_index, hashmask, hashsize, index_hash, partial_key, HashedKey, ALT_INDEX_MULTIPLIER,
};
pub use murmur::{murmur_hash64a, MURMUR_SEED};
pub use strategy::{HashAlgorithm, HasherFunction, KeyHasher};
