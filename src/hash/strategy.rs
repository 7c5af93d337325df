//! 哈希算法选择 - 键字节到64位哈希值

use crate::hash::murmur::{murmur_hash64a, MURMUR_SEED};
use ahash::RandomState;
use std::{
    fmt,
    hash::{BuildHasher, Hasher},
    sync::Arc,
};

/// 哈希算法选择
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HashAlgorithm {
    #[default]
    XxHash,
    AHash,
    /// MurmurHash64A，种子 7079
    Murmur2,
}

impl HashAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::XxHash => "xxhash64",
            HashAlgorithm::AHash => "ahash",
            HashAlgorithm::Murmur2 => "murmur64a",
        }
    }
}

/// 哈希函数特征
pub trait HasherFunction: Send + Sync {
    fn hash_bytes(&self, data: &[u8]) -> u64;
}

impl<T> HasherFunction for T
where
    T: Fn(&[u8]) -> u64 + Send + Sync,
{
    fn hash_bytes(&self, data: &[u8]) -> u64 {
        self(data)
    }
}

/// 键哈希器
///
/// 同一张表在整个生命周期内必须使用同一个哈希器，种子固定，结果可复现。
#[derive(Clone)]
pub struct KeyHasher {
    algorithm: HashAlgorithm,
    function: Arc<dyn HasherFunction>,
}

impl KeyHasher {
    /// 默认种子
    pub const DEFAULT_SEED: u64 = 42;

    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self {
            algorithm,
            function: Self::build_hasher_function(algorithm, Self::DEFAULT_SEED),
        }
    }

    /// 使用自定义哈希函数（测试中用于构造可控的桶分布）
    pub fn with_function<F>(algorithm: HashAlgorithm, function: F) -> Self
    where
        F: Fn(&[u8]) -> u64 + Send + Sync + 'static,
    {
        Self {
            algorithm,
            function: Arc::new(function),
        }
    }

    fn build_hasher_function(algorithm: HashAlgorithm, seed: u64) -> Arc<dyn HasherFunction> {
        match algorithm {
            HashAlgorithm::AHash => {
                let state = RandomState::with_seed(seed as usize);
                Arc::new(move |data: &[u8]| {
                    let mut hasher = state.build_hasher();
                    hasher.write(data);
                    hasher.finish()
                })
            }
            HashAlgorithm::XxHash => Arc::new(move |data: &[u8]| {
                let mut hasher = twox_hash::XxHash64::with_seed(seed);
                hasher.write(data);
                hasher.finish()
            }),
            HashAlgorithm::Murmur2 => Arc::new(|data: &[u8]| murmur_hash64a(data, MURMUR_SEED)),
        }
    }

    #[inline]
    pub fn hash(&self, key: &[u8]) -> u64 {
        self.function.hash_bytes(key)
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }
}

impl Default for KeyHasher {
    fn default() -> Self {
        Self::new(HashAlgorithm::default())
    }
}

impl fmt::Debug for KeyHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyHasher")
            .field("algorithm", &self.algorithm)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check_algorithm(algorithm: HashAlgorithm) {
        let hasher = KeyHasher::new(algorithm);
        let a = hasher.hash(b"test_key");
        assert_eq!(a, hasher.hash(b"test_key"), "同一键的哈希必须稳定");
        assert_ne!(a, hasher.hash(b"test_kez"));
        assert_eq!(hasher.algorithm(), algorithm);
    }

    #[test]
    fn test_ahash() {
        check_algorithm(HashAlgorithm::AHash);
    }

    #[test]
    fn test_xxhash() {
        check_algorithm(HashAlgorithm::XxHash);
    }

    #[test]
    fn test_murmur() {
        check_algorithm(HashAlgorithm::Murmur2);
        let hasher = KeyHasher::new(HashAlgorithm::Murmur2);
        assert_eq!(hasher.hash(b"abc"), murmur_hash64a(b"abc", MURMUR_SEED));
    }

    #[test]
    fn test_cloned_hasher_agrees() {
        let hasher = KeyHasher::new(HashAlgorithm::AHash);
        let cloned = hasher.clone();
        assert_eq!(hasher.hash(b"k"), cloned.hash(b"k"));
    }

    #[test]
    fn test_custom_function() {
        let hasher = KeyHasher::with_function(HashAlgorithm::XxHash, |data: &[u8]| data.len() as u64);
        assert_eq!(hasher.hash(b"four"), 4);
    }
}
