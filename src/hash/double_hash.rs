//! 双桶定位 - 主桶与备用桶计算
//!
//! 备用桶由当前桶与指纹异或得到，是一个对合：对备用桶再求备用桶会回到原桶，
//! 踢出时只需条目所在桶号和指纹即可找到它的另一个候选桶。

use crate::types::Fingerprint;

/// 备用桶乘数（MurmurHash64A 常量）
pub const ALT_INDEX_MULTIPLIER: u64 = 0xc6a4a7935bd1e995;

#[inline]
pub const fn hashsize(hashpower: u32) -> usize {
    1usize << hashpower
}

#[inline]
pub const fn hashmask(hashpower: u32) -> usize {
    hashsize(hashpower) - 1
}

/// 64位哈希折叠出的部分键
#[inline]
pub const fn partial_key(hash: u64) -> Fingerprint {
    Fingerprint::from_hash(hash)
}

/// 主桶索引
#[inline]
pub fn index_hash(hashpower: u32, hash: u64) -> usize {
    (hash as usize) & hashmask(hashpower)
}

/// 备用桶索引
#[inline]
pub fn alt_index(hashpower: u32, partial: Fingerprint, index: usize) -> usize {
    // 指纹加一保证乘数非零
    let nonzero_tag = partial.as_u8() as u64 + 1;
    ((index as u64 ^ nonzero_tag.wrapping_mul(ALT_INDEX_MULTIPLIER)) as usize) & hashmask(hashpower)
}

/// 一次哈希计算得到的全部定位信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashedKey {
    pub hash: u64,
    pub partial: Fingerprint,
    pub primary: usize,
    pub secondary: usize,
}

impl HashedKey {
    pub fn new(hash: u64, hashpower: u32) -> Self {
        let partial = partial_key(hash);
        let primary = index_hash(hashpower, hash);
        let secondary = alt_index(hashpower, partial, primary);
        Self {
            hash,
            partial,
            primary,
            secondary,
        }
    }

    /// 两个候选桶；二者相同时只需扫描一次
    #[inline]
    pub fn buckets(&self) -> ([usize; 2], usize) {
        if self.primary == self.secondary {
            ([self.primary, self.primary], 1)
        } else {
            ([self.primary, self.secondary], 2)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alt_index_is_involution() {
        let hp = 10;
        for tag in 0..=255u8 {
            let partial = Fingerprint::new(tag);
            for index in [0usize, 1, 17, 511, 1023] {
                let alt = alt_index(hp, partial, index);
                assert!(alt < hashsize(hp));
                assert_eq!(alt_index(hp, partial, alt), index);
            }
        }
    }

    #[test]
    fn test_hashed_key_in_range() {
        let hp = 6;
        for hash in [0u64, 1, 0xdead_beef, u64::MAX] {
            let hk = HashedKey::new(hash, hp);
            assert!(hk.primary < hashsize(hp));
            assert!(hk.secondary < hashsize(hp));
            assert_eq!(hk.partial, Fingerprint::from_hash(hash));
            assert_eq!(alt_index(hp, hk.partial, hk.secondary), hk.primary);
        }
    }

    #[test]
    fn test_single_bucket_table() {
        let hk = HashedKey::new(12345, 0);
        assert_eq!(hk.primary, 0);
        assert_eq!(hk.secondary, 0);
        assert_eq!(hk.buckets().1, 1);
    }

    #[test]
    fn test_mask() {
        assert_eq!(hashsize(4), 16);
        assert_eq!(hashmask(4), 15);
        assert_eq!(index_hash(4, 0x1234), 0x4);
    }
}
