//! MurmurHash64A - 与原始基准数据集保持一致的键哈希

/// 默认种子
pub const MURMUR_SEED: u64 = 7079;

const M: u64 = 0xc6a4a7935bd1e995;
const R: u32 = 47;

/// 按小端序读取8字节块计算 MurmurHash64A
pub fn murmur_hash64a(key: &[u8], seed: u64) -> u64 {
    let mut h = seed ^ (key.len() as u64).wrapping_mul(M);

    let mut chunks = key.chunks_exact(8);
    for chunk in &mut chunks {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(chunk);
        let mut k = u64::from_le_bytes(buf);

        k = k.wrapping_mul(M);
        k ^= k >> R;
        k = k.wrapping_mul(M);

        h ^= k;
        h = h.wrapping_mul(M);
    }

    let tail = chunks.remainder();
    if !tail.is_empty() {
        for (i, &byte) in tail.iter().enumerate() {
            h ^= (byte as u64) << (8 * i);
        }
        h = h.wrapping_mul(M);
    }

    h ^= h >> R;
    h = h.wrapping_mul(M);
    h ^= h >> R;
    h
}
