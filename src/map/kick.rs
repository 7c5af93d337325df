//! 踢出路径搜索与条目搬迁
//!
//! 两个候选桶都满时，从这两个桶出发做有界BFS，寻找一条以空槽位结尾的
//! 搬迁链，然后从链尾开始逐跳搬迁。每一跳在两个桶的版本锁下执行：
//! 先把源条目标记为 MOVING，复制到目标空槽位，再清空源槽位，最后去掉目标标记。
//! 任意时刻至少有一个可见副本，读者通过版本校验发现搬迁并重扫。

use super::cuckoo_map::CuckooMap;
use crate::{
    error::CuckooError,
    hash::{alt_index, HashedKey},
    types::SlotEntry,
};
use rand::Rng;

/// BFS 访问节点上限
pub const MAX_BFS_NODES: usize = 512;

#[derive(Debug, Clone, Copy)]
struct KickNode {
    bucket: usize,
    parent: Option<usize>,
    /// 父桶中被踢到本桶的条目
    slot: usize,
    entry: SlotEntry,
    depth: usize,
}

/// 一次搬迁：把 `from` 中的 `expected` 移到 `to` 的空槽位
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct KickHop {
    pub(crate) from_bucket: usize,
    pub(crate) from_slot: usize,
    pub(crate) expected: SlotEntry,
    pub(crate) to_bucket: usize,
    pub(crate) to_slot: usize,
}

impl CuckooMap {
    /// 为 `hk` 的候选桶腾出一个空槽位
    ///
    /// 返回 `Ok(())` 时调用方应重新探测；搬迁中途被并发修改打断也返回 `Ok(())`。
    /// 找不到任何路径时返回 `TableFull`。
    pub(crate) fn cuckoo_kick(&self, hk: &HashedKey) -> Result<(), CuckooError> {
        let Some(path) = self.find_kick_path(hk) else {
            self.stats.record_table_full();
            crate::log_warn!(
                "No cuckoo path for buckets {}/{} within depth {}, size={}",
                hk.primary,
                hk.secondary,
                self.config().max_kick_depth,
                self.size()
            );
            return Err(self.table_full_error());
        };

        // 候选桶已出现空位
        if path.is_empty() {
            return Ok(());
        }

        for hop in &path {
            if !self.move_entry(hop) {
                self.stats.record_kick_abort();
                crate::log_debug!(
                    "Kick aborted at bucket {} slot {}",
                    hop.from_bucket,
                    hop.from_slot
                );
                return Ok(());
            }
        }

        self.stats.record_kick_path(path.len());
        crate::log_debug!("Kick path of {} hops completed", path.len());
        Ok(())
    }

    /// BFS 搜索，路径按执行顺序排列（最深的一跳在前）
    pub(crate) fn find_kick_path(&self, hk: &HashedKey) -> Option<Vec<KickHop>> {
        let hashpower = self.buckets.hashpower();
        let slots = self.buckets.slots_per_bucket();
        let max_depth = self.config().max_kick_depth;
        let mut rng = rand::thread_rng();

        let (roots, n) = hk.buckets();
        let mut nodes: Vec<KickNode> = roots[..n]
            .iter()
            .map(|&bucket| KickNode {
                bucket,
                parent: None,
                slot: 0,
                entry: SlotEntry::EMPTY,
                depth: 0,
            })
            .collect();

        let mut head = 0;
        while head < nodes.len() {
            let node = nodes[head];
            let bucket = self.buckets.bucket(node.bucket);

            if let Some(empty) = bucket.find_empty_slot() {
                return Some(build_path(&nodes, head, empty));
            }

            if node.depth < max_depth {
                let offset = rng.gen_range(0..slots);
                for i in 0..slots {
                    if nodes.len() >= MAX_BFS_NODES {
                        break;
                    }
                    let slot = (offset + i) % slots;
                    let entry = self.buckets.read(node.bucket, slot);
                    if !entry.is_visible() || entry.is_moving() {
                        continue;
                    }
                    let alt = alt_index(hashpower, entry.tag(), node.bucket);
                    if alt == node.bucket {
                        continue;
                    }
                    nodes.push(KickNode {
                        bucket: alt,
                        parent: Some(head),
                        slot,
                        entry,
                        depth: node.depth + 1,
                    });
                }
            }
            head += 1;
        }
        None
    }

    /// 在两个桶的版本锁下搬迁一个条目，失败时源槽位保持原样
    pub(crate) fn move_entry(&self, hop: &KickHop) -> bool {
        let (low, high) = if hop.from_bucket <= hop.to_bucket {
            (hop.from_bucket, hop.to_bucket)
        } else {
            (hop.to_bucket, hop.from_bucket)
        };
        let _first = self.buckets.bucket(low).version().lock();
        let _second = (high != low).then(|| self.buckets.bucket(high).version().lock());

        if self.buckets.read(hop.from_bucket, hop.from_slot) != hop.expected
            || !self.buckets.read(hop.to_bucket, hop.to_slot).is_empty()
        {
            return false;
        }

        let Some(moving) = self
            .buckets
            .try_mark(hop.from_bucket, hop.from_slot, hop.expected)
        else {
            return false;
        };

        if !self.buckets.try_insert(hop.to_bucket, hop.to_slot, moving) {
            // 目标槽位被并发插入占用
            let restored = self
                .buckets
                .try_update(hop.from_bucket, hop.from_slot, moving, hop.expected);
            debug_assert!(restored, "moving entry modified by another thread");
            return false;
        }

        let erased = self.buckets.try_erase(hop.from_bucket, hop.from_slot, moving);
        debug_assert!(erased, "moving entry modified by another thread");
        let settled = self.buckets.try_publish(hop.to_bucket, hop.to_slot, moving);
        debug_assert!(settled, "moving entry modified by another thread");
        true
    }
}

fn build_path(nodes: &[KickNode], leaf: usize, empty_slot: usize) -> Vec<KickHop> {
    let mut path = Vec::with_capacity(nodes[leaf].depth);
    let mut current = leaf;
    let mut to_slot = empty_slot;

    while let Some(parent) = nodes[current].parent {
        let node = &nodes[current];
        path.push(KickHop {
            from_bucket: nodes[parent].bucket,
            from_slot: node.slot,
            expected: node.entry,
            to_bucket: node.bucket,
            to_slot,
        });
        to_slot = node.slot;
        current = parent;
    }
    path
}
