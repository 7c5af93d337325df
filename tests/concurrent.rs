//! 并发正确性测试：同键线性化、计数不变量、无悬垂读取

use cuckoo_hashtable::{CuckooError, CuckooMap, CuckooMapConfig, ReclaimStrategy, POISON_BYTE};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use test_log::test;

const SEED: u64 = 42;
const THREADS: usize = 8;

const STRATEGIES: [ReclaimStrategy; 3] = [
    ReclaimStrategy::HazardPointer,
    ReclaimStrategy::Epoch,
    ReclaimStrategy::TableScan,
];

fn create_map(capacity: usize, strategy: ReclaimStrategy) -> CuckooMap {
    CuckooMap::new(CuckooMapConfig {
        initial_capacity: capacity,
        reclaim_strategy: strategy,
        retire_threshold: 4,
        ..Default::default()
    })
    .unwrap()
}

fn key_of(i: usize) -> Vec<u8> {
    format!("key_{:06}", i).into_bytes()
}

#[test]
fn test_same_key_inserts_have_one_winner() {
    const KEYS: usize = 1_000;

    for strategy in STRATEGIES {
        let map = create_map(4 * KEYS, strategy);
        let winners: Vec<AtomicUsize> = (0..KEYS).map(|_| AtomicUsize::new(0)).collect();
        let wins: Vec<AtomicUsize> = (0..KEYS).map(|_| AtomicUsize::new(0)).collect();

        thread::scope(|s| {
            for t in 0..THREADS {
                let (map, winners, wins) = (&map, &winners, &wins);
                s.spawn(move || {
                    let handle = map.register_thread().unwrap();
                    let value = [t as u8; 8];
                    for i in 0..KEYS {
                        if map.insert(&handle, &key_of(i), &value).unwrap() {
                            wins[i].fetch_add(1, Ordering::Relaxed);
                            winners[i].store(t, Ordering::Relaxed);
                        }
                    }
                });
            }
        });

        let handle = map.register_thread().unwrap();
        for i in 0..KEYS {
            assert_eq!(wins[i].load(Ordering::Relaxed), 1, "[{}] key {}", strategy, i);
            let winner = winners[i].load(Ordering::Relaxed) as u8;
            assert_eq!(map.find(&handle, &key_of(i)), Some(vec![winner; 8]));
        }
        assert_eq!(map.size(), KEYS, "[{}]", strategy);

        // 失败插入的记录全部被释放
        map.collect(&handle);
        map.collect(&handle);
        assert_eq!(map.stats().memory.live_records, KEYS, "[{}]", strategy);
    }
}

#[test]
fn test_insert_or_assign_no_lost_updates() {
    const KEYS: usize = 500;

    for strategy in STRATEGIES {
        let map = create_map(4 * KEYS, strategy);
        let fresh: Vec<AtomicUsize> = (0..KEYS).map(|_| AtomicUsize::new(0)).collect();

        thread::scope(|s| {
            for t in 0..THREADS {
                let (map, fresh) = (&map, &fresh);
                s.spawn(move || {
                    let handle = map.register_thread().unwrap();
                    for round in 0..4 {
                        for i in 0..KEYS {
                            let value = [t as u8, round as u8];
                            if map.insert_or_assign(&handle, &key_of(i), &value).unwrap() {
                                fresh[i].fetch_add(1, Ordering::Relaxed);
                            }
                        }
                    }
                });
            }
        });

        let handle = map.register_thread().unwrap();
        for i in 0..KEYS {
            assert_eq!(fresh[i].load(Ordering::Relaxed), 1, "[{}] key {}", strategy, i);
            let value = map.find(&handle, &key_of(i)).unwrap();
            assert_eq!(value.len(), 2);
            assert!((value[0] as usize) < THREADS);
            // 每个线程最后写入的都是第3轮
            assert_eq!(value[1], 3);
        }
        assert_eq!(map.size(), KEYS);

        let ops = map.stats().operations;
        assert_eq!(ops.assign_count, (THREADS * 4 * KEYS) as u64);
        assert_eq!(ops.assign_overwrites, (THREADS * 4 * KEYS - KEYS) as u64);
    }
}

#[test]
fn test_count_invariant_under_mixed_ops() {
    const KEYS_PER_THREAD: usize = 400;
    const OPS: usize = 5_000;

    for strategy in STRATEGIES {
        let map = create_map(THREADS * KEYS_PER_THREAD * 2, strategy);

        let expected: Vec<HashMap<Vec<u8>, Vec<u8>>> = thread::scope(|s| {
            let workers: Vec<_> = (0..THREADS)
                .map(|t| {
                    let map = &map;
                    s.spawn(move || {
                        let handle = map.register_thread().unwrap();
                        let mut rng = StdRng::seed_from_u64(SEED + t as u64);
                        let mut local = HashMap::new();

                        for op in 0..OPS {
                            let key = key_of(t * KEYS_PER_THREAD + rng.gen_range(0..KEYS_PER_THREAD));
                            let value = (op as u32).to_le_bytes().to_vec();
                            match rng.gen_range(0..4) {
                                0 => {
                                    let inserted = map.insert(&handle, &key, &value).unwrap();
                                    assert_eq!(inserted, !local.contains_key(&key));
                                    local.entry(key).or_insert(value);
                                }
                                1 => {
                                    let fresh = map.insert_or_assign(&handle, &key, &value).unwrap();
                                    assert_eq!(fresh, local.insert(key, value).is_none());
                                }
                                2 => {
                                    assert_eq!(map.erase(&handle, &key), local.remove(&key).is_some());
                                }
                                _ => {
                                    assert_eq!(map.find(&handle, &key).as_ref(), local.get(&key));
                                }
                            }
                        }
                        local
                    })
                })
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });

        let total: usize = expected.iter().map(HashMap::len).sum();
        assert_eq!(map.size(), total, "[{}]", strategy);

        let handle = map.register_thread().unwrap();
        for local in &expected {
            for (key, value) in local {
                assert_eq!(map.find(&handle, key).as_ref(), Some(value));
            }
        }

        map.collect(&handle);
        map.collect(&handle);
        let stats = map.stats();
        assert_eq!(stats.reclaim.pending, 0, "[{}]", strategy);
        assert_eq!(stats.memory.live_records, total, "[{}]", strategy);
    }
}

#[test]
fn test_no_dangling_reads() {
    const KEYS: usize = 16;
    const VALUE_LEN: usize = 24;
    const WRITERS: usize = 3;
    const READERS: usize = 3;

    for strategy in STRATEGIES {
        let map = create_map(256, strategy);
        let stop = AtomicBool::new(false);
        let reads = AtomicUsize::new(0);

        thread::scope(|s| {
            let writers: Vec<_> = (0..WRITERS)
                .map(|w| {
                    let map = &map;
                    s.spawn(move || {
                        let handle = map.register_thread().unwrap();
                        let mut rng = StdRng::seed_from_u64(SEED + w as u64);
                        for round in 0..3_000usize {
                            let key = key_of(rng.gen_range(0..KEYS));
                            // 取值避开毒化字节
                            let byte = (round % 200) as u8;
                            if rng.gen_bool(0.3) {
                                map.erase(&handle, &key);
                            } else {
                                map.insert_or_assign(&handle, &key, &[byte; VALUE_LEN]).unwrap();
                            }
                        }
                    })
                })
                .collect();

            for _ in 0..READERS {
                let (map, stop, reads) = (&map, &stop, &reads);
                s.spawn(move || {
                    let handle = map.register_thread().unwrap();
                    let mut i = 0;
                    while !stop.load(Ordering::Relaxed) {
                        let checked = map.find_with(&handle, &key_of(i % KEYS), |value| {
                            assert_eq!(value.len(), VALUE_LEN);
                            let first = value[0];
                            assert_ne!(first, POISON_BYTE, "read a freed record");
                            assert!(value.iter().all(|&b| b == first), "torn value");
                        });
                        if checked.is_some() {
                            reads.fetch_add(1, Ordering::Relaxed);
                        }
                        i += 1;
                    }
                });
            }

            // 写者全部结束后停止读者
            let results: Vec<_> = writers.into_iter().map(|w| w.join()).collect();
            stop.store(true, Ordering::Relaxed);
            assert!(results.iter().all(Result::is_ok), "writer panicked");
        });

        let handle = map.register_thread().unwrap();
        map.collect(&handle);
        map.collect(&handle);
        let stats = map.stats();
        assert!(stats.reclaim.freed > 0, "[{}]", strategy);
        assert_eq!(stats.reclaim.pending, 0, "[{}]", strategy);
        assert_eq!(stats.memory.live_records, map.size(), "[{}]", strategy);
        assert!(reads.load(Ordering::Relaxed) > 0 || map.is_empty());
    }
}

#[test]
fn test_no_dangling_reads_with_eager_reclaim() {
    const KEYS: usize = 32;
    const WRITERS: usize = 4;
    const READERS: usize = 4;
    const ROUNDS: usize = 4_000;

    for strategy in STRATEGIES {
        let map = CuckooMap::new(CuckooMapConfig {
            initial_capacity: 64,
            reclaim_strategy: strategy,
            retire_threshold: 1,
            ..Default::default()
        })
        .unwrap();
        let stop = AtomicBool::new(false);
        let bad_reads = AtomicUsize::new(0);

        thread::scope(|s| {
            let writers: Vec<_> = (0..WRITERS)
                .map(|w| {
                    let map = &map;
                    s.spawn(move || {
                        let handle = map.register_thread().unwrap();
                        let mut rng = StdRng::seed_from_u64(SEED + w as u64);
                        for round in 0..ROUNDS {
                            let key = key_of(rng.gen_range(0..KEYS));
                            // 值的每个字节都等于值长度，长度随轮次变化
                            let len = 1 + (round + w) % 40;
                            let value = vec![len as u8; len];
                            if rng.gen_bool(0.25) {
                                map.erase(&handle, &key);
                            } else {
                                map.insert_or_assign(&handle, &key, &value).unwrap();
                            }
                        }
                    })
                })
                .collect();

            for r in 0..READERS {
                let (map, stop, bad_reads) = (&map, &stop, &bad_reads);
                s.spawn(move || {
                    let handle = map.register_thread().unwrap();
                    let mut i = r;
                    while !stop.load(Ordering::Relaxed) {
                        let intact = map.find_with(&handle, &key_of(i % KEYS), |value| {
                            !value.is_empty() && value.iter().all(|&b| b as usize == value.len())
                        });
                        if intact == Some(false) {
                            bad_reads.fetch_add(1, Ordering::Relaxed);
                        }
                        i += 1;
                    }
                });
            }

            let results: Vec<_> = writers.into_iter().map(|w| w.join()).collect();
            stop.store(true, Ordering::Relaxed);
            assert!(results.iter().all(Result::is_ok), "writer panicked");
        });

        assert_eq!(bad_reads.load(Ordering::Relaxed), 0, "[{}] torn or reused reads", strategy);

        let handle = map.register_thread().unwrap();
        map.collect(&handle);
        map.collect(&handle);
        let stats = map.stats();
        assert_eq!(stats.reclaim.pending, 0, "[{}]", strategy);
        assert_eq!(stats.memory.live_records, map.size(), "[{}]", strategy);
    }
}

#[test]
fn test_readers_never_miss_keys_during_kicks() {
    const STABLE: usize = 1_000;
    const EXTRA: usize = 700;

    let map = create_map(2_048, ReclaimStrategy::HazardPointer);
    {
        let handle = map.register_thread().unwrap();
        for i in 0..STABLE {
            assert!(map.insert(&handle, &key_of(i), &(i as u32).to_le_bytes()).unwrap());
        }
    }

    let done = AtomicBool::new(false);
    thread::scope(|s| {
        let (map_ref, done_ref) = (&map, &done);
        s.spawn(move || {
            let handle = map_ref.register_thread().unwrap();
            for i in STABLE..STABLE + EXTRA {
                match map_ref.insert(&handle, &key_of(i), &(i as u32).to_le_bytes()) {
                    Ok(_) | Err(CuckooError::TableFull { .. }) => {}
                    Err(e) => panic!("unexpected error: {}", e),
                }
            }
            done_ref.store(true, Ordering::Release);
        });

        for _ in 0..4 {
            let (map_ref, done_ref) = (&map, &done);
            s.spawn(move || {
                let handle = map_ref.register_thread().unwrap();
                loop {
                    let finished = done_ref.load(Ordering::Acquire);
                    for i in 0..STABLE {
                        assert_eq!(
                            map_ref.find(&handle, &key_of(i)),
                            Some((i as u32).to_le_bytes().to_vec()),
                            "stable key {} missed",
                            i
                        );
                    }
                    if finished {
                        break;
                    }
                }
            });
        }
    });

    assert!(map.size() >= STABLE);
}
