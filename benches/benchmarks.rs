//! Cuckoo哈希表性能基准测试

use criterion::{
    black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion,
    PlotConfiguration, Throughput,
};

use cuckoo_hashtable::{batch_find, batch_insert, CuckooMap, CuckooMapConfig, ReclaimStrategy};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::thread;
use std::time::Duration;

// 基准测试配置
const SEED: u64 = 42;
const ITEM_COUNTS: [usize; 3] = [10_000, 100_000, 1_000_000];
const KEY_SIZE: usize = 16; // 128位键
const VALUE_SIZE: usize = 8; // 64位值

const STRATEGIES: [ReclaimStrategy; 3] = [
    ReclaimStrategy::HazardPointer,
    ReclaimStrategy::Epoch,
    ReclaimStrategy::TableScan,
];

/// 生成随机键值对
fn generate_items(count: usize) -> Vec<(Vec<u8>, Vec<u8>)> {
    let mut rng = StdRng::seed_from_u64(SEED);
    (0..count)
        .map(|_| {
            let mut key = vec![0u8; KEY_SIZE];
            let mut value = vec![0u8; VALUE_SIZE];
            rng.fill(&mut key[..]);
            rng.fill(&mut value[..]);
            (key, value)
        })
        .collect()
}

/// 负载因子约0.6的表
fn create_map(count: usize, strategy: ReclaimStrategy) -> CuckooMap {
    CuckooMap::new(CuckooMapConfig {
        initial_capacity: count * 5 / 3,
        reclaim_strategy: strategy,
        ..Default::default()
    })
    .expect("valid config")
}

fn populated(items: &[(Vec<u8>, Vec<u8>)], strategy: ReclaimStrategy) -> CuckooMap {
    let map = create_map(items.len(), strategy);
    let handle = map.register_thread().expect("thread slot");
    for (key, value) in items {
        map.insert(&handle, key, value).expect("insert");
    }
    drop(handle);
    map
}

/// 插入操作基准测试
fn bench_insert(c: &mut Criterion) {
    let plot_config = PlotConfiguration::default().summary_scale(criterion::AxisScale::Logarithmic);
    let mut group = c.benchmark_group("Insert");
    group.plot_config(plot_config);

    for &count in ITEM_COUNTS.iter() {
        let items = generate_items(count);

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &items, |b, items| {
            b.iter_batched(
                // 每个迭代创建新哈希表
                || create_map(items.len(), ReclaimStrategy::HazardPointer),
                |map| {
                    let handle = map.register_thread().expect("thread slot");
                    for (key, value) in items {
                        map.insert(&handle, key, value).expect("insert");
                    }
                },
                BatchSize::PerIteration,
            );
        });
    }
    group.finish();
}

/// 查询操作基准测试（按回收策略对比）
fn bench_find(c: &mut Criterion) {
    let mut group = c.benchmark_group("Find");
    let count = 100_000;
    let items = generate_items(count);

    for strategy in STRATEGIES {
        let map = populated(&items, strategy);
        let handle = map.register_thread().expect("thread slot");

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(strategy.as_str()),
            &items,
            |b, items| {
                b.iter(|| {
                    for (key, _) in items {
                        black_box(map.find_with(&handle, key, |v| v.len()));
                    }
                });
            },
        );
    }
    group.finish();
}

/// 删除操作基准测试
fn bench_erase(c: &mut Criterion) {
    let mut group = c.benchmark_group("Erase");
    let count = 100_000;
    let items = generate_items(count);

    for strategy in STRATEGIES {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(strategy.as_str()),
            &items,
            |b, items| {
                b.iter_batched(
                    || populated(items, strategy),
                    |map| {
                        let handle = map.register_thread().expect("thread slot");
                        for (key, _) in items {
                            black_box(map.erase(&handle, key));
                        }
                    },
                    BatchSize::PerIteration,
                );
            },
        );
    }
    group.finish();
}

/// 批量操作基准测试
fn bench_batch_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("Batch Operations");

    for &count in [10_000, 100_000].iter() {
        let items = generate_items(count);

        group.bench_with_input(BenchmarkId::new("Batch Insert", count), &items, |b, items| {
            b.iter_batched(
                || create_map(items.len(), ReclaimStrategy::Epoch),
                |map| {
                    let handle = map.register_thread().expect("thread slot");
                    batch_insert(
                        &map,
                        &handle,
                        items.iter().map(|(k, v)| (k.as_slice(), v.as_slice())),
                    )
                    .expect("batch insert")
                },
                BatchSize::PerIteration,
            );
        });

        let map = populated(&items, ReclaimStrategy::Epoch);
        let handle = map.register_thread().expect("thread slot");
        group.bench_with_input(BenchmarkId::new("Batch Find", count), &items, |b, items| {
            b.iter(|| {
                let results = batch_find(&map, &handle, items.iter().map(|(k, _)| k.as_slice()));
                black_box(results);
            });
        });
    }
    group.finish();
}

/// 并发读写混合（90% 查找 / 5% 覆盖写 / 5% 删除后重插）
fn bench_concurrent_mixed(c: &mut Criterion) {
    let mut group = c.benchmark_group("Concurrent Mixed");
    let count = 100_000;
    let ops_per_thread = 50_000;
    let items = generate_items(count);

    for strategy in STRATEGIES {
        for &thread_count in [1, 4, 8].iter() {
            let map = populated(&items, strategy);

            group.throughput(Throughput::Elements((thread_count * ops_per_thread) as u64));
            group.bench_with_input(
                BenchmarkId::new(strategy.as_str(), format!("{} threads", thread_count)),
                &thread_count,
                |b, &thread_count| {
                    b.iter(|| {
                        thread::scope(|s| {
                            for t in 0..thread_count {
                                let (map, items) = (&map, &items);
                                s.spawn(move || {
                                    let handle = map.register_thread().expect("thread slot");
                                    let mut rng = StdRng::seed_from_u64(SEED + t as u64);
                                    for _ in 0..ops_per_thread {
                                        let (key, value) = &items[rng.gen_range(0..items.len())];
                                        match rng.gen_range(0..100) {
                                            0..=89 => {
                                                black_box(map.find_with(&handle, key, |v| v[0]));
                                            }
                                            90..=94 => {
                                                black_box(map.insert_or_assign(&handle, key, value).ok());
                                            }
                                            _ => {
                                                if map.erase(&handle, key) {
                                                    black_box(map.insert(&handle, key, value).ok());
                                                }
                                            }
                                        }
                                    }
                                });
                            }
                        });
                    });
                },
            );
        }
    }
    group.finish();
}

criterion_group!(
    name = benches;
    config = Criterion::default()
        .sample_size(10)
        .warm_up_time(Duration::from_secs(1))
        .measurement_time(Duration::from_secs(5))
        .noise_threshold(0.05);
    targets =
        bench_insert,
        bench_find,
        bench_erase,
        bench_batch_operations,
        bench_concurrent_mixed
);
criterion_main!(benches);
