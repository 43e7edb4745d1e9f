//! Spatial index and cached pathfinding benchmarks
//!
//! Run with: cargo bench --bench spatial_bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use tile_empires::core::config::PathfindingConfig;
use tile_empires::core::types::{EntityId, TeamId, Vec2};
use tile_empires::pathfinding::PathPlanner;
use tile_empires::spatial::SpatialIndex;
use tile_empires::world::{Entity, GameMap, ResourceNodeKind, Team};

fn scattered(count: u32, extent: f32) -> Vec<(EntityId, Vec2)> {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    (0..count)
        .map(|i| (EntityId(i), Vec2::new(rng.gen_range(0.0..extent), rng.gen_range(0.0..extent))))
        .collect()
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("spatial_insert");
    for count in [100u32, 1_000, 10_000] {
        let points = scattered(count, 200.0);
        group.bench_with_input(BenchmarkId::from_parameter(count), &points, |b, points| {
            b.iter(|| {
                let mut index = SpatialIndex::new(10.0);
                for (id, position) in points {
                    index.insert(*id, *position, 1);
                }
                black_box(index.len())
            });
        });
    }
    group.finish();
}

fn bench_radius_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("spatial_query");
    let mut index = SpatialIndex::new(10.0);
    for (id, position) in scattered(10_000, 200.0) {
        index.insert(id, position, 1);
    }
    for radius in [5.0f32, 15.0, 40.0] {
        group.bench_with_input(BenchmarkId::from_parameter(radius), &radius, |b, radius| {
            b.iter(|| black_box(index.query_world_radius(Vec2::new(100.0, 100.0), *radius).len()));
        });
    }
    group.finish();
}

fn bench_cached_path(c: &mut Criterion) {
    let mut map = GameMap::new(128, 128, 10.0, vec![Team::new(TeamId(0))]);
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    for _ in 0..800 {
        let (x, y) = (rng.gen_range(0..128), rng.gen_range(0..128));
        // Occupied tiles are simply skipped
        let _ = map.add_entity(Entity::resource(ResourceNodeKind::Tree), x as f32, y as f32);
    }
    let mut planner = PathPlanner::from_config(&PathfindingConfig::default());
    let (start, goal) = (Vec2::new(2.0, 2.0), Vec2::new(120.0, 110.0));

    c.bench_function("path_uncached", |b| {
        b.iter(|| {
            planner.clear();
            black_box(planner.find_path(start, goal, &map).len())
        });
    });
    c.bench_function("path_cached", |b| {
        b.iter(|| black_box(planner.find_path(start, goal, &map).len()));
    });
}

criterion_group!(benches, bench_insert, bench_radius_query, bench_cached_path);
criterion_main!(benches);
