//! Criterion benchmarks for push/pop throughput.

use std::hint::black_box;

use criterion::{
  Criterion,
  criterion_group,
  criterion_main,
};
use stacked::Arena;

/// 64-byte payload.
struct TestData {
  a: [i32; 16],
}

const ARENA_BYTES: usize = 32 * 1024 * 1024;
const ITERATIONS: usize = 500_000;

fn bench_push_then_pop(c: &mut Criterion) {
  let mut arena = Arena::new(ARENA_BYTES, ITERATIONS);

  c.bench_function("push_pop_500k_64b", |b| {
    b.iter(|| {
      let mut sanity = 0usize;
      for i in 0..ITERATIONS {
        let data = arena.push(TestData { a: [0; 16] });
        data.a[0] = i as i32;
        sanity += data.a[0] as usize;
      }
      for _ in 0..ITERATIONS {
        arena.pop();
      }
      assert_eq!(arena.occupied(), 0);
      black_box(sanity)
    });
  });
}

fn bench_scope_rollback(c: &mut Criterion) {
  let mut arena = Arena::new(64 * 1024, 256);

  c.bench_function("scope_64_pushes", |b| {
    b.iter(|| {
      let scope = arena.open_scope();
      for i in 0..64u64 {
        black_box(scope.push(i));
      }
      black_box(scope.push_raw(128));
    });
  });
}

fn bench_owned_values(c: &mut Criterion) {
  let mut arena = Arena::new(1024 * 1024, 4096);

  c.bench_function("push_pop_4096_strings", |b| {
    b.iter(|| {
      for _ in 0..4096 {
        black_box(arena.push(String::with_capacity(0)));
      }
      arena.clear();
    });
  });
}

criterion_group!(benches, bench_push_then_pop, bench_scope_rollback, bench_owned_values);
criterion_main!(benches);
