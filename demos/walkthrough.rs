//! Prints the arena's bookkeeping through a typical push/scope/pop cycle.
//!
//! Run with `RUST_LOG=stacked=trace` to see the arena's own events.

use stacked::Arena;
use tracing_subscriber::EnvFilter;

struct Obj2 {
  s: i16,
}

impl Drop for Obj2 {
  fn drop(&mut self) {
    println!("Obj2({}) destroyed", self.s);
  }
}

struct Obj4 {
  i: i32,
}

struct Obj8 {
  i64: i64,
}

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .init();

  let mut arena = Arena::new(1024, 32);
  println!("Arena capacity: {} bytes", arena.capacity());

  let a4 = arena.push(Obj4 { i: 4 });
  println!("Typed push Obj4({}) at {:p}", a4.i, a4);

  let a2 = arena.push_with(|| Obj2 { s: 12 });
  println!("Push and construct Obj2({}) at {:p}", a2.s, a2);

  let raw = arena.push_raw(5);
  println!("Raw push {} bytes at {:p}", raw.len(), raw.as_ptr());

  {
    let scope = arena.open_scope();

    let a8 = scope.push(Obj8 { i64: 8 });
    println!("Scoped typed push Obj8({}) at {:p}", a8.i64, a8);

    scope.push_raw(10);
    println!("Scoped raw push 10 bytes");

    println!("Scoped occupied bytes: {}", scope.scoped_occupied());
    println!("Arena occupied bytes: {}", scope.occupied());
  }

  println!("Arena occupied bytes after scope: {}", arena.occupied());

  arena.pop();
  arena.pop();
  arena.pop();

  println!("Arena occupied bytes after manual pops: {}", arena.occupied());
}
