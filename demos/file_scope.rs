//! Reads a file into a scope-owned buffer sized from the file's metadata.
//!
//! Usage: `cargo run --example file_scope -- [PATH]` (defaults to this
//! crate's `Cargo.toml`).

use std::{
  env,
  fmt,
  fs::File,
  io::{
    self,
    Read,
  },
  path::Path,
};

use stacked::{
  Arena,
  ArenaError,
  Scope,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
enum ProcessError {
  Io(io::Error),
  Arena(ArenaError),
}

impl fmt::Display for ProcessError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Io(err) => write!(f, "io: {err}"),
      Self::Arena(err) => write!(f, "arena: {err}"),
    }
  }
}

impl From<io::Error> for ProcessError {
  fn from(err: io::Error) -> Self {
    Self::Io(err)
  }
}

impl From<ArenaError> for ProcessError {
  fn from(err: ArenaError) -> Self {
    Self::Arena(err)
  }
}

/// Returns the number of lines in `path`. The file contents never outlive
/// this call.
fn process_file(arena: &mut Arena<'_>, path: &Path) -> Result<usize, ProcessError> {
  let scope: Scope<'_, '_> = arena.open_scope();

  let mut file = File::open(path)?;
  let len = usize::try_from(file.metadata()?.len()).unwrap_or(usize::MAX);
  if len == 0 {
    return Ok(0);
  }

  let buffer = scope.try_push_raw_zeroed(len)?;
  file.read_exact(buffer)?;

  Ok(buffer.iter().filter(|&&b| b == b'\n').count())
}

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .init();

  let path = env::args()
    .nth(1)
    .unwrap_or_else(|| concat!(env!("CARGO_MANIFEST_DIR"), "/Cargo.toml").to_owned());

  let mut arena = Arena::new(1024 * 32, 32);
  match process_file(&mut arena, Path::new(&path)) {
    Ok(lines) => println!("{path}: {lines} lines"),
    Err(err) => eprintln!("{path}: {err}"),
  }
  println!("occupied after processing: {} bytes", arena.occupied());
}
