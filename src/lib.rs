//! A fixed-capacity arena with stack discipline.
//!
//! An [`Arena`] reserves one byte buffer up front and hands out typed or raw
//! allocations from it in sequence. Allocations are released strictly in
//! reverse order, each running its destructor on the way out. A [`Scope`]
//! borrows an arena for the length of a block and rolls back everything
//! pushed through it when the block ends.
//!
//! ```
//! use stacked::Arena;
//!
//! let mut arena = Arena::new(1024, 32);
//! arena.push(4u32);
//! {
//!   let scope = arena.open_scope();
//!   scope.push(String::from("scratch"));
//!   scope.push_raw(10);
//! }
//! assert_eq!(arena.entries_occupied(), 1);
//! arena.pop();
//! assert_eq!(arena.occupied(), 0);
//! ```
//!
//! Every operation comes in a `try_` form that returns [`ArenaError`] and a
//! plain form that treats a broken precondition as fatal.

#![allow(clippy::mut_from_ref)]

pub mod arena;
pub mod config;
pub mod error;
pub mod ffi;
pub mod scoped;

pub use arena::{
  Arena,
  Entry,
};
pub use config::ArenaConfig;
pub use error::ArenaError;
pub use scoped::Scope;
