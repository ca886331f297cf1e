//! Scoped rollback over an [`Arena`].
//!
//! A [`Scope`] borrows its arena exclusively, counts the entries pushed
//! through it, and pops exactly that many when it ends. Because the borrow
//! is exclusive, the arena cannot be touched behind the scope's back and an
//! inner scope always closes before the one it was opened from.

use allocator_api2::alloc::{
  Allocator,
  Global,
};
use core::{
  cell::Cell,
  mem::MaybeUninit,
};

use crate::{
  arena::Arena,
  error::{
    ArenaError,
    or_violation,
  },
};

/// An RAII window over the top of an arena's allocation stack.
pub struct Scope<'s, 'a, A: Allocator = Global> {
  arena: &'s mut Arena<'a, A>,
  baseline_bytes: usize,
  baseline_entries: usize,
  owned: Cell<usize>,
}

impl<'s, 'a, A> Scope<'s, 'a, A>
where
  A: Allocator,
{
  /// Opens a scope at the arena's current top. Everything pushed through
  /// it is popped when it ends.
  pub fn open(arena: &'s mut Arena<'a, A>) -> Self {
    Self {
      baseline_bytes: arena.occupied(),
      baseline_entries: arena.entries_occupied(),
      arena,
      owned: Cell::new(0),
    }
  }

  /// Opens a scope nested inside this one. `self` is unusable until the
  /// nested scope ends.
  pub fn open_scope(&mut self) -> Scope<'_, 'a, A> {
    Scope::open(&mut *self.arena)
  }

  fn track<R>(&self, pushed: Result<R, ArenaError>) -> Result<R, ArenaError> {
    if pushed.is_ok() {
      self.owned.set(self.owned.get() + 1);
    }
    pushed
  }

  /// Moves `value` into the arena as an entry owned by this scope.
  pub fn try_push<T: 'a>(&self, value: T) -> Result<&mut T, ArenaError> {
    self.track(self.arena.try_push(value))
  }

  /// # Panics
  ///
  /// Panics if the arena is full.
  pub fn push<T: 'a>(&self, value: T) -> &mut T {
    or_violation(self.try_push(value))
  }

  pub fn try_push_with<T: 'a, F>(&self, init: F) -> Result<&mut T, ArenaError>
  where
    F: FnOnce() -> T,
  {
    self.try_push(init())
  }

  pub fn push_with<T: 'a, F>(&self, init: F) -> &mut T
  where
    F: FnOnce() -> T,
  {
    or_violation(self.try_push_with(init))
  }

  pub fn try_push_default<T: Default + 'a>(&self) -> Result<&mut T, ArenaError> {
    self.try_push(T::default())
  }

  pub fn push_default<T: Default + 'a>(&self) -> &mut T {
    or_violation(self.try_push_default())
  }

  pub fn try_push_uninit<T>(&self) -> Result<&mut MaybeUninit<T>, ArenaError> {
    self.track(self.arena.try_push_uninit())
  }

  pub fn push_uninit<T>(&self) -> &mut MaybeUninit<T> {
    or_violation(self.try_push_uninit())
  }

  /// Reserves `size` unaligned bytes owned by this scope.
  pub fn try_push_raw(&self, size: usize) -> Result<&mut [MaybeUninit<u8>], ArenaError> {
    self.track(self.arena.try_push_raw(size))
  }

  pub fn push_raw(&self, size: usize) -> &mut [MaybeUninit<u8>] {
    or_violation(self.try_push_raw(size))
  }

  pub fn try_push_aligned(&self, size: usize, align: usize) -> Result<&mut [MaybeUninit<u8>], ArenaError> {
    self.track(self.arena.try_push_aligned(size, align))
  }

  pub fn push_aligned(&self, size: usize, align: usize) -> &mut [MaybeUninit<u8>] {
    or_violation(self.try_push_aligned(size, align))
  }

  pub fn try_push_raw_zeroed(&self, size: usize) -> Result<&mut [u8], ArenaError> {
    self.track(self.arena.try_push_raw_zeroed(size))
  }

  pub fn push_raw_zeroed(&self, size: usize) -> &mut [u8] {
    or_violation(self.try_push_raw_zeroed(size))
  }

  pub fn try_push_bytes(&self, bytes: &[u8]) -> Result<&mut [u8], ArenaError> {
    self.track(self.arena.try_push_bytes(bytes))
  }

  pub fn push_bytes(&self, bytes: &[u8]) -> &mut [u8] {
    or_violation(self.try_push_bytes(bytes))
  }

  /// Copies `value` into an entry owned by this scope.
  pub fn try_push_str(&self, value: &str) -> Result<&mut str, ArenaError> {
    self.track(self.arena.try_push_str(value))
  }

  pub fn push_str(&self, value: &str) -> &mut str {
    or_violation(self.try_push_str(value))
  }

  /// Pops the newest entry early. Only entries pushed through this scope
  /// may be popped.
  pub fn try_pop(&mut self) -> Result<(), ArenaError> {
    let owned = self.owned.get();
    if owned == 0 {
      return Err(ArenaError::ScopeUnderflow);
    }
    self.arena.try_pop()?;
    self.owned.set(owned - 1);
    Ok(())
  }

  /// # Panics
  ///
  /// Panics if this scope has no entries of its own left.
  pub fn pop(&mut self) {
    or_violation(self.try_pop())
  }

  /// Ends the scope now instead of at the end of the enclosing block.
  pub fn close(self) {}

  /// Entries pushed through this scope and not yet popped.
  pub fn owned_entries(&self) -> usize {
    self.owned.get()
  }

  /// Bytes pushed since the scope opened, padding included.
  pub fn scoped_occupied(&self) -> usize {
    self.arena.occupied() - self.baseline_bytes
  }

  /// Live entries above the scope's baseline.
  pub fn scoped_entries_occupied(&self) -> usize {
    self.arena.entries_occupied() - self.baseline_entries
  }

  pub fn capacity(&self) -> usize {
    self.arena.capacity()
  }

  pub fn occupied(&self) -> usize {
    self.arena.occupied()
  }

  pub fn entries_occupied(&self) -> usize {
    self.arena.entries_occupied()
  }

  pub fn remaining(&self) -> usize {
    self.arena.remaining()
  }
}

impl<'s, 'a, A> Drop for Scope<'s, 'a, A>
where
  A: Allocator,
{
  fn drop(&mut self) {
    let owned = self.owned.replace(0);
    for _ in 0..owned {
      self.arena.pop();
    }

    debug_assert_eq!(self.arena.occupied(), self.baseline_bytes);
    debug_assert_eq!(self.arena.entries_occupied(), self.baseline_entries);
    tracing::debug!(released = owned, "scope closed");
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::{
    cell::RefCell,
    rc::Rc,
  };

  struct Noisy(&'static str, Rc<RefCell<Vec<&'static str>>>);

  impl Drop for Noisy {
    fn drop(&mut self) {
      self.1.borrow_mut().push(self.0);
    }
  }

  #[test]
  fn close_restores_baseline() {
    let mut arena = Arena::new(256, 16);
    arena.push(1u8);
    let (bytes, entries) = (arena.occupied(), arena.entries_occupied());

    {
      let scope = arena.open_scope();
      scope.push(7u64);
      scope.push_raw(10);
      scope.push_str("scoped");
      assert_eq!(scope.owned_entries(), 3);
      assert_eq!(scope.scoped_entries_occupied(), 3);
      assert_eq!(scope.scoped_occupied(), 7 + 8 + 10 + 6);
    }

    assert_eq!(arena.occupied(), bytes);
    assert_eq!(arena.entries_occupied(), entries);
  }

  #[test]
  fn manual_pop_is_accounted() {
    let mut arena = Arena::new(256, 16);
    let mut scope = arena.open_scope();
    scope.push(1u32);
    scope.push(2u32);
    scope.pop();
    assert_eq!(scope.owned_entries(), 1);
    assert_eq!(scope.scoped_occupied(), 4);
    scope.close();
    assert_eq!(arena.occupied(), 0);
    assert!(arena.is_empty());
  }

  #[test]
  fn pop_below_baseline_is_refused() {
    let mut arena = Arena::new(64, 4);
    arena.push(5u16);
    let mut scope = arena.open_scope();
    assert_eq!(scope.try_pop(), Err(ArenaError::ScopeUnderflow));
    scope.close();
    assert_eq!(arena.entries_occupied(), 1);
  }

  #[test]
  fn failed_push_is_not_owned() {
    let mut arena = Arena::new(8, 4);
    let scope = arena.open_scope();
    assert!(scope.try_push([0u8; 16]).is_err());
    assert!(matches!(
      scope.try_push_raw(0),
      Err(ArenaError::ZeroSizeAllocation)
    ));
    assert_eq!(scope.owned_entries(), 0);
  }

  #[test]
  fn nested_scopes_unwind_in_order() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut arena = Arena::new(512, 16);

    {
      let mut outer = arena.open_scope();
      outer.push(Noisy("outer", log.clone()));
      {
        let inner = outer.open_scope();
        inner.push(Noisy("inner-a", log.clone()));
        inner.push(Noisy("inner-b", log.clone()));
        assert_eq!(inner.scoped_entries_occupied(), 2);
        assert_eq!(inner.entries_occupied(), 3);
      }
      assert_eq!(*log.borrow(), ["inner-b", "inner-a"]);
      assert_eq!(outer.scoped_entries_occupied(), 1);
    }

    assert_eq!(*log.borrow(), ["inner-b", "inner-a", "outer"]);
    assert!(arena.is_empty());
  }

  #[test]
  fn entries_pushed_before_the_scope_survive_it() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut arena = Arena::new(512, 16);
    arena.push(Noisy("base", log.clone()));

    arena.open_scope().push(Noisy("scoped", log.clone()));
    assert_eq!(*log.borrow(), ["scoped"]);

    drop(arena);
    assert_eq!(*log.borrow(), ["scoped", "base"]);
  }
}
