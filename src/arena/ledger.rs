//! Cursor and padding bookkeeping behind [`Arena`](super::Arena).
//!
//! This is the only place that turns offsets into addresses. Everything
//! above it deals in layouts and typed references.

use allocator_api2::{
  alloc::{
    Allocator,
    Layout,
  },
  vec::Vec,
};
use core::{
  mem,
  ptr::{
    self,
    NonNull,
  },
};
use getset::CopyGetters;

use crate::error::ArenaError;

/// Type-erased drop glue, called with the payload address.
pub(crate) type DropFn = unsafe fn(*mut u8);

unsafe fn drop_glue<T>(payload: *mut u8) {
  // SAFETY: the ledger only records this thunk for a payload written as a T
  unsafe { ptr::drop_in_place(payload.cast::<T>()) }
}

/// Drop glue for `T`, or `None` when dropping a `T` is a no-op.
pub(crate) fn drop_fn_of<T>() -> Option<DropFn> {
  if mem::needs_drop::<T>() {
    Some(drop_glue::<T>)
  } else {
    None
  }
}

/// Bookkeeping for one live allocation.
#[derive(Debug, Clone, Copy, CopyGetters)]
pub struct Entry {
  /// Bytes occupied by the payload.
  #[getset(get_copy = "pub")]
  size: usize,
  /// Bytes skipped right before the payload to satisfy its alignment.
  #[getset(get_copy = "pub")]
  padding: usize,
  destructor: Option<DropFn>,
}

impl Entry {
  /// Whether popping this entry runs a destructor.
  pub fn has_destructor(&self) -> bool {
    self.destructor.is_some()
  }

  /// `padding + size`, the amount the cursor moved for this entry.
  pub fn stride(&self) -> usize {
    self.padding + self.size
  }
}

/// An entry that has just left the ledger and whose payload may still need
/// dropping.
pub(crate) struct Released {
  pub(crate) entry: Entry,
  pub(crate) payload: NonNull<u8>,
}

impl Released {
  /// Runs the entry's destructor, if it has one.
  ///
  /// # Safety
  ///
  /// `payload` must still hold the value the destructor was recorded for,
  /// and the value must not be used afterwards.
  pub(crate) unsafe fn finish(self) {
    if let Some(destructor) = self.entry.destructor {
      // SAFETY: guaranteed by the caller
      unsafe { destructor(self.payload.as_ptr()) }
    }
  }
}

pub(crate) struct Ledger<A: Allocator> {
  base: NonNull<u8>,
  capacity: usize,
  cursor: usize,
  limit: usize,
  entries: Vec<Entry, A>,
}

impl<A: Allocator> Ledger<A> {
  /// `entries` must already hold room for `limit` records so that pushing
  /// never reallocates.
  pub(crate) fn new(base: NonNull<u8>, capacity: usize, entries: Vec<Entry, A>, limit: usize) -> Self {
    debug_assert!(entries.capacity() >= limit);
    Self {
      base,
      capacity,
      cursor: 0,
      limit,
      entries,
    }
  }

  pub(crate) fn base(&self) -> NonNull<u8> {
    self.base
  }

  pub(crate) fn capacity(&self) -> usize {
    self.capacity
  }

  pub(crate) fn cursor(&self) -> usize {
    self.cursor
  }

  pub(crate) fn limit(&self) -> usize {
    self.limit
  }

  pub(crate) fn len(&self) -> usize {
    self.entries.len()
  }

  pub(crate) fn entries(&self) -> &[Entry] {
    &self.entries
  }

  /// Bytes to skip from the cursor so the next payload lands on `align`.
  fn padding_for(&self, align: usize) -> usize {
    let addr = self.base.as_ptr() as usize + self.cursor;
    addr.wrapping_neg() & (align - 1)
  }

  /// Carves `layout` out of the buffer and records it.
  ///
  /// On success the returned pointer is aligned to `layout.align()` and
  /// valid for `layout.size()` bytes until the matching [`release`].
  ///
  /// [`release`]: Ledger::release
  pub(crate) fn reserve(
    &mut self,
    layout: Layout,
    destructor: Option<DropFn>,
  ) -> Result<NonNull<u8>, ArenaError> {
    let padding = self.padding_for(layout.align());
    let available = self.capacity - self.cursor;
    let requested = padding
      .checked_add(layout.size())
      .ok_or(ArenaError::CapacityExceeded {
        requested: usize::MAX,
        available,
      })?;

    if requested > available {
      return Err(ArenaError::CapacityExceeded {
        requested,
        available,
      });
    }
    if self.entries.len() >= self.limit {
      return Err(ArenaError::EntryLimitExceeded { limit: self.limit });
    }

    let offset = self.cursor + padding;
    self.entries.push(Entry {
      size: layout.size(),
      padding,
      destructor,
    });
    self.cursor = offset + layout.size();

    // SAFETY: offset + size <= capacity, so the pointer stays inside the buffer
    Ok(unsafe { NonNull::new_unchecked(self.base.as_ptr().add(offset)) })
  }

  /// Removes the newest entry and rewinds the cursor past it and its
  /// padding. The payload is handed back so its destructor can run outside
  /// any borrow of the ledger.
  pub(crate) fn release(&mut self) -> Result<Released, ArenaError> {
    let entry = self.entries.pop().ok_or(ArenaError::EmptyPop)?;
    let payload_offset = self.cursor - entry.size;
    self.cursor = payload_offset - entry.padding;

    // SAFETY: payload_offset was handed out by `reserve` and is in bounds
    let payload = unsafe { NonNull::new_unchecked(self.base.as_ptr().add(payload_offset)) };
    Ok(Released { entry, payload })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use allocator_api2::alloc::Global;

  fn ledger_over(buffer: &mut [u64], limit: usize) -> Ledger<Global> {
    let base = NonNull::new(buffer.as_mut_ptr().cast::<u8>()).unwrap();
    let capacity = buffer.len() * mem::size_of::<u64>();
    Ledger::new(base, capacity, Vec::with_capacity_in(limit, Global), limit)
  }

  #[test]
  fn padding_is_recorded_and_rewound() {
    let mut buffer = [0u64; 4];
    let mut ledger = ledger_over(&mut buffer, 4);

    ledger.reserve(Layout::new::<u8>(), None).unwrap();
    let ptr = ledger.reserve(Layout::new::<u64>(), None).unwrap();
    assert_eq!(ptr.as_ptr() as usize % 8, 0);
    assert_eq!(ledger.cursor(), 16);
    assert_eq!(ledger.entries()[1].padding(), 7);
    assert_eq!(ledger.entries()[1].stride(), 15);

    let released = ledger.release().unwrap();
    assert_eq!(released.payload, ptr);
    assert_eq!(ledger.cursor(), 1);
    ledger.release().unwrap();
    assert_eq!(ledger.cursor(), 0);
  }

  #[test]
  fn cursor_equals_sum_of_strides() {
    let mut buffer = [0u64; 8];
    let mut ledger = ledger_over(&mut buffer, 8);
    for layout in [
      Layout::new::<u8>(),
      Layout::new::<u32>(),
      Layout::new::<u16>(),
      Layout::new::<u64>(),
      Layout::from_size_align(3, 1).unwrap(),
    ] {
      ledger.reserve(layout, None).unwrap();
      let total: usize = ledger.entries().iter().map(Entry::stride).sum();
      assert_eq!(total, ledger.cursor());
    }
  }

  #[test]
  fn limits_are_enforced() {
    let mut buffer = [0u64; 1];
    let mut ledger = ledger_over(&mut buffer, 1);

    assert_eq!(
      ledger.reserve(Layout::from_size_align(9, 1).unwrap(), None),
      Err(ArenaError::CapacityExceeded {
        requested: 9,
        available: 8,
      })
    );
    ledger.reserve(Layout::from_size_align(1, 1).unwrap(), None).unwrap();
    assert_eq!(
      ledger.reserve(Layout::from_size_align(1, 1).unwrap(), None),
      Err(ArenaError::EntryLimitExceeded { limit: 1 })
    );
  }

  #[test]
  fn release_on_empty_ledger() {
    let mut buffer = [0u64; 1];
    let mut ledger = ledger_over(&mut buffer, 1);
    assert!(matches!(ledger.release(), Err(ArenaError::EmptyPop)));
  }

  #[test]
  fn drop_glue_only_for_types_that_need_it() {
    assert!(drop_fn_of::<u32>().is_none());
    assert!(drop_fn_of::<[u8; 4]>().is_none());
    assert!(drop_fn_of::<String>().is_some());
  }
}
