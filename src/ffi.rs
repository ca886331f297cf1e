//! C ABI over [`Arena`].
//!
//! Contract violations never abort across the boundary: pushes return null
//! and pops return `false`. The header is generated by the build script.

use allocator_api2::alloc::{
  Global,
  Layout as RsLayout,
};
use core::ptr;

use crate::{
  arena::Arena,
  config::ArenaConfig,
  error::ArenaError,
};

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Layout {
  pub size: usize,
  pub align: usize,
}

impl TryFrom<Layout> for RsLayout {
  type Error = ArenaError;

  fn try_from(layout: Layout) -> Result<Self, Self::Error> {
    RsLayout::from_size_align(layout.size, layout.align).map_err(|_| ArenaError::InvalidLayout {
      size: layout.size,
      align: layout.align,
    })
  }
}

impl From<RsLayout> for Layout {
  fn from(layout: RsLayout) -> Self {
    Layout {
      size: layout.size(),
      align: layout.align(),
    }
  }
}

/// Opaque handle owning one arena.
pub struct StackedArena {
  arena: Arena<'static, Global>,
}

fn report(err: ArenaError) {
  tracing::warn!(error = %err, "arena call rejected at the C boundary");
}

#[unsafe(no_mangle)]
pub extern "C" fn stacked_arena_create(capacity: usize, max_entries: usize) -> *mut StackedArena {
  match Arena::try_new_in(Global, ArenaConfig::new(capacity, max_entries)) {
    Ok(arena) => Box::into_raw(Box::new(StackedArena { arena })),
    Err(err) => {
      report(err);
      ptr::null_mut()
    }
  }
}

/// # Safety
///
/// `arena` must be null or a handle from [`stacked_arena_create`] that has
/// not been destroyed yet. Every pointer pushed from it becomes dangling.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn stacked_arena_destroy(arena: *mut StackedArena) {
  if !arena.is_null() {
    // SAFETY: guaranteed by the caller
    drop(unsafe { Box::from_raw(arena) });
  }
}

/// Reserves `layout.size` bytes aligned to `layout.align`.
///
/// # Safety
///
/// `arena` must be null or a live handle from [`stacked_arena_create`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn stacked_arena_push(arena: *mut StackedArena, layout: Layout) -> *mut u8 {
  // SAFETY: guaranteed by the caller
  let Some(handle) = (unsafe { arena.as_ref() }) else {
    return ptr::null_mut();
  };
  let pushed = RsLayout::try_from(layout)
    .and_then(|layout| handle.arena.try_push_aligned(layout.size(), layout.align()));
  match pushed {
    Ok(bytes) => bytes.as_mut_ptr().cast::<u8>(),
    Err(err) => {
      report(err);
      ptr::null_mut()
    }
  }
}

/// Reserves `size` unaligned bytes at the cursor.
///
/// # Safety
///
/// `arena` must be null or a live handle from [`stacked_arena_create`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn stacked_arena_push_raw(arena: *mut StackedArena, size: usize) -> *mut u8 {
  // SAFETY: forwarded from the caller
  unsafe { stacked_arena_push(arena, Layout { size, align: 1 }) }
}

/// Releases the newest allocation. Returns `false` if there was none.
///
/// # Safety
///
/// `arena` must be null or a live handle from [`stacked_arena_create`], and
/// no pointer to the newest allocation may be used afterwards.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn stacked_arena_pop(arena: *mut StackedArena) -> bool {
  // SAFETY: guaranteed by the caller
  let Some(handle) = (unsafe { arena.as_mut() }) else {
    return false;
  };
  match handle.arena.try_pop() {
    Ok(()) => true,
    Err(err) => {
      report(err);
      false
    }
  }
}

/// # Safety
///
/// `arena` must be null or a live handle from [`stacked_arena_create`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn stacked_arena_capacity(arena: *const StackedArena) -> usize {
  // SAFETY: guaranteed by the caller
  unsafe { arena.as_ref() }.map_or(0, |handle| handle.arena.capacity())
}

/// # Safety
///
/// `arena` must be null or a live handle from [`stacked_arena_create`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn stacked_arena_occupied(arena: *const StackedArena) -> usize {
  // SAFETY: guaranteed by the caller
  unsafe { arena.as_ref() }.map_or(0, |handle| handle.arena.occupied())
}

/// # Safety
///
/// `arena` must be null or a live handle from [`stacked_arena_create`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn stacked_arena_entries_occupied(arena: *const StackedArena) -> usize {
  // SAFETY: guaranteed by the caller
  unsafe { arena.as_ref() }.map_or(0, |handle| handle.arena.entries_occupied())
}
