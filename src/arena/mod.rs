//! The fixed-capacity LIFO arena.
//!
//! An [`Arena`] reserves one byte buffer and one table of entry records up
//! front. Every push carves the next aligned slot out of the buffer and
//! appends a record; every pop removes the newest record, runs its
//! destructor if it has one, and rewinds the cursor. Nothing is ever
//! reallocated.
//!
//! Pushes take `&self` and pops take `&mut self`, so the borrow checker
//! guarantees no reference handed out by a push survives the pop that
//! reclaims it.

mod ledger;


use allocator_api2::{
  alloc::{
    Allocator,
    Global,
    Layout,
  },
  vec::Vec,
};
use core::{
  cell::UnsafeCell,
  fmt,
  marker::PhantomData,
  mem::{
    self,
    MaybeUninit,
  },
  ptr::NonNull,
  slice,
};

pub use ledger::Entry;
use ledger::{
  Ledger,
  drop_fn_of,
};

use crate::{
  config::ArenaConfig,
  error::{
    ArenaError,
    or_violation,
  },
  scoped::Scope,
};

/// Alignment of the backing buffer, matching the strictest fundamental
/// alignment on the supported targets.
pub const BASE_ALIGN: usize = 16;

fn dangling_base() -> NonNull<u8> {
  // SAFETY: BASE_ALIGN is non-zero
  unsafe { NonNull::new_unchecked(core::ptr::without_provenance_mut(BASE_ALIGN)) }
}

pub(crate) fn buffer_layout(capacity: usize) -> Result<Layout, ArenaError> {
  Layout::from_size_align(capacity, BASE_ALIGN).map_err(|_| ArenaError::InvalidLayout {
    size: capacity,
    align: BASE_ALIGN,
  })
}

/// A fixed-capacity region allocator with stack discipline.
///
/// `'a` bounds every value stored in the arena. It is invariant, so a value
/// borrowing from the surrounding frame keeps that frame alive until the
/// arena is dropped.
pub struct Arena<'a, A: Allocator = Global> {
  inner: UnsafeCell<Ledger<A>>,
  allocator: A,
  _marker: PhantomData<*mut &'a ()>,
}

impl<'a> Arena<'a, Global> {
  /// Creates an arena of `capacity_bytes` holding at most `max_entries` live
  /// allocations.
  ///
  /// # Panics
  ///
  /// Panics if the storage cannot be reserved.
  pub fn new(capacity_bytes: usize, max_entries: usize) -> Self {
    Self::new_in(Global, capacity_bytes, max_entries)
  }

  /// Creates an arena sized by `config`.
  ///
  /// # Panics
  ///
  /// Panics if `config` is invalid or the storage cannot be reserved.
  pub fn with_config(config: ArenaConfig) -> Self {
    or_violation(Self::try_new_in(Global, config))
  }
}

impl<'a, A> Arena<'a, A>
where
  A: Allocator + Clone,
{
  /// Reserves the buffer and the entry table from `allocator`.
  ///
  /// Fails with [`ArenaError::InvalidLayout`] if either cannot be described
  /// and with [`ArenaError::AllocFailed`] if the allocator refuses them.
  pub fn try_new_in(allocator: A, config: ArenaConfig) -> Result<Self, ArenaError> {
    let capacity = config.capacity_bytes();
    let max_entries = config.max_entries();

    let layout = buffer_layout(capacity)?;
    Layout::array::<Entry>(max_entries).map_err(|_| ArenaError::InvalidLayout {
      size: max_entries,
      align: mem::align_of::<Entry>(),
    })?;

    let base = if capacity == 0 {
      dangling_base()
    } else {
      allocator
        .allocate(layout)
        .map_err(|_| ArenaError::AllocFailed { bytes: capacity })?
        .cast::<u8>()
    };
    let mut entries = Vec::new_in(allocator.clone());
    if entries.try_reserve_exact(max_entries).is_err() {
      if capacity > 0 {
        // SAFETY: base was just allocated by this allocator with this layout
        unsafe { allocator.deallocate(base, layout) };
      }
      return Err(ArenaError::AllocFailed {
        bytes: max_entries.saturating_mul(mem::size_of::<Entry>()),
      });
    }

    tracing::debug!(capacity, max_entries, "arena created");

    Ok(Self {
      inner: UnsafeCell::new(Ledger::new(base, capacity, entries, max_entries)),
      allocator,
      _marker: PhantomData,
    })
  }

  /// # Panics
  ///
  /// Panics if the storage cannot be reserved.
  pub fn new_in(allocator: A, capacity_bytes: usize, max_entries: usize) -> Self {
    or_violation(Self::try_new_in(
      allocator,
      ArenaConfig::new(capacity_bytes, max_entries),
    ))
  }

  /// An arena with no storage at all. Every push on it fails.
  pub fn empty_in(allocator: A) -> Self {
    let entries = Vec::new_in(allocator.clone());
    Self {
      inner: UnsafeCell::new(Ledger::new(dangling_base(), 0, entries, 0)),
      allocator,
      _marker: PhantomData,
    }
  }

  /// Hands the buffer and every live entry to a new owner, leaving `self`
  /// empty.
  pub fn transfer(&mut self) -> Self {
    let empty = Self::empty_in(self.allocator.clone());
    mem::replace(self, empty)
  }
}

impl<'a, A> Arena<'a, A>
where
  A: Allocator,
{
  fn ledger(&self) -> &Ledger<A> {
    // SAFETY: ledger_mut borrows never outlive the method that takes them
    unsafe { &*self.inner.get() }
  }

  unsafe fn ledger_mut(&self) -> &mut Ledger<A> {
    // SAFETY: callers ensure exclusive access
    unsafe { &mut *self.inner.get() }
  }

  fn reserve(&self, layout: Layout, destructor: Option<ledger::DropFn>) -> Result<NonNull<u8>, ArenaError> {
    // SAFETY: the borrow ends before this returns; payload references point
    // into the buffer, never into the ledger
    unsafe { self.ledger_mut() }.reserve(layout, destructor)
  }

  /// Moves `value` into the arena.
  ///
  /// On failure `value` is dropped.
  pub fn try_push<T: 'a>(&self, value: T) -> Result<&mut T, ArenaError> {
    let ptr = self.reserve(Layout::new::<T>(), drop_fn_of::<T>())?.cast::<T>();
    // SAFETY: ptr is aligned for T, valid for its size and unaliased
    unsafe {
      ptr.as_ptr().write(value);
      Ok(&mut *ptr.as_ptr())
    }
  }

  /// Moves `value` into the arena.
  ///
  /// # Panics
  ///
  /// Panics if the buffer or the entry table is full.
  pub fn push<T: 'a>(&self, value: T) -> &mut T {
    or_violation(self.try_push(value))
  }

  /// Builds a value with `init` and moves it into the arena.
  ///
  /// `init` runs before any space is reserved, so it may push to the same
  /// arena itself.
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

  /// Pushes `T::default()`.
  pub fn try_push_default<T: Default + 'a>(&self) -> Result<&mut T, ArenaError> {
    self.try_push(T::default())
  }

  pub fn push_default<T: Default + 'a>(&self) -> &mut T {
    or_violation(self.try_push_default())
  }

  /// Reserves an aligned slot for a `T` without initializing it.
  ///
  /// No destructor is recorded: a value written through the returned
  /// reference is never dropped by the arena.
  pub fn try_push_uninit<T>(&self) -> Result<&mut MaybeUninit<T>, ArenaError> {
    let ptr = self.reserve(Layout::new::<T>(), None)?.cast::<MaybeUninit<T>>();
    // SAFETY: MaybeUninit needs no initialization; ptr is aligned and unaliased
    Ok(unsafe { &mut *ptr.as_ptr() })
  }

  pub fn push_uninit<T>(&self) -> &mut MaybeUninit<T> {
    or_violation(self.try_push_uninit())
  }

  /// Reserves `size` uninitialized bytes at the cursor with no alignment.
  pub fn try_push_raw(&self, size: usize) -> Result<&mut [MaybeUninit<u8>], ArenaError> {
    self.try_push_aligned(size, 1)
  }

  pub fn push_raw(&self, size: usize) -> &mut [MaybeUninit<u8>] {
    or_violation(self.try_push_raw(size))
  }

  /// Reserves `size` uninitialized bytes starting on an `align` boundary.
  pub fn try_push_aligned(&self, size: usize, align: usize) -> Result<&mut [MaybeUninit<u8>], ArenaError> {
    if size == 0 {
      return Err(ArenaError::ZeroSizeAllocation);
    }
    let layout =
      Layout::from_size_align(size, align).map_err(|_| ArenaError::InvalidLayout { size, align })?;
    let ptr = self.reserve(layout, None)?.cast::<MaybeUninit<u8>>();
    // SAFETY: the ledger handed out `size` unaliased bytes at ptr
    Ok(unsafe { slice::from_raw_parts_mut(ptr.as_ptr(), size) })
  }

  pub fn push_aligned(&self, size: usize, align: usize) -> &mut [MaybeUninit<u8>] {
    or_violation(self.try_push_aligned(size, align))
  }

  /// Reserves `size` unaligned bytes and zeroes them.
  pub fn try_push_raw_zeroed(&self, size: usize) -> Result<&mut [u8], ArenaError> {
    let raw = self.try_push_raw(size)?;
    raw.fill(MaybeUninit::new(0));
    // SAFETY: every byte was just initialized
    Ok(unsafe { &mut *(raw as *mut [MaybeUninit<u8>] as *mut [u8]) })
  }

  pub fn push_raw_zeroed(&self, size: usize) -> &mut [u8] {
    or_violation(self.try_push_raw_zeroed(size))
  }

  /// Copies `bytes` into a raw entry.
  pub fn try_push_bytes(&self, bytes: &[u8]) -> Result<&mut [u8], ArenaError> {
    let raw = self.try_push_raw(bytes.len())?;
    // SAFETY: raw and bytes have the same length and cannot overlap
    unsafe {
      core::ptr::copy_nonoverlapping(bytes.as_ptr(), raw.as_mut_ptr().cast::<u8>(), bytes.len());
      Ok(&mut *(raw as *mut [MaybeUninit<u8>] as *mut [u8]))
    }
  }

  pub fn push_bytes(&self, bytes: &[u8]) -> &mut [u8] {
    or_violation(self.try_push_bytes(bytes))
  }

  /// Copies `value` into a raw entry.
  pub fn try_push_str(&self, value: &str) -> Result<&mut str, ArenaError> {
    let bytes = self.try_push_bytes(value.as_bytes())?;
    // SAFETY: copied verbatim from a str
    Ok(unsafe { core::str::from_utf8_unchecked_mut(bytes) })
  }

  pub fn push_str(&self, value: &str) -> &mut str {
    or_violation(self.try_push_str(value))
  }

  /// Releases the newest entry, running its destructor first if it has one.
  pub fn try_pop(&mut self) -> Result<(), ArenaError> {
    let released = self.inner.get_mut().release()?;
    if released.entry.has_destructor() {
      tracing::trace!(size = released.entry.size(), "dropping arena entry");
    }
    // SAFETY: &mut self means no reference into the payload is alive, and
    // the entry is gone from the ledger so it cannot be dropped twice
    unsafe { released.finish() };
    Ok(())
  }

  /// Releases the newest entry.
  ///
  /// # Panics
  ///
  /// Panics if the arena is empty.
  pub fn pop(&mut self) {
    or_violation(self.try_pop())
  }

  /// Pops every live entry, newest first. Storage is kept.
  pub fn clear(&mut self) {
    while self.try_pop().is_ok() {}
  }

  /// Opens a scope whose pushes are rolled back when it ends.
  pub fn open_scope(&mut self) -> Scope<'_, 'a, A> {
    Scope::open(self)
  }

  /// Size of the buffer in bytes.
  pub fn capacity(&self) -> usize {
    self.ledger().capacity()
  }

  /// Bytes between the start of the buffer and the cursor, padding included.
  pub fn occupied(&self) -> usize {
    self.ledger().cursor()
  }

  pub fn entries_occupied(&self) -> usize {
    self.ledger().len()
  }

  /// Most entries that can be live at once.
  pub fn entries_capacity(&self) -> usize {
    self.ledger().limit()
  }

  /// Bytes left after the cursor. An aligned push may need padding on top.
  pub fn remaining(&self) -> usize {
    self.capacity() - self.occupied()
  }

  pub fn is_empty(&self) -> bool {
    self.entries_occupied() == 0
  }

  /// Record of the newest live entry.
  pub fn last_entry(&self) -> Option<Entry> {
    self.ledger().entries().last().copied()
  }

  /// Records of every live entry, oldest first.
  pub fn entries(&self) -> impl Iterator<Item = Entry> + '_ {
    self.ledger().entries().iter().copied()
  }
}

impl<'a, A> Drop for Arena<'a, A>
where
  A: Allocator,
{
  fn drop(&mut self) {
    let live = self.entries_occupied();
    self.clear();

    let ledger = self.inner.get_mut();
    if ledger.capacity() > 0 {
      let layout = Layout::from_size_align(ledger.capacity(), BASE_ALIGN)
        .unwrap_or_else(|_| unreachable!("validated at construction"));
      // SAFETY: base was allocated by this allocator with this layout
      unsafe { self.allocator.deallocate(ledger.base(), layout) };
    }

    tracing::debug!(live, "arena dropped");
  }
}

impl<'a, A> fmt::Debug for Arena<'a, A>
where
  A: Allocator,
{
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Arena")
      .field("capacity", &self.capacity())
      .field("occupied", &self.occupied())
      .field("entries_capacity", &self.entries_capacity())
      .field("entries_occupied", &self.entries_occupied())
      .finish()
  }
}
