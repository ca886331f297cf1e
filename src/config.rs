//! Construction parameters for an [`Arena`](crate::Arena).

use getset::CopyGetters;

use crate::error::ArenaError;

/// Sizes reserved once when an arena is built. Neither grows afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct ArenaConfig {
  /// Bytes in the payload buffer.
  capacity_bytes: usize,
  /// Maximum number of simultaneously live entries.
  max_entries: usize,
}

impl ArenaConfig {
  pub const DEFAULT_CAPACITY_BYTES: usize = 64 * 1024;
  pub const DEFAULT_MAX_ENTRIES: usize = 256;

  pub const fn new(capacity_bytes: usize, max_entries: usize) -> Self {
    Self {
      capacity_bytes,
      max_entries,
    }
  }

  pub const fn with_capacity_bytes(mut self, capacity_bytes: usize) -> Self {
    self.capacity_bytes = capacity_bytes;
    self
  }

  pub const fn with_max_entries(mut self, max_entries: usize) -> Self {
    self.max_entries = max_entries;
    self
  }

  /// Checks that the buffer can be described by a [`Layout`] at the
  /// arena's base alignment.
  ///
  /// [`Layout`]: allocator_api2::alloc::Layout
  pub fn validate(&self) -> Result<(), ArenaError> {
    crate::arena::buffer_layout(self.capacity_bytes).map(|_| ())
  }
}

impl Default for ArenaConfig {
  fn default() -> Self {
    Self::new(Self::DEFAULT_CAPACITY_BYTES, Self::DEFAULT_MAX_ENTRIES)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults() {
    let config = ArenaConfig::default();
    assert_eq!(config.capacity_bytes(), 64 * 1024);
    assert_eq!(config.max_entries(), 256);
    assert!(config.validate().is_ok());
  }

  #[test]
  fn setters_chain() {
    let config = ArenaConfig::default()
      .with_capacity_bytes(1024)
      .with_max_entries(32);
    assert_eq!(config, ArenaConfig::new(1024, 32));
  }

  #[test]
  fn oversized_buffer_is_rejected() {
    let config = ArenaConfig::new(usize::MAX, 1);
    assert!(matches!(
      config.validate(),
      Err(ArenaError::InvalidLayout { .. })
    ));
  }
}
