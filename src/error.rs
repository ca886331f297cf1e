//! Contract violations reported by [`Arena`](crate::Arena) and
//! [`Scope`](crate::Scope).

use thiserror::Error;

/// Every way a caller can break the arena's contract.
///
/// The `try_*` family of operations hands these back to the caller. The
/// plain operations route them through [`violation`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ArenaError {
  /// A push would move the cursor past the end of the buffer.
  #[error("arena capacity exceeded: requested {requested} bytes, {available} available")]
  CapacityExceeded {
    /// Bytes needed, including alignment padding.
    requested: usize,
    /// Bytes left between the cursor and the end of the buffer.
    available: usize,
  },
  /// A push would exceed the number of simultaneously live entries.
  #[error("arena entry limit exceeded: at most {limit} live entries")]
  EntryLimitExceeded {
    /// Entry slots reserved at construction.
    limit: usize,
  },
  /// A pop on an arena with nothing live.
  #[error("pop called on an arena with no live entries")]
  EmptyPop,
  /// A raw push asked for zero bytes.
  #[error("raw push of zero bytes")]
  ZeroSizeAllocation,
  /// `pop` on a scope that has no entries of its own left.
  #[error("scope popped more entries than it pushed")]
  ScopeUnderflow,
  /// The alignment is not a power of two, or the rounded size overflows
  /// `isize`.
  #[error("invalid layout: size {size}, align {align}")]
  InvalidLayout {
    /// Requested size in bytes, or element count for the entry table.
    size: usize,
    /// Requested alignment.
    align: usize,
  },
  /// The backing allocator refused the construction-time reservation.
  #[error("failed to reserve {bytes} bytes for arena storage")]
  AllocFailed {
    /// Size of the refused reservation.
    bytes: usize,
  },
}

/// Fail-fast path for the non-`try` operations.
///
/// Logs the violation, then panics, or aborts the process when built with
/// the `abort-on-violation` feature.
#[cold]
#[track_caller]
pub(crate) fn violation(err: ArenaError) -> ! {
  tracing::error!(error = %err, "arena contract violated");

  #[cfg(feature = "abort-on-violation")]
  std::process::abort();

  #[cfg(not(feature = "abort-on-violation"))]
  panic!("{err}");
}

/// Unwraps `result`, sending any error through [`violation`].
#[inline]
#[track_caller]
pub(crate) fn or_violation<T>(result: Result<T, ArenaError>) -> T {
  match result {
    Ok(value) => value,
    Err(err) => violation(err),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn messages_name_the_limits() {
    let err = ArenaError::CapacityExceeded {
      requested: 16,
      available: 4,
    };
    assert_eq!(
      err.to_string(),
      "arena capacity exceeded: requested 16 bytes, 4 available"
    );
    assert_eq!(
      ArenaError::EntryLimitExceeded { limit: 2 }.to_string(),
      "arena entry limit exceeded: at most 2 live entries"
    );
  }

  #[test]
  #[cfg(not(feature = "abort-on-violation"))]
  #[should_panic(expected = "pop called on an arena with no live entries")]
  fn violation_panics_with_message() {
    or_violation::<()>(Err(ArenaError::EmptyPop));
  }
}
