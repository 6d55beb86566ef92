//! Fetch gate: one in-flight fetch at a time, a page cursor and an exhaustion latch.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Why the gate refused to admit a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateClosed {
  /// Another fetch holds the permit
  Busy,
  /// A previous fetch came back empty, nothing more to load
  Exhausted,
}

/// Reentrancy guard for a paginated source.
///
/// `try_acquire` hands out at most one [`FetchPermit`] at a time. The permit
/// is released when dropped, so every exit path of the holder (early return,
/// `?`, panic) frees the gate. Only the permit holder can move the cursor or
/// latch exhaustion.
#[derive(Debug)]
pub struct FetchGate {
  in_flight: AtomicBool,
  cursor: AtomicU32,
  exhausted: AtomicBool,
}

impl Default for FetchGate {
  fn default() -> Self {
    Self::new()
  }
}

impl FetchGate {
  pub fn new() -> Self {
    Self {
      in_flight: AtomicBool::new(false),
      cursor: AtomicU32::new(1),
      exhausted: AtomicBool::new(false),
    }
  }

  pub fn try_acquire(&self) -> Result<FetchPermit<'_>, GateClosed> {
    if self.exhausted.load(Ordering::Acquire) {
      return Err(GateClosed::Exhausted);
    }

    self
      .in_flight
      .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
      .map_err(|_| GateClosed::Busy)?;

    Ok(FetchPermit { gate: self })
  }

  pub fn is_fetching(&self) -> bool {
    self.in_flight.load(Ordering::Acquire)
  }

  /// Next page to request (1-based).
  pub fn cursor(&self) -> u32 {
    self.cursor.load(Ordering::Acquire)
  }

  pub fn is_exhausted(&self) -> bool {
    self.exhausted.load(Ordering::Acquire)
  }
}

/// Proof of holding the gate. Dropping it releases the gate.
#[derive(Debug)]
pub struct FetchPermit<'a> {
  gate: &'a FetchGate,
}

impl FetchPermit<'_> {
  pub fn cursor(&self) -> u32 {
    self.gate.cursor()
  }

  /// Move past a page that returned items.
  pub fn advance(&self) -> u32 {
    self.gate.cursor.fetch_add(1, Ordering::AcqRel) + 1
  }

  /// Latch exhaustion. There is no way to unset it.
  pub fn mark_exhausted(&self) {
    self.gate.exhausted.store(true, Ordering::Release);
  }

  /// Adopt a cursor and exhaustion flag restored from a cached snapshot.
  pub fn resume_at(&self, cursor: u32, exhausted: bool) {
    self.gate.cursor.store(cursor.max(1), Ordering::Release);
    if exhausted {
      self.mark_exhausted();
    }
  }
}

impl Drop for FetchPermit<'_> {
  fn drop(&mut self) {
    self.gate.in_flight.store(false, Ordering::Release);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_single_permit() {
    let gate = FetchGate::new();
    let permit = gate.try_acquire().unwrap();
    assert!(gate.is_fetching());
    assert_eq!(gate.try_acquire().unwrap_err(), GateClosed::Busy);
    drop(permit);
    assert!(!gate.is_fetching());
    assert!(gate.try_acquire().is_ok());
  }

  #[test]
  fn test_release_on_early_return() {
    fn fails(gate: &FetchGate) -> Result<(), &'static str> {
      let _permit = gate.try_acquire().map_err(|_| "closed")?;
      Err("network down")
    }

    let gate = FetchGate::new();
    assert!(fails(&gate).is_err());
    assert!(!gate.is_fetching());
  }

  #[test]
  fn test_cursor_advances_by_one() {
    let gate = FetchGate::new();
    assert_eq!(gate.cursor(), 1);
    let permit = gate.try_acquire().unwrap();
    assert_eq!(permit.advance(), 2);
    assert_eq!(permit.advance(), 3);
    drop(permit);
    assert_eq!(gate.cursor(), 3);
  }

  #[test]
  fn test_exhaustion_latches() {
    let gate = FetchGate::new();
    gate.try_acquire().unwrap().mark_exhausted();
    assert!(gate.is_exhausted());
    assert!(!gate.is_fetching());
    assert_eq!(gate.try_acquire().unwrap_err(), GateClosed::Exhausted);
  }

  #[test]
  fn test_resume_never_clears_exhaustion() {
    let gate = FetchGate::new();
    {
      let permit = gate.try_acquire().unwrap();
      permit.resume_at(4, false);
    }
    assert_eq!(gate.cursor(), 4);
    assert!(!gate.is_exhausted());

    gate.try_acquire().unwrap().resume_at(0, true);
    assert_eq!(gate.cursor(), 1);
    assert!(gate.is_exhausted());
  }
}
