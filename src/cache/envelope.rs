//! Cache envelopes: a payload plus the time it was captured.

use chrono::{DateTime, Duration, Utc};
use color_eyre::Result;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use super::store::KeyValueStore;

/// Source of the current time, injectable for tests.
pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;

  fn now_millis(&self) -> i64 {
    self.now().timestamp_millis()
  }
}

/// Wall clock.
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> {
    Utc::now()
  }
}

/// A cached value and the moment it was written.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEnvelope<T> {
  pub payload: T,
  /// Milliseconds since the Unix epoch
  pub captured_at: i64,
}

impl<T> CacheEnvelope<T> {
  pub fn new(payload: T, captured_at: i64) -> Self {
    Self {
      payload,
      captured_at,
    }
  }

  /// An envelope is fresh while strictly less than `expiry` has elapsed.
  pub fn is_fresh(&self, now_millis: i64, expiry: Duration) -> bool {
    now_millis - self.captured_at < expiry.num_milliseconds()
  }
}

/// The pair of store keys an envelope is persisted under.
///
/// The payload is stored as JSON under `key`, the capture time as a decimal
/// millisecond string under `timestamp_key`.
#[derive(Debug, Clone, Copy)]
pub struct EnvelopeSlot {
  pub key: &'static str,
  pub timestamp_key: &'static str,
}

impl EnvelopeSlot {
  pub const fn new(key: &'static str, timestamp_key: &'static str) -> Self {
    Self { key, timestamp_key }
  }

  /// Read the envelope. Missing or unparseable entries are a miss; corrupt
  /// entries are also cleared so the next write starts clean.
  pub fn read<T: DeserializeOwned>(
    &self,
    store: &dyn KeyValueStore,
  ) -> Result<Option<CacheEnvelope<T>>> {
    let (Some(raw_payload), Some(raw_timestamp)) =
      (store.get(self.key)?, store.get(self.timestamp_key)?)
    else {
      debug!(key = self.key, "cache miss");
      return Ok(None);
    };

    let captured_at = match raw_timestamp.trim().parse::<i64>() {
      Ok(ts) => ts,
      Err(e) => {
        warn!(key = self.timestamp_key, error = %e, "corrupt cache timestamp, discarding");
        self.clear(store)?;
        return Ok(None);
      }
    };

    match serde_json::from_str::<T>(&raw_payload) {
      Ok(payload) => Ok(Some(CacheEnvelope::new(payload, captured_at))),
      Err(e) => {
        warn!(key = self.key, error = %e, "corrupt cache payload, discarding");
        self.clear(store)?;
        Ok(None)
      }
    }
  }

  pub fn write<T: Serialize>(
    &self,
    store: &dyn KeyValueStore,
    envelope: &CacheEnvelope<T>,
  ) -> Result<()> {
    let json = serde_json::to_string(&envelope.payload)?;
    store.set(self.key, &json)?;
    store.set(self.timestamp_key, &envelope.captured_at.to_string())?;
    debug!(key = self.key, captured_at = envelope.captured_at, "cache written");
    Ok(())
  }

  pub fn clear(&self, store: &dyn KeyValueStore) -> Result<()> {
    store.remove(self.key)?;
    store.remove(self.timestamp_key)?;
    Ok(())
  }
}

#[cfg(test)]
pub(crate) mod testing {
  use super::*;
  use std::sync::atomic::{AtomicI64, Ordering};

  /// Clock that only moves when told to.
  pub struct ManualClock {
    millis: AtomicI64,
  }

  impl ManualClock {
    pub fn at(millis: i64) -> Self {
      Self {
        millis: AtomicI64::new(millis),
      }
    }

    pub fn advance(&self, millis: i64) {
      self.millis.fetch_add(millis, Ordering::SeqCst);
    }
  }

  impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
      DateTime::from_timestamp_millis(self.now_millis()).unwrap_or_default()
    }

    fn now_millis(&self) -> i64 {
      self.millis.load(Ordering::SeqCst)
    }
  }
}
