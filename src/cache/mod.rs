//! Client-side caching primitives shared by the job listing and submission feed.
//!
//! - a persisted key-value store (SQLite by default) with last-writer-wins semantics
//! - envelopes that pair a payload with its capture time to decide freshness
//! - a fetch gate that admits one fetch at a time and tracks pagination

mod envelope;
mod gate;
mod store;

pub use envelope::{CacheEnvelope, Clock, EnvelopeSlot, SystemClock};
pub use gate::{FetchGate, FetchPermit, GateClosed};
pub use store::{KeyValueStore, MemoryStore, NoopStore, SharedStore, SqliteStore};

#[cfg(test)]
pub(crate) use envelope::testing::ManualClock;
