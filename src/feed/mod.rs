//! Cached, incrementally loaded listings: the paged job board and the
//! infinitely scrolling submission history.
//!
//! Both follow the same flow: the [`FetchGate`](crate::cache::FetchGate)
//! admits a load, a fresh envelope in the store short-circuits it, otherwise
//! the fetcher runs and the merged result is written back.

mod jobs;
mod submissions;

pub use jobs::{JobListing, JobsView, Pager, JOBS_SLOT};
pub use submissions::{should_load_more, ScrollMetrics, SubmissionFeed, SubmissionsView, SUBMISSIONS_SLOT};

use crate::cache::GateClosed;

/// What a load attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
  /// The gate refused; nothing happened
  Skipped(GateClosed),
  /// A fresh cached snapshot was adopted without touching the network
  Cached { count: usize },
  /// A fetch returned `count` new items
  Fetched { count: usize },
  /// A fetch returned nothing; the feed is now exhausted
  Exhausted,
  /// The fetch failed; the error is exposed on the feed
  Failed,
}
