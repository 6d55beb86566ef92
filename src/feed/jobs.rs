use chrono::Duration;
use color_eyre::Result;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use crate::api::types::Job;
use crate::cache::{CacheEnvelope, Clock, EnvelopeSlot, FetchGate, SharedStore};

use super::LoadOutcome;

pub const JOBS_SLOT: EnvelopeSlot =
  EnvelopeSlot::new("code-reviewer-jobs", "code-reviewer-jobs-timestamp");

/// Cached shape of the job list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobsSnapshot {
  jobs: Vec<Job>,
  total_pages: usize,
}

#[derive(Debug, Default)]
struct JobsState {
  jobs: Vec<Job>,
  total_pages: usize,
  loaded: bool,
  error: Option<String>,
}

/// Point-in-time copy of the listing for rendering.
#[derive(Debug, Clone, Default)]
pub struct JobsView {
  pub jobs: Vec<Job>,
  pub total_pages: usize,
  pub loading: bool,
  pub error: Option<String>,
}

/// Job board with a cache-first load and client-side pagination.
///
/// The whole list is fetched in one request; pages are slices of it.
pub struct JobListing {
  store: SharedStore,
  clock: Arc<dyn Clock>,
  expiry: Duration,
  page_size: usize,
  gate: FetchGate,
  state: Mutex<JobsState>,
}

impl JobListing {
  pub fn new(store: SharedStore, clock: Arc<dyn Clock>, expiry: Duration, page_size: usize) -> Self {
    Self {
      store,
      clock,
      expiry,
      page_size: page_size.max(1),
      gate: FetchGate::new(),
      state: Mutex::new(JobsState::default()),
    }
  }

  pub fn page_size(&self) -> usize {
    self.page_size
  }

  /// Load the jobs, from the cache while it is fresh, otherwise via `fetch_jobs`.
  ///
  /// A call while another load is in flight does nothing.
  pub async fn load<F, Fut>(&self, fetch_jobs: F) -> LoadOutcome
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Vec<Job>>>,
  {
    let _permit = match self.gate.try_acquire() {
      Ok(permit) => permit,
      Err(closed) => return LoadOutcome::Skipped(closed),
    };

    self.lock_state().error = None;

    if let Some(snapshot) = self.read_fresh() {
      let count = snapshot.jobs.len();
      // The page size may have changed since the snapshot was written
      let total_pages = total_pages(count, self.page_size);
      if total_pages != snapshot.total_pages {
        debug!(cached = snapshot.total_pages, total_pages, "page count recomputed");
      }
      info!(count, "jobs served from cache");
      self.adopt(snapshot.jobs, total_pages);
      return LoadOutcome::Cached { count };
    }

    match fetch_jobs().await {
      Ok(jobs) => {
        let count = jobs.len();
        let total_pages = total_pages(count, self.page_size);
        info!(count, total_pages, "jobs fetched");

        let snapshot = JobsSnapshot {
          jobs: jobs.clone(),
          total_pages,
        };
        let envelope = CacheEnvelope::new(snapshot, self.clock.now_millis());
        if let Err(e) = JOBS_SLOT.write(self.store.as_ref(), &envelope) {
          warn!(error = %e, "failed to cache jobs");
        }

        self.adopt(jobs, total_pages);
        LoadOutcome::Fetched { count }
      }
      Err(e) => {
        warn!(error = %e, "failed to fetch jobs");
        let mut state = self.lock_state();
        state.loaded = true;
        state.error = Some(format!("Error fetching jobs: {}", e));
        LoadOutcome::Failed
      }
    }
  }

  /// Drop the cached listing so the next load goes to the network.
  pub fn invalidate(&self) -> Result<()> {
    JOBS_SLOT.clear(self.store.as_ref())
  }

  pub fn view(&self) -> JobsView {
    let state = self.lock_state();
    JobsView {
      jobs: state.jobs.clone(),
      total_pages: state.total_pages,
      loading: !state.loaded || self.gate.is_fetching(),
      error: state.error.clone(),
    }
  }

  fn read_fresh(&self) -> Option<JobsSnapshot> {
    let envelope = match JOBS_SLOT.read::<JobsSnapshot>(self.store.as_ref()) {
      Ok(envelope) => envelope?,
      Err(e) => {
        warn!(error = %e, "failed to read jobs cache");
        return None;
      }
    };

    if envelope.is_fresh(self.clock.now_millis(), self.expiry) {
      Some(envelope.payload)
    } else {
      if let Err(e) = JOBS_SLOT.clear(self.store.as_ref()) {
        warn!(error = %e, "failed to clear expired jobs cache");
      }
      None
    }
  }

  fn adopt(&self, jobs: Vec<Job>, total_pages: usize) {
    let mut state = self.lock_state();
    state.jobs = jobs;
    state.total_pages = total_pages;
    state.loaded = true;
  }

  fn lock_state(&self) -> MutexGuard<'_, JobsState> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

/// Number of pages needed to show `count` items `page_size` at a time.
pub fn total_pages(count: usize, page_size: usize) -> usize {
  count.div_ceil(page_size.max(1))
}

/// Position within a paged list. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pager {
  page: usize,
  total_pages: usize,
  page_size: usize,
}

impl Pager {
  pub fn new(total_pages: usize, page_size: usize) -> Self {
    Self {
      page: 1,
      total_pages,
      page_size: page_size.max(1),
    }
  }

  pub fn page(&self) -> usize {
    self.page
  }

  pub fn total_pages(&self) -> usize {
    self.total_pages
  }

  /// Keep the current page when the list is replaced, within the new bounds.
  pub fn set_total_pages(&mut self, total_pages: usize) {
    self.total_pages = total_pages;
    self.page = self.page.clamp(1, self.last_page());
  }

  pub fn has_prev(&self) -> bool {
    self.page > 1
  }

  pub fn has_next(&self) -> bool {
    self.page < self.total_pages
  }

  pub fn first(&mut self) {
    self.page = 1;
  }

  pub fn last(&mut self) {
    self.page = self.last_page();
  }

  pub fn prev(&mut self) {
    if self.has_prev() {
      self.page -= 1;
    }
  }

  pub fn next(&mut self) {
    if self.has_next() {
      self.page += 1;
    }
  }

  pub fn go_to(&mut self, page: usize) {
    self.page = page.clamp(1, self.last_page());
  }

  /// The items on the current page.
  pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
    let start = (self.page - 1).saturating_mul(self.page_size);
    if start >= items.len() {
      return &[];
    }
    let end = start.saturating_add(self.page_size).min(items.len());
    &items[start..end]
  }

  fn last_page(&self) -> usize {
    self.total_pages.max(1)
  }
}
