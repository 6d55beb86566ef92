use chrono::Duration;
use color_eyre::Result;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use crate::api::types::Submission;
use crate::cache::{CacheEnvelope, Clock, EnvelopeSlot, FetchGate, FetchPermit, SharedStore};

use super::LoadOutcome;

pub const SUBMISSIONS_SLOT: EnvelopeSlot = EnvelopeSlot::new(
  "code-reviewer-submissions",
  "code-reviewer-submissions-timestamp",
);

/// Cached shape of the accumulated feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmissionsSnapshot {
  submissions: Vec<Submission>,
  has_more: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  next_page: Option<u32>,
}

impl SubmissionsSnapshot {
  fn resume_cursor(&self) -> u32 {
    match self.next_page {
      Some(page) => page,
      None if self.submissions.is_empty() => 1,
      None => 2,
    }
  }
}

#[derive(Debug, Default)]
struct FeedState {
  submissions: Vec<Submission>,
  error: Option<String>,
  /// Capture time of the envelope this feed last adopted or wrote
  merged_capture: Option<i64>,
}

/// Point-in-time copy of the feed for rendering.
#[derive(Debug, Clone, Default)]
pub struct SubmissionsView {
  pub submissions: Vec<Submission>,
  pub loading: bool,
  pub exhausted: bool,
  pub error: Option<String>,
}

/// Append-only, page-at-a-time submission history.
///
/// `load_more` may be called as often as the caller likes (every scroll
/// event); the gate turns calls that overlap an in-flight fetch, or arrive
/// after the feed ran dry, into no-ops.
pub struct SubmissionFeed {
  store: SharedStore,
  clock: Arc<dyn Clock>,
  expiry: Duration,
  gate: FetchGate,
  state: Mutex<FeedState>,
}

impl SubmissionFeed {
  pub fn new(store: SharedStore, clock: Arc<dyn Clock>, expiry: Duration) -> Self {
    Self {
      store,
      clock,
      expiry,
      gate: FetchGate::new(),
      state: Mutex::new(FeedState::default()),
    }
  }

  /// Load the next page. `fetch_page` receives the 1-based page number.
  ///
  /// 1. Skip if a fetch is in flight or the feed is exhausted
  /// 2. Adopt a fresh cached snapshot this feed hasn't merged yet
  /// 3. Otherwise drop the cache and fetch the page at the cursor
  /// 4. Empty page latches exhaustion, items are appended and cached
  ///
  /// Failures are recorded on the feed and leave the cursor where it was, so
  /// the next call retries the same page.
  pub async fn load_more<F, Fut>(&self, fetch_page: F) -> LoadOutcome
  where
    F: FnOnce(u32) -> Fut,
    Fut: Future<Output = Result<Vec<Submission>>>,
  {
    let permit = match self.gate.try_acquire() {
      Ok(permit) => permit,
      Err(closed) => {
        debug!(?closed, "load_more skipped");
        return LoadOutcome::Skipped(closed);
      }
    };

    self.lock_state().error = None;

    if let Some(count) = self.adopt_fresh_snapshot(&permit) {
      return LoadOutcome::Cached { count };
    }

    if let Err(e) = SUBMISSIONS_SLOT.clear(self.store.as_ref()) {
      warn!(error = %e, "failed to clear submissions cache");
    }

    let page = permit.cursor();
    match fetch_page(page).await {
      Ok(items) if items.is_empty() => {
        info!(page, "submission feed exhausted");
        permit.mark_exhausted();
        LoadOutcome::Exhausted
      }
      Ok(items) => {
        let count = items.len();
        let next_page = permit.advance();
        info!(page, count, "submissions page fetched");
        self.append_and_cache(items, next_page);
        LoadOutcome::Fetched { count }
      }
      Err(e) => {
        warn!(page, error = %e, "failed to fetch submissions");
        self.lock_state().error = Some(format!("Error fetching submissions: {}", e));
        LoadOutcome::Failed
      }
    }
  }

  pub fn view(&self) -> SubmissionsView {
    let state = self.lock_state();
    SubmissionsView {
      submissions: state.submissions.clone(),
      loading: self.gate.is_fetching(),
      exhausted: self.gate.is_exhausted(),
      error: state.error.clone(),
    }
  }

  pub fn len(&self) -> usize {
    self.lock_state().submissions.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn is_fetching(&self) -> bool {
    self.gate.is_fetching()
  }

  pub fn is_exhausted(&self) -> bool {
    self.gate.is_exhausted()
  }

  /// Next page that will be requested.
  pub fn cursor(&self) -> u32 {
    self.gate.cursor()
  }

  fn adopt_fresh_snapshot(&self, permit: &FetchPermit<'_>) -> Option<usize> {
    let envelope = match SUBMISSIONS_SLOT.read::<SubmissionsSnapshot>(self.store.as_ref()) {
      Ok(envelope) => envelope?,
      Err(e) => {
        warn!(error = %e, "failed to read submissions cache");
        return None;
      }
    };

    if !envelope.is_fresh(self.clock.now_millis(), self.expiry) {
      return None;
    }

    let mut state = self.lock_state();
    if state.merged_capture == Some(envelope.captured_at) {
      // Our own snapshot; its contents are already in memory
      return None;
    }

    let snapshot = envelope.payload;
    let count = snapshot.submissions.len();
    permit.resume_at(snapshot.resume_cursor(), !snapshot.has_more);
    state.submissions = snapshot.submissions;
    state.merged_capture = Some(envelope.captured_at);
    info!(count, "submissions served from cache");
    Some(count)
  }

  fn append_and_cache(&self, items: Vec<Submission>, next_page: u32) {
    let mut state = self.lock_state();
    state.submissions.extend(items);

    let captured_at = self.clock.now_millis();
    let envelope = CacheEnvelope::new(
      SubmissionsSnapshot {
        submissions: state.submissions.clone(),
        has_more: true,
        next_page: Some(next_page),
      },
      captured_at,
    );

    match SUBMISSIONS_SLOT.write(self.store.as_ref(), &envelope) {
      Ok(()) => state.merged_capture = Some(captured_at),
      Err(e) => warn!(error = %e, "failed to cache submissions"),
    }
  }

  fn lock_state(&self) -> MutexGuard<'_, FeedState> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

/// Scroll position of a list, in any consistent unit (pixels, rows).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollMetrics {
  /// Distance scrolled from the top
  pub scroll_top: u32,
  /// Visible height
  pub viewport_height: u32,
  /// Total height of the content
  pub document_height: u32,
}

/// True once the bottom of the viewport is within `threshold` of the end.
pub fn should_load_more(metrics: ScrollMetrics, threshold: u32) -> bool {
  let reach = u64::from(metrics.scroll_top)
    + u64::from(metrics.viewport_height)
    + u64::from(threshold);
  reach >= u64::from(metrics.document_height)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{GateClosed, KeyValueStore, ManualClock, MemoryStore};
  use chrono::{TimeZone, Utc};
  use color_eyre::eyre::eyre;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use tokio::sync::oneshot;

  const T0: i64 = 1_700_000_000_000;

  fn submission(id: &str) -> Submission {
    Submission {
      id: id.to_string(),
      question_name: format!("Question {}", id),
      question: String::new(),
      created_at: Utc.timestamp_millis_opt(T0).unwrap(),
    }
  }

  fn page(ids: &[&str]) -> Vec<Submission> {
    ids.iter().map(|id| submission(id)).collect()
  }

  fn ids(feed: &SubmissionFeed) -> Vec<String> {
    feed.view().submissions.into_iter().map(|s| s.id).collect()
  }

  fn feed(store: Arc<MemoryStore>, clock: Arc<ManualClock>) -> SubmissionFeed {
    SubmissionFeed::new(store, clock, Duration::minutes(5))
  }

  fn seed_cache(store: &MemoryStore, ids: &[&str], captured_at: i64) {
    let envelope = CacheEnvelope::new(
      SubmissionsSnapshot {
        submissions: page(ids),
        has_more: true,
        next_page: Some(3),
      },
      captured_at,
    );
    SUBMISSIONS_SLOT.write(store, &envelope).unwrap();
  }

  #[tokio::test]
  async fn test_fresh_cache_skips_network() {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::at(T0 + 299_999));
    seed_cache(&store, &["a", "b"], T0);
    let calls = AtomicUsize::new(0);

    let feed = feed(store, clock);
    let outcome = feed
      .load_more(|_| async {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(page(&["x"]))
      })
      .await;

    assert_eq!(outcome, LoadOutcome::Cached { count: 2 });
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(ids(&feed), vec!["a", "b"]);
    assert_eq!(feed.cursor(), 3);
    assert!(!feed.is_fetching());
  }

  #[tokio::test]
  async fn test_cache_expires_at_exactly_window() {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::at(T0 + 300_000));
    seed_cache(&store, &["a", "b"], T0);

    let feed = feed(store.clone(), clock);
    let requested = Mutex::new(Vec::new());
    let outcome = feed
      .load_more(|p| {
        requested.lock().unwrap().push(p);
        async { Ok(page(&["x"])) }
      })
      .await;

    assert_eq!(outcome, LoadOutcome::Fetched { count: 1 });
    assert_eq!(*requested.lock().unwrap(), vec![1]);
    assert_eq!(ids(&feed), vec!["x"]);
  }

  #[tokio::test]
  async fn test_pages_append_in_fetch_order() {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::at(T0));
    let feed = feed(store.clone(), clock.clone());

    let pages = [page(&["a", "b"]), page(&["c"]), page(&["b", "d"])];
    for (i, items) in pages.iter().enumerate() {
      clock.advance(1_000);
      let expected_page = i as u32 + 1;
      let outcome = feed
        .load_more(|p| {
          assert_eq!(p, expected_page);
          let items = items.clone();
          async move { Ok(items) }
        })
        .await;
      assert!(matches!(outcome, LoadOutcome::Fetched { .. }));
    }

    // Duplicates across pages are kept; the client never dedups
    assert_eq!(ids(&feed), vec!["a", "b", "c", "b", "d"]);
    assert_eq!(feed.cursor(), 4);

    let cached: CacheEnvelope<SubmissionsSnapshot> =
      SUBMISSIONS_SLOT.read(store.as_ref()).unwrap().unwrap();
    assert_eq!(cached.payload.submissions.len(), 5);
    assert!(cached.payload.has_more);
    assert_eq!(cached.payload.next_page, Some(4));
    assert_eq!(cached.captured_at, T0 + 3_000);
  }

  #[tokio::test]
  async fn test_exhaustion_latches() {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::at(T0));
    let feed = feed(store.clone(), clock);
    let calls = AtomicUsize::new(0);

    feed.load_more(|_| async { Ok(page(&["a"])) }).await;
    let outcome = feed
      .load_more(|_| async {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(Vec::new())
      })
      .await;
    assert_eq!(outcome, LoadOutcome::Exhausted);
    assert!(feed.is_exhausted());
    assert_eq!(feed.cursor(), 2);
    // No envelope is written for an empty page
    assert_eq!(store.get("code-reviewer-submissions").unwrap(), None);

    for _ in 0..3 {
      let outcome = feed
        .load_more(|_| async {
          calls.fetch_add(1, Ordering::SeqCst);
          Ok(page(&["z"]))
        })
        .await;
      assert_eq!(outcome, LoadOutcome::Skipped(GateClosed::Exhausted));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(ids(&feed), vec!["a"]);
  }

  #[tokio::test]
  async fn test_reentrant_call_is_noop() {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::at(T0));
    let feed = Arc::new(feed(store, clock));
    let calls = Arc::new(AtomicUsize::new(0));
    let (release_tx, release_rx) = oneshot::channel::<()>();

    let first = {
      let feed = feed.clone();
      let calls = calls.clone();
      tokio::spawn(async move {
        feed
          .load_more(|_| async move {
            calls.fetch_add(1, Ordering::SeqCst);
            release_rx.await.ok();
            Ok(page(&["a"]))
          })
          .await
      })
    };

    while !feed.is_fetching() {
      tokio::task::yield_now().await;
    }

    for _ in 0..5 {
      let calls = calls.clone();
      let outcome = feed
        .load_more(|_| async move {
          calls.fetch_add(1, Ordering::SeqCst);
          Ok(page(&["dup"]))
        })
        .await;
      assert_eq!(outcome, LoadOutcome::Skipped(GateClosed::Busy));
    }

    release_tx.send(()).unwrap();
    assert_eq!(first.await.unwrap(), LoadOutcome::Fetched { count: 1 });
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(!feed.is_fetching());
    assert_eq!(ids(&feed), vec!["a"]);
  }

  #[tokio::test]
  async fn test_failure_releases_and_retries_same_page() {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::at(T0));
    let feed = feed(store, clock.clone());

    feed.load_more(|_| async { Ok(page(&["a"])) }).await;

    let outcome = feed
      .load_more(|_| async { Err(eyre!("connection reset")) })
      .await;
    assert_eq!(outcome, LoadOutcome::Failed);
    assert!(!feed.is_fetching());
    assert!(!feed.is_exhausted());
    assert_eq!(feed.cursor(), 2);
    assert!(feed.view().error.unwrap().contains("connection reset"));

    clock.advance(1_000);
    let outcome = feed
      .load_more(|p| {
        assert_eq!(p, 2);
        async { Ok(page(&["b"])) }
      })
      .await;
    assert_eq!(outcome, LoadOutcome::Fetched { count: 1 });
    assert_eq!(feed.view().error, None);
    assert_eq!(ids(&feed), vec!["a", "b"]);
  }

  #[tokio::test]
  async fn test_own_snapshot_does_not_block_paging() {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::at(T0));
    let feed = feed(store, clock.clone());

    feed.load_more(|_| async { Ok(page(&["a"])) }).await;
    clock.advance(10_000);
    let outcome = feed.load_more(|_| async { Ok(page(&["b"])) }).await;
    assert_eq!(outcome, LoadOutcome::Fetched { count: 1 });
  }

  #[tokio::test]
  async fn test_corrupt_cache_is_a_miss() {
    let store = Arc::new(MemoryStore::new());
    store.set("code-reviewer-submissions", "{\"submissions\": 7").unwrap();
    store
      .set("code-reviewer-submissions-timestamp", &T0.to_string())
      .unwrap();
    let clock = Arc::new(ManualClock::at(T0 + 1));

    let feed = feed(store, clock);
    let outcome = feed.load_more(|_| async { Ok(page(&["a"])) }).await;
    assert_eq!(outcome, LoadOutcome::Fetched { count: 1 });
  }

  #[test]
  fn test_snapshot_without_next_page() {
    let json = r#"{"submissions": [], "hasMore": true}"#;
    let snapshot: SubmissionsSnapshot = serde_json::from_str(json).unwrap();
    assert_eq!(snapshot.resume_cursor(), 1);

    let snapshot = SubmissionsSnapshot {
      submissions: page(&["a"]),
      has_more: false,
      next_page: None,
    };
    assert_eq!(snapshot.resume_cursor(), 2);
  }

  #[test]
  fn test_scroll_trigger_threshold() {
    let near_bottom = ScrollMetrics {
      scroll_top: 400,
      viewport_height: 800,
      document_height: 1290,
    };
    assert!(should_load_more(near_bottom, 100));

    let far = ScrollMetrics {
      document_height: 1400,
      ..near_bottom
    };
    assert!(!should_load_more(far, 100));

    let exact = ScrollMetrics {
      document_height: 1300,
      ..near_bottom
    };
    assert!(should_load_more(exact, 100));
  }
}
