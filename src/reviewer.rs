//! Backend client with the job and submission caches wired in.

use color_eyre::Result;
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::types::{CompileOutcome, Question, Review, SubmissionDetail, SubmitRequest};
use crate::api::ApiClient;
use crate::cache::{Clock, NoopStore, SharedStore, SqliteStore, SystemClock};
use crate::config::Config;
use crate::feed::{JobListing, LoadOutcome, SubmissionFeed, SUBMISSIONS_SLOT};
use crate::session::Session;

/// Entry point for everything that talks to the backend.
///
/// Listings are built fresh per view (`job_listing`, `submission_feed`) so a
/// view that is re-opened starts from the cache again, like a page reload.
#[derive(Clone)]
pub struct Reviewer {
  api: ApiClient,
  session: Session,
  cache: SharedStore,
  clock: Arc<dyn Clock>,
  config: Config,
}

impl Reviewer {
  pub fn new(config: Config) -> Result<Self> {
    let api = ApiClient::new(&config.backend)?;
    let store: SharedStore = Arc::new(SqliteStore::open()?);
    let cache: SharedStore = if config.cache.enabled {
      store.clone()
    } else {
      Arc::new(NoopStore)
    };

    Ok(Self::with_parts(api, store, cache, Arc::new(SystemClock), config))
  }

  /// `store` keeps the login token, `cache` the listings.
  pub fn with_parts(
    api: ApiClient,
    store: SharedStore,
    cache: SharedStore,
    clock: Arc<dyn Clock>,
    config: Config,
  ) -> Self {
    Self {
      api,
      session: Session::new(store),
      cache,
      clock,
      config,
    }
  }

  pub fn session(&self) -> &Session {
    &self.session
  }

  pub fn api(&self) -> &ApiClient {
    &self.api
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  pub fn job_listing(&self) -> JobListing {
    JobListing::new(
      self.cache.clone(),
      self.clock.clone(),
      self.config.cache.expiry(),
      self.config.jobs.page_size,
    )
  }

  pub fn submission_feed(&self) -> SubmissionFeed {
    SubmissionFeed::new(
      self.cache.clone(),
      self.clock.clone(),
      self.config.cache.expiry(),
    )
  }

  pub async fn load_jobs(&self, listing: &JobListing) -> LoadOutcome {
    listing
      .load(|| {
        let api = self.api.clone();
        async move { Ok(api.jobs().await?) }
      })
      .await
  }

  pub async fn load_more_submissions(&self, feed: &SubmissionFeed) -> LoadOutcome {
    feed
      .load_more(|page| {
        let api = self.api.clone();
        let session = self.session.clone();
        async move {
          let token = session.require_token()?;
          Ok(api.submissions_page(&token, page).await?)
        }
      })
      .await
  }

  pub async fn job_question(&self, job_id: &str) -> Result<Question> {
    let token = self.session.token()?;
    Ok(self.api.job_question(token.as_deref(), job_id).await?)
  }

  pub async fn random_question(&self) -> Result<Question> {
    let token = self.session.token()?;
    Ok(self.api.random_question(token.as_deref()).await?)
  }

  pub async fn submission(&self, id: &str) -> Result<SubmissionDetail> {
    let token = self.session.require_token()?;
    Ok(self.api.submission(&token, id).await?)
  }

  pub async fn compile(&self, code: &str, language: &str) -> Result<CompileOutcome> {
    Ok(self.api.compile(code, language).await?)
  }

  /// Save code for review. A saved submission makes the cached feed stale,
  /// so the submission cache is dropped.
  ///
  /// Once the backend has saved it the review is returned even if the cache
  /// could not be cleared.
  pub async fn submit(&self, request: &SubmitRequest) -> Result<Review> {
    let token = self.session.require_token()?;
    let review = self.api.submit(&token, request).await?;
    if let Err(e) = self.invalidate_submissions() {
      warn!(error = %e, "failed to clear submissions cache after submit");
    }
    info!(question = %request.question_name, "submission saved");
    Ok(review)
  }

  pub fn invalidate_submissions(&self) -> Result<()> {
    SUBMISSIONS_SLOT.clear(self.cache.as_ref())
  }
}
