use crate::api::types::SubmissionDetail;
use crate::commands::{self, Command};
use crate::event::{Event, EventHandler, ViewId};
use crate::feed::{should_load_more, JobListing, Pager, ScrollMetrics, SubmissionFeed};
use crate::reviewer::Reviewer;
use crate::ui;
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;
use url::Url;

/// Input mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
  Normal,
  Command,
}

/// View state - each variant owns its data
pub enum ViewState {
  // Root views (set via : commands)
  Jobs {
    listing: Arc<JobListing>,
    pager: Pager,
    /// Index within the current page
    selected: usize,
  },
  Submissions {
    feed: Arc<SubmissionFeed>,
    selected: usize,
    /// First visible row
    offset: usize,
  },

  // Detail views (pushed via Enter)
  Detail {
    title: String,
    body: String,
    scroll: u16,
  },
}

pub struct View {
  pub id: ViewId,
  pub state: ViewState,
}

/// Main application state
pub struct App {
  /// Navigation stack - root is always at index 0
  view_stack: Vec<View>,
  next_view_id: ViewId,

  /// Current input mode
  mode: Mode,

  /// Command input buffer (after pressing :)
  command_input: String,

  /// Selected autocomplete suggestion index
  selected_suggestion: usize,

  reviewer: Reviewer,
  logged_in: bool,

  /// Event sender for async tasks
  event_tx: mpsc::UnboundedSender<Event>,

  /// Most recent background failure, shown in the footer
  last_error: Option<String>,

  /// Rows available to list contents, refreshed every frame
  list_height: usize,

  /// Whether to quit
  should_quit: bool,
}

impl App {
  pub fn new(reviewer: Reviewer) -> Result<Self> {
    let (tx, _rx) = mpsc::unbounded_channel();
    let logged_in = reviewer.session().is_logged_in()?;

    Ok(Self {
      view_stack: Vec::new(),
      next_view_id: 0,
      mode: Mode::Normal,
      command_input: String::new(),
      selected_suggestion: 0,
      reviewer,
      logged_in,
      event_tx: tx,
      last_error: None,
      list_height: 0,
      should_quit: false,
    })
  }

  pub async fn run(&mut self) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    // Create event handler
    let mut events = EventHandler::new(Duration::from_millis(250));
    self.event_tx = events.sender();

    // Initial data load
    self.open_jobs();

    let result = self.event_loop(&mut terminal, &mut events).await;

    // Cleanup terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
  }

  async fn event_loop(
    &mut self,
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    events: &mut EventHandler,
  ) -> Result<()> {
    while !self.should_quit {
      // Header, footer and the list block's borders
      self.list_height = usize::from(terminal.size()?.height.saturating_sub(4));

      terminal.draw(|frame| ui::draw(frame, self))?;

      if let Some(event) = events.next().await {
        self.handle_event(event);
      }
    }
    Ok(())
  }

  fn next_id(&mut self) -> ViewId {
    self.next_view_id += 1;
    self.next_view_id
  }

  fn open_jobs(&mut self) {
    let listing = Arc::new(self.reviewer.job_listing());
    let id = self.next_id();
    self.view_stack = vec![View {
      id,
      state: ViewState::Jobs {
        listing: listing.clone(),
        pager: Pager::new(0, listing.page_size()),
        selected: 0,
      },
    }];
    self.spawn_jobs_load(id, listing);
  }

  fn open_submissions(&mut self) {
    // A new feed per visit: it starts from the cache and its own page 1
    let feed = Arc::new(self.reviewer.submission_feed());
    let id = self.next_id();
    self.view_stack = vec![View {
      id,
      state: ViewState::Submissions {
        feed: feed.clone(),
        selected: 0,
        offset: 0,
      },
    }];
    self.spawn_load_more(id, feed);
  }

  fn spawn_jobs_load(&self, id: ViewId, listing: Arc<JobListing>) {
    let reviewer = self.reviewer.clone();
    let tx = self.event_tx.clone();

    tokio::spawn(async move {
      let outcome = reviewer.load_jobs(&listing).await;
      debug!(?outcome, "jobs load finished");
      let _ = tx.send(Event::Loaded(id));
    });
  }

  fn spawn_load_more(&self, id: ViewId, feed: Arc<SubmissionFeed>) {
    let reviewer = self.reviewer.clone();
    let tx = self.event_tx.clone();

    tokio::spawn(async move {
      let outcome = reviewer.load_more_submissions(&feed).await;
      debug!(?outcome, "submissions load finished");
      let _ = tx.send(Event::Loaded(id));
    });
  }

  fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => self.handle_key(key),
      Event::Tick | Event::Resize => {} // UI refresh happens automatically
      Event::Loaded(id) => self.handle_loaded(id),
      Event::Detail { from, title, body } => {
        // The user may have navigated away while the request was in flight
        if self.view_stack.last().map(|v| v.id) == Some(from) {
          let id = self.next_id();
          self.view_stack.push(View {
            id,
            state: ViewState::Detail {
              title,
              body,
              scroll: 0,
            },
          });
        }
      }
      Event::Error(msg) => {
        self.last_error = Some(msg);
      }
    }
  }

  fn handle_loaded(&mut self, id: ViewId) {
    let list_height = self.list_height.max(1);
    let threshold = self.reviewer.config().submissions.scroll_threshold;

    let Some(view) = self.view_stack.iter_mut().find(|v| v.id == id) else {
      return;
    };
    let mut to_load = None;

    match &mut view.state {
      ViewState::Jobs { listing, pager, .. } => {
        pager.set_total_pages(listing.view().total_pages);
      }
      ViewState::Submissions { feed, offset, .. } => {
        // A page shorter than the viewport leaves nothing to scroll, so keep
        // loading until the list fills it. A failure waits for the next move.
        let idle = !feed.is_fetching() && !feed.is_exhausted();
        let failed = feed.view().error.is_some();
        if idle && !failed && near_end(*offset, list_height, feed.len(), threshold) {
          debug!(cursor = feed.cursor(), "feed shorter than the viewport, loading more");
          to_load = Some(feed.clone());
        }
      }
      ViewState::Detail { .. } => {}
    }

    if let Some(feed) = to_load {
      self.spawn_load_more(id, feed);
    }
  }

  fn handle_key(&mut self, key: KeyEvent) {
    match self.mode {
      Mode::Normal => self.handle_normal_mode_key(key),
      Mode::Command => self.handle_command_mode_key(key),
    }
  }

  fn handle_normal_mode_key(&mut self, key: KeyEvent) {
    match key.code {
      KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
        self.should_quit = true;
      }
      KeyCode::Char('q') => {
        if self.view_stack.len() > 1 {
          self.view_stack.pop();
        } else {
          self.should_quit = true;
        }
      }
      KeyCode::Esc => {
        if self.view_stack.len() > 1 {
          self.view_stack.pop();
        }
      }

      // Navigation
      KeyCode::Up | KeyCode::Char('k') => self.move_selection(-1),
      KeyCode::Down | KeyCode::Char('j') => self.move_selection(1),
      KeyCode::Left | KeyCode::Char('h') => self.change_page(Pager::prev),
      KeyCode::Right | KeyCode::Char('l') => self.change_page(Pager::next),
      KeyCode::Char('g') => self.change_page(Pager::first),
      KeyCode::Char('G') => self.change_page(Pager::last),
      KeyCode::Enter => self.enter_selected(),

      KeyCode::Char(':') => {
        self.mode = Mode::Command;
        self.command_input.clear();
      }

      _ => {}
    }
  }

  fn handle_command_mode_key(&mut self, key: KeyEvent) {
    match key.code {
      KeyCode::Esc => {
        self.mode = Mode::Normal;
        self.command_input.clear();
        self.selected_suggestion = 0;
      }
      KeyCode::Enter => {
        self.execute_command();
        self.mode = Mode::Normal;
        self.selected_suggestion = 0;
      }
      KeyCode::Tab | KeyCode::Down => {
        let suggestions = commands::get_suggestions(&self.command_input);
        if !suggestions.is_empty() {
          self.selected_suggestion = (self.selected_suggestion + 1) % suggestions.len();
        }
      }
      KeyCode::BackTab | KeyCode::Up => {
        let suggestions = commands::get_suggestions(&self.command_input);
        if !suggestions.is_empty() {
          self.selected_suggestion = if self.selected_suggestion == 0 {
            suggestions.len() - 1
          } else {
            self.selected_suggestion - 1
          };
        }
      }
      KeyCode::Backspace => {
        self.command_input.pop();
        self.selected_suggestion = 0;
      }
      KeyCode::Char(c) => {
        self.command_input.push(c);
        self.selected_suggestion = 0;
      }
      _ => {}
    }
  }

  fn execute_command(&mut self) {
    // Either the highlighted suggestion or the raw input
    let suggestions = commands::get_suggestions(&self.command_input);
    let cmd = match suggestions.get(self.selected_suggestion) {
      Some(command) => command.name.to_string(),
      None => self.command_input.trim().to_lowercase(),
    };

    match cmd.as_str() {
      "jobs" => self.open_jobs(),
      "submissions" => self.open_submissions(),
      "random" => self.show_random_question(),
      "refresh" => self.refresh(),
      "quit" => self.should_quit = true,
      _ => {}
    }
    self.command_input.clear();
  }

  fn refresh(&mut self) {
    let root_is_jobs = match self.view_stack.first().map(|v| &v.state) {
      Some(ViewState::Jobs { .. }) => true,
      Some(ViewState::Submissions { .. }) => false,
      _ => return,
    };

    let invalidated = match self.view_stack.first().map(|v| &v.state) {
      Some(ViewState::Jobs { listing, .. }) => listing.invalidate(),
      _ => self.reviewer.invalidate_submissions(),
    };
    if let Err(e) = invalidated {
      self.last_error = Some(e.to_string());
      return;
    }

    if root_is_jobs {
      self.open_jobs();
    } else {
      self.open_submissions();
    }
  }

  fn change_page(&mut self, step: fn(&mut Pager)) {
    if let Some(View {
      state: ViewState::Jobs {
        pager, selected, ..
      },
      ..
    }) = self.view_stack.last_mut()
    {
      step(pager);
      *selected = 0;
    }
  }

  fn move_selection(&mut self, delta: isize) {
    let list_height = self.list_height.max(1);
    let threshold = self.reviewer.config().submissions.scroll_threshold;

    let Some(view) = self.view_stack.last_mut() else {
      return;
    };
    let id = view.id;
    let mut to_load = None;

    match &mut view.state {
      ViewState::Jobs {
        listing,
        pager,
        selected,
      } => {
        let len = pager.slice(&listing.view().jobs).len();
        if len > 0 {
          *selected = (*selected as isize + delta).rem_euclid(len as isize) as usize;
        }
      }
      ViewState::Submissions {
        feed,
        selected,
        offset,
      } => {
        let len = feed.len();
        if !feed.is_empty() {
          *selected = selected.saturating_add_signed(delta).min(len - 1);
        }
        *offset = scroll_offset(*selected, *offset, list_height);

        // Every movement counts as a scroll event. The gate would turn
        // calls on a busy or exhausted feed into no-ops anyway; skip the task
        let idle = !feed.is_fetching() && !feed.is_exhausted();
        if idle && near_end(*offset, list_height, len, threshold) {
          debug!(cursor = feed.cursor(), "near the end of the feed, loading more");
          to_load = Some(feed.clone());
        }
      }
      ViewState::Detail { scroll, .. } => {
        *scroll = scroll.saturating_add_signed(delta as i16);
      }
    }

    if let Some(feed) = to_load {
      self.spawn_load_more(id, feed);
    }
  }

  fn enter_selected(&mut self) {
    let Some(view) = self.view_stack.last() else {
      return;
    };
    let from = view.id;
    let reviewer = self.reviewer.clone();
    let tx = self.event_tx.clone();

    match &view.state {
      ViewState::Jobs {
        listing,
        pager,
        selected,
      } => {
        let jobs = listing.view().jobs;
        let Some(job) = pager.slice(&jobs).get(*selected).cloned() else {
          return;
        };

        tokio::spawn(async move {
          let event = match reviewer.job_question(&job.id).await {
            Ok(question) => Event::Detail {
              from,
              title: question.name,
              body: question.question,
            },
            Err(e) => Event::Error(format!("Failed to fetch question: {}", e)),
          };
          let _ = tx.send(event);
        });
      }
      ViewState::Submissions { feed, selected, .. } => {
        let Some(submission) = feed.view().submissions.get(*selected).cloned() else {
          return;
        };

        tokio::spawn(async move {
          let event = match reviewer.submission(&submission.id).await {
            Ok(detail) => Event::Detail {
              from,
              title: detail.question_name.clone(),
              body: submission_body(&detail),
            },
            Err(e) => Event::Error(format!("Error fetching submission details: {}", e)),
          };
          let _ = tx.send(event);
        });
      }
      ViewState::Detail { .. } => {}
    }
  }

  fn show_random_question(&mut self) {
    let Some(from) = self.view_stack.last().map(|v| v.id) else {
      return;
    };
    let reviewer = self.reviewer.clone();
    let tx = self.event_tx.clone();

    tokio::spawn(async move {
      let event = match reviewer.random_question().await {
        Ok(question) => Event::Detail {
          from,
          title: question.name,
          body: question.question,
        },
        Err(e) => Event::Error(format!("Failed to fetch question: {}", e)),
      };
      let _ = tx.send(event);
    });
  }

  // Accessors for UI rendering
  pub fn current_view(&self) -> Option<&View> {
    self.view_stack.last()
  }

  pub fn mode(&self) -> &Mode {
    &self.mode
  }

  pub fn command_input(&self) -> &str {
    &self.command_input
  }

  pub fn backend_url(&self) -> &Url {
    self.reviewer.api().base_url()
  }

  pub fn logged_in(&self) -> bool {
    self.logged_in
  }

  pub fn last_error(&self) -> Option<&str> {
    self.last_error.as_deref()
  }

  pub fn view_breadcrumb(&self) -> Vec<String> {
    self
      .view_stack
      .iter()
      .map(|v| v.state.breadcrumb_label())
      .collect()
  }

  pub fn autocomplete_suggestions(&self) -> Vec<&'static Command> {
    commands::get_suggestions(&self.command_input)
  }

  pub fn selected_suggestion(&self) -> usize {
    self.selected_suggestion
  }
}

impl ViewState {
  /// Get the label for this view in the breadcrumb
  fn breadcrumb_label(&self) -> String {
    match self {
      ViewState::Jobs { pager, .. } => {
        format!("Jobs [{}/{}]", pager.page(), pager.total_pages().max(1))
      }
      ViewState::Submissions { .. } => "Submissions".to_string(),
      ViewState::Detail { title, .. } => title.clone(),
    }
  }
}

/// Keep `selected` inside a window of `height` rows starting at `offset`.
fn scroll_offset(selected: usize, offset: usize, height: usize) -> usize {
  if selected < offset {
    selected
  } else if selected >= offset + height {
    selected + 1 - height
  } else {
    offset
  }
}

/// Scroll trigger in rows: `offset` is the first visible row, `height` the
/// visible rows and `len` the loaded items.
fn near_end(offset: usize, height: usize, len: usize, threshold: u32) -> bool {
  let rows = |n: usize| u32::try_from(n).unwrap_or(u32::MAX);
  should_load_more(
    ScrollMetrics {
      scroll_top: rows(offset),
      viewport_height: rows(height),
      document_height: rows(len),
    },
    threshold,
  )
}

fn submission_body(detail: &SubmissionDetail) -> String {
  let mut body = detail.question.clone();
  if let Some(created_at) = detail.created_at {
    body.push_str(&format!(
      "\n\nSubmitted at: {}",
      created_at.format("%Y-%m-%d %H:%M UTC")
    ));
  }
  body.push_str("\n\n--- Your code ---\n\n");
  body.push_str(&detail.prompt);
  body.push_str("\n\n--- Review ---\n\n");
  body.push_str(&detail.review);
  body
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::ApiClient;
  use crate::cache::{KeyValueStore, ManualClock, MemoryStore};
  use crate::config::{BackendConfig, Config};
  use crate::session::TOKEN_KEY;
  use crate::testing::StubBackend;

  const ONE_SUBMISSION: &str = r#"{"success": true, "data": [
    {"_id": "s1", "questionName": "Two Sum", "question": "q", "createdAt": "2024-10-10T12:00:00Z"}
  ]}"#;

  fn app_for(backend: &StubBackend) -> (App, mpsc::UnboundedReceiver<Event>) {
    let store = Arc::new(MemoryStore::new());
    store.set(TOKEN_KEY, "jwt").unwrap();
    let config = Config {
      backend: BackendConfig {
        url: backend.url.clone(),
      },
      ..Config::default()
    };
    let api = ApiClient::new(&config.backend).unwrap();
    let clock = Arc::new(ManualClock::at(1_700_000_000_000));
    let reviewer = Reviewer::with_parts(api, store.clone(), store, clock, config);

    let mut app = App::new(reviewer).unwrap();
    let (tx, rx) = mpsc::unbounded_channel();
    app.event_tx = tx;
    app.list_height = 20;
    (app, rx)
  }

  fn submissions_feed(app: &App) -> Arc<SubmissionFeed> {
    match app.current_view().map(|v| &v.state) {
      Some(ViewState::Submissions { feed, .. }) => feed.clone(),
      _ => panic!("expected the submissions view"),
    }
  }

  #[test]
  fn test_near_end_in_rows() {
    // Nothing to scroll yet
    assert!(near_end(0, 20, 5, 3));
    assert!(!near_end(0, 20, 30, 3));
    assert!(near_end(7, 20, 30, 3));
    assert!(!near_end(6, 20, 30, 3));
  }

  #[tokio::test]
  async fn test_short_first_page_loads_the_next() {
    let backend = StubBackend::start(vec![
      ("GET /api/submissions?page=1", 200, ONE_SUBMISSION),
      ("GET /api/submissions?page=2", 200, r#"{"success": true, "data": []}"#),
    ])
    .await;
    let (mut app, mut rx) = app_for(&backend);

    app.open_submissions();
    // First page, then the second one started by its completion
    for _ in 0..2 {
      let event = rx.recv().await.unwrap();
      app.handle_event(event);
    }

    assert_eq!(backend.count("GET /api/submissions?page=1"), 1);
    assert_eq!(backend.count("GET /api/submissions?page=2"), 1);
    let feed = submissions_feed(&app);
    assert_eq!(feed.len(), 1);
    assert!(feed.is_exhausted());
  }

  #[tokio::test]
  async fn test_failed_page_does_not_chain() {
    let backend = StubBackend::start(vec![(
      "GET /api/submissions?page=1",
      500,
      r#"{"message": "boom"}"#,
    )])
    .await;
    let (mut app, mut rx) = app_for(&backend);

    app.open_submissions();
    let event = rx.recv().await.unwrap();
    app.handle_event(event);

    let next = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
    assert!(next.is_err());
    assert_eq!(backend.count("GET /api/submissions?page=1"), 1);
    assert!(submissions_feed(&app).view().error.is_some());
  }

  #[test]
  fn test_scroll_offset_follows_selection() {
    assert_eq!(scroll_offset(0, 0, 10), 0);
    assert_eq!(scroll_offset(9, 0, 10), 0);
    assert_eq!(scroll_offset(10, 0, 10), 1);
    assert_eq!(scroll_offset(25, 3, 10), 16);
    assert_eq!(scroll_offset(2, 5, 10), 2);
  }

  #[test]
  fn test_submission_body_sections() {
    let detail = SubmissionDetail {
      id: "s1".to_string(),
      question_name: "Two Sum".to_string(),
      question: "Find two numbers".to_string(),
      review: "Consider a hash map".to_string(),
      prompt: "fn two_sum() {}".to_string(),
      created_at: None,
    };
    let body = submission_body(&detail);
    assert!(body.starts_with("Find two numbers"));
    assert!(body.contains("--- Your code ---\n\nfn two_sum() {}"));
    assert!(body.ends_with("Consider a hash map"));
  }
}
