mod components;
mod renderfns;
mod views;

use crate::app::{App, Mode, ViewState};
use ratatui::prelude::*;

/// Main draw function
pub fn draw(frame: &mut Frame, app: &App) {
  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // Header
      Constraint::Min(1),    // Main content
      Constraint::Length(1), // Footer
    ])
    .split(frame.area());

  renderfns::draw_header(frame, chunks[0], app.backend_url(), app.logged_in());

  // Draw current view
  if let Some(view) = app.current_view() {
    match &view.state {
      ViewState::Jobs {
        listing,
        pager,
        selected,
      } => {
        views::jobs::draw_jobs(frame, chunks[1], &listing.view(), pager, *selected);
      }
      ViewState::Submissions {
        feed,
        selected,
        offset,
      } => {
        views::submissions::draw_submissions(frame, chunks[1], &feed.view(), *selected, *offset);
      }
      ViewState::Detail {
        title,
        body,
        scroll,
      } => {
        views::detail::draw_detail(frame, chunks[1], title, body, *scroll);
      }
    }
  }

  renderfns::draw_footer(frame, chunks[2], &app.view_breadcrumb(), app.last_error());

  if *app.mode() == Mode::Command {
    components::draw_command_overlay(
      frame,
      chunks[1],
      app.command_input(),
      &app.autocomplete_suggestions(),
      app.selected_suggestion(),
    );
  }
}
