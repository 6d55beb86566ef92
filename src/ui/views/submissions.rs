use crate::feed::SubmissionsView;
use crate::ui::renderfns::truncate;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

pub fn draw_submissions(
  frame: &mut Frame,
  area: Rect,
  view: &SubmissionsView,
  selected: usize,
  offset: usize,
) {
  let title = format!(" Submissions ({}) ", view.submissions.len());

  let status = if view.loading {
    Line::styled(" Loading more... ", Style::default().fg(Color::DarkGray))
  } else if let Some(error) = &view.error {
    Line::styled(format!(" {} ", error), Style::default().fg(Color::Red))
  } else if view.exhausted {
    Line::styled(" No more submissions ", Style::default().fg(Color::DarkGray))
  } else {
    Line::default()
  };

  let block = Block::default()
    .title(title)
    .title_bottom(status)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Blue));

  if view.submissions.is_empty() {
    let content = if view.loading {
      "Loading submissions..."
    } else if view.error.is_some() {
      "Could not load submissions. Log in with `code-reviewer login` and move to retry."
    } else {
      "No submissions yet."
    };
    let paragraph = Paragraph::new(content)
      .block(block)
      .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
    return;
  }

  let items: Vec<ListItem> = view
    .submissions
    .iter()
    .map(|submission| {
      let line = Line::from(vec![
        Span::styled(
          submission.created_at.format("%Y-%m-%d %H:%M").to_string(),
          Style::default().fg(Color::DarkGray),
        ),
        Span::raw("  "),
        Span::styled(
          truncate(&submission.question_name, 60),
          Style::default().fg(Color::Cyan),
        ),
      ]);
      ListItem::new(line)
    })
    .collect();

  let list = List::new(items)
    .block(block)
    .highlight_style(
      Style::default()
        .bg(Color::DarkGray)
        .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("> ");

  let mut state = ListState::default()
    .with_offset(offset)
    .with_selected(Some(selected));

  frame.render_stateful_widget(list, area, &mut state);
}
