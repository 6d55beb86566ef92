use crate::feed::{JobsView, Pager};
use crate::ui::renderfns::truncate;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

pub fn draw_jobs(frame: &mut Frame, area: Rect, view: &JobsView, pager: &Pager, selected: usize) {
  let title = if view.loading {
    " Jobs (loading...) ".to_string()
  } else {
    format!(
      " Jobs ({}) page {}/{} ",
      view.jobs.len(),
      pager.page(),
      pager.total_pages().max(1)
    )
  };

  let block = Block::default()
    .title(title)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Blue))
    .title_bottom(page_hint(pager));

  let page = pager.slice(&view.jobs);

  if page.is_empty() {
    let (content, color) = match (&view.error, view.loading) {
      (Some(error), _) => (format!("Error: {}\n\nUse :refresh to retry.", error), Color::Red),
      (None, true) => ("Loading jobs...".to_string(), Color::DarkGray),
      (None, false) => ("No jobs found.".to_string(), Color::DarkGray),
    };
    let paragraph = Paragraph::new(content)
      .block(block)
      .style(Style::default().fg(color));
    frame.render_widget(paragraph, area);
    return;
  }

  let items: Vec<ListItem> = page
    .iter()
    .map(|job| {
      let line = Line::from(vec![
        Span::styled(
          format!("{:<32}", truncate(&job.title, 32)),
          Style::default().fg(Color::Cyan),
        ),
        Span::raw(" "),
        Span::styled(
          truncate(job.description.lines().next().unwrap_or_default(), 80),
          Style::default().fg(Color::DarkGray),
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

  let mut state = ListState::default();
  state.select(Some(selected));

  frame.render_stateful_widget(list, area, &mut state);
}

fn page_hint(pager: &Pager) -> Line<'static> {
  let key = |enabled: bool| {
    if enabled {
      Style::default().fg(Color::Cyan)
    } else {
      Style::default().fg(Color::DarkGray)
    }
  };

  Line::from(vec![
    Span::styled(" <g> first ", key(pager.has_prev())),
    Span::styled(" <h> prev ", key(pager.has_prev())),
    Span::styled(" <l> next ", key(pager.has_next())),
    Span::styled(" <G> last ", key(pager.has_next())),
  ])
}
