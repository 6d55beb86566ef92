use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

/// Question or submission text, shown as-is
pub fn draw_detail(frame: &mut Frame, area: Rect, title: &str, body: &str, scroll: u16) {
  let block = Block::default()
    .title(format!(" {} ", title))
    .title_alignment(Alignment::Center)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Blue));

  let paragraph = Paragraph::new(body)
    .block(block)
    .wrap(Wrap { trim: false })
    .scroll((scroll, 0));

  frame.render_widget(paragraph, area);
}
