use ratatui::prelude::*;
use ratatui::widgets::Paragraph;
use url::Url;

/// Draw the header bar with the backend host, login state and shortcuts
pub fn draw_header(frame: &mut Frame, area: Rect, backend_url: &Url, logged_in: bool) {
  let host = host_label(backend_url);

  let (session, session_color) = if logged_in {
    ("logged in", Color::Green)
  } else {
    ("logged out", Color::Yellow)
  };

  let header = Line::from(vec![
    Span::styled(" code-reviewer ", Style::default().fg(Color::Cyan).bold()),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(format!(" {} ", host), Style::default().fg(Color::White)),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(format!(" {} ", session), Style::default().fg(session_color)),
    Span::raw("  "),
    // Keys highlighted, descriptions dimmed
    Span::styled("<:>", Style::default().fg(Color::Cyan)),
    Span::styled(" command", Style::default().fg(Color::DarkGray)),
    Span::raw("   "),
    Span::styled("<h/l>", Style::default().fg(Color::Cyan)),
    Span::styled(" page", Style::default().fg(Color::DarkGray)),
    Span::raw("   "),
    Span::styled("<q>", Style::default().fg(Color::Cyan)),
    Span::styled(" back", Style::default().fg(Color::DarkGray)),
  ]);

  let paragraph = Paragraph::new(header).style(Style::default().bg(Color::Black));

  frame.render_widget(paragraph, area);
}

/// Host of the backend, with the port when it is not the scheme's default
fn host_label(url: &Url) -> String {
  let host = url.host_str().unwrap_or_default();
  match url.port() {
    Some(port) => format!("{}:{}", host, port),
    None => host.to_string(),
  }
}
