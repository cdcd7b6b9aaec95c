use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Gauge, Paragraph, Wrap},
};
use manimator_core::Sender;

use crate::app::{App, ConnectionStatus};

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    let error_height = if app.session().error().is_some() { 3 } else { 0 };
    let progress_height = if app.session().progress_visible() { 3 } else { 0 };
    let video_height = if app.session().now_playing().is_some() { 3 } else { 0 };

    // Main layout: header, error banner, chat, progress, now playing, input, footer
    let [header_area, error_area, chat_area, progress_area, video_area, input_area, footer_area] =
        Layout::vertical([
            Constraint::Length(1),
            Constraint::Length(error_height),
            Constraint::Min(0),
            Constraint::Length(progress_height),
            Constraint::Length(video_height),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .areas(area);

    render_header(app, frame, header_area);
    if error_height > 0 {
        render_error(app, frame, error_area);
    }
    render_chat(app, frame, chat_area);
    if progress_height > 0 {
        render_progress(app, frame, progress_area);
    }
    if video_height > 0 {
        render_now_playing(app, frame, video_area);
    }
    render_input(app, frame, input_area);
    render_footer(frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let status_color = match app.connection {
        ConnectionStatus::Connected => Color::Green,
        ConnectionStatus::Connecting => Color::Yellow,
        ConnectionStatus::Reconnecting => Color::Red,
    };

    let title = Line::from(vec![
        Span::styled(" Manimator ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
        Span::raw("  "),
        Span::styled(format!("● {}", app.connection.label()), Style::default().fg(status_color)),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_error(app: &App, frame: &mut Frame, area: Rect) {
    let message = app.session().error().unwrap_or_default();
    let banner = Paragraph::new(message.to_string())
        .style(Style::default().bg(Color::Red).fg(Color::White))
        .block(Block::default().borders(Borders::ALL).title(" Error "))
        .wrap(Wrap { trim: true });
    frame.render_widget(banner, area);
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    // Store chat area dimensions for scroll calculations (inner size minus borders)
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);

    let key_hint = match app.credential_source {
        Some(source) => format!(" Chat: {} (key: {}) ", app.reasoning_model, source),
        None => format!(" Chat: {} (no API key) ", app.reasoning_model),
    };
    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(key_hint);

    let session = app.session();
    let chat_text = if session.conversation().is_empty() && !session.is_awaiting_answer() {
        Text::from(Span::styled(
            "Ask a question, or type @visualize <topic> to generate an animation...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let mut lines: Vec<Line> = Vec::new();

        for entry in session.conversation() {
            match entry.sender {
                Sender::User => {
                    lines.push(Line::from(Span::styled(
                        "You:",
                        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                    )));
                }
                Sender::System => {
                    lines.push(Line::from(Span::styled(
                        "Manimator:",
                        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                    )));
                }
            }
            for line in entry.text.lines() {
                lines.push(Line::from(line.to_string()));
            }
            if let Some(url) = &entry.video_reference {
                lines.push(Line::from(Span::styled(
                    format!("▶ {}", url),
                    Style::default().fg(Color::Magenta).add_modifier(Modifier::UNDERLINED),
                )));
            }
            lines.push(Line::default());
        }

        if session.is_awaiting_answer() {
            lines.push(Line::from(Span::styled(
                "Manimator:",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )));
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat((app.animation_frame as usize) + 1);
            lines.push(Line::from(Span::styled(
                format!("Thinking{}", dots),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        }

        Text::from(lines)
    };

    let chat = Paragraph::new(chat_text)
        .block(chat_block)
        .wrap(Wrap { trim: true })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn render_progress(app: &App, frame: &mut Frame, area: Rect) {
    let percent = app.session().progress().percent();
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title(" Rendering "))
        .gauge_style(Style::default().fg(Color::Green).bg(Color::Black))
        .percent(percent as u16);
    frame.render_widget(gauge, area);
}

fn render_now_playing(app: &App, frame: &mut Frame, area: Rect) {
    let url = app.session().now_playing().unwrap_or_default();
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Magenta))
        .title(" Now playing (Ctrl-O to open) ");
    let line = Paragraph::new(Span::styled(url.to_string(), Style::default().fg(Color::Magenta)))
        .block(block);
    frame.render_widget(line, area);
}

fn render_input(app: &mut App, frame: &mut Frame, area: Rect) {
    let title = if app.session().is_submitting() {
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        format!(" Submitting{} ", dots)
    } else {
        " Message ".to_string()
    };
    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(title);

    // Calculate visible portion of input with horizontal scrolling
    // Inner width = total width - 2 (for borders)
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.cursor;

    // Calculate scroll offset to keep cursor visible
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app.input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);

    frame.render_widget(input, area);
    frame.set_cursor_position((
        area.x + 1 + (cursor_pos - scroll_offset) as u16,
        area.y + 1,
    ));
}

fn render_footer(frame: &mut Frame, area: Rect) {
    let hints = Line::from(vec![
        Span::styled(" CHAT ", Style::default().bg(Color::Yellow).fg(Color::Black)),
        Span::styled(
            " Enter send  ↑↓/PgUp/PgDn scroll  Ctrl-O open video  Ctrl-U clear  Esc quit",
            Style::default().fg(Color::DarkGray),
        ),
    ]);
    frame.render_widget(Paragraph::new(hints), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use manimator_core::{ChannelEvent, Config, Effect, JobAccepted, JobId, Outcome, RealtimeEvent};
    use ratatui::{backend::TestBackend, Terminal};
    use tokio::sync::mpsc;

    fn screen(app: &mut App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        terminal.draw(|frame| render(app, frame)).unwrap();
        let buffer = terminal.backend().buffer().clone();
        buffer
            .content()
            .chunks(buffer.area.width as usize)
            .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_error_banner_only_when_set() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut app = App::new(&Config::default(), tx);
        assert!(!screen(&mut app).contains(" Error "));

        app.input = "@visualize".to_string();
        app.submit_input();
        let text = screen(&mut app);
        assert!(text.contains(" Error "));
        assert!(text.contains("Please specify a topic"));
        assert!(!text.contains(" Rendering "));
    }

    #[test]
    fn test_progress_gauge_then_now_playing() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut app = App::new(&Config::default(), tx);

        let ticket = match app.controller.begin_input("@visualize sorting") {
            Some(Effect::SubmitJob { ticket, .. }) => ticket,
            other => panic!("expected submission, got {:?}", other),
        };
        app.apply_outcome(Outcome::JobSubmitted {
            ticket,
            topic: "sorting".to_string(),
            result: Ok(JobAccepted {
                job_id: JobId::new("job-7"),
                status: "success".to_string(),
                message: String::new(),
            }),
        });
        assert!(!screen(&mut app).contains(" Rendering "));

        app.on_channel_event(ChannelEvent::Event(RealtimeEvent::progress("job-7", 40.0)));
        let text = screen(&mut app);
        assert!(text.contains(" Rendering "));
        assert!(text.contains("40%"));
        assert!(!text.contains("Now playing"));

        app.on_channel_event(ChannelEvent::Event(RealtimeEvent::completed(
            "job-7",
            "http://v/sorting.mp4",
            "sorting",
        )));
        let text = screen(&mut app);
        assert!(!text.contains(" Rendering "));
        assert!(text.contains("Now playing (Ctrl-O to open)"));
        assert!(text.contains("http://v/sorting.mp4"));
    }
}
