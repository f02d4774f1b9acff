use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
    Frame,
};

use crate::tui::{app::ParleyApp, message::MessageRole};

/// Render the main UI
pub fn render_ui(f: &mut Frame, app: &ParleyApp) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Status bar
            Constraint::Min(5),    // Messages
            Constraint::Length(3), // Input box
        ])
        .split(f.size());

    render_status_bar(f, app, chunks[0]);
    render_messages(f, app, chunks[1]);
    render_input_box(f, app, chunks[2]);
}

/// Render the status bar
fn render_status_bar(f: &mut Frame, app: &ParleyApp, area: Rect) {
    let tools_color = if app.tools_enabled() {
        Color::Green
    } else {
        Color::DarkGray
    };
    let status_text = Line::from(vec![
        Span::styled("Endpoint: ", Style::default().fg(Color::Gray)),
        Span::styled(app.endpoint_name(), Style::default().fg(Color::Green)),
        Span::styled(" | Model: ", Style::default().fg(Color::Gray)),
        Span::styled(app.model_name(), Style::default().fg(Color::Green)),
        Span::styled(" | Tools (F2): ", Style::default().fg(Color::Gray)),
        Span::styled(
            if app.tools_enabled() { "on" } else { "off" },
            Style::default().fg(tools_color),
        ),
    ]);

    // Second line lists the available tools, dimmed while disabled.
    let tools_line = {
        let mut tool_spans = Vec::new();
        for (i, name) in app.tool_names().into_iter().enumerate() {
            if i > 0 {
                tool_spans.push(Span::raw(" "));
            }
            tool_spans.push(Span::styled(name, Style::default().fg(tools_color)));
        }
        Line::from(tool_spans)
    };

    let status_content = Text::from(vec![status_text, tools_line]);
    let status_bar = Paragraph::new(status_content)
        .block(Block::default().borders(Borders::ALL).title("Parley"));

    f.render_widget(status_bar, area);
}

/// Render the messages area
fn render_messages(f: &mut Frame, app: &ParleyApp, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(75), // Chat messages
            Constraint::Percentage(25), // Thinking and tool panel
        ])
        .split(area);

    let messages: Vec<ListItem> = app
        .messages()
        .iter()
        .map(|msg| {
            let color = match msg.role {
                MessageRole::User => Color::Cyan,
                MessageRole::Assistant => Color::Green,
                MessageRole::System => Color::Yellow,
            };

            let role_name = match msg.role {
                MessageRole::User => "You",
                MessageRole::Assistant => "Assistant",
                MessageRole::System => "System",
            };

            let role_span = Span::styled(
                format!("{}: ", role_name),
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            );
            let content_span = Span::raw(&msg.content);

            let mut lines = Vec::new();
            lines.push(Line::from(vec![role_span, content_span]));

            if msg.role == MessageRole::Assistant && !msg.used_tools.is_empty() {
                let tools_used = format!("Tools: {}", msg.used_tools.join(", "));
                let tools_span = Span::styled(
                    tools_used,
                    Style::default()
                        .fg(Color::DarkGray)
                        .add_modifier(Modifier::ITALIC),
                );
                lines.push(Line::from(vec![Span::raw("  "), tools_span]));
            }

            ListItem::new(Text::from(lines))
        })
        .collect();

    let messages_list = List::new(messages)
        .block(Block::default().borders(Borders::ALL).title("Conversation"))
        .highlight_style(Style::default().add_modifier(Modifier::BOLD));

    f.render_widget(messages_list, chunks[0]);

    render_side_panel(f, app, chunks[1]);
}

/// Render the side panel with the latest reasoning trace and tool usage
fn render_side_panel(f: &mut Frame, app: &ParleyApp, area: Rect) {
    let latest_message = app
        .messages()
        .iter()
        .rev()
        .find(|msg| msg.role == MessageRole::Assistant);

    let thinking = latest_message
        .map(|msg| msg.thinking.as_str())
        .filter(|t| !t.is_empty());

    let used_tools = latest_message
        .filter(|msg| !msg.used_tools.is_empty())
        .map(|msg| msg.used_tools.join(", "))
        .unwrap_or_else(|| "None".to_string());

    let mut panel_text = vec![Line::from(vec![Span::styled(
        "Thinking:",
        Style::default().add_modifier(Modifier::UNDERLINED),
    )])];
    match thinking {
        Some(text) => panel_text.push(Line::from(Span::styled(
            text.to_string(),
            Style::default().fg(Color::DarkGray),
        ))),
        None => panel_text.push(Line::from(Span::styled(
            "(none)",
            Style::default().fg(Color::DarkGray),
        ))),
    }
    panel_text.push(Line::from(""));
    panel_text.push(Line::from(vec![Span::styled(
        "Tools used:",
        Style::default().add_modifier(Modifier::UNDERLINED),
    )]));
    let color = if used_tools == "None" {
        Color::DarkGray
    } else {
        Color::Green
    };
    panel_text.push(Line::from(Span::styled(
        used_tools,
        Style::default().fg(color),
    )));

    let panel = Paragraph::new(Text::from(panel_text))
        .block(Block::default().borders(Borders::ALL).title("Details"))
        .wrap(Wrap { trim: true });

    f.render_widget(panel, area);
}

/// Render the input box
fn render_input_box(f: &mut Frame, app: &ParleyApp, area: Rect) {
    let input = Paragraph::new(app.input()).style(Style::default()).block(
        Block::default()
            .borders(Borders::ALL)
            .title(if app.is_loading() { "Waiting..." } else { "Input" })
            .style(Style::default().fg(if app.is_loading() {
                Color::DarkGray
            } else {
                Color::White
            })),
    );

    f.render_widget(input, area);

    if !app.is_loading() {
        f.set_cursor(
            // Put cursor past the end of the input text
            area.x + cursor_offset(app.input(), area.width) + 1,
            area.y + 1,
        );
    }
}

/// Column of the cursor inside the input box: one cell per char (byte length
/// drifts on multi-byte input), clamped to the box's inner width.
fn cursor_offset(input: &str, width: u16) -> u16 {
    let max = width.saturating_sub(2) as usize;
    input.chars().count().min(max) as u16
}
