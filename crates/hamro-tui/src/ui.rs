use ratatui::{
    Frame,
    layout::{Constraint, Layout, Margin, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{
        Block, Borders, Clear, List, ListItem, Paragraph, Scrollbar, ScrollbarOrientation,
        ScrollbarState, Wrap,
    },
};
use hamro_core::{key_available, ChatMessage, ChatRole, KeyBridge, ModelDescriptor};

use crate::app::{App, InputMode, MenuAction};
use crate::markdown::render_markdown;

const SIDEBAR_WIDTH: u16 = 28;
const ASSISTANT_NAME: &str = "Hamro AI";
const DISCLAIMER: &str = "Hamro AI can make mistakes. Please check important info.";
const MAX_INPUT_LINES: u16 = 4;

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    let (sidebar_area, main_area) = if app.show_sidebar && area.width >= SIDEBAR_WIDTH * 2 {
        let [sidebar, main] = Layout::horizontal([
            Constraint::Length(SIDEBAR_WIDTH),
            Constraint::Min(0),
        ])
        .areas(area);
        (Some(sidebar), main)
    } else {
        (None, area)
    };

    if let Some(sidebar_area) = sidebar_area {
        render_sidebar(app, frame, sidebar_area);
    }

    let input_lines = (app.input.split('\n').count() as u16).clamp(1, MAX_INPUT_LINES);
    let tray_height = if app.pending_attachments.is_empty() && !app.reading_files { 0 } else { 1 };

    let [header_area, chat_area, tray_area, input_area, notice_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(3),
        Constraint::Length(tray_height),
        Constraint::Length(input_lines + 2),
        Constraint::Length(1),
        Constraint::Length(1),
    ])
    .areas(main_area);

    render_header(app, frame, header_area);
    render_chat(app, frame, chat_area);
    if tray_height > 0 {
        render_attachment_tray(app, frame, tray_area);
    }
    render_input(app, frame, input_area);
    render_notice(app, frame, notice_area);
    render_footer(app, frame, footer_area);

    // Render popups (in order of priority)
    if app.show_api_key_input {
        render_api_key_input(app, frame, area);
    } else if app.show_attach_input {
        render_attach_input(app, frame, area);
    } else if app.show_model_picker {
        render_model_picker(app, frame, area);
    } else if app.show_menu {
        render_menu(app, frame, area);
    }
}

fn render_sidebar(app: &App, frame: &mut Frame, area: Rect) {
    let muted = Style::default().fg(Color::DarkGray);
    let section = Style::default().fg(Color::Gray).add_modifier(Modifier::BOLD);

    let key_status = match (key_available(Some(app as &dyn KeyBridge)), app.key_source) {
        (true, Some(source)) => format!("set ({})", source.as_str()),
        (true, None) => "set".to_string(),
        (false, _) => "missing (K)".to_string(),
    };
    let turns = app
        .history_len()
        .map(|len| format!("{} turns", len / 2))
        .unwrap_or_else(|| "…".to_string());

    let lines = vec![
        Line::from(vec![
            Span::styled(" ▲ ", Style::default().fg(Color::Magenta).bold()),
            Span::styled(format!("{} Workspace", app.config.workspace_name()), Style::default().bold()),
        ]),
        Line::default(),
        Line::styled(" Private", section),
        Line::from(Span::styled(
            "  › Hamro AI Chat",
            Style::default().bg(Color::DarkGray).fg(Color::White),
        )),
        Line::default(),
        Line::styled(" Session", section),
        Line::from(vec![Span::styled("  Model   ", muted), Span::raw(app.model_display_name().to_string())]),
        Line::from(vec![Span::styled("  History ", muted), Span::raw(turns)]),
        Line::from(vec![Span::styled("  API key ", muted), Span::raw(key_status)]),
        Line::default(),
        Line::styled(" Ctrl+B to hide", muted),
    ];

    let sidebar = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::RIGHT)
            .border_style(muted),
    );
    frame.render_widget(sidebar, area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" ▲ Hamro ", Style::default().fg(Color::White).bold()),
        Span::styled("AI", Style::default().fg(Color::Magenta).bold()),
        Span::raw(" "),
        Span::styled(" BETA ", Style::default().bg(Color::Magenta).fg(Color::White).bold()),
        Span::raw("  "),
        Span::styled(app.model_display_name().to_string(), Style::default().fg(Color::Cyan)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn message_lines(app: &App, message: &ChatMessage) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    let time = Span::styled(
        format!("  {}", message.timestamp.format("%H:%M")),
        Style::default().fg(Color::DarkGray),
    );

    match message.role {
        ChatRole::User => {
            lines.push(Line::from(vec![
                Span::styled(
                    app.config.user_name().to_string(),
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                ),
                time,
            ]));
            for attachment in &message.attachments {
                lines.push(Line::styled(
                    format!("📎 {}", attachment.name),
                    Style::default().fg(Color::DarkGray),
                ));
            }
            lines.extend(message.content.lines().map(|l| Line::from(l.to_string())));
        }
        ChatRole::Model => {
            lines.push(Line::from(vec![
                Span::styled(
                    ASSISTANT_NAME,
                    Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD),
                ),
                time,
            ]));

            match message.error {
                Some(kind) => {
                    lines.extend(message.content.lines().map(|l| {
                        Line::styled(l.to_string(), Style::default().fg(Color::Red))
                    }));
                    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
                    let mut actions = vec![
                        Span::styled(" r ", key_style),
                        Span::styled(" retry ", Style::default().fg(Color::Red)),
                    ];
                    if kind.offers_key_reselect() {
                        actions.extend([
                            Span::styled(" K ", key_style),
                            Span::styled(" select key ", Style::default().fg(Color::Red)),
                        ]);
                    }
                    lines.push(Line::from(actions));
                }
                None => lines.extend(render_markdown(&message.content)),
            }
        }
    }

    lines.push(Line::default());
    lines
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let inner = block.inner(area);
    app.chat_height = inner.height;

    let mut lines: Vec<Line> = Vec::new();
    for message in &app.messages {
        lines.extend(message_lines(app, message));
    }

    if !app.is_idle() {
        lines.push(Line::from(Span::styled(
            ASSISTANT_NAME,
            Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD),
        )));
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            format!("AI is typing{}", dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    let chat = Paragraph::new(Text::from(lines)).wrap(Wrap { trim: false });

    // Rows after word wrapping, so following the tail lands on the last line.
    app.chat_total_lines = chat.line_count(inner.width).min(u16::MAX as usize) as u16;
    if app.follow_tail {
        app.chat_scroll = app.max_scroll();
    } else {
        app.chat_scroll = app.chat_scroll.min(app.max_scroll());
    }

    frame.render_widget(block, area);
    frame.render_widget(chat.scroll((app.chat_scroll, 0)), inner);

    if app.chat_total_lines > app.chat_height {
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("^"))
            .end_symbol(Some("v"));

        let mut scrollbar_state = ScrollbarState::new(app.max_scroll() as usize)
            .position(app.chat_scroll as usize);

        frame.render_stateful_widget(
            scrollbar,
            area.inner(Margin {
                vertical: 1,
                horizontal: 0,
            }),
            &mut scrollbar_state,
        );
    }
}

fn render_attachment_tray(app: &App, frame: &mut Frame, area: Rect) {
    let chip = Style::default().bg(Color::DarkGray).fg(Color::White);
    let mut spans = vec![Span::raw(" ")];

    for attachment in &app.pending_attachments {
        let kind = if attachment.is_inline { "pdf" } else { "text" };
        spans.push(Span::styled(format!(" 📎 {} ({}) ", attachment.name, kind), chip));
        spans.push(Span::raw(" "));
    }

    if app.reading_files {
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        spans.push(Span::styled(
            format!("Reading files{}", dots),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::ITALIC),
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing && app.is_idle();
    let border_color = if editing { Color::Yellow } else { Color::DarkGray };

    let title = if app.is_idle() {
        " Ask AI anything... "
    } else {
        " Waiting for reply... "
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title)
        .title(
            Line::from(vec![
                Span::styled(format!(" {} ", app.model_display_name()), Style::default().fg(Color::Cyan)),
                Span::styled("(m) ", Style::default().fg(Color::DarkGray)),
            ])
            .right_aligned(),
        );

    let inner = block.inner(area);
    let inner_width = inner.width as usize;
    let inner_height = inner.height as usize;

    // Cursor row/column within the multi-line input
    let before_cursor: String = app.input.chars().take(app.input_cursor).collect();
    let cursor_row = before_cursor.matches('\n').count();
    let cursor_col = before_cursor
        .rsplit('\n')
        .next()
        .map(|line| line.chars().count())
        .unwrap_or(0);

    let row_offset = (cursor_row + 1).saturating_sub(inner_height);
    // Horizontal scroll to keep the cursor visible
    let col_offset = if inner_width == 0 {
        0
    } else if cursor_col >= inner_width {
        cursor_col - inner_width + 1
    } else {
        0
    };

    let visible: Vec<Line> = app
        .input
        .split('\n')
        .skip(row_offset)
        .take(inner_height)
        .map(|line| {
            let shown: String = line.chars().skip(col_offset).take(inner_width).collect();
            Line::from(shown)
        })
        .collect();

    let input = Paragraph::new(visible)
        .style(Style::default().fg(Color::Cyan))
        .block(block);
    frame.render_widget(input, area);

    if editing && !app.popup_open() {
        frame.set_cursor_position((
            inner.x + cursor_col.saturating_sub(col_offset) as u16,
            inner.y + cursor_row.saturating_sub(row_offset) as u16,
        ));
    }
}

fn render_notice(app: &App, frame: &mut Frame, area: Rect) {
    let notice = match &app.status {
        Some(status) => Paragraph::new(status.as_str()).style(Style::default().fg(Color::Yellow)),
        None => Paragraph::new(DISCLAIMER).style(Style::default().fg(Color::DarkGray)),
    };
    frame.render_widget(notice.centered(), area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let (mode_text, mode_style) = match (app.input_mode, app.is_idle()) {
        (_, false) => (" THINKING ", Style::default().bg(Color::Magenta).fg(Color::White)),
        (InputMode::Normal, true) => (" NORMAL ", Style::default().bg(Color::Blue).fg(Color::White)),
        (InputMode::Editing, true) => (" INSERT ", Style::default().bg(Color::Yellow).fg(Color::Black)),
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);
    let hint = |key: &'static str, label: &'static str| {
        [Span::styled(key, key_style), Span::styled(label, label_style)]
    };

    let hints: Vec<Span> = match app.input_mode {
        InputMode::Editing => [
            hint(" Enter ", " send "),
            hint(" Alt+Enter ", " newline "),
            hint(" Esc ", " commands "),
        ]
        .concat(),
        InputMode::Normal => [
            hint(" i ", " type "),
            hint(" j/k ", " scroll "),
            hint(" m ", " model "),
            hint(" a ", " attach "),
            hint(" d ", " detach "),
            hint(" r ", " retry "),
            hint(" o ", " options "),
            hint(" q ", " quit "),
        ]
        .concat(),
    };

    let footer_content = Line::from(
        vec![
            Span::styled(mode_text, mode_style),
            Span::styled(" ", label_style),
        ]
        .into_iter()
        .chain(hints)
        .collect::<Vec<_>>(),
    );

    let footer = Paragraph::new(footer_content).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

/// A centered rectangle clamped to the frame.
fn popup_area(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height.saturating_sub(4));
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

fn picker_highlight() -> Style {
    Style::default()
        .bg(Color::Blue)
        .fg(Color::White)
        .add_modifier(Modifier::BOLD)
}

fn render_model_picker(app: &mut App, frame: &mut Frame, area: Rect) {
    let models = ModelDescriptor::all();
    let popup = popup_area(area, 50, models.len() as u16 * 2 + 2);
    frame.render_widget(Clear, popup);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Select Model ");

    let items: Vec<ListItem> = models
        .iter()
        .map(|model| {
            let current = model.id == app.selected_model;
            let name_style = if current {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            let marker = if current { " ✓" } else { "" };

            ListItem::new(vec![
                Line::from(Span::styled(format!("{}{}", model.display_name, marker), name_style)),
                Line::styled(format!("  {}", model.description), Style::default().fg(Color::DarkGray)),
            ])
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(picker_highlight())
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, popup, &mut app.model_picker_state);
}

fn render_menu(app: &mut App, frame: &mut Frame, area: Rect) {
    let popup = popup_area(area, 36, MenuAction::ALL.len() as u16 + 2);
    frame.render_widget(Clear, popup);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Chat Options ");

    let items: Vec<ListItem> = MenuAction::ALL
        .iter()
        .map(|action| {
            let style = if *action == MenuAction::ClearHistory {
                Style::default().fg(Color::Red)
            } else {
                Style::default()
            };
            ListItem::new(action.label()).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(picker_highlight())
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, popup, &mut app.menu_state);
}

fn render_attach_input(app: &App, frame: &mut Frame, area: Rect) {
    let popup = popup_area(area, 70, 6);
    frame.render_widget(Clear, popup);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Attach files or folders ");

    let inner = block.inner(popup);
    frame.render_widget(block, popup);

    let instructions = Paragraph::new("Paths separated by spaces (quote paths with spaces). Enter to attach, Esc to cancel.")
        .style(Style::default().fg(Color::DarkGray))
        .wrap(Wrap { trim: true });
    frame.render_widget(instructions, Rect::new(inner.x, inner.y, inner.width, 2));

    let input_area = Rect::new(inner.x, inner.y + 3, inner.width, 1);
    let width = input_area.width as usize;
    let count = app.attach_input.chars().count();
    let visible: String = app.attach_input.chars().skip(count.saturating_sub(width.saturating_sub(1))).collect();

    frame.render_widget(Paragraph::new(visible.as_str()).style(Style::default().fg(Color::Cyan)), input_area);
    frame.set_cursor_position((input_area.x + visible.chars().count() as u16, input_area.y));
}

/// Mask a key with asterisks, showing only the last four characters.
fn mask_key(key: &str) -> String {
    let count = key.chars().count();
    if count <= 4 {
        "*".repeat(count)
    } else {
        let masked_len = count - 4;
        let last_four: String = key.chars().skip(masked_len).collect();
        format!("{}...{}", "*".repeat(masked_len.min(20)), last_four)
    }
}

fn render_api_key_input(app: &App, frame: &mut Frame, area: Rect) {
    let popup = popup_area(area, 60, 7);
    frame.render_widget(Clear, popup);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Enter Gemini API Key ");

    let inner = block.inner(popup);
    frame.render_widget(block, popup);

    let instructions = Paragraph::new("Paste your API key below. Press Enter to save, Esc to cancel.")
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(instructions, Rect::new(inner.x, inner.y, inner.width, 1));

    let input_area = Rect::new(inner.x, inner.y + 2, inner.width, 1);
    let display_text = mask_key(&app.api_key_input);
    frame.render_widget(
        Paragraph::new(display_text.as_str()).style(Style::default().fg(Color::Cyan)),
        input_area,
    );

    let cursor_x = display_text.chars().count().min(input_area.width as usize) as u16;
    frame.set_cursor_position((input_area.x + cursor_x, input_area.y));

    let status = if app.has_selected_key() {
        format!("{} characters", app.api_key_input.chars().count())
    } else {
        "No key found in GEMINI_API_KEY or API_KEY.".to_string()
    };
    frame.render_widget(
        Paragraph::new(status).style(Style::default().fg(Color::DarkGray)),
        Rect::new(inner.x, inner.y + 4, inner.width, 1),
    );
}
