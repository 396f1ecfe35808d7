use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
};
use medifind_core::SpeechState;

use crate::app::{App, InputMode, LandingButton, Screen};

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    match app.screen {
        Screen::Landing => render_landing_screen(app, frame, body_area),
        Screen::Chat => render_chat_screen(app, frame, body_area),
    }

    render_footer(app, frame, footer_area);

    // Render popups (in order of priority)
    if app.show_api_key_input {
        render_api_key_input(app, frame, area);
    } else if app.show_image_picker {
        render_image_picker(app, frame, area);
    } else if app.show_model_picker {
        render_model_picker(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let model = match app.screen {
        Screen::Chat => format!(" {}", app.selected_model),
        Screen::Landing => String::new(),
    };

    let title = Line::from(vec![
        Span::styled(" MediFind ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(model, Style::default().fg(Color::Gray)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };

    let mode_text = match app.screen {
        Screen::Landing => " HOME ",
        Screen::Chat => " CHAT ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let mut hints = match (app.screen, app.input_mode) {
        (Screen::Landing, _) => vec![
            Span::styled(" ←/→ ", key_style),
            Span::styled(" choose ", label_style),
            Span::styled(" Enter ", key_style),
            Span::styled(" open ", label_style),
            Span::styled(" q ", key_style),
            Span::styled(" quit ", label_style),
        ],
        (Screen::Chat, InputMode::Editing) => {
            let send_label = if app.is_thinking() { " waiting " } else { " send " };
            vec![
                Span::styled(" Enter ", key_style),
                Span::styled(send_label, label_style),
                Span::styled(" ^O ", key_style),
                Span::styled(" image ", label_style),
                Span::styled(" ^R ", key_style),
                Span::styled(mic_label(app), label_style),
                Span::styled(" Esc ", key_style),
                Span::styled(" normal ", label_style),
            ]
        }
        (Screen::Chat, InputMode::Normal) => vec![
            Span::styled(" i ", key_style),
            Span::styled(" type ", label_style),
            Span::styled(" j/k ", key_style),
            Span::styled(" scroll ", label_style),
            Span::styled(" p ", key_style),
            Span::styled(" image ", label_style),
            Span::styled(" m ", key_style),
            Span::styled(mic_label(app), label_style),
            Span::styled(" M ", key_style),
            Span::styled(" model ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" home ", label_style),
            Span::styled(" q ", key_style),
            Span::styled(" quit ", label_style),
        ],
    };

    if let Some(status) = &app.status {
        hints.push(Span::styled(
            format!("  {}", status),
            Style::default().bg(Color::Black).fg(Color::Yellow),
        ));
    }

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

/// Microphone hint: disabled, listening or idle
fn mic_label(app: &App) -> &'static str {
    if !app.speech.is_available() {
        " mic (off) "
    } else {
        match app.speech.state() {
            SpeechState::Listening => " listening ",
            SpeechState::Idle => " mic ",
        }
    }
}

fn render_landing_screen(app: &App, frame: &mut Frame, area: Rect) {
    let [_, content_area, _] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(9),
        Constraint::Min(0),
    ])
    .areas(area);

    let button = |label: &str, selected: bool| {
        let style = if selected {
            Style::default().bg(Color::Cyan).fg(Color::Black).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Cyan)
        };
        Span::styled(format!("  {}  ", label), style)
    };

    let lines = vec![
        Line::from(Span::styled(
            "MediFind",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )),
        Line::default(),
        Line::from("Describe a symptom or snap a photo of a medicine strip."),
        Line::from(Span::styled(
            "Get generic and branded options with prices, usage and side effects.",
            Style::default().fg(Color::Gray),
        )),
        Line::default(),
        Line::from(vec![
            button("Get Started", app.landing_button == LandingButton::GetStarted),
            Span::raw("   "),
            button("Try AI", app.landing_button == LandingButton::TryAi),
        ]),
        Line::default(),
        Line::from(Span::styled(
            "Information only. Always consult a doctor or pharmacist.",
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )),
    ];

    let landing = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
    frame.render_widget(landing, content_area);
}

fn render_chat_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    // Chat history on top, pending image (if any), input at bottom
    let image_height = if app.session.pending().is_empty() { 0 } else { 1 };
    let [chat_area, image_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(image_height),
        Constraint::Length(3),
    ])
    .areas(area);

    // Store area for mouse hit-testing
    app.chat_area = Some(chat_area);

    // Store chat area dimensions for scroll calculations (inner size minus borders)
    app.chat_height = chat_area.height.saturating_sub(2);
    app.chat_width = chat_area.width.saturating_sub(2);

    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Medicine Assistant ");

    let chat_text = if app.transcript.is_empty() && !app.is_thinking() {
        Text::from(vec![
            Line::from(Span::styled(
                "Hi! Tell me how you feel, or attach a photo of a medicine.",
                Style::default().fg(Color::DarkGray),
            )),
            Line::from(Span::styled(
                "Example: \"I have a sore throat and mild fever\"",
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )),
        ])
    } else {
        Text::from(app.chat_lines())
    };

    let chat = Paragraph::new(chat_text)
        .block(chat_block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, chat_area);

    if let Some(label) = app.session.pending().label() {
        let pending = Paragraph::new(Line::from(vec![
            Span::styled(" attached: ", Style::default().fg(Color::DarkGray)),
            Span::styled(crate::cards::sanitize(label), Style::default().fg(Color::Magenta)),
        ]));
        frame.render_widget(pending, image_area);
    }

    render_input(app, frame, input_area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing;
    let border_color = if app.speech.is_listening() {
        Color::Red
    } else if editing {
        Color::Yellow
    } else {
        Color::DarkGray
    };

    let title = if app.speech.is_listening() {
        let dots = ".".repeat((app.animation_frame as usize % 3) + 1);
        format!(" Listening{} ", dots)
    } else if app.is_thinking() {
        " Ask (waiting for reply) ".to_string()
    } else {
        " Ask ".to_string()
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Calculate visible portion of input with horizontal scrolling
    // Inner width = total width - 2 (for borders)
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.query_cursor;

    // Calculate scroll offset to keep cursor visible
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let input = if app.query_input.is_empty() {
        Paragraph::new(app.placeholder()).style(Style::default().fg(Color::DarkGray))
    } else {
        let visible_text: String = app
            .query_input
            .chars()
            .skip(scroll_offset)
            .take(inner_width)
            .collect();
        Paragraph::new(visible_text).style(Style::default().fg(Color::Cyan))
    };

    frame.render_widget(input.block(input_block), area);

    // Show cursor when editing
    if editing {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

/// Centered popup rectangle, clamped to `area`
fn popup_rect(area: Rect, width: u16, height: u16) -> Rect {
    let popup_width = width.min(area.width.saturating_sub(4));
    let popup_height = height.min(area.height.saturating_sub(4));
    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;
    Rect::new(popup_x, popup_y, popup_width, popup_height)
}

fn render_model_picker(app: &mut App, frame: &mut Frame, area: Rect) {
    let popup_area = popup_rect(area, 40, app.available_models.len() as u16 + 2);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Select Model (Enter to select, Esc to cancel) ");

    let items: Vec<ListItem> = app
        .available_models
        .iter()
        .map(|model| {
            let style = if model == &app.selected_model {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(format!(" {} ", model)).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, popup_area, &mut app.model_picker_state);
}

/// Mask all but the last four characters
fn mask_key(key: &str) -> String {
    let len = key.chars().count();
    if len <= 4 {
        "*".repeat(len)
    } else {
        let masked_len = len - 4;
        let last_four: String = key.chars().skip(masked_len).collect();
        format!("{}...{}", "*".repeat(masked_len.min(20)), last_four)
    }
}

/// Single-line text prompt shared by the API key and image path popups
#[allow(clippy::too_many_arguments)]
fn render_prompt(
    frame: &mut Frame,
    area: Rect,
    title: &str,
    instructions: &str,
    display_text: String,
    cursor: usize,
    status: String,
    color: Color,
) {
    let popup_area = popup_rect(area, 60, 7);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color))
        .title(title.to_string());

    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);
    if inner.height < 5 {
        return;
    }

    let instructions = Paragraph::new(instructions.to_string()).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(instructions, Rect::new(inner.x, inner.y, inner.width, 1));

    // Input field, scrolled so the cursor stays visible
    let input_area = Rect::new(inner.x, inner.y + 2, inner.width, 1);
    let width = input_area.width as usize;
    let offset = if width > 0 && cursor >= width { cursor - width + 1 } else { 0 };
    let visible: String = display_text.chars().skip(offset).take(width).collect();
    frame.render_widget(Paragraph::new(visible).style(Style::default().fg(Color::Cyan)), input_area);

    let cursor_x = (cursor - offset).min(width) as u16;
    frame.set_cursor_position((input_area.x + cursor_x, input_area.y));

    let status = Paragraph::new(status).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(status, Rect::new(inner.x, inner.y + 4, inner.width, 1));
}

fn render_api_key_input(app: &App, frame: &mut Frame, area: Rect) {
    let display_text = mask_key(&app.api_key_input);
    let cursor = display_text.chars().count();
    render_prompt(
        frame,
        area,
        " Enter Gemini API Key ",
        "Paste your API key below. Press Enter to save, Esc to cancel.",
        display_text,
        cursor,
        format!("{} characters", app.api_key_input.chars().count()),
        Color::Yellow,
    );
}

fn render_image_picker(app: &App, frame: &mut Frame, area: Rect) {
    render_prompt(
        frame,
        area,
        " Attach Image ",
        "Path to a photo of the medicine. Enter to attach, Esc to cancel.",
        app.image_path_input.clone(),
        app.image_path_cursor,
        "JPEG, PNG, WebP or GIF".to_string(),
        Color::Magenta,
    );
}
