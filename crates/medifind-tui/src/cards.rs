//! Transcript rendering: medicine cards, notices and chat bubbles as styled lines
//!
//! Everything here is a pure function of its inputs. Record fields come from
//! the model and are treated as untrusted display text: control characters
//! are stripped so nothing can reach the terminal as an escape sequence.

use medifind_core::notice::DISCLAIMER_TITLE;
use medifind_core::{MedicineKind, MedicineRecord, Notice};
use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};

/// One entry in the visible chat transcript
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEntry {
    User { text: String, image: Option<String> },
    Medicines(Vec<MedicineRecord>),
    Notice(Notice),
}

const BAR_FILLED: &str = "█";
const BAR_EMPTY: &str = "░";

/// Strip control characters; newlines and tabs become spaces
pub fn sanitize(text: &str) -> String {
    text.chars()
        .filter_map(|c| match c {
            '\n' | '\r' | '\t' => Some(' '),
            c if c.is_control() => None,
            c => Some(c),
        })
        .collect()
}

/// Number of filled cells for `pct` percent of `width`, rounded to nearest
pub fn filled_cells(pct: u8, width: usize) -> usize {
    let pct = pct.min(100) as usize;
    (width * pct + 50) / 100
}

pub fn effectiveness_bar(pct: u8, width: usize) -> Line<'static> {
    let filled = filled_cells(pct, width);
    Line::from(vec![
        Span::styled(BAR_FILLED.repeat(filled), Style::default().fg(Color::Green)),
        Span::styled(
            BAR_EMPTY.repeat(width.saturating_sub(filled)),
            Style::default().fg(Color::DarkGray),
        ),
    ])
}

fn kind_color(kind: MedicineKind) -> Color {
    match kind {
        MedicineKind::Generic => Color::Green,
        MedicineKind::Branded => Color::Blue,
    }
}

/// `left` and `right` on one line with `right` pushed to the end of `width`
fn spread(left: Span<'static>, right: Span<'static>, width: usize) -> Vec<Span<'static>> {
    let gap = width.saturating_sub(left.width() + right.width()).max(1);
    vec![left, Span::raw(" ".repeat(gap)), right]
}

fn field_line(edge: &Span<'static>, label: &str, value: &str) -> Line<'static> {
    Line::from(vec![
        edge.clone(),
        Span::styled(format!("{}: ", label), Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(sanitize(value)),
    ])
}

/// A titled card for one record, `width` columns wide including the left edge
pub fn medicine_card(record: &MedicineRecord, width: usize) -> Vec<Line<'static>> {
    let color = kind_color(record.kind);
    let edge = Span::styled("┃ ", Style::default().fg(color));
    let inner = width.saturating_sub(2).max(10);

    let title = Span::styled(
        sanitize(&record.name),
        Style::default().add_modifier(Modifier::BOLD),
    );
    let tag = Span::styled(
        format!(" {} ", record.kind.as_str()),
        Style::default().bg(color).fg(Color::White),
    );
    let mut header = vec![edge.clone()];
    header.extend(spread(title, tag, inner));

    let pct_label = Span::styled(format!("{}%", record.effectiveness), Style::default().add_modifier(Modifier::BOLD));
    let mut effectiveness = vec![edge.clone()];
    effectiveness.extend(spread(Span::raw("Effectiveness"), pct_label, inner));

    let mut bar = vec![edge.clone()];
    bar.extend(effectiveness_bar(record.effectiveness, inner).spans);

    vec![
        Line::from(header),
        field_line(&edge, "Common Use", &record.common_use),
        field_line(&edge, "Price", &record.price),
        field_line(&edge, "Instructions", &record.instructions),
        field_line(&edge, "Side Effects", &record.side_effects),
        Line::from(effectiveness),
        Line::from(bar),
    ]
}

fn ai_label() -> Line<'static> {
    Line::from(Span::styled(
        "AI:",
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
    ))
}

pub fn notice_lines(notice: &Notice) -> Vec<Line<'static>> {
    if notice.is_disclaimer() {
        let style = Style::default().fg(Color::Yellow);
        return vec![
            Line::from(Span::styled(DISCLAIMER_TITLE, style.add_modifier(Modifier::BOLD))),
            Line::from(Span::styled(notice.text(), style)),
        ];
    }
    vec![ai_label(), Line::from(notice.text())]
}

pub fn user_lines(text: &str, image: Option<&str>) -> Vec<Line<'static>> {
    let mut lines = vec![Line::from(Span::styled(
        "You:",
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    ))];
    if !text.is_empty() {
        lines.push(Line::from(sanitize(text)));
    }
    if let Some(label) = image {
        lines.push(Line::from(Span::styled(
            format!("[image: {}]", sanitize(label)),
            Style::default().fg(Color::Magenta),
        )));
    }
    lines
}

/// The whole transcript, plus the animated indicator while a reply is pending
pub fn transcript_lines(entries: &[ChatEntry], waiting: bool, animation_frame: u8, width: usize) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();

    for entry in entries {
        match entry {
            ChatEntry::User { text, image } => lines.extend(user_lines(text, image.as_deref())),
            ChatEntry::Medicines(records) => {
                for (i, record) in records.iter().enumerate() {
                    if i > 0 {
                        lines.push(Line::default());
                    }
                    lines.extend(medicine_card(record, width));
                }
            }
            ChatEntry::Notice(notice) => lines.extend(notice_lines(notice)),
        }
        lines.push(Line::default());
    }

    if waiting {
        lines.push(ai_label());
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((animation_frame as usize % 3) + 1);
        lines.push(Line::from(Span::styled(
            format!("Thinking{}", dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    lines
}

/// Rows `lines` occupy once wrapped to `width`
pub fn wrapped_height(lines: &[Line<'_>], width: usize) -> usize {
    let width = width.max(1);
    lines.iter().map(|line| line.width().max(1).div_ceil(width)).sum()
}

/// Lines as plain text, for non-interactive output
pub fn plain_text(lines: &[Line<'_>]) -> String {
    lines
        .iter()
        .map(|line| line.spans.iter().map(|s| s.content.as_ref()).collect::<String>())
        .collect::<Vec<_>>()
        .join("\n")
}
