use std::path::PathBuf;

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use medifind_core::{exchange, image, Dispatch, GeminiClient, ImageEvent, Notice, SendError, SpeechError};
use tokio::sync::mpsc::UnboundedSender;
use ratatui::layout::Rect;
use tracing::{info, warn};

use crate::app::{App, InputMode, LandingButton, Screen};
use crate::cards::ChatEntry;
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Line-editing keys shared by the chat input and the popups.
/// Returns false if the key was not an editing key.
fn edit_text(text: &mut String, cursor: &mut usize, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Backspace => {
            if *cursor > 0 {
                *cursor -= 1;
                let byte_pos = char_to_byte_index(text, *cursor);
                text.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            if *cursor < text.chars().count() {
                let byte_pos = char_to_byte_index(text, *cursor);
                text.remove(byte_pos);
            }
        }
        KeyCode::Left => *cursor = cursor.saturating_sub(1),
        KeyCode::Right => *cursor = (*cursor + 1).min(text.chars().count()),
        KeyCode::Home => *cursor = 0,
        KeyCode::End => *cursor = text.chars().count(),
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            let byte_pos = char_to_byte_index(text, *cursor);
            text.insert(byte_pos, c);
            *cursor += 1;
        }
        _ => return false,
    }
    true
}

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key)?,
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize => {}
        AppEvent::Tick => app.tick_animation(),
        AppEvent::Reply(id, outcome) => app.apply_reply(id, outcome),
        AppEvent::Speech(event) => app.apply_speech(event),
        AppEvent::Image(event) => app.apply_image(event),
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) -> Result<()> {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return Ok(());
    }

    // Popups take all input while open
    if app.show_api_key_input {
        handle_api_key_input(app, key);
        return Ok(());
    }
    if app.show_image_picker {
        handle_image_picker(app, key);
        return Ok(());
    }
    if app.show_model_picker {
        handle_model_picker(app, key);
        return Ok(());
    }

    match app.screen {
        Screen::Landing => handle_landing(app, key),
        Screen::Chat => match app.input_mode {
            InputMode::Normal => handle_chat_normal(app, key),
            InputMode::Editing => handle_chat_editing(app, key),
        },
    }
    Ok(())
}

fn handle_landing(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => app.should_quit = true,
        KeyCode::Left | KeyCode::Right | KeyCode::Tab | KeyCode::Char('h') | KeyCode::Char('l') => {
            app.landing_button = match app.landing_button {
                LandingButton::GetStarted => LandingButton::TryAi,
                LandingButton::TryAi => LandingButton::GetStarted,
            };
        }
        // Either button opens the chat
        KeyCode::Enter | KeyCode::Char('g') | KeyCode::Char('a') => app.show_chat(),
        _ => {}
    }
}

fn handle_chat_normal(app: &mut App, key: KeyEvent) {
    app.status = None;
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,

        // Back to home
        KeyCode::Esc | KeyCode::Char('b') => app.show_home(),

        KeyCode::Char('i') | KeyCode::Enter => {
            app.input_mode = InputMode::Editing;
            app.query_cursor = app.query_input.chars().count();
        }

        KeyCode::Char('j') | KeyCode::Down => app.scroll_down(1),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_up(1),
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_down(app.chat_height / 2);
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_up(app.chat_height / 2);
        }
        KeyCode::Char('g') => app.chat_scroll = 0,
        KeyCode::Char('G') => app.scroll_chat_to_bottom(),

        KeyCode::Char('p') => open_image_picker(app),
        KeyCode::Char('m') => start_listening(app),
        KeyCode::Char('M') => open_model_picker(app),

        _ => {}
    }
}

fn handle_chat_editing(app: &mut App, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Esc => app.input_mode = InputMode::Normal,
        KeyCode::Enter => submit_query(app),
        KeyCode::Char('o') if ctrl => open_image_picker(app),
        KeyCode::Char('r') if ctrl => start_listening(app),
        _ => {
            edit_text(&mut app.query_input, &mut app.query_cursor, key);
        }
    }
}

/// Send the typed text (and pending image) unless a reply is still outstanding
fn submit_query(app: &mut App) {
    let Some(client) = app.client.clone() else {
        if app.session.can_send(&app.query_input) {
            app.push_notice(Notice::MissingApiKey);
            app.show_api_key_input = true;
            app.api_key_input.clear();
            app.api_key_input_cursor = 0;
        }
        return;
    };

    match app.session.begin_send(&app.query_input) {
        Ok(dispatch) => {
            app.transcript.push(ChatEntry::User {
                text: dispatch.text.clone(),
                image: dispatch.image_label.clone(),
            });
            app.clear_query();
            app.status = None;

            // Scroll to bottom so "Thinking..." is visible
            app.scroll_chat_to_bottom();

            spawn_exchange(client, dispatch, app.events.clone());
        }
        Err(SendError::EmptyInput) => {}
        Err(SendError::RequestInFlight) => {
            app.status = Some("Still waiting for the previous answer...".to_string());
        }
        Err(e) => warn!(error = %e, "send refused"),
    }
}

fn spawn_exchange(client: GeminiClient, dispatch: Dispatch, events: UnboundedSender<AppEvent>) {
    tokio::spawn(async move {
        let outcome = exchange(&client, &dispatch.request).await;
        if events.send(AppEvent::Reply(dispatch.id, outcome)).is_err() {
            warn!(request = dispatch.id.value(), "UI gone before reply arrived");
        }
    });
}

fn start_listening(app: &mut App) {
    let events = app.events.clone();
    let started = app.speech.start(move |event| {
        let _ = events.send(AppEvent::Speech(event));
    });
    match started {
        Ok(()) => app.status = None,
        Err(SpeechError::Unsupported) => {
            app.status = Some("Microphone unavailable: set speech_command in the config".to_string());
        }
        Err(SpeechError::AlreadyListening) => {}
    }
}

fn open_image_picker(app: &mut App) {
    app.show_image_picker = true;
    app.image_path_input.clear();
    app.image_path_cursor = 0;
}

fn open_model_picker(app: &mut App) {
    app.available_models = GeminiClient::list_models();
    if !app.available_models.contains(&app.selected_model) {
        app.available_models.insert(0, app.selected_model.clone());
    }
    let current_idx = app
        .available_models
        .iter()
        .position(|m| m == &app.selected_model)
        .unwrap_or(0);
    app.model_picker_state.select(Some(current_idx));
    app.show_model_picker = true;
}

/// Expand a leading `~/` to the home directory
pub fn expand_path(input: &str) -> PathBuf {
    let input = input.trim();
    if let Some(rest) = input.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(input)
}

/// Start encoding the chosen file; the result arrives later as an `ImageEvent`
fn select_image(app: &mut App, path: PathBuf) {
    let selection = app.session.pending_mut().begin_selection();
    let label = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    let events = app.events.clone();
    info!(path = %path.display(), "image selected");

    tokio::spawn(async move {
        let event = match image::encode_file(&path).await {
            Ok(image) => ImageEvent::Encoded { selection, label, image },
            Err(e) => ImageEvent::Failed {
                selection,
                reason: e.to_string(),
            },
        };
        let _ = events.send(AppEvent::Image(event));
    });
}

fn handle_image_picker(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.show_image_picker = false;
            app.image_path_input.clear();
        }
        KeyCode::Enter => {
            if !app.image_path_input.trim().is_empty() {
                let path = expand_path(&app.image_path_input);
                select_image(app, path);
            }
            app.show_image_picker = false;
            app.image_path_input.clear();
            app.image_path_cursor = 0;
        }
        _ => {
            edit_text(&mut app.image_path_input, &mut app.image_path_cursor, key);
        }
    }
}

fn handle_api_key_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.show_api_key_input = false;
            app.api_key_input.clear();
        }
        KeyCode::Enter => {
            let key_text = app.api_key_input.trim().to_string();
            if !key_text.is_empty() {
                app.set_api_key(&key_text);
            }
            app.show_api_key_input = false;
            app.api_key_input.clear();
            app.api_key_input_cursor = 0;
        }
        _ => {
            edit_text(&mut app.api_key_input, &mut app.api_key_input_cursor, key);
        }
    }
}

fn handle_model_picker(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.show_model_picker = false,
        KeyCode::Char('j') | KeyCode::Down => app.model_picker_nav_down(),
        KeyCode::Char('k') | KeyCode::Up => app.model_picker_nav_up(),
        KeyCode::Enter => app.select_model(),
        _ => {}
    }
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    if app.screen != Screen::Chat {
        return;
    }
    let in_chat = app
        .chat_area
        .map(|r| point_in_rect(mouse.column, mouse.row, r))
        .unwrap_or(false);
    if !in_chat {
        return;
    }
    match mouse.kind {
        MouseEventKind::ScrollDown => app.scroll_down(3),
        MouseEventKind::ScrollUp => app.scroll_up(3),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventKind;
    use medifind_core::Config;
    use tokio::sync::mpsc;

    fn app() -> App {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut app = App::new(Config::new(), tx);
        app.client = None;
        app
    }

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: crossterm::event::KeyEventState::NONE,
        }
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            handle_key(app, press(KeyCode::Char(c))).unwrap();
        }
    }

    #[test]
    fn test_char_to_byte_index() {
        assert_eq!(char_to_byte_index("héllo", 2), 3);
        assert_eq!(char_to_byte_index("abc", 10), 3);
    }

    #[test]
    fn test_edit_text_utf8() {
        let mut text = String::new();
        let mut cursor = 0;
        for c in "naïve".chars() {
            edit_text(&mut text, &mut cursor, press(KeyCode::Char(c)));
        }
        edit_text(&mut text, &mut cursor, press(KeyCode::Left));
        edit_text(&mut text, &mut cursor, press(KeyCode::Backspace));
        assert_eq!(text, "naïe");
        assert_eq!(cursor, 3);
    }

    #[test]
    fn test_landing_to_chat_and_back() {
        let mut app = app();
        handle_key(&mut app, press(KeyCode::Char('a'))).unwrap();
        assert_eq!(app.screen, Screen::Chat);
        handle_key(&mut app, press(KeyCode::Esc)).unwrap();
        assert_eq!(app.input_mode, InputMode::Normal);
        handle_key(&mut app, press(KeyCode::Esc)).unwrap();
        assert_eq!(app.screen, Screen::Landing);
        handle_key(&mut app, press(KeyCode::Enter)).unwrap();
        assert_eq!(app.screen, Screen::Chat);
    }

    #[test]
    fn test_send_without_key_opens_popup() {
        let mut app = app();
        app.show_chat();
        type_text(&mut app, "headache");
        handle_key(&mut app, press(KeyCode::Enter)).unwrap();

        assert!(app.show_api_key_input);
        assert!(!app.session.is_waiting());
        assert_eq!(app.transcript, vec![ChatEntry::Notice(Notice::MissingApiKey)]);
        assert_eq!(app.query_input, "headache");
    }

    #[test]
    fn test_empty_send_ignored() {
        let mut app = app();
        app.show_chat();
        type_text(&mut app, "   ");
        handle_key(&mut app, press(KeyCode::Enter)).unwrap();
        assert!(!app.show_api_key_input);
        assert!(app.transcript.is_empty());
    }

    #[tokio::test]
    async fn test_send_dispatches_and_clears_input() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut app = App::new(Config::new(), tx);
        // Nothing listens here, so the exchange resolves as a transport failure
        app.client = Some(GeminiClient::with_options(
            "test",
            "http://127.0.0.1:9/v1beta",
            "gemini-test",
            std::time::Duration::from_secs(2),
        ));
        app.show_chat();
        type_text(&mut app, "fever");
        handle_key(&mut app, press(KeyCode::Enter)).unwrap();

        assert!(app.session.is_waiting());
        assert!(app.query_input.is_empty());
        assert_eq!(app.transcript[0], ChatEntry::User { text: "fever".into(), image: None });

        // A second send while waiting is refused
        type_text(&mut app, "cough");
        handle_key(&mut app, press(KeyCode::Enter)).unwrap();
        assert_eq!(app.session.conversation().len(), 1);
        assert!(app.status.is_some());

        let event = loop {
            match rx.recv().await {
                Some(AppEvent::Reply(id, outcome)) => break AppEvent::Reply(id, outcome),
                Some(_) => continue,
                None => panic!("channel closed"),
            }
        };
        handle_event(&mut app, event).await.unwrap();
        assert!(!app.session.is_waiting());
        assert_eq!(app.transcript.last(), Some(&ChatEntry::Notice(Notice::RequestFailed)));
    }

    #[tokio::test]
    async fn test_resize_leaves_state_alone() {
        let mut app = app();
        app.show_chat();
        app.set_query("rash");
        handle_event(&mut app, AppEvent::Resize).await.unwrap();
        assert_eq!(app.screen, Screen::Chat);
        assert_eq!(app.query_input, "rash");
    }

    #[test]
    fn test_expand_path() {
        assert_eq!(expand_path(" /tmp/pill.jpg "), PathBuf::from("/tmp/pill.jpg"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_path("~/pill.jpg"), home.join("pill.jpg"));
        }
    }

    #[tokio::test]
    async fn test_image_picker_selects_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("strip.png");
        std::fs::write(&path, [0x89, 0x50, 0x4e, 0x47]).unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut app = App::new(Config::new(), tx);
        app.show_chat();
        handle_key(&mut app, KeyEvent {
            modifiers: KeyModifiers::CONTROL,
            ..press(KeyCode::Char('o'))
        })
        .unwrap();
        assert!(app.show_image_picker);

        type_text(&mut app, &path.display().to_string());
        handle_key(&mut app, press(KeyCode::Enter)).unwrap();
        assert!(!app.show_image_picker);

        let event = loop {
            match rx.recv().await {
                Some(AppEvent::Image(event)) => break event,
                Some(_) => continue,
                None => panic!("channel closed"),
            }
        };
        app.apply_image(event);
        assert_eq!(app.session.pending().label(), Some("strip.png"));
        assert_eq!(app.session.pending().image().map(|i| i.mime_type.as_str()), Some("image/png"));
    }
}
