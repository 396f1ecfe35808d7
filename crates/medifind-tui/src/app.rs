use std::sync::Arc;

use medifind_core::{
    ChatSession, Config, GeminiClient, ImageEvent, Notice, Outcome, Reply, RequestId, SpeechEvent,
    SpeechInput, SpeechRecognizer,
};
use ratatui::layout::Rect;
use ratatui::widgets::ListState;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use crate::cards::{self, ChatEntry};
use crate::tui::AppEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Landing,
    Chat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

/// The two call-to-action buttons on the landing view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandingButton {
    GetStarted,
    TryAi,
}

pub const PLACEHOLDER: &str = "Describe a symptom...";
pub const PLACEHOLDER_WITH_IMAGE: &str = "Image selected. Add a comment and send.";

pub struct App {
    // Core state
    pub should_quit: bool,
    pub screen: Screen,
    pub input_mode: InputMode,
    pub landing_button: LandingButton,

    // Conversation
    pub session: ChatSession,
    pub transcript: Vec<ChatEntry>,

    // Chat input
    pub query_input: String,
    pub query_cursor: usize,
    pub chat_scroll: u16,
    pub chat_height: u16, // Height of chat area for scroll calculations
    pub chat_width: u16,  // Width of chat area for wrap calculations
    pub chat_area: Option<Rect>,

    /// One-line footer message (e.g. why a send was ignored)
    pub status: Option<String>,

    pub animation_frame: u8, // 0-2 for ellipsis animation

    pub speech: SpeechInput,

    // AI client
    pub config: Config,
    pub client: Option<GeminiClient>,
    pub selected_model: String,

    // Model picker popup
    pub show_model_picker: bool,
    pub available_models: Vec<String>,
    pub model_picker_state: ListState,

    // API key input popup
    pub show_api_key_input: bool,
    pub api_key_input: String,
    pub api_key_input_cursor: usize,

    // Image picker popup
    pub show_image_picker: bool,
    pub image_path_input: String,
    pub image_path_cursor: usize,

    /// Channel background tasks report back on
    pub events: UnboundedSender<AppEvent>,
}

impl App {
    pub fn new(config: Config, events: UnboundedSender<AppEvent>) -> Self {
        let client = config.gemini_client();
        if client.is_none() {
            warn!("no Gemini API key configured; will prompt on first send");
        }

        let recognizer = config
            .speech_recognizer()
            .map(|r| Arc::new(r) as Arc<dyn SpeechRecognizer>);

        let selected_model = config.model().to_string();

        Self {
            should_quit: false,
            screen: Screen::Landing,
            input_mode: InputMode::Normal,
            landing_button: LandingButton::GetStarted,

            session: ChatSession::new(),
            transcript: Vec::new(),

            query_input: String::new(),
            query_cursor: 0,
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            chat_area: None,

            status: None,
            animation_frame: 0,

            speech: SpeechInput::new(recognizer),

            config,
            client,
            selected_model,

            show_model_picker: false,
            available_models: Vec::new(),
            model_picker_state: ListState::default(),

            show_api_key_input: false,
            api_key_input: String::new(),
            api_key_input_cursor: 0,

            show_image_picker: false,
            image_path_input: String::new(),
            image_path_cursor: 0,

            events,
        }
    }

    // View switching: Get Started / Try AI open the chat, Back returns home
    pub fn show_chat(&mut self) {
        self.screen = Screen::Chat;
        self.input_mode = InputMode::Editing;
        self.query_cursor = self.query_input.chars().count();
    }

    pub fn show_home(&mut self) {
        self.screen = Screen::Landing;
        self.input_mode = InputMode::Normal;
    }

    pub fn is_thinking(&self) -> bool {
        self.session.is_waiting()
    }

    pub fn placeholder(&self) -> &'static str {
        if self.session.pending().is_empty() {
            PLACEHOLDER
        } else {
            PLACEHOLDER_WITH_IMAGE
        }
    }

    pub fn set_query(&mut self, text: &str) {
        self.query_input = text.to_string();
        self.query_cursor = self.query_input.chars().count();
    }

    pub fn clear_query(&mut self) {
        self.query_input.clear();
        self.query_cursor = 0;
    }

    pub fn push_notice(&mut self, notice: Notice) {
        self.transcript.push(ChatEntry::Notice(notice));
        self.scroll_chat_to_bottom();
    }

    /// Apply a finished request to the session and transcript
    pub fn apply_reply(&mut self, id: RequestId, outcome: Outcome) {
        match self.session.resolve(id, outcome) {
            Ok(replies) => {
                for reply in replies {
                    self.transcript.push(match reply {
                        Reply::Medicines(records) => ChatEntry::Medicines(records),
                        Reply::Notice(notice) => ChatEntry::Notice(notice),
                    });
                }
                self.status = None;
                self.scroll_chat_to_bottom();
            }
            Err(e) => warn!(error = %e, "dropping reply"),
        }
    }

    pub fn apply_speech(&mut self, event: SpeechEvent) {
        self.speech.apply(&event);
        match event {
            // The transcript replaces whatever was typed
            SpeechEvent::Transcript(text) => self.set_query(&text),
            SpeechEvent::Failed(kind) => {
                if let Some(notice) = kind.notice() {
                    self.push_notice(notice);
                }
            }
            SpeechEvent::Started | SpeechEvent::Ended => {}
        }
    }

    pub fn apply_image(&mut self, event: ImageEvent) {
        match event {
            ImageEvent::Encoded { selection, label, image } => {
                if !self.session.pending_mut().complete(selection, label, image) {
                    debug!("discarding image from a superseded selection");
                }
            }
            ImageEvent::Failed { selection, reason } => {
                if self.session.pending().is_current(selection) {
                    self.push_notice(Notice::ImageFailed(reason));
                }
            }
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.is_thinking() || self.speech.is_listening() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn chat_lines(&self) -> Vec<ratatui::text::Line<'static>> {
        cards::transcript_lines(
            &self.transcript,
            self.is_thinking(),
            self.animation_frame,
            self.card_width(),
        )
    }

    /// Cards are laid out a little narrower than the chat pane
    pub fn card_width(&self) -> usize {
        if self.chat_width > 0 {
            (self.chat_width as usize).min(72)
        } else {
            60
        }
    }

    /// Scroll chat to bottom so the latest entry (or "Thinking...") is visible
    pub fn scroll_chat_to_bottom(&mut self) {
        // Use actual chat width for wrap calculation, default to 60 if not set
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            60
        };
        let total_lines = cards::wrapped_height(&self.chat_lines(), wrap_width) as u16;

        let visible_height = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };

        self.chat_scroll = total_lines.saturating_sub(visible_height);
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines);
    }

    pub fn model_picker_nav_down(&mut self) {
        if self.available_models.is_empty() {
            return;
        }
        let i = self.model_picker_state.selected().unwrap_or(0);
        let next = (i + 1).min(self.available_models.len() - 1);
        self.model_picker_state.select(Some(next));
    }

    pub fn model_picker_nav_up(&mut self) {
        let i = self.model_picker_state.selected().unwrap_or(0);
        self.model_picker_state.select(Some(i.saturating_sub(1)));
    }

    /// Switch to the highlighted model and rebuild the client for it
    pub fn select_model(&mut self) {
        if let Some(i) = self.model_picker_state.selected() {
            if let Some(model) = self.available_models.get(i).cloned() {
                self.selected_model = model.clone();
                self.config.model = Some(model.clone());
                if let Some(key) = self.config.api_key() {
                    self.client = self.config.client_with_key(&key);
                }
                if let Err(e) = Config::save_model(&model) {
                    warn!(error = %e, "could not save model choice");
                }
            }
        }
        self.show_model_picker = false;
    }

    /// Store a key typed into the popup and build a client from it
    pub fn set_api_key(&mut self, key: &str) {
        self.config.gemini_api_key = Some(key.to_string());
        self.client = self.config.client_with_key(key);
        if let Err(e) = Config::save_api_key(key) {
            warn!(error = %e, "could not save API key");
        }
    }
}
