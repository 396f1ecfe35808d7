//! Speech input adapter
//!
//! A recognition session goes Idle -> Listening -> Idle and produces exactly
//! one transcript or one failure. Events reach the owner through the sink
//! registered in [`SpeechInput::start`], in the order
//! `Started`, (`Transcript` | `Failed`), `Ended`.

use std::process::Stdio;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::SpeechError;
use crate::notice::Notice;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechErrorKind {
    NoSpeech,
    Network,
    Other(String),
}

impl SpeechErrorKind {
    /// Only the two conditions a user can act on get a notice
    pub fn notice(&self) -> Option<Notice> {
        match self {
            SpeechErrorKind::NoSpeech => Some(Notice::NoSpeech),
            SpeechErrorKind::Network => Some(Notice::SpeechNetwork),
            SpeechErrorKind::Other(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEvent {
    Started,
    Transcript(String),
    Failed(SpeechErrorKind),
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechState {
    Idle,
    Listening,
}

/// Anything that can listen once and return what was said
pub trait SpeechRecognizer: Send + Sync {
    fn recognize(&self) -> BoxFuture<'static, Result<String, SpeechErrorKind>>;
}

/// Runs an external speech-to-text program and reads the transcript from stdout.
///
/// Empty output means nothing was heard. A non-zero exit whose stderr talks
/// about the network or a connection is reported as a network failure.
#[derive(Debug, Clone)]
pub struct CommandRecognizer {
    program: String,
    args: Vec<String>,
}

impl CommandRecognizer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build from an argv list such as `["whisper-listen", "--lang", "en"]`
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        if program.trim().is_empty() {
            return None;
        }
        Some(Self::new(program.clone(), args.to_vec()))
    }
}

fn looks_like_network_error(stderr: &str) -> bool {
    let stderr = stderr.to_lowercase();
    ["network", "connection", "unreachable", "timed out"]
        .iter()
        .any(|needle| stderr.contains(needle))
}

impl SpeechRecognizer for CommandRecognizer {
    fn recognize(&self) -> BoxFuture<'static, Result<String, SpeechErrorKind>> {
        let program = self.program.clone();
        let args = self.args.clone();
        Box::pin(async move {
            let output = Command::new(&program)
                .args(&args)
                .stdin(Stdio::null())
                .output()
                .await
                .map_err(|e| SpeechErrorKind::Other(format!("could not run {}: {}", program, e)))?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                if looks_like_network_error(&stderr) {
                    return Err(SpeechErrorKind::Network);
                }
                return Err(SpeechErrorKind::Other(format!(
                    "{} exited with {}: {}",
                    program,
                    output.status,
                    stderr.trim()
                )));
            }

            let transcript = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if transcript.is_empty() {
                Err(SpeechErrorKind::NoSpeech)
            } else {
                Ok(transcript)
            }
        })
    }
}

pub struct SpeechInput {
    recognizer: Option<Arc<dyn SpeechRecognizer>>,
    state: SpeechState,
}

impl SpeechInput {
    pub fn new(recognizer: Option<Arc<dyn SpeechRecognizer>>) -> Self {
        if recognizer.is_none() {
            warn!("speech recognition is not configured; microphone disabled");
        }
        Self {
            recognizer,
            state: SpeechState::Idle,
        }
    }

    pub fn unsupported() -> Self {
        Self::new(None)
    }

    pub fn is_available(&self) -> bool {
        self.recognizer.is_some()
    }

    pub fn state(&self) -> SpeechState {
        self.state
    }

    pub fn is_listening(&self) -> bool {
        self.state == SpeechState::Listening
    }

    /// Start a recognition session on the current tokio runtime.
    ///
    /// `sink` receives the session's events from the spawned task.
    pub fn start<F>(&mut self, sink: F) -> Result<(), SpeechError>
    where
        F: Fn(SpeechEvent) + Send + 'static,
    {
        let recognizer = self.recognizer.clone().ok_or(SpeechError::Unsupported)?;
        if self.is_listening() {
            return Err(SpeechError::AlreadyListening);
        }
        self.state = SpeechState::Listening;
        info!("speech recognition started");

        tokio::spawn(async move {
            sink(SpeechEvent::Started);
            match recognizer.recognize().await {
                Ok(transcript) => {
                    debug!(chars = transcript.chars().count(), "speech transcript received");
                    sink(SpeechEvent::Transcript(transcript));
                }
                Err(kind) => {
                    warn!(?kind, "speech recognition error");
                    sink(SpeechEvent::Failed(kind));
                }
            }
            sink(SpeechEvent::Ended);
        });
        Ok(())
    }

    /// Track session state from an event delivered by the sink
    pub fn apply(&mut self, event: &SpeechEvent) {
        match event {
            SpeechEvent::Started => self.state = SpeechState::Listening,
            SpeechEvent::Ended => {
                self.state = SpeechState::Idle;
                info!("speech recognition session ended");
            }
            SpeechEvent::Transcript(_) | SpeechEvent::Failed(_) => {}
        }
    }
}
