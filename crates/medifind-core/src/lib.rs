pub mod ai;
pub mod config;
pub mod error;
pub mod exchange;
pub mod image;
pub mod medicine;
pub mod notice;
pub mod request;
pub mod speech;
pub mod state;

// Re-export main types for convenience
pub use ai::GeminiClient;
pub use config::Config;
pub use error::{ImageError, SendError, SpeechError, TransportError};
pub use exchange::{classify, exchange, ChatSession, Dispatch, Outcome, Reply, RequestId};
pub use image::{EncodedImage, ImageEvent, PendingInput, SelectionId};
pub use medicine::{MedicineKind, MedicineRecord};
pub use notice::Notice;
pub use speech::{CommandRecognizer, SpeechEvent, SpeechInput, SpeechRecognizer, SpeechState};
pub use state::{Conversation, Role, Turn, TurnPart};
