/// Fixed user-visible notices shown in the chat transcript
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Shown after every set of medicine cards
    Disclaimer,
    /// The model answered with zero records
    NoResults,
    /// The model answered but not with usable structured data
    Unstructured,
    /// The call itself failed
    RequestFailed,
    NoSpeech,
    SpeechNetwork,
    /// The selected image could not be read
    ImageFailed(String),
    /// Shown when a send is attempted without an API key configured
    MissingApiKey,
}

pub const DISCLAIMER_TITLE: &str = "Important Disclaimer";

impl Notice {
    pub fn text(&self) -> String {
        match self {
            Notice::Disclaimer => "I am an AI assistant, not a medical professional. This information is for educational purposes only. Always seek the advice of your physician or other qualified health provider with any questions you may have regarding a medical condition.".to_string(),
            Notice::NoResults => "I couldn't find specific medicine information for that. Could you try rephrasing?".to_string(),
            Notice::Unstructured => "I'm sorry, I couldn't generate a structured response. Please try again.".to_string(),
            Notice::RequestFailed => "There was an error. I might not be able to provide structured results for that query. Please try asking in a different way.".to_string(),
            Notice::NoSpeech => "No speech was detected. Please try again and speak clearly.".to_string(),
            Notice::SpeechNetwork => "A network error occurred during speech recognition. Please check your connection.".to_string(),
            Notice::ImageFailed(reason) => format!("I couldn't read that image: {}", reason),
            Notice::MissingApiKey => "Gemini API key not configured. Enter one to continue, or set GEMINI_API_KEY.".to_string(),
        }
    }

    /// Disclaimers get their own card styling rather than an AI bubble
    pub fn is_disclaimer(&self) -> bool {
        matches!(self, Notice::Disclaimer)
    }
}
