//! Request building: instruction prompt + history + the new user turn

use serde_json::json;

use crate::ai::gemini::{Content, GenerateContentRequest, GenerationConfig};
use crate::error::SendError;
use crate::image::EncodedImage;
use crate::state::{Turn, TurnPart};

pub const SYSTEM_PROMPT: &str = "You are an AI assistant that provides medicine information in a structured JSON format. \
Based on the user's query (a symptom, a medicine name, or an image), find relevant over-the-counter (OTC) medicines. \
Return a JSON object with a key 'medicines' which is an array of medicine objects. \
For a symptom, provide 1-2 generic and 1-2 branded options. \
For a specific medicine name, provide its details and one alternative. \
Each medicine object must conform to the specified schema. \
Do not invent medicines. Use common, well-known examples. \
The 'effectiveness' should be a random-seeming integer between 70 and 95. \
The 'price' should be a realistic example in local currency (e.g., INR). \
Crucially, do not give prescriptive medical advice or specific dosage. \
Use the 'commonUse' field to describe typical application, not a direct order.";

/// Sent in place of the user's text when only an image is attached
pub const IMAGE_FALLBACK_PROMPT: &str =
    "Identify the medicine in the image or suggest something for the described symptom.";

/// Output schema the model is asked to follow; mirrors `medicine::RawMedicine`
pub fn response_schema() -> serde_json::Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "medicines": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "medicineName": { "type": "STRING" },
                        "type": { "type": "STRING", "enum": ["Generic", "Branded"] },
                        "commonUse": { "type": "STRING" },
                        "price": { "type": "STRING" },
                        "instructions": { "type": "STRING" },
                        "effectiveness": { "type": "INTEGER" },
                        "sideEffects": { "type": "STRING" }
                    },
                    "required": [
                        "medicineName", "type", "commonUse", "price",
                        "instructions", "effectiveness", "sideEffects"
                    ]
                }
            }
        }
    })
}

/// Combine typed text and an optional image into the next user turn.
///
/// At least one of the two must be present.
pub fn user_turn(text: &str, image: Option<EncodedImage>) -> Result<Turn, SendError> {
    let text = text.trim();
    if text.is_empty() && image.is_none() {
        return Err(SendError::EmptyInput);
    }

    let text = if text.is_empty() { IMAGE_FALLBACK_PROMPT } else { text };
    let mut parts = vec![TurnPart::Text(text.to_string())];
    if let Some(image) = image {
        parts.push(TurnPart::Image(image));
    }
    Ok(Turn::user(parts))
}

/// Instruction prompt first, then the prior history, then `new_turn`
pub fn build_request(history: &[Turn], new_turn: &Turn) -> GenerateContentRequest {
    let mut contents = Vec::with_capacity(history.len() + 2);
    contents.push(Content::user_text(SYSTEM_PROMPT));
    contents.extend(history.iter().map(Content::from));
    contents.push(Content::from(new_turn));

    GenerateContentRequest {
        contents,
        generation_config: GenerationConfig {
            response_mime_type: "application/json".to_string(),
            response_schema: response_schema(),
        },
    }
}
