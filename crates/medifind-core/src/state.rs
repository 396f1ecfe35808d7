//! UI-agnostic conversation state
//!
//! The conversation is the context sent to the model on every request. It is
//! append-only: turns are never edited, removed or reordered.

use crate::image::EncodedImage;

/// The author of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

/// One piece of a turn's content
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnPart {
    Text(String),
    Image(EncodedImage),
}

/// One message in the conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    role: Role,
    parts: Vec<TurnPart>,
}

impl Turn {
    pub fn user(parts: Vec<TurnPart>) -> Self {
        Self { role: Role::User, parts }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            parts: vec![TurnPart::Text(text.into())],
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn parts(&self) -> &[TurnPart] {
        &self.parts
    }

    /// First text part, if any
    pub fn text(&self) -> Option<&str> {
        self.parts.iter().find_map(|p| match p {
            TurnPart::Text(t) => Some(t.as_str()),
            TurnPart::Image(_) => None,
        })
    }

    pub fn image(&self) -> Option<&EncodedImage> {
        self.parts.iter().find_map(|p| match p {
            TurnPart::Image(img) => Some(img),
            TurnPart::Text(_) => None,
        })
    }
}

/// Append-only, chronologically ordered turn history
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_preserves_order() {
        let mut conversation = Conversation::new();
        conversation.push(Turn::user(vec![TurnPart::Text("headache".into())]));
        conversation.push(Turn::model("{\"medicines\":[]}"));
        conversation.push(Turn::user(vec![TurnPart::Text("fever".into())]));

        let roles: Vec<Role> = conversation.turns().iter().map(|t| t.role()).collect();
        assert_eq!(roles, vec![Role::User, Role::Model, Role::User]);
        assert_eq!(conversation.last().and_then(|t| t.text()), Some("fever"));
    }

    #[test]
    fn test_turn_accessors() {
        let image = EncodedImage::new("image/png", "aGVsbG8=");
        let turn = Turn::user(vec![
            TurnPart::Text("what is this".into()),
            TurnPart::Image(image.clone()),
        ]);
        assert_eq!(turn.text(), Some("what is this"));
        assert_eq!(turn.image(), Some(&image));
        assert_eq!(Turn::model("x").image(), None);
    }
}
