//! Request/response exchange and the session state that drives it
//!
//! `ChatSession` owns everything that used to be ambient state in a chat
//! widget: the conversation, the pending image and the in-flight marker. The
//! UI loop owns the session; the network call runs elsewhere and hands back an
//! [`Outcome`] tagged with the [`RequestId`] it was dispatched under.

use tracing::{info, warn};

use crate::ai::gemini::{GenerateContentRequest, GenerateContentResponse, GeminiClient};
use crate::error::{SendError, TransportError};
use crate::image::{EncodedImage, PendingInput};
use crate::medicine::{parse_medicines, MedicineRecord};
use crate::notice::Notice;
use crate::request::{build_request, user_turn};
use crate::state::{Conversation, Turn};

/// Classification of a finished call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Valid records, at least one. `raw` is the model's JSON text.
    Structured {
        raw: String,
        records: Vec<MedicineRecord>,
    },
    /// Valid response with zero records
    Empty,
    /// The call succeeded but the body was unusable
    Malformed(String),
    /// Non-2xx status or network failure
    TransportFailure(String),
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Structured { .. } => "structured",
            Outcome::Empty => "empty",
            Outcome::Malformed(_) => "malformed",
            Outcome::TransportFailure(_) => "transport_failure",
        }
    }
}

/// Classify the result of [`GeminiClient::generate`]
pub fn classify(result: Result<String, TransportError>) -> Outcome {
    let body = match result {
        Ok(body) => body,
        Err(e) => return Outcome::TransportFailure(e.to_string()),
    };

    let envelope: GenerateContentResponse = match serde_json::from_str(&body) {
        Ok(envelope) => envelope,
        Err(e) => return Outcome::Malformed(format!("response body is not valid JSON: {}", e)),
    };

    let Some(text) = envelope.first_text() else {
        return Outcome::Malformed("response has no candidate text".to_string());
    };

    match parse_medicines(text) {
        Ok(records) if records.is_empty() => Outcome::Empty,
        Ok(records) => Outcome::Structured {
            raw: text.to_string(),
            records,
        },
        Err(reason) => Outcome::Malformed(reason),
    }
}

/// Perform the call and classify it. Never retries.
pub async fn exchange(client: &GeminiClient, request: &GenerateContentRequest) -> Outcome {
    let outcome = classify(client.generate(request).await);
    match &outcome {
        Outcome::Malformed(reason) => warn!(%reason, "malformed Gemini response"),
        Outcome::TransportFailure(reason) => warn!(%reason, "Gemini call failed"),
        _ => {}
    }
    outcome
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(u64);

impl RequestId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// A request that has been committed to the conversation and should now be sent
#[derive(Debug, Clone)]
pub struct Dispatch {
    pub id: RequestId,
    pub request: GenerateContentRequest,
    /// The text as typed (empty when only an image was sent)
    pub text: String,
    pub image: Option<EncodedImage>,
    pub image_label: Option<String>,
}

/// Something to show in the transcript after a request resolves
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Medicines(Vec<MedicineRecord>),
    Notice(Notice),
}

#[derive(Debug, Default)]
pub struct ChatSession {
    conversation: Conversation,
    pending: PendingInput,
    in_flight: Option<RequestId>,
    next_id: u64,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn pending(&self) -> &PendingInput {
        &self.pending
    }

    pub fn pending_mut(&mut self) -> &mut PendingInput {
        &mut self.pending
    }

    /// True exactly while a dispatched request has not been resolved
    pub fn is_waiting(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Whether a send would currently be accepted for `text`
    pub fn can_send(&self, text: &str) -> bool {
        !self.is_waiting() && (!text.trim().is_empty() || !self.pending.is_empty())
    }

    /// Build the next request and commit the user turn.
    ///
    /// The pending image is consumed and the user turn is appended whatever
    /// the eventual outcome. Refused while another request is outstanding.
    pub fn begin_send(&mut self, text: &str) -> Result<Dispatch, SendError> {
        if self.is_waiting() {
            return Err(SendError::RequestInFlight);
        }
        if text.trim().is_empty() && self.pending.is_empty() {
            return Err(SendError::EmptyInput);
        }

        let image_label = self.pending.label().map(str::to_string);
        let image = self.pending.take();
        let turn = user_turn(text, image.clone())?;
        let request = build_request(self.conversation.turns(), &turn);
        self.conversation.push(turn);

        self.next_id += 1;
        let id = RequestId(self.next_id);
        self.in_flight = Some(id);

        info!(
            request = id.0,
            history = self.conversation.len(),
            has_image = image.is_some(),
            "dispatching request"
        );

        Ok(Dispatch {
            id,
            request,
            text: text.trim().to_string(),
            image,
            image_label,
        })
    }

    /// Apply the outcome of request `id`.
    ///
    /// Clears the in-flight marker on every path. Only a structured success
    /// touches the conversation (one model turn is appended).
    pub fn resolve(&mut self, id: RequestId, outcome: Outcome) -> Result<Vec<Reply>, SendError> {
        if self.in_flight != Some(id) {
            warn!(request = id.0, "ignoring reply for a request that is not outstanding");
            return Err(SendError::UnknownRequest(id.0));
        }
        self.in_flight = None;

        info!(request = id.0, outcome = outcome.label(), "request resolved");

        let replies = match outcome {
            Outcome::Structured { raw, records } => {
                self.conversation.push(Turn::model(raw));
                vec![Reply::Medicines(records), Reply::Notice(Notice::Disclaimer)]
            }
            Outcome::Empty => vec![Reply::Notice(Notice::NoResults)],
            Outcome::Malformed(_) => vec![Reply::Notice(Notice::Unstructured)],
            Outcome::TransportFailure(_) => vec![Reply::Notice(Notice::RequestFailed)],
        };
        Ok(replies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Role;

    fn envelope(text: &str) -> String {
        serde_json::json!({
            "candidates": [{ "content": { "role": "model", "parts": [{ "text": text }] } }]
        })
        .to_string()
    }

    fn ibuprofen() -> String {
        r#"{"medicines":[{"medicineName":"Ibuprofen","type":"Generic","commonUse":"Pain","price":"INR 40","instructions":"After food","effectiveness":85,"sideEffects":"Stomach upset"}]}"#.to_string()
    }

    fn all_outcomes() -> Vec<Outcome> {
        vec![
            classify(Ok(envelope(&ibuprofen()))),
            classify(Ok(envelope(r#"{"medicines":[]}"#))),
            classify(Ok(r#"{"candidates":[]}"#.to_string())),
            classify(Err(TransportError::Status {
                status: 500,
                body: "boom".into(),
            })),
        ]
    }

    #[test]
    fn test_classify_structured() {
        match classify(Ok(envelope(&ibuprofen()))) {
            Outcome::Structured { raw, records } => {
                assert_eq!(raw, ibuprofen());
                assert_eq!(records[0].name, "Ibuprofen");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_classify_empty() {
        assert_eq!(classify(Ok(envelope(r#"{"medicines":[]}"#))), Outcome::Empty);
        assert_eq!(classify(Ok(envelope(r#"{"medicines":null}"#))), Outcome::Empty);
    }

    #[test]
    fn test_classify_malformed() {
        for body in [
            r#"{"candidates":[]}"#.to_string(),
            "<html>proxy error</html>".to_string(),
            envelope("Here are some medicines for you"),
            envelope(r#"{"medicines":[{"medicineName":"X"}]}"#),
        ] {
            assert!(matches!(classify(Ok(body.clone())), Outcome::Malformed(_)), "{}", body);
        }
    }

    #[test]
    fn test_classify_transport_failure() {
        let outcome = classify(Err(TransportError::Status {
            status: 503,
            body: "unavailable".into(),
        }));
        assert!(matches!(outcome, Outcome::TransportFailure(ref r) if r.contains("503")));
        assert!(matches!(classify(Err(TransportError::MissingApiKey)), Outcome::TransportFailure(_)));
    }

    #[test]
    fn test_history_grows_only_on_structured_success() {
        for outcome in all_outcomes() {
            let mut session = ChatSession::new();
            let dispatch = session.begin_send("headache").unwrap();
            let after_dispatch = session.conversation().len();
            assert_eq!(after_dispatch, 1);

            let structured = matches!(outcome, Outcome::Structured { .. });
            session.resolve(dispatch.id, outcome).unwrap();

            let expected = if structured { after_dispatch + 1 } else { after_dispatch };
            assert_eq!(session.conversation().len(), expected);
            if structured {
                assert_eq!(session.conversation().last().map(|t| t.role()), Some(Role::Model));
            }
        }
    }

    #[test]
    fn test_waiting_flag_cleared_on_every_outcome() {
        for outcome in all_outcomes() {
            let mut session = ChatSession::new();
            assert!(!session.is_waiting());
            let dispatch = session.begin_send("fever").unwrap();
            assert!(session.is_waiting());
            session.resolve(dispatch.id, outcome).unwrap();
            assert!(!session.is_waiting());
        }
    }

    #[test]
    fn test_replies_per_outcome() {
        let mut session = ChatSession::new();
        let id = session.begin_send("x").unwrap().id;
        let replies = session.resolve(id, classify(Ok(envelope(r#"{"medicines":[]}"#)))).unwrap();
        assert_eq!(replies, vec![Reply::Notice(Notice::NoResults)]);

        let id = session.begin_send("x").unwrap().id;
        let replies = session.resolve(id, Outcome::Malformed("no text".into())).unwrap();
        assert_eq!(replies, vec![Reply::Notice(Notice::Unstructured)]);

        let id = session.begin_send("x").unwrap().id;
        let replies = session.resolve(id, classify(Ok(envelope(&ibuprofen())))).unwrap();
        assert!(matches!(replies[0], Reply::Medicines(ref r) if r.len() == 1));
        assert_eq!(replies[1], Reply::Notice(Notice::Disclaimer));
    }

    #[test]
    fn test_second_send_refused_while_waiting() {
        let mut session = ChatSession::new();
        let first = session.begin_send("cold").unwrap();
        assert_eq!(session.begin_send("flu").unwrap_err(), SendError::RequestInFlight);
        assert_eq!(session.conversation().len(), 1);

        session.resolve(first.id, Outcome::Empty).unwrap();
        assert!(session.begin_send("flu").is_ok());
    }

    #[test]
    fn test_stale_reply_rejected() {
        let mut session = ChatSession::new();
        let first = session.begin_send("cold").unwrap();
        session.resolve(first.id, Outcome::Empty).unwrap();
        let second = session.begin_send("flu").unwrap();

        let err = session.resolve(first.id, classify(Ok(envelope(&ibuprofen())))).unwrap_err();
        assert_eq!(err, SendError::UnknownRequest(first.id.value()));
        assert!(session.is_waiting());
        assert_eq!(session.conversation().len(), 2);

        session.resolve(second.id, Outcome::Empty).unwrap();
    }

    #[test]
    fn test_pending_image_consumed_on_send() {
        let mut session = ChatSession::new();
        session
            .pending_mut()
            .replace("pill.jpg", EncodedImage::new("image/jpeg", "AAAA"));
        assert!(session.can_send(""));

        let dispatch = session.begin_send("").unwrap();
        assert_eq!(dispatch.image_label.as_deref(), Some("pill.jpg"));
        assert!(dispatch.image.is_some());
        assert!(session.pending().is_empty());

        let sent = session.conversation().last().unwrap();
        assert_eq!(sent.text(), Some(crate::request::IMAGE_FALLBACK_PROMPT));
        assert!(sent.image().is_some());

        // the image stays in history even though the call failed
        session.resolve(dispatch.id, Outcome::TransportFailure("offline".into())).unwrap();
        assert!(session.conversation().turns()[0].image().is_some());
    }

    #[test]
    fn test_request_carries_prior_history() {
        let mut session = ChatSession::new();
        let first = session.begin_send("cough").unwrap();
        assert_eq!(first.request.contents.len(), 2);
        session.resolve(first.id, classify(Ok(envelope(&ibuprofen())))).unwrap();

        let second = session.begin_send("and for fever?").unwrap();
        // prompt + user + model + new user
        assert_eq!(second.request.contents.len(), 4);
    }

    #[test]
    fn test_empty_send_refused() {
        let mut session = ChatSession::new();
        assert!(!session.can_send("   "));
        assert_eq!(session.begin_send("   ").unwrap_err(), SendError::EmptyInput);
        assert!(!session.is_waiting());
        assert!(session.conversation().is_empty());
    }
}
