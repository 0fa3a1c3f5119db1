use crate::{error::Error, model::ConversationContext};

/// One decoded unit of a generation stream.
///
/// A well-formed stream is zero or more [`StreamEvent::Token`]s
/// followed by exactly one terminal event.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
    Token { text: String },
    Done { context: Option<ConversationContext> },
    Error { message: String },
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done { .. } | StreamEvent::Error { .. })
    }
}

impl From<Error> for StreamEvent {
    fn from(error: Error) -> Self {
        StreamEvent::Error {
            message: error.to_string(),
        }
    }
}
