use crate::model::{ConversationContext, ModelName};

/// The active model and the server's continuation context for it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Conversation {
    model: Option<ModelName>,
    context: Option<ConversationContext>,
}

impl Conversation {
    pub fn model(&self) -> Option<&ModelName> {
        self.model.as_ref()
    }

    pub fn context(&self) -> Option<&ConversationContext> {
        self.context.as_ref()
    }

    /// Switch models. Context from the previous model is meaningless to the new one.
    pub fn select_model(&mut self, model: ModelName) {
        self.model = Some(model);
        self.context = None;
    }

    /// Replace the context wholesale after a completed turn.
    pub fn complete_turn(&mut self, context: Option<ConversationContext>) {
        self.context = context;
    }

    pub fn reset_context(&mut self) {
        self.context = None;
    }
}
