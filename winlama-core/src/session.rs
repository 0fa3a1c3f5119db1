use tokio::task::JoinHandle;

use crate::{
    client::Client,
    conversation::Conversation,
    model::ModelName,
    queue::{message_queue, TurnId, UiUpdate, UpdateQueue, UpdateSender},
    transcript::{Role, Transcript},
    worker::{self, TurnRequest},
};

/// What became of a prompt handed to [`ChatSession::submit`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Submitted {
    /// A worker is generating the response.
    Started(TurnId),
    /// Blank prompt, or a turn is already running.
    Ignored,
    NoModel,
}

/// UI-side state of one chat: transcript, conversation and input controls.
///
/// Everything here is touched only from the UI task.
/// Workers talk to it through the message queue,
/// which [`ChatSession::poll`] drains on a fixed interval.
#[derive(Debug)]
pub struct ChatSession {
    client: Client,
    conversation: Conversation,
    transcript: Transcript,
    sender: UpdateSender,
    queue: UpdateQueue,
    input_enabled: bool,
    focus_requested: bool,
    last_turn: TurnId,
    active_turn: Option<TurnId>,
    worker: Option<JoinHandle<()>>,
}

impl ChatSession {
    pub fn new(client: Client) -> Self {
        let (sender, queue) = message_queue();
        Self {
            client,
            conversation: Default::default(),
            transcript: Default::default(),
            sender,
            queue,
            input_enabled: true,
            focus_requested: false,
            last_turn: TurnId::default(),
            active_turn: None,
            worker: None,
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn model(&self) -> Option<&ModelName> {
        self.conversation.model()
    }

    /// Whether the send control is enabled.
    pub fn is_input_enabled(&self) -> bool {
        self.input_enabled
    }

    pub fn is_generating(&self) -> bool {
        self.active_turn.is_some()
    }

    /// Returns true once after a turn ends, so the shell can refocus the input.
    pub fn take_focus_request(&mut self) -> bool {
        std::mem::take(&mut self.focus_requested)
    }

    /// Switch to `model`, starting a fresh conversation.
    pub fn select_model(&mut self, model: ModelName) {
        tracing::info!(%model, "model selected");
        self.cancel_turn();
        self.conversation.select_model(model);
        self.transcript.clear();
        self.input_enabled = true;
    }

    /// Clear the transcript and forget the context, keeping the model.
    pub fn clear(&mut self) {
        self.cancel_turn();
        self.conversation.reset_context();
        self.transcript.clear();
        self.input_enabled = true;
    }

    /// Append a notice from the shell, e.g. a failed model listing.
    pub fn notify(&mut self, role: Role, text: impl Into<String>) {
        self.transcript.push(role, text);
    }

    /// Send `prompt` to the active model on a background worker.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(&mut self, prompt: &str) -> Submitted {
        let prompt = prompt.trim();
        if prompt.is_empty() || !self.input_enabled {
            return Submitted::Ignored;
        }

        let Some(model) = self.conversation.model().cloned() else {
            self.transcript
                .push(Role::System, "System: Please select a model first.");
            return Submitted::NoModel;
        };

        self.transcript.push(Role::User, prompt);
        self.transcript
            .push(Role::ModelPending, format!("({model}): Thinking..."));
        self.input_enabled = false;

        let turn = self.last_turn.next();
        self.last_turn = turn;
        self.active_turn = Some(turn);

        let request = TurnRequest {
            turn,
            model,
            prompt: prompt.to_string(),
            context: self.conversation.context().cloned(),
        };
        tracing::debug!(?turn, model = %request.model, "starting turn");
        self.worker = Some(worker::spawn(&self.client, request, self.sender.clone()));

        Submitted::Started(turn)
    }

    /// Drain the updates queued so far and apply them in order.
    /// Returns how many were applied.
    pub fn poll(&mut self) -> usize {
        let updates: Vec<UiUpdate> = self.queue.drain().collect();
        let mut applied = 0;
        for update in updates {
            if self.apply(update) {
                applied += 1;
            }
        }
        applied
    }

    /// Apply one update. Updates from a turn that is no longer active are dropped.
    pub fn apply(&mut self, update: UiUpdate) -> bool {
        if self.active_turn != Some(update.turn()) {
            tracing::debug!(
                turn = ?update.turn(),
                model = %update.model(),
                update = update.as_ref(),
                active = ?self.active_turn,
                "dropping update from an inactive turn"
            );
            return false;
        }

        match update {
            UiUpdate::StreamChunk { text, first, .. } => {
                if first {
                    self.transcript.open_response(&text);
                } else {
                    self.transcript.append_response(&text);
                }
            }
            UiUpdate::StreamDone { context, .. } => {
                self.conversation.complete_turn(context);
                self.transcript.remove_pending();
                self.transcript.close_response();
                self.finish_turn();
            }
            UiUpdate::StreamError { model, message, .. } => {
                self.transcript.remove_pending();
                self.transcript.close_response();
                self.transcript
                    .push(Role::Error, format!("Error from {model}: {message}"));
                self.finish_turn();
            }
        }
        true
    }

    fn finish_turn(&mut self) {
        self.active_turn = None;
        self.worker = None;
        self.input_enabled = true;
        self.focus_requested = true;
    }

    fn cancel_turn(&mut self) {
        if let Some(worker) = self.worker.take() {
            tracing::debug!(turn = ?self.active_turn, "aborting in-flight turn");
            worker.abort();
        }
        self.active_turn = None;
    }
}
