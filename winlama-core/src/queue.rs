use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};

use crate::model::{ConversationContext, ModelName};

/// Identifies one send/response cycle of a chat session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct TurnId(pub u64);

impl TurnId {
    pub fn next(self) -> TurnId {
        TurnId(self.0.wrapping_add(1))
    }
}

/// Instruction from a worker to the UI.
#[derive(Clone, Debug, PartialEq, strum::AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum UiUpdate {
    StreamChunk {
        turn: TurnId,
        model: ModelName,
        text: String,
        /// The opening fragment of the response,
        /// which replaces the pending placeholder.
        first: bool,
    },
    StreamDone {
        turn: TurnId,
        model: ModelName,
        context: Option<ConversationContext>,
    },
    StreamError {
        turn: TurnId,
        model: ModelName,
        message: String,
    },
}

impl UiUpdate {
    pub fn turn(&self) -> TurnId {
        match self {
            UiUpdate::StreamChunk { turn, .. }
            | UiUpdate::StreamDone { turn, .. }
            | UiUpdate::StreamError { turn, .. } => *turn,
        }
    }

    pub fn model(&self) -> &ModelName {
        match self {
            UiUpdate::StreamChunk { model, .. }
            | UiUpdate::StreamDone { model, .. }
            | UiUpdate::StreamError { model, .. } => model,
        }
    }
}

/// Create the unbounded FIFO between workers and the UI poller.
pub fn message_queue() -> (UpdateSender, UpdateQueue) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (UpdateSender(sender), UpdateQueue(receiver))
}

/// Producer half, cloned into each worker.
#[derive(Clone, Debug)]
pub struct UpdateSender(UnboundedSender<UiUpdate>);

impl UpdateSender {
    /// Enqueue an update. Returns false when the UI side is gone.
    pub fn send(&self, update: UiUpdate) -> bool {
        self.0
            .send(update)
            .inspect_err(|error| {
                tracing::debug!(update = error.0.as_ref(), "UI queue closed, dropping update")
            })
            .is_ok()
    }
}

/// Consumer half, owned by the UI.
#[derive(Debug)]
pub struct UpdateQueue(UnboundedReceiver<UiUpdate>);

impl UpdateQueue {
    /// Pop the oldest update without waiting.
    pub fn try_pop(&mut self) -> Option<UiUpdate> {
        match self.0.try_recv() {
            Ok(update) => Some(update),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Pop every update queued at the time of the call, oldest first.
    /// Updates that arrive while draining wait for the next drain.
    pub fn drain(&mut self) -> impl Iterator<Item = UiUpdate> + '_ {
        let pending = self.len();
        std::iter::from_fn(move || self.try_pop()).take(pending)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
