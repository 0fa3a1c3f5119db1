use std::{any::Any, panic::AssertUnwindSafe};

use futures::{FutureExt as _, Stream, StreamExt as _};
use tokio::task::JoinHandle;
use tracing::instrument;

use crate::{
    client::Client,
    event::StreamEvent,
    model::{ConversationContext, ModelName},
    queue::{TurnId, UiUpdate, UpdateSender},
};

/// Everything a worker needs to run one turn.
#[derive(Clone, Debug)]
pub struct TurnRequest {
    pub turn: TurnId,
    pub model: ModelName,
    pub prompt: String,
    pub context: Option<ConversationContext>,
}

/// Run one turn on the runtime, off the UI task.
///
/// Aborting the returned handle drops the stream and closes the connection.
pub fn spawn(client: &Client, request: TurnRequest, updates: UpdateSender) -> JoinHandle<()> {
    let events = client.generate_stream(
        request.model.clone(),
        request.prompt.clone(),
        request.context.clone(),
    );
    let TurnRequest { turn, model, .. } = request;

    tokio::spawn(async move {
        let outcome = AssertUnwindSafe(forward(events, turn, model.clone(), &updates))
            .catch_unwind()
            .await;

        if let Err(panic) = outcome {
            let message = panic_message(panic.as_ref());
            tracing::error!(%message, %model, "generation worker panicked");
            updates.send(UiUpdate::StreamError {
                turn,
                model,
                message: format!("Application error: {message}"),
            });
        }
    })
}

/// Translate stream events into UI updates until the stream terminates.
///
/// Exactly one `StreamDone` or `StreamError` is sent per call.
#[instrument(skip(events, updates))]
pub async fn forward<S>(events: S, turn: TurnId, model: ModelName, updates: &UpdateSender)
where
    S: Stream<Item = StreamEvent>,
{
    let mut events = std::pin::pin!(events);
    let mut first = true;

    while let Some(event) = events.next().await {
        match event {
            StreamEvent::Token { text } if text.is_empty() => {}
            StreamEvent::Token { text } => {
                let text = if first {
                    format!("Ollama ({model}): {text}")
                } else {
                    text
                };
                updates.send(UiUpdate::StreamChunk {
                    turn,
                    model: model.clone(),
                    text,
                    first,
                });
                first = false;
            }
            StreamEvent::Done { context } => {
                tracing::debug!("generation finished");
                updates.send(UiUpdate::StreamDone {
                    turn,
                    model,
                    context,
                });
                return;
            }
            StreamEvent::Error { message } => {
                tracing::warn!(%message, "generation failed");
                updates.send(UiUpdate::StreamError {
                    turn,
                    model,
                    message,
                });
                return;
            }
        }
    }

    tracing::warn!("event stream ended without a final event");
    updates.send(UiUpdate::StreamError {
        turn,
        model,
        message: "response ended unexpectedly".into(),
    });
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|message| message.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".into())
}
