//! Streaming chat pipeline for a local Ollama server.
//!
//! [`Client`] talks HTTP, [`decoder`] turns the NDJSON body into [`StreamEvent`]s,
//! [`worker`] forwards them as [`UiUpdate`]s through the [`queue`],
//! and [`ChatSession::poll`] applies them to the transcript on the UI task.

pub mod client;
pub mod conversation;
pub mod decoder;
pub mod error;
pub mod event;
pub mod model;
pub mod queue;
pub mod session;
pub mod transcript;
pub mod worker;

pub use client::{Client, Generation, ModelHost};
pub use conversation::Conversation;
pub use error::{Error, ErrorKind, Result};
pub use event::StreamEvent;
pub use model::{ConversationContext, ModelName};
pub use queue::{message_queue, TurnId, UiUpdate, UpdateQueue, UpdateSender};
pub use session::{ChatSession, Submitted};
pub use transcript::{Entry, Role, Transcript};
