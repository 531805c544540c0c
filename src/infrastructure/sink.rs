//! Output sink adapters.

use crate::application::ports::OutputSink;
use crate::domain::message::Message;

/// Sink that hands every message to a closure.
pub struct FnSink<F>
where
    F: Fn(Message) + Send,
{
    f: F,
}

impl<F> FnSink<F>
where
    F: Fn(Message) + Send,
{
    /// Wrap a closure.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> std::fmt::Debug for FnSink<F>
where
    F: Fn(Message) + Send,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnSink").finish_non_exhaustive()
    }
}

impl<F> OutputSink for FnSink<F>
where
    F: Fn(Message) + Send,
{
    fn send(&self, message: Message) {
        (self.f)(message)
    }
}

/// Sink that forwards output into a tokio channel.
///
/// Messages sent after the receiver was dropped are discarded with a
/// warning; a node must keep running even if nobody listens.
#[cfg(feature = "async")]
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: tokio::sync::mpsc::UnboundedSender<Message>,
}

#[cfg(feature = "async")]
impl ChannelSink {
    /// Create a sink and the receiver that yields its output.
    pub fn new() -> (Self, tokio::sync::mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Wrap an existing sender.
    pub fn from_sender(tx: tokio::sync::mpsc::UnboundedSender<Message>) -> Self {
        Self { tx }
    }
}

#[cfg(feature = "async")]
impl OutputSink for ChannelSink {
    fn send(&self, message: Message) {
        if let Err(err) = self.tx.send(message) {
            tracing::warn!(topic = ?err.0.topic, "output receiver dropped, discarding message");
        }
    }
}
