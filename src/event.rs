//! Contains the events and functionality for monitoring internal `Client` behavior.

pub mod command;

use std::sync::Arc;

use futures_core::future::BoxFuture;

/// Where a [`Client`](crate::Client) delivers the events of the commands it routes.
///
/// A `tokio` channel sender converts into a handler directly, which makes it the easiest way to
/// watch routing decisions from another task:
///
/// ```rust
/// # use shard_session::{event::command::CommandEvent, options::ClientOptions};
/// # async fn example() {
/// let (tx, mut rx) = tokio::sync::mpsc::channel(100);
/// tokio::spawn(async move {
///     while let Some(event) = rx.recv().await {
///         if let CommandEvent::Routed(routed) = event {
///             println!("{} -> {} (pinned: {})", routed.command_name, routed.address, routed.pinned);
///         }
///     }
/// });
/// let options = ClientOptions::builder()
///     .command_event_handler(tx)
///     .build();
/// # }
/// ```
///
/// Plain closures go through [`EventHandler::callback`] and run inline, before the operation
/// that produced the event returns:
///
/// ```rust
/// # use shard_session::{event::{command::CommandEvent, EventHandler}, options::ClientOptions};
/// let options = ClientOptions::builder()
///     .command_event_handler(EventHandler::callback(|event: CommandEvent| {
///         println!("{:?}", event)
///     }))
///     .build();
/// ```
#[derive(Clone)]
#[non_exhaustive]
pub enum EventHandler<T> {
    /// A callback.
    Callback(Arc<dyn Fn(T) + Sync + Send>),
    /// An async callback.
    AsyncCallback(Arc<dyn Fn(T) -> BoxFuture<'static, ()> + Sync + Send>),
    /// A `tokio` channel sender.
    TokioMpsc(tokio::sync::mpsc::Sender<T>),
}

impl<T> std::fmt::Debug for EventHandler<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("EventHandler").finish()
    }
}

impl<T> From<tokio::sync::mpsc::Sender<T>> for EventHandler<T> {
    fn from(value: tokio::sync::mpsc::Sender<T>) -> Self {
        Self::TokioMpsc(value)
    }
}

impl<T: Send + Sync + 'static> EventHandler<T> {
    /// A handler that calls `f` synchronously for each event.
    pub fn callback(f: impl Fn(T) + Send + Sync + 'static) -> Self {
        Self::Callback(Arc::new(f))
    }

    /// A handler that spawns the future `f` returns for each event onto the current runtime.
    pub fn async_callback(f: impl Fn(T) -> BoxFuture<'static, ()> + Send + Sync + 'static) -> Self {
        Self::AsyncCallback(Arc::new(f))
    }

    /// Delivers `event`. Async callbacks and channel sends are spawned onto the current tokio
    /// runtime so that dispatch never waits on a slow consumer.
    pub(crate) fn handle(&self, event: T) {
        match self {
            Self::Callback(cb) => (cb)(event),
            Self::AsyncCallback(cb) => {
                tokio::spawn((cb)(event));
            }
            Self::TokioMpsc(sender) => {
                let sender = sender.clone();
                tokio::spawn(async move {
                    let _ = sender.send(event).await;
                });
            }
        }
    }
}
