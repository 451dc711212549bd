//! Contains the events and functionality for monitoring the commands the client routes to
//! servers.

use std::time::Duration;

use derive_more::From;
use uuid::Uuid;

use crate::{bson::Document, error::Error, options::ServerAddress};

/// The role a routed command plays with respect to a session's transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, derive_more::Display)]
#[non_exhaustive]
pub enum CommandKind {
    /// A read such as `find` or `count`.
    Read,

    /// A write such as `insert` or `delete`.
    Write,

    /// A user-supplied command run through `run_command`.
    Command,

    /// A `commitTransaction` command.
    CommitTransaction,

    /// An `abortTransaction` command.
    AbortTransaction,
}

/// An event that triggers once a command has been routed to a server and is about to be sent.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct CommandRoutedEvent {
    /// The id of the session the command was sent with, if any.
    pub session_id: Option<Uuid>,

    /// The server the command was routed to.
    pub address: ServerAddress,

    /// The role the command plays with respect to the session's transaction.
    pub command_kind: CommandKind,

    /// The name of the command being run, e.g. "find" or "commitTransaction".
    pub command_name: String,

    /// The name of the database the command is being run against.
    pub db: String,

    /// The client-generated identifier for the request. Applications can use this to identify
    /// the corresponding event triggered by the completion of this command (i.e. either
    /// `CommandSucceededEvent` or `CommandFailedEvent`).
    pub request_id: i32,

    /// Whether the command was routed to the router its session is pinned to.
    pub pinned: bool,

    /// The command being run.
    pub command: Document,

    /// The application name the client was configured with.
    pub app_name: Option<String>,
}

/// An event that triggers when a database command completes without an error.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct CommandSucceededEvent {
    /// The total execution time of the command (including the network round-trip).
    pub duration: Duration,

    /// The server's reply to the command.
    pub reply: Document,

    /// The type of command that was run, e.g. "find" or "hello".
    pub command_name: String,

    /// The client-generated identifier for the request.
    pub request_id: i32,

    /// The server the command ran on.
    pub address: ServerAddress,
}

/// An event that triggers when a command failed to complete successfully.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct CommandFailedEvent {
    /// The total execution time of the command (including the network round-trip).
    pub duration: Duration,

    /// The type of command that was run, e.g. "find" or "hello".
    pub command_name: String,

    /// The error returned for the command.
    pub failure: Error,

    /// The client-generated identifier for the request.
    pub request_id: i32,

    /// The server the command was sent to.
    pub address: ServerAddress,
}

/// Usage of this enum with [`EventHandler`](crate::event::EventHandler) allows a single
/// sink to observe every command the client dispatches.
#[derive(Clone, Debug, From)]
#[non_exhaustive]
#[allow(clippy::large_enum_variant)]
pub enum CommandEvent {
    /// A command was routed to a server.
    Routed(CommandRoutedEvent),
    /// A command completed successfully.
    Succeeded(CommandSucceededEvent),
    /// A command failed.
    Failed(CommandFailedEvent),
}

impl CommandEvent {
    /// The request id shared by the events of one dispatch.
    pub fn request_id(&self) -> i32 {
        match self {
            Self::Routed(event) => event.request_id,
            Self::Succeeded(event) => event.request_id,
            Self::Failed(event) => event.request_id,
        }
    }

    /// The name of the command the event concerns.
    pub fn command_name(&self) -> &str {
        match self {
            Self::Routed(event) => event.command_name.as_str(),
            Self::Succeeded(event) => event.command_name.as_str(),
            Self::Failed(event) => event.command_name.as_str(),
        }
    }
}
