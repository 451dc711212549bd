use crate::{
    event::command::CommandEvent,
    trace::{
        serialize_command_or_reply,
        TracingRepresentation,
        COMMAND_TRACING_EVENT_TARGET,
        DEFAULT_MAX_DOCUMENT_LENGTH_BYTES,
    },
};

/// Type responsible for listening for command monitoring events and converting them to
/// and emitting them as tracing events.
#[derive(Debug)]
pub(crate) struct CommandTracingEventEmitter {
    max_document_length_bytes: usize,
}

impl CommandTracingEventEmitter {
    pub(crate) fn new(max_document_length_bytes: Option<usize>) -> CommandTracingEventEmitter {
        CommandTracingEventEmitter {
            max_document_length_bytes: max_document_length_bytes
                .unwrap_or(DEFAULT_MAX_DOCUMENT_LENGTH_BYTES),
        }
    }

    pub(crate) fn handle(&self, event: CommandEvent) {
        match event {
            CommandEvent::Routed(event) => {
                tracing::debug!(
                    target: COMMAND_TRACING_EVENT_TARGET,
                    command = serialize_command_or_reply(event.command, self.max_document_length_bytes),
                    databaseName = event.db,
                    commandName = event.command_name,
                    commandKind = %event.command_kind,
                    requestId = event.request_id,
                    sessionId = event.session_id.map(|id| id.tracing_representation()),
                    pinned = event.pinned,
                    appName = event.app_name.as_deref(),
                    serverHost = event.address.host(),
                    serverPort = event.address.port_tracing_representation(),
                    "Command routed"
                );
            }
            CommandEvent::Succeeded(event) => {
                tracing::debug!(
                    target: COMMAND_TRACING_EVENT_TARGET,
                    reply = serialize_command_or_reply(event.reply, self.max_document_length_bytes),
                    commandName = event.command_name,
                    requestId = event.request_id,
                    serverHost = event.address.host(),
                    serverPort = event.address.port_tracing_representation(),
                    durationMS = event.duration.as_millis(),
                    "Command succeeded"
                );
            }
            CommandEvent::Failed(event) => {
                tracing::debug!(
                    target: COMMAND_TRACING_EVENT_TARGET,
                    failure = event.failure.tracing_representation(),
                    commandName = event.command_name,
                    requestId = event.request_id,
                    serverHost = event.address.host(),
                    serverPort = event.address.port_tracing_representation(),
                    durationMS = event.duration.as_millis(),
                    "Command failed"
                );
            }
        }
    }
}
