use crate::{
    bson::{Bson, Document},
    client::options::{ServerAddress, DEFAULT_PORT},
    error::Error,
    sdam::TopologyDescription,
    selection_criteria::SelectionCriteria,
};

pub(crate) mod command;
pub(crate) mod server_selection;

pub(crate) const COMMAND_TRACING_EVENT_TARGET: &str = "shard_session::command";
pub(crate) const SERVER_SELECTION_TRACING_EVENT_TARGET: &str = "shard_session::server_selection";
pub(crate) const SESSION_TRACING_EVENT_TARGET: &str = "shard_session::session";

pub(crate) const DEFAULT_MAX_DOCUMENT_LENGTH_BYTES: usize = 1000;

pub(crate) trait TracingRepresentation {
    type Representation;

    fn tracing_representation(&self) -> Self::Representation;
}

impl TracingRepresentation for Error {
    type Representation = String;

    fn tracing_representation(&self) -> String {
        self.to_string()
    }
}

impl TracingRepresentation for SelectionCriteria {
    type Representation = String;

    fn tracing_representation(&self) -> Self::Representation {
        self.to_string()
    }
}

impl TracingRepresentation for TopologyDescription {
    type Representation = String;

    fn tracing_representation(&self) -> Self::Representation {
        self.to_string()
    }
}

impl TracingRepresentation for uuid::Uuid {
    type Representation = String;

    fn tracing_representation(&self) -> String {
        self.hyphenated().to_string()
    }
}

impl ServerAddress {
    /// Tracing events always carry a port, so the default one is filled in.
    pub(crate) fn port_tracing_representation(&self) -> u16 {
        self.port().unwrap_or(DEFAULT_PORT)
    }
}

/// Serializes a command or reply as relaxed extended JSON, truncated to at most
/// `max_length_bytes` bytes followed by "...".
pub(crate) fn serialize_command_or_reply(doc: Document, max_length_bytes: usize) -> String {
    let mut ext_json = Bson::Document(doc).into_relaxed_extjson().to_string();
    truncate_on_char_boundary(&mut ext_json, max_length_bytes);
    ext_json
}

/// Truncates `s` to the largest char boundary not past `new_len`.
pub(crate) fn truncate_on_char_boundary(s: &mut String, new_len: usize) {
    let original_len = s.len();
    if original_len <= new_len {
        return;
    }

    let mut truncate_at = new_len;
    while !s.is_char_boundary(truncate_at) {
        truncate_at -= 1;
    }
    s.truncate(truncate_at);

    if s.len() < original_len {
        s.push_str("...");
    }
}
