use std::{fmt, time::Duration};

use crate::{bson::DateTime, options::ServerAddress, selection_criteria::TagSet};

/// The possible types for a server.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default, derive_more::Display)]
#[non_exhaustive]
pub enum ServerType {
    /// A single, non-replica set mongod.
    Standalone,

    /// A router used in sharded deployments.
    Mongos,

    /// The primary node in a replica set.
    #[display("RSPrimary")]
    RsPrimary,

    /// A secondary node in a replica set.
    #[display("RSSecondary")]
    RsSecondary,

    /// A server whose type is not known, e.g. because it has not been reached yet.
    #[default]
    Unknown,
}

impl ServerType {
    pub(crate) fn is_data_bearing(self) -> bool {
        matches!(
            self,
            ServerType::Standalone
                | ServerType::RsPrimary
                | ServerType::RsSecondary
                | ServerType::Mongos
        )
    }

    pub(crate) fn is_available(self) -> bool {
        !matches!(self, ServerType::Unknown)
    }
}

/// What the topology monitor last learned about one server.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerDescription {
    pub(crate) address: ServerAddress,
    pub(crate) server_type: ServerType,
    pub(crate) last_update_time: Option<DateTime>,
    pub(crate) average_round_trip_time: Option<Duration>,
    pub(crate) tags: TagSet,
}

impl ServerDescription {
    /// Creates a description of the server at `address`. Any type other than
    /// [`ServerType::Unknown`] records the current time as the last update.
    pub fn new(address: ServerAddress, server_type: ServerType) -> Self {
        let last_update_time = server_type.is_available().then(DateTime::now);
        Self {
            address,
            server_type,
            last_update_time,
            average_round_trip_time: None,
            tags: TagSet::new(),
        }
    }

    /// Sets the average round trip time. Ignored for servers of unknown type, which never take
    /// part in latency comparisons.
    pub fn with_round_trip_time(mut self, round_trip_time: Duration) -> Self {
        if self.server_type.is_available() {
            self.average_round_trip_time = Some(round_trip_time);
        }
        self
    }

    /// Sets the tags the server was configured with.
    pub fn with_tags(mut self, tags: TagSet) -> Self {
        self.tags = tags;
        self
    }

    /// The address of the server.
    pub fn address(&self) -> &ServerAddress {
        &self.address
    }

    /// The type of the server.
    pub fn server_type(&self) -> ServerType {
        self.server_type
    }

    /// The average duration of the monitor's round trips to the server.
    pub fn average_round_trip_time(&self) -> Option<Duration> {
        self.average_round_trip_time
    }

    /// When the server was last heard from.
    pub fn last_update_time(&self) -> Option<DateTime> {
        self.last_update_time
    }

    /// The tags of the server.
    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    pub(crate) fn is_available(&self) -> bool {
        self.server_type.is_available()
    }

    pub(crate) fn matches_tag_set(&self, tag_set: &TagSet) -> bool {
        tag_set
            .iter()
            .all(|(key, value)| self.tags.get(key) == Some(value))
    }
}

impl fmt::Display for ServerDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{ Address: {}, Type: {}",
            self.address, self.server_type
        )?;

        if let Some(rtt) = self.average_round_trip_time {
            write!(f, ", Average RTT: {:?}", rtt)?;
        }

        if !self.tags.is_empty() {
            write!(f, ", Tags: {:?}", self.tags)?;
        }

        write!(f, " }}")
    }
}
