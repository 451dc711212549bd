pub(crate) mod server_selection;

use std::{collections::HashMap, fmt};

use crate::{
    options::ServerAddress,
    sdam::description::server::{ServerDescription, ServerType},
};

/// The possible types for a topology.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default, derive_more::Display)]
#[non_exhaustive]
pub enum TopologyType {
    /// A single server.
    Single,

    /// A replica set with no primary.
    ReplicaSetNoPrimary,

    /// A replica set with a primary.
    ReplicaSetWithPrimary,

    /// A sharded topology reached through one or more routers.
    Sharded,

    /// A topology whose type is not known.
    #[default]
    Unknown,
}

impl TopologyType {
    fn is_replica_set(self) -> bool {
        matches!(
            self,
            TopologyType::ReplicaSetNoPrimary | TopologyType::ReplicaSetWithPrimary
        )
    }
}

/// A point-in-time description of the deployment. Published snapshots are never mutated; the
/// publisher swaps in a new description instead.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopologyDescription {
    pub(crate) topology_type: TopologyType,
    pub(crate) servers: HashMap<ServerAddress, ServerDescription>,
}

impl TopologyDescription {
    /// Creates an empty description of the given type.
    pub fn new(topology_type: TopologyType) -> Self {
        Self {
            topology_type,
            servers: HashMap::new(),
        }
    }

    /// Adds `server` to the description, builder style.
    pub fn with_server(mut self, server: ServerDescription) -> Self {
        self.update_server(server);
        self
    }

    /// The type of the topology.
    pub fn topology_type(&self) -> TopologyType {
        self.topology_type
    }

    /// The description of the server at `address`, if it is part of the topology.
    pub fn server(&self, address: &ServerAddress) -> Option<&ServerDescription> {
        self.servers.get(address)
    }

    /// Iterates over every server in the topology.
    pub fn servers(&self) -> impl Iterator<Item = &ServerDescription> {
        self.servers.values()
    }

    pub(crate) fn update_server(&mut self, server: ServerDescription) {
        self.servers.insert(server.address.clone(), server);
        self.update_replica_set_type();
    }

    pub(crate) fn remove_server(&mut self, address: &ServerAddress) -> bool {
        let removed = self.servers.remove(address).is_some();
        self.update_replica_set_type();
        removed
    }

    pub(crate) fn has_available_servers(&self) -> bool {
        self.servers.values().any(|server| server.is_available())
    }

    pub(crate) fn servers_with_type<'a>(
        &'a self,
        types: &'a [ServerType],
    ) -> impl Iterator<Item = &'a ServerDescription> {
        self.servers
            .values()
            .filter(move |server| types.contains(&server.server_type))
    }

    fn update_replica_set_type(&mut self) {
        if !self.topology_type.is_replica_set() {
            return;
        }

        self.topology_type = if self.servers_with_type(&[ServerType::RsPrimary]).next().is_some() {
            TopologyType::ReplicaSetWithPrimary
        } else {
            TopologyType::ReplicaSetNoPrimary
        };
    }
}

impl fmt::Display for TopologyDescription {
    fn fmt(&self, f: &mut fmt::Formatter) -> std::result::Result<(), fmt::Error> {
        write!(f, "{{ Type: {}", self.topology_type)?;

        if !self.servers.is_empty() {
            write!(f, ", Servers: [ ")?;
            let mut iter = self.servers.values();
            if let Some(server) = iter.next() {
                write!(f, "{}", server)?;
            }
            for server in iter {
                write!(f, ", {}", server)?;
            }
            write!(f, " ]")?;
        }

        write!(f, " }}")
    }
}
