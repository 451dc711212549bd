mod cluster;
mod event_buffer;

use std::time::Duration;

pub(crate) use self::{
    cluster::{FailPoint, MockCluster},
    event_buffer::EventBuffer,
};
use crate::{
    event::command::{CommandEvent, CommandRoutedEvent},
    options::{ClientOptions, ServerAddress},
    sdam::{ServerDescription, ServerType, Topology, TopologyDescription, TopologyType},
    Client,
};

/// Round trip time given to every mock server, so that all of them are in the latency window.
const ROUND_TRIP_TIME: Duration = Duration::from_millis(5);

/// A client wired to an in-memory cluster, with the published topology and recorded command
/// events at hand.
pub(crate) struct TestCluster {
    pub(crate) client: Client,
    pub(crate) cluster: MockCluster,
    pub(crate) topology: Topology,
    pub(crate) servers: Vec<ServerAddress>,
    pub(crate) events: EventBuffer<CommandEvent>,
}

impl TestCluster {
    /// A sharded cluster reached through `routers` routers.
    pub(crate) fn sharded(routers: usize) -> Self {
        Self::builder(TopologyType::Sharded, ServerType::Mongos, routers).build()
    }

    /// A replica set with a primary and `secondaries` secondaries.
    pub(crate) fn replica_set(secondaries: usize) -> Self {
        let mut builder = Self::builder(
            TopologyType::ReplicaSetNoPrimary,
            ServerType::RsSecondary,
            secondaries + 1,
        );
        builder.set_server_type(0, ServerType::RsPrimary);
        builder.build()
    }

    pub(crate) fn builder(
        topology_type: TopologyType,
        server_type: ServerType,
        servers: usize,
    ) -> TestClusterBuilder {
        TestClusterBuilder {
            topology_type,
            server_types: vec![server_type; servers],
            options: ClientOptions::builder()
                .server_selection_timeout(Duration::from_millis(100))
                .build(),
        }
    }

    pub(crate) fn routed_events(&self) -> Vec<CommandRoutedEvent> {
        self.events.filter_map(|event| match event {
            CommandEvent::Routed(event) => Some(event.clone()),
            _ => None,
        })
    }

    /// Addresses the commands named `name` were routed to, in order.
    pub(crate) fn routes_of(&self, name: &str) -> Vec<ServerAddress> {
        self.routed_events()
            .into_iter()
            .filter(|event| event.command_name == name)
            .map(|event| event.address)
            .collect()
    }

    /// Takes `address` out of the published topology, as a monitor would after losing it.
    pub(crate) fn mark_unknown(&self, address: &ServerAddress) {
        self.topology
            .update_server(ServerDescription::new(address.clone(), ServerType::Unknown));
    }
}

pub(crate) struct TestClusterBuilder {
    topology_type: TopologyType,
    server_types: Vec<ServerType>,
    options: ClientOptions,
}

impl TestClusterBuilder {
    pub(crate) fn options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    pub(crate) fn set_server_type(&mut self, index: usize, server_type: ServerType) {
        self.server_types[index] = server_type;
    }

    pub(crate) fn build(self) -> TestCluster {
        let servers: Vec<ServerAddress> = (0..self.server_types.len())
            .map(|i| ServerAddress::Tcp {
                host: format!("server{}", i),
                port: Some(27017),
            })
            .collect();

        let mut description = TopologyDescription::new(self.topology_type);
        for (address, server_type) in servers.iter().zip(self.server_types) {
            description = description.with_server(
                ServerDescription::new(address.clone(), server_type)
                    .with_round_trip_time(ROUND_TRIP_TIME),
            );
        }
        let topology = Topology::new(description);

        let events = EventBuffer::new();
        let mut options = self.options;
        options.hosts = servers.clone();
        if options.command_event_handler.is_none() {
            options.command_event_handler = Some(events.handler());
        }

        let cluster = MockCluster::new(servers.iter().cloned());
        let client = Client::with_options(options, topology.watch(), cluster.clone());

        TestCluster {
            client,
            cluster,
            topology,
            servers,
            events,
        }
    }
}
