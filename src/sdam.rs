//! Descriptions of the deployment the client routes to, the channel they are published through,
//! and the server selection rules applied to them.

mod description;
mod topology;

pub use self::{
    description::{
        server::{ServerDescription, ServerType},
        topology::{server_selection::select_server, TopologyDescription, TopologyType},
    },
    topology::{Topology, TopologyWatcher},
};
