use std::{sync::Arc, time::Duration};

use tokio::sync::watch;

use crate::{
    options::ServerAddress,
    sdam::description::{server::ServerDescription, topology::TopologyDescription},
};

/// The publishing half of the topology channel. A topology monitor owns this and pushes what it
/// learns about the deployment; every [`TopologyWatcher`] then observes the new snapshot.
///
/// Each update replaces the published [`TopologyDescription`] as a whole, so a snapshot a reader
/// already holds never changes underneath it.
#[derive(Clone, Debug)]
pub struct Topology {
    sender: Arc<watch::Sender<Arc<TopologyDescription>>>,
}

impl Topology {
    /// Creates a topology channel that initially publishes `description`.
    pub fn new(description: TopologyDescription) -> Self {
        let (sender, _) = watch::channel(Arc::new(description));
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Returns a new watcher of this topology.
    pub fn watch(&self) -> TopologyWatcher {
        TopologyWatcher {
            receiver: self.sender.subscribe(),
        }
    }

    /// The most recently published description.
    pub fn latest(&self) -> Arc<TopologyDescription> {
        self.sender.borrow().clone()
    }

    /// Adds or replaces the description of one server.
    pub fn update_server(&self, server: ServerDescription) {
        self.sender
            .send_modify(|description| Arc::make_mut(description).update_server(server));
    }

    /// Removes a server from the topology. Returns whether it was present.
    pub fn remove_server(&self, address: &ServerAddress) -> bool {
        let mut removed = false;
        self.sender.send_if_modified(|description| {
            if description.server(address).is_none() {
                return false;
            }
            removed = Arc::make_mut(description).remove_server(address);
            removed
        });
        removed
    }

    /// Publishes a whole new description.
    pub fn replace(&self, description: TopologyDescription) {
        self.sender.send_replace(Arc::new(description));
    }
}

/// Handle used to observe the latest state of a [`Topology`].
#[derive(Clone, Debug)]
pub struct TopologyWatcher {
    receiver: watch::Receiver<Arc<TopologyDescription>>,
}

impl TopologyWatcher {
    /// Returns the latest snapshot and marks it as seen, so that a following
    /// [`wait_for_update`](TopologyWatcher::wait_for_update) only returns for newer ones.
    pub fn observe_latest(&mut self) -> Arc<TopologyDescription> {
        self.receiver.borrow_and_update().clone()
    }

    /// Returns the latest snapshot without marking it as seen.
    pub fn peek_latest(&self) -> Arc<TopologyDescription> {
        self.receiver.borrow().clone()
    }

    /// Whether the publishing [`Topology`] still exists.
    pub fn is_alive(&self) -> bool {
        self.receiver.has_changed().is_ok()
    }

    /// Waits until a snapshot newer than the last observed one is published. Returns false if
    /// `timeout` elapsed first or the publisher was dropped.
    pub(crate) async fn wait_for_update(&mut self, timeout: Duration) -> bool {
        let changed = matches!(
            tokio::time::timeout(timeout, self.receiver.changed()).await,
            Ok(Ok(()))
        );
        self.receiver.borrow_and_update();
        changed
    }
}
