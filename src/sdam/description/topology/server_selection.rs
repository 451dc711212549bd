
use std::time::Duration;

use rand::seq::IndexedRandom;

use super::TopologyDescription;
use crate::{
    error::{ErrorKind, Result},
    options::ServerAddress,
    sdam::description::{
        server::{ServerDescription, ServerType},
        topology::TopologyType,
    },
    selection_criteria::{ReadPreference, SelectionCriteria, TagSet},
};

pub(crate) const DEFAULT_LOCAL_THRESHOLD: Duration = Duration::from_millis(15);

/// Selects a server from `topology_description` that satisfies `criteria`.
///
/// The set of candidates is fully determined by the description and the criteria: the suitable
/// servers whose average round trip time lies within `local_threshold` (15 ms by default) of the
/// fastest one. The candidate returned is picked uniformly at random from that set, so repeated
/// calls spread load across equally close routers. Fails with
/// [`ErrorKind::ServerSelection`] when the set is empty.
pub fn select_server(
    topology_description: &TopologyDescription,
    criteria: &SelectionCriteria,
    local_threshold: Option<Duration>,
) -> Result<ServerAddress> {
    attempt_to_select_server(topology_description, criteria, local_threshold).ok_or_else(|| {
        ErrorKind::ServerSelection {
            message: topology_description.no_suitable_server_message(criteria),
        }
        .into()
    })
}

/// Attempt to select a server, returning None if no server could be selected
/// that matched the provided criteria.
pub(crate) fn attempt_to_select_server(
    topology_description: &TopologyDescription,
    criteria: &SelectionCriteria,
    local_threshold: Option<Duration>,
) -> Option<ServerAddress> {
    let in_window =
        topology_description.suitable_servers_in_latency_window(criteria, local_threshold);
    in_window
        .choose(&mut rand::rng())
        .map(|server| server.address.clone())
}

impl TopologyDescription {
    pub(crate) fn no_suitable_server_message(&self, criteria: &SelectionCriteria) -> String {
        if self.has_available_servers() {
            format!(
                "None of the available servers suitable for criteria {}. Topology: {}",
                criteria, self
            )
        } else {
            format!("No available servers. Topology: {}", self)
        }
    }

    pub(crate) fn server_selection_timeout_error_message(
        &self,
        criteria: &SelectionCriteria,
    ) -> String {
        format!(
            "Server selection timeout: {}",
            self.no_suitable_server_message(criteria)
        )
    }

    /// The servers eligible for `criteria` that also lie within the latency window.
    pub(crate) fn suitable_servers_in_latency_window<'a>(
        &'a self,
        criteria: &'a SelectionCriteria,
        local_threshold: Option<Duration>,
    ) -> Vec<&'a ServerDescription> {
        let mut suitable_servers = self.suitable_servers(criteria);
        retain_servers_within_latency_window(
            &mut suitable_servers,
            local_threshold.unwrap_or(DEFAULT_LOCAL_THRESHOLD),
        );
        suitable_servers
    }

    /// The servers eligible for `criteria`, before latency filtering.
    pub(crate) fn suitable_servers<'a>(
        &'a self,
        criteria: &'a SelectionCriteria,
    ) -> Vec<&'a ServerDescription> {
        match criteria {
            SelectionCriteria::ReadPreference(ref read_pref) => {
                self.suitable_servers_for_read_pref(read_pref)
            }
            SelectionCriteria::Predicate(ref filter) => self
                .servers
                .values()
                .filter(|s| {
                    // A directly connected server is eligible whatever its type.
                    (self.topology_type == TopologyType::Single || s.server_type.is_data_bearing())
                        && filter(s)
                })
                .collect(),
        }
    }

    fn suitable_servers_for_read_pref(
        &self,
        read_preference: &ReadPreference,
    ) -> Vec<&ServerDescription> {
        match self.topology_type {
            TopologyType::Unknown => Vec::new(),
            TopologyType::Single => self.servers.values().filter(|s| s.is_available()).collect(),
            TopologyType::Sharded => self.servers_with_type(&[ServerType::Mongos]).collect(),
            TopologyType::ReplicaSetWithPrimary | TopologyType::ReplicaSetNoPrimary => {
                self.suitable_servers_in_replica_set(read_preference)
            }
        }
    }

    fn suitable_servers_in_replica_set(
        &self,
        read_preference: &ReadPreference,
    ) -> Vec<&ServerDescription> {
        let tag_sets = read_preference.tag_sets();

        match read_preference {
            ReadPreference::Primary => self.servers_with_type(&[ServerType::RsPrimary]).collect(),
            ReadPreference::Secondary { .. } => {
                self.servers_matching_tag_sets(&[ServerType::RsSecondary], tag_sets)
            }
            ReadPreference::PrimaryPreferred { .. } => {
                match self.servers_with_type(&[ServerType::RsPrimary]).next() {
                    Some(primary) => vec![primary],
                    None => self.servers_matching_tag_sets(&[ServerType::RsSecondary], tag_sets),
                }
            }
            ReadPreference::SecondaryPreferred { .. } => {
                let suitable_servers =
                    self.servers_matching_tag_sets(&[ServerType::RsSecondary], tag_sets);

                if suitable_servers.is_empty() {
                    self.servers_with_type(&[ServerType::RsPrimary]).collect()
                } else {
                    suitable_servers
                }
            }
            ReadPreference::Nearest { .. } => self.servers_matching_tag_sets(
                &[ServerType::RsPrimary, ServerType::RsSecondary],
                tag_sets,
            ),
        }
    }

    fn servers_matching_tag_sets(
        &self,
        types: &'static [ServerType],
        tag_sets: Option<&Vec<TagSet>>,
    ) -> Vec<&ServerDescription> {
        let mut servers = self.servers_with_type(types).collect();

        if let Some(tag_sets) = tag_sets {
            filter_servers_by_tag_sets(&mut servers, tag_sets);
        }

        servers
    }
}

fn retain_servers_within_latency_window(
    suitable_servers: &mut Vec<&ServerDescription>,
    local_threshold: Duration,
) {
    let shortest_average_rtt = suitable_servers
        .iter()
        .filter_map(|server_desc| server_desc.average_round_trip_time)
        .min();

    let max_rtt_within_window = match shortest_average_rtt {
        Some(rtt) => rtt.checked_add(local_threshold).unwrap_or(Duration::MAX),
        None => {
            suitable_servers.clear();
            return;
        }
    };

    suitable_servers.retain(|server_desc| {
        server_desc
            .average_round_trip_time
            .is_some_and(|server_rtt| server_rtt <= max_rtt_within_window)
    });
}

fn filter_servers_by_tag_sets(servers: &mut Vec<&ServerDescription>, tag_sets: &[TagSet]) {
    if tag_sets.is_empty() {
        return;
    }

    for tag_set in tag_sets {
        let matches_tag_set = |server: &&ServerDescription| server.matches_tag_set(tag_set);

        if servers.iter().any(matches_tag_set) {
            servers.retain(matches_tag_set);

            return;
        }
    }

    servers.clear();
}
