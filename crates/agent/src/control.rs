//! The agent's control channel (§4.4): a long-lived channel to the relay,
//! separate from any datachannel, accepting `new-datachannel` directives and
//! `health-check` polls.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// `new-datachannel {connectionId, targetUser, targetGroups, token}` (§4.4).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDatachannelDirective {
    /// Relay-assigned id for the datachannel about to be spawned.
    pub connection_id: String,
    /// User to impersonate on the cluster API for actions over this datachannel.
    pub target_user: String,
    /// Groups to impersonate alongside `target_user`.
    pub target_groups: Vec<String>,
    /// Opaque token the agent does not itself interpret.
    pub token: String,
}

/// The agent's `health-check` reply (§4.4).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheckResponse {
    /// Always true if the agent could produce a reply at all.
    pub alive: bool,
    /// Non-system user principals discovered on the cluster.
    pub cluster_users: Vec<String>,
}

/// The exact filter from §4.4: principals of the form `group:name` where both
/// halves are restricted to this charset are treated as system principals
/// (e.g. `system:serviceaccount`) and excluded from `clusterUsers`.
static SYSTEM_PRINCIPAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9]+:[A-Za-z0-9-]*$").unwrap());

/// Whether `principal` matches the system-principal shape and should be
/// excluded from a health-check's `clusterUsers` list.
pub fn is_system_principal(principal: &str) -> bool {
    SYSTEM_PRINCIPAL.is_match(principal)
}

/// External collaborator boundary for enumerating the cluster's role
/// bindings and cluster-role-bindings (the cluster API client itself is out
/// of scope — see `mrzap-daemon::cluster_api`).
pub trait ClusterRoleBindingSource: Send + Sync {
    /// Every subject named by a role-binding or cluster-role-binding, in
    /// whatever order the source returns them (duplicates are permitted; the
    /// caller is responsible for deduplication if desired).
    fn list_subjects(&self) -> Vec<String>;
}

/// Builds a health-check response from `source`, applying the §4.4 filter.
pub fn build_health_check(source: &dyn ClusterRoleBindingSource) -> HealthCheckResponse {
    let cluster_users = source
        .list_subjects()
        .into_iter()
        .filter(|subject| !is_system_principal(subject))
        .collect();
    HealthCheckResponse { alive: true, cluster_users }
}
