#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! # MrZAP agent
//!
//! The agent-side control channel (§4.4): `new-datachannel`/`health-check`
//! directives, and long-lived keypair persistence.

/// `new-datachannel`/`health-check` handling and the cluster-principal filter.
pub mod control;
/// Agent signing-key persistence.
pub mod vault;

pub use control::{build_health_check, is_system_principal, ClusterRoleBindingSource, HealthCheckResponse, NewDatachannelDirective};
pub use vault::{InMemoryKeyVault, JsonFileKeyVault, KeyVault, VaultError};
