//! Backends that list fleet members and destroy one member at a time.
//!
//! Calls are blocking; async callers run them on `spawn_blocking`. Each
//! backend applies its own request timeout.

mod openstack;
mod simple;

pub use openstack::OpenStackInfrastructure;
pub use simple::SimpleInfrastructure;

use crate::config::{Config, InfrastructureConfig};
use crate::director::DirectorClient;
use crate::error::{LemurError, Result};
use crate::member::Member;
use std::sync::Arc;
use tracing::info;

pub trait Infrastructure: Send + Sync {
    /// Snapshot of the current roster.
    fn members(&self) -> Result<Vec<Member>>;

    /// Destroy one member. Fails with [`LemurError::Destruction`].
    fn destroy(&self, member: &Member) -> Result<()>;
}

/// Build the backend selected by `config.infrastructure`.
pub fn from_config(config: &Config) -> Result<Arc<dyn Infrastructure>> {
    info!(backend = config.infrastructure.kind(), "selecting infrastructure");
    match &config.infrastructure {
        InfrastructureConfig::Simple { members } => {
            Ok(Arc::new(SimpleInfrastructure::new(members.clone())))
        }
        InfrastructureConfig::OpenStack {
            identity_endpoint,
            tenant,
            username,
            password,
            region,
            timeout_secs,
        } => {
            let director = config.director.as_ref().ok_or_else(|| {
                LemurError::InvalidConfig(
                    "open_stack infrastructure requires a director".to_string(),
                )
            })?;
            Ok(Arc::new(OpenStackInfrastructure::new(
                DirectorClient::new(director)?,
                openstack::Credentials {
                    identity_endpoint: identity_endpoint.clone(),
                    tenant: tenant.clone(),
                    username: username.clone(),
                    password: password.clone(),
                    region: region.clone(),
                },
                *timeout_secs,
            )?))
        }
    }
}
