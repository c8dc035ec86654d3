use thiserror::Error;

use crate::host::{Capability, HostError};

/// The single failure shape of capability-backed facade calls
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    /// The host never exposed the capability, or has not yet
    #[error("{0} module not found")]
    ModuleNotFound(Capability),

    /// The captured object does not provide the method
    #[error("{capability} does not provide {method}")]
    MethodUnavailable {
        capability: Capability,
        method: &'static str,
    },

    /// The host call raised, panicked, or its deferred result failed
    #[error(transparent)]
    Host(#[from] HostError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            ApiError::ModuleNotFound(Capability::GuildStore).to_string(),
            "GuildStore module not found"
        );
        assert_eq!(
            ApiError::from(HostError::raised("Unknown Channel")).to_string(),
            "Unknown Channel"
        );
    }
}
