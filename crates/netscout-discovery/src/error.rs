//! Error types for the discovery crate

use thiserror::Error;

/// Result type alias for discovery operations
pub type Result<T> = std::result::Result<T, DiscoveryError>;

/// Error type returned by caller-supplied transforms
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur during service discovery
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Invalid or missing resolver parameters, reported before any I/O
    #[error("Invalid {resolver} configuration: {reason}")]
    Config {
        resolver: &'static str,
        reason: String,
    },

    /// A discovery session could not be opened or its socket failed
    #[error("Failed to open {protocol} session: {reason}")]
    Transport {
        protocol: &'static str,
        reason: String,
    },

    /// Malformed or unexpected response during the exchange
    #[error("{protocol} protocol error: {reason}")]
    Protocol {
        protocol: &'static str,
        reason: String,
    },

    /// Caller-supplied transform failed; the source is kept as returned
    #[error("Transform failed: {0}")]
    Transform(#[source] BoxError),
}

impl DiscoveryError {
    /// Creates a configuration error.
    pub fn config(resolver: &'static str, reason: impl Into<String>) -> Self {
        Self::Config {
            resolver,
            reason: reason.into(),
        }
    }

    /// Creates a transport error.
    pub fn transport(protocol: &'static str, reason: impl Into<String>) -> Self {
        Self::Transport {
            protocol,
            reason: reason.into(),
        }
    }

    /// Creates a protocol error.
    pub fn protocol(protocol: &'static str, reason: impl Into<String>) -> Self {
        Self::Protocol {
            protocol,
            reason: reason.into(),
        }
    }

    /// Returns the transform's own error if this is a transform failure.
    pub fn transform_source(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            Self::Transform(source) => Some(source.as_ref()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("bad record")]
    struct BadRecord;

    #[test]
    fn test_config_error_display() {
        let err = DiscoveryError::config("mdns", "service name cannot be empty");
        assert_eq!(
            err.to_string(),
            "Invalid mdns configuration: service name cannot be empty"
        );
    }

    #[test]
    fn test_transport_error_display() {
        let err = DiscoveryError::transport("ssdp", "address in use");
        assert_eq!(err.to_string(), "Failed to open ssdp session: address in use");
    }

    #[test]
    fn test_transform_source_is_preserved() {
        let err = DiscoveryError::Transform(Box::new(BadRecord));
        let source = err.transform_source().expect("transform source");
        assert!(source.downcast_ref::<BadRecord>().is_some());
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_transform_source_absent_for_other_errors() {
        let err = DiscoveryError::protocol("ssdp", "bad status line");
        assert!(err.transform_source().is_none());
    }
}
