//! Routing error types

/// Errors produced during endpoint selection and registry maintenance
#[derive(Debug, Clone, thiserror::Error)]
pub enum RoutingError {
    /// Every endpoint for the provider is unhealthy (or none are registered)
    #[error("no routable endpoint for provider '{0}'")]
    NoRoutableEndpoint(String),

    /// Strategies declined every candidate and no healthy endpoint remains
    #[error("no healthy endpoint for provider '{0}'")]
    NoHealthyEndpoint(String),

    /// A routing call named a strategy that is not registered
    #[error("unknown routing strategy '{0}'")]
    UnknownStrategy(String),

    /// Metrics were reported for an endpoint that was never registered
    #[error("unknown endpoint '{provider}:{id}'")]
    UnknownEndpoint {
        /// Provider name
        provider: String,
        /// Endpoint id within the provider
        id: String,
    },

    /// Registration was given a malformed base URL
    #[error("invalid base url '{url}': {reason}")]
    InvalidBaseUrl {
        /// The rejected input
        url: String,
        /// Parser message
        reason: String,
    },
}
