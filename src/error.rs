//! Error types for the Ghostwriter provider.

use thiserror::Error;

/// Errors that can occur while serving provider requests.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested Ghostwriter object was not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Input failed a schema or cross-attribute check.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The provider is not configured, or its configuration is unusable.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested resource or data source type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// JSON could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The gRPC transport failed.
    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// The HTTP request to the GraphQL endpoint failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The GraphQL API answered with one or more errors.
    #[error("GraphQL error: {0}")]
    GraphQl(String),

    /// The GraphQL API answered with a payload we could not use.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Permission denied (bad or missing API key).
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Rate limit exceeded.
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// The Ghostwriter API is temporarily unavailable.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Operation not implemented.
    #[error("Unimplemented: {0}")]
    Unimplemented(String),

    /// Invalid request from the host.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ProviderError {
    /// Get the error message without the variant prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::NotFound(msg)
            | Self::Validation(msg)
            | Self::Configuration(msg)
            | Self::UnknownResource(msg)
            | Self::GraphQl(msg)
            | Self::InvalidResponse(msg)
            | Self::PermissionDenied(msg)
            | Self::ResourceExhausted(msg)
            | Self::Unavailable(msg)
            | Self::Unimplemented(msg)
            | Self::InvalidRequest(msg) => msg,
            Self::Serialization(_err) => "serialization error (see Debug output)",
            Self::Transport(_err) => "transport error (see Debug output)",
            Self::Http(_err) => "http error (see Debug output)",
        }
    }

    /// Whether the error means the remote object is gone.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<ProviderError> for tonic::Status {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotFound(msg) => tonic::Status::not_found(msg),
            ProviderError::Validation(msg) => tonic::Status::invalid_argument(msg),
            ProviderError::Configuration(msg) => tonic::Status::failed_precondition(msg),
            ProviderError::UnknownResource(msg) => tonic::Status::not_found(msg),
            ProviderError::Serialization(err) => {
                tonic::Status::invalid_argument(format!("Serialization error: {}", err))
            },
            ProviderError::Transport(err) => {
                tonic::Status::unavailable(format!("Transport error: {}", err))
            },
            ProviderError::Http(err) => tonic::Status::unavailable(format!("HTTP error: {}", err)),
            ProviderError::GraphQl(msg) => tonic::Status::aborted(msg),
            ProviderError::InvalidResponse(msg) => tonic::Status::internal(msg),
            ProviderError::PermissionDenied(msg) => tonic::Status::permission_denied(msg),
            ProviderError::ResourceExhausted(msg) => tonic::Status::resource_exhausted(msg),
            ProviderError::Unavailable(msg) => tonic::Status::unavailable(msg),
            ProviderError::Unimplemented(msg) => tonic::Status::unimplemented(msg),
            ProviderError::InvalidRequest(msg) => tonic::Status::invalid_argument(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProviderError::NotFound("domain 12".to_string());
        assert_eq!(format!("{}", err), "Resource not found: domain 12");

        let err = ProviderError::GraphQl("field 'foo' not found".to_string());
        assert_eq!(format!("{}", err), "GraphQL error: field 'foo' not found");

        let err = ProviderError::UnknownResource("ghostwriter_client".to_string());
        assert_eq!(
            format!("{}", err),
            "Unknown resource type: ghostwriter_client"
        );
    }

    #[test]
    fn test_error_to_status() {
        let status: tonic::Status = ProviderError::NotFound("x".to_string()).into();
        assert_eq!(status.code(), tonic::Code::NotFound);

        let status: tonic::Status = ProviderError::Validation("x".to_string()).into();
        assert_eq!(status.code(), tonic::Code::InvalidArgument);

        let status: tonic::Status = ProviderError::Configuration("x".to_string()).into();
        assert_eq!(status.code(), tonic::Code::FailedPrecondition);

        let status: tonic::Status = ProviderError::PermissionDenied("x".to_string()).into();
        assert_eq!(status.code(), tonic::Code::PermissionDenied);

        let status: tonic::Status = ProviderError::ResourceExhausted("x".to_string()).into();
        assert_eq!(status.code(), tonic::Code::ResourceExhausted);

        let status: tonic::Status = ProviderError::GraphQl("x".to_string()).into();
        assert_eq!(status.code(), tonic::Code::Aborted);

        let status: tonic::Status = ProviderError::InvalidResponse("x".to_string()).into();
        assert_eq!(status.code(), tonic::Code::Internal);
    }

    #[test]
    fn test_message_method() {
        let err = ProviderError::Configuration("provider is not configured".to_string());
        assert_eq!(err.message(), "provider is not configured");

        let err = ProviderError::InvalidRequest("bad import id".to_string());
        assert_eq!(err.message(), "bad import id");
    }

    #[test]
    fn test_is_not_found() {
        assert!(ProviderError::NotFound("oplog 3".to_string()).is_not_found());
        assert!(!ProviderError::Unavailable("down".to_string()).is_not_found());
    }

    #[test]
    fn test_serialization_error_converts() {
        let err: ProviderError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, ProviderError::Serialization(_)));
    }
}
