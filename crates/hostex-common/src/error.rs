use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostexError {
    #[error("invalid metric name: {0}")]
    InvalidMetricName(String),
    #[error("invalid label name: {0}")]
    InvalidLabelName(String),
    #[error("label arity mismatch for {metric}: expected {expected}, got {actual}")]
    LabelArity {
        metric: String,
        expected: usize,
        actual: usize,
    },
    #[error("schema mismatch for {class}.{field}: {reason}")]
    SchemaMismatch {
        class: String,
        field: String,
        reason: String,
    },
    #[error("query failed: {0}")]
    Query(String),
    #[error("native class not available on this host: {0}")]
    Unsupported(String),
    #[error("unknown collector: {0}")]
    UnknownCollector(String),
    #[error("collector not enabled: {0}")]
    CollectorNotEnabled(String),
    #[error("metric channel closed")]
    ChannelClosed,
    #[error("collector panicked: {0}")]
    CollectorPanicked(String),
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("internal error: {0}")]
    InternalError(String),
}

impl HostexError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidMetricName(_) => "InvalidMetricName",
            Self::InvalidLabelName(_) => "InvalidLabelName",
            Self::LabelArity { .. } => "LabelArity",
            Self::SchemaMismatch { .. } => "SchemaMismatch",
            Self::Query(_) => "QueryFailed",
            Self::Unsupported(_) => "Unsupported",
            Self::UnknownCollector(_) => "UnknownCollector",
            Self::CollectorNotEnabled(_) => "CollectorNotEnabled",
            Self::ChannelClosed => "ChannelClosed",
            Self::CollectorPanicked(_) => "CollectorPanicked",
            Self::Timeout(_) => "Timeout",
            Self::InvalidArgument(_) => "InvalidArgument",
            Self::InternalError(_) => "InternalError",
        }
    }

    /// Errors a scrape caller can fix by changing the request.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownCollector(_) | Self::CollectorNotEnabled(_) | Self::InvalidArgument(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, HostexError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_request_errors_are_client_errors() {
        let client = [
            HostexError::UnknownCollector("cpu".to_string()),
            HostexError::CollectorNotEnabled("netframework_clrsecurity".to_string()),
            HostexError::InvalidArgument("filter must be <label>=<value>".to_string()),
        ];
        assert!(client.iter().all(HostexError::is_client_error));

        let server = [
            HostexError::Query("access denied".to_string()),
            HostexError::ChannelClosed,
            HostexError::Timeout(std::time::Duration::from_secs(1)),
        ];
        assert!(server.iter().all(|err| !err.is_client_error()));
        assert_eq!(server[0].error_code(), "QueryFailed");
    }
}
