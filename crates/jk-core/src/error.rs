use thiserror::Error;

/// Error type shared across the engine.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid filter expression {0:?}")]
    InvalidFilter(String),

    #[error("unsupported filter key: {0}")]
    UnsupportedKey(String),

    #[error("unsupported aggregation {0:?} (expected count, first, last)")]
    UnsupportedAggregation(String),

    #[error("unsupported select field {0:?}")]
    UnsupportedSelectField(String),

    #[error("invalid cursor: {0}")]
    InvalidCursor(String),

    #[error("cursor job path {cursor:?} does not match {job:?}")]
    CursorMismatch { cursor: String, job: String },

    #[error("{0}")]
    InvalidInput(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("trigger build failed: {0}")]
    TriggerFailed(String),

    #[error("cancel failed: {0}")]
    CancelFailed(String),

    #[error("{context}: server returned HTTP {status}")]
    RequestFailed { context: String, status: u16 },

    #[error("queue item cancelled{}", format_why(.0))]
    QueueItemCancelled(String),

    #[error("timed out waiting for run to start")]
    QueueTimeout,

    #[error("crumb issuer error: HTTP {0}")]
    CrumbIssuer(u16),

    #[error("crumb issuer returned empty data")]
    EmptyCrumb,

    #[error("read log chunk: {0}")]
    ReadLogChunk(#[source] reqwest::Error),

    #[error("{0} requires the jk companion plugin or a supporting Jenkins plugin")]
    FeatureUnsupported(String),

    #[error("no active context; use 'jk context use' or provide --context")]
    NoActiveContext,

    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Config(#[from] jk_config::ConfigError),

    #[error(transparent)]
    Secret(#[from] jk_config::secret::SecretError),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("parse job config: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

fn format_why(why: &str) -> String {
    if why.is_empty() {
        String::new()
    } else {
        format!(": {why}")
    }
}

impl Error {
    /// Maps the error to the CLI exit code contract: 0 success, 1 general,
    /// 2 validation, 3 not-found, 4 auth, 5 permission, 6 connectivity,
    /// 7 timeout, 8 feature-unsupported.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidFilter(_)
            | Error::UnsupportedKey(_)
            | Error::UnsupportedAggregation(_)
            | Error::UnsupportedSelectField(_)
            | Error::InvalidCursor(_)
            | Error::CursorMismatch { .. }
            | Error::InvalidInput(_) => 2,
            Error::NotFound(_) => 3,
            Error::RequestFailed { status: 401, .. } => 4,
            Error::RequestFailed { status: 403, .. } => 5,
            Error::Http(err) => {
                if err.is_timeout() {
                    7
                } else if err.is_connect() || err.is_request() {
                    6
                } else {
                    1
                }
            }
            Error::QueueTimeout => 7,
            Error::FeatureUnsupported(_) => 8,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(Error::InvalidFilter("x".into()).exit_code(), 2);
        assert_eq!(Error::UnsupportedKey("x".into()).exit_code(), 2);
        assert_eq!(
            Error::CursorMismatch {
                cursor: "a".into(),
                job: "b".into()
            }
            .exit_code(),
            2
        );
        assert_eq!(Error::NotFound("run".into()).exit_code(), 3);
        assert_eq!(
            Error::RequestFailed {
                context: "x".into(),
                status: 401
            }
            .exit_code(),
            4
        );
        assert_eq!(
            Error::RequestFailed {
                context: "x".into(),
                status: 403
            }
            .exit_code(),
            5
        );
        assert_eq!(Error::QueueTimeout.exit_code(), 7);
        assert_eq!(Error::FeatureUnsupported("events".into()).exit_code(), 8);
        assert_eq!(Error::QueueItemCancelled(String::new()).exit_code(), 1);
        assert_eq!(Error::NoActiveContext.exit_code(), 1);
    }

    #[test]
    fn test_queue_item_cancelled_message() {
        let bare = Error::QueueItemCancelled(String::new());
        assert_eq!(bare.to_string(), "queue item cancelled");

        let why = Error::QueueItemCancelled("superseded by #42".into());
        assert_eq!(why.to_string(), "queue item cancelled: superseded by #42");
    }
}
