//! Error types for the route guide service and its client driver.
//!
//! This module defines the central `Error` enum and implements
//! `From<Error>` for `tonic::Status` so handlers can return it with `?`.
//!
//! ## Error Cases
//! - `Dataset`: The feature database could not be read or parsed. Fatal at
//!   startup.
//! - `InvalidArgument`: A request was malformed (e.g. a rectangle with a
//!   missing corner).
//! - `Transport`: A gRPC call failed at the connection or status level.
//! - `Timeout`: A caller-side wait expired.
//! - `ChannelError`: An internal channel between tasks closed unexpectedly.
//! - `ServiceShutdown`: A call arrived while the service was shutting down.
//!
//! A missing feature is not an error: lookups return a feature with an empty
//! name instead.

use core::time::Duration;
use tonic::Status;

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the route guide service and client.
#[derive(Clone, thiserror::Error, Debug)]
pub enum Error {
    /// The feature database is malformed or unreadable.
    #[error("Dataset error: {reason}")]
    Dataset { reason: String },

    /// The client request was malformed.
    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    /// A gRPC call failed.
    #[error("Transport error: {0}")]
    Transport(Status),

    /// A bounded wait on the caller side expired.
    #[error("{operation} did not finish within {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// Internal channel send/receive failure.
    #[error("Channel error: {context}")]
    ChannelError { context: String },

    /// The service is in the process of shutting down.
    #[error("Service is shutting down")]
    ServiceShutdown,
}

impl Error {
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    pub fn dataset(reason: impl Into<String>) -> Self {
        Self::Dataset {
            reason: reason.into(),
        }
    }
}

impl From<Status> for Error {
    fn from(status: Status) -> Self {
        Self::Transport(status)
    }
}

impl From<tonic::transport::Error> for Error {
    fn from(err: tonic::transport::Error) -> Self {
        Self::Transport(Status::unavailable(err.to_string()))
    }
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::Dataset { reason } => Status::internal(format!("Dataset error: {reason}")),
            Error::InvalidArgument { reason } => Status::invalid_argument(reason),
            Error::Transport(status) => status,
            Error::Timeout { operation, after } => {
                Status::deadline_exceeded(format!("{operation} timed out after {after:?}"))
            }
            Error::ChannelError { context } => {
                Status::internal(format!("Channel error: {context}"))
            }
            Error::ServiceShutdown => Status::unavailable("Service is shutting down"),
        }
    }
}
