//! Shared protocol types and the in-memory state behind the route guide
//! service.
//!
//! ## Modules
//!
//! - [`proto`] - `prost`/`tonic` bindings generated from
//!   `proto/route_guide.proto`.
//! - [`error`] - the [`Error`] taxonomy and its mapping onto `tonic::Status`.
//! - [`geo`] - E7 point helpers, rectangle containment, haversine distance.
//! - [`store`] - the immutable [`FeatureStore`](store::FeatureStore).
//! - [`board`] - the concurrently shared [`NoteBoard`](board::NoteBoard).

pub mod board;
pub mod error;
pub mod geo;
pub mod store;

pub use error::{Error, Result};

/// Messages and service bindings for the `routeguide` package.
///
/// - [`route_guide_server::RouteGuide`] is the trait the server implements.
/// - [`route_guide_client::RouteGuideClient`] is the generated client stub.
pub mod proto {
    tonic::include_proto!("routeguide");

    /// Encoded descriptor set for `tonic-reflection`.
    pub const FILE_DESCRIPTOR_SET: &[u8] =
        tonic::include_file_descriptor_set!("route_guide_descriptor");
}
