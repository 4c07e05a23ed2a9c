//! gRPC service implementation and session bookkeeping.
//!
//! ## Structure
//!
//! - [`handler`] - gRPC service entry point (`RouteGuideService`).
//! - [`sessions`] - in-flight call tracking and the shutdown token shared by
//!   every streaming task.

pub mod handler;
pub mod sessions;
