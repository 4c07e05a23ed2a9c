#![doc = include_str!("../README.md")]

pub mod server;

pub use server::{
    build_route_guide_service,
    config::{CliArgs, ServerConfig},
    run_server_with_incoming,
    service::handler::RouteGuideService,
};
