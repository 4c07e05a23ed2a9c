#![doc = include_str!("../README.md")]

pub mod config;
pub mod driver;

pub use config::{CliArgs, DriverConfig};
pub use driver::{ChatSession, Leg, RouteGuideDriver, RunReport, chat_script, plan_route};
