use anyhow::bail;
use clap::Parser;
use core::time::Duration;
use std::path::PathBuf;

/// Runtime configuration for the `route-guide-server` binary.
///
/// Every option can be given on the command line or through the environment
/// (a `.env` file is honored as well).
#[derive(Parser, Debug, Clone)]
#[command(
    name = "route-guide-server",
    version,
    about = "A gRPC route guide: feature lookups, route summaries and route chat"
)]
pub struct CliArgs {
    /// Address to listen on (TCP or Unix socket path; use --uds for Unix
    /// socket). A TCP port of `0` picks a free port; the bound address is
    /// logged at startup.
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("127.0.0.1:50051"))]
    pub server_addr: String,

    /// Listen on a Unix socket instead of TCP. If set, `SERVER_ADDR` must be a
    /// file path.
    #[arg(short, long, default_value_t = false)]
    pub uds: bool,

    /// JSON feature database loaded at startup.
    ///
    /// Environment variable: `DATASET_PATH`
    #[arg(long, env = "DATASET_PATH", default_value = "data/route_guide_db.json")]
    pub dataset_path: PathBuf,

    /// Capacity of the per-call buffer between a streaming handler and the
    /// gRPC response stream. Lower values react faster to slow readers.
    ///
    /// Environment variable: `STREAM_BUFFER_SIZE`
    #[arg(long, env = "STREAM_BUFFER_SIZE", default_value_t = 16)]
    pub stream_buffer_size: usize,

    /// Seconds to let in-flight streams finish on shutdown before they are
    /// cancelled.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT`
    #[arg(long, env = "SHUTDOWN_TIMEOUT", default_value_t = 5)]
    pub shutdown_timeout: u64,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_addr: String,
    pub uds: bool,
    pub dataset_path: PathBuf,
    pub stream_buffer_size: usize,
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_addr: String::from("127.0.0.1:50051"),
            uds: false,
            dataset_path: PathBuf::from("data/route_guide_db.json"),
            stream_buffer_size: 16,
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.stream_buffer_size == 0 {
            bail!("STREAM_BUFFER_SIZE must be greater than 0");
        }

        if args.server_addr.is_empty() {
            bail!("SERVER_ADDR must not be empty");
        }

        Ok(Self {
            server_addr: args.server_addr,
            uds: args.uds,
            dataset_path: args.dataset_path,
            stream_buffer_size: args.stream_buffer_size,
            shutdown_timeout: Duration::from_secs(args.shutdown_timeout),
        })
    }
}
