use anyhow::bail;
use clap::Parser;
use core::{ops::Range, time::Duration};
use std::path::PathBuf;

/// Command line for the `route-guide-client` binary.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "route-guide-client",
    version,
    about = "Runs every route guide RPC once against a server"
)]
pub struct CliArgs {
    /// Server host name or IP address.
    pub host: String,

    /// Server port.
    pub port: u16,

    /// Feature database RecordRoute draws its points from.
    ///
    /// Environment variable: `DATASET_PATH`
    #[arg(long, env = "DATASET_PATH", default_value = "data/route_guide_db.json")]
    pub dataset: PathBuf,

    /// Number of points sent by RecordRoute.
    #[arg(long, default_value_t = 10)]
    pub points: usize,

    /// Seed for point selection and pacing. Omit for a random run.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Shortest pause between RecordRoute points, in milliseconds.
    #[arg(long, default_value_t = 500)]
    pub min_delay_ms: u64,

    /// Upper bound (exclusive) of the pause between RecordRoute points, in
    /// milliseconds.
    #[arg(long, default_value_t = 1500)]
    pub max_delay_ms: u64,

    /// How long to wait for RecordRoute and RouteChat to complete.
    #[arg(long, default_value_t = 60)]
    pub timeout_secs: u64,
}

impl CliArgs {
    pub fn endpoint(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Pacing and limits for a [`crate::RouteGuideDriver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverConfig {
    /// Pause between RecordRoute points in milliseconds, drawn uniformly.
    /// An empty range means a fixed pause of `send_delay.start`.
    pub send_delay: Range<u64>,
    /// Upper bound on waiting for a call to complete after half-close.
    pub completion_timeout: Duration,
    /// Points sent by the canonical RecordRoute.
    pub route_points: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            send_delay: 500..1500,
            completion_timeout: Duration::from_secs(60),
            route_points: 10,
        }
    }
}

impl TryFrom<&CliArgs> for DriverConfig {
    type Error = anyhow::Error;

    fn try_from(args: &CliArgs) -> Result<Self, Self::Error> {
        if args.max_delay_ms < args.min_delay_ms {
            bail!(
                "--max-delay-ms ({}) must not be below --min-delay-ms ({})",
                args.max_delay_ms,
                args.min_delay_ms
            );
        }

        if args.timeout_secs == 0 {
            bail!("--timeout-secs must be greater than 0");
        }

        Ok(Self {
            send_delay: args.min_delay_ms..args.max_delay_ms,
            completion_timeout: Duration::from_secs(args.timeout_secs),
            route_points: args.points,
        })
    }
}
