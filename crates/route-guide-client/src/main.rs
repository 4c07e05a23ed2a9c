use anyhow::Context;
use clap::Parser;
use rand::{SeedableRng, rngs::StdRng};
use route_guide_client::{CliArgs, DriverConfig, RouteGuideDriver};
use route_guide_core::store::FeatureStore;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    init_logging()?;

    let config = DriverConfig::try_from(&args)?;
    let store = FeatureStore::from_path(&args.dataset)
        .with_context(|| format!("failed to load feature database {}", args.dataset.display()))?;

    let rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let mut driver = RouteGuideDriver::connect(args.endpoint(), config, rng)
        .await
        .with_context(|| format!("failed to connect to {}", args.endpoint()))?;
    println!(
        "*** gRPC client connected to host {} port {}",
        args.host, args.port
    );

    let report = driver.run_all(store.features()).await;
    tracing::debug!(
        listed = report.listed.len(),
        summarized = report.summary.is_some(),
        chat_ok = report.chat.is_ok(),
        "Run complete"
    );

    println!("*** gRPC client shut down");
    Ok(())
}

/// Logs go to stderr so stdout only carries results.
fn init_logging() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init()?;
    Ok(())
}
