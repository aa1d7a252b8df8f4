use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use vmwatch::config::Settings;
use vmwatch::{Dashboard, DashboardData, InstanceIdentity, MetricsBackend, ReplayBackend};

#[derive(Parser, Debug)]
#[command(name = "vmwatch")]
#[command(about = "Monitor a libvirt-backed cloud instance through its Prometheus metrics")]
struct Args {
    /// Instance id to monitor
    #[arg(short, long)]
    instance: Option<String>,

    /// Settings file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Prometheus endpoint (overrides the config file)
    #[arg(long, conflicts_with = "replay")]
    endpoint: Option<String>,

    /// Answer queries from a JSON fixture file instead of Prometheus
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Trend window (e.g., "1h", "6h", "7d")
    #[arg(long)]
    range: Option<String>,

    /// Trend step (e.g., "60s", "5m")
    #[arg(long)]
    step: Option<String>,

    /// Only show this disk device ("all" for every device)
    #[arg(short, long)]
    device: Option<String>,

    /// Allow placeholder data on the CPU trend when the backend has none
    #[arg(long)]
    synthetic: bool,

    /// Export the dashboard to a JSON file and exit
    #[arg(short, long, conflicts_with = "watch")]
    export: Option<PathBuf>,

    /// Keep polling and print one line per refresh
    #[arg(short, long)]
    watch: bool,

    /// Refresh interval for --watch (e.g., "30s")
    #[arg(short, long)]
    refresh: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut settings = Settings::load(args.config.as_deref())?;
    apply_args(&mut settings, &args);

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(&settings.log.filter))
                .context("Invalid log filter")?,
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let backend = build_backend(&settings, args.replay.as_deref())?;
    let catalog = Arc::new(settings.catalog()?);

    let mut dashboard = Dashboard::new(backend, catalog)
        .allow_synthetic(settings.monitor.synthetic_fallback)
        .with_range(settings.range_selection()?);
    if let Some(device) = &args.device {
        dashboard.select_device(device);
    }

    info!(
        source = dashboard.source_description(),
        range = %dashboard.range().label(),
        "Starting monitor"
    );

    let identity = InstanceIdentity {
        instance_id: args.instance.clone(),
        ..InstanceIdentity::default()
    };
    dashboard.open(&identity);

    if args.watch {
        return run_watch(&mut dashboard, settings.refresh_interval()?).await;
    }

    let data = dashboard.refresh().await;
    match &args.export {
        Some(path) => {
            data.export(path)?;
            println!("Exported dashboard to: {}", path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&data)?),
    }

    if let Some(msg) = error_message(&data) {
        bail!("{}", msg);
    }
    Ok(())
}

/// Command-line flags win over every other settings source.
fn apply_args(settings: &mut Settings, args: &Args) {
    if let Some(endpoint) = &args.endpoint {
        settings.prometheus.endpoint = endpoint.clone();
    }
    if let Some(range) = &args.range {
        settings.monitor.range = range.clone();
    }
    if let Some(step) = &args.step {
        settings.monitor.step = step.clone();
    }
    if let Some(refresh) = &args.refresh {
        settings.monitor.refresh = refresh.clone();
    }
    if args.synthetic {
        settings.monitor.synthetic_fallback = true;
    }
}

fn build_backend(settings: &Settings, replay: Option<&Path>) -> Result<Arc<dyn MetricsBackend>> {
    if let Some(path) = replay {
        let backend = ReplayBackend::load(path)
            .with_context(|| format!("Failed to load fixtures from {}", path.display()))?;
        return Ok(Arc::new(backend));
    }
    prometheus_backend(settings)
}

#[cfg(feature = "prometheus")]
fn prometheus_backend(settings: &Settings) -> Result<Arc<dyn MetricsBackend>> {
    use vmwatch_adapters::prometheus::PrometheusAdapter;

    let mut builder = PrometheusAdapter::builder()
        .endpoint(&settings.prometheus.endpoint)
        .timeout(settings.timeout()?);
    if let (Some(username), Some(password)) =
        (&settings.prometheus.username, &settings.prometheus.password)
    {
        builder = builder.credentials(username, password);
    }
    Ok(Arc::new(builder.build()?))
}

#[cfg(not(feature = "prometheus"))]
fn prometheus_backend(_settings: &Settings) -> Result<Arc<dyn MetricsBackend>> {
    bail!("Built without the prometheus feature; use --replay")
}

/// Poll until interrupted.
async fn run_watch(dashboard: &mut Dashboard, refresh: Duration) -> Result<()> {
    let refresh = refresh.max(Duration::from_secs(1));
    let mut interval = tokio::time::interval(refresh);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let data = dashboard.refresh().await;
                if let Some(msg) = error_message(&data) {
                    warn!(error = msg, "Monitor failed");
                }
                println!("{}", data.summary_line());
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping");
                return Ok(());
            }
        }
    }
}

fn error_message(data: &DashboardData) -> Option<&str> {
    if data.state.is_error() {
        data.state.error_message.as_deref()
    } else {
        None
    }
}
