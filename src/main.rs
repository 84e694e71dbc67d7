//! junit2alertmanager CLI - send failing JUnit test cases to Alertmanager.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use junit2alertmanager::build_info::BuildInfo;
use junit2alertmanager::config::{self, Config, parse_duration};
use junit2alertmanager::delivery::{HttpTransport, TlsPolicy};
use junit2alertmanager::pipeline::{build_alerts, send_report};

#[derive(Parser)]
#[command(name = "junit2alertmanager")]
#[command(about = "Send failing JUnit XML test cases to a Prometheus Alertmanager", long_about = None)]
#[command(version = BuildInfo::CURRENT.version)]
struct Cli {
    /// Alertmanager base URLs, tried in order, e.g. http://127.0.0.1:9093
    ///
    /// Accepts comma-separated lists and may be repeated.
    #[arg(
        short,
        long = "targets",
        visible_alias = "target",
        env = "ALERT_MANAGER_HOST",
        value_delimiter = ','
    )]
    targets: Vec<String>,

    /// Path to a JUnit XML file [default: junit.xml]
    #[arg(short = 'f', long)]
    junit: Option<PathBuf>,

    /// Prefix of the alertname label
    #[arg(short = 'n', long)]
    alert_name: Option<String>,

    /// URL to set as generator URL
    #[arg(short, long)]
    generator_url: Option<String>,

    /// Alert lifetime, e.g. 3m or 1h30m; 0 sets endsAt to the Unix epoch [default: 3m]
    #[arg(short, long, value_parser = parse_duration)]
    expire: Option<Duration>,

    /// Skip TLS certificate verification on targets (not recommended)
    #[arg(short = 'k', long)]
    skip_insecure: bool,

    /// Optional TOML configuration file; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the alerts as JSON instead of sending them
    #[arg(long)]
    dry_run: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,junit2alertmanager={}", log_level)));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    debug!("{}", BuildInfo::CURRENT);

    let config = resolve_config(&cli)?;

    if cli.dry_run {
        let alerts = build_alerts(&config)?;
        println!("{}", serde_json::to_string_pretty(&alerts)?);
        return Ok(());
    }

    let transport = HttpTransport::new(
        TlsPolicy::from_skip_insecure(config.skip_insecure),
        BuildInfo::CURRENT,
    )?;

    info!(
        "Sending alerts from {} to {} target(s)",
        config.junit_file.display(),
        config.targets.len()
    );
    let delivered = send_report(&config, transport).await?;

    println!(
        "{} {} alert(s) to {}",
        console::style("Sent").green().bold(),
        delivered.alert_count,
        delivered.target
    );
    if delivered.attempts > 1 {
        println!(
            "{}",
            console::style(format!(
                "{} target(s) failed before one accepted the alerts",
                delivered.attempts - 1
            ))
            .dim()
        );
    }

    Ok(())
}

/// Loads the optional config file, then applies command-line overrides.
fn resolve_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            let config = config::load_config(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?;
            info!("Loaded configuration from {}", path.display());
            config
        }
        None => Config::default(),
    };

    // Apply overrides
    if !cli.targets.is_empty() {
        config.targets = cli.targets.clone();
    }
    if let Some(junit) = &cli.junit {
        config.junit_file = junit.clone();
    }
    if let Some(alert_name) = &cli.alert_name {
        config.alert_name = alert_name.clone();
    }
    if let Some(generator_url) = &cli.generator_url {
        config.generator_url = generator_url.clone();
    }
    if let Some(expire) = cli.expire {
        config.expire = expire;
    }
    if cli.skip_insecure {
        config.skip_insecure = true;
    }

    Ok(config.validated()?)
}
