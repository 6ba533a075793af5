//! ReplyRate Server
//!
//! Serves the reply-rate dashboard:
//! - Per-user outreach statistics for a calendar period (email, LinkedIn
//!   message, LinkedIn InMail), split by replied / not replied
//! - Optional comparison against a second period
//! - Aggregates fetched from a Hasura GraphQL endpoint (optionally hosted on
//!   Nhost), cached for a short TTL
//! - Health, readiness and Prometheus metrics endpoints
//!
//! Usage:
//! ```bash
//! # With config file
//! replyrate-server --config replyrate.yaml
//!
//! # Secrets always come from the environment
//! REPLYRATE_ADMIN_SECRET=... replyrate-server --config replyrate.yaml
//!
//! # One-shot chart data for a selection, printed as JSON
//! replyrate-server --config replyrate.yaml snapshot --period last_month --period-compare last_week
//! ```

mod config;

use anyhow::{Context, anyhow};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use config::ServerConfig;
use replyrate_core::{AggregateSource, FilterSelection, PeriodField, PeriodQuery, shape};
use replyrate_egress::{CachedSource, HasuraConnector};
use replyrate_observability::{BackendStatus, HealthState, Metrics, ReadinessChecker, init_logging};
use replyrate_ui::{ControllerConfig, DashboardSessions, UiServer};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("REPLYRATE_GIT_SHA"),
    ")"
);

/// ReplyRate Server - outreach reply-rate dashboard
#[derive(Parser)]
#[command(name = "replyrate-server")]
#[command(about = "Reply-rate statistics dashboard", long_about = None)]
#[command(version = VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to configuration file (YAML or TOML)
    #[arg(
        short,
        long,
        value_name = "FILE",
        env = "REPLYRATE_CONFIG",
        global = true
    )]
    config: Option<String>,

    /// Host to bind to
    #[arg(long, global = true)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, global = true)]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the dashboard server (default if no command specified)
    Serve,
    /// Fetch one selection and print its chart data as JSON
    Snapshot {
        /// User id (defaults to the configured default user)
        #[arg(long)]
        user: Option<String>,

        /// current_week, current_month, last_week or last_month
        #[arg(long, default_value = "current_month")]
        period: String,

        /// none, or a period to compare with
        #[arg(long, default_value = "none")]
        period_compare: String,

        /// Resolve periods relative to this date instead of today (YYYY-MM-DD)
        #[arg(long)]
        today: Option<NaiveDate>,
    },
}

/// Reports the aggregation backend in `/readyz`
struct BackendReadiness {
    source: Arc<dyn AggregateSource>,
    endpoint: String,
}

impl ReadinessChecker for BackendReadiness {
    fn is_ready(&self) -> bool {
        self.source.is_ready()
    }

    fn backend_statuses(&self) -> Vec<BackendStatus> {
        vec![BackendStatus {
            name: "hasura".to_string(),
            ready: self.source.is_ready(),
            detail: Some(self.endpoint.clone()),
        }]
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ServerConfig::from_file(path)?,
        None => ServerConfig::default(),
    };
    config.merge_env();

    // CLI flags take precedence over env and file
    if let Some(host) = cli.host {
        config.ui.host = host;
    }
    if let Some(port) = cli.port {
        config.ui.port = port;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }

    init_logging(&config.logging.level, config.logging.json)
        .map_err(|e| anyhow!("failed to initialize logging: {}", e))?;

    info!("ReplyRate {}", VERSION);
    if let Some(path) = &cli.config {
        info!("📁 Loaded configuration from: {}", path);
    }

    let hasura = config.backend.hasura_config()?;
    let endpoint = hasura.graphql_url.clone();
    info!(
        "🔌 Aggregation backend: {} (auth: {:?})",
        endpoint,
        config.backend.effective_auth_method()
    );

    let connector = Arc::new(HasuraConnector::new(hasura)?);
    connector
        .connect()
        .await
        .context("failed to authenticate with the aggregation backend")?;

    let source: Arc<dyn AggregateSource> =
        Arc::new(CachedSource::new(connector, config.backend.cache_ttl()));

    let result = match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config, Arc::clone(&source), endpoint).await,
        Commands::Snapshot {
            user,
            period,
            period_compare,
            today,
        } => {
            snapshot(
                &config,
                source.as_ref(),
                user,
                &period,
                &period_compare,
                today,
            )
            .await
        }
    };

    if let Err(e) = source.shutdown().await {
        warn!("Failed to close backend session: {}", e);
    }

    result
}

async fn serve(
    config: ServerConfig,
    source: Arc<dyn AggregateSource>,
    endpoint: String,
) -> anyhow::Result<()> {
    let initial = config.dashboard.initial_selection()?;
    info!(
        "📊 Default selection: user={} period={} compare={}",
        initial.user, initial.period, initial.period_compare
    );

    let metrics = Arc::new(Metrics::new().map_err(|e| anyhow!("failed to create metrics: {}", e))?);
    let sessions = Arc::new(
        DashboardSessions::new(
            Arc::clone(&source),
            initial,
            ControllerConfig {
                debounce: Duration::from_millis(config.dashboard.debounce_ms),
                week_start: config.dashboard.week_start,
                fixed_today: None,
            },
            Arc::clone(&metrics),
        )
        .with_idle_timeout(config.ui.session_idle_timeout()),
    );

    let readiness = Arc::new(BackendReadiness { source, endpoint });
    let health = HealthState::new(metrics).with_readiness_checker(readiness);

    UiServer::new(
        config.ui.clone(),
        Arc::clone(&sessions),
        Arc::new(config.dashboard.clone()),
    )
    .with_health(health)
    .serve(shutdown_signal())
    .await?;

    sessions.shutdown();
    Ok(())
}

#[derive(Serialize)]
struct SnapshotOutput {
    filters: FilterSelection,
    today: NaiveDate,
    primary_range: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    compare_range: Option<String>,
    charts: replyrate_core::ChartData,
}

async fn snapshot(
    config: &ServerConfig,
    source: &dyn AggregateSource,
    user: Option<String>,
    period: &str,
    period_compare: &str,
    today: Option<NaiveDate>,
) -> anyhow::Result<()> {
    let user = match user {
        Some(user) => user,
        None => config.dashboard.initial_selection()?.user.to_string(),
    };
    let selection = FilterSelection::parse(&user, period, period_compare)?;
    let today = today.unwrap_or_else(|| Local::now().date_naive());
    let week_start = config.dashboard.week_start;

    let primary = selection
        .resolve(PeriodField::Period, today, week_start)?
        .ok_or_else(|| anyhow!("period did not resolve"))?;
    let compare = selection.resolve(PeriodField::Compare, today, week_start)?;

    let (primary_counts, compare_counts) = tokio::join!(
        source.fetch_counts(&primary),
        fetch_optional(source, compare.as_ref()),
    );
    let primary_counts = primary_counts?;
    let compare_counts = match compare_counts {
        Ok(counts) => counts,
        Err(e) => {
            warn!("Comparison fetch failed, omitting comparison: {}", e);
            None
        }
    };

    let output = SnapshotOutput {
        filters: selection,
        today,
        primary_range: primary.range.to_string(),
        compare_range: compare.map(|q| q.range.to_string()),
        charts: shape(&primary_counts, compare_counts.as_ref()),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn fetch_optional(
    source: &dyn AggregateSource,
    query: Option<&PeriodQuery>,
) -> replyrate_core::Result<Option<replyrate_core::AggregateCounts>> {
    match query {
        Some(query) => source.fetch_counts(query).await.map(Some),
        None => Ok(None),
    }
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
