//! Feedlink service entry point.
//!
//! `monitor` runs the supervised Redis link with health probing and
//! status reporting; the remaining subcommands are operator tools over
//! the shared market store.

use anyhow::Result;
use clap::{Parser, Subcommand};
use feedlink_bot::{AppConfig, RedisLink};
use feedlink_conn::{spawn_status_writer, ConnectionLifecycle, StateBroadcaster};
use feedlink_core::ConnectionState;
use feedlink_store::{
    keys, read_connection_status, OwnershipArbiter, RedisBackend, RedisStatusStore,
};
use feedlink_telemetry::Metrics;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Feedlink connection supervisor and market store CLI.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via FEEDLINK_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the supervised Redis link until interrupted.
    Monitor,
    /// Print a service's last reported connection status.
    Status {
        /// Service name; defaults to the configured one.
        #[arg(long)]
        service: Option<String>,
    },
    /// Print the algo that owns a market, if any.
    Owner {
        #[arg(long)]
        ticker: String,
    },
    /// Remove a market's owner so the next writer can claim it.
    ClearOwnership {
        #[arg(long)]
        ticker: String,
    },
    /// Print rejection counters for the last N days.
    Rejections {
        #[arg(long, default_value_t = 7)]
        days: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    feedlink_telemetry::init_logging()?;

    // Config path: CLI arg > FEEDLINK_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("FEEDLINK_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());
    let config = AppConfig::load(&config_path)?;

    match args.command {
        Command::Monitor => monitor(config).await,
        Command::Status { service } => {
            let backend = RedisBackend::connect(&config.redis_url).await?;
            let service = service.unwrap_or(config.service_name);
            match read_connection_status(&backend, &service).await? {
                Some(status) => {
                    println!("service:                 {service}");
                    println!("state:                   {}", status.state);
                    println!(
                        "error_context:           {}",
                        status.error_context.as_deref().unwrap_or("-")
                    );
                    println!("consecutive_failures:    {}", status.consecutive_failures);
                    println!(
                        "reconnection_attempts:   {}",
                        status.total_reconnection_attempts
                    );
                    println!("total_connections:       {}", status.total_connections);
                    println!("current_backoff_ms:      {}", status.current_backoff_ms);
                    println!("updated_at:              {}", status.updated_at);
                }
                None => println!("service {service} has never reported status"),
            }
            Ok(())
        }
        Command::Owner { ticker } => {
            let backend = RedisBackend::connect(&config.redis_url).await?;
            let arbiter = OwnershipArbiter::new(backend);
            match arbiter.owner(&keys::market_key(&ticker)).await? {
                Some(owner) => println!("{ticker} is owned by {owner}"),
                None => println!("{ticker} is unowned"),
            }
            Ok(())
        }
        Command::ClearOwnership { ticker } => {
            let backend = RedisBackend::connect(&config.redis_url).await?;
            let arbiter = OwnershipArbiter::new(backend);
            if arbiter.clear_ownership(&keys::market_key(&ticker)).await? {
                println!("cleared ownership of {ticker}");
            } else {
                println!("{ticker} was not owned");
            }
            Ok(())
        }
        Command::Rejections { days } => {
            let backend = RedisBackend::connect(&config.redis_url).await?;
            let arbiter = OwnershipArbiter::new(backend);
            let stats = arbiter.rejection_stats(days).await?;
            if stats.is_empty() {
                println!("no rejections in the last {days} day(s)");
            }
            for (day, counts) in stats {
                println!("{day}:");
                let mut pairs: Vec<_> = counts.into_iter().collect();
                pairs.sort();
                for (pair, count) in pairs {
                    println!("  {pair:<24} {count}");
                }
            }
            Ok(())
        }
    }
}

async fn monitor(config: AppConfig) -> Result<()> {
    info!("Starting feedlink v{}", env!("CARGO_PKG_VERSION"));

    let service = config.service_name.clone();

    // Status writes go over their own connection so the monitored link
    // going down still gets reported while it lasts.
    let status_backend = RedisBackend::connect(&config.redis_url).await?;
    let writer_token = CancellationToken::new();
    let (status_tx, status_writer) = spawn_status_writer(
        RedisStatusStore::new(status_backend),
        config.status.buffer,
        writer_token.clone(),
    );

    let broadcaster = Arc::new(StateBroadcaster::with_sink(status_tx));
    {
        let service = service.clone();
        broadcaster.register_callback(move |update| {
            Metrics::connection_state_set(&service, update.state);
            if update.state == ConnectionState::Connecting {
                Metrics::reconnect_attempt(&service);
            }
            if update.state == ConnectionState::Degraded {
                Metrics::probe_failure(&service);
            }
        });
    }

    let lifecycle = Arc::new(ConnectionLifecycle::new(
        service.clone(),
        config.lifecycle_config(),
        broadcaster,
    ));
    let link = Arc::new(RedisLink::new(config.redis_url.clone()));

    lifecycle.connect_with_retry(link.as_ref()).await?;
    lifecycle.mark_ready();
    lifecycle
        .start_health_monitoring(Arc::clone(&link), Arc::clone(&link))
        .await;

    info!(service = %service, "Monitoring Redis link, Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;

    info!("Shutdown requested");
    lifecycle.shutdown().await;
    writer_token.cancel();
    let _ = status_writer.await;
    Ok(())
}
