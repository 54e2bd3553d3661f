//! Prometheus exporter for metricbridge registries.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, Instant};

use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};

use metricbridge_common::{FnGauge, SharedRegistries, SharedRegistry, init_tracing};
use metricbridge_exporter_prometheus::{ExporterConfig, HttpServer, MetricCollector};

/// Identifier of the timer recording every scrape.
const SCRAPE_TIMER: &str = "metricbridge.scrape";

/// Prometheus exporter for metricbridge registries.
#[derive(Parser, Debug)]
#[command(name = "metricbridge-exporter-prometheus")]
#[command(about = "Export a metricbridge registry as Prometheus metrics")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long)]
    config: Option<String>,

    /// HTTP listen address (overrides config).
    #[arg(long)]
    listen: Option<String>,

    /// Log level (trace, debug, info, warn, error); overrides config.
    #[arg(long)]
    log_level: Option<String>,

    /// Populate the registry with demo metrics that change over time.
    #[arg(long)]
    demo: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = if let Some(config_path) = &args.config {
        ExporterConfig::load_from_file(config_path)?
    } else {
        ExporterConfig::default()
    };

    if let Some(listen) = args.listen {
        config.prometheus.listen = listen;
        config.validate()?;
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }

    init_tracing(&config.logging)?;

    info!("Starting metricbridge Prometheus exporter");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // The process-wide default registry always exists; other names must be
    // created by the embedding application.
    let own_registry = SharedRegistries::get_or_create(SharedRegistries::DEFAULT);
    let scrape_timer = own_registry.timer(SCRAPE_TIMER)?;

    let demo_task = if args.demo {
        let registry = SharedRegistries::get_or_create(&config.prometheus.registry);
        Some(spawn_demo(registry, shutdown_rx.clone())?)
    } else {
        None
    };

    let collector = Arc::new(
        MetricCollector::from_config(&config.prometheus, &config.filters)?
            .with_scrape_timer(scrape_timer),
    );

    info!(
        registry = %config.prometheus.registry,
        metrics = collector.registry().len(),
        "Exporting registry"
    );

    let listen_addr = config
        .prometheus
        .listen
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid listen address: {}", e))?;

    let http_server = HttpServer::new(
        collector.clone(),
        listen_addr,
        config.prometheus.path.clone(),
    )
    .with_allowed_origin(config.prometheus.allowed_origin.clone());

    let http_shutdown = shutdown_rx.clone();
    let http_task = tokio::spawn(async move {
        if let Err(e) = http_server.run(http_shutdown).await {
            error!("HTTP server error: {}", e);
        }
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate() => {
            info!("Received SIGTERM, shutting down...");
        }
    }

    shutdown_tx.send(true)?;

    let _ = tokio::time::timeout(Duration::from_secs(5), async {
        let _ = http_task.await;
        if let Some(task) = demo_task {
            let _ = task.await;
        }
    })
    .await;

    let stats = collector.stats();
    info!(
        scrapes = stats.scrapes,
        failed_scrapes = stats.failed_scrapes,
        metrics_exported = stats.metrics_exported,
        metrics_skipped = stats.metrics_skipped,
        "Final statistics"
    );

    info!("Exporter stopped");
    Ok(())
}

#[cfg(unix)]
async fn terminate() {
    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            error!("Failed to install SIGTERM handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}

/// Register a set of demo metrics and keep them moving until shutdown.
fn spawn_demo(
    registry: SharedRegistry,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<tokio::task::JoinHandle<()>> {
    let started = Instant::now();
    let queue_depth = Arc::new(AtomicI64::new(0));

    registry.gauge(
        "demo.uptime.seconds",
        FnGauge::new(move || started.elapsed().as_secs_f64()),
    )?;
    let depth = queue_depth.clone();
    registry.gauge(
        "demo.queue.{queue:ingest}.depth",
        FnGauge::new(move || depth.load(Ordering::Relaxed)),
    )?;
    registry.gauge(
        "demo.build.{version:0.2.0}.info",
        FnGauge::new(|| serde_json::json!(1)),
    )?;
    registry.gauge(
        "demo.build.channel",
        FnGauge::new(|| serde_json::json!("stable")),
    )?;

    let workers = registry.counter("demo.workers.{pool:main}.active")?;
    let payloads = registry.histogram("demo.payload.bytes")?;
    let requests = registry.meter("demo.requests")?;
    let api_latency = registry.timer("demo.request.{route:api}.latency")?;
    let static_latency = registry.timer("demo.request.{route:static}.latency")?;

    info!(metrics = registry.len(), "Demo metrics registered");

    Ok(tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(500));
        let mut tick: i64 = 0;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    tick += 1;
                    let wave = tick % 20;

                    queue_depth.store(wave * 3, Ordering::Relaxed);
                    if wave < 10 { workers.inc() } else { workers.dec() }
                    payloads.update(512 + wave * 64);
                    requests.mark_n(1 + tick % 5);
                    api_latency.update(Duration::from_millis(20 + (wave * 7) as u64));
                    static_latency.update(Duration::from_micros(300 + (wave * 40) as u64));
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }))
}
