use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tc_bridge::concurrency::shutdown::{ShutdownTx, create_shutdown_channel};
use tc_bridge::error::{BridgeError, BridgeResult};
use tc_bridge::forward::{ForwardingRouter, ForwardingRoutes, TcpSender};
use tc_bridge::parser::RecordParser;
use tc_bridge::pipeline::IngestionPipeline;
use tc_bridge::query::RecordQuery;
use tc_bridge::store::DurableStore;
use tc_bridge::store::memory::MemoryCacheStore;
use tc_bridge::store::postgres::PostgresStore;
use tc_bridge::types::ConnectionPoolState;
use tc_bridge::workers::health::HealthMonitor;
use tc_bridge::workers::listener::{ListenerHandle, ListenerWorker};
use tc_config::shared::{GatewayConfig, GatewayConfigWithoutSecrets, ListenerConfig};
use tokio::signal::unix::{SignalKind, signal};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::cli::QueryCommand;
use crate::error::GatewayResult;

type GatewayPipeline = IngestionPipeline<MemoryCacheStore, PostgresStore, TcpSender>;

/// Runs the gateway until a shutdown signal is received.
///
/// The durable store is connected before any listener is bound, an unreachable database
/// stops the startup with an error.
pub async fn start_gateway_with_config(config: GatewayConfig) -> GatewayResult<()> {
    info!("starting tc gateway");
    log_config(&config);

    let store = PostgresStore::connect(&config.database, &config.pool).await?;

    let sender = TcpSender::from_config(&config.forwarding);
    let router = ForwardingRouter::new(ForwardingRoutes::from_config(&config.forwarding), sender);
    let pipeline: Arc<GatewayPipeline> = Arc::new(IngestionPipeline::new(
        RecordParser::new(config.parser.delimiter.clone()),
        MemoryCacheStore::with_capacity_limit(config.cache.max_records_per_type),
        store,
        router,
    ));

    let (shutdown_tx, _) = create_shutdown_channel();

    let listeners = match start_listeners(&config.listeners, &pipeline, &shutdown_tx).await {
        Ok(listeners) => listeners,
        Err(err) => {
            release_outbound(&pipeline).await;
            return Err(err.into());
        }
    };

    let monitor = HealthMonitor::new(
        pipeline.clone(),
        Duration::from_millis(config.monitor.interval_ms),
        shutdown_tx.subscribe(),
    )
    .start();

    let signal_handle = spawn_signal_handler(shutdown_tx.clone());

    let listeners_result = wait_for_listeners(listeners).await;
    monitor.wait().await;

    signal_handle.abort();
    let _ = signal_handle.await;

    release_outbound(&pipeline).await;

    let stats = pipeline.stats();
    info!(
        total_received = stats.counters.total_received,
        durable_saved = stats.counters.durable_saved,
        errors = stats.counters.errors,
        success_rate = stats.success_rate,
        "tc gateway stopped"
    );

    listeners_result?;

    Ok(())
}

/// Binds every configured listener.
///
/// When one fails, the listeners started before it are shut down and awaited.
async fn start_listeners(
    configs: &[ListenerConfig],
    pipeline: &Arc<GatewayPipeline>,
    shutdown_tx: &ShutdownTx,
) -> BridgeResult<Vec<ListenerHandle>> {
    let mut handles = Vec::with_capacity(configs.len());

    for config in configs {
        let worker = ListenerWorker::new(config.clone(), pipeline.clone(), shutdown_tx.subscribe());
        match worker.start().await {
            Ok(handle) => handles.push(handle),
            Err(err) => {
                error!(listener = %config.name, error = %err, "failed to start listener");
                if let Err(err) = shutdown_tx.shutdown() {
                    warn!(error = ?err, "failed to send shutdown signal");
                }
                // The failed bind is reported, errors of already running listeners are logged.
                if let Err(wait_err) = wait_for_listeners(handles).await {
                    warn!(error = %wait_err, "listener failed while stopping");
                }

                return Err(err);
            }
        }
    }

    Ok(handles)
}

/// Waits for every listener, aggregating their failures.
async fn wait_for_listeners(handles: Vec<ListenerHandle>) -> BridgeResult<()> {
    let mut errors = Vec::new();
    for handle in handles {
        let name = handle.name().to_string();
        if let Err(err) = handle.wait().await {
            error!(listener = %name, error = %err, "listener failed");
            errors.push(err);
        }
    }

    if errors.is_empty() {
        return Ok(());
    }

    Err(BridgeError::from(errors))
}

/// Closes the outbound sender, then the durable store.
async fn release_outbound(pipeline: &GatewayPipeline) {
    pipeline.router().close().await;
    pipeline.durable().disconnect().await;
}

/// Triggers shutdown on SIGINT or SIGTERM.
fn spawn_signal_handler(shutdown_tx: ShutdownTx) -> JoinHandle<()> {
    tokio::spawn(async move {
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        info!("sigint (ctrl+c) received, shutting down gateway");
                    }
                    _ = sigterm.recv() => {
                        info!("sigterm received, shutting down gateway");
                    }
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to register sigterm handler, only ctrl+c stops the gateway");
                if let Err(err) = tokio::signal::ctrl_c().await {
                    error!(error = %err, "failed to listen for ctrl+c");
                    return;
                }
                info!("sigint (ctrl+c) received, shutting down gateway");
            }
        }

        if let Err(err) = shutdown_tx.shutdown() {
            warn!(error = ?err, "failed to send shutdown signal");
        }
    })
}

#[derive(Debug, Serialize)]
struct CheckReport {
    healthy: bool,
    pool: ConnectionPoolState,
}

/// Runs a one-shot query command and prints its result as JSON.
pub async fn run_query_command(config: GatewayConfig, command: QueryCommand) -> GatewayResult<()> {
    let store = PostgresStore::connect(&config.database, &config.pool).await?;
    let query = RecordQuery::new(store);

    let output = match command {
        QueryCommand::Recent { record_type, limit } => {
            let records = query.recent_records(record_type, limit).await;
            serde_json::to_string_pretty(&records)
        }
        QueryCommand::Coil {
            coil_number,
            records: false,
        } => {
            let summary = query.coil_summary(&coil_number).await;
            serde_json::to_string_pretty(&summary)
        }
        QueryCommand::Coil {
            coil_number,
            records: true,
        } => {
            let records = query.coil_records(&coil_number).await;
            serde_json::to_string_pretty(&records)
        }
        QueryCommand::Check => {
            let report = CheckReport {
                healthy: query.is_healthy().await,
                pool: query.pool_state(),
            };
            serde_json::to_string_pretty(&report)
        }
    };

    query.store().disconnect().await;

    println!("{}", output.map_err(BridgeError::from)?);

    Ok(())
}

fn log_config(config: &GatewayConfig) {
    let config = GatewayConfigWithoutSecrets::from(config.clone());
    info!(
        host = %config.database.host,
        port = config.database.port,
        database = %config.database.name,
        username = %config.database.username,
        tls_enabled = config.database.tls.enabled,
        min_connections = config.pool.min_connections,
        max_connections = config.pool.max_connections,
        "durable store config"
    );

    for listener in &config.listeners {
        info!(
            listener = %listener.name,
            address = %listener.bind_address(),
            role = %listener.role,
            max_message_bytes = listener.max_message_bytes,
            "listener config"
        );
    }

    info!(
        host = %config.forwarding.host,
        schedule_port = ?config.forwarding.schedule_port,
        wpd_pass_port = ?config.forwarding.wpd_pass_port,
        line_speed_port = ?config.forwarding.line_speed_port,
        "forwarding config"
    );

    debug!(
        delimiter = %config.parser.delimiter,
        max_records_per_type = ?config.cache.max_records_per_type,
        monitor_interval_ms = config.monitor.interval_ms,
        metrics_port = ?config.telemetry.metrics_port,
        "pipeline config"
    );
}
