//! Serve - run the relay
//!
//! Binds one listener per routed port, starts the dispatcher and the sink,
//! then waits for Ctrl+C, SIGTERM, or a shutdown requested through the sink.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use sysrelay_config::Config;
use sysrelay_pipeline::Dispatcher;
use sysrelay_routing::{RoutingTable, RoutingTableBuilder};
use sysrelay_sinks::{
    IrcSink, IrcSinkConfig, Sink, SinkEvents, StdoutConfig, StdoutSink, TlsClientConfigBuilder,
};
use sysrelay_sources::{Listener, ListenerConfig};
use tokio::signal;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Run the relay with `config`, loaded from `config_path`
pub async fn run(config_path: &Path, config: Config) -> Result<()> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path.display(),
        "sysrelay starting"
    );

    if let Err(e) = run_relay(config).await {
        error!(error = %e, "relay error");
        return Err(e);
    }

    info!("sysrelay shutdown complete");
    Ok(())
}

async fn run_relay(config: Config) -> Result<()> {
    let cancel = CancellationToken::new();

    let routing_table = build_routing_table(&config)?;
    let listeners = bind_listeners(&config, &routing_table).await?;
    let sink = build_sink(&config)?;

    let (events_tx, events_rx) = mpsc::channel(config.global.queue_size);

    let dispatcher = Dispatcher::new(routing_table, Arc::clone(&sink));
    let dispatcher_task = tokio::spawn(dispatcher.run(events_rx, cancel.clone()));

    if let Err(e) = sink
        .start(SinkEvents::new(events_tx.clone(), cancel.clone()))
        .await
    {
        cancel.cancel();
        let _ = dispatcher_task.await;
        return Err(e).context("failed to start sink");
    }

    let listener_tasks: Vec<JoinHandle<()>> = listeners
        .into_iter()
        .map(|listener| tokio::spawn(listener.run(events_tx.clone(), cancel.clone())))
        .collect();
    drop(events_tx);

    info!(
        listeners = listener_tasks.len(),
        sink = %sink.name(),
        "sysrelay running"
    );

    tokio::select! {
        _ = wait_for_shutdown() => info!("shutdown signal received, stopping relay..."),
        _ = cancel.cancelled() => info!("shutdown requested, stopping relay..."),
    }

    cancel.cancel();

    // One deadline bounds the whole shutdown
    let deadline = Instant::now() + config.global.shutdown_timeout;

    for task in listener_tasks {
        join_until(task, deadline, "listener").await;
    }

    // The dispatcher disconnects the sink on its way out
    join_until(dispatcher_task, deadline, "dispatcher").await;

    Ok(())
}

/// Wait for `task`, giving up at `deadline`
async fn join_until<T>(task: JoinHandle<T>, deadline: Instant, name: &str) -> Option<T> {
    match tokio::time::timeout_at(deadline, task).await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            warn!(task = name, error = %e, "task panicked during shutdown");
            None
        }
        Err(_) => {
            warn!(task = name, "task did not stop before the shutdown deadline, continuing shutdown");
            None
        }
    }
}

/// Routing table over the configured channels and routes
fn build_routing_table(config: &Config) -> Result<RoutingTable> {
    let mut builder = RoutingTableBuilder::new();
    for destination in config.destinations() {
        builder.destination(&destination);
    }
    for route in config.routes()? {
        builder.route(route)?;
    }
    Ok(builder.build())
}

/// Bind every routed port up front; any failure aborts startup
async fn bind_listeners(config: &Config, routing_table: &RoutingTable) -> Result<Vec<Listener>> {
    let mut listeners = Vec::new();

    for port in routing_table.ports() {
        let listener_config = ListenerConfig {
            address: config.listeners.address.clone(),
            max_message_size: config.listeners.max_message_size,
            udp_workers: config.listeners.udp_workers,
            connection_timeout: config.listeners.tcp_connection_timeout,
            ..ListenerConfig::with_port(port)
        };
        let listener = Listener::bind(listener_config)
            .await
            .context("failed to start syslog listeners")?;
        listeners.push(listener);
    }

    if listeners.is_empty() {
        warn!("no routes configured, nothing to listen on");
    }
    Ok(listeners)
}

/// IRC when a server is configured, local echo otherwise
fn build_sink(config: &Config) -> Result<Arc<dyn Sink>> {
    let destinations = config.destinations();

    let Some(server) = config.irc.active_server() else {
        return Ok(Arc::new(StdoutSink::new(destinations, StdoutConfig::default())));
    };

    let tls = if server.ssl {
        let tls_config = TlsClientConfigBuilder::new()
            .build()
            .context("failed to set up TLS for the IRC connection")?;
        Some(tls_config)
    } else {
        None
    };

    let sink_config = IrcSinkConfig {
        password: server.password.clone(),
        tls,
        realname: config.irc.bot.realname.clone(),
        commands: config.irc.commands.clone(),
        channels: destinations,
        rate_limit: server.rate_limit,
        connect_timeout: server.connect_timeout,
        reconnect_interval: server.reconnect_interval,
        // Leaves the dispatcher time to finish after the QUIT
        quit_timeout: config.global.shutdown_timeout / 2,
        queue_size: config.global.queue_size,
        ..IrcSinkConfig::new(server.address(), &config.irc.bot.nickname)
    };

    let shutdown = config.irc.shutdown.clone();
    Ok(Arc::new(IrcSink::new(
        sink_config,
        Arc::new(move |nickmask: &str, text: &str| shutdown.is_shutdown_request(nickmask, text)),
    )))
}

async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
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
                error!(error = %e, "failed to install SIGTERM handler");
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
}
