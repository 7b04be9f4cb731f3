// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::{Context, Result};
use caddy_watcher::{
    allowlist::{AllowlistResolver, DohClient},
    config::WatcherConfig,
    reconcilers::{run_allowlist_notifier, ReconcileSettings, Reconciler},
    runtime::DockerClient,
    shutdown::{self, Shutdown, ShutdownTrigger},
    status::{server, StatusManager},
    store::ConfigStore,
};
use clap::Parser;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

fn main() -> Result<()> {
    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .thread_name("caddy-watcher")
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

fn init_tracing() {
    // Respects RUST_LOG, defaulting to INFO, and RUST_LOG_FORMAT=json|text
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }
}

async fn async_main() -> Result<()> {
    init_tracing();
    let config = WatcherConfig::parse();
    let caddy_container = config.caddy_container();

    info!(
        project = %config.project_name,
        caddy_container = %caddy_container,
        network_suffix = %config.network_suffix,
        hosts_dir = %config.hosts_dir.display(),
        "Starting caddy-watcher"
    );

    let store = ConfigStore::new(&config.hosts_dir);
    store
        .ensure_layout()
        .context("failed to create hosts directory layout")?;

    let status = Arc::new(StatusManager::new(
        config.code_editor_url.clone(),
        config.status_domain(),
    ));

    let wildcard_domains = config.wildcard_domains();
    if !wildcard_domains.is_empty() {
        store.write_wildcard_configs(&wildcard_domains, config.wildcard_dns_provider)?;
        status.set_wildcard_domains(wildcard_domains).await;
    }

    debug!(endpoint = %config.docker_host, "Initializing Docker client");
    let docker = DockerClient::new(&config.docker_host)?;
    docker.ping().await.context("cannot reach Docker")?;

    let (trigger, shutdown) = shutdown::channel();
    let trigger = Arc::new(trigger);
    spawn_signal_handler(trigger.clone());

    let (resolver, allowlist_changes) = AllowlistResolver::new(Arc::new(DohClient::new()?));
    let resolver = Arc::new(resolver);

    let mut settings = ReconcileSettings::new(caddy_container, config.network_suffix.clone());
    settings.destroy_grace = config.destroy_grace_period();
    settings.cleanup_interval = config.cleanup_interval();

    let reconciler = Reconciler::new(
        Arc::new(docker),
        store,
        resolver.clone(),
        status.clone(),
        settings,
        shutdown.clone(),
    );

    let processed = reconciler.process_existing_networks().await?;
    info!(networks = processed, "Initial reconciliation complete");

    let listener = match config.status_domain() {
        Some(domain) => {
            let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.status_port));
            let listener = TcpListener::bind(addr)
                .await
                .with_context(|| format!("failed to bind status server on {addr}"))?;
            info!(domain = %domain, "Status server enabled");
            Some(listener)
        }
        None => {
            debug!("No status domain configured, status server disabled");
            None
        }
    };
    let status_server = run_status_server(listener, status, shutdown.clone());

    info!("Watching for events...");

    // Long-lived tasks only return on shutdown; anything else is fatal
    let result = tokio::select! {
        () = reconciler.run_event_loop() => loop_exited("Event loop", &shutdown),
        () = resolver.clone().run(config.dns_refresh_interval(), shutdown.clone()) => {
            loop_exited("Allowlist refresh loop", &shutdown)
        }
        () = reconciler.run_cleanup_loop() => loop_exited("Cleanup loop", &shutdown),
        () = run_allowlist_notifier(reconciler.clone(), allowlist_changes) => {
            loop_exited("Allowlist notifier", &shutdown)
        }
        result = status_server => {
            result?;
            loop_exited("Status server", &shutdown)
        }
    };

    trigger.trigger();
    info!("caddy-watcher stopped");
    result
}

async fn run_status_server(
    listener: Option<TcpListener>,
    status: Arc<StatusManager>,
    shutdown: Shutdown,
) -> Result<()> {
    match listener {
        Some(listener) => server::serve(listener, status, shutdown)
            .await
            .context("status server failed"),
        None => {
            shutdown.cancelled().await;
            Ok(())
        }
    }
}

fn loop_exited(name: &str, shutdown: &Shutdown) -> Result<()> {
    if shutdown.is_shutdown() {
        info!("{name} stopped");
        return Ok(());
    }
    error!("CRITICAL: {name} exited unexpectedly");
    anyhow::bail!("{name} exited unexpectedly")
}

fn spawn_signal_handler(trigger: Arc<ShutdownTrigger>) {
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Shutdown signal received");
        trigger.trigger();
    });
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        Err(e) => {
            error!(error = %e, "Failed to install SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
