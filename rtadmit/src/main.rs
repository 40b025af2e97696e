/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};

use rtadmit::api::{self, AppState};
use rtadmit::config::EngineConfig;
use rtadmit::store::{run_flush_loop, NodeStore};
use rtadmit::tdma::TdmaDomain;

// ── CLI argument definition ───────────────────────────────────────────────────

/// rtadmit per-node admission controller.
///
/// Example:
///   rtadmit --config /etc/rtadmit/rtadmit.yaml --listen 0.0.0.0:8080
#[derive(Debug, Parser)]
#[command(
    name = "rtadmit",
    about = "Real-time admission control: sporadic-server bandwidth and TDMA slots",
    long_about = None,
)]
struct Cli {
    /// Path to the YAML engine configuration file.
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Address the HTTP server listens on.
    #[arg(short = 'l', long = "listen", default_value = "0.0.0.0:8080")]
    listen: SocketAddr,

    /// Name this node reports itself as.
    #[arg(short = 'n', long = "node-name", env = "THIS_NODE")]
    node_name: Option<String>,

    /// Number of cores servers may be pinned to.
    #[arg(long = "cores")]
    cores: Option<usize>,

    /// WCET multiplier for low-criticality workloads.
    #[arg(long = "wcet-multiplier", env = "WCET_MULTIPLIER")]
    wcet_multiplier: Option<u64>,

    /// Directory of the file-backed storage.
    #[arg(long = "storage-dir")]
    storage_dir: Option<PathBuf>,
}

impl Cli {
    /// Apply command-line overrides on top of the file configuration.
    fn apply(&self, config: &mut EngineConfig) {
        if let Some(name) = &self.node_name {
            config.node_name = name.clone();
        }
        if let Some(cores) = self.cores {
            config.policy.cores = cores;
        }
        if let Some(m) = self.wcet_multiplier {
            config.policy.wcet_multiplier = m;
        }
        if let Some(dir) = &self.storage_dir {
            config.storage.directory = dir.clone();
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Initialise structured logging.
    // Level is controlled by the RUST_LOG env-var (e.g. RUST_LOG=debug).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("rtadmit starting up...");

    // ── Parse CLI arguments ───────────────────────────────────────────────────
    let cli = Cli::parse();

    // ── Load configuration ────────────────────────────────────────────────────
    let mut config = match &cli.config {
        Some(path) => match EngineConfig::load_from_file(path) {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load engine configuration: {:#}", e);
                process::exit(1);
            }
        },
        None => {
            warn!("No configuration file provided, using default engine settings");
            EngineConfig::default()
        }
    };

    cli.apply(&mut config);
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {:#}", e);
        process::exit(1);
    }

    info!(
        node = %config.node_name,
        listen = %cli.listen,
        cores = config.policy.cores,
        threshold = config.policy.threshold,
        server_period_us = config.policy.server_period_us,
        wcet_multiplier = config.policy.wcet_multiplier,
        storage = ?config.storage.backend,
        directory = %config.storage.directory.display(),
        tdma = config.tdma.is_some(),
        "Configuration"
    );

    // ── Restore node state ────────────────────────────────────────────────────
    let store = match NodeStore::open(config.storage.open_backend(), config.policy.clone()) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!("Failed to restore node state: {}", e);
            process::exit(1);
        }
    };

    for c in store.list() {
        info!(
            "  [{name}]  core={core}  band={band}%  prio={prio}  tasks={tasks}",
            name = c.name,
            core = c.core,
            band = c.band,
            prio = c.priority,
            tasks = c.tasks.len(),
        );
    }
    info!(used = ?store.used_bandwidths(), "per-core bandwidth");

    let flusher = tokio::spawn(run_flush_loop(
        Arc::clone(&store),
        config.storage.flush_interval,
    ));

    // ── Serve ─────────────────────────────────────────────────────────────────
    let tdma = config.tdma.clone().map(|t| {
        info!(
            master = %t.master,
            major_cycle_us = t.major_cycle_us,
            guard_band_us = t.guard_band_us,
            reserved_head_us = t.reserved_head_us,
            "TDMA allocator enabled"
        );
        Arc::new(TdmaDomain::new(t))
    });

    let app = api::router(AppState {
        node_name: Arc::from(config.node_name.as_str()),
        store: Arc::clone(&store),
        tdma,
    });

    let listener = match tokio::net::TcpListener::bind(cli.listen).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", cli.listen, e);
            process::exit(1);
        }
    };
    info!("Listening on {}", cli.listen);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("HTTP server failed: {}", e);
    }

    // ── Shutdown ──────────────────────────────────────────────────────────────
    flusher.abort();
    match store.flush() {
        Ok(true) => info!("Final state flushed"),
        Ok(false) => info!("State already up to date"),
        Err(e) => error!("Final state flush failed: {}", e),
    }
    info!("rtadmit stopped");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Cannot listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
