//! Janus bridge binary.
//!
//! Starts the HTTP/WebSocket bridge with structured logging, heartbeat
//! pruning, and graceful shutdown on SIGTERM/SIGINT. `issue-sigil` prints a
//! credential for an agent instead of serving.

use clap::Parser;
use janus_server::{
    app, background,
    cli::{self, Cli, Command},
    config::{self, Config},
    routing::ForwardingHandler,
    AppState,
};
use janus_sigil::SigilAuthenticator;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

fn resolve_config_path(cli: &Cli) -> (Option<String>, &'static str) {
    match cli.config.as_deref().map(str::trim) {
        Some(path) if !path.is_empty() => (Some(path.to_string()), "cli-or-env"),
        _ => (None, "default"),
    }
}

fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn build_state(config: &Config) -> AppState {
    let authenticator = match &config.auth.master_secret {
        Some(secret) => SigilAuthenticator::new(secret.clone()),
        None => {
            tracing::warn!(
                "no auth.master_secret configured; generated a random one, \
                 sigils will not survive a restart"
            );
            SigilAuthenticator::random()
        }
    };

    let secrets = config.auth.secret_store();
    tracing::info!(count = secrets.len(), "loaded agent secrets");

    let state = AppState::new(Arc::new(authenticator), secrets);
    let forwarding = ForwardingHandler::new(
        state.connections.clone(),
        config.bridge.forward_timeout(),
    );
    state.with_handler(Arc::new(forwarding))
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let (resolved_config_path, config_source) = resolve_config_path(&cli);
    let selected_config_path = resolved_config_path.as_deref().or(Some("config.toml"));

    // Load configuration
    let config = config::load_config(selected_config_path)
        .expect("failed to load configuration; the bridge cannot start without valid config");

    if let Some(Command::IssueSigil {
        agent_id,
        prefix,
        role,
        tier,
        sigil_type,
    }) = &cli.cmd
    {
        match cli::issue_sigil(&config, agent_id, *prefix, *role, *tier, *sigil_type) {
            Ok(issued) => print!("{}", cli::render_issued(agent_id, &issued)),
            Err(e) => {
                eprintln!("error: {e}");
                std::process::exit(2);
            }
        }
        return;
    }

    init_tracing(&config);

    tracing::info!(
        source = config_source,
        path = selected_config_path.unwrap_or("<none>"),
        "resolved startup configuration path"
    );

    let state = build_state(&config);

    // Start heartbeat pruning
    tokio::spawn(background::start_pruning_task(
        Arc::new(state.clone()),
        config.bridge.heartbeat_timeout_secs,
    ));

    let app = app(state);
    let addr = SocketAddr::new(config.server.host, config.server.port);

    tracing::info!(%addr, "starting janus bridge");

    let listener = TcpListener::bind(addr)
        .await
        .expect("failed to bind to address; is another process using this port?");

    // Serve with graceful shutdown
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("server error");

    tracing::info!("janus bridge shut down");
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, initiating graceful shutdown"); }
        () = terminate => { tracing::info!("received SIGTERM, initiating graceful shutdown"); }
    }
}
