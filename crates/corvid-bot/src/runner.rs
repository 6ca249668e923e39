//! The long-running bot loop.
//!
//! Wires the streaming connection to the orchestrator through the event bus
//! and keeps the two periodic maintenance passes (dedup retention sweep,
//! memory eviction) alive next to it. Every inbound event is handled on its
//! own spawned task so the connection's read loop never waits on a reply.

use std::time::Duration;

use secrecy::SecretString;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use corvid_infra::platform::EventStream;

use crate::state::AppState;

/// Run until shutdown (Ctrl-C/SIGTERM) or terminal connection failure.
pub async fn run(state: AppState, platform_token: SecretString) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();

    // Signal handler: first Ctrl-C/SIGTERM cancels everything.
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            info!("shutdown requested");
            shutdown.cancel();
        });
    }

    // The platform tells us who we are; the stream needs the bot's own id
    // to drop echoes of its own posts.
    let me = state.platform.me().await?;
    info!(bot = %me.username, id = %me.id, "authenticated with platform");

    let stream = EventStream::new(
        state.config.platform.stream_url.clone(),
        platform_token,
        me.id,
        state.config.platform.bot_handle.clone(),
        state.config.connection.clone(),
        state.bus.clone(),
        shutdown.clone(),
    );
    let stream_task = tokio::spawn(stream.run());

    // Dispatcher: every bus event gets its own handler task.
    let dispatcher = {
        let mut rx = state.bus.subscribe();
        let orchestrator = state.orchestrator.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    received = rx.recv() => match received {
                        Ok(event) => {
                            let orchestrator = orchestrator.clone();
                            tokio::spawn(async move {
                                let outcome = orchestrator.handle_event(event).await;
                                debug!(?outcome, "event handled");
                            });
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "event dispatcher lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        })
    };

    // Dedup retention sweep.
    let sweep_task = {
        let shutdown = shutdown.clone();
        let retention = chrono::Duration::days(i64::from(state.config.dedup.retention_days));
        let interval = Duration::from_secs(state.config.dedup.sweep_interval_secs);
        let sweeper = state.sweeper;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        match sweeper.sweep(retention).await {
                            Ok(pruned) => debug!(pruned, "dedup sweep complete"),
                            Err(err) => warn!(error = %err, "dedup sweep failed"),
                        }
                    }
                }
            }
        })
    };

    // Memory eviction pass.
    let evict_task = {
        let shutdown = shutdown.clone();
        let interval = Duration::from_secs(state.config.memory.evict_interval_secs);
        let memories = state.memories.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        match memories.evict_all().await {
                            Ok(deleted) => debug!(deleted, "memory eviction pass complete"),
                            Err(err) => warn!(error = %err, "memory eviction pass failed"),
                        }
                    }
                }
            }
        })
    };

    // The stream task is the process's backbone: when it ends, we stop.
    let stream_result = stream_task.await;
    shutdown.cancel();

    let _ = dispatcher.await;
    let _ = sweep_task.await;
    let _ = evict_task.await;

    match stream_result {
        Ok(Ok(())) => {
            info!("event stream closed cleanly");
            Ok(())
        }
        Ok(Err(err)) => {
            error!(error = %err, "event stream terminated");
            Err(err.into())
        }
        Err(join_err) => Err(anyhow::anyhow!("event stream task panicked: {join_err}")),
    }
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
