use tracing::info;

/// Waits for SIGTERM or SIGINT so the daemon can shut down gracefully
/// rather than being killed out from under its sessions. Async-native
/// analogue of the teacher's `signal-hook`-based thread handler: same
/// responsibility, expressed with `tokio::signal` since this daemon already
/// runs its whole accept loop on the tokio reactor.
pub async fn wait_for_shutdown() {
    let mut term = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(term) => term,
        Err(err) => {
            tracing::error!(error = %err, "failed to install SIGTERM handler");
            std::future::pending::<()>().await;
            unreachable!()
        }
    };

    tokio::select! {
        _ = term.recv() => info!("received SIGTERM, shutting down"),
        _ = tokio::signal::ctrl_c() => info!("received SIGINT, shutting down"),
    }
}
