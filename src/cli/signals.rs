//! Signal handling for the interactive session

/// Resolve on the first SIGINT or SIGTERM
#[cfg(unix)]
pub async fn shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        _ = sigint.recv() => tracing::debug!("Received SIGINT"),
        _ = sigterm.recv() => tracing::debug!("Received SIGTERM"),
    }
    Ok(())
}

/// Resolve on Ctrl+C
#[cfg(not(unix))]
pub async fn shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await?;
    tracing::debug!("Received Ctrl+C");
    Ok(())
}
