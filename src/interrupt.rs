//! Two-stage interrupt handling for long-running commands

use std::future::Future;
use tokio::sync::watch;
use tracing::warn;

/// Wait for interrupts from `next_signal`.
///
/// The first interrupt sends `true` on `cancel` so work can wind down. The
/// function returns after the second one, and the caller should then exit.
pub async fn wait_for_second_interrupt<F, Fut>(
    mut next_signal: F,
    cancel: watch::Sender<bool>,
) -> std::io::Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    next_signal().await?;
    warn!("Interrupted, stopping search (press Ctrl-C again to exit immediately)");
    let _ = cancel.send(true);

    next_signal().await?;
    warn!("Interrupted again, exiting");
    Ok(())
}
