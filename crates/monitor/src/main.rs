//! Drowsiness Alert - Main Entry Point

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use monitor::{init_logging, run, Settings};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    info!("=== Drowsiness Alert v{} ===", env!("CARGO_PKG_VERSION"));

    let settings = Settings::load().context("failed to load settings")?;

    let quit = Arc::new(AtomicBool::new(false));
    let watcher = {
        let quit = Arc::clone(&quit);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Quit requested");
                quit.store(true, Ordering::SeqCst);
            }
        })
    };

    // The loop blocks on capture and on the alarm's bounded stop
    let summary = tokio::task::spawn_blocking(move || run(&settings, quit))
        .await
        .context("detection loop panicked")??;
    watcher.abort();

    info!(
        "Session over: {} frames, {} alarms ({:?})",
        summary.frames, summary.alarms_raised, summary.exit_reason
    );
    Ok(())
}
