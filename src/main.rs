//! UploadList - demo session for the upload list synchronization core
//!
//! Main entry point for the command-line demo.
//!
//! # Overview
//!
//! The binary wires the library together the way a host application would:
//! - Logging infrastructure (file rotation + console output)
//! - Tokio runtime (transfers run as tasks on worker threads)
//! - Configuration loading ([`ConfigManager`])
//! - An [`UploadListManager`] bound to the in-process [`LocalEngine`]
//!
//! # Execution Flow
//!
//! 1. Load `UploadList Config.yaml` from `UploadList Data/`
//! 2. Initialize logging → logs/uploadlist.<date>, at debug level when `debug_mode` is set
//! 3. Load earlier upload records
//! 4. Queue a handful of demo files and simulate their transfers concurrently
//! 5. Dequeue one file before it starts, let one fail, let the rest succeed
//! 6. Print the resulting list and summary, save the confirmed records
//! 7. Log metrics and shut down the runtime

use anyhow::{Context, Result};
use camino::Utf8Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use uploadlist::engine::{TransferOutcome, TransferPlan, simulate_transfer};
use uploadlist::presentation;
use uploadlist::{
    APP_NAME, ConfigManager, ListChange, LocalEngine, UploadListManager, UserConfig, VERSION,
};

/// Files queued by the demo: name, MIME type, size in bytes
const DEMO_FILES: [(&str, &str, u64); 4] = [
    ("report.pdf", "application/pdf", 1_200_000),
    ("holiday.jpg", "image/jpeg", 3_400_000),
    ("clip.mp4", "video/mp4", 8_000_000),
    ("notes.txt", "text/plain", 12_000),
];

fn main() -> Result<()> {
    // Configuration comes first so `debug_mode` can pick the log level.
    let config_manager = ConfigManager::new("UploadList Data")?;
    let user_config = config_manager.load_user_config()?;

    let _log_guard = uploadlist::logging::setup_logging(
        Utf8Path::new("logs"),
        APP_NAME,
        user_config.upload_list.debug_mode,
        true,
    )?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(4)
        .thread_name("uploadlist-worker")
        .build()
        .context("Failed to build tokio runtime")?;

    let result = runtime.block_on(run_session(config_manager, user_config));

    runtime.shutdown_timeout(Duration::from_secs(5));
    tracing::info!("Application shutdown complete");
    result
}

async fn run_session(config_manager: ConfigManager, user_config: UserConfig) -> Result<()> {
    let records = config_manager.load_upload_records()?;

    let engine = Arc::new(LocalEngine::new());
    let manager =
        UploadListManager::with_existing(user_config.upload_list, engine.clone(), records);

    let mut rx = manager.subscribe();
    let listener = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(ListChange::ItemProgress { item, offset, total }) => {
                    let label = presentation::progress_label(offset, total, false);
                    tracing::debug!("{} progress {}", item, label);
                }
                Ok(ListChange::StructuralChange(totals)) => {
                    tracing::info!("{}", presentation::summary(&totals));
                }
                Ok(change) => tracing::debug!("List change: {:?}", change),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Event listener lagged, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let mut transfers = Vec::new();
    for (index, (filename, mime_type, size)) in DEMO_FILES.into_iter().enumerate() {
        let item = engine.queue_file(filename, Some(mime_type.to_string()), size);
        let handle = match manager.enqueue(item.clone()) {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!("Could not queue {}: {}", filename, e);
                continue;
            }
        };

        // The last file is dequeued before its transfer starts.
        if index == DEMO_FILES.len() - 1 {
            match manager.remove(handle.key()) {
                Ok(removal) => tracing::info!("Removed {} before upload: {:?}", filename, removal),
                Err(e) => tracing::warn!("Could not remove {}: {}", filename, e),
            }
        }

        let plan = TransferPlan {
            chunk_size: 512 * 1024,
            chunk_delay: Duration::from_millis(10),
            fail_with: (index == 1).then(|| "Server rejected the file".to_string()),
            ..TransferPlan::default()
        };
        transfers.push((filename, tokio::spawn(simulate_transfer(engine.clone(), item, plan))));
    }

    for (filename, transfer) in transfers {
        match transfer.await {
            Ok(Ok(TransferOutcome::Succeeded(id))) => {
                tracing::info!("{} uploaded as {}", filename, id)
            }
            Ok(Ok(TransferOutcome::Failed(reason))) => {
                tracing::warn!("{} failed: {}", filename, reason)
            }
            Ok(Err(e)) => tracing::info!("{} not transferred: {}", filename, e),
            Err(e) => tracing::error!("Transfer task for {} panicked: {}", filename, e),
        }
    }

    if manager.settings().allow_reorder {
        let keys: Vec<_> = manager.views().iter().map(|view| view.key).collect();
        if let (Some(first), Some(last)) = (keys.first(), keys.last()) {
            match manager.relocate(*first, *last) {
                Ok(Some(relocation)) => tracing::info!(
                    "Moved {} from {} to {}",
                    relocation.item,
                    relocation.from_index,
                    relocation.to_index
                ),
                Ok(None) => {}
                Err(e) => tracing::warn!("Relocation refused: {}", e),
            }
        }
    }

    for view in manager.views() {
        println!(
            "{:<14} {:<10} {:<28} {:?}{}",
            view.filename,
            format!("{:?}", view.status),
            view.progress_label,
            view.action,
            view.error.map(|e| format!(" ({e})")).unwrap_or_default()
        );
    }
    println!("{}", presentation::summary(&manager.refresh_aggregates()));

    config_manager.save_upload_records(&manager.items())?;

    manager.metrics().log_summary();
    manager.shutdown();
    listener.abort();
    Ok(())
}
