//! `whis serve` - run the HTTP API.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::{info, warn};
use whis::backup::BackupService;
use whis::http::{self, AppState};

use super::{init_tracing, load_config};

/// Starts the server with CLI overrides applied on top of the config file.
pub async fn execute(
    config_path: Option<PathBuf>,
    host: Option<String>,
    port: Option<u16>,
    data_dir: Option<PathBuf>,
) -> Result<()> {
    let mut config = load_config(config_path.as_deref(), data_dir)?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    init_tracing(&config.logging);

    let paths = config.storage.resolve()?;
    info!(
        data_dir = %paths.data_dir.display(),
        database = %paths.database.display(),
        "Opening storage"
    );
    let service = BackupService::open(&paths).context("Failed to open storage")?;

    let mut state = AppState::new(service, &config.server)?;
    match whis::metrics::install_recorder() {
        Ok(handle) => state = state.with_metrics(handle),
        Err(e) => warn!(error = %e, "Metrics recorder unavailable; /metrics disabled"),
    }

    http::serve(state, &config.server.host, config.server.port).await
}
