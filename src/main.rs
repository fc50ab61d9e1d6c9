use std::time::Duration;

use anyhow::{Context, Result};

use splitlog::config::{self, Config};
use splitlog::lifecycle;
use splitlog::logging;

fn main() -> Result<()> {
    let first_run = !config::config_file_path().exists();
    let config = Config::load()?;
    config.ensure_directories()?;

    // Initialize logging BEFORE any tracing calls
    let (log_file_info, _guard) = logging::init_logging(&config.log_config()?)?;

    // Leave an editable copy of the defaults behind
    if first_run {
        match config.save() {
            Ok(()) => tracing::info!(
                path = %config::config_file_path().display(),
                "Wrote default config"
            ),
            Err(e) => tracing::error!("Failed to save default config: {:#}", e),
        }
    }

    tracing::info!(
        normal = %log_file_info.normal_path.display(),
        elevated = %log_file_info.elevated_path.display(),
        "Logging initialized"
    );

    // Running without a marker is not allowed
    let mut pid_file = lifecycle::start_lifecycle(&config.pid_file).with_context(|| {
        format!(
            "Another instance may be running ({})",
            config.pid_file.display()
        )
    })?;

    tracing::info!(pid = pid_file.pid(), "Server started");

    std::thread::sleep(Duration::from_secs(2));

    if let Err(e) = pid_file.remove() {
        tracing::warn!(kind = e.disk_error_kind().user_message(), "{}", e);
    }
    tracing::info!("Server stopped");
    Ok(())
}
