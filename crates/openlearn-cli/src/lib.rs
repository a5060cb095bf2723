use openlearn_core::models::{FileId, Principal, UserRole};
use openlearn_core::{AppError, ErrorMetadata, LogLevel};

/// Initialize tracing for CLI binaries. `LOG_FORMAT=json` switches to JSON lines.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json")) {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// The administrator principal operator commands run as.
pub fn operator(admin_id: i64, organization_id: i64) -> Principal {
    Principal::new(admin_id, organization_id, UserRole::Administrator)
}

/// Parse file ids given as separate arguments or comma-separated lists.
pub fn parse_file_ids(args: &[String]) -> anyhow::Result<Vec<FileId>> {
    args.iter()
        .flat_map(|arg| arg.split(','))
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<FileId>()
                .map_err(|e| anyhow::anyhow!("Invalid file id '{}': {}", part, e))
        })
        .collect()
}

/// Operator-facing description of a failed command. Service errors carry
/// their code and suggested action; anything else prints its full chain.
pub fn describe_error(err: &anyhow::Error) -> String {
    match err.downcast_ref::<AppError>() {
        Some(app) => {
            let mut message = format!("[{}] {}", app.error_code(), app.client_message());
            if let Some(action) = app.suggested_action() {
                message.push_str(&format!(" ({})", action));
            }
            message
        }
        None => format!("{:#}", err),
    }
}

/// Log a failed command at the level its error calls for, then print it.
pub fn report_error(err: &anyhow::Error) {
    let level = err
        .downcast_ref::<AppError>()
        .map_or(LogLevel::Error, ErrorMetadata::log_level);
    match level {
        LogLevel::Debug => tracing::debug!(error = %err, "Command failed"),
        LogLevel::Warn => tracing::warn!(error = %err, "Command failed"),
        LogLevel::Error => tracing::error!(error = %err, "Command failed"),
    }
    eprintln!("Error: {}", describe_error(err));
}
