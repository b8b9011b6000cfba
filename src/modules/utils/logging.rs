use env_logger::{Builder, Target, WriteStyle};
use log::{error, info, warn, LevelFilter};
use std::fs::OpenOptions;
use std::path::Path;

/// Initialize the logging system.
///
/// Writes to `log_file` in append mode when one is given, otherwise to stderr.
/// `RUST_LOG` still takes precedence over `level`.
pub fn initialize_logging(
    level: LevelFilter,
    log_file: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut builder = Builder::new();
    builder
        .filter_level(level)
        .format_timestamp_secs()
        .format_module_path(true)
        .write_style(WriteStyle::Auto)
        .parse_env("RUST_LOG");

    if let Some(path) = log_file {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        builder.target(Target::Pipe(Box::new(file)));
    } else {
        builder.target(Target::Stderr);
    }

    builder.try_init()?;
    info!("Logging system initialized at level {}", level);
    Ok(())
}

/// Helper function to format sensitive data for logging
pub(crate) fn format_sensitive(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..2].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{}***{}", head, tail)
}

/// Structured logging for login and logout events
pub fn log_auth_event(event_type: &str, email: &str, success: bool, details: Option<&str>) {
    let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    if success {
        info!(
            "Auth event: type={}, user={}, success=true, timestamp={}, details={:?}",
            event_type,
            format_sensitive(email),
            timestamp,
            details
        );
    } else {
        warn!(
            "Auth event: type={}, user={}, success=false, timestamp={}, details={:?}",
            event_type,
            format_sensitive(email),
            timestamp,
            details
        );
    }
}

/// Structured logging for directory and session writes
pub fn log_data_operation(
    operation: &str,
    email: &str,
    resource: &str,
    success: bool,
    details: Option<&str>,
) {
    let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    if success {
        info!(
            "Data operation: op={}, user={}, resource={}, success=true, timestamp={}, details={:?}",
            operation,
            format_sensitive(email),
            resource,
            timestamp,
            details
        );
    } else {
        error!(
            "Data operation: op={}, user={}, resource={}, success=false, timestamp={}, details={:?}",
            operation,
            format_sensitive(email),
            resource,
            timestamp,
            details
        );
    }
}
