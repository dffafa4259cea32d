// Observability infrastructure for VertexDB.
// Structured logging init plus a handful of global counters used by tests
// and callers that want a cheap process-wide view without reading
// Statistics from a specific GraphStorage instance.

use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static OPERATION_COUNTER: AtomicU64 = AtomicU64::new(0);
static ERROR_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Initializes logging and tracing. Call once at process startup.
pub fn init_logging() -> Result<()> {
    init_logging_with_level(false, false)
}

/// Initializes logging with configurable verbosity.
pub fn init_logging_with_level(verbose: bool, quiet: bool) -> Result<()> {
    let filter_level = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("vertexdb=debug,info")
    } else {
        // Warnings and errors for vertexdb, only errors for dependencies —
        // important failures stay visible without debug/info spam.
        EnvFilter::new("vertexdb=warn,error")
    };

    let env_filter = if quiet {
        EnvFilter::new("error")
    } else if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::try_from_default_env().unwrap_or(filter_level)
    } else {
        filter_level
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(!quiet)
        .with_thread_ids(!quiet)
        .with_line_number(!quiet)
        .with_file(!quiet)
        .with_ansi(true);

    match tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
    {
        Ok(()) => {
            if !quiet {
                info!("vertexdb observability initialized");
            }
            Ok(())
        }
        // Already initialized — fine in test binaries that call this more
        // than once across the same process.
        Err(_) => Ok(()),
    }
}

/// Records one completed operation for the process-wide counters.
pub fn record_operation() {
    OPERATION_COUNTER.fetch_add(1, Ordering::Relaxed);
}

/// Records one failed operation for the process-wide counters.
pub fn record_error() {
    ERROR_COUNTER.fetch_add(1, Ordering::Relaxed);
}

pub fn operation_count() -> u64 {
    OPERATION_COUNTER.load(Ordering::Relaxed)
}

pub fn error_count() -> u64 {
    ERROR_COUNTER.load(Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let before = operation_count();
        record_operation();
        assert_eq!(operation_count(), before + 1);
    }

    #[test]
    fn init_logging_is_idempotent() {
        init_logging().unwrap();
        init_logging().unwrap();
    }
}
