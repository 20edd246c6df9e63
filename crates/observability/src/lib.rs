//! Tracing and logging setup shared by ledger hosts.

/// Tracing configuration (filters, layers).
pub mod tracing;

pub use self::tracing::ObservabilityConfig;

/// Initialize process-wide observability (tracing/logging).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init(config: &ObservabilityConfig) {
    self::tracing::init(config);
}
