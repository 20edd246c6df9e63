use chrono::{DateTime, Utc};

/// A fact the ledger has committed to its journal.
///
/// Journal entries are never edited. A later correction or deletion is its
/// own event, so replaying the journal in sequence order reproduces the
/// farm's records.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Dotted name consumers route on, `ledger.<record>.<verb>`.
    fn event_type(&self) -> &'static str;

    /// Payload schema version; bumped when a variant's fields change.
    fn version(&self) -> u32 {
        1
    }

    /// Business time of the change, not the time it was journaled.
    fn occurred_at(&self) -> DateTime<Utc>;
}
