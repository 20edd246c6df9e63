//! Ledger configuration.
//!
//! Loaded from JSON or from `GRAINLEDGER_*` environment variables; anything
//! unset falls back to [`LedgerConfig::default`].

use anyhow::Context;
use serde::{Deserialize, Serialize};

use grainledger_observability::ObservabilityConfig;

/// What deleting an event does with a lot that other events' movements still reference.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LotDeletionPolicy {
    /// Refuse with `LotInUse`; nothing is deleted.
    #[default]
    Reject,
    /// Remove the referencing movements in the same transaction.
    Cascade,
}

impl core::str::FromStr for LotDeletionPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(Self::Reject),
            "cascade" => Ok(Self::Cascade),
            other => anyhow::bail!("unknown lot deletion policy '{other}' (expected reject|cascade)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub lot_deletion: LotDeletionPolicy,
    /// Re-submitting an outbound for an event that already has outbound
    /// movements returns them instead of allocating again.
    pub replay_outbound: bool,
    pub observability: ObservabilityConfig,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            lot_deletion: LotDeletionPolicy::Reject,
            replay_outbound: true,
            observability: ObservabilityConfig::default(),
        }
    }
}

impl LedgerConfig {
    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        serde_json::from_str(raw).context("invalid ledger configuration")
    }

    /// Read `GRAINLEDGER_LOT_DELETION`, `GRAINLEDGER_REPLAY_OUTBOUND`,
    /// `GRAINLEDGER_LOG` and `GRAINLEDGER_LOG_JSON`.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Install the process-wide tracing subscriber described by `observability`.
    pub fn init_observability(&self) {
        grainledger_observability::init(&self.observability);
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Some(raw) = lookup("GRAINLEDGER_LOT_DELETION") {
            config.lot_deletion = raw.parse().context("GRAINLEDGER_LOT_DELETION")?;
        }
        if let Some(raw) = lookup("GRAINLEDGER_REPLAY_OUTBOUND") {
            config.replay_outbound = parse_bool(&raw).context("GRAINLEDGER_REPLAY_OUTBOUND")?;
        }
        if let Some(filter) = lookup("GRAINLEDGER_LOG") {
            config.observability.filter = filter;
        }
        if let Some(raw) = lookup("GRAINLEDGER_LOG_JSON") {
            config.observability.json = parse_bool(&raw).context("GRAINLEDGER_LOG_JSON")?;
        }

        Ok(config)
    }
}

fn parse_bool(raw: &str) -> anyhow::Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("expected a boolean, got '{other}'"),
    }
}
