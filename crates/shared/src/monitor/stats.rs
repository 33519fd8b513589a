//! Live per-affiliate revenue counters.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashMap},
    path::Path,
    sync::RwLock,
};

/// A mutually consistent reading of one affiliate's counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsTriple {
    pub fee_usd: f64,
    pub volume_usd: f64,
    pub swaps: u64,
}

/// Counters grow monotonically for the process lifetime. The whole triple is
/// updated under one write lock so snapshots can never observe a torn state.
#[derive(Debug, Default)]
pub struct LiveStats {
    inner: RwLock<StatsTriple>,
}

impl LiveStats {
    fn seeded(triple: StatsTriple) -> Self {
        Self {
            inner: RwLock::new(triple),
        }
    }

    fn add(&self, fee_usd: f64, volume_usd: f64) {
        let mut stats = self.inner.write().unwrap();
        stats.fee_usd += fee_usd;
        stats.volume_usd += volume_usd;
        stats.swaps += 1;
    }

    fn snapshot(&self) -> StatsTriple {
        *self.inner.read().unwrap()
    }
}

/// Fixed set of tracked affiliates, established at startup.
pub struct StatsRegistry {
    stats: BTreeMap<String, LiveStats>,
}

impl StatsRegistry {
    pub fn new(affiliates: impl IntoIterator<Item = String>) -> Self {
        Self {
            stats: affiliates
                .into_iter()
                .map(|affiliate| (affiliate, LiveStats::default()))
                .collect(),
        }
    }

    /// Seeds counters from lifetime baseline totals so the live numbers
    /// reflect history rather than uptime only. Unknown affiliates in the
    /// baseline are ignored.
    pub fn with_baseline(mut self, baseline: &HashMap<String, StatsTriple>) -> Self {
        for (affiliate, stats) in &mut self.stats {
            if let Some(triple) = baseline.get(affiliate) {
                *stats = LiveStats::seeded(*triple);
            }
        }
        self
    }

    pub fn add(&self, affiliate: &str, fee_usd: f64, volume_usd: f64) {
        match self.stats.get(affiliate) {
            Some(stats) => stats.add(fee_usd, volume_usd),
            None => tracing::debug!(affiliate, "dropping stats for untracked affiliate"),
        }
    }

    pub fn snapshot(&self, affiliate: &str) -> Option<StatsTriple> {
        self.stats.get(affiliate).map(LiveStats::snapshot)
    }

    /// Every affiliate's triple, in stable affiliate order.
    pub fn all(&self) -> Vec<(String, StatsTriple)> {
        self.stats
            .iter()
            .map(|(affiliate, stats)| (affiliate.clone(), stats.snapshot()))
            .collect()
    }

    pub fn total_fee_usd(&self) -> f64 {
        self.stats.values().map(|stats| stats.snapshot().fee_usd).sum()
    }
}

#[derive(Debug, Deserialize)]
struct BaselineEntry {
    #[serde(default)]
    total_swaps: u64,
    #[serde(default)]
    total_volume_usd: f64,
    #[serde(default)]
    total_revenue_usd: f64,
}

/// Reads a lifetime baseline document keyed by affiliate:
/// `{"partner.near": {"total_swaps": 1, "total_volume_usd": 2, "total_revenue_usd": 3}}`.
pub fn load_baseline(path: &Path) -> Result<HashMap<String, StatsTriple>> {
    let data = std::fs::read(path)
        .with_context(|| format!("read baseline file {}", path.display()))?;
    let entries: HashMap<String, BaselineEntry> =
        serde_json::from_slice(&data).context("parse baseline file")?;
    Ok(entries
        .into_iter()
        .map(|(affiliate, entry)| {
            (
                affiliate,
                StatsTriple {
                    fee_usd: entry.total_revenue_usd,
                    volume_usd: entry.total_volume_usd,
                    swaps: entry.total_swaps,
                },
            )
        })
        .collect())
}
