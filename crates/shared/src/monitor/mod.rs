//! Competitive intelligence monitor.
//!
//! One long-running poller per tracked affiliate walks the explorer's
//! transaction stream, folds every settled swap into the live statistics and
//! the event ring, and advances a persisted cursor so restarts do not
//! reprocess history.

pub mod cursor;
pub mod ring;
pub mod stats;

use crate::explorer_api::{tx_fee_usd, ExplorerApi, ExplorerError, ExplorerTx};
use self::cursor::{Cursor, CursorStore};
use self::ring::{EventRing, LogEntry};
use self::stats::{StatsRegistry, StatsTriple};
use std::{sync::Arc, time::Duration};

pub const PAGE_SIZE: usize = 100;
const FETCH_RETRY_DELAY: Duration = Duration::from_secs(30);
const IDLE_DELAY: Duration = Duration::from_secs(15);
/// Pause between presentation cards; the downstream messaging surface has
/// its own rate limit.
const CARD_DELAY: Duration = Duration::from_millis(200);
const AGGREGATE_UPDATE_EVERY: usize = 10;

#[derive(prometheus_metric_storage::MetricStorage, Clone, Debug)]
#[metric(subsystem = "monitor")]
struct Metrics {
    /// Number of competitor transactions folded into the statistics.
    #[metric(labels("reseller"))]
    transactions_folded: prometheus::IntCounterVec,
}

fn metrics() -> &'static Metrics {
    Metrics::instance(crate::metrics::get_metric_storage_registry())
        .expect("unexpected error getting metrics instance")
}

/// One tracked reseller routing swaps through the upstream.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Reseller {
    pub name: String,
    pub affiliate: String,
    /// Opaque presentation routing key. `None` disables per-transaction
    /// cards for this reseller.
    pub thread_id: Option<i64>,
}

/// Downstream presentation surface for monitor events. The actual rendering
/// (message cards, thread titles) lives outside this crate.
#[mockall::automock]
#[async_trait::async_trait]
pub trait Presenter: Send + Sync {
    async fn transaction_card(
        &self,
        reseller: &Reseller,
        tx: &ExplorerTx,
        fee_usd: f64,
        totals: StatsTriple,
    );

    async fn aggregate_update(&self, reseller: &Reseller, totals: StatsTriple);
}

/// Read access to the monitor's shared state for the API surface.
pub struct MonitorHandle {
    pub resellers: Vec<Reseller>,
    pub stats: Arc<StatsRegistry>,
    pub ring: Arc<EventRing>,
}

pub struct Poller {
    reseller: Reseller,
    explorer: Arc<dyn ExplorerApi>,
    stats: Arc<StatsRegistry>,
    ring: Arc<EventRing>,
    cursors: Arc<CursorStore>,
    presenter: Option<Arc<dyn Presenter>>,
    cursor: Option<Cursor>,
    batch: usize,
}

impl Poller {
    /// Picks up the persisted cursor for this affiliate, if any.
    pub fn new(
        reseller: Reseller,
        explorer: Arc<dyn ExplorerApi>,
        stats: Arc<StatsRegistry>,
        ring: Arc<EventRing>,
        cursors: Arc<CursorStore>,
        presenter: Option<Arc<dyn Presenter>>,
    ) -> Self {
        let cursor = cursors.load_all().remove(&reseller.affiliate);
        Self {
            reseller,
            explorer,
            stats,
            ring,
            cursors,
            presenter,
            cursor,
            batch: 0,
        }
    }

    /// One fetch-and-fold iteration. Transactions are applied to the stats,
    /// the ring and the cursor in explorer order; the cursor is persisted
    /// only after the whole page folded.
    pub async fn poll_once(&mut self) -> Result<usize, ExplorerError> {
        let (last_address, last_memo) = match &self.cursor {
            Some(cursor) => (
                cursor.last_deposit_address.as_str(),
                cursor.last_deposit_memo.as_str(),
            ),
            None => ("", ""),
        };
        let txs = self
            .explorer
            .transactions(&self.reseller.affiliate, last_address, last_memo, PAGE_SIZE)
            .await?;

        let processed = txs.len();
        for tx in txs {
            self.fold(tx).await;
        }

        if processed > 0 {
            if let Some(cursor) = &self.cursor {
                if let Err(err) = self.cursors.save(&self.reseller.affiliate, cursor) {
                    tracing::warn!(?err, reseller = %self.reseller.name, "failed to persist cursor");
                }
            }
            if self.batch >= AGGREGATE_UPDATE_EVERY {
                if let (Some(presenter), Some(_)) = (&self.presenter, self.reseller.thread_id) {
                    if let Some(totals) = self.stats.snapshot(&self.reseller.affiliate) {
                        presenter.aggregate_update(&self.reseller, totals).await;
                    }
                }
                self.batch = 0;
            }
        }
        Ok(processed)
    }

    async fn fold(&mut self, tx: ExplorerTx) {
        let fee_usd = tx_fee_usd(&tx);
        let volume_usd: f64 = tx.amount_in_usd.trim().parse().unwrap_or_default();

        self.ring.add(LogEntry {
            reseller: self.reseller.name.clone(),
            affiliate: self.reseller.affiliate.clone(),
            tx: tx.clone(),
            fee_usd,
            posted_at: chrono::Utc::now(),
        });
        self.stats
            .add(&self.reseller.affiliate, fee_usd, volume_usd);
        metrics()
            .transactions_folded
            .with_label_values(&[&self.reseller.name])
            .inc();

        if let (Some(presenter), Some(_)) = (&self.presenter, self.reseller.thread_id) {
            if let Some(totals) = self.stats.snapshot(&self.reseller.affiliate) {
                presenter
                    .transaction_card(&self.reseller, &tx, fee_usd, totals)
                    .await;
            }
            tokio::time::sleep(CARD_DELAY).await;
        }

        self.cursor = Some(Cursor {
            last_deposit_address: tx.deposit_address,
            last_deposit_memo: tx.deposit_memo,
        });
        self.batch += 1;
    }

    /// Runs until the process exits. `stagger` offsets the first fetch so
    /// parallel pollers share the global explorer request budget without
    /// thundering.
    pub async fn run(mut self, stagger: Duration) {
        tokio::time::sleep(stagger).await;
        tracing::info!(reseller = %self.reseller.name, "monitor poller started");
        loop {
            match self.poll_once().await {
                Ok(_) => tokio::time::sleep(IDLE_DELAY).await,
                Err(err) => {
                    tracing::warn!(?err, reseller = %self.reseller.name, "explorer fetch failed");
                    tokio::time::sleep(FETCH_RETRY_DELAY).await;
                }
            }
        }
    }
}

/// Spawns one poller per reseller, staggered by the explorer request period.
pub fn spawn_pollers(
    resellers: &[Reseller],
    explorer: Arc<dyn ExplorerApi>,
    stats: Arc<StatsRegistry>,
    ring: Arc<EventRing>,
    cursors: Arc<CursorStore>,
    presenter: Option<Arc<dyn Presenter>>,
    request_period: Duration,
) {
    for (index, reseller) in resellers.iter().cloned().enumerate() {
        let poller = Poller::new(
            reseller,
            explorer.clone(),
            stats.clone(),
            ring.clone(),
            cursors.clone(),
            presenter.clone(),
        );
        tokio::task::spawn(poller.run(request_period * index as u32));
    }
}
