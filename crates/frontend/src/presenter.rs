//! Log backed stand-in for the downstream messaging surface. The actual
//! card rendering and thread management live outside this service; routing
//! keys are carried through untouched.

use shared::{
    explorer_api::ExplorerTx,
    monitor::{stats::StatsTriple, Presenter, Reseller},
};

pub struct LogPresenter {
    pub group_id: i64,
}

#[async_trait::async_trait]
impl Presenter for LogPresenter {
    async fn transaction_card(
        &self,
        reseller: &Reseller,
        tx: &ExplorerTx,
        fee_usd: f64,
        totals: StatsTriple,
    ) {
        tracing::info!(
            group = self.group_id,
            thread = ?reseller.thread_id,
            reseller = %reseller.name,
            deposit = %tx.deposit_address,
            amount_in_usd = %tx.amount_in_usd,
            fee_usd,
            total_fee_usd = totals.fee_usd,
            "observed competitor swap"
        );
    }

    async fn aggregate_update(&self, reseller: &Reseller, totals: StatsTriple) {
        tracing::info!(
            group = self.group_id,
            reseller = %reseller.name,
            fee_usd = totals.fee_usd,
            volume_usd = totals.volume_usd,
            swaps = totals.swaps,
            "reseller running totals"
        );
    }
}
