//! Rate limited client for the intent explorer API.
//!
//! The explorer allows roughly one request every five seconds per partner.
//! A single [`RequestPacer`] therefore gates every outbound request across
//! all callers in the process, with a slightly conservative default period.

use reqwest::{header::ACCEPT, Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};

pub const DEFAULT_URL: &str = "https://explorer.near-intents.org/api";

#[derive(Debug, Error)]
pub enum ExplorerError {
    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("explorer returned {status}")]
    Status { status: StatusCode, body: String },
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplorerAppFee {
    #[serde(default)]
    pub recipient: String,
    /// Basis points taken from the input amount.
    #[serde(default)]
    pub fee: u32,
}

/// One settled transaction as reported by the explorer.
///
/// The USD amounts arrive as JSON strings.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplorerTx {
    #[serde(default)]
    pub deposit_address: String,
    #[serde(default)]
    pub deposit_memo: String,
    #[serde(default)]
    pub recipient: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub amount_in_formatted: String,
    #[serde(default)]
    pub amount_out_formatted: String,
    #[serde(default)]
    pub amount_in_usd: String,
    #[serde(default)]
    pub amount_out_usd: String,
    #[serde(default)]
    pub origin_asset: String,
    #[serde(default)]
    pub destination_asset: String,
    #[serde(default)]
    pub senders: Vec<String>,
    #[serde(default)]
    pub near_tx_hashes: Vec<String>,
    #[serde(default)]
    pub origin_chain_tx_hashes: Vec<String>,
    #[serde(default)]
    pub destination_chain_tx_hashes: Vec<String>,
    #[serde(default)]
    pub app_fees: Vec<ExplorerAppFee>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub created_at_timestamp: i64,
}

/// USD fee collected on a transaction: the summed app fee basis points
/// applied to the USD input amount. Zero when either side is missing.
pub fn tx_fee_usd(tx: &ExplorerTx) -> f64 {
    let bps: u32 = tx.app_fees.iter().map(|fee| fee.fee).sum();
    if bps == 0 {
        return 0.0;
    }
    let amount_in_usd: f64 = match tx.amount_in_usd.trim().parse() {
        Ok(value) => value,
        Err(_) => return 0.0,
    };
    amount_in_usd * f64::from(bps) / 10_000.0
}

/// Capacity one token dispenser refilled on a fixed period. The first token
/// is available immediately; refills that find the channel full are dropped.
pub struct RequestPacer {
    tokens: Mutex<mpsc::Receiver<()>>,
}

impl RequestPacer {
    /// Must be called from within a tokio runtime; the refill task lives for
    /// the rest of the process.
    pub fn new(period: Duration) -> Self {
        let (sender, receiver) = mpsc::channel(1);
        sender
            .try_send(())
            .expect("fresh channel with capacity one accepts a token");
        tokio::task::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The immediate first tick duplicates the seeded token; skip it.
            interval.tick().await;
            loop {
                interval.tick().await;
                if sender.is_closed() {
                    break;
                }
                let _ = sender.try_send(());
            }
        });
        Self {
            tokens: Mutex::new(receiver),
        }
    }

    /// Waits for the next request slot.
    pub async fn acquire(&self) {
        let _ = self.tokens.lock().await.recv().await;
    }
}

#[mockall::automock]
#[async_trait::async_trait]
pub trait ExplorerApi: Send + Sync {
    /// Up to `count` settled transactions for an affiliate, in explorer
    /// order, starting after the given cursor pair. Empty cursor strings
    /// mean "from the beginning".
    async fn transactions(
        &self,
        affiliate: &str,
        last_deposit_address: &str,
        last_deposit_memo: &str,
        count: usize,
    ) -> Result<Vec<ExplorerTx>, ExplorerError>;
}

pub struct DefaultExplorerApi {
    client: Client,
    base: Url,
    bearer: Option<String>,
    pacer: RequestPacer,
}

impl DefaultExplorerApi {
    pub fn new(client: Client, base: Url, bearer: Option<String>, pacer: RequestPacer) -> Self {
        Self {
            client,
            base,
            bearer,
            pacer,
        }
    }
}

fn transactions_url(
    base: &Url,
    affiliate: &str,
    last_deposit_address: &str,
    last_deposit_memo: &str,
    count: usize,
) -> Url {
    let mut url = base.clone();
    url.path_segments_mut()
        .expect("explorer base url cannot be a base")
        .pop_if_empty()
        .extend(["v0", "transactions"]);
    url.query_pairs_mut()
        .append_pair("affiliate", affiliate)
        .append_pair("statuses", "SUCCESS")
        .append_pair("numberOfTransactions", &count.to_string())
        .append_pair("direction", "next");
    if !last_deposit_address.is_empty() {
        url.query_pairs_mut()
            .append_pair("lastDepositAddress", last_deposit_address);
        if !last_deposit_memo.is_empty() {
            url.query_pairs_mut()
                .append_pair("lastDepositMemo", last_deposit_memo);
        }
    }
    url
}

#[async_trait::async_trait]
impl ExplorerApi for DefaultExplorerApi {
    async fn transactions(
        &self,
        affiliate: &str,
        last_deposit_address: &str,
        last_deposit_memo: &str,
        count: usize,
    ) -> Result<Vec<ExplorerTx>, ExplorerError> {
        self.pacer.acquire().await;

        let url = transactions_url(
            &self.base,
            affiliate,
            last_deposit_address,
            last_deposit_memo,
            count,
        );
        let mut request = self.client.get(url).header(ACCEPT, "application/json");
        if let Some(bearer) = &self.bearer {
            request = request.bearer_auth(bearer);
        }
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            return Err(ExplorerError::Status {
                status,
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        // The endpoint answers with a bare array, not an object wrapper.
        Ok(serde_json::from_slice(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;
    use std::sync::Arc;

    fn tx_with_fees(fees: &[u32], amount_in_usd: &str) -> ExplorerTx {
        ExplorerTx {
            amount_in_usd: amount_in_usd.to_string(),
            app_fees: fees
                .iter()
                .map(|&fee| ExplorerAppFee {
                    recipient: "fee.near".to_string(),
                    fee,
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn computes_fee_from_basis_points() {
        assert_eq!(tx_fee_usd(&tx_with_fees(&[150], "1000")), 15.0);
        assert_eq!(tx_fee_usd(&tx_with_fees(&[200], "500")), 10.0);
        assert_eq!(tx_fee_usd(&tx_with_fees(&[100, 50], "1000")), 15.0);
        assert_eq!(tx_fee_usd(&tx_with_fees(&[150], " 1000 ")), 15.0);
    }

    #[test]
    fn fee_is_zero_without_bps_or_usd_amount() {
        assert_eq!(tx_fee_usd(&tx_with_fees(&[], "1000")), 0.0);
        assert_eq!(tx_fee_usd(&tx_with_fees(&[0], "1000")), 0.0);
        assert_eq!(tx_fee_usd(&tx_with_fees(&[150], "")), 0.0);
        assert_eq!(tx_fee_usd(&tx_with_fees(&[150], "n/a")), 0.0);
    }

    #[test]
    fn builds_query_without_cursor() {
        let url = transactions_url(
            &Url::parse(DEFAULT_URL).unwrap(),
            "partner.near",
            "",
            "",
            100,
        );
        assert_eq!(url.path(), "/api/v0/transactions");
        let query = url.query().unwrap();
        assert!(query.contains("affiliate=partner.near"));
        assert!(query.contains("statuses=SUCCESS"));
        assert!(query.contains("numberOfTransactions=100"));
        assert!(query.contains("direction=next"));
        assert!(!query.contains("lastDepositAddress"));
        assert!(!query.contains("lastDepositMemo"));
    }

    #[test]
    fn builds_query_with_cursor() {
        let base = Url::parse(DEFAULT_URL).unwrap();
        let url = transactions_url(&base, "partner.near", "addr-1", "memo-1", 50);
        let query = url.query().unwrap();
        assert!(query.contains("lastDepositAddress=addr-1"));
        assert!(query.contains("lastDepositMemo=memo-1"));

        // An empty memo is omitted even when the address is present.
        let url = transactions_url(&base, "partner.near", "addr-1", "", 50);
        assert!(!url.query().unwrap().contains("lastDepositMemo"));
    }

    #[test]
    fn parses_bare_transaction_array() {
        let body = br#"[{
            "depositAddress": "addr-1",
            "depositMemo": "",
            "status": "SUCCESS",
            "amountInUsd": "1198.27",
            "appFees": [{"recipient": "partner.near", "fee": 150}],
            "createdAtTimestamp": 1750000000
        }]"#;
        let txs: Vec<ExplorerTx> = serde_json::from_slice(body).unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].deposit_address, "addr-1");
        assert!((tx_fee_usd(&txs[0]) - 17.97405).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn first_token_is_immediate() {
        let pacer = RequestPacer::new(Duration::from_secs(6));
        let started = tokio::time::Instant::now();
        pacer.acquire().await;
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn paces_parallel_callers() {
        let pacer = Arc::new(RequestPacer::new(Duration::from_secs(6)));
        let started = tokio::time::Instant::now();
        let handles: Vec<_> = (0..5)
            .map(|_| {
                let pacer = pacer.clone();
                tokio::spawn(async move {
                    pacer.acquire().await;
                    started.elapsed()
                })
            })
            .collect();
        let mut elapsed: Vec<_> = join_all(handles)
            .await
            .into_iter()
            .map(|result| result.unwrap())
            .collect();
        elapsed.sort_unstable();

        assert!(elapsed[0] < Duration::from_secs(1));
        // The fifth caller waits for four refill periods.
        assert!(elapsed[4] >= Duration::from_secs(24));
        assert!(elapsed[4] < Duration::from_secs(25));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_periods_do_not_accumulate_tokens() {
        let pacer = RequestPacer::new(Duration::from_secs(6));
        // A long idle stretch must leave at most one stored token behind.
        tokio::time::sleep(Duration::from_secs(63)).await;
        let started = tokio::time::Instant::now();
        pacer.acquire().await;
        assert!(started.elapsed() < Duration::from_secs(1));
        pacer.acquire().await;
        pacer.acquire().await;
        assert!(started.elapsed() >= Duration::from_secs(6));
    }
}
