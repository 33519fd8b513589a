//! Wire types for the upstream intent API quote and status endpoints.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SwapType {
    ExactInput,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DepositType {
    OriginChain,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecipientType {
    DestinationChain,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppFee {
    pub recipient: String,
    /// Basis points taken from the input amount.
    pub fee: u32,
}

/// Payload for `POST /v0/quote`.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    pub dry: bool,
    pub swap_type: SwapType,
    /// Basis points in [1, 5000].
    pub slippage_tolerance: u32,
    pub origin_asset: String,
    pub deposit_type: DepositType,
    pub destination_asset: String,
    /// Base-10 integer string in atomic units.
    pub amount: String,
    pub refund_to: String,
    pub refund_type: DepositType,
    pub recipient: String,
    pub recipient_type: RecipientType,
    /// RFC 3339 UTC. The upstream may replace it on a binding quote.
    pub deadline: String,
    pub referral: String,
    pub quote_waiting_time_ms: u32,
    /// The upstream requires this key to be present even when empty; it must
    /// never be skipped or serialized as null.
    pub app_fees: Vec<AppFee>,
}

/// Quote details of a dry (non-binding) response, nested under `quote`.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DryQuote {
    #[serde(default)]
    pub amount_in: String,
    #[serde(default)]
    pub amount_in_formatted: String,
    #[serde(default)]
    pub amount_in_usd: String,
    #[serde(default)]
    pub amount_out: String,
    #[serde(default)]
    pub amount_out_formatted: String,
    #[serde(default)]
    pub amount_out_usd: String,
    #[serde(default)]
    pub min_amount_out: String,
    /// Upstream execution estimate in seconds.
    #[serde(default)]
    pub time_estimate: i64,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DryQuoteResponse {
    #[serde(default)]
    pub quote: DryQuote,
    #[serde(default)]
    pub correlation_id: String,
}

/// Quote details of a binding response. Unlike a dry quote this reserves a
/// deposit address until the deadline.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingQuote {
    #[serde(default)]
    pub deposit_address: String,
    #[serde(default)]
    pub deposit_memo: Option<String>,
    #[serde(default)]
    pub amount_in: String,
    #[serde(default)]
    pub amount_in_formatted: String,
    #[serde(default)]
    pub amount_out: String,
    #[serde(default)]
    pub amount_out_formatted: String,
    /// Canonical deadline chosen by the upstream. Takes precedence over the
    /// deadline proposed in the request.
    #[serde(default)]
    pub deadline: String,
    #[serde(default)]
    pub time_estimate: i64,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponse {
    #[serde(default)]
    pub correlation_id: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub quote: BindingQuote,
}

/// Execution state reported by `GET /v0/status`.
///
/// Anything the upstream adds in the future parses as [`OrderStatus::Unknown`]
/// instead of failing the whole response.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    PendingDeposit,
    KnownDepositTx,
    Processing,
    Success,
    Refunded,
    Failed,
    IncompleteDeposit,
    #[default]
    #[serde(other)]
    Unknown,
}

impl OrderStatus {
    /// A terminal status cannot transition any further.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Success | Self::Refunded | Self::Failed | Self::IncompleteDeposit
        )
    }

    /// Progress step for display: 0 awaiting deposit, 1 executing, 2 done.
    pub fn step(self) -> u8 {
        match self {
            Self::PendingDeposit | Self::KnownDepositTx | Self::Unknown => 0,
            Self::Processing => 1,
            Self::Success | Self::Refunded | Self::Failed | Self::IncompleteDeposit => 2,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDetail {
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub explorer_url: String,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapDetails {
    #[serde(default)]
    pub amount_in: String,
    #[serde(default)]
    pub amount_in_formatted: String,
    #[serde(default)]
    pub amount_out: String,
    #[serde(default)]
    pub amount_out_formatted: String,
    #[serde(default)]
    pub origin_chain_tx_hashes: Vec<TransactionDetail>,
    #[serde(default)]
    pub destination_chain_tx_hashes: Vec<TransactionDetail>,
    #[serde(default)]
    pub refunded_amount: String,
    #[serde(default)]
    pub refund_reason: String,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    #[serde(default)]
    pub correlation_id: String,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swap_details: Option<SwapDetails>,
}
