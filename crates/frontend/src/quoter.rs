//! Swap orchestration: validate user input, obtain dry and binding quotes
//! from the upstream, seal order tokens and answer status queries.

use chrono::{DateTime, SecondsFormat, Utc};
use model::{
    order::{InvalidToken, Order, OrderCodec},
    quote::{DepositType, OrderStatus, QuoteRequest, RecipientType, StatusResponse, SwapType},
    token::TokenInfo,
};
use serde::{Deserialize, Serialize};
use shared::{
    conversions::{atomic_to_human, human_to_atomic, slippage_to_bps},
    oneclick_api::OneClickApi,
    rate_limiter::RequestLimiter,
    token_list::TokenCache,
};
use std::{sync::Arc, time::Duration};
use thiserror::Error;

/// Referral identifier attached to every upstream quote request.
pub const REFERRAL: &str = "zeroswap";

/// Upstream soft timeout budgets: previews may wait longer for a better
/// price, binding quotes should come back quickly.
const DRY_QUOTE_WAIT_MS: u32 = 8000;
const BINDING_QUOTE_WAIT_MS: u32 = 3000;

const LIMIT_WINDOW: Duration = Duration::from_secs(60);
const PREVIEW_LIMIT: usize = 30;
const ORDER_LIMIT: usize = 10;

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapInput {
    #[serde(default)]
    pub from_ticker: String,
    #[serde(default)]
    pub from_network: String,
    #[serde(default)]
    pub to_ticker: String,
    #[serde(default)]
    pub to_network: String,
    #[serde(default)]
    pub amount: String,
    #[serde(default)]
    pub recipient: String,
    #[serde(default)]
    pub refund_address: String,
    #[serde(default)]
    pub slippage: String,
}

#[derive(Debug, Error)]
pub enum QuoteError {
    #[error("{0}")]
    Validation(String),

    #[error("unknown token {ticker} on {network}")]
    TokenNotFound { ticker: String, network: String },

    #[error(transparent)]
    InvalidToken(#[from] InvalidToken),

    #[error("rate limited")]
    RateLimited,

    #[error("temporarily unavailable")]
    Unavailable,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotePreview {
    pub from_token: TokenInfo,
    pub to_token: TokenInfo,
    pub amount_in: String,
    pub atomic_amount: String,
    pub amount_out: String,
    pub min_amount_out: String,
    pub amount_in_usd: Option<f64>,
    pub amount_out_usd: Option<f64>,
    pub spread_usd: Option<f64>,
    pub spread_percent: Option<f64>,
    /// Units of the destination token per unit of the source token.
    pub rate: Option<f64>,
    pub slippage_bps: u32,
    pub time_estimate: i64,
    pub correlation_id: String,
    /// True when a privileged upstream credential is configured, meaning the
    /// zero protocol fee tier applies.
    pub zero_protocol_fee: bool,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedOrder {
    pub token: String,
    pub order: Order,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    pub order: Order,
    pub status: StatusResponse,
    pub is_terminal: bool,
    /// 0 awaiting deposit, 1 executing, 2 done.
    pub step: u8,
    pub time_remaining: Option<String>,
    /// Verbatim upstream status body; served on the raw endpoint only.
    #[serde(skip)]
    pub raw: Vec<u8>,
}

pub struct Quoter {
    tokens: Arc<TokenCache>,
    oneclick: Arc<dyn OneClickApi>,
    codec: OrderCodec,
    limiter: Arc<RequestLimiter>,
}

impl Quoter {
    pub fn new(
        tokens: Arc<TokenCache>,
        oneclick: Arc<dyn OneClickApi>,
        codec: OrderCodec,
        limiter: Arc<RequestLimiter>,
    ) -> Self {
        Self {
            tokens,
            oneclick,
            codec,
            limiter,
        }
    }

    /// Dry quote: validates, resolves tokens and asks the upstream for a
    /// non-binding price. Nothing persists.
    pub async fn preview_quote(
        &self,
        client: &str,
        input: &SwapInput,
    ) -> Result<QuotePreview, QuoteError> {
        if !self.limiter.allow(client, PREVIEW_LIMIT, LIMIT_WINDOW) {
            return Err(QuoteError::RateLimited);
        }
        validate(input)?;
        let (from, to) = self.resolve_tokens(input)?;
        let atomic_amount = human_to_atomic(&input.amount, from.decimals)
            .map_err(|err| QuoteError::Validation(format!("invalid amount: {err}")))?;
        let slippage_bps = slippage_to_bps(&input.slippage).unwrap_or(100);

        let request = build_request(
            input,
            &from,
            &to,
            atomic_amount.clone(),
            slippage_bps,
            DRY_QUOTE_WAIT_MS,
        );
        let response = self.oneclick.dry_quote(&request).await.map_err(|err| {
            tracing::warn!(?err, "dry quote failed");
            QuoteError::Unavailable
        })?;

        let quote = response.quote;
        if quote.amount_out.is_empty() || quote.amount_out == "0" {
            // No market maker is offering a rate for this pair and amount.
            return Err(QuoteError::Unavailable);
        }
        let amount_out = atomic_to_human(&quote.amount_out, to.decimals);
        let min_amount_out = atomic_to_human(&quote.min_amount_out, to.decimals);

        let parsed_in: f64 = input.amount.trim().parse().unwrap_or_default();
        let parsed_out: f64 = amount_out.parse().unwrap_or_default();
        let amount_in_usd = (from.price > 0.0).then_some(parsed_in * from.price);
        let amount_out_usd = amount_in_usd
            .is_some()
            .then_some(parsed_out * to.price)
            .filter(|_| to.price > 0.0);
        let spread_usd = amount_in_usd
            .zip(amount_out_usd)
            .map(|(amount_in, amount_out)| (amount_in - amount_out).max(0.0));
        let spread_percent = amount_in_usd
            .zip(spread_usd)
            .filter(|(amount_in, _)| *amount_in > 0.0)
            .map(|(amount_in, spread)| spread / amount_in * 100.0);
        let rate = (parsed_in > 0.0 && parsed_out > 0.0).then_some(parsed_out / parsed_in);

        Ok(QuotePreview {
            amount_in: input.amount.trim().to_string(),
            atomic_amount,
            amount_out,
            min_amount_out,
            amount_in_usd,
            amount_out_usd,
            spread_usd,
            spread_percent,
            rate,
            slippage_bps,
            time_estimate: quote.time_estimate,
            correlation_id: response.correlation_id,
            zero_protocol_fee: self.oneclick.has_credential(),
            from_token: from,
            to_token: to,
        })
    }

    /// Binding quote: reserves a deposit address upstream and seals the
    /// resulting order into a self-contained token. The upstream's canonical
    /// deadline wins over the proposed one.
    pub async fn place_order(
        &self,
        client: &str,
        input: &SwapInput,
    ) -> Result<PlacedOrder, QuoteError> {
        if !self.limiter.allow(client, ORDER_LIMIT, LIMIT_WINDOW) {
            return Err(QuoteError::RateLimited);
        }
        validate(input)?;
        let (from, to) = self.resolve_tokens(input)?;
        let atomic_amount = human_to_atomic(&input.amount, from.decimals)
            .map_err(|err| QuoteError::Validation(format!("invalid amount: {err}")))?;
        let slippage_bps = slippage_to_bps(&input.slippage).unwrap_or(100);

        let request = build_request(
            input,
            &from,
            &to,
            atomic_amount,
            slippage_bps,
            BINDING_QUOTE_WAIT_MS,
        );
        let proposed_deadline = request.deadline.clone();
        let response = self.oneclick.quote(&request).await.map_err(|err| {
            tracing::warn!(?err, "binding quote failed");
            QuoteError::Unavailable
        })?;
        if response.quote.deposit_address.is_empty() {
            tracing::warn!("binding quote came back without a deposit address");
            return Err(QuoteError::Unavailable);
        }

        let deadline = if response.quote.deadline.is_empty() {
            proposed_deadline
        } else {
            if response.quote.deadline != proposed_deadline {
                tracing::debug!(
                    proposed = %proposed_deadline,
                    upstream = %response.quote.deadline,
                    "upstream replaced the proposed deadline"
                );
            }
            response.quote.deadline.clone()
        };

        let order = Order {
            deposit_address: response.quote.deposit_address.clone(),
            deposit_memo: response.quote.deposit_memo.clone().unwrap_or_default(),
            from_ticker: from.ticker.clone(),
            from_network: input.from_network.trim().to_string(),
            to_ticker: to.ticker.clone(),
            to_network: input.to_network.trim().to_string(),
            amount_in: input.amount.trim().to_string(),
            amount_out: atomic_to_human(&response.quote.amount_out, to.decimals),
            deadline,
            correlation_id: response.correlation_id.clone(),
            refund_address: Some(input.refund_address.trim().to_string()),
            receive_address: Some(input.recipient.trim().to_string()),
        };
        let token = self
            .codec
            .encode(&order)
            .map_err(|err| QuoteError::Internal(anyhow::Error::new(err)))?;
        Ok(PlacedOrder { token, order })
    }

    /// Decodes an order token and fetches the live execution status. When
    /// the upstream is unreachable the decoded order is still returned with
    /// a synthetic unknown status instead of failing the call.
    pub async fn query_order(&self, token: &str) -> Result<OrderView, QuoteError> {
        let order = self.codec.decode(token)?;
        let (status, raw) = match self.oneclick.status(&order.deposit_address).await {
            Ok(status) => (status.parsed, status.raw),
            Err(err) => {
                tracing::warn!(?err, "status lookup failed, serving unknown status");
                let status = StatusResponse {
                    status: OrderStatus::Unknown,
                    ..Default::default()
                };
                (status, Vec::new())
            }
        };
        Ok(OrderView {
            is_terminal: status.status.is_terminal(),
            step: status.status.step(),
            time_remaining: time_remaining(&order.deadline, Utc::now()),
            order,
            status,
            raw,
        })
    }

    fn resolve_tokens(&self, input: &SwapInput) -> Result<(TokenInfo, TokenInfo), QuoteError> {
        let find = |ticker: &str, network: &str| {
            self.tokens
                .find_by_ticker_and_chain(ticker, Some(network))
                .ok_or_else(|| QuoteError::TokenNotFound {
                    ticker: ticker.to_string(),
                    network: network.to_string(),
                })
        };
        Ok((
            find(&input.from_ticker, &input.from_network)?,
            find(&input.to_ticker, &input.to_network)?,
        ))
    }
}

fn validate(input: &SwapInput) -> Result<(), QuoteError> {
    let mut problems = Vec::new();
    if input.amount.trim().is_empty() {
        problems.push("amount is required");
    }
    if input.recipient.trim().is_empty() {
        problems.push("recipient address is required");
    }
    if input.refund_address.trim().is_empty() {
        problems.push("refund address is required");
    }
    if problems.is_empty() {
        Ok(())
    } else {
        Err(QuoteError::Validation(problems.join(", ")))
    }
}

fn build_request(
    input: &SwapInput,
    from: &TokenInfo,
    to: &TokenInfo,
    atomic_amount: String,
    slippage_bps: u32,
    quote_waiting_time_ms: u32,
) -> QuoteRequest {
    QuoteRequest {
        dry: true,
        swap_type: SwapType::ExactInput,
        slippage_tolerance: slippage_bps,
        origin_asset: from.asset_id.clone(),
        deposit_type: DepositType::OriginChain,
        destination_asset: to.asset_id.clone(),
        amount: atomic_amount,
        refund_to: input.refund_address.trim().to_string(),
        refund_type: DepositType::OriginChain,
        recipient: input.recipient.trim().to_string(),
        recipient_type: RecipientType::DestinationChain,
        deadline: (Utc::now() + chrono::Duration::hours(1)).to_rfc3339_opts(SecondsFormat::Secs, true),
        referral: REFERRAL.to_string(),
        quote_waiting_time_ms,
        app_fees: Vec::new(),
    }
}

fn time_remaining(deadline: &str, now: DateTime<Utc>) -> Option<String> {
    let deadline = DateTime::parse_from_rfc3339(deadline).ok()?;
    let remaining = deadline.with_timezone(&Utc) - now;
    if remaining <= chrono::Duration::zero() {
        return Some("Expired".to_string());
    }
    let minutes = remaining.num_minutes();
    Some(if minutes >= 60 {
        format!("{}h {}m", minutes / 60, minutes % 60)
    } else {
        format!("{minutes}m")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use model::quote::{BindingQuote, DryQuote, DryQuoteResponse, QuoteResponse};
    use shared::oneclick_api::{MockOneClickApi, OneClickError, StatusWithRaw};

    fn universe() -> Vec<TokenInfo> {
        vec![
            TokenInfo {
                asset_id: "nep141:eth.omft.near".to_string(),
                ticker: "ETH".to_string(),
                name: "Ether".to_string(),
                decimals: 18,
                blockchain: "eth".to_string(),
                price: 1830.0,
                ..Default::default()
            },
            TokenInfo {
                asset_id: "nep141:usdt.tether-token.near".to_string(),
                ticker: "USDT".to_string(),
                name: "Tether USD".to_string(),
                decimals: 6,
                blockchain: "eth".to_string(),
                price: 1.0,
                ..Default::default()
            },
        ]
    }

    fn input() -> SwapInput {
        SwapInput {
            from_ticker: "ETH".to_string(),
            from_network: "eth".to_string(),
            to_ticker: "USDT".to_string(),
            to_network: "eth".to_string(),
            amount: "1".to_string(),
            recipient: "0xrecipient".to_string(),
            refund_address: "0xrefund".to_string(),
            slippage: "1".to_string(),
        }
    }

    async fn quoter_with(mut api: MockOneClickApi) -> (Quoter, OrderCodec) {
        api.expect_tokens().returning(|| Ok(universe()));
        let api: Arc<dyn OneClickApi> = Arc::new(api);
        let tokens = Arc::new(TokenCache::new(api.clone(), Duration::from_secs(300)));
        tokens.refresh().await.unwrap();
        let codec = OrderCodec::new([9; 32]);
        let quoter = Quoter::new(
            tokens,
            api,
            codec.clone(),
            Arc::new(RequestLimiter::default()),
        );
        (quoter, codec)
    }

    fn dry_response(amount_out: &str) -> DryQuoteResponse {
        DryQuoteResponse {
            quote: DryQuote {
                amount_in: "1000000000000000000".to_string(),
                amount_out: amount_out.to_string(),
                min_amount_out: "1808076600".to_string(),
                time_estimate: 10,
                ..Default::default()
            },
            correlation_id: "corr-1".to_string(),
        }
    }

    fn unavailable() -> OneClickError {
        OneClickError::Status {
            status: reqwest::StatusCode::BAD_GATEWAY,
            body: String::new(),
        }
    }

    #[tokio::test]
    async fn preview_computes_amounts_and_spread() {
        let mut api = MockOneClickApi::new();
        api.expect_dry_quote()
            .times(1)
            .withf(|request| {
                request.dry
                    && request.slippage_tolerance == 100
                    && request.amount == "1000000000000000000"
                    && request.origin_asset == "nep141:eth.omft.near"
                    && request.destination_asset == "nep141:usdt.tether-token.near"
                    && request.referral == REFERRAL
                    && request.quote_waiting_time_ms == 8000
                    && request.app_fees.is_empty()
            })
            .returning(|_| Ok(dry_response("1826340000")));
        api.expect_has_credential().return_const(false);

        let (quoter, _) = quoter_with(api).await;
        let preview = quoter.preview_quote("203.0.113.7", &input()).await.unwrap();

        assert_eq!(preview.amount_out, "1826.34");
        assert_eq!(preview.min_amount_out, "1808.0766");
        assert_eq!(preview.atomic_amount, "1000000000000000000");
        assert_eq!(preview.amount_in_usd, Some(1830.0));
        assert_eq!(preview.amount_out_usd, Some(1826.34));
        let spread = preview.spread_usd.unwrap();
        assert!((spread - 3.66).abs() < 1e-9, "{spread}");
        assert!((preview.spread_percent.unwrap() - 0.2).abs() < 1e-3);
        assert!((preview.rate.unwrap() - 1826.34).abs() < 1e-9);
        assert_eq!(preview.correlation_id, "corr-1");
        assert!(!preview.zero_protocol_fee);
    }

    #[tokio::test]
    async fn preview_without_market_maker_is_unavailable() {
        let mut api = MockOneClickApi::new();
        api.expect_dry_quote().returning(|_| Ok(dry_response("0")));
        let (quoter, _) = quoter_with(api).await;
        assert!(matches!(
            quoter.preview_quote("203.0.113.7", &input()).await,
            Err(QuoteError::Unavailable)
        ));
    }

    #[tokio::test]
    async fn preview_maps_upstream_failure_to_unavailable() {
        let mut api = MockOneClickApi::new();
        api.expect_dry_quote().returning(|_| Err(unavailable()));
        let (quoter, _) = quoter_with(api).await;
        assert!(matches!(
            quoter.preview_quote("203.0.113.7", &input()).await,
            Err(QuoteError::Unavailable)
        ));
    }

    #[tokio::test]
    async fn preview_validates_required_fields() {
        let (quoter, _) = quoter_with(MockOneClickApi::new()).await;
        let result = quoter
            .preview_quote(
                "203.0.113.7",
                &SwapInput {
                    amount: String::new(),
                    recipient: String::new(),
                    ..input()
                },
            )
            .await;
        match result {
            Err(QuoteError::Validation(message)) => {
                assert!(message.contains("amount"));
                assert!(message.contains("recipient"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn preview_rejects_unknown_tokens() {
        let (quoter, _) = quoter_with(MockOneClickApi::new()).await;
        let result = quoter
            .preview_quote(
                "203.0.113.7",
                &SwapInput {
                    to_ticker: "ZZZ".to_string(),
                    ..input()
                },
            )
            .await;
        assert!(matches!(result, Err(QuoteError::TokenNotFound { .. })));
    }

    #[tokio::test]
    async fn place_order_seals_the_upstream_deadline() {
        let mut api = MockOneClickApi::new();
        api.expect_quote()
            .times(1)
            .withf(|request| request.quote_waiting_time_ms == 3000)
            .returning(|_| {
                Ok(QuoteResponse {
                    correlation_id: "corr-9".to_string(),
                    quote: BindingQuote {
                        deposit_address: "deposit-1".to_string(),
                        deposit_memo: Some("memo-1".to_string()),
                        amount_out: "1826340000".to_string(),
                        deadline: "2099-01-01T00:00:00Z".to_string(),
                        ..Default::default()
                    },
                    ..Default::default()
                })
            });

        let (quoter, codec) = quoter_with(api).await;
        let placed = quoter.place_order("203.0.113.7", &input()).await.unwrap();

        let order = codec.decode(&placed.token).unwrap();
        assert_eq!(order, placed.order);
        assert_eq!(order.deposit_address, "deposit-1");
        assert_eq!(order.deposit_memo, "memo-1");
        assert_eq!(order.deadline, "2099-01-01T00:00:00Z");
        assert_eq!(order.amount_out, "1826.34");
        assert_eq!(order.correlation_id, "corr-9");
        assert_eq!(order.refund_address.as_deref(), Some("0xrefund"));
        assert_eq!(order.receive_address.as_deref(), Some("0xrecipient"));
    }

    #[tokio::test]
    async fn place_order_without_deposit_address_is_unavailable() {
        let mut api = MockOneClickApi::new();
        api.expect_quote()
            .returning(|_| Ok(QuoteResponse::default()));
        let (quoter, _) = quoter_with(api).await;
        assert!(matches!(
            quoter.place_order("203.0.113.7", &input()).await,
            Err(QuoteError::Unavailable)
        ));
    }

    #[tokio::test]
    async fn order_placement_is_rate_limited_per_prefix() {
        let mut api = MockOneClickApi::new();
        api.expect_quote().times(ORDER_LIMIT).returning(|_| {
            Ok(QuoteResponse {
                quote: BindingQuote {
                    deposit_address: "deposit-1".to_string(),
                    amount_out: "1000000".to_string(),
                    ..Default::default()
                },
                ..Default::default()
            })
        });

        let (quoter, _) = quoter_with(api).await;
        for _ in 0..ORDER_LIMIT {
            quoter.place_order("203.0.113.7", &input()).await.unwrap();
        }
        assert!(matches!(
            quoter.place_order("203.0.113.8", &input()).await,
            Err(QuoteError::RateLimited)
        ));
    }

    #[tokio::test]
    async fn query_order_reports_terminal_state_and_raw_body() {
        let raw = br#"{"correlationId":"corr-9","status":"SUCCESS","someNewField":1}"#.to_vec();
        let parsed: StatusResponse = serde_json::from_slice(&raw).unwrap();
        let mut api = MockOneClickApi::new();
        let status = StatusWithRaw {
            parsed,
            raw: raw.clone(),
        };
        api.expect_status()
            .withf(|deposit_address| deposit_address == "deposit-1")
            .returning(move |_| Ok(status.clone()));

        let (quoter, codec) = quoter_with(api).await;
        let order = Order {
            deposit_address: "deposit-1".to_string(),
            deadline: "2099-01-01T00:00:00Z".to_string(),
            ..Default::default()
        };
        let token = codec.encode(&order).unwrap();

        let view = quoter.query_order(&token).await.unwrap();
        assert_eq!(view.status.status, OrderStatus::Success);
        assert!(view.is_terminal);
        assert_eq!(view.step, 2);
        assert_eq!(view.raw, raw);
        assert_eq!(view.order, order);
    }

    #[tokio::test]
    async fn query_order_degrades_to_unknown_status() {
        let mut api = MockOneClickApi::new();
        api.expect_status().returning(|_| Err(unavailable()));
        let (quoter, codec) = quoter_with(api).await;
        let token = codec.encode(&Order::default()).unwrap();

        let view = quoter.query_order(&token).await.unwrap();
        assert_eq!(view.status.status, OrderStatus::Unknown);
        assert!(!view.is_terminal);
        assert_eq!(view.step, 0);
        assert!(view.raw.is_empty());
    }

    #[tokio::test]
    async fn query_order_rejects_bad_tokens() {
        let (quoter, _) = quoter_with(MockOneClickApi::new()).await;
        assert!(matches!(
            quoter.query_order("garbage").await,
            Err(QuoteError::InvalidToken(_))
        ));
    }

    #[test]
    fn renders_time_remaining() {
        let now = Utc.with_ymd_and_hms(2026, 9, 1, 12, 0, 0).unwrap();
        assert_eq!(
            time_remaining("2026-09-01T13:30:00Z", now).unwrap(),
            "1h 30m"
        );
        assert_eq!(time_remaining("2026-09-01T12:05:30Z", now).unwrap(), "5m");
        assert_eq!(time_remaining("2026-09-01T11:00:00Z", now).unwrap(), "Expired");
        assert_eq!(time_remaining("", now), None);
        assert_eq!(time_remaining("not a date", now), None);
    }
}
