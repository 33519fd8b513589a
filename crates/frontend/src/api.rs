mod get_monitor_log;
mod get_monitor_stats;
mod get_networks;
mod get_order;
mod get_order_raw;
mod get_tokens;
mod post_order;
mod post_quote;

use crate::quoter::{QuoteError, Quoter};
use shared::{
    api::{error, internal_error_reply, ApiReply, IntoWarpReply},
    monitor::MonitorHandle,
    token_list::TokenCache,
};
use std::{convert::Infallible, net::SocketAddr, sync::Arc};
use warp::{hyper::StatusCode, reply::with_status, Filter, Rejection, Reply};

#[derive(prometheus_metric_storage::MetricStorage, Clone, Debug)]
#[metric(subsystem = "api")]
struct ApiMetrics {
    /// Number of completed API requests.
    #[metric(labels("status_code"))]
    requests_complete: prometheus::IntCounterVec,
}

pub fn handle_all_routes(
    quoter: Arc<Quoter>,
    tokens: Arc<TokenCache>,
    monitor: Option<Arc<MonitorHandle>>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let api = warp::path!("api" / "v1" / ..).and(
        get_tokens::get_tokens(tokens.clone())
            .map(as_response)
            .or(get_networks::get_networks(tokens).map(as_response))
            .unify()
            .or(post_quote::post_quote(quoter.clone()).map(as_response))
            .unify()
            .or(post_order::post_order(quoter.clone()).map(as_response))
            .unify()
            .or(get_order_raw::get_order_raw(quoter.clone()))
            .unify()
            .or(get_order::get_order(quoter).map(as_response))
            .unify()
            .or(get_monitor_stats::get_monitor_stats(monitor.clone()).map(as_response))
            .unify()
            .or(get_monitor_log::get_monitor_log(monitor).map(as_response))
            .unify(),
    );
    let metrics_route = warp::path!("metrics")
        .and(warp::get())
        .map(|| shared::metrics::encode().into_response());

    let metrics = ApiMetrics::instance(shared::metrics::get_metric_storage_registry())
        .expect("unexpected error getting metrics instance")
        .clone();
    let cors = warp::cors()
        .allow_any_origin()
        .allow_methods(vec!["GET", "POST", "OPTIONS"])
        .allow_headers(vec!["Origin", "Content-Type"]);

    api.or(metrics_route)
        .unify()
        .with(warp::log::custom(move |info| {
            metrics
                .requests_complete
                .with_label_values(&[info.status().as_str()])
                .inc();
        }))
        .recover(handle_rejection)
        .with(cors)
}

fn as_response(reply: ApiReply) -> warp::reply::Response {
    reply.into_response()
}

// Rejections are turned into plain replies so CORS headers still apply.
async fn handle_rejection(rejection: Rejection) -> Result<ApiReply, Infallible> {
    let (error_type, status) = if rejection.is_not_found() {
        ("NotFound", StatusCode::NOT_FOUND)
    } else if rejection
        .find::<warp::filters::body::BodyDeserializeError>()
        .is_some()
    {
        ("InvalidPayload", StatusCode::BAD_REQUEST)
    } else if rejection.find::<warp::reject::PayloadTooLarge>().is_some() {
        ("PayloadTooLarge", StatusCode::PAYLOAD_TOO_LARGE)
    } else if rejection.find::<warp::reject::MethodNotAllowed>().is_some() {
        ("MethodNotAllowed", StatusCode::METHOD_NOT_ALLOWED)
    } else {
        tracing::warn!(?rejection, "unhandled rejection");
        ("InternalServerError", StatusCode::INTERNAL_SERVER_ERROR)
    };
    Ok(with_status(error(error_type, ""), status))
}

/// Client identity for rate limiting: the first forwarded address when the
/// service runs behind a proxy, otherwise the socket peer.
pub(crate) fn client_id() -> impl Filter<Extract = (String,), Error = Rejection> + Clone {
    warp::header::optional::<String>("x-forwarded-for")
        .and(warp::addr::remote())
        .map(|forwarded: Option<String>, remote: Option<SocketAddr>| {
            match forwarded.filter(|forwarded| !forwarded.trim().is_empty()) {
                Some(forwarded) => forwarded
                    .split(',')
                    .next()
                    .unwrap_or_default()
                    .trim()
                    .to_string(),
                None => remote
                    .map(|address| address.ip().to_string())
                    .unwrap_or_default(),
            }
        })
}

impl IntoWarpReply for QuoteError {
    fn into_warp_reply(self) -> ApiReply {
        match self {
            QuoteError::Validation(message) => {
                with_status(error("Validation", message), StatusCode::BAD_REQUEST)
            }
            QuoteError::TokenNotFound { ticker, network } => with_status(
                error(
                    "TokenNotFound",
                    format!("could not find token {ticker} on {network}"),
                ),
                StatusCode::BAD_REQUEST,
            ),
            QuoteError::InvalidToken(_) => with_status(
                error("InvalidOrder", "this order link is invalid or expired"),
                StatusCode::BAD_REQUEST,
            ),
            QuoteError::RateLimited => with_status(
                error("RateLimited", "please wait a moment before trying again"),
                StatusCode::TOO_MANY_REQUESTS,
            ),
            QuoteError::Unavailable => with_status(
                error("Unavailable", "temporarily unavailable, try again"),
                StatusCode::BAD_GATEWAY,
            ),
            QuoteError::Internal(err) => {
                tracing::error!(?err, "internal error");
                internal_error_reply()
            }
        }
    }
}
