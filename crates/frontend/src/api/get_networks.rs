use serde::Deserialize;
use shared::{
    api::{error, ApiReply},
    token_list::{filter_networks, TokenCache},
};
use std::{convert::Infallible, sync::Arc};
use warp::{
    hyper::StatusCode,
    reply::{json, with_status},
    Filter, Rejection,
};

#[derive(Debug, Deserialize)]
struct Query {
    #[serde(default)]
    search: Option<String>,
}

pub fn get_networks(
    cache: Arc<TokenCache>,
) -> impl Filter<Extract = (ApiReply,), Error = Rejection> + Clone {
    warp::path!("networks")
        .and(warp::get())
        .and(warp::query())
        .and_then(move |query: Query| {
            let cache = cache.clone();
            async move {
                let reply = match cache.network_groups().await {
                    Ok(networks) => {
                        let networks = match query.search.as_deref() {
                            Some(search) if !search.is_empty() => {
                                filter_networks(networks, search)
                            }
                            _ => networks,
                        };
                        with_status(json(&networks), StatusCode::OK)
                    }
                    Err(err) => {
                        tracing::warn!(?err, "network groups unavailable");
                        with_status(
                            error("Unavailable", "token list temporarily unavailable"),
                            StatusCode::BAD_GATEWAY,
                        )
                    }
                };
                Result::<_, Infallible>::Ok(reply)
            }
        })
}
