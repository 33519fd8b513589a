use serde::Deserialize;
use shared::{
    api::{error, ApiReply},
    token_list::TokenCache,
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

fn request() -> impl Filter<Extract = (Query,), Error = Rejection> + Clone {
    warp::path!("tokens").and(warp::get()).and(warp::query())
}

pub fn get_tokens(
    cache: Arc<TokenCache>,
) -> impl Filter<Extract = (ApiReply,), Error = Rejection> + Clone {
    request().and_then(move |query: Query| {
        let cache = cache.clone();
        async move {
            let reply = match cache.all().await {
                Ok(all) => {
                    let tokens = match query.search.as_deref() {
                        Some(search) if !search.is_empty() => cache.search(search),
                        _ => all,
                    };
                    with_status(json(&tokens), StatusCode::OK)
                }
                Err(err) => {
                    tracing::warn!(?err, "token list unavailable");
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
