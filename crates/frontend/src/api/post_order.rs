use crate::quoter::{Quoter, SwapInput};
use shared::api::{extract_payload, ApiReply, IntoWarpReply};
use std::{convert::Infallible, sync::Arc};
use warp::{
    hyper::StatusCode,
    reply::{json, with_status},
    Filter, Rejection,
};

fn request() -> impl Filter<Extract = (String, SwapInput), Error = Rejection> + Clone {
    warp::path!("orders")
        .and(warp::post())
        .and(super::client_id())
        .and(extract_payload())
}

pub fn post_order(
    quoter: Arc<Quoter>,
) -> impl Filter<Extract = (ApiReply,), Error = Rejection> + Clone {
    request().and_then(move |client: String, input: SwapInput| {
        let quoter = quoter.clone();
        async move {
            let reply = match quoter.place_order(&client, &input).await {
                Ok(placed) => with_status(json(&placed), StatusCode::CREATED),
                Err(err) => {
                    tracing::debug!(?err, "order placement failed");
                    err.into_warp_reply()
                }
            };
            Result::<_, Infallible>::Ok(reply)
        }
    })
}
