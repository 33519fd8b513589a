use crate::quoter::{Quoter, SwapInput};
use shared::api::{convert_json_response, extract_payload, ApiReply};
use std::{convert::Infallible, sync::Arc};
use warp::{Filter, Rejection};

fn request() -> impl Filter<Extract = (String, SwapInput), Error = Rejection> + Clone {
    warp::path!("quote")
        .and(warp::post())
        .and(super::client_id())
        .and(extract_payload())
}

pub fn post_quote(
    quoter: Arc<Quoter>,
) -> impl Filter<Extract = (ApiReply,), Error = Rejection> + Clone {
    request().and_then(move |client: String, input: SwapInput| {
        let quoter = quoter.clone();
        async move {
            let result = quoter.preview_quote(&client, &input).await;
            if let Err(err) = &result {
                tracing::debug!(?err, "preview quote failed");
            }
            Result::<_, Infallible>::Ok(convert_json_response(result))
        }
    })
}
