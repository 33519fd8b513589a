use crate::quoter::Quoter;
use shared::api::{convert_json_response, ApiReply};
use std::{convert::Infallible, sync::Arc};
use warp::{Filter, Rejection};

pub fn get_order(
    quoter: Arc<Quoter>,
) -> impl Filter<Extract = (ApiReply,), Error = Rejection> + Clone {
    warp::path!("orders" / String)
        .and(warp::get())
        .and_then(move |token: String| {
            let quoter = quoter.clone();
            async move {
                let result = quoter.query_order(&token).await;
                Result::<_, Infallible>::Ok(convert_json_response(result))
            }
        })
}
