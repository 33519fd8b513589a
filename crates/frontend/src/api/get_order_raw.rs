use crate::quoter::Quoter;
use shared::api::IntoWarpReply;
use std::{convert::Infallible, sync::Arc};
use warp::{
    hyper::{header::CONTENT_TYPE, Body, StatusCode},
    reply::{json, with_status, Response},
    Filter, Rejection, Reply,
};

/// Serves the upstream status body byte for byte, falling back to the parsed
/// form when the upstream was unreachable.
pub fn get_order_raw(
    quoter: Arc<Quoter>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::path!("orders" / String / "raw")
        .and(warp::get())
        .and_then(move |token: String| {
            let quoter = quoter.clone();
            async move {
                let reply = match quoter.query_order(&token).await {
                    Ok(view) if !view.raw.is_empty() => warp::http::Response::builder()
                        .header(CONTENT_TYPE, "application/json")
                        .body(Body::from(view.raw))
                        .expect("static response parts are valid"),
                    Ok(view) => with_status(json(&view.status), StatusCode::OK).into_response(),
                    Err(err) => err.into_warp_reply().into_response(),
                };
                Result::<_, Infallible>::Ok(reply)
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::order::{Order, OrderCodec};
    use model::quote::StatusResponse;
    use shared::{
        oneclick_api::{MockOneClickApi, OneClickApi, StatusWithRaw},
        rate_limiter::RequestLimiter,
        token_list::TokenCache,
    };
    use std::time::Duration;

    #[tokio::test]
    async fn raw_body_is_served_verbatim() {
        let raw = br#"{"status":"SUCCESS","unparsedExtra":{"nested":[1,2,3]}}"#.to_vec();
        let parsed: StatusResponse = serde_json::from_slice(&raw).unwrap();
        let status = StatusWithRaw {
            parsed,
            raw: raw.clone(),
        };
        let mut api = MockOneClickApi::new();
        api.expect_status().returning(move |_| Ok(status.clone()));

        let api: Arc<dyn OneClickApi> = Arc::new(api);
        let codec = OrderCodec::new([1; 32]);
        let quoter = Arc::new(Quoter::new(
            Arc::new(TokenCache::new(api.clone(), Duration::from_secs(300))),
            api,
            codec.clone(),
            Arc::new(RequestLimiter::default()),
        ));
        let token = codec
            .encode(&Order {
                deposit_address: "deposit-1".to_string(),
                ..Default::default()
            })
            .unwrap();

        let filter = get_order_raw(quoter);
        let response = warp::test::request()
            .path(&format!("/orders/{token}/raw"))
            .reply(&filter)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body().as_ref(), raw.as_slice());
    }
}
