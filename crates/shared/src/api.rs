//! Helpers shared by all warp based JSON endpoints.

use serde::{de::DeserializeOwned, Serialize};
use warp::{
    hyper::StatusCode,
    reply::{json, with_status, Json, WithStatus},
    Filter, Rejection,
};

pub type ApiReply = WithStatus<Json>;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Error<'a> {
    error_type: &'a str,
    description: &'a str,
}

pub fn error(error_type: &str, description: impl AsRef<str>) -> Json {
    json(&Error {
        error_type,
        description: description.as_ref(),
    })
}

pub fn internal_error_reply() -> ApiReply {
    with_status(
        error("InternalServerError", ""),
        StatusCode::INTERNAL_SERVER_ERROR,
    )
}

/// Maps a handler result onto an HTTP reply, deferring the error mapping to
/// the error type itself.
pub fn convert_json_response<T, E>(result: Result<T, E>) -> ApiReply
where
    T: Serialize,
    E: IntoWarpReply + std::fmt::Debug,
{
    match result {
        Ok(response) => with_status(json(&response), StatusCode::OK),
        Err(err) => err.into_warp_reply(),
    }
}

pub trait IntoWarpReply {
    fn into_warp_reply(self) -> ApiReply;
}

const MAX_JSON_BODY_PAYLOAD: u64 = 1024 * 16;

pub fn extract_payload<T: DeserializeOwned + Send>(
) -> impl Filter<Extract = (T,), Error = Rejection> + Clone {
    warp::body::content_length_limit(MAX_JSON_BODY_PAYLOAD).and(warp::body::json())
}
