use serde::Deserialize;
use shared::{
    api::{error, ApiReply},
    monitor::MonitorHandle,
};
use std::{convert::Infallible, sync::Arc};
use warp::{
    hyper::StatusCode,
    reply::{json, with_status},
    Filter, Rejection,
};

const DEFAULT_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
struct Query {
    #[serde(default)]
    affiliate: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
}

pub fn get_monitor_log(
    monitor: Option<Arc<MonitorHandle>>,
) -> impl Filter<Extract = (ApiReply,), Error = Rejection> + Clone {
    warp::path!("monitor" / "log")
        .and(warp::get())
        .and(warp::query())
        .and_then(move |query: Query| {
            let monitor = monitor.clone();
            async move {
                let reply = match monitor {
                    None => with_status(
                        error("NotFound", "the monitor is not enabled"),
                        StatusCode::NOT_FOUND,
                    ),
                    Some(monitor) => {
                        let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
                        let entries = monitor.ring.snapshot(limit, |entry| {
                            query
                                .affiliate
                                .as_deref()
                                .is_none_or(|affiliate| entry.affiliate == affiliate)
                        });
                        with_status(json(&entries), StatusCode::OK)
                    }
                };
                Result::<_, Infallible>::Ok(reply)
            }
        })
}
